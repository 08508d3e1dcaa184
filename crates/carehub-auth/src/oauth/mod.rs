//! OAuth 2.0 token endpoint.
//!
//! - [`Provider`] - client authentication and grant dispatch
//! - [`grant`] - the `internal` and `internal_refresh_token` handlers
//! - [`HmacTokenStrategy`] - opaque token generation and verification
//! - [`token`] - request, response and error types

pub mod grant;
pub mod provider;
pub mod request;
pub mod strategy;
pub mod token;

pub use grant::{GrantKind, InternalGrantHandler, InternalRefreshHandler, TokenEndpointHandler};
pub use provider::Provider;
pub use request::AccessRequest;
pub use strategy::HmacTokenStrategy;
pub use token::{ClientCredentials, TokenError, TokenErrorCode, TokenRequest, TokenResponse};
