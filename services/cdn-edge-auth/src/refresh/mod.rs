//! Session refresh against the token issuer.

pub mod issuer;
pub mod refresher;

pub use issuer::{ClientSecret, CognitoTokenEndpoint, IssuedTokens, TokenIssuer};
pub use refresher::{RefreshFailure, TokenRefresher};
