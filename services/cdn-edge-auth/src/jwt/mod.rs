//! ID token verification.

pub mod claims;
pub mod keys;
pub mod token;
pub mod validator;

pub use claims::{ClaimValue, IdentityClaims};
pub use keys::{IssuerKeys, Jwk, Jwks};
pub use token::{SignatureVerified, Token, TokenState, Unvalidated, Validated};
pub use validator::{TokenValidator, ValidationOutcome};
