//! Role-scoped temporary credentials and request signing.

pub mod broker;
pub mod exchanger;
pub mod sigv4;

pub use broker::{BrokerCredentials, CognitoIdentityBroker, IdentityBroker};
pub use exchanger::{CredentialExchanger, ExchangeFailure, TemporaryCredential};
pub use sigv4::RequestSigner;
