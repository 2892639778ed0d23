//! Account management module.
//!
//! Accounts, their credentials and provider presets. Persistence lives in
//! [`crate::store`].

mod credentials;
mod model;

pub use credentials::{AuthMaterial, CredentialProvider};
pub use model::{
    Account, AccountId, Credential, OAuthCredential, parse_endpoint, provider_imap_url,
};
