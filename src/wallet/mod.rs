//! Wallet-side state kept between assembly cycles

pub mod credentials;

pub use credentials::{
    delete_credential, get_credential, list_credentials, mark_credential_deployed,
    mark_credential_failed, register_credential, set_primary_credential, touch_credential,
    CredentialStatus, StoredCredential,
};
