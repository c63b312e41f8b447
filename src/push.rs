mod apns;
mod jws;
mod vapid;

pub(crate) use apns::{ApnsCredentials, ApnsSigningError, generate_apns_jwt, load_apns_credentials};
pub use vapid::{VapidCredentials, generate_vapid_credentials};
pub(crate) use vapid::{WebPushCredentials, generate_vapid_jwt, load_web_push_credentials};

/// Per-platform credential loading outcome. `Missing` silently disables the
/// platform; `Incomplete` means some but not all keys were supplied, which is
/// worth a startup warning.
#[derive(Debug, Clone)]
pub enum CredentialStatus<T> {
    Missing,
    Incomplete,
    Ready(T),
}
