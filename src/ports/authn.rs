#[derive(Debug)]
pub enum AuthnError {
    Request(String),
    Status(u16),
}

impl std::fmt::Display for AuthnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthnError::Request(err) => write!(f, "auth request failed: {err}"),
            AuthnError::Status(status) => write!(f, "auth service returned {status}"),
        }
    }
}

/// Resolves a caller's bearer token to a user id. `Ok(None)` means the token
/// was rejected; `Err` means the auth service itself could not be reached.
pub trait Authenticator: Clone + Send + Sync + 'static {
    fn resolve(
        &self,
        bearer: &str,
    ) -> impl Future<Output = Result<Option<String>, AuthnError>> + Send;
}
