use crate::config::AppConfig;

/// Everything the handlers share. Generic over the ports so route tests can
/// inject doubles; `gateway` is `None` when no push platform is configured.
#[derive(Clone)]
pub struct AppState<S, G, A> {
    pub config: AppConfig,
    pub store: S,
    pub gateway: Option<G>,
    pub authenticator: A,
}
