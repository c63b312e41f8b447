use std::net::SocketAddr;

pub mod adapters;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod leaderboard;
pub mod ports;
pub mod push;
pub mod reminders;
pub mod state;
pub mod types;

pub use push::{VapidCredentials, generate_vapid_credentials};

pub async fn serve(addr: SocketAddr, config: config::AppConfig) {
    let store = adapters::RestDatastore::new(&config)
        .unwrap_or_else(|err| panic!("failed to build datastore client: {err}"));
    let authenticator = adapters::RestAuthenticator::new(&config)
        .unwrap_or_else(|err| panic!("failed to build auth client: {err}"));
    let gateway = adapters::HttpPushGateway::from_config(&config)
        .unwrap_or_else(|err| panic!("failed to build push gateway client: {err}"));
    if gateway.is_none() {
        eprintln!("warning: no push platform configured; dispatch requests will fail");
    }

    let state = state::AppState {
        config,
        store,
        gateway,
        authenticator,
    };
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app::app(state))
        .await
        .expect("server error");
}
