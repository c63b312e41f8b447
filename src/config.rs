/// Process-wide configuration, resolved once at startup and passed explicitly.
/// Credentials are optional per platform: a platform without credentials is
/// skipped during dispatch, and only the absence of both is a hard error.
#[derive(Clone)]
pub struct AppConfig {
    /// Base URL of the managed datastore (REST + auth endpoints).
    pub datastore_url: String,
    /// Service-role key; authenticates datastore calls and the job endpoints.
    pub service_key: String,
    pub vapid_private_key: Option<String>,
    pub vapid_public_key: Option<String>,
    pub vapid_subject: Option<String>,
    pub apns_key_id: Option<String>,
    pub apns_team_id: Option<String>,
    pub apns_private_key: Option<String>,
    pub apns_topic: String,
    pub apns_endpoint: String,
}

#[cfg(test)]
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            datastore_url: "http://localhost:54321".to_string(),
            service_key: "test-service-key".to_string(),
            vapid_private_key: None,
            vapid_public_key: None,
            vapid_subject: None,
            apns_key_id: None,
            apns_team_id: None,
            apns_private_key: None,
            apns_topic: "app.getproof.mobile".to_string(),
            apns_endpoint: "https://api.push.apple.com".to_string(),
        }
    }
}
