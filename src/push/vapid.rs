use base64::{URL_SAFE_NO_PAD, decode_config};
use p256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde_json::json;
use time::OffsetDateTime;

use crate::config;
use crate::push::CredentialStatus;
use crate::push::jws;

/// Seconds a VAPID token stays valid. Push services reject longer lifetimes.
const VAPID_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

#[derive(Debug, Clone)]
pub(crate) struct WebPushCredentials {
    pub(crate) private_key: String,
    pub(crate) public_key: String,
    pub(crate) subject: String,
}

#[derive(Debug, Clone)]
pub struct VapidCredentials {
    pub private_key: String,
    pub public_key: String,
}

pub(crate) fn load_web_push_credentials(
    config: &config::AppConfig,
) -> CredentialStatus<WebPushCredentials> {
    let private_key = config.vapid_private_key.as_ref();
    let public_key = config.vapid_public_key.as_ref();
    let subject = config.vapid_subject.as_ref();
    let has_any = private_key.is_some() || public_key.is_some() || subject.is_some();

    match (private_key, public_key, subject) {
        (Some(private_key), Some(public_key), Some(subject)) => {
            CredentialStatus::Ready(WebPushCredentials {
                private_key: private_key.clone(),
                public_key: public_key.clone(),
                subject: subject.clone(),
            })
        }
        _ if has_any => CredentialStatus::Incomplete,
        _ => CredentialStatus::Missing,
    }
}

/// Builds the VAPID authorization JWT for one push-service origin.
///
/// Unusable key material degrades to an empty token: the send then goes out
/// without an Authorization header instead of aborting, since some push
/// services accept anonymous delivery in dev setups.
pub(crate) fn generate_vapid_jwt(
    private_key: &str,
    audience: &str,
    subject: &str,
    now: OffsetDateTime,
) -> String {
    let Ok(raw) = decode_config(private_key, URL_SAFE_NO_PAD) else {
        return String::new();
    };
    let Ok(key) = SigningKey::from_slice(&raw) else {
        return String::new();
    };
    let header = json!({"typ": "JWT", "alg": "ES256"});
    let payload = json!({
        "aud": audience,
        "exp": now.unix_timestamp() + VAPID_TOKEN_TTL_SECS,
        "sub": subject,
    });
    jws::sign_compact(&key, &header, &payload).unwrap_or_default()
}

pub fn generate_vapid_credentials() -> VapidCredentials {
    let mut rng = OsRng;
    generate_vapid_credentials_with_rng(&mut rng)
}

pub(crate) fn generate_vapid_credentials_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> VapidCredentials {
    let key = SigningKey::random(rng);
    let public_key = key.verifying_key().to_encoded_point(false);
    VapidCredentials {
        private_key: jws::base64url(&key.to_bytes()),
        public_key: jws::base64url(public_key.as_bytes()),
    }
}
