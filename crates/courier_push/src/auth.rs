// --- File: crates/courier_push/src/auth.rs ---
//! OAuth2 token acquisition for the FCM HTTP v1 API.
//!
//! Reads the Google service account key file configured for the push
//! channel and exchanges it for an access token with the
//! `firebase.messaging` scope.

use std::path::Path;

use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator};

use courier_common::error::{external_service_error, CourierError};
use courier_config::FcmConfig;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

pub async fn get_fcm_auth_token(config: &FcmConfig) -> Result<String, CourierError> {
    let sa_key = read_service_account_key(Path::new(&config.key_path))
        .await
        .map_err(|e| {
            external_service_error("fcm", format!("could not read service account key: {e}"))
        })?;

    let auth = ServiceAccountAuthenticator::builder(sa_key)
        .build()
        .await
        .map_err(|e| external_service_error("fcm", format!("authenticator build failed: {e}")))?;

    let auth_token = auth
        .token(&[FCM_SCOPE])
        .await
        .map_err(|e| external_service_error("fcm", format!("token exchange failed: {e}")))?;

    match auth_token.token() {
        Some(token) => Ok(token.to_string()),
        None => Err(external_service_error("fcm", "no access token returned")),
    }
}
