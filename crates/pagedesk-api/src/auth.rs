use chrono::Duration;
use tracing::{info, warn};

use pagedesk_session::SessionStore;
use pagedesk_types::models::Session;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::middleware::Route;

/// Session lifetime when "remember me" is ticked.
pub const REMEMBER_ME_TTL_DAYS: i64 = 30;
/// Session lifetime otherwise.
pub const DEFAULT_TTL_DAYS: i64 = 1;

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

impl LoginForm {
    pub fn ttl(&self) -> Duration {
        if self.remember_me {
            Duration::days(REMEMBER_ME_TTL_DAYS)
        } else {
            Duration::days(DEFAULT_TTL_DAYS)
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// Exchange credentials for a token and persist it. On success the caller
/// navigates to `/home`.
pub async fn login_flow(
    client: &ApiClient,
    store: &SessionStore,
    form: &LoginForm,
) -> Result<Session, ApiError> {
    let token = client.login(&form.email, &form.password).await?;

    let session = store
        .set(&token.access_token, &token.token_type, form.ttl())
        .map_err(|e| {
            warn!("Failed to persist session: {}", e);
            ApiError::Unavailable(format!("could not store session: {}", e))
        })?;

    info!(email = %form.email, expires_at = %session.expires_at, "Logged in");
    Ok(session)
}

/// Create an account. Registration does not sign in; the next stop is `/login`.
pub async fn register_flow(client: &ApiClient, form: &RegisterForm) -> Result<Route, ApiError> {
    client
        .register(&form.email, &form.full_name, &form.password)
        .await?;
    info!(email = %form.email, "Registered");
    Ok(Route::Login)
}

pub fn logout(store: &SessionStore) -> Route {
    if let Err(e) = store.clear() {
        warn!("Failed to clear session: {}", e);
    }
    info!("Logged out");
    Route::Login
}
