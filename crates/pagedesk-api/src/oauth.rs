use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pagedesk_types::models::Session;

use crate::client::ApiClient;
use crate::middleware::Route;

pub const OAUTH_CALLBACK_PATH: &str = "/fb_oauth/";
pub const MISSING_CODE: &str = "No authorization code found";
pub const CONNECT_FAILED: &str = "Failed to connect Facebook page";
/// Seconds shown before returning home.
pub const REDIRECT_SECONDS: u32 = 5;

/// Where Facebook sends the agent back to after authorizing.
pub fn callback_uri(frontend_url: &str) -> String {
    format!("{}{}", frontend_url.trim_end_matches('/'), OAUTH_CALLBACK_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthOutcome {
    Connected,
    Failed(String),
}

/// Finish the OAuth round trip by handing the authorization code to the backend.
pub async fn complete_oauth(
    client: &ApiClient,
    session: &Session,
    code: Option<&str>,
    frontend_url: &str,
) -> OAuthOutcome {
    let Some(code) = code.filter(|c| !c.is_empty()) else {
        return OAuthOutcome::Failed(MISSING_CODE.into());
    };

    match client
        .facebook_connect(session, code, &callback_uri(frontend_url))
        .await
    {
        Ok(true) => {
            info!("Facebook page connected");
            OAuthOutcome::Connected
        }
        Ok(false) => {
            error!("Backend refused Facebook page connection");
            OAuthOutcome::Failed(CONNECT_FAILED.into())
        }
        Err(e) => {
            error!("Error connecting Facebook page: {}", e);
            OAuthOutcome::Failed(CONNECT_FAILED.into())
        }
    }
}

/// Redirect countdown shown after the callback settles.
pub struct Countdown {
    seconds: u32,
    step: Duration,
    skip: CancellationToken,
}

impl Countdown {
    pub fn new(seconds: u32, step: Duration) -> Self {
        Self {
            seconds,
            step,
            skip: CancellationToken::new(),
        }
    }

    /// Token that ends the countdown early ("Go to Home").
    pub fn skip_token(&self) -> CancellationToken {
        self.skip.clone()
    }

    /// Report each remaining value, starting with the full count and ending
    /// at zero, then return the destination.
    pub async fn run<F: FnMut(u32)>(self, mut on_tick: F) -> Route {
        let mut remaining = self.seconds;
        on_tick(remaining);

        let mut interval = tokio::time::interval(self.step);
        // First tick completes immediately.
        interval.tick().await;

        while remaining > 0 {
            tokio::select! {
                _ = self.skip.cancelled() => break,
                _ = interval.tick() => {
                    remaining -= 1;
                    on_tick(remaining);
                }
            }
        }

        Route::Home
    }
}

impl Default for Countdown {
    fn default() -> Self {
        Self::new(REDIRECT_SECONDS, Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn callback_uri_has_single_slash() {
        assert_eq!(
            callback_uri("http://localhost:3000/"),
            "http://localhost:3000/fb_oauth/"
        );
        assert_eq!(
            callback_uri("https://desk.example.com"),
            "https://desk.example.com/fb_oauth/"
        );
    }

    #[tokio::test]
    async fn missing_code_fails_without_request() {
        // Nothing listens on this port; a request would fail differently.
        let client = ApiClient::new("http://127.0.0.1:9");
        let session = Session::new("tok", "bearer", ChronoDuration::days(1));

        let outcome = complete_oauth(&client, &session, None, "http://localhost:3000").await;
        assert_eq!(outcome, OAuthOutcome::Failed(MISSING_CODE.into()));

        let outcome = complete_oauth(&client, &session, Some(""), "http://localhost:3000").await;
        assert_eq!(outcome, OAuthOutcome::Failed(MISSING_CODE.into()));
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_reaches_zero_then_goes_home() {
        let mut seen = Vec::new();
        let route = Countdown::default().run(|n| seen.push(n)).await;
        assert_eq!(route, Route::Home);
        assert_eq!(seen, vec![5, 4, 3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_can_be_skipped() {
        let countdown = Countdown::default();
        let skip = countdown.skip_token();
        let mut seen = Vec::new();
        skip.cancel();
        let route = countdown.run(|n| seen.push(n)).await;
        assert_eq!(route, Route::Home);
        assert_eq!(seen, vec![5]);
    }
}
