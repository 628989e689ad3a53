use tracing::{error, warn};

use pagedesk_session::SessionStore;
use pagedesk_types::models::{IntegrationStatus, PageId, Session, User};

use crate::backend::Backend;
use crate::client::ApiClient;
use crate::middleware::Route;
use crate::oauth::callback_uri;

pub const DISCONNECT_FAILED: &str = "Couldn't disconnect page";

/// State of the integration page after loading.
#[derive(Debug, Clone)]
pub struct HomePage {
    pub session: Session,
    pub user: User,
    /// Authorize URL for connecting a page; absent if the lookup failed.
    pub auth_url: Option<String>,
    /// Absent if the status lookup failed.
    pub status: Option<IntegrationStatus>,
    pub error: Option<String>,
}

impl HomePage {
    /// Load the user, the OAuth authorize URL and the integration status
    /// concurrently. A failed user lookup ends the session.
    pub async fn load(
        client: &ApiClient,
        store: &SessionStore,
        frontend_url: &str,
    ) -> Result<Self, Route> {
        let Some(session) = store.get() else {
            return Err(Route::Login);
        };

        let redirect_uri = callback_uri(frontend_url);
        let (user, auth_url, status) = tokio::join!(
            client.me(&session),
            client.facebook_auth_url(&session, &redirect_uri),
            client.fetch_integration_status(&session),
        );

        let user = match user {
            Ok(user) => user,
            Err(e) => {
                error!("Error fetching user data: {}", e);
                store.clear().ok();
                return Err(Route::Login);
            }
        };

        let auth_url = auth_url
            .inspect_err(|e| warn!("Error fetching Facebook auth URL: {}", e))
            .ok();
        let status = status
            .inspect_err(|e| warn!("Error fetching Facebook connection status: {}", e))
            .ok();

        Ok(Self {
            session,
            user,
            auth_url,
            status,
            error: None,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.connected)
    }

    pub fn connected_page_id(&self) -> Option<&PageId> {
        self.status
            .as_ref()
            .and_then(|s| s.page.as_ref())
            .map(|p| &p.id)
    }

    /// Remove the page integration. Returns whether it succeeded.
    pub async fn disconnect<B: Backend>(&mut self, backend: &B, page_id: &PageId) -> bool {
        match backend.disconnect_integration(&self.session, page_id).await {
            Ok(true) => {
                self.status = Some(IntegrationStatus::disconnected());
                self.error = None;
                true
            }
            Ok(false) => {
                self.error = Some(DISCONNECT_FAILED.into());
                false
            }
            Err(e) => {
                error!("Error disconnecting page: {}", e);
                self.error = Some(DISCONNECT_FAILED.into());
                false
            }
        }
    }
}
