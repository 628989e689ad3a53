use reqwest::{Client, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use pagedesk_types::api::{
    AuthUrlResponse, ConnectRequest, ErrorBody, LoginRequest, RegisterRequest, SuccessResponse,
    TokenResponse,
};
use pagedesk_types::models::{Session, User};

use crate::error::ApiError;

/// Typed HTTP client for the helpdesk backend.
///
/// Every authenticated call attaches `Authorization: Bearer <token>`.
/// Nothing is retried here; retry policy belongs to the caller.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(base_url, Client::new())
    }

    pub fn with_http(base_url: impl Into<String>, http: Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // -- Request helpers --

    pub(crate) async fn get_authed<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .header(header::AUTHORIZATION, session.authorization())
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        decode(path, expect_success(path, resp).await?).await
    }

    pub(crate) async fn post_authed<B: Serialize, T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let mut req = self
            .http
            .post(self.url(path))
            .header(header::AUTHORIZATION, session.authorization());
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(|e| transport_error(path, e))?;

        decode(path, expect_success(path, resp).await?).await
    }

    /// Unauthenticated credential exchange. Any non-2xx is a rejection whose
    /// message comes from the body, or `fallback` when the body has none.
    async fn post_credentials<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let reason = error_reason(resp).await;
            debug!(%status, path, "Credential exchange refused");
            return Err(ApiError::Rejected(reason.unwrap_or_else(|| fallback.to_string())));
        }

        decode(path, resp).await
    }

    // -- Auth --

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ApiError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.post_credentials("/api/v1/auth/login", &body, "Login failed")
            .await
    }

    pub async fn register(
        &self,
        email: &str,
        full_name: &str,
        password: &str,
    ) -> Result<(), ApiError> {
        let body = RegisterRequest {
            email: email.to_string(),
            full_name: full_name.to_string(),
            password: password.to_string(),
        };
        // The created user is not needed; only success matters.
        self.post_credentials::<_, serde_json::Value>(
            "/api/v1/auth/register",
            &body,
            "Registration failed",
        )
        .await?;
        Ok(())
    }

    pub async fn me(&self, session: &Session) -> Result<User, ApiError> {
        self.get_authed(session, "/api/v1/auth/me", &[]).await
    }

    // -- Facebook OAuth --

    pub async fn facebook_auth_url(
        &self,
        session: &Session,
        redirect_uri: &str,
    ) -> Result<String, ApiError> {
        let resp: AuthUrlResponse = self
            .get_authed(session, "/facebook/auth", &[("redirect_uri", redirect_uri)])
            .await?;
        Ok(resp.auth_url)
    }

    pub async fn facebook_connect(
        &self,
        session: &Session,
        code: &str,
        redirect_uri: &str,
    ) -> Result<bool, ApiError> {
        let body = ConnectRequest {
            code: code.to_string(),
            redirect_uri: redirect_uri.to_string(),
        };
        let resp: SuccessResponse = self
            .post_authed(session, "/facebook/connect", Some(&body))
            .await?;
        Ok(resp.success)
    }
}

async fn expect_success(path: &str, resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        warn!(%status, path, "Backend rejected session");
        return Err(ApiError::Unauthorized);
    }

    let reason = error_reason(resp).await;
    Err(ApiError::Unavailable(match reason {
        Some(reason) => format!("{} {} ({})", path, status, reason),
        None => format!("{} {}", path, status),
    }))
}

async fn decode<T: DeserializeOwned>(path: &str, resp: Response) -> Result<T, ApiError> {
    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
}

async fn error_reason(resp: Response) -> Option<String> {
    let body = resp.text().await.ok()?;
    serde_json::from_str::<ErrorBody>(&body).ok()?.reason()
}

fn transport_error(path: &str, e: reqwest::Error) -> ApiError {
    ApiError::Unavailable(format!("{}: {}", path, e))
}
