//! HTTP client for the tenant's consent endpoint.
//!
//! Wraps `reqwest::Client` with a freshly signed bearer token on every
//! request and maps non-2xx replies to `Transport` errors.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bank0_core::{Bank0Error, Bank0Result, Enrollment};
use chrono::Utc;
use log::{debug, info};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use serde_json::json;
use std::time::Duration;
use url::Url;

use crate::consent::jwt::{AuthzClaims, RequestSigner};
use crate::consent::types::{AuthorizationDetail, ConsentEntity};
use crate::notification::Notification;

const CLIENT_NAME: &str = "bank0";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LANGUAGE: &str = "en-US";

/// Consent lookup and decision for payment requests.
#[async_trait]
pub trait ConsentApi: Send + Sync {
    /// Fetch the consent referenced by the notification's linking id.
    async fn get_consent(
        &self,
        notification: &Notification,
        enrollment: &Enrollment,
    ) -> Bank0Result<ConsentEntity>;

    /// Mark the consent authorized with the (possibly amended) details.
    async fn authorize(
        &self,
        notification: &Notification,
        enrollment: &Enrollment,
        authorization_details: &[AuthorizationDetail],
    ) -> Bank0Result<()>;

    /// Mark the consent rejected.
    async fn reject(&self, notification: &Notification, enrollment: &Enrollment)
        -> Bank0Result<()>;
}

/// Consent service client bound to one tenant.
#[derive(Debug, Clone)]
pub struct ConsentClient {
    inner: reqwest::Client,
    base_url: Url,
    audience: String,
    authorizing_client_id: String,
}

impl ConsentClient {
    /// Create a client for `tenant_url`; tokens are issued as
    /// `authorizing_client_id`.
    pub fn new(tenant_url: &str, authorizing_client_id: &str) -> Bank0Result<Self> {
        let base_url = Url::parse(tenant_url)
            .map_err(|e| Bank0Error::Config(format!("invalid tenant url '{}': {}", tenant_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Bank0Error::Config(format!(
                "tenant url '{}' cannot carry a path",
                tenant_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, header_value(&accept_language())?);
        headers.insert(USER_AGENT, header_value(&user_agent())?);
        headers.insert("auth0-client", header_value(&client_info())?);

        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers)
            .build()
            .map_err(|e| Bank0Error::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            inner,
            audience: format!("{}/consents", tenant_url.trim_end_matches('/')),
            base_url,
            authorizing_client_id: authorizing_client_id.to_string(),
        })
    }

    /// Audience claim of every token, `<tenant>/consents`.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// `<tenant>/consents/<linking id>`
    pub fn consent_url(&self, transaction_linking_id: &str) -> Bank0Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Bank0Error::Config("tenant url cannot carry a path".into()))?
            .pop_if_empty()
            .push("consents")
            .push(transaction_linking_id);
        Ok(url)
    }

    fn target(
        &self,
        notification: &Notification,
        enrollment: &Enrollment,
    ) -> Bank0Result<(Url, String)> {
        let linking_id = notification.transaction_linking_id.as_deref().ok_or_else(|| {
            Bank0Error::InvalidState("notification has no transaction linking id".into())
        })?;
        let claims = AuthzClaims::new(
            Utc::now(),
            &self.audience,
            &self.authorizing_client_id,
            enrollment.user_id(),
            &notification.enrollment_id,
        );
        let token = RequestSigner::from_enrollment(enrollment)?.sign(&claims)?;
        Ok((self.consent_url(linking_id)?, token))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Bank0Result<reqwest::Response> {
        let resp = request
            .send()
            .await
            .map_err(|e| Bank0Error::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Bank0Error::Transport(format!(
                "consent service returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ConsentApi for ConsentClient {
    async fn get_consent(
        &self,
        notification: &Notification,
        enrollment: &Enrollment,
    ) -> Bank0Result<ConsentEntity> {
        let (url, token) = self.target(notification, enrollment)?;
        debug!("GET {}", url);
        let resp = self.send(self.inner.get(url).bearer_auth(token)).await?;
        resp.json::<ConsentEntity>()
            .await
            .map_err(|e| Bank0Error::Transport(format!("invalid consent body: {}", e)))
    }

    async fn authorize(
        &self,
        notification: &Notification,
        enrollment: &Enrollment,
        authorization_details: &[AuthorizationDetail],
    ) -> Bank0Result<()> {
        let (url, token) = self.target(notification, enrollment)?;
        debug!("PATCH {} (authorize)", url);
        let body = json!({
            "status": "Authorized",
            "authorization_details": authorization_details,
        });
        self.send(self.inner.patch(url).bearer_auth(token).json(&body))
            .await?;
        info!("Consent authorized for enrollment {}", notification.enrollment_id);
        Ok(())
    }

    async fn reject(
        &self,
        notification: &Notification,
        enrollment: &Enrollment,
    ) -> Bank0Result<()> {
        let (url, token) = self.target(notification, enrollment)?;
        debug!("PATCH {} (reject)", url);
        let body = json!({ "status": "Rejected" });
        self.send(self.inner.patch(url).bearer_auth(token).json(&body))
            .await?;
        info!("Consent rejected for enrollment {}", notification.enrollment_id);
        Ok(())
    }
}

/// Language tag of the process locale, e.g. `en-US`.
fn accept_language() -> String {
    let locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty());
    language_tag(locale.as_deref())
}

/// `en_US.UTF-8` becomes `en-US`. The C/POSIX locale and anything
/// unparseable fall back to `en-US`.
fn language_tag(locale: Option<&str>) -> String {
    let tag = locale
        .and_then(|l| l.split(['.', '@']).next())
        .map(|l| l.replace('_', "-"))
        .filter(|l| {
            !l.is_empty()
                && l != "C"
                && l != "POSIX"
                && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    tag.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

fn user_agent() -> String {
    format!(
        "{}/{} {}",
        CLIENT_NAME,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    )
}

/// base64url JSON `{"name": ..., "version": ...}`
fn client_info() -> String {
    let info = json!({ "name": CLIENT_NAME, "version": env!("CARGO_PKG_VERSION") });
    URL_SAFE_NO_PAD.encode(info.to_string())
}

fn header_value(value: &str) -> Bank0Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Bank0Error::Config(e.to_string()))
}
