//! Site Client
//!
//! HTTP access to the password-protected site: session login, retrieval of
//! the page that lists the files, and per-file HEAD/GET requests.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::multipart::Form;
use reqwest::{redirect, Client, RequestBuilder, StatusCode};
use tracing::{debug, info, warn};

use super::errors::RemoteError;
use super::source::RemoteSource;
use super::types::RemoteMetadata;

/// Value of the password form's submit field
const SUBMIT_VALUE: &str = "\"Senden";

/// HTTP client for the remote site, carrying the session cookie once logged in
#[derive(Clone)]
pub struct SiteClient {
    /// Client used for page, metadata and content requests
    http_client: Client,
    /// Client used for login; redirects disabled so the 302 is observable
    login_client: Client,
    /// Site root without a trailing slash
    base_url: String,
    /// Session cookie captured at login
    cookie: Arc<RwLock<Option<String>>>,
}

impl SiteClient {
    /// Create a client for the site at `base_url`
    ///
    /// # Arguments
    /// * `base_url` - Site root, e.g. `https://example.org`
    /// * `timeout` - Per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let login_client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            login_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current session cookie, if logged in
    pub fn session_cookie(&self) -> Option<String> {
        self.cookie.read().ok().and_then(|c| c.clone())
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Attach the session cookie to a request
    fn with_session(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session_cookie() {
            Some(cookie) => request.header(COOKIE, cookie),
            None => request,
        }
    }

    /// Log in to the password-protected post
    ///
    /// The password form is posted as `multipart/form-data`, with the submit
    /// button value the site's own form sends. The site answers a correct
    /// password with a `302` and the session in `Set-Cookie`. Any other status
    /// means the password was not accepted.
    ///
    /// # Returns
    /// `true` when a session cookie was obtained
    pub async fn login(&self, password: &str, post_id: &str, login_path: &str) -> Result<bool> {
        let url = self.url_for(login_path);
        info!(url = %url, "Logging in...");

        let form = Form::new()
            .text("post_password", password.to_string())
            .text("Submit", SUBMIT_VALUE)
            .text("post_id", post_id.to_string());

        let response = self
            .login_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach login endpoint")?;

        if response.status() != StatusCode::FOUND {
            warn!(status = %response.status(), "Could not log in");
            return Ok(false);
        }

        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .collect::<Vec<_>>()
            .join("; ");

        if cookie.is_empty() {
            warn!("Login redirected without a session cookie");
            return Ok(false);
        }

        let mut state = self
            .cookie
            .write()
            .map_err(|_| anyhow!("Session state poisoned"))?;
        *state = Some(cookie);

        info!("Login successful");
        Ok(true)
    }

    /// Retrieve the HTML of the page listing the files
    pub async fn fetch_page(&self, page_path: &str) -> Result<String> {
        let url = self.url_for(page_path);
        info!(url = %url, "Retrieving page with content");

        let response = self
            .with_session(self.http_client.get(&url))
            .send()
            .await
            .with_context(|| format!("Failed to retrieve {}", url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Could not retrieve {} (status {})",
                url,
                response.status()
            ));
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;

        debug!(size = html.len(), "Retrieved page successfully");
        Ok(html)
    }
}

#[async_trait]
impl RemoteSource for SiteClient {
    async fn resolve_metadata(&self, url: &str) -> Result<RemoteMetadata, RemoteError> {
        let response = self.with_session(self.http_client.head(url)).send().await?;

        if !response.status().is_success() {
            return Err(RemoteError::from_status(response.status().as_u16(), url));
        }

        let metadata = RemoteMetadata::from_headers(response.headers());
        debug!(url = url, etag = ?metadata.etag, last_modified = ?metadata.last_modified, "Resolved metadata");
        Ok(metadata)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, RemoteError> {
        debug!(url = url, "Downloading file");

        let response = self.with_session(self.http_client.get(url)).send().await?;

        if !response.status().is_success() {
            return Err(RemoteError::from_status(response.status().as_u16(), url));
        }

        let bytes = response.bytes().await?;
        info!(url = url, size = bytes.len(), "Downloaded file");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Multipart;
    use axum::http::{header, HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::Router;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    const SESSION: &str = "wp-postpass_abc=secret";

    async fn login(mut multipart: Multipart) -> impl IntoResponse {
        let mut form = HashMap::new();
        while let Ok(Some(field)) = multipart.next_field().await {
            let name = field.name().unwrap_or_default().to_string();
            let value = field.text().await.unwrap_or_default();
            form.insert(name, value);
        }

        if form.get("post_password").map(String::as_str) == Some("hunter2")
            && form.get("post_id").map(String::as_str) == Some("35")
            && form.get("Submit").map(String::as_str) == Some("\"Senden")
        {
            (
                AxumStatus::FOUND,
                [
                    (header::LOCATION, "/page".to_string()),
                    (header::SET_COOKIE, format!("{}; path=/; HttpOnly", SESSION)),
                ],
            )
                .into_response()
        } else {
            AxumStatus::OK.into_response()
        }
    }

    fn has_session(headers: &HeaderMap) -> bool {
        headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains(SESSION))
            .unwrap_or(false)
    }

    async fn page(headers: HeaderMap) -> impl IntoResponse {
        if has_session(&headers) {
            (AxumStatus::OK, "<a href=\"/files/a.pdf\">a</a>").into_response()
        } else {
            AxumStatus::FORBIDDEN.into_response()
        }
    }

    async fn file(headers: HeaderMap) -> impl IntoResponse {
        if !has_session(&headers) {
            return AxumStatus::FORBIDDEN.into_response();
        }
        (
            AxumStatus::OK,
            [
                (header::ETAG, "\"abc-123\""),
                (header::LAST_MODIFIED, "Wed, 21 Oct 2015 07:28:00 GMT"),
            ],
            "pdf-bytes",
        )
            .into_response()
    }

    async fn start_server() -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route("/wp-login.php", post(login))
            .route("/page", get(page))
            .route("/files/a.pdf", get(file));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, handle)
    }

    fn client_for(addr: SocketAddr) -> SiteClient {
        SiteClient::new(&format!("http://{}/", addr), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_for() {
        let client = SiteClient::new("https://example.org/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://example.org");
        assert_eq!(client.url_for("/page?x=1"), "https://example.org/page?x=1");
        assert_eq!(client.url_for("page"), "https://example.org/page");
    }

    #[tokio::test]
    async fn test_login_captures_cookie() {
        let (addr, _handle) = start_server().await;
        let client = client_for(addr);

        let ok = client
            .login("hunter2", "35", "/wp-login.php?action=ppw_postpass")
            .await
            .unwrap();

        assert!(ok);
        assert_eq!(client.session_cookie().as_deref(), Some(SESSION));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let (addr, _handle) = start_server().await;
        let client = client_for(addr);

        let ok = client
            .login("wrong", "35", "/wp-login.php?action=ppw_postpass")
            .await
            .unwrap();

        assert!(!ok);
        assert!(client.session_cookie().is_none());
    }

    #[tokio::test]
    async fn test_fetch_page_requires_session() {
        let (addr, _handle) = start_server().await;
        let client = client_for(addr);

        assert!(client.fetch_page("/page").await.is_err());

        client
            .login("hunter2", "35", "/wp-login.php?action=ppw_postpass")
            .await
            .unwrap();
        let html = client.fetch_page("/page").await.unwrap();
        assert!(html.contains("a.pdf"));
    }

    #[tokio::test]
    async fn test_resolve_metadata_and_fetch() {
        let (addr, _handle) = start_server().await;
        let client = client_for(addr);
        client
            .login("hunter2", "35", "/wp-login.php?action=ppw_postpass")
            .await
            .unwrap();

        let url = format!("http://{}/files/a.pdf", addr);
        let meta = client.resolve_metadata(&url).await.unwrap();
        assert_eq!(meta.etag.as_deref(), Some("abc-123"));
        assert_eq!(
            meta.last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );

        let bytes = client.fetch_bytes(&url).await.unwrap();
        assert_eq!(bytes, b"pdf-bytes");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (addr, _handle) = start_server().await;
        let client = client_for(addr);

        let url = format!("http://{}/files/missing.pdf", addr);
        assert!(matches!(
            client.resolve_metadata(&url).await,
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(
            client.fetch_bytes(&url).await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = client_for(addr);
        let result = client.fetch_bytes(&format!("http://{}/x", addr)).await;
        assert!(matches!(result, Err(RemoteError::Network(_))));
    }
}
