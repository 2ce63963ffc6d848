use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::error::ClientError;
use super::session::{Session, TokenStore};
use crate::config::ClientConfig;
use crate::types::{RefreshRequest, TokenPair};

/// A body that can be sent more than once.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<MultipartField>),
}

#[derive(Debug, Clone)]
pub enum MultipartField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        bytes: Vec<u8>,
        mime: Option<String>,
    },
}

impl MultipartField {
    fn into_form(fields: &[MultipartField]) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for field in fields {
            form = match field {
                MultipartField::Text { name, value } => form.text(name.clone(), value.clone()),
                MultipartField::File {
                    name,
                    filename,
                    bytes,
                    mime,
                } => {
                    let mut part = Part::bytes(bytes.clone()).file_name(filename.clone());
                    if let Some(mime) = mime {
                        part = part.mime_str(mime)?;
                    }
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// Everything needed to (re)send one API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path segments below the API base; each is percent-encoded on send.
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Attach the bearer token and take part in the refresh protocol.
    pub authenticated: bool,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: &[&str]) -> Self {
        Self {
            method,
            path: path.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            authenticated: true,
            retried: false,
        }
    }

    pub fn get(path: &[&str]) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: &[&str]) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: &[&str]) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: &[&str]) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = RequestBody::Json(serde_json::to_value(body).map_err(ClientError::Encode)?);
        Ok(self)
    }

    pub fn multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// No bearer token and no refresh-on-401 (login, register, refresh).
    pub fn public(mut self) -> Self {
        self.authenticated = false;
        self
    }
}

/// HTTP client that keeps the session's access token attached and recovers
/// from an expired one.
///
/// A 401 on an authenticated request triggers one refresh through
/// `POST /auth/refresh` and one replay of the request with the new token.
/// Refreshes are serialized: callers that failed with the same stale token
/// wait for the first refresh and reuse its result. When no refresh is
/// possible, or it fails, the session is cleared (notifying the store's
/// observers) and the caller gets the original 401.
#[derive(Clone)]
pub struct AuthenticatedClient {
    http: reqwest::Client,
    base_url: Url,
    store: TokenStore,
    refresh_gate: Arc<Mutex<()>>,
}

impl AuthenticatedClient {
    pub fn new(base_url: &str, store: TokenStore) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()?;
        Self::with_http(http, base_url, store)
    }

    pub fn with_http(
        http: reqwest::Client,
        base_url: &str,
        store: TokenStore,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
            store,
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Build from config; a configured `session_file` makes the session
    /// survive restarts.
    pub fn from_config(cfg: &ClientConfig) -> Result<Self, ClientError> {
        let store = match &cfg.session_file {
            Some(path) => TokenStore::persistent(path),
            None => TokenStore::in_memory(),
        };
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
            .build()?;
        Self::with_http(http, &cfg.base_url, store)
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    fn url_for(&self, path: &[String]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(path);
        Ok(url)
    }

    async fn send_once(
        &self,
        req: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .http
            .request(req.method.clone(), self.url_for(&req.path)?)
            .headers(req.headers.clone());
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &req.body {
            RequestBody::Empty => builder,
            RequestBody::Json(v) => builder.json(v),
            RequestBody::Multipart(fields) => builder.multipart(MultipartField::into_form(fields)?),
        };
        debug!(method = %req.method, path = ?req.path, retried = req.retried, "api request");
        Ok(builder.send().await?)
    }

    /// Send `req` and return the successful response, applying the refresh
    /// protocol on a first 401.
    pub async fn execute(&self, mut req: ApiRequest) -> Result<reqwest::Response, ClientError> {
        let sent_token = if req.authenticated {
            self.store.access_token()
        } else {
            None
        };
        let resp = self.send_once(&req, sent_token.as_deref()).await?;

        if resp.status() != StatusCode::UNAUTHORIZED || !req.authenticated || req.retried {
            return ensure_success(resp).await;
        }
        req.retried = true;
        let original = ClientError::from_response(resp).await;

        let Some(token) = self.recover_session(sent_token.as_deref()).await else {
            return Err(original);
        };
        let resp = self.send_once(&req, Some(&token)).await?;
        ensure_success(resp).await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ClientError> {
        let bytes = self.execute(req).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(ClientError::Decode)
    }

    pub async fn send_empty(&self, req: ApiRequest) -> Result<(), ClientError> {
        self.execute(req).await.map(drop)
    }

    /// Produce an access token worth replaying with, or `None` when the
    /// session is gone.
    async fn recover_session(&self, stale: Option<&str>) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        let session = self.store.session()?;
        if !session.access_token.is_empty() && stale != Some(session.access_token.as_str()) {
            debug!("session already refreshed by a concurrent request");
            return Some(session.access_token);
        }
        if session.refresh_token.is_empty() {
            warn!("access token rejected and no refresh token held");
            self.store.clear();
            return None;
        }

        match self.refresh_tokens(&session.refresh_token).await {
            Ok(fresh) => {
                let token = fresh.access_token.clone();
                self.store.replace(fresh);
                info!("access token refreshed");
                Some(token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed; clearing session");
                self.store.clear();
                None
            }
        }
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<Session, ClientError> {
        let req = ApiRequest::post(&["auth", "refresh"])
            .public()
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })?;
        let resp = ensure_success(self.send_once(&req, None).await?).await?;
        let bytes = resp.bytes().await?;
        let pair: TokenPair = serde_json::from_slice(&bytes).map_err(ClientError::Decode)?;
        Ok(pair.into())
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    if resp.status().is_success() {
        Ok(resp)
    } else {
        Err(ClientError::from_response(resp).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_segments_are_escaped_below_base() {
        let client =
            AuthenticatedClient::new("http://127.0.0.1:8000/api/v1", TokenStore::in_memory())
                .unwrap();
        let req = ApiRequest::delete(&["watchlists", "abc", "stocks", "M&M NS/x"]);
        let url = client.url_for(&req.path).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/api/v1/watchlists/abc/stocks/M&M%20NS%2Fx"
        );

        let trailing =
            AuthenticatedClient::new("http://h/api/v1/", TokenStore::in_memory()).unwrap();
        assert_eq!(
            trailing.url_for(&["health".to_string()]).unwrap().as_str(),
            "http://h/api/v1/health"
        );
    }

    #[test]
    fn builders_keep_bodies_replayable() {
        let req = ApiRequest::post(&["watchlists"])
            .json(&serde_json::json!({"name": "Banks"}))
            .unwrap();
        let copy = req.clone();
        assert!(matches!(copy.body, RequestBody::Json(ref v) if v["name"] == "Banks"));
        assert!(req.authenticated && !req.retried);
        assert!(!ApiRequest::post(&["auth", "login"]).public().authenticated);
    }
}
