use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE,
};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::download::{filename_from_disposition, Attachment, AttachmentSink};
use super::error::RequestError;
use super::response::{error_message, parse_body, Envelope};
use super::session::SessionCapability;
use crate::config::PageConfig;

const ACCESS_KEY_HEADER: &str = "x-access-key";

/// Per-call factory. Holds only what every call shares: the HTTP pool, config and session.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: PageConfig,
    session: Arc<dyn SessionCapability>,
}

impl ApiClient {
    pub fn new(config: PageConfig, session: Arc<dyn SessionCapability>) -> Self {
        Self::with_http_client(Client::new(), config, session)
    }

    pub fn with_http_client(
        http: Client,
        config: PageConfig,
        session: Arc<dyn SessionCapability>,
    ) -> Self {
        Self {
            http,
            config,
            session,
        }
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    /// Start describing one call to `path` under the configured base URL.
    pub fn request(&self, method: Method, path: &str) -> Request {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Request {
            http: self.http.clone(),
            session: Arc::clone(&self.session),
            url: format!("{}{}", self.config.api_base(), path),
            method,
            path: path.to_string(),
            headers,
            body: None,
            timeout: self.config.request_timeout(),
            silent: false,
            invalid_header: None,
        }
    }

    pub fn get(&self, path: &str) -> Request {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> Request {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> Request {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> Request {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> Request {
        self.request(Method::DELETE, path)
    }
}

/// Immutable description of one outgoing call. Every builder step consumes the
/// descriptor and returns the next one, so a sent descriptor cannot be reused.
#[derive(Clone)]
pub struct Request {
    http: Client,
    session: Arc<dyn SessionCapability>,
    method: Method,
    path: String,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    timeout: Duration,
    silent: bool,
    /// First header rejected while building; raised when the call is made.
    invalid_header: Option<String>,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Set a header, replacing any previous value for the same name.
    ///
    /// An invalid name or value is not sent; the call fails with `InvalidHeader` instead.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => {
                debug!("rejecting invalid header {}", name);
                self.invalid_header.get_or_insert_with(|| name.to_string());
            }
        }
        self
    }

    /// Attach a credential. Elevated sessions send it as a bearer token,
    /// everyone else as an access key.
    pub fn token(self, token: &str) -> Self {
        if self.session.is_admin() {
            let bearer = format!("Bearer {}", token);
            self.header(AUTHORIZATION.as_str(), &bearer)
        } else {
            self.header(ACCESS_KEY_HEADER, token)
        }
    }

    /// Serialize `payload` as the JSON body.
    pub fn body<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self, RequestError> {
        self.body = Some(Bytes::from(serde_json::to_vec(payload)?));
        Ok(self)
    }

    /// Mark failures as not for display. Classification and logging are unchanged.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn send(self) -> Result<Envelope<Value>, RequestError> {
        self.send_with(|data| data).await
    }

    /// Execute the call and wrap the body into an envelope, running `transform` over `data`.
    pub async fn send_with<T>(
        self,
        transform: impl FnOnce(Value) -> T,
    ) -> Result<Envelope<T>, RequestError> {
        if let Err(e) = self.check_headers() {
            self.report("send", &e);
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let _timer = TimeoutGuard::arm(cancel.clone(), self.timeout);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RequestError::Timeout),
            outcome = self.fetch_json() => outcome,
        };

        match result {
            Ok(body) => Ok(Envelope::from_body(body).map(transform)),
            Err(e) => {
                self.report("send", &e);
                Err(e)
            }
        }
    }

    /// Fetch a binary attachment and hand it to `sink`.
    ///
    /// Any status other than 200 yields `Ok(None)` without reading the body or touching the sink.
    pub async fn download(self, sink: &dyn AttachmentSink) -> Result<Option<PathBuf>, RequestError> {
        if let Err(e) = self.check_headers() {
            self.report("download", &e);
            return Err(e);
        }

        let cancel = CancellationToken::new();
        let _timer = TimeoutGuard::arm(cancel.clone(), self.timeout);

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RequestError::Timeout),
            outcome = self.fetch_attachment() => outcome,
        };

        let attachment = match fetched {
            Ok(Some(attachment)) => attachment,
            Ok(None) => return Ok(None),
            Err(e) => {
                self.report("download", &e);
                return Err(e);
            }
        };

        match sink.save(&attachment) {
            Ok(path) => Ok(Some(path)),
            Err(e) => {
                let e = RequestError::Save(e);
                self.report("download", &e);
                Err(e)
            }
        }
    }

    fn check_headers(&self) -> Result<(), RequestError> {
        match &self.invalid_header {
            Some(name) => Err(RequestError::InvalidHeader { name: name.clone() }),
            None => Ok(()),
        }
    }

    fn build(&self) -> RequestBuilder {
        let mut req = self
            .http
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            req = req.body(body.clone());
        }
        req
    }

    async fn fetch_json(&self) -> Result<Value, RequestError> {
        let resp = self.build().send().await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let text = resp.text().await?;
        let body = parse_body(&content_type, &text);

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                message: error_message(&body, status.as_u16()),
            });
        }
        Ok(body)
    }

    async fn fetch_attachment(&self) -> Result<Option<Attachment>, RequestError> {
        let resp = self.build().send().await?;

        if resp.status() != StatusCode::OK {
            debug!(
                "download {} skipped: HTTP {}",
                self.path,
                resp.status().as_u16()
            );
            return Ok(None);
        }

        let filename = filename_from_disposition(
            resp.headers()
                .get(CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
        );
        let bytes = resp.bytes().await?;
        Ok(Some(Attachment { filename, bytes }))
    }

    fn report(&self, op: &str, err: &RequestError) {
        error!(
            op,
            method = %self.method,
            path = %self.path,
            silent = self.silent,
            message = %err
        );
    }
}

/// Cancels the call's token once the budget runs out; disarmed when dropped.
struct TimeoutGuard {
    timer: JoinHandle<()>,
}

impl TimeoutGuard {
    fn arm(cancel: CancellationToken, after: Duration) -> Self {
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            cancel.cancel();
        });
        Self { timer }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
