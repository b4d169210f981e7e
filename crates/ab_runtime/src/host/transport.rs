//! Outbound HTTP seam.

use super::cookies::CookieJar;
use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::rc::Rc;
use url::Url;

/// Status and body of a completed request.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_str(&self.body).map_err(|err| TransportError::Decode(err.to_string()))
    }
}

#[derive(Clone, Debug)]
pub enum TransportError {
    /// Connection, DNS or I/O failure before a response arrived.
    Network(String),
    /// A response body that is not the expected JSON.
    Decode(String),
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::Decode(message) => write!(f, "decode error: {message}"),
        }
    }
}

impl Error for TransportError {}

pub type TransportFuture = LocalBoxFuture<'static, Result<HttpResponse, TransportError>>;

/// Same-origin HTTP with credentials. Returned futures own everything they need.
pub trait Transport {
    fn get(&self, url: Url) -> TransportFuture;

    fn post_json(&self, url: Url, body: Value) -> TransportFuture;

    /// Queue a fire-and-forget POST that may outlive the page. Returns false when no
    /// beacon mechanism is available and the caller should fall back to `post_json`.
    fn send_beacon(&self, _url: Url, _body: Value) -> bool {
        false
    }
}

/// `reqwest` backed transport. Credentials are the cookie jar's header.
pub struct HttpTransport {
    client: Client,
    cookies: Rc<dyn CookieJar>,
}

impl HttpTransport {
    pub fn new(cookies: Rc<dyn CookieJar>) -> Self {
        Self {
            client: Client::new(),
            cookies,
        }
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let mut request = self.client.request(method, url);
        let cookie_header = self.cookies.header();
        if !cookie_header.is_empty() {
            request = request.header(COOKIE, cookie_header);
        }
        request
    }
}

async fn execute(request: reqwest::RequestBuilder) -> Result<HttpResponse, TransportError> {
    let resp = request
        .send()
        .await
        .map_err(|err| TransportError::Network(err.to_string()))?;
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .map_err(|err| TransportError::Network(err.to_string()))?;
    Ok(HttpResponse { status, body })
}

impl Transport for HttpTransport {
    fn get(&self, url: Url) -> TransportFuture {
        execute(self.request(reqwest::Method::GET, url)).boxed_local()
    }

    fn post_json(&self, url: Url, body: Value) -> TransportFuture {
        let request = self
            .request(reqwest::Method::POST, url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        execute(request).boxed_local()
    }

    fn send_beacon(&self, url: Url, body: Value) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let request = self
            .request(reqwest::Method::POST, url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        drop(handle.spawn(async move {
            if let Err(err) = execute(request).await {
                log::debug!("beacon to {url} failed: {err}");
            }
        }));
        true
    }
}
