use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use url::Url;

use super::{Body, Method, Request, Response, Transport};
use crate::config::ServerConfig;
use crate::error::{ConsoleError, ConsoleResult};

pub const CSRF_HEADER: &str = "X-CSRFToken";

/// [`Transport`] over HTTP with a cookie jar, so the server session survives
/// between requests.
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
    session_cookie: Option<String>,
}

impl HttpTransport {
    pub fn new(cfg: &ServerConfig) -> ConsoleResult<Self> {
        let base = Url::parse(&cfg.base_url)?;
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| ConsoleError::Config(e.to_string()))?;
        Ok(Self {
            client,
            base,
            session_cookie: cfg.session_cookie.clone().filter(|c| !c.trim().is_empty()),
        })
    }

    pub fn url_for(&self, request: &Request) -> ConsoleResult<Url> {
        let mut url = self.base.join(&request.path)?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> ConsoleResult<Response> {
        let url = self.url_for(&request)?;
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        if let Some(token) = &request.csrf_token {
            builder = builder.header(CSRF_HEADER, token);
        }
        if let Some(cookie) = &self.session_cookie {
            builder = builder.header(COOKIE, cookie);
        }
        builder = match &request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Form(fields) => builder.form(fields),
        };

        let resp = builder.send().await.map_err(|e| ConsoleError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await.map_err(|e| ConsoleError::Transport(e.to_string()))?;
        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}
