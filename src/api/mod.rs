//! Requests to the mailsieve server, one method per endpoint.
//!
//! Everything goes through a [`Transport`], so the controller can be driven
//! by a recording mock in tests and by [`http::HttpTransport`] in the console.

pub mod http;

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{ConsoleError, ConsoleResult};
use crate::metrics::Metrics;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(JsonValue),
    Form(Vec<(String, String)>),
}

/// A request as the controller sees it: a path relative to the server root.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Body,
    pub csrf_token: Option<String>,
}

impl Request {
    fn new(method: Method, target: &str) -> Self {
        // `data-content` links may already carry a query string.
        let (path, query) = match target.split_once('?') {
            Some((path, qs)) => (
                path.to_string(),
                url::form_urlencoded::parse(qs.as_bytes()).into_owned().collect(),
            ),
            None => (target.to_string(), Vec::new()),
        };
        Self {
            method,
            path,
            query,
            body: Body::Empty,
            csrf_token: None,
        }
    }

    pub fn get(target: &str) -> Self {
        Self::new(Method::Get, target)
    }

    pub fn post(target: &str) -> Self {
        Self::new(Method::Post, target)
    }

    /// Sets a query parameter, replacing any previous value.
    pub fn set_query(mut self, key: &str, value: &str) -> Self {
        self.query.retain(|(k, _)| k != key);
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> ConsoleResult<Self> {
        self.body = Body::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = Body::Form(fields);
        self
    }

    pub fn csrf(mut self, token: &str) -> Self {
        self.csrf_token = Some(token.to_string());
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Path plus query, as it would appear in a log line.
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let qs: String = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();
        format!("{}?{}", self.path, qs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl Response {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type.as_deref().map(|ct| ct.contains("json")).unwrap_or(false)
    }
}

#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: Request) -> ConsoleResult<Response>;
}

/// Decodes a JSON reply. Servers often answer failures with a non-2xx status
/// and a regular `{success: false, ...}` body, so JSON is tried first.
pub fn decode<T: DeserializeOwned>(resp: &Response) -> ConsoleResult<T> {
    match serde_json::from_str::<T>(&resp.body) {
        Ok(v) => Ok(v),
        Err(_) if !resp.ok() => Err(ConsoleError::Http {
            status: resp.status,
            body: snippet(&resp.body),
        }),
        Err(e) => Err(ConsoleError::Decode(e.to_string())),
    }
}

fn snippet(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Typed access to the server's endpoints.
pub struct ApiClient {
    transport: Rc<dyn Transport>,
    csrf_token: RefCell<Option<String>>,
    metrics: Metrics,
}

impl ApiClient {
    pub fn new(transport: Rc<dyn Transport>, metrics: Metrics) -> Self {
        Self {
            transport,
            csrf_token: RefCell::new(None),
            metrics,
        }
    }

    pub fn set_csrf_token(&self, token: Option<String>) {
        *self.csrf_token.borrow_mut() = token.filter(|t| !t.is_empty());
    }

    fn csrf_token(&self) -> ConsoleResult<String> {
        self.csrf_token.borrow().clone().ok_or(ConsoleError::MissingCsrfToken)
    }

    /// Fails like a mutating request would, without sending anything.
    pub fn require_csrf(&self) -> ConsoleResult<()> {
        self.csrf_token().map(|_| ())
    }

    /// A POST carrying the page's CSRF token.
    fn mutating(&self, path: &str) -> ConsoleResult<Request> {
        Ok(Request::post(path).csrf(&self.csrf_token()?))
    }

    pub async fn send(&self, request: Request) -> ConsoleResult<Response> {
        self.metrics.inc_requests_sent();
        tracing::debug!("{:?} {}", request.method, request.target());
        match self.transport.send(request).await {
            Ok(resp) => {
                if !resp.ok() {
                    self.metrics.inc_requests_failed();
                }
                Ok(resp)
            }
            Err(e) => {
                self.metrics.inc_requests_failed();
                Err(e)
            }
        }
    }

    async fn send_html(&self, request: Request) -> ConsoleResult<String> {
        let resp = self.send(request).await?;
        if !resp.ok() {
            return Err(ConsoleError::Http {
                status: resp.status,
                body: snippet(&resp.body),
            });
        }
        Ok(resp.body)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: Request) -> ConsoleResult<T> {
        let resp = self.send(request).await?;
        decode(&resp)
    }

    // --- pages ---

    pub async fn shell_page(&self) -> ConsoleResult<String> {
        self.send_html(Request::get("/")).await
    }

    /// A content fragment; `account` is set as the `account_id` query parameter.
    pub async fn content(&self, target: &str, account: Option<&AccountId>) -> ConsoleResult<String> {
        let mut request = Request::get(target);
        if let Some(id) = account {
            request = request.set_query("account_id", id.as_str());
        }
        self.send_html(request).await
    }

    // --- accounts ---

    pub async fn email_accounts(&self) -> ConsoleResult<EmailAccountsReply> {
        self.send_json(Request::get("/get_email_accounts")).await
    }

    pub async fn add_account(&self, fields: Vec<(String, String)>) -> ConsoleResult<ApiReply> {
        self.send_json(self.mutating("/email_account_add")?.form(fields)).await
    }

    pub async fn edit_account(&self, id: &AccountId, fields: Vec<(String, String)>) -> ConsoleResult<ApiReply> {
        let path = format!("/email_account_edit/{}", segment(id.as_str()));
        self.send_json(self.mutating(&path)?.form(fields)).await
    }

    pub async fn delete_account(&self, id: &AccountId) -> ConsoleResult<ApiReply> {
        let path = format!("/email_account_delete/{}", segment(id.as_str()));
        self.send_json(self.mutating(&path)?).await
    }

    pub async fn test_connection(&self, id: &AccountId) -> ConsoleResult<ApiReply> {
        let path = format!("/test_email_connection/{}", segment(id.as_str()));
        self.send_json(self.mutating(&path)?).await
    }

    pub async fn test_new_connection(&self, fields: Vec<(String, String)>) -> ConsoleResult<ApiReply> {
        self.send_json(self.mutating("/test_new_email_connection")?.form(fields)).await
    }

    /// The account form answers with the HTML of the page to show next.
    pub async fn submit_account_form(&self, action: &str, fields: Vec<(String, String)>) -> ConsoleResult<String> {
        self.send_html(self.mutating(action)?.form(fields)).await
    }

    // --- forms and emails ---

    pub async fn submit_form(&self, action: &str, fields: Vec<(String, String)>) -> ConsoleResult<ApiReply> {
        self.send_json(self.mutating(action)?.form(fields)).await
    }

    pub async fn toggle_address_state(&self, body: &AddressStateRequest) -> ConsoleResult<ApiReply> {
        self.send_json(self.mutating("/toggle_email_address_state")?.json(body)?).await
    }

    pub async fn delete_emails(&self, account: &AccountId) -> ConsoleResult<ApiReply> {
        let path = format!("/delete_emails/{}", segment(account.as_str()));
        self.send_json(self.mutating(&path)?).await
    }

    // --- scanning ---

    pub async fn scan_emails(&self, account: &AccountId) -> ConsoleResult<ApiReply> {
        let path = format!("/scan_emails/{}", segment(account.as_str()));
        self.send_json(self.mutating(&path)?).await
    }

    pub async fn stop_scan(&self, account: &AccountId) -> ConsoleResult<ApiReply> {
        let path = format!("/stop_scan/{}", segment(account.as_str()));
        self.send_json(self.mutating(&path)?).await
    }

    pub async fn check_scan_status(&self, account: &AccountId) -> ConsoleResult<ScanStatusReply> {
        let path = format!("/check_scan_status/{}", segment(account.as_str()));
        self.send_json(Request::get(&path)).await
    }

    pub async fn folder_counts(&self, account: &AccountId) -> ConsoleResult<FolderCountsReply> {
        let path = format!("/get_folder_counts/{}", segment(account.as_str()));
        self.send_json(Request::get(&path)).await
    }

    // --- rows ---

    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> ConsoleResult<ApiReply> {
        self.send_json(self.mutating(path)?.json(body)?).await
    }

    pub async fn post_empty(&self, path: &str) -> ConsoleResult<ApiReply> {
        self.send_json(self.mutating(path)?).await
    }

    pub fn row_path(prefix: &str, id: &RowId) -> String {
        format!("{}/{}", prefix, segment(id.as_str()))
    }

    // --- result processing ---

    pub async fn process_results(&self, body: &ProcessRequest) -> ConsoleResult<ApiReply> {
        self.send_json(self.mutating("/process_email_results")?.json(body)?).await
    }

    pub async fn stop_processing(&self, account: &AccountId) -> ConsoleResult<ApiReply> {
        let path = format!("/stop_processing/{}", segment(account.as_str()));
        self.send_json(self.mutating(&path)?).await
    }

    /// Raw status view: JSON or HTML depending on the server.
    pub async fn results_view(&self, account: &AccountId) -> ConsoleResult<Response> {
        let request = Request::get("/process_email_results_view").set_query("account_id", account.as_str());
        let resp = self.send(request).await?;
        if !resp.ok() {
            return Err(ConsoleError::Http {
                status: resp.status,
                body: snippet(&resp.body),
            });
        }
        Ok(resp)
    }

    // --- email viewer ---

    pub async fn email_ids_for_filter(&self, filter: &RowId) -> ConsoleResult<EmailIdsReply> {
        let path = format!("/get_email_ids_for_filter/{}", segment(filter.as_str()));
        self.send_json(Request::get(&path)).await
    }

    pub async fn email_ids_for_address(&self, address: &str) -> ConsoleResult<EmailIdsReply> {
        let path = format!("/get_emails_for_address_modal/{}", segment(address));
        self.send_json(Request::get(&path)).await
    }

    pub async fn email_batch(&self, body: &EmailBatchRequest) -> ConsoleResult<EmailBatchReply> {
        self.send_json(self.mutating("/get_email_data")?.json(body)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_existing_query_and_replaces_account() {
        let req = Request::get("/emails?page=2&account_id=1").set_query("account_id", "7");
        assert_eq!(req.path, "/emails");
        assert_eq!(req.query_value("page"), Some("2"));
        assert_eq!(req.query_value("account_id"), Some("7"));
        assert_eq!(req.query.len(), 2);
        assert_eq!(req.target(), "/emails?page=2&account_id=7");
    }

    #[test]
    fn decode_prefers_json_even_on_error_status() {
        let resp = Response {
            status: 400,
            content_type: Some("application/json".into()),
            body: r#"{"success": false, "error": "bad"}"#.into(),
        };
        let reply: ApiReply = decode(&resp).unwrap();
        assert_eq!(reply.failure_text(), "bad");

        let resp = Response { status: 500, content_type: None, body: "<h1>oops</h1>".into() };
        assert!(matches!(decode::<ApiReply>(&resp), Err(ConsoleError::Http { status: 500, .. })));

        let resp = Response { status: 200, content_type: None, body: "<p>".into() };
        assert!(matches!(decode::<ApiReply>(&resp), Err(ConsoleError::Decode(_))));
    }

    #[test]
    fn path_segments_are_encoded() {
        assert_eq!(ApiClient::row_path("/delete_filter", &RowId::from("a b")), "/delete_filter/a%20b");
        assert_eq!(segment("x@y.z"), "x%40y.z");
    }
}
