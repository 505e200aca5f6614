#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::extract::{Form, Path, Query};
    use axum::http::HeaderMap;
    use axum::response::Html;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use crate::api::http::HttpTransport;
    use crate::api::{decode, Request, Transport};
    use crate::config::ServerConfig;
    use crate::error::ConsoleError;

    fn header(headers: &HeaderMap, name: &str) -> Value {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    }

    async fn echo_form(headers: HeaderMap, Form(fields): Form<Vec<(String, String)>>) -> Json<Value> {
        Json(json!({
            "csrf": header(&headers, "x-csrftoken"),
            "cookie": header(&headers, "cookie"),
            "fields": fields,
        }))
    }

    async fn echo_json(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        Json(json!({
            "content_type": header(&headers, "content-type"),
            "body": body,
        }))
    }

    async fn emails_page(Query(query): Query<Vec<(String, String)>>) -> Html<String> {
        let items: String = query.iter().map(|(k, v)| format!("<li>{}={}</li>", k, v)).collect();
        Html(format!("<ul id=\"query\">{}</ul>", items))
    }

    async fn scan_status(Path(account): Path<String>) -> Json<Value> {
        Json(json!({"status": format!("running for {}", account)}))
    }

    async fn spawn_server() -> SocketAddr {
        let app = Router::new()
            .route("/email_account_add", post(echo_form))
            .route("/filters/reorder", post(echo_json))
            .route("/emails", get(emails_page))
            .route("/check_scan_status/{id}", get(scan_status));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn transport(addr: SocketAddr) -> HttpTransport {
        HttpTransport::new(&ServerConfig {
            base_url: format!("http://{}", addr),
            request_timeout_secs: 5,
            session_cookie: Some("session=abc".to_string()),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_form_post_carries_csrf_header_and_session_cookie() {
        let addr = spawn_server().await;
        let http = transport(addr);

        let request = Request::post("/email_account_add")
            .csrf("tok-123")
            .form(vec![
                ("email".to_string(), "carol@example.com".to_string()),
                ("imap_port".to_string(), "993".to_string()),
            ]);
        let resp = http.send(request).await.unwrap();

        assert_eq!(resp.status, 200);
        assert!(resp.is_json());
        let echoed: Value = decode(&resp).unwrap();
        assert_eq!(echoed["csrf"], "tok-123");
        assert_eq!(echoed["cookie"], "session=abc");
        assert_eq!(echoed["fields"], json!([["email", "carol@example.com"], ["imap_port", "993"]]));
    }

    #[tokio::test]
    async fn test_json_body_is_sent_as_json() {
        let addr = spawn_server().await;
        let http = transport(addr);

        let body = json!({"items": [{"id": "6", "order": 0}]});
        let request = Request::post("/filters/reorder").csrf("tok-123").json(&body).unwrap();
        let resp = http.send(request).await.unwrap();

        let echoed: Value = decode(&resp).unwrap();
        assert_eq!(echoed["content_type"], "application/json");
        assert_eq!(echoed["body"], body);
    }

    #[tokio::test]
    async fn test_get_sends_query_and_returns_html() {
        let addr = spawn_server().await;
        let http = transport(addr);

        let request = Request::get("/emails?page=2").set_query("account_id", "7");
        assert_eq!(
            http.url_for(&request).unwrap().as_str(),
            format!("http://{}/emails?page=2&account_id=7", addr)
        );
        let resp = http.send(request).await.unwrap();

        assert!(resp.ok());
        assert!(!resp.is_json());
        assert_eq!(resp.body, "<ul id=\"query\"><li>page=2</li><li>account_id=7</li></ul>");
    }

    #[tokio::test]
    async fn test_path_segments_reach_the_route() {
        let addr = spawn_server().await;
        let http = transport(addr);

        let resp = http.send(Request::get("/check_scan_status/42")).await.unwrap();

        let reply: crate::types::ScanStatusReply = decode(&resp).unwrap();
        assert_eq!(reply.status, "running for 42");
    }

    #[tokio::test]
    async fn test_unknown_route_is_a_status_not_an_error() {
        let addr = spawn_server().await;
        let http = transport(addr);

        let resp = http.send(Request::get("/no_such_page")).await.unwrap();

        assert_eq!(resp.status, 404);
        assert!(!resp.ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let http = transport(addr);

        let err = http.send(Request::get("/")).await.unwrap_err();

        assert!(matches!(err, ConsoleError::Transport(_)), "{:?}", err);
        assert!(err.is_remote());
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpTransport::new(&ServerConfig {
            base_url: "not a url".to_string(),
            request_timeout_secs: 5,
            session_cookie: None,
        });
        assert!(matches!(result, Err(ConsoleError::InvalidInput(_))));
    }
}
