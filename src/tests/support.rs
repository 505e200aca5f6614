//! Shared fixtures: a recording transport, manual ticks and server pages.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::api::{Body, Method, Request, Response, Transport};
use crate::config::AppConfig;
use crate::controller::{Command, Controller};
use crate::error::ConsoleResult;
use crate::metrics::Metrics;
use crate::page::flash::FlashCategory;
use crate::page::{AI_PROMPTS_ITEM, FILTERS_ITEM};
use crate::poller::{PollKind, TickSource};

/// Answers requests from per-route queues and records every request.
/// The last queued response of a route keeps being served.
#[derive(Default)]
pub struct MockTransport {
    routes: RefCell<HashMap<(Method, String), VecDeque<Response>>>,
    pub requests: RefCell<Vec<Request>>,
}

impl MockTransport {
    fn push(&self, method: Method, path: &str, resp: Response) {
        self.routes
            .borrow_mut()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(resp);
    }

    pub fn html(&self, path: &str, body: &str) {
        self.push(
            Method::Get,
            path,
            Response {
                status: 200,
                content_type: Some("text/html; charset=utf-8".into()),
                body: body.to_string(),
            },
        );
    }

    pub fn get_json(&self, path: &str, body: Value) {
        self.push(Method::Get, path, json_response(200, body));
    }

    pub fn post_json(&self, path: &str, body: Value) {
        self.push(Method::Post, path, json_response(200, body));
    }

    pub fn post_html(&self, path: &str, body: &str) {
        self.push(
            Method::Post,
            path,
            Response {
                status: 200,
                content_type: Some("text/html".into()),
                body: body.to_string(),
            },
        );
    }

    pub fn post_status(&self, path: &str, status: u16, body: &str) {
        self.push(
            Method::Post,
            path,
            Response {
                status,
                content_type: None,
                body: body.to_string(),
            },
        );
    }

    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.requests.borrow().iter().filter(|r| r.path == path).cloned().collect()
    }

    pub fn posts(&self) -> Vec<Request> {
        self.requests.borrow().iter().filter(|r| r.method == Method::Post).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn clear(&self) {
        self.requests.borrow_mut().clear();
    }
}

fn json_response(status: u16, body: Value) -> Response {
    Response {
        status,
        content_type: Some("application/json".into()),
        body: body.to_string(),
    }
}

#[async_trait(?Send)]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> ConsoleResult<Response> {
        let key = (request.method, request.path.clone());
        self.requests.borrow_mut().push(request);
        let mut routes = self.routes.borrow_mut();
        let resp = match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };
        Ok(resp.unwrap_or(Response {
            status: 404,
            content_type: Some("text/html".into()),
            body: "<h1>Not Found</h1>".into(),
        }))
    }
}

/// Records spawned loops instead of running timers; tests deliver ticks
/// by calling `Controller::on_tick`.
#[derive(Clone, Default)]
pub struct ManualTicks {
    pub spawned: Rc<RefCell<Vec<(PollKind, Duration, CancellationToken)>>>,
}

impl ManualTicks {
    pub fn spawned_count(&self, kind: PollKind) -> usize {
        self.spawned.borrow().iter().filter(|(k, _, _)| *k == kind).count()
    }

    pub fn live_tokens(&self, kind: PollKind) -> usize {
        self.spawned
            .borrow()
            .iter()
            .filter(|(k, _, c)| *k == kind && !c.is_cancelled())
            .count()
    }
}

impl TickSource for ManualTicks {
    fn spawn(&self, kind: PollKind, every: Duration, cancel: CancellationToken) {
        self.spawned.borrow_mut().push((kind, every, cancel));
    }
}

pub struct Harness {
    pub controller: Controller,
    pub server: Rc<MockTransport>,
    pub ticks: ManualTicks,
    pub answer: Rc<Cell<bool>>,
    pub questions: Rc<RefCell<Vec<String>>>,
}

/// A controller over a mock server that already serves the shell (account
/// "1" selected, CSRF token present) and the Email Accounts section.
pub fn harness() -> Harness {
    harness_with_shell(SHELL)
}

/// The full shell with an empty account select; the server knows no accounts.
pub fn harness_without_accounts() -> Harness {
    let shell = SHELL
        .replace(r#"<option value="1" selected>alice@example.com</option>"#, "")
        .replace(r#"<option value="2">bob@example.com</option>"#, "");
    let h = harness_with_shell(&shell);
    h.server
        .get_json("/get_email_accounts", serde_json::json!({"success": true, "email_accounts": []}));
    h
}

pub fn harness_with_shell(shell: &str) -> Harness {
    let server = Rc::new(MockTransport::default());
    server.html("/", shell);
    server.html("/email_accounts", ACCOUNTS);

    let ticks = ManualTicks::default();
    let answer = Rc::new(Cell::new(true));
    let questions = Rc::new(RefCell::new(Vec::new()));
    let confirm = {
        let answer = answer.clone();
        let questions = questions.clone();
        move |q: &str| {
            questions.borrow_mut().push(q.to_string());
            answer.get()
        }
    };
    let transport: Rc<dyn Transport> = server.clone();
    let controller = Controller::new(
        transport,
        Box::new(ticks.clone()),
        Box::new(confirm),
        &AppConfig::default(),
        Metrics::new(),
    );
    Harness {
        controller,
        server,
        ticks,
        answer,
        questions,
    }
}

impl Harness {
    pub async fn boot(&self) {
        self.controller.bootstrap().await.unwrap();
    }

    /// Boots, then opens a sidebar section served with `html`.
    pub async fn open(&self, item: &str, path: &str, html: &str) {
        self.boot().await;
        self.server.html(path, html);
        self.controller.dispatch(Command::Navigate(item.to_string())).await.unwrap();
    }

    pub async fn open_emails(&self) {
        self.server
            .get_json("/get_folder_counts/1", serde_json::json!({"folders": [{"folder": "INBOX", "email_count": 10, "found_count": 4}]}));
        self.open("emails-item", "/emails", EMAILS).await;
    }

    pub async fn open_filters(&self) {
        self.open(FILTERS_ITEM, "/filters", FILTERS).await;
    }

    pub async fn open_prompts(&self) {
        self.open(AI_PROMPTS_ITEM, "/ai_prompts", PROMPTS).await;
    }

    pub async fn open_results(&self, html: &str) {
        self.open("results-item", "/process_email_results", html).await;
    }

    pub async fn run(&self, command: Command) -> ConsoleResult<()> {
        self.controller.dispatch(command).await
    }

    pub fn last_flash(&self) -> Option<(FlashCategory, String)> {
        self.controller
            .with_page(|p| p.flashes.last().map(|m| (m.category, m.text.clone())))
    }

    pub fn json_body(request: &Request) -> Value {
        match &request.body {
            Body::Json(v) => v.clone(),
            other => panic!("expected a JSON body, got {:?}", other),
        }
    }

    pub fn form_body(request: &Request) -> Vec<(String, String)> {
        match &request.body {
            Body::Form(f) => f.clone(),
            other => panic!("expected a form body, got {:?}", other),
        }
    }
}

pub const SHELL: &str = r#"<!DOCTYPE html>
<html><head><title>mailsieve</title></head><body>
<nav class="navbar">
  <select id="emailAccountSelect">
    <option value="1" selected>alice@example.com</option>
    <option value="2">bob@example.com</option>
  </select>
  <input type="hidden" name="csrf_token" value="tok-123">
</nav>
<div id="sidebar" class="list-group">
  <div class="list-group-item" id="email-accounts-item"><a class="load-content" data-content="/email_accounts">Email Accounts</a></div>
  <div class="list-group-item" id="emails-item"><a class="load-content" data-content="/emails">Emails</a></div>
  <div class="list-group-item" id="filters-item"><a class="load-content" data-content="/filters">Filters</a></div>
  <div class="list-group-item" id="ai-prompts-item"><a class="load-content" data-content="/ai_prompts">AI Prompts</a></div>
  <div class="list-group-item" id="results-item"><a class="load-content" data-content="/process_email_results">Results</a></div>
  <div class="list-group-item" id="dates-item"><a class="load-content" data-content="/dates">Dates</a></div>
  <div class="list-group-item" id="words-item"><a class="load-content" data-content="/words?tab=main">Words</a></div>
</div>
<div id="contentPane"><p>Loading...</p></div>
</body></html>"#;

/// Shell whose account select is empty and which carries no CSRF token.
pub const BARE_SHELL: &str = r#"<html><body>
<select id="emailAccountSelect"></select>
<div id="sidebar">
  <div class="list-group-item" id="email-accounts-item"><a class="load-content" data-content="/email_accounts">Email Accounts</a></div>
</div>
<div id="contentPane"></div>
</body></html>"#;

pub const ACCOUNTS: &str = r#"<h2>Email Accounts</h2>
<button id="addAccountButton">Add account</button>
<table class="table"><tbody>
  <tr><td>alice@example.com</td><td>
    <a class="view-account" data-account-id="1">View</a>
    <a class="edit-account" data-account-id="1">Edit</a></td></tr>
  <tr><td>bob@example.com</td><td>
    <a class="view-account" data-account-id="2">View</a>
    <a class="edit-account" data-account-id="2">Edit</a></td></tr>
</tbody></table>"#;

pub const ACCOUNT_ADD: &str = r#"<form id="emailAccountForm" action="/email_account_add" method="post">
  <input type="text" name="email" value="">
  <select name="email_type">
    <option value="OTHER" selected>Other</option>
    <option value="GMAIL">Gmail</option>
    <option value="APPLE">Apple</option>
  </select>
  <input type="text" name="imap_server" value="">
  <input type="text" name="imap_port" value="">
  <input type="checkbox" name="imap_use_ssl" value="y">
  <input type="password" name="password" value="">
</form>
<button id="submitAddAccountButton">Add</button>
<button id="testNewConnectionButton">Test connection</button>"#;

pub const ACCOUNT_EDIT: &str = r#"<form id="emailAccountForm" action="/email_account_edit/2" method="post">
  <input type="text" name="email" value="bob@example.com">
  <input type="text" name="imap_server" value="imap.example.com">
</form>
<button id="submitEditAccountButton" data-account-id="2">Save</button>"#;

pub const ACCOUNT_VIEW: &str = r#"<h2>bob@example.com</h2>
<button id="testConnectionButton" data-account-id="2">Test connection</button>"#;

pub const EMAILS: &str = r#"<h2>Emails</h2>
<button id="scanEmailsButton">Scan</button>
<button id="stopButton" style="display: none">Stop</button>
<span id="runningIndicator" style="display: none">Scanning...</span>
<label><input type="checkbox" id="liveUpdateToggle"> Live update</label>
<button id="deleteEmailsButton">Clear emails</button>
<table id="emailFolderTable"><tbody>
  <tr><td>INBOX</td><td>0</td><td>0</td></tr>
</tbody></table>
<table><tbody>
  <tr><td>news@shop.example</td><td>
    <button class="toggle-state btn-success" data-address-id="11" data-new-state="include">Include</button>
    <button class="toggle-state btn-secondary" data-address-id="11" data-new-state="ignore">Ignore</button>
    <button class="toggle-state btn-secondary" data-address-id="11" data-new-state="exclude">Exclude</button>
  </td></tr>
  <tr><td>boss@work.example</td><td>
    <button class="toggle-state btn-secondary" data-address-id="12" data-new-state="include">Include</button>
    <button class="toggle-state btn-secondary" data-address-id="12" data-new-state="ignore">Ignore</button>
    <button class="toggle-state btn-danger" data-address-id="12" data-new-state="exclude">Exclude</button>
  </td></tr>
</tbody></table>"#;

pub const FILTERS: &str = r#"<h2>Filters</h2>
<table><tbody id="filtersTableBody">
  <tr data-filter-id="5"><td class="filter-text">invoice</td><td class="filter-email-count">3</td><td>
    <button class="filter-action-toggle btn-success" data-action="include">Include</button>
    <button class="filter-action-toggle btn-secondary" data-action="exclude">Exclude</button></td></tr>
  <tr data-filter-id="6"><td class="filter-text">newsletter</td><td class="filter-email-count">12</td><td>
    <button class="filter-action-toggle btn-secondary" data-action="include">Include</button>
    <button class="filter-action-toggle btn-danger" data-action="exclude">Exclude</button></td></tr>
  <tr data-filter-id="7"><td class="filter-text">receipt</td><td class="filter-email-count">0</td><td>
    <button class="filter-action-toggle btn-success" data-action="include">Include</button>
    <button class="filter-action-toggle btn-secondary" data-action="exclude">Exclude</button></td></tr>
</tbody></table>"#;

pub const PROMPTS: &str = r#"<h2>AI Prompts</h2>
<table><tbody id="promptsTableBody">
  <tr data-id="21"><td><textarea class="prompt-text">Summarize the email</textarea></td><td>
    <button class="prompt-action-toggle btn-success" data-action="include">Include</button>
    <button class="prompt-action-toggle btn-secondary" data-action="exclude">Exclude</button></td></tr>
  <tr data-id="22"><td><textarea class="prompt-text">Is this spam?</textarea></td><td>
    <button class="prompt-action-toggle btn-secondary" data-action="include">Include</button>
    <button class="prompt-action-toggle btn-danger" data-action="exclude">Exclude</button></td></tr>
</tbody></table>"#;

pub const RESULTS_IDLE: &str = r#"<h2>Results</h2>
<button id="processResultsButton">Process results</button>
<button id="stopProcessingButton" style="display: none">Stop</button>
<span id="processingIndicator" style="display: none">Processing...</span>
<label><input type="checkbox" id="liveResultsUpdateToggle"> Live update</label>
<div id="processResultsStatus">Status: not started</div>
<textarea id="processResultsLog"></textarea>
<table id="resultsFilesTable" style="display: none"><tbody></tbody></table>"#;

pub const RESULTS_FINISHED: &str = r#"<h2>Results</h2>
<button id="processResultsButton">Process results</button>
<button id="stopProcessingButton" style="display: none">Stop</button>
<span id="processingIndicator" style="display: none">Processing...</span>
<label><input type="checkbox" id="liveResultsUpdateToggle"> Live update</label>
<div id="processResultsStatus">Status: finished</div>
<textarea id="processResultsLog">done</textarea>
<table id="resultsFilesTable"><tbody>
  <tr data-file-id="31"><td><a href="/download/31">results.csv</a></td></tr>
  <tr data-file-id="32"><td><a href="/download/32">summary.txt</a></td></tr>
</tbody></table>"#;

/// A results page rendered while a run is in progress, toggle already on.
pub const RESULTS_RUNNING: &str = r#"<button id="processResultsButton" disabled>Process results</button>
<button id="stopProcessingButton">Stop</button>
<span id="processingIndicator">Processing...</span>
<input type="checkbox" id="liveResultsUpdateToggle" checked>
<div id="processResultsStatus">Status: processing</div>
<textarea id="processResultsLog">step 1</textarea>"#;

pub const DATES: &str = r#"<form id="datesForm" action="/dates">
  <input type="checkbox" name="limit_dates" id="limitDates" value="y">
  <div id="dateSelectors" style="display: none">
    <input type="date" name="start_date" id="start_date" value="">
    <input type="date" name="end_date" id="end_date" value="">
  </div>
  <button type="submit">Save</button>
</form>"#;

pub const WORDS: &str = r#"<form id="wordsForm" action="/words">
  <textarea name="words">alpha
beta</textarea>
  <button type="submit">Save</button>
</form>"#;
