//! Wire types exchanged with the mailsieve server.
//!
//! The server mixes JSON replies and HTML fragments. Everything JSON lands
//! here; HTML is handled by [`crate::page::fragment`].
//!
//! ## Main Categories
//!
//! - **Identifiers**: accounts, rows and emails, accepted as JSON strings or numbers
//! - **Replies**: the generic `{success, message|error|errors}` envelope and typed bodies
//! - **Requests**: JSON bodies posted by the row editor, scan and results controllers
//! - **States**: include/exclude actions, address states, scan and processing status

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

macro_rules! wire_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                Ok(match WireId::deserialize(deserializer)? {
                    WireId::Text(s) => Self(s),
                    WireId::Number(n) => Self(n.to_string()),
                })
            }
        }
    };
}

wire_id!(
    /// Identifier of an email account.
    AccountId
);
wire_id!(
    /// Identifier of a filter, prompt or result-file row.
    RowId
);
wire_id!(
    /// Identifier of a stored email.
    EmailId
);

/// The generic reply envelope of every mutating endpoint.
///
/// Only `success` is guaranteed; failures carry `error`, `errors` or
/// `message` depending on the endpoint. Extra fields stay in `data`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ApiReply {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(flatten)]
    pub data: Map<String, JsonValue>,
}

impl ApiReply {
    /// Text for a failure flash: `error`, else joined `errors`, else `message`.
    pub fn failure_text(&self) -> String {
        if let Some(e) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return e.to_string();
        }
        if !self.errors.is_empty() {
            return self.errors.join(", ");
        }
        self.message.clone().unwrap_or_else(|| "unknown error".to_string())
    }

    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Id of a freshly added account. The server has used all three names.
    pub fn new_account_id(&self) -> Option<AccountId> {
        ["account_id", "email_account_id", "id"]
            .iter()
            .find_map(|key| self.field::<AccountId>(key))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AccountEntry {
    pub id: AccountId,
    #[serde(default)]
    pub email: String,
}

/// Reply of `GET /get_email_accounts`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmailAccountsReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub email_accounts: Vec<AccountEntry>,
}

/// One row of the folder table: how many emails the folder holds and how
/// many of them the scan has stored so far.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct FolderCount {
    pub folder: String,
    pub email_count: u64,
    pub found_count: u64,
}

impl FolderCount {
    /// Width of the progress bar; an empty folder counts as complete.
    pub fn progress_percent(&self) -> f64 {
        if self.email_count == 0 {
            return 100.0;
        }
        (self.found_count as f64 / self.email_count as f64) * 100.0
    }
}

/// Reply of `GET /get_folder_counts/:account`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FolderCountsReply {
    #[serde(default)]
    pub folders: Vec<FolderCount>,
}

/// Reply of `GET /check_scan_status/:account`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScanStatusReply {
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Running,
    Stopping,
    Stopped,
}

impl ScanState {
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "running" => ScanState::Running,
            "stopping" => ScanState::Stopping,
            _ => ScanState::Stopped,
        }
    }

    pub fn is_running(self) -> bool {
        matches!(self, ScanState::Running)
    }
}

/// Lifecycle of a result-processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultStatus {
    NotStarted,
    Running,
    Stopping,
    Finished,
    Error,
    Other(String),
}

impl ResultStatus {
    /// Accepts the bare status or the rendered `Status: <status>` label.
    pub fn parse(text: &str) -> Self {
        let raw = text.trim();
        let raw = raw.strip_prefix("Status:").unwrap_or(raw).trim();
        match raw.to_ascii_lowercase().as_str() {
            "" | "not started" | "not_started" => ResultStatus::NotStarted,
            "started" | "processing" | "running" => ResultStatus::Running,
            "stopping" => ResultStatus::Stopping,
            "finished" => ResultStatus::Finished,
            "error" => ResultStatus::Error,
            _ => ResultStatus::Other(raw.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ResultStatus::NotStarted | ResultStatus::Finished | ResultStatus::Error)
    }

    /// Whether a finished run may have produced files worth showing.
    pub fn has_output(&self) -> bool {
        matches!(self, ResultStatus::Finished | ResultStatus::Error)
    }
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultStatus::NotStarted => f.write_str("not started"),
            ResultStatus::Running => f.write_str("processing"),
            ResultStatus::Stopping => f.write_str("stopping"),
            ResultStatus::Finished => f.write_str("finished"),
            ResultStatus::Error => f.write_str("error"),
            ResultStatus::Other(s) => f.write_str(s),
        }
    }
}

/// Structured form of the result-status view, for servers that answer
/// `GET /process_email_results_view` with JSON instead of markup.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResultsStatusReply {
    pub status: String,
    #[serde(default)]
    pub log_entry: String,
    #[serde(default)]
    pub result_files: Vec<ResultFileEntry>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ResultFileEntry {
    pub id: RowId,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "path")]
    pub url: Option<String>,
}

/// Include/exclude choice of a filter or prompt row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowAction {
    Include,
    Exclude,
}

impl RowAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RowAction::Include => "include",
            RowAction::Exclude => "exclude",
        }
    }

    /// Button class while this action is the active one.
    pub fn active_class(self) -> &'static str {
        match self {
            RowAction::Include => "btn-success",
            RowAction::Exclude => "btn-danger",
        }
    }
}

impl FromStr for RowAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Ok(RowAction::Include),
            "exclude" => Ok(RowAction::Exclude),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// State of a sender address in the addresses view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressState {
    Include,
    Ignore,
    Exclude,
}

impl AddressState {
    pub const ALL: [AddressState; 3] = [AddressState::Include, AddressState::Ignore, AddressState::Exclude];

    pub fn as_str(self) -> &'static str {
        match self {
            AddressState::Include => "include",
            AddressState::Ignore => "ignore",
            AddressState::Exclude => "exclude",
        }
    }

    pub fn active_class(self) -> &'static str {
        match self {
            AddressState::Include => "btn-success",
            AddressState::Ignore => "btn-warning",
            AddressState::Exclude => "btn-danger",
        }
    }
}

impl FromStr for AddressState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "include" => Ok(AddressState::Include),
            "ignore" => Ok(AddressState::Ignore),
            "exclude" => Ok(AddressState::Exclude),
            other => Err(format!("unknown address state '{}'", other)),
        }
    }
}

/// Body of `POST /filters`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewFilterRequest {
    pub filter: String,
    pub action: RowAction,
    pub account_id: AccountId,
}

/// Body of `POST /ai_prompts`; `id: None` creates a prompt.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromptRequest {
    pub id: Option<RowId>,
    pub account_id: AccountId,
    pub prompt_text: String,
    pub order: usize,
    pub action: RowAction,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderItem {
    pub id: RowId,
    pub order: usize,
}

/// Body of `POST /filters/reorder` and `POST /prompts/reorder`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReorderRequest {
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActionRequest {
    pub action: RowAction,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AddressStateRequest {
    pub address_id: String,
    pub new_state: AddressState,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProcessRequest {
    pub account_id: AccountId,
}

/// Reply of the two modal id queries.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmailIdsReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub email_ids: Vec<EmailId>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmailBatchRequest {
    pub email_ids: Vec<EmailId>,
}

/// One email as shown in the viewer modal.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EmailDetail {
    pub id: EmailId,
    #[serde(default)]
    pub subject: String,
    #[serde(default, alias = "from")]
    pub sender: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default, alias = "text_content")]
    pub body: String,
}

/// Reply of `POST /get_email_data`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EmailBatchReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub emails: Vec<EmailDetail>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_accept_numbers_and_strings() {
        let reply: EmailAccountsReply =
            serde_json::from_value(json!({"success": true, "email_accounts": [{"id": 7, "email": "a@b.c"}, {"id": "8"}]}))
                .unwrap();
        assert_eq!(reply.email_accounts[0].id, AccountId::from("7"));
        assert_eq!(reply.email_accounts[1].id.as_str(), "8");
        assert_eq!(reply.email_accounts[1].email, "");
    }

    #[test]
    fn failure_text_prefers_error_then_errors_then_message() {
        let r: ApiReply = serde_json::from_value(json!({"success": false, "error": "boom", "message": "m"})).unwrap();
        assert_eq!(r.failure_text(), "boom");
        let r: ApiReply = serde_json::from_value(json!({"success": false, "errors": ["a", "b"]})).unwrap();
        assert_eq!(r.failure_text(), "a, b");
        let r: ApiReply = serde_json::from_value(json!({"success": false, "message": "nope"})).unwrap();
        assert_eq!(r.failure_text(), "nope");
        let r: ApiReply = serde_json::from_value(json!({"success": false})).unwrap();
        assert_eq!(r.failure_text(), "unknown error");
    }

    #[test]
    fn new_account_id_reads_any_known_field() {
        for key in ["account_id", "email_account_id", "id"] {
            let r: ApiReply = serde_json::from_value(json!({"success": true, key: 12})).unwrap();
            assert_eq!(r.new_account_id(), Some(AccountId::from("12")), "field {}", key);
        }
        let r: ApiReply = serde_json::from_value(json!({"success": true})).unwrap();
        assert_eq!(r.new_account_id(), None);
    }

    #[test]
    fn folder_progress() {
        let f = FolderCount { folder: "INBOX".into(), email_count: 200, found_count: 50 };
        assert_eq!(f.progress_percent(), 25.0);
        let empty = FolderCount { folder: "Spam".into(), email_count: 0, found_count: 0 };
        assert_eq!(empty.progress_percent(), 100.0);
    }

    #[test]
    fn result_status_parsing() {
        assert_eq!(ResultStatus::parse("Status: finished"), ResultStatus::Finished);
        assert_eq!(ResultStatus::parse("Status: not started"), ResultStatus::NotStarted);
        assert_eq!(ResultStatus::parse("processing"), ResultStatus::Running);
        assert_eq!(ResultStatus::parse(" Status: stopping "), ResultStatus::Stopping);
        assert_eq!(ResultStatus::parse("Status: weird"), ResultStatus::Other("weird".into()));
        assert!(ResultStatus::parse("Status: error").is_terminal());
        assert!(!ResultStatus::parse("Status: started").is_terminal());
        assert!(!ResultStatus::Other("x".into()).is_terminal());
    }

    #[test]
    fn scan_state_only_running_is_running() {
        assert!(ScanState::from_wire("running").is_running());
        assert!(!ScanState::from_wire("stopping").is_running());
        assert_eq!(ScanState::from_wire("stopped"), ScanState::Stopped);
    }

    #[test]
    fn request_bodies_serialize_like_the_server_expects() {
        let body = NewFilterRequest { filter: "invoice".into(), action: RowAction::Include, account_id: "3".into() };
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({"filter": "invoice", "action": "include", "account_id": "3"}));
        let prompt = PromptRequest {
            id: None,
            account_id: "3".into(),
            prompt_text: "is it spam?".into(),
            order: 2,
            action: RowAction::Include,
        };
        assert_eq!(
            serde_json::to_value(&prompt).unwrap(),
            json!({"id": null, "account_id": "3", "prompt_text": "is it spam?", "order": 2, "action": "include"})
        );
    }
}
