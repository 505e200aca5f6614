//! The page model: what the user currently sees.
//!
//! `Page` holds the shell (CSRF token, account select, sidebar, spinner,
//! flash container) and the content pane. The content pane is replaced
//! wholesale on every navigation; its [`Components`] are re-derived from the
//! new markup by [`fragment::parse_content`].

pub mod flash;
pub mod fragment;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::types::{
    AccountId, AddressState, EmailDetail, EmailId, FolderCount, ResultStatus, RowAction, RowId,
};
use flash::Flashes;

pub const EMAIL_ACCOUNTS_ITEM: &str = "email-accounts-item";
pub const FILTERS_ITEM: &str = "filters-item";
pub const AI_PROMPTS_ITEM: &str = "ai-prompts-item";

/// Fixed page size of the email viewer.
pub const EMAIL_BATCH_SIZE: usize = 10;

/// A content-local component. Commands addressed to a component require it to
/// be bound, i.e. present in the current content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    AccountList,
    AccountForm,
    AccountView,
    FolderTable,
    ScanPanel,
    ClearEmails,
    AddressGroups,
    Filters,
    Prompts,
    ResultsPanel,
    ResultFiles,
    Forms,
    DateRange,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Component::AccountList => "account list",
            Component::AccountForm => "account form",
            Component::AccountView => "account view",
            Component::FolderTable => "folder table",
            Component::ScanPanel => "scan panel",
            Component::ClearEmails => "clear emails button",
            Component::AddressGroups => "address list",
            Component::Filters => "filters table",
            Component::Prompts => "prompts table",
            Component::ResultsPanel => "results panel",
            Component::ResultFiles => "result files list",
            Component::Forms => "form",
            Component::DateRange => "date range",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavEntry {
    pub item_id: String,
    pub url: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountOption {
    pub id: AccountId,
    pub label: String,
}

impl AccountOption {
    /// The address part of the label, without any `(start - end)` suffix.
    pub fn email(&self) -> &str {
        self.label.split_whitespace().next().unwrap_or("")
    }
}

/// The navbar account select control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountSelect {
    pub value: Option<AccountId>,
    pub options: Vec<AccountOption>,
}

impl AccountSelect {
    pub fn option_mut(&mut self, id: &AccountId) -> Option<&mut AccountOption> {
        self.options.iter_mut().find(|o| &o.id == id)
    }

    /// Selects `id`, adding an option for it if the control lacks one.
    pub fn set_value(&mut self, id: &AccountId) {
        if self.option_mut(id).is_none() {
            self.options.push(AccountOption {
                id: id.clone(),
                label: id.to_string(),
            });
        }
        self.value = Some(id.clone());
    }
}

/// Which checkbox-driven loop a toggle controls, and when its label last pulsed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveToggle {
    pub checked: bool,
    pub pulsed_at: Option<DateTime<Utc>>,
}

impl LiveToggle {
    pub fn pulse(&mut self, now: DateTime<Utc>) {
        self.pulsed_at = Some(now);
    }

    pub fn is_lit(&self, now: DateTime<Utc>, pulse_ms: u64) -> bool {
        match self.pulsed_at {
            Some(at) => (now - at).num_milliseconds() < pulse_ms as i64,
            None => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanPanel {
    pub scan_button_disabled: bool,
    pub stop_button_visible: bool,
    /// `None` when the content has no running indicator at all.
    pub running_indicator: Option<bool>,
    pub live: LiveToggle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsPanel {
    pub status_text: String,
    pub status: ResultStatus,
    pub log: String,
    pub process_button_disabled: bool,
    pub running_indicator: bool,
    pub stop_button_visible: bool,
    pub live: LiveToggle,
    pub files_table_visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultFileRow {
    pub id: RowId,
    pub name: String,
    pub download_url: Option<String>,
    pub deleted: bool,
}

/// A filter or prompt row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub id: RowId,
    pub text: String,
    /// Text as last loaded from the server.
    pub default_text: String,
    pub action: Option<RowAction>,
    pub email_count: Option<u64>,
}

impl ListRow {
    pub fn is_dirty(&self) -> bool {
        self.text != self.default_text
    }

    /// Whether `action`'s button is the highlighted one.
    pub fn is_active(&self, action: RowAction) -> bool {
        self.action == Some(action)
    }
}

/// An unsaved row appended by Add.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRow {
    pub text: String,
    pub action: RowAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowList {
    pub rows: Vec<ListRow>,
    pub draft: Option<DraftRow>,
}

impl RowList {
    pub fn position(&self, id: &RowId) -> Option<usize> {
        self.rows.iter().position(|r| &r.id == id)
    }

    pub fn row_mut(&mut self, id: &RowId) -> Option<&mut ListRow> {
        self.rows.iter_mut().find(|r| &r.id == id)
    }
}

/// One include/ignore/exclude button group of the addresses view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressGroup {
    pub address_id: String,
    pub address: String,
    pub state: Option<AddressState>,
}

impl AddressGroup {
    pub fn is_active(&self, state: AddressState) -> bool {
        self.state == Some(state)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    Words,
    Dates,
    AiPrompts,
    EditJob,
    EmailAccount,
}

impl FormKind {
    /// Endpoint the form posts to when it does not post to its own action.
    pub fn fixed_endpoint(self) -> Option<&'static str> {
        match self {
            FormKind::Words => Some("/words"),
            FormKind::Dates => Some("/dates"),
            FormKind::AiPrompts => Some("/ai_prompts"),
            FormKind::EditJob | FormKind::EmailAccount => None,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FormKind::Words => "words",
            FormKind::Dates => "dates",
            FormKind::AiPrompts => "ai-prompts",
            FormKind::EditJob => "edit-job",
            FormKind::EmailAccount => "account",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub kind: FormKind,
    pub action: String,
    pub fields: Vec<FormField>,
}

impl Form {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }

    pub fn set(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value.to_string(),
            None => self.fields.push(FormField {
                name: name.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| f.name != name);
    }

    /// Name/value pairs as a browser would submit them.
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.fields.iter().map(|f| (f.name.clone(), f.value.clone())).collect()
    }

    pub fn endpoint(&self) -> &str {
        self.kind.fixed_endpoint().unwrap_or(&self.action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFormMode {
    Add,
    Edit(AccountId),
    /// A form without add/edit submit buttons; it posts to its own action.
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountForm {
    pub mode: AccountFormMode,
    pub form: Form,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRow {
    pub id: AccountId,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    /// `name` of the `limitDates` checkbox, if it has one.
    pub field_name: Option<String>,
    pub limit: bool,
    pub required: bool,
    pub selectors_visible: bool,
}

/// Everything the current content pane offers to commands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Components {
    pub account_list: Option<Vec<AccountRow>>,
    pub account_form: Option<AccountForm>,
    /// Id of the account shown by the view page.
    pub account_view: Option<AccountId>,
    pub folder_table: Option<Vec<FolderCount>>,
    pub scan_panel: Option<ScanPanel>,
    pub clear_emails: bool,
    pub address_groups: Vec<AddressGroup>,
    pub filters: Option<RowList>,
    pub prompts: Option<RowList>,
    pub results_panel: Option<ResultsPanel>,
    pub result_files: Option<Vec<ResultFileRow>>,
    pub forms: Vec<Form>,
    pub date_range: Option<DateRange>,
}

impl Components {
    pub fn bound(&self) -> BTreeSet<Component> {
        let mut set = BTreeSet::new();
        let mut bind = |present: bool, c: Component| {
            if present {
                set.insert(c);
            }
        };
        bind(self.account_list.is_some(), Component::AccountList);
        bind(self.account_form.is_some(), Component::AccountForm);
        bind(self.account_view.is_some(), Component::AccountView);
        bind(self.folder_table.is_some(), Component::FolderTable);
        bind(self.scan_panel.is_some(), Component::ScanPanel);
        bind(self.clear_emails, Component::ClearEmails);
        bind(!self.address_groups.is_empty(), Component::AddressGroups);
        bind(self.filters.is_some(), Component::Filters);
        bind(self.prompts.is_some(), Component::Prompts);
        bind(self.results_panel.is_some(), Component::ResultsPanel);
        bind(self.result_files.is_some(), Component::ResultFiles);
        bind(!self.forms.is_empty(), Component::Forms);
        bind(self.date_range.is_some(), Component::DateRange);
        set
    }

    pub fn form(&self, kind: FormKind) -> Option<&Form> {
        self.forms.iter().find(|f| f.kind == kind)
    }

    pub fn form_mut(&mut self, kind: FormKind) -> Option<&mut Form> {
        self.forms.iter_mut().find(|f| f.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    pub html: String,
    pub components: Components,
}

impl Content {
    pub fn from_html(html: String) -> Self {
        let components = fragment::parse_content(&html);
        Self { html, components }
    }
}

/// Where the viewer's id list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalSource {
    Filter(RowId),
    Address(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailModal {
    pub source: ModalSource,
    pub ids: Vec<EmailId>,
    pub batch: usize,
    pub emails: Vec<EmailDetail>,
    pub selected: Option<usize>,
}

impl EmailModal {
    pub fn new(source: ModalSource, ids: Vec<EmailId>) -> Self {
        Self {
            source,
            ids,
            batch: 0,
            emails: Vec::new(),
            selected: None,
        }
    }

    pub fn batch_count(&self) -> usize {
        self.ids.len().div_ceil(EMAIL_BATCH_SIZE)
    }

    pub fn slice(&self, batch: usize) -> &[EmailId] {
        let start = (batch * EMAIL_BATCH_SIZE).min(self.ids.len());
        let end = (start + EMAIL_BATCH_SIZE).min(self.ids.len());
        &self.ids[start..end]
    }

    pub fn previous_disabled(&self) -> bool {
        self.batch == 0
    }

    pub fn next_disabled(&self) -> bool {
        (self.batch + 1) * EMAIL_BATCH_SIZE >= self.ids.len()
    }

    pub fn selected_email(&self) -> Option<&EmailDetail> {
        self.selected.and_then(|i| self.emails.get(i))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub csrf_token: Option<String>,
    pub accounts: AccountSelect,
    pub nav: Vec<NavEntry>,
    pub loading: bool,
    pub content: Content,
    pub flashes: Flashes,
    pub modal: Option<EmailModal>,
}

impl Page {
    /// Builds the page from the shell document served at `/`.
    pub fn from_shell(html: &str) -> Self {
        let shell = fragment::parse_shell(html);
        Self {
            csrf_token: shell.csrf_token,
            accounts: shell.accounts,
            nav: shell.nav,
            content: Content::from_html(shell.content_html),
            ..Default::default()
        }
    }

    pub fn nav_entry(&self, item_id: &str) -> Option<&NavEntry> {
        self.nav.iter().find(|e| e.item_id == item_id)
    }

    /// Clears every entry, then marks `item_id` active.
    pub fn set_active(&mut self, item_id: &str) {
        for entry in &mut self.nav {
            entry.active = false;
        }
        if let Some(entry) = self.nav.iter_mut().find(|e| e.item_id == item_id) {
            entry.active = true;
        }
    }

    pub fn active_entry(&self) -> Option<&NavEntry> {
        self.nav.iter().find(|e| e.active)
    }

    pub fn replace_content(&mut self, html: String) {
        self.content = Content::from_html(html);
    }

    pub fn components(&self) -> &Components {
        &self.content.components
    }

    pub fn components_mut(&mut self) -> &mut Components {
        &mut self.content.components
    }
}
