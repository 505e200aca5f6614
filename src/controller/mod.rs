//! The view controller: turns user commands and poll ticks into requests and
//! page mutations.
//!
//! `Controller` is a cheap `Rc` handle. It is meant for a single-threaded
//! runtime (`LocalSet`); page and session state sit in `RefCell`s that are
//! never borrowed across an `.await`, so a poll tick may run while a long
//! command is still waiting on the server.

mod accounts;
mod emails;
mod forms;
mod modal;
mod results;
mod rows;
mod scan;

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, Transport};
use crate::config::{AppConfig, FlashConfig, PollingConfig};
use crate::error::{ConsoleResult, OptionExt};
use crate::metrics::Metrics;
use crate::page::flash::{FlashCategory, FlashMessage};
use crate::page::{Component, FormKind, Page, EMAIL_ACCOUNTS_ITEM};
use crate::poller::{PollKind, TickSource};
use crate::state::SessionState;
use crate::types::{AccountId, AddressState, ApiReply, RowAction, RowId};

pub use rows::{Direction, ListKind};

/// Asks the user a yes/no question before a destructive command.
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, question: &str) -> bool {
        self(question)
    }
}

/// Every gesture the console understands. [`Controller::dispatch`] runs
/// exactly one handler per command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Click on a sidebar entry, by its element id.
    Navigate(String),
    SelectAccount(AccountId),

    ShowAddAccount,
    ViewAccount(AccountId),
    EditAccount(AccountId),
    SubmitAddAccount,
    SubmitEditAccount,
    DeleteAccount(AccountId),
    CancelAccountForm,
    TestConnection(AccountId),
    TestNewConnection,

    SetField { form: FormKind, name: String, value: String },
    SubmitForm(FormKind),
    SetDateLimit(bool),

    ToggleAddressState { address_id: String, state: AddressState },
    ClearEmails,

    StartScan,
    StopScan,
    SetScanLiveUpdate(bool),

    AddRow(ListKind),
    EditDraft(ListKind, String),
    SetDraftAction(ListKind, RowAction),
    SaveDraft(ListKind),
    CancelDraft(ListKind),
    MoveRow { list: ListKind, id: RowId, direction: Direction },
    DeleteRow { list: ListKind, id: RowId },
    SetRowAction { list: ListKind, id: RowId, action: RowAction },
    EditPrompt { id: RowId, text: String },
    SavePrompt(RowId),
    CancelPromptEdit(RowId),

    ProcessResults,
    StopProcessing,
    SetResultsLiveUpdate(bool),

    OpenFilterEmails(RowId),
    OpenAddressEmails(String),
    NextBatch,
    PreviousBatch,
    SelectEmail(usize),
    CloseModal,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Navigate(_) => "navigate",
            Command::SelectAccount(_) => "select account",
            Command::ShowAddAccount => "show add account",
            Command::ViewAccount(_) => "view account",
            Command::EditAccount(_) => "edit account",
            Command::SubmitAddAccount => "add account",
            Command::SubmitEditAccount => "update account",
            Command::DeleteAccount(_) => "delete account",
            Command::CancelAccountForm => "close account page",
            Command::TestConnection(_) => "test connection",
            Command::TestNewConnection => "test new connection",
            Command::SetField { .. } => "set field",
            Command::SubmitForm(_) => "submit form",
            Command::SetDateLimit(_) => "limit dates",
            Command::ToggleAddressState { .. } => "toggle address state",
            Command::ClearEmails => "clear emails",
            Command::StartScan => "scan",
            Command::StopScan => "stop scan",
            Command::SetScanLiveUpdate(_) => "scan live update",
            Command::AddRow(_) => "add row",
            Command::EditDraft(..) => "edit draft",
            Command::SetDraftAction(..) => "set draft action",
            Command::SaveDraft(_) => "save draft",
            Command::CancelDraft(_) => "cancel draft",
            Command::MoveRow { .. } => "move row",
            Command::DeleteRow { .. } => "delete row",
            Command::SetRowAction { .. } => "set row action",
            Command::EditPrompt { .. } => "edit prompt",
            Command::SavePrompt(_) => "save prompt",
            Command::CancelPromptEdit(_) => "revert prompt",
            Command::ProcessResults => "process results",
            Command::StopProcessing => "stop processing",
            Command::SetResultsLiveUpdate(_) => "results live update",
            Command::OpenFilterEmails(_) => "show filter emails",
            Command::OpenAddressEmails(_) => "show address emails",
            Command::NextBatch => "next batch",
            Command::PreviousBatch => "previous batch",
            Command::SelectEmail(_) => "select email",
            Command::CloseModal => "close viewer",
        }
    }
}

struct Inner {
    api: ApiClient,
    session: RefCell<SessionState>,
    page: RefCell<Page>,
    bindings: RefCell<BTreeSet<Component>>,
    confirm: Box<dyn Confirm>,
    metrics: Metrics,
    polling: PollingConfig,
    flash: FlashConfig,
}

#[derive(Clone)]
pub struct Controller {
    inner: Rc<Inner>,
}

impl Controller {
    pub fn new(
        transport: Rc<dyn Transport>,
        ticks: Box<dyn TickSource>,
        confirm: Box<dyn Confirm>,
        config: &AppConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                api: ApiClient::new(transport, metrics.clone()),
                session: RefCell::new(SessionState::new(ticks)),
                page: RefCell::new(Page::default()),
                bindings: RefCell::new(BTreeSet::new()),
                confirm,
                metrics,
                polling: config.polling.clone(),
                flash: config.flash.clone(),
            }),
        }
    }

    // --- read access for renderers and tests ---

    pub fn with_page<R>(&self, f: impl FnOnce(&Page) -> R) -> R {
        f(&self.inner.page.borrow())
    }

    pub fn selected_account(&self) -> Option<AccountId> {
        self.inner.session.borrow().selected().cloned()
    }

    pub fn is_polling(&self, kind: PollKind) -> bool {
        self.inner.session.borrow().is_polling(kind)
    }

    pub fn bound(&self) -> BTreeSet<Component> {
        self.inner.bindings.borrow().clone()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.inner.polling
    }

    // --- lifecycle ---

    /// Loads the shell page, settles the selected account and shows the
    /// Email Accounts section.
    pub async fn bootstrap(&self) -> ConsoleResult<()> {
        let html = self.inner.api.shell_page().await?;
        let page = Page::from_shell(&html);
        if page.csrf_token.is_none() {
            warn!("shell page carries no csrf_token; mutating commands will fail");
        }
        self.inner.api.set_csrf_token(page.csrf_token.clone());
        let initial = page.accounts.value.clone();
        *self.inner.page.borrow_mut() = page;
        self.inner.session.borrow_mut().select(initial.clone());

        if initial.is_none() {
            self.adopt_first_account().await;
        }

        let has_accounts_entry = self.with_page(|p| p.nav_entry(EMAIL_ACCOUNTS_ITEM).is_some());
        if has_accounts_entry {
            if let Err(e) = self.load_content(EMAIL_ACCOUNTS_ITEM).await {
                error!("Error loading content: {}", e);
                self.flash(FlashCategory::Danger, format!("Error loading content: {}", e));
            }
        } else {
            self.initialize_components().await?;
        }
        info!("bootstrap complete");
        Ok(())
    }

    /// Empty select control: ask the server for accounts and take the first.
    async fn adopt_first_account(&self) {
        match self.inner.api.email_accounts().await {
            Ok(reply) if reply.success => {
                let Some(first) = reply.email_accounts.first() else {
                    info!("server has no email accounts yet");
                    return;
                };
                let id = first.id.clone();
                self.page_mut(|p| {
                    if p.accounts.options.is_empty() {
                        p.accounts.options = reply
                            .email_accounts
                            .iter()
                            .map(|a| crate::page::AccountOption {
                                id: a.id.clone(),
                                label: if a.email.is_empty() { a.id.to_string() } else { a.email.clone() },
                            })
                            .collect();
                    }
                    p.accounts.set_value(&id);
                });
                self.inner.session.borrow_mut().select(Some(id));
            }
            Ok(_) => warn!("get_email_accounts answered without success"),
            Err(e) => error!("Error fetching email accounts: {}", e),
        }
    }

    /// Page unload: every poll loop is cancelled.
    pub fn shutdown(&self) {
        self.inner.session.borrow_mut().polls.stop_all();
        self.page_mut(|p| {
            let c = p.components_mut();
            if let Some(panel) = c.scan_panel.as_mut() {
                panel.live.checked = false;
            }
            if let Some(panel) = c.results_panel.as_mut() {
                panel.live.checked = false;
            }
        });
        info!("controller shut down");
    }

    /// Runs one command. Failures are logged and shown as a danger flash
    /// before being returned.
    pub async fn dispatch(&self, command: Command) -> ConsoleResult<()> {
        let name = command.name();
        debug!("dispatch: {:?}", command);
        let result = match command {
            Command::Navigate(item) => self.load_content(&item).await,
            Command::SelectAccount(id) => self.select_account(id),

            Command::ShowAddAccount => self.show_add_account().await,
            Command::ViewAccount(id) => self.view_account(&id).await,
            Command::EditAccount(id) => self.edit_account(&id).await,
            Command::SubmitAddAccount => self.submit_add_account().await,
            Command::SubmitEditAccount => self.submit_edit_account().await,
            Command::DeleteAccount(id) => self.delete_account(&id).await,
            Command::CancelAccountForm => self.cancel_account_form().await,
            Command::TestConnection(id) => self.test_connection(&id).await,
            Command::TestNewConnection => self.test_new_connection().await,

            Command::SetField { form, name, value } => self.set_field(form, &name, &value),
            Command::SubmitForm(kind) => self.submit_form(kind).await,
            Command::SetDateLimit(on) => self.set_date_limit(on),

            Command::ToggleAddressState { address_id, state } => self.toggle_address_state(&address_id, state).await,
            Command::ClearEmails => self.clear_emails().await,

            Command::StartScan => self.start_scan().await,
            Command::StopScan => self.stop_scan().await,
            Command::SetScanLiveUpdate(on) => self.set_scan_live(on),

            Command::AddRow(list) => self.add_row(list),
            Command::EditDraft(list, text) => self.edit_draft(list, text),
            Command::SetDraftAction(list, action) => self.set_draft_action(list, action),
            Command::SaveDraft(list) => self.save_draft(list).await,
            Command::CancelDraft(list) => self.cancel_draft(list),
            Command::MoveRow { list, id, direction } => self.move_row(list, &id, direction).await,
            Command::DeleteRow { list, id } => self.delete_row(list, &id).await,
            Command::SetRowAction { list, id, action } => self.set_row_action(list, &id, action).await,
            Command::EditPrompt { id, text } => self.edit_prompt(&id, text),
            Command::SavePrompt(id) => self.save_prompt(&id).await,
            Command::CancelPromptEdit(id) => self.cancel_prompt_edit(&id),

            Command::ProcessResults => self.process_results().await,
            Command::StopProcessing => self.stop_processing().await,
            Command::SetResultsLiveUpdate(on) => self.set_results_live(on),

            Command::OpenFilterEmails(id) => self.open_filter_emails(&id).await,
            Command::OpenAddressEmails(address) => self.open_address_emails(&address).await,
            Command::NextBatch => self.next_batch().await,
            Command::PreviousBatch => self.previous_batch().await,
            Command::SelectEmail(index) => self.select_email(index),
            Command::CloseModal => {
                self.page_mut(|p| p.modal = None);
                Ok(())
            }
        };
        if let Err(e) = &result {
            error!("{} failed: {}", name, e);
            self.flash(FlashCategory::Danger, e.to_string());
        }
        result
    }

    /// One tick of a live-update loop. Ticks of a loop that has been stopped
    /// in the meantime are ignored.
    pub async fn on_tick(&self, kind: PollKind) -> ConsoleResult<()> {
        if !self.is_polling(kind) {
            debug!("ignoring stale {} tick", kind);
            return Ok(());
        }
        if self.selected_account().is_none() {
            warn!("no account selected, stopping {} live update", kind);
            self.end_live_update(kind);
            return Ok(());
        }
        self.inner.metrics.inc_poll_ticks();
        let result = match kind {
            PollKind::ScanStatus => self.scan_tick().await,
            PollKind::ResultStatus => self.results_tick().await,
        };
        if let Err(e) = &result {
            error!("{} tick failed: {}", kind, e);
            self.flash(FlashCategory::Danger, e.to_string());
        }
        result
    }

    fn end_live_update(&self, kind: PollKind) {
        self.inner.session.borrow_mut().polls.stop(kind);
        self.page_mut(|p| {
            let c = p.components_mut();
            let live = match kind {
                PollKind::ScanStatus => c.scan_panel.as_mut().map(|panel| &mut panel.live),
                PollKind::ResultStatus => c.results_panel.as_mut().map(|panel| &mut panel.live),
            };
            if let Some(live) = live {
                live.checked = false;
                live.pulsed_at = None;
            }
        });
    }

    /// Drops flash messages whose display time is over.
    pub fn prune_flashes(&self) -> usize {
        let cfg = self.inner.flash.clone();
        self.page_mut(|p| p.flashes.prune(Utc::now(), &cfg))
    }

    // --- content ---

    /// Loads a sidebar section into the content pane, scoped to the selected
    /// account, and re-initializes the components.
    pub async fn load_content(&self, item_id: &str) -> ConsoleResult<()> {
        let entry = self.with_page(|p| p.nav_entry(item_id).cloned()).ok_or_missing(item_id)?;
        let account = self.selected_account();
        self.page_mut(|p| {
            p.set_active(item_id);
            p.loading = true;
        });

        let result = self.inner.api.content(&entry.url, account.as_ref()).await;
        self.page_mut(|p| p.loading = false);

        let html = result?;
        self.page_mut(|p| p.replace_content(html));
        self.inner.metrics.inc_content_loads();
        info!("loaded {}", entry.label);
        self.initialize_components().await
    }

    /// Swaps in a page that is not a sidebar section (account view/add/edit).
    async fn fetch_content(&self, path: &str) -> ConsoleResult<()> {
        let html = self.inner.api.content(path, None).await?;
        self.page_mut(|p| p.replace_content(html));
        self.inner.metrics.inc_content_loads();
        self.initialize_components().await
    }

    /// Re-derives the bound components from the current content. Running it
    /// again without a content change leaves everything as it was.
    pub async fn initialize_components(&self) -> ConsoleResult<()> {
        let bound = self.with_page(|p| p.components().bound());

        // Loops whose panel left the page end; loops whose panel is back keep
        // running, and a panel rendered with its toggle on gets its loop.
        for (kind, component, every) in [
            (PollKind::ScanStatus, Component::ScanPanel, self.inner.polling.scan_interval()),
            (PollKind::ResultStatus, Component::ResultsPanel, self.inner.polling.results_interval()),
        ] {
            if !bound.contains(&component) {
                self.inner.session.borrow_mut().polls.stop(kind);
                continue;
            }
            let rendered_on = self.page_mut(|p| live_toggle(p, kind).map(|t| t.checked).unwrap_or(false));
            let running = self.is_polling(kind);
            if running {
                self.page_mut(|p| {
                    if let Some(toggle) = live_toggle(p, kind) {
                        toggle.checked = true;
                    }
                });
            } else if rendered_on {
                self.inner.session.borrow_mut().polls.start(kind, every);
            }
        }

        self.page_mut(|p| {
            if let Some(range) = p.components_mut().date_range.as_mut() {
                range.required = range.limit;
            }
        });

        *self.inner.bindings.borrow_mut() = bound.clone();
        debug!("bound components: {:?}", bound);

        if bound.contains(&Component::FolderTable) {
            self.refresh_folder_table().await;
        }
        Ok(())
    }

    // --- helpers shared by the handlers ---

    fn page_mut<R>(&self, f: impl FnOnce(&mut Page) -> R) -> R {
        f(&mut self.inner.page.borrow_mut())
    }

    fn require(&self, component: Component) -> ConsoleResult<()> {
        if self.inner.bindings.borrow().contains(&component) {
            Ok(())
        } else {
            Err(crate::error::ConsoleError::NotBound(component))
        }
    }

    /// Like [`Self::require`], satisfied by any of `components`.
    fn require_any(&self, components: &[Component]) -> ConsoleResult<()> {
        let bindings = self.inner.bindings.borrow();
        match components.iter().find(|c| bindings.contains(c)) {
            Some(_) => Ok(()),
            None => Err(crate::error::ConsoleError::NotBound(components[0])),
        }
    }

    fn account(&self) -> ConsoleResult<AccountId> {
        self.inner.session.borrow().require()
    }

    fn confirm(&self, question: &str) -> bool {
        let yes = self.inner.confirm.confirm(question);
        if !yes {
            info!("not confirmed: {}", question);
        }
        yes
    }

    fn flash(&self, category: FlashCategory, text: impl Into<String>) {
        let message = FlashMessage::new(category, text);
        match category {
            FlashCategory::Danger | FlashCategory::Warning => warn!("flash [{}] {}", category, message.text),
            _ => info!("flash [{}] {}", category, message.text),
        }
        self.inner.metrics.inc_flashes_shown();
        self.page_mut(|p| p.flashes.push(message));
    }

    /// Success text when the reply succeeded, `prefix` + failure text otherwise.
    /// Returns `reply.success`.
    fn flash_reply(&self, reply: &ApiReply, success: &str, prefix: &str) -> bool {
        if reply.success {
            self.flash(FlashCategory::Success, success);
        } else {
            self.flash(FlashCategory::Danger, format!("{}: {}", prefix, reply.failure_text()));
        }
        reply.success
    }

    fn select_account(&self, id: AccountId) -> ConsoleResult<()> {
        let known = self.with_page(|p| p.accounts.options.is_empty() || p.accounts.options.iter().any(|o| o.id == id));
        if !known {
            return Err(crate::error::ConsoleError::NotFound(format!("account {}", id)));
        }
        self.page_mut(|p| p.accounts.set_value(&id));
        self.inner.session.borrow_mut().select(Some(id));
        Ok(())
    }
}

fn live_toggle(page: &mut Page, kind: PollKind) -> Option<&mut crate::page::LiveToggle> {
    let c = page.components_mut();
    match kind {
        PollKind::ScanStatus => c.scan_panel.as_mut().map(|p| &mut p.live),
        PollKind::ResultStatus => c.results_panel.as_mut().map(|p| &mut p.live),
    }
}
