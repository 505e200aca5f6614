use chrono::Utc;
use tracing::{debug, info};

use super::Controller;
use crate::api::decode;
use crate::error::{ConsoleError, ConsoleResult};
use crate::page::flash::FlashCategory;
use crate::page::fragment::{self, ResultsView};
use crate::page::{Component, ResultFileRow};
use crate::poller::PollKind;
use crate::types::{ProcessRequest, ResultStatus, ResultsStatusReply};

impl Controller {
    pub(super) fn set_results_live(&self, on: bool) -> ConsoleResult<()> {
        self.require(Component::ResultsPanel)?;
        self.page_mut(|p| {
            if let Some(panel) = p.components_mut().results_panel.as_mut() {
                panel.live.checked = on;
                if !on {
                    panel.live.pulsed_at = None;
                }
            }
        });
        let mut session = self.inner.session.borrow_mut();
        if on {
            session.polls.start(PollKind::ResultStatus, self.inner.polling.results_interval());
        } else {
            session.polls.stop(PollKind::ResultStatus);
        }
        Ok(())
    }

    pub(super) async fn process_results(&self) -> ConsoleResult<()> {
        self.require(Component::ResultsPanel)?;
        let account = self.account()?;
        self.inner.api.require_csrf()?;

        let has_visible_file = self.with_page(|p| {
            let c = p.components();
            let table_shown = c.results_panel.as_ref().map(|r| r.files_table_visible).unwrap_or(false);
            table_shown && c.result_files.as_ref().map(|f| f.iter().any(|r| !r.deleted)).unwrap_or(false)
        });
        if has_visible_file && !self.confirm("Processing again replaces the current result files. Continue?") {
            return Ok(());
        }

        self.set_results_live(true)?;
        self.set_process_button_disabled(true);
        let result = self
            .inner
            .api
            .process_results(&ProcessRequest { account_id: account })
            .await;

        match result {
            Ok(reply) if reply.success => {
                self.flash(FlashCategory::Success, "Result processing started.");
                self.refresh_results_view().await
            }
            Ok(reply) => {
                self.set_process_button_disabled(false);
                self.flash(
                    FlashCategory::Danger,
                    format!("Failed to process results: {}", reply.failure_text()),
                );
                Ok(())
            }
            Err(e) => {
                self.set_process_button_disabled(false);
                Err(e)
            }
        }
    }

    pub(super) async fn stop_processing(&self) -> ConsoleResult<()> {
        self.require(Component::ResultsPanel)?;
        let account = self.account()?;
        let reply = self.inner.api.stop_processing(&account).await?;
        self.flash_reply(&reply, "Stopping result processing.", "Failed to stop processing");
        Ok(())
    }

    pub(super) async fn results_tick(&self) -> ConsoleResult<()> {
        let present = self.with_page(|p| p.components().results_panel.is_some());
        if !present {
            info!("Results panel not found, stopping live update");
            self.inner.session.borrow_mut().polls.stop(PollKind::ResultStatus);
            return Ok(());
        }
        self.page_mut(|p| {
            if let Some(panel) = p.components_mut().results_panel.as_mut() {
                panel.live.pulse(Utc::now());
            }
        });
        self.refresh_results_view().await
    }

    /// Fetches the status view and applies it to the results panel.
    pub(super) async fn refresh_results_view(&self) -> ConsoleResult<()> {
        let account = self.account()?;
        let resp = self.inner.api.results_view(&account).await?;
        let view = if resp.is_json() || resp.body.trim_start().starts_with('{') {
            let reply: ResultsStatusReply = decode(&resp)?;
            ResultsView {
                status_text: format!("Status: {}", reply.status),
                log: reply.log_entry,
                files: reply
                    .result_files
                    .into_iter()
                    .map(|f| ResultFileRow {
                        id: f.id,
                        name: f.name,
                        download_url: f.url,
                        deleted: false,
                    })
                    .collect(),
            }
        } else {
            fragment::parse_results_view(&resp.body).ok_or_else(|| {
                ConsoleError::Decode("status view without #processResultsStatus and #processResultsLog".to_string())
            })?
        };
        self.apply_results_view(view);
        Ok(())
    }

    fn apply_results_view(&self, view: ResultsView) {
        let status = ResultStatus::parse(&view.status_text);
        let terminal = status.is_terminal();
        let has_files = !view.files.is_empty();
        self.page_mut(|p| {
            let c = p.components_mut();
            c.result_files = Some(view.files);
            let Some(panel) = c.results_panel.as_mut() else { return };
            panel.status_text = view.status_text;
            panel.log = view.log;
            if terminal {
                panel.live.checked = false;
                panel.live.pulsed_at = None;
                panel.process_button_disabled = false;
                panel.running_indicator = false;
                panel.stop_button_visible = false;
                panel.files_table_visible = status.has_output() && has_files;
            } else {
                panel.running_indicator = true;
                panel.stop_button_visible = true;
                panel.files_table_visible = false;
            }
            panel.status = status.clone();
        });
        if terminal {
            debug!("result processing is {}, ending live update", status);
            self.inner.session.borrow_mut().polls.stop(PollKind::ResultStatus);
        }
    }

    fn set_process_button_disabled(&self, disabled: bool) {
        self.page_mut(|p| {
            if let Some(panel) = p.components_mut().results_panel.as_mut() {
                panel.process_button_disabled = disabled;
            }
        });
    }
}
