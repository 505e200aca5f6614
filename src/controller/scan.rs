use chrono::Utc;
use tracing::{debug, info};

use super::Controller;
use crate::error::ConsoleResult;
use crate::page::flash::FlashCategory;
use crate::page::Component;
use crate::poller::PollKind;
use crate::types::ScanState;

impl Controller {
    /// Turns the scan live update on (loop starts) or off (loop cancelled).
    pub(super) fn set_scan_live(&self, on: bool) -> ConsoleResult<()> {
        self.require(Component::ScanPanel)?;
        self.page_mut(|p| {
            if let Some(panel) = p.components_mut().scan_panel.as_mut() {
                panel.live.checked = on;
                if !on {
                    panel.live.pulsed_at = None;
                }
            }
        });
        let mut session = self.inner.session.borrow_mut();
        if on {
            session.polls.start(PollKind::ScanStatus, self.inner.polling.scan_interval());
        } else {
            session.polls.stop(PollKind::ScanStatus);
        }
        Ok(())
    }

    pub(super) async fn start_scan(&self) -> ConsoleResult<()> {
        self.require(Component::ScanPanel)?;
        let account = self.account()?;
        self.inner.api.require_csrf()?;

        self.set_scan_live(true)?;
        self.set_scan_button_disabled(true);
        // The server answers only when the scan is over; ticks keep running meanwhile.
        let result = self.inner.api.scan_emails(&account).await;
        self.set_scan_button_disabled(false);

        let reply = result?;
        self.flash_reply(&reply, "Scanned emails.", "Failed to scan emails");
        Ok(())
    }

    /// Visible state is left to the next tick.
    pub(super) async fn stop_scan(&self) -> ConsoleResult<()> {
        self.require(Component::ScanPanel)?;
        let account = self.account()?;
        let reply = self.inner.api.stop_scan(&account).await?;
        self.flash_reply(&reply, "Scan stopped successfully.", "Failed to stop scan");
        Ok(())
    }

    pub(super) async fn scan_tick(&self) -> ConsoleResult<()> {
        let indicator = self.with_page(|p| p.components().scan_panel.as_ref().and_then(|s| s.running_indicator));
        if indicator.is_none() {
            info!("Running indicator not found, stopping live update");
            self.inner.session.borrow_mut().polls.stop(PollKind::ScanStatus);
            self.page_mut(|p| {
                if let Some(panel) = p.components_mut().scan_panel.as_mut() {
                    panel.live.checked = false;
                }
            });
            return Ok(());
        }
        let account = self.account()?;

        self.page_mut(|p| {
            if let Some(panel) = p.components_mut().scan_panel.as_mut() {
                panel.live.pulse(Utc::now());
            }
        });

        let api = &self.inner.api;
        let (counts, status) = futures::join!(api.folder_counts(&account), api.check_scan_status(&account));

        match counts {
            Ok(reply) => self.page_mut(|p| {
                if let Some(table) = p.components_mut().folder_table.as_mut() {
                    *table = reply.folders;
                }
            }),
            Err(e) => self.flash(FlashCategory::Danger, format!("Error updating folder table: {}", e)),
        }
        match status {
            Ok(reply) => self.apply_scan_state(ScanState::from_wire(&reply.status)),
            Err(e) => self.flash(FlashCategory::Danger, format!("Error checking scan status: {}", e)),
        }
        Ok(())
    }

    fn apply_scan_state(&self, state: ScanState) {
        let running = state.is_running();
        self.page_mut(|p| {
            if let Some(panel) = p.components_mut().scan_panel.as_mut() {
                if panel.running_indicator.is_some() {
                    panel.running_indicator = Some(running);
                    panel.stop_button_visible = running;
                }
                if !running {
                    panel.live.checked = false;
                    panel.live.pulsed_at = None;
                }
            }
        });
        if !running {
            debug!("scan is {:?}, ending live update", state);
            self.inner.session.borrow_mut().polls.stop(PollKind::ScanStatus);
        }
    }

    fn set_scan_button_disabled(&self, disabled: bool) {
        self.page_mut(|p| {
            if let Some(panel) = p.components_mut().scan_panel.as_mut() {
                panel.scan_button_disabled = disabled;
            }
        });
    }

    /// Refreshes the folder table of the current content. Failures are only
    /// flashed; a stale table does not block navigation.
    pub(super) async fn refresh_folder_table(&self) {
        let Some(account) = self.selected_account() else {
            debug!("no account selected, folder table left as rendered");
            return;
        };
        match self.inner.api.folder_counts(&account).await {
            Ok(reply) => self.page_mut(|p| {
                if let Some(table) = p.components_mut().folder_table.as_mut() {
                    *table = reply.folders;
                }
            }),
            Err(e) => self.flash(FlashCategory::Danger, format!("Error updating folder table: {}", e)),
        }
    }
}
