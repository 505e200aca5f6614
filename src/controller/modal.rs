use tracing::debug;

use super::Controller;
use crate::error::{ConsoleError, ConsoleResult, OptionExt};
use crate::page::flash::FlashCategory;
use crate::page::{Component, EmailModal, ModalSource};
use crate::types::{EmailBatchRequest, EmailIdsReply, RowId};

impl Controller {
    pub(super) async fn open_filter_emails(&self, filter: &RowId) -> ConsoleResult<()> {
        self.require(Component::Filters)?;
        self.page_mut(|p| p.modal = None);
        let reply = self.inner.api.email_ids_for_filter(filter).await?;
        self.open_modal(ModalSource::Filter(filter.clone()), reply).await
    }

    pub(super) async fn open_address_emails(&self, address: &str) -> ConsoleResult<()> {
        self.require(Component::AddressGroups)?;
        self.page_mut(|p| p.modal = None);
        let reply = self.inner.api.email_ids_for_address(address).await?;
        self.open_modal(ModalSource::Address(address.to_string()), reply).await
    }

    async fn open_modal(&self, source: ModalSource, reply: EmailIdsReply) -> ConsoleResult<()> {
        if !reply.success {
            let why = reply.message.unwrap_or_else(|| "unknown error".to_string());
            self.flash(FlashCategory::Danger, format!("Failed to load emails: {}", why));
            return Ok(());
        }
        if reply.email_ids.is_empty() {
            debug!("no emails for {:?}", source);
            return Ok(());
        }
        self.page_mut(|p| p.modal = Some(EmailModal::new(source, reply.email_ids)));
        self.load_batch(0).await
    }

    /// Fetches one slice of the id list and shows it, first email selected.
    async fn load_batch(&self, batch: usize) -> ConsoleResult<()> {
        let ids = self
            .with_page(|p| p.modal.as_ref().map(|m| m.slice(batch).to_vec()))
            .ok_or_missing("email viewer")?;
        if ids.is_empty() {
            return Ok(());
        }

        let reply = self.inner.api.email_batch(&EmailBatchRequest { email_ids: ids }).await?;
        if !reply.success {
            let why = reply.message.unwrap_or_else(|| "unknown error".to_string());
            self.flash(FlashCategory::Danger, format!("Failed to load emails: {}", why));
            return Ok(());
        }
        self.page_mut(|p| {
            if let Some(modal) = p.modal.as_mut() {
                modal.batch = batch;
                modal.selected = if reply.emails.is_empty() { None } else { Some(0) };
                modal.emails = reply.emails;
            }
        });
        Ok(())
    }

    pub(super) async fn next_batch(&self) -> ConsoleResult<()> {
        let modal = self
            .with_page(|p| p.modal.as_ref().map(|m| (m.batch, m.next_disabled())))
            .ok_or_missing("email viewer")?;
        match modal {
            (_, true) => Ok(()),
            (batch, false) => self.load_batch(batch + 1).await,
        }
    }

    pub(super) async fn previous_batch(&self) -> ConsoleResult<()> {
        let modal = self
            .with_page(|p| p.modal.as_ref().map(|m| (m.batch, m.previous_disabled())))
            .ok_or_missing("email viewer")?;
        match modal {
            (_, true) => Ok(()),
            (batch, false) => self.load_batch(batch - 1).await,
        }
    }

    pub(super) fn select_email(&self, index: usize) -> ConsoleResult<()> {
        self.page_mut(|p| {
            let modal = p.modal.as_mut().ok_or_missing("email viewer")?;
            if index >= modal.emails.len() {
                return Err(ConsoleError::NotFound(format!("email #{} in this batch", index + 1)));
            }
            modal.selected = Some(index);
            Ok(())
        })
    }
}
