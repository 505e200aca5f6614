use super::Controller;
use crate::error::{ConsoleError, ConsoleResult};
use crate::page::flash::FlashCategory;
use crate::page::Component;
use crate::types::{AddressState, AddressStateRequest};

impl Controller {
    /// Include / ignore / exclude for one sender address. The group's
    /// highlighted button follows the server's answer.
    pub(super) async fn toggle_address_state(&self, address_id: &str, state: AddressState) -> ConsoleResult<()> {
        self.require(Component::AddressGroups)?;
        let known = self.with_page(|p| p.components().address_groups.iter().any(|g| g.address_id == address_id));
        if !known {
            return Err(ConsoleError::NotFound(format!("address {}", address_id)));
        }

        let body = AddressStateRequest {
            address_id: address_id.to_string(),
            new_state: state,
        };
        let reply = self.inner.api.toggle_address_state(&body).await?;
        if !reply.success {
            self.flash(
                FlashCategory::Danger,
                format!("Failed to update email address state: {}", reply.failure_text()),
            );
            return Ok(());
        }
        self.page_mut(|p| {
            if let Some(group) = p
                .components_mut()
                .address_groups
                .iter_mut()
                .find(|g| g.address_id == address_id)
            {
                group.state = Some(state);
            }
        });
        Ok(())
    }

    /// Deletes every stored email of the account, then reloads the emails view.
    pub(super) async fn clear_emails(&self) -> ConsoleResult<()> {
        self.require(Component::ClearEmails)?;
        let account = self.account()?;
        if !self.confirm("Are you sure you want to clear all emails for this account?") {
            return Ok(());
        }
        let reply = self.inner.api.delete_emails(&account).await?;
        if !self.flash_reply(&reply, "Emails cleared successfully.", "Failed to clear emails") {
            return Ok(());
        }

        let html = self.inner.api.content("/emails", Some(&account)).await?;
        self.page_mut(|p| p.replace_content(html));
        self.inner.metrics.inc_content_loads();
        self.initialize_components().await
    }
}
