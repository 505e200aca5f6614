use tracing::info;

use super::Controller;
use crate::error::{ConsoleError, ConsoleResult};
use crate::page::{AccountFormMode, Component, EMAIL_ACCOUNTS_ITEM};
use crate::types::AccountId;

impl Controller {
    pub(super) async fn show_add_account(&self) -> ConsoleResult<()> {
        self.require(Component::AccountList)?;
        self.fetch_content("/email_account_add").await
    }

    pub(super) async fn view_account(&self, id: &AccountId) -> ConsoleResult<()> {
        self.require_any(&[Component::AccountList, Component::AccountView, Component::AccountForm])?;
        self.fetch_content(&format!("/email_account_view/{}", urlencoding::encode(id.as_str())))
            .await
    }

    pub(super) async fn edit_account(&self, id: &AccountId) -> ConsoleResult<()> {
        self.require_any(&[Component::AccountList, Component::AccountView])?;
        self.fetch_content(&format!("/email_account_edit/{}", urlencoding::encode(id.as_str())))
            .await
    }

    pub(super) async fn submit_add_account(&self) -> ConsoleResult<()> {
        self.require(Component::AccountForm)?;
        let fields = self
            .with_page(|p| match &p.components().account_form {
                Some(f) if f.mode == AccountFormMode::Add => Some(f.form.pairs()),
                _ => None,
            })
            .ok_or(ConsoleError::NotBound(Component::AccountForm))?;

        let reply = self.inner.api.add_account(fields).await?;
        if !self.flash_reply(&reply, "Email account added successfully!", "Failed to add account") {
            return Ok(());
        }
        match reply.new_account_id() {
            Some(id) => {
                self.page_mut(|p| p.accounts.set_value(&id));
                self.inner.session.borrow_mut().select(Some(id));
            }
            None => info!("add-account reply carries no id, keeping the current selection"),
        }
        self.load_content(EMAIL_ACCOUNTS_ITEM).await
    }

    pub(super) async fn submit_edit_account(&self) -> ConsoleResult<()> {
        self.require(Component::AccountForm)?;
        let (id, fields) = self
            .with_page(|p| match &p.components().account_form {
                Some(f) => match &f.mode {
                    AccountFormMode::Edit(id) => Some((id.clone(), f.form.pairs())),
                    _ => None,
                },
                None => None,
            })
            .ok_or(ConsoleError::NotBound(Component::AccountForm))?;

        let reply = self.inner.api.edit_account(&id, fields).await?;
        if self.flash_reply(&reply, "Account updated.", "Account update failed") {
            self.load_content(EMAIL_ACCOUNTS_ITEM).await?;
        }
        Ok(())
    }

    pub(super) async fn delete_account(&self, id: &AccountId) -> ConsoleResult<()> {
        self.require_any(&[Component::AccountView, Component::AccountForm, Component::AccountList])?;
        if !self.confirm("Are you sure you want to delete this account?") {
            return Ok(());
        }
        let reply = self.inner.api.delete_account(id).await?;
        if !self.flash_reply(&reply, "Email account deleted successfully!", "Failed to delete account") {
            return Ok(());
        }

        // The select control loses the option; a deleted selection falls back
        // to the first remaining account.
        let fallback = self.page_mut(|p| {
            p.accounts.options.retain(|o| &o.id != id);
            if p.accounts.value.as_ref() == Some(id) {
                p.accounts.value = p.accounts.options.first().map(|o| o.id.clone());
            }
            p.accounts.value.clone()
        });
        if self.selected_account().as_ref() == Some(id) {
            self.inner.session.borrow_mut().select(fallback);
        }
        self.load_content(EMAIL_ACCOUNTS_ITEM).await
    }

    pub(super) async fn cancel_account_form(&self) -> ConsoleResult<()> {
        self.require_any(&[Component::AccountForm, Component::AccountView])?;
        self.load_content(EMAIL_ACCOUNTS_ITEM).await
    }

    pub(super) async fn test_connection(&self, id: &AccountId) -> ConsoleResult<()> {
        self.require(Component::AccountView)?;
        let reply = self.inner.api.test_connection(id).await?;
        self.flash_reply(&reply, "Connection successful!", "Connection failed");
        Ok(())
    }

    /// Tests the settings typed into the add/edit form without saving them.
    pub(super) async fn test_new_connection(&self) -> ConsoleResult<()> {
        self.require(Component::AccountForm)?;
        let fields = self
            .with_page(|p| p.components().account_form.as_ref().map(|f| f.form.pairs()))
            .ok_or(ConsoleError::NotBound(Component::AccountForm))?;
        let reply = self.inner.api.test_new_connection(fields).await?;
        self.flash_reply(&reply, "Connection successful!", "Connection failed");
        Ok(())
    }
}
