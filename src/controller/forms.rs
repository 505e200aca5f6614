use super::Controller;
use crate::error::{validation, ConsoleError, ConsoleResult};
use crate::page::flash::FlashCategory;
use crate::page::{Component, Form, FormKind, Page};

/// IMAP settings filled in when the account's email type changes.
const IMAP_PRESETS: [(&str, &str, &str); 2] = [("GMAIL", "imap.gmail.com", "993"), ("APPLE", "imap.mail.me.com", "993")];

fn form_mut(page: &mut Page, kind: FormKind) -> Option<&mut Form> {
    let c = page.components_mut();
    match kind {
        FormKind::EmailAccount => c.account_form.as_mut().map(|f| &mut f.form),
        _ => c.form_mut(kind),
    }
}

fn form_component(kind: FormKind) -> Component {
    match kind {
        FormKind::EmailAccount => Component::AccountForm,
        _ => Component::Forms,
    }
}

impl Controller {
    pub(super) fn set_field(&self, kind: FormKind, name: &str, value: &str) -> ConsoleResult<()> {
        self.require(form_component(kind))?;
        self.page_mut(|p| {
            let form = form_mut(p, kind).ok_or(ConsoleError::NotBound(form_component(kind)))?;
            form.set(name, value);
            if kind == FormKind::EmailAccount && name == "email_type" {
                if let Some((_, server, port)) = IMAP_PRESETS.iter().find(|(ty, _, _)| *ty == value) {
                    form.set("imap_server", server);
                    form.set("imap_port", port);
                    form.set("imap_use_ssl", "y");
                }
            }
            Ok(())
        })
    }

    /// The `limitDates` checkbox: toggles the date selectors and their
    /// `required` flags; unchecking clears both dates.
    pub(super) fn set_date_limit(&self, on: bool) -> ConsoleResult<()> {
        self.require(Component::DateRange)?;
        self.page_mut(|p| {
            let c = p.components_mut();
            let field_name = match c.date_range.as_mut() {
                Some(range) => {
                    range.limit = on;
                    range.required = on;
                    range.selectors_visible = on;
                    range.field_name.clone()
                }
                None => None,
            };
            if let Some(form) = c.form_mut(FormKind::Dates) {
                if let Some(name) = field_name {
                    if on {
                        form.set(&name, "y");
                    } else {
                        form.remove(&name);
                    }
                }
                if !on {
                    form.set("start_date", "");
                    form.set("end_date", "");
                }
            }
        });
        Ok(())
    }

    pub(super) async fn submit_form(&self, kind: FormKind) -> ConsoleResult<()> {
        if kind == FormKind::EmailAccount {
            return self.submit_account_form().await;
        }
        self.require(Component::Forms)?;
        let form = self
            .with_page(|p| p.components().form(kind).cloned())
            .ok_or(ConsoleError::NotBound(Component::Forms))?;
        let account = self.account()?;
        if kind == FormKind::Dates {
            self.check_and_relabel_dates(&form)?;
        }

        let mut fields = form.pairs();
        fields.push(("account_id".to_string(), account.to_string()));
        let reply = self.inner.api.submit_form(form.endpoint(), fields).await?;
        if reply.success {
            if let Some(message) = reply.message.as_deref().filter(|m| !m.is_empty()) {
                self.flash(FlashCategory::Success, message);
            }
        } else {
            self.flash(FlashCategory::Danger, format!("Failed: {}", reply.failure_text()));
        }
        Ok(())
    }

    /// The account form answers with the page to show next.
    async fn submit_account_form(&self) -> ConsoleResult<()> {
        self.require(Component::AccountForm)?;
        let form = self
            .with_page(|p| p.components().account_form.as_ref().map(|f| f.form.clone()))
            .ok_or(ConsoleError::NotBound(Component::AccountForm))?;
        if form.action.is_empty() {
            return Err(ConsoleError::InvalidInput("account form has no action".to_string()));
        }
        let html = self.inner.api.submit_account_form(&form.action, form.pairs()).await?;
        self.page_mut(|p| p.replace_content(html));
        self.inner.metrics.inc_content_loads();
        self.initialize_components().await
    }

    /// With limited dates both dates must be valid; the selected account's
    /// label then shows the range.
    fn check_and_relabel_dates(&self, form: &Form) -> ConsoleResult<()> {
        let limit = self.with_page(|p| p.components().date_range.as_ref().map(|r| r.limit).unwrap_or(false));
        let start = form.get("start_date").unwrap_or("").to_string();
        let end = form.get("end_date").unwrap_or("").to_string();
        if limit {
            validation::require_date(&start, "start_date")?;
            validation::require_date(&end, "end_date")?;
        }
        if let Some(id) = self.selected_account() {
            self.page_mut(|p| {
                if let Some(option) = p.accounts.option_mut(&id) {
                    let email = option.email().to_string();
                    option.label = if limit { format!("{} ({} - {})", email, start, end) } else { email };
                }
            });
        }
        Ok(())
    }
}
