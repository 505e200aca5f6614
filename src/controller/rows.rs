use std::fmt;

use tracing::debug;

use super::Controller;
use crate::api::ApiClient;
use crate::error::{validation, ConsoleError, ConsoleResult, OptionExt};
use crate::page::flash::FlashCategory;
use crate::page::{Component, DraftRow, Page, RowList, AI_PROMPTS_ITEM, FILTERS_ITEM};
use crate::types::{ActionRequest, NewFilterRequest, OrderItem, PromptRequest, ReorderRequest, RowAction, RowId};

/// The three row lists the editor handles, with their endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    Filters,
    Prompts,
    ResultFiles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl ListKind {
    pub fn component(self) -> Component {
        match self {
            ListKind::Filters => Component::Filters,
            ListKind::Prompts => Component::Prompts,
            ListKind::ResultFiles => Component::ResultFiles,
        }
    }

    pub fn create_path(self) -> Option<&'static str> {
        match self {
            ListKind::Filters => Some("/filters"),
            ListKind::Prompts => Some("/ai_prompts"),
            ListKind::ResultFiles => None,
        }
    }

    pub fn reorder_path(self) -> Option<&'static str> {
        match self {
            ListKind::Filters => Some("/filters/reorder"),
            ListKind::Prompts => Some("/prompts/reorder"),
            ListKind::ResultFiles => None,
        }
    }

    pub fn delete_prefix(self) -> &'static str {
        match self {
            ListKind::Filters => "/delete_filter",
            ListKind::Prompts => "/delete_prompt",
            ListKind::ResultFiles => "/delete_file",
        }
    }

    pub fn action_prefix(self) -> Option<&'static str> {
        match self {
            ListKind::Filters => Some("/update_filter_action"),
            ListKind::Prompts => Some("/update_prompt_action"),
            ListKind::ResultFiles => None,
        }
    }

    /// Sidebar entry that reloads the list after a row was created.
    pub fn reload_item(self) -> Option<&'static str> {
        match self {
            ListKind::Filters => Some(FILTERS_ITEM),
            ListKind::Prompts => Some(AI_PROMPTS_ITEM),
            ListKind::ResultFiles => None,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            ListKind::Filters => "filter",
            ListKind::Prompts => "prompt",
            ListKind::ResultFiles => "file",
        }
    }

    fn unsupported(self, what: &str) -> ConsoleError {
        ConsoleError::InvalidInput(format!("{} rows cannot be {}", self.noun(), what))
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Filters => f.write_str("filters"),
            ListKind::Prompts => f.write_str("prompts"),
            ListKind::ResultFiles => f.write_str("result files"),
        }
    }
}

fn rows_mut(page: &mut Page, list: ListKind) -> Option<&mut RowList> {
    let c = page.components_mut();
    match list {
        ListKind::Filters => c.filters.as_mut(),
        ListKind::Prompts => c.prompts.as_mut(),
        ListKind::ResultFiles => None,
    }
}

fn rows(page: &Page, list: ListKind) -> Option<&RowList> {
    let c = page.components();
    match list {
        ListKind::Filters => c.filters.as_ref(),
        ListKind::Prompts => c.prompts.as_ref(),
        ListKind::ResultFiles => None,
    }
}

impl Controller {
    /// Appends a draft row. A list holds at most one draft.
    pub(super) fn add_row(&self, list: ListKind) -> ConsoleResult<()> {
        self.require(list.component())?;
        if list.create_path().is_none() {
            return Err(list.unsupported("added"));
        }
        self.page_mut(|p| {
            if let Some(rows) = rows_mut(p, list) {
                if rows.draft.is_none() {
                    rows.draft = Some(DraftRow {
                        text: String::new(),
                        action: RowAction::Include,
                    });
                }
            }
        });
        Ok(())
    }

    pub(super) fn edit_draft(&self, list: ListKind, text: String) -> ConsoleResult<()> {
        self.require(list.component())?;
        self.page_mut(|p| {
            let draft = rows_mut(p, list).and_then(|r| r.draft.as_mut()).ok_or_missing("draft row")?;
            draft.text = text;
            Ok(())
        })
    }

    pub(super) fn set_draft_action(&self, list: ListKind, action: RowAction) -> ConsoleResult<()> {
        self.require(list.component())?;
        self.page_mut(|p| {
            let draft = rows_mut(p, list).and_then(|r| r.draft.as_mut()).ok_or_missing("draft row")?;
            draft.action = action;
            Ok(())
        })
    }

    pub(super) fn cancel_draft(&self, list: ListKind) -> ConsoleResult<()> {
        self.require(list.component())?;
        self.page_mut(|p| {
            if let Some(rows) = rows_mut(p, list) {
                rows.draft = None;
            }
        });
        Ok(())
    }

    /// Posts the draft and reloads the section from the server on success.
    pub(super) async fn save_draft(&self, list: ListKind) -> ConsoleResult<()> {
        self.require(list.component())?;
        let (draft, count) = self
            .with_page(|p| rows(p, list).and_then(|r| r.draft.clone().map(|d| (d, r.rows.len()))))
            .ok_or_missing("draft row")?;
        let label = match list {
            ListKind::Filters => "Filter text",
            _ => "Prompt text",
        };
        let text = validation::require_text(&draft.text, label)?;
        let account = self.account()?;

        let reply = match list {
            ListKind::Filters => {
                let body = NewFilterRequest {
                    filter: text,
                    action: draft.action,
                    account_id: account,
                };
                self.inner.api.post_json("/filters", &body).await?
            }
            ListKind::Prompts => {
                let body = PromptRequest {
                    id: None,
                    account_id: account,
                    prompt_text: text,
                    order: count,
                    action: RowAction::Include,
                };
                self.inner.api.post_json("/ai_prompts", &body).await?
            }
            ListKind::ResultFiles => return Err(list.unsupported("added")),
        };

        if !reply.success {
            self.flash(
                FlashCategory::Danger,
                format!("Failed to add {}: {}", list.noun(), reply.failure_text()),
            );
            return Ok(());
        }
        let text = reply.message.clone().unwrap_or_else(|| format!("{} added successfully!", capitalize(list.noun())));
        self.flash(FlashCategory::Success, text);
        match list.reload_item() {
            Some(item) => self.load_content(item).await,
            None => Ok(()),
        }
    }

    /// Swaps a row with its neighbour, then saves the order of both rows.
    pub(super) async fn move_row(&self, list: ListKind, id: &RowId, direction: Direction) -> ConsoleResult<()> {
        self.require(list.component())?;
        let path = list.reorder_path().ok_or_else(|| list.unsupported("reordered"))?;

        let items = self.page_mut(|p| -> ConsoleResult<Option<Vec<OrderItem>>> {
            let rows = rows_mut(p, list).ok_or(ConsoleError::NotBound(list.component()))?;
            let idx = rows.position(id).ok_or_missing(&format!("{} {}", list.noun(), id))?;
            let other = match direction {
                Direction::Up if idx > 0 => idx - 1,
                Direction::Down if idx + 1 < rows.rows.len() => idx + 1,
                _ => return Ok(None),
            };
            rows.rows.swap(idx, other);
            Ok(Some(vec![
                OrderItem { id: rows.rows[other].id.clone(), order: other },
                OrderItem { id: rows.rows[idx].id.clone(), order: idx },
            ]))
        })?;
        let Some(items) = items else {
            debug!("{} {} is already at the edge", list.noun(), id);
            return Ok(());
        };

        let reply = self.inner.api.post_json(path, &ReorderRequest { items }).await?;
        let title = capitalize(&list.to_string());
        self.flash_reply(
            &reply,
            &format!("{} order saved successfully!", title),
            &format!("Failed to save {} order", list),
        );
        Ok(())
    }

    pub(super) async fn delete_row(&self, list: ListKind, id: &RowId) -> ConsoleResult<()> {
        self.require(list.component())?;
        let exists = self.with_page(|p| match list {
            ListKind::ResultFiles => p
                .components()
                .result_files
                .as_ref()
                .map(|f| f.iter().any(|r| &r.id == id))
                .unwrap_or(false),
            _ => rows(p, list).and_then(|r| r.position(id)).is_some(),
        });
        if !exists {
            return Err(ConsoleError::NotFound(format!("{} {}", list.noun(), id)));
        }

        let path = ApiClient::row_path(list.delete_prefix(), id);
        let reply = self.inner.api.post_empty(&path).await?;
        if !reply.success {
            self.flash(
                FlashCategory::Danger,
                format!("Failed to delete {}: {}", list.noun(), reply.failure_text()),
            );
            return Ok(());
        }

        self.page_mut(|p| match list {
            ListKind::ResultFiles => {
                if let Some(files) = p.components_mut().result_files.as_mut() {
                    if let Some(row) = files.iter_mut().find(|r| &r.id == id) {
                        row.deleted = true;
                        row.download_url = None;
                    }
                }
            }
            _ => {
                if let Some(rows) = rows_mut(p, list) {
                    rows.rows.retain(|r| &r.id != id);
                }
            }
        });
        let text = reply
            .message
            .clone()
            .unwrap_or_else(|| format!("{} deleted successfully!", capitalize(list.noun())));
        self.flash(FlashCategory::Success, text);
        Ok(())
    }

    pub(super) async fn set_row_action(&self, list: ListKind, id: &RowId, action: RowAction) -> ConsoleResult<()> {
        self.require(list.component())?;
        let prefix = list.action_prefix().ok_or_else(|| list.unsupported("toggled"))?;
        if self.with_page(|p| rows(p, list).and_then(|r| r.position(id))).is_none() {
            return Err(ConsoleError::NotFound(format!("{} {}", list.noun(), id)));
        }

        let reply = self
            .inner
            .api
            .post_json(&ApiClient::row_path(prefix, id), &ActionRequest { action })
            .await?;
        let ok = self.flash_reply(
            &reply,
            &format!("{} action updated successfully!", capitalize(list.noun())),
            &format!("Failed to update {} action", list.noun()),
        );
        if ok {
            self.page_mut(|p| {
                if let Some(row) = rows_mut(p, list).and_then(|r| r.row_mut(id)) {
                    row.action = Some(action);
                }
            });
        }
        Ok(())
    }

    /// Typing into an existing prompt; no request.
    pub(super) fn edit_prompt(&self, id: &RowId, text: String) -> ConsoleResult<()> {
        self.require(Component::Prompts)?;
        self.page_mut(|p| {
            let row = rows_mut(p, ListKind::Prompts)
                .and_then(|r| r.row_mut(id))
                .ok_or_missing(&format!("prompt {}", id))?;
            row.text = text;
            Ok(())
        })
    }

    pub(super) fn cancel_prompt_edit(&self, id: &RowId) -> ConsoleResult<()> {
        self.require(Component::Prompts)?;
        self.page_mut(|p| {
            let row = rows_mut(p, ListKind::Prompts)
                .and_then(|r| r.row_mut(id))
                .ok_or_missing(&format!("prompt {}", id))?;
            row.text = row.default_text.clone();
            Ok(())
        })
    }

    /// Saves an edited prompt. Save is only enabled while the text differs
    /// from the stored one, so a clean row sends nothing.
    pub(super) async fn save_prompt(&self, id: &RowId) -> ConsoleResult<()> {
        self.require(Component::Prompts)?;
        let (row, order) = self
            .with_page(|p| {
                let list = rows(p, ListKind::Prompts)?;
                let idx = list.position(id)?;
                Some((list.rows[idx].clone(), idx))
            })
            .ok_or_missing(&format!("prompt {}", id))?;
        if !row.is_dirty() {
            debug!("prompt {} unchanged, nothing to save", id);
            return Ok(());
        }
        let text = validation::require_text(&row.text, "Prompt text")?;
        let account = self.account()?;

        let body = PromptRequest {
            id: Some(row.id.clone()),
            account_id: account,
            prompt_text: text,
            order,
            action: row.action.unwrap_or(RowAction::Include),
        };
        let reply = self.inner.api.post_json("/ai_prompts", &body).await?;
        if !reply.success {
            self.flash(
                FlashCategory::Danger,
                format!("Failed to save prompt: {}", reply.failure_text()),
            );
            return Ok(());
        }
        self.flash(
            FlashCategory::Success,
            reply.message.clone().unwrap_or_else(|| "Prompt saved successfully!".to_string()),
        );
        self.load_content(AI_PROMPTS_ITEM).await
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
