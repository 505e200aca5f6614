//! Plain-text view of the page for the console.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::config::AppConfig;
use crate::page::{Components, LiveToggle, ListRow, Page, RowList};
use crate::types::{AddressState, RowAction};

pub fn render(page: &Page, cfg: &AppConfig, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    render_shell(&mut out, page);
    render_flashes(&mut out, page, cfg, now);
    render_components(&mut out, page.components(), cfg, now);
    if let Some(modal) = &page.modal {
        let _ = writeln!(
            out,
            "-- emails: batch {}/{} ({} ids){}{}",
            modal.batch + 1,
            modal.batch_count().max(1),
            modal.ids.len(),
            if modal.previous_disabled() { "" } else { "  [prev]" },
            if modal.next_disabled() { "" } else { "  [next]" },
        );
        for (i, email) in modal.emails.iter().enumerate() {
            let mark = if modal.selected == Some(i) { '>' } else { ' ' };
            let _ = writeln!(out, "{} {:>2}. {}  {}  {}", mark, i + 1, email.date, email.sender, email.subject);
        }
        if let Some(email) = modal.selected_email() {
            let _ = writeln!(out, "   folder: {}\n{}", email.folder, email.body);
        }
    }
    out
}

fn render_shell(out: &mut String, page: &Page) {
    let account = page
        .accounts
        .value
        .as_ref()
        .and_then(|id| page.accounts.options.iter().find(|o| &o.id == id))
        .map(|o| o.label.as_str())
        .unwrap_or("(no account)");
    let nav: Vec<String> = page
        .nav
        .iter()
        .map(|e| if e.active { format!("[{}]", e.label) } else { e.label.clone() })
        .collect();
    let _ = writeln!(out, "account: {}", account);
    let _ = writeln!(out, "{}{}", nav.join(" | "), if page.loading { "  (loading...)" } else { "" });
}

fn render_flashes(out: &mut String, page: &Page, cfg: &AppConfig, now: DateTime<Utc>) {
    for message in page.flashes.iter() {
        let fading = if message.is_fading(now, &cfg.flash) { " (fading)" } else { "" };
        let _ = writeln!(out, "[{}] {}{}", message.category, message.text, fading);
    }
}

fn live_label(name: &str, toggle: &LiveToggle, cfg: &AppConfig, now: DateTime<Utc>) -> String {
    let state = if toggle.checked { "on" } else { "off" };
    let lit = if toggle.is_lit(now, cfg.polling.label_pulse_ms) { " *" } else { "" };
    format!("{} live update: {}{}", name, state, lit)
}

fn action_buttons(active: Option<RowAction>) -> String {
    [RowAction::Include, RowAction::Exclude]
        .iter()
        .map(|a| if active == Some(*a) { format!("[{}]", a.as_str()) } else { a.as_str().to_string() })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_rows(out: &mut String, title: &str, list: &RowList) {
    let _ = writeln!(out, "-- {}", title);
    for row in &list.rows {
        let _ = writeln!(out, "  {}", row_line(row));
    }
    if let Some(draft) = &list.draft {
        let _ = writeln!(out, "  +  {}  {}", draft.text, action_buttons(Some(draft.action)));
    }
}

fn row_line(row: &ListRow) -> String {
    let mut line = format!("{:>4}  {}", row.id, row.text);
    if row.is_dirty() {
        line.push_str(" (edited)");
    }
    if let Some(count) = row.email_count {
        let _ = write!(line, "  ({} emails)", count);
    }
    let _ = write!(line, "  {}", action_buttons(row.action));
    line
}

fn render_components(out: &mut String, c: &Components, cfg: &AppConfig, now: DateTime<Utc>) {
    if let Some(accounts) = &c.account_list {
        let _ = writeln!(out, "-- email accounts");
        for row in accounts {
            let _ = writeln!(out, "  {:>4}  {}", row.id, row.label);
        }
    }
    if let Some(form) = &c.account_form {
        let _ = writeln!(out, "-- account form ({:?})", form.mode);
        for field in &form.form.fields {
            let value = if field.name.contains("password") { "***" } else { field.value.as_str() };
            let _ = writeln!(out, "  {} = {}", field.name, value);
        }
    }
    if let Some(id) = &c.account_view {
        let _ = writeln!(out, "-- account {}", id);
    }
    if let Some(folders) = &c.folder_table {
        let _ = writeln!(out, "-- folders");
        for f in folders {
            let _ = writeln!(
                out,
                "  {:<30} {:>6}/{:<6} {:>5.1}%",
                f.folder,
                f.found_count,
                f.email_count,
                f.progress_percent()
            );
        }
    }
    if let Some(panel) = &c.scan_panel {
        let running = match panel.running_indicator {
            Some(true) => "running",
            Some(false) => "idle",
            None => "-",
        };
        let _ = writeln!(
            out,
            "-- scan: {}{}{}  {}",
            running,
            if panel.scan_button_disabled { "  (scan disabled)" } else { "" },
            if panel.stop_button_visible { "  [stop]" } else { "" },
            live_label("scan", &panel.live, cfg, now)
        );
    }
    if c.clear_emails {
        let _ = writeln!(out, "-- clear emails available");
    }
    if !c.address_groups.is_empty() {
        let _ = writeln!(out, "-- addresses");
        for group in &c.address_groups {
            let buttons: Vec<String> = AddressState::ALL
                .iter()
                .map(|s| if group.is_active(*s) { format!("[{}]", s.as_str()) } else { s.as_str().to_string() })
                .collect();
            let _ = writeln!(out, "  {:>4}  {:<40} {}", group.address_id, group.address, buttons.join(" "));
        }
    }
    if let Some(filters) = &c.filters {
        render_rows(out, "filters", filters);
    }
    if let Some(prompts) = &c.prompts {
        render_rows(out, "ai prompts", prompts);
    }
    if let Some(panel) = &c.results_panel {
        let _ = writeln!(
            out,
            "-- results: {}{}{}{}  {}",
            panel.status_text,
            if panel.running_indicator { "  (processing)" } else { "" },
            if panel.process_button_disabled { "  (process disabled)" } else { "" },
            if panel.stop_button_visible { "  [stop]" } else { "" },
            live_label("results", &panel.live, cfg, now)
        );
        if !panel.log.is_empty() {
            let _ = writeln!(out, "{}", panel.log);
        }
    }
    if let Some(files) = &c.result_files {
        let visible = c.results_panel.as_ref().map(|p| p.files_table_visible).unwrap_or(true);
        if visible && !files.is_empty() {
            let _ = writeln!(out, "-- result files");
            for file in files {
                let link = match (&file.download_url, file.deleted) {
                    (_, true) => "deleted".to_string(),
                    (Some(url), false) => url.clone(),
                    (None, false) => String::new(),
                };
                let _ = writeln!(out, "  {:>4}  {}  {}", file.id, file.name, link);
            }
        }
    }
    for form in &c.forms {
        let fields: Vec<String> = form.fields.iter().map(|f| format!("{}={}", f.name, f.value)).collect();
        let _ = writeln!(out, "-- form {}: {}", form.kind, fields.join(" "));
    }
    if let Some(range) = &c.date_range {
        let _ = writeln!(
            out,
            "-- limit dates: {}{}",
            if range.limit { "on" } else { "off" },
            if range.required { " (dates required)" } else { "" }
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::flash::{FlashCategory, FlashMessage};
    use crate::page::{NavEntry, ScanPanel};

    #[test]
    fn shows_active_nav_and_lit_label() {
        let cfg = AppConfig::default();
        let now = Utc::now();
        let mut page = Page::default();
        page.nav.push(NavEntry {
            item_id: "filters-item".into(),
            url: "/filters".into(),
            label: "Filters".into(),
            active: true,
        });
        page.flashes.push(FlashMessage::new(FlashCategory::Success, "Scanned emails."));
        let mut live = LiveToggle {
            checked: true,
            pulsed_at: None,
        };
        live.pulse(now);
        page.components_mut().scan_panel = Some(ScanPanel {
            scan_button_disabled: false,
            stop_button_visible: true,
            running_indicator: Some(true),
            live,
        });

        let text = render(&page, &cfg, now);
        assert!(text.contains("[Filters]"));
        assert!(text.contains("[success] Scanned emails."));
        assert!(text.contains("scan live update: on *"));
        assert!(text.contains("[stop]"));
    }
}
