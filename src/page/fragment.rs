//! Reads the server's HTML: the shell document and the content fragments.
//!
//! Parsing never fails. Missing or malformed elements just leave the
//! corresponding component unbound.

use scraper::{ElementRef, Html, Selector};

use super::{
    AccountForm, AccountFormMode, AccountOption, AccountRow, AccountSelect, AddressGroup, Components, DateRange,
    Form, FormField, FormKind, ListRow, LiveToggle, NavEntry, ResultFileRow, ResultsPanel, RowList,
    ScanPanel,
};
use crate::types::{AccountId, AddressState, FolderCount, ResultStatus, RowAction, RowId};

fn sel(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

lazy_static::lazy_static! {
    static ref CSRF: Selector = sel(r#"input[name="csrf_token"]"#);
    static ref ACCOUNT_OPTION: Selector = sel("#emailAccountSelect option");
    static ref NAV_ITEM: Selector = sel("#sidebar .list-group-item");
    static ref NAV_LINK: Selector = sel(".load-content[data-content]");
    static ref CONTENT_PANE: Selector = sel("#contentPane");

    static ref ADD_ACCOUNT_BUTTON: Selector = sel("#addAccountButton");
    static ref ACCOUNT_LINK: Selector = sel(".view-account[data-account-id], .edit-account[data-account-id]");
    static ref ACCOUNT_FORM: Selector = sel("#emailAccountForm, #EmailAccountForm");
    static ref SUBMIT_ADD_ACCOUNT: Selector = sel("#submitAddAccountButton");
    static ref SUBMIT_EDIT_ACCOUNT: Selector = sel("#submitEditAccountButton[data-account-id]");
    static ref TEST_CONNECTION: Selector = sel("#testConnectionButton[data-account-id]");

    static ref FOLDER_TABLE: Selector = sel("#emailFolderTable");
    static ref TBODY_ROW: Selector = sel("tbody tr");
    static ref CELL: Selector = sel("td");

    static ref SCAN_BUTTON: Selector = sel("#scanEmailsButton");
    static ref SCAN_STOP: Selector = sel("#stopButton");
    static ref SCAN_INDICATOR: Selector = sel("#runningIndicator");
    static ref SCAN_TOGGLE: Selector = sel("#liveUpdateToggle");
    static ref CLEAR_EMAILS: Selector = sel("#deleteEmailsButton");

    static ref ADDRESS_BUTTON: Selector =
        sel(".toggle-state[data-address-id], .toggle-action[data-email-id]");

    static ref FILTERS_BODY: Selector = sel("#filtersTableBody");
    static ref FILTER_ROW: Selector = sel("tr[data-filter-id]");
    static ref FILTER_TEXT: Selector = sel(".filter-text");
    static ref FILTER_COUNT: Selector = sel(".filter-email-count");
    static ref FILTER_TOGGLE: Selector = sel(".filter-action-toggle");
    static ref PROMPTS_BODY: Selector = sel("#promptsTableBody");
    static ref PROMPT_ROW: Selector = sel("tr[data-id]");
    static ref PROMPT_TEXT: Selector = sel("textarea.prompt-text");
    static ref PROMPT_TOGGLE: Selector = sel(".prompt-action-toggle");

    static ref PROCESS_BUTTON: Selector = sel("#processResultsButton");
    static ref RESULTS_STATUS: Selector = sel("#processResultsStatus");
    static ref RESULTS_LOG: Selector = sel("#processResultsLog");
    static ref RESULTS_INDICATOR: Selector = sel("#processingIndicator");
    static ref RESULTS_STOP: Selector = sel("#stopProcessingButton");
    static ref RESULTS_TOGGLE: Selector = sel("#liveResultsUpdateToggle");
    static ref FILES_TABLE: Selector = sel("#resultsFilesTable");
    static ref FILES_LIST: Selector = sel("#resultsFilesList");
    static ref FILE_ROW: Selector = sel("tr[data-file-id]");
    static ref LINK: Selector = sel("a[href]");

    static ref WORDS_FORM: Selector = sel("form#wordsForm");
    static ref DATES_FORM: Selector = sel("form#datesForm");
    static ref AI_PROMPTS_FORM: Selector = sel("form#aiPromptsForm");
    static ref EDIT_JOB_FORM: Selector = sel(r#"form[action^="/edit_job/"]"#);
    static ref FORM_FIELD: Selector = sel("input[name], select[name], textarea[name]");
    static ref OPTION: Selector = sel("option");

    static ref LIMIT_DATES: Selector = sel("#limitDates");
    static ref START_DATE: Selector = sel("#start_date");
    static ref DATE_SELECTORS: Selector = sel("#dateSelectors");
}

/// What the shell document contributes to [`super::Page`].
#[derive(Debug, Clone, Default)]
pub struct Shell {
    pub csrf_token: Option<String>,
    pub accounts: AccountSelect,
    pub nav: Vec<NavEntry>,
    pub content_html: String,
}

/// The pieces of a result-status view that a poll tick applies.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub status_text: String,
    pub log: String,
    pub files: Vec<ResultFileRow>,
}

pub fn parse_shell(html: &str) -> Shell {
    let doc = Html::parse_document(html);

    let mut accounts = AccountSelect::default();
    let mut first = None;
    let mut selected = None;
    for opt in doc.select(&ACCOUNT_OPTION) {
        let value = opt.value().attr("value").unwrap_or("").trim().to_string();
        if first.is_none() {
            first = Some(value.clone());
        }
        if opt.value().attr("selected").is_some() {
            selected = Some(value.clone());
        }
        // Placeholder options count for the value but are not accounts.
        if !value.is_empty() {
            accounts.options.push(AccountOption { id: AccountId::new(value), label: text_of(&opt) });
        }
    }
    // A select without a selected option shows its first one; an empty value
    // means no account.
    accounts.value = selected.or(first).filter(|v| !v.is_empty()).map(AccountId::new);

    let nav = doc
        .select(&NAV_ITEM)
        .filter_map(|item| {
            let link = item.select(&NAV_LINK).next()?;
            Some(NavEntry {
                item_id: item.value().attr("id").unwrap_or("").to_string(),
                url: link.value().attr("data-content").unwrap_or("").to_string(),
                label: text_of(&link),
                active: has_class(&item, "active"),
            })
        })
        .collect();

    Shell {
        csrf_token: doc.select(&CSRF).find_map(|i| i.value().attr("value")).map(str::to_string),
        accounts,
        nav,
        content_html: doc.select(&CONTENT_PANE).next().map(|c| c.inner_html()).unwrap_or_default(),
    }
}

pub fn parse_content(html: &str) -> Components {
    let doc = Html::parse_fragment(html);
    let root = doc.root_element();

    Components {
        account_list: parse_account_list(root),
        account_form: parse_account_form(root),
        account_view: first(root, &TEST_CONNECTION)
            .and_then(|b| b.value().attr("data-account-id"))
            .map(AccountId::from),
        folder_table: first(root, &FOLDER_TABLE).map(parse_folder_table),
        scan_panel: parse_scan_panel(root),
        clear_emails: first(root, &CLEAR_EMAILS).is_some(),
        address_groups: parse_address_groups(root),
        filters: first(root, &FILTERS_BODY).map(|body| parse_rows(body, RowShape::Filter)),
        prompts: first(root, &PROMPTS_BODY).map(|body| parse_rows(body, RowShape::Prompt)),
        results_panel: parse_results_panel(root),
        result_files: parse_result_files(root),
        forms: parse_forms(root),
        date_range: parse_date_range(root),
    }
}

/// Scrapes a result-status view; `None` when status or log is missing.
pub fn parse_results_view(html: &str) -> Option<ResultsView> {
    let doc = Html::parse_fragment(html);
    let root = doc.root_element();
    let status = first(root, &RESULTS_STATUS)?;
    let log = first(root, &RESULTS_LOG)?;
    Some(ResultsView {
        status_text: text_of(&status),
        log: field_value(&log),
        files: parse_result_files(root).unwrap_or_default(),
    })
}

fn first<'a>(root: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    root.select(selector).next()
}

fn text_of(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn has_class(el: &ElementRef, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// `display: none`, `d-none` or the `hidden` attribute.
pub fn is_hidden(el: &ElementRef) -> bool {
    if el.value().attr("hidden").is_some() || has_class(el, "d-none") {
        return true;
    }
    el.value()
        .attr("style")
        .map(|s| s.replace(char::is_whitespace, "").to_ascii_lowercase().contains("display:none"))
        .unwrap_or(false)
}

fn visible(root: ElementRef, selector: &Selector) -> bool {
    first(root, selector).map(|el| !is_hidden(&el)).unwrap_or(false)
}

fn disabled(root: ElementRef, selector: &Selector) -> bool {
    first(root, selector).map(|el| el.value().attr("disabled").is_some()).unwrap_or(false)
}

fn checked(root: ElementRef, selector: &Selector) -> bool {
    first(root, selector).map(|el| el.value().attr("checked").is_some()).unwrap_or(false)
}

/// Value of an input, or text of a textarea.
fn field_value(el: &ElementRef) -> String {
    match el.value().name() {
        "textarea" => el.text().collect::<String>().trim().to_string(),
        _ => el.value().attr("value").unwrap_or("").to_string(),
    }
}

fn enclosing_row<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors().filter_map(ElementRef::wrap).find(|a| a.value().name() == "tr")
}

fn parse_account_list(root: ElementRef) -> Option<Vec<AccountRow>> {
    let links: Vec<_> = root.select(&ACCOUNT_LINK).collect();
    if links.is_empty() && first(root, &ADD_ACCOUNT_BUTTON).is_none() {
        return None;
    }
    let mut rows: Vec<AccountRow> = Vec::new();
    for link in links {
        let Some(id) = link.value().attr("data-account-id") else { continue };
        if rows.iter().any(|r| r.id.as_str() == id) {
            continue;
        }
        let label = enclosing_row(&link)
            .and_then(|tr| tr.select(&CELL).next().map(|td| text_of(&td)))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| id.to_string());
        rows.push(AccountRow { id: AccountId::from(id), label });
    }
    Some(rows)
}

fn parse_account_form(root: ElementRef) -> Option<AccountForm> {
    let form_el = first(root, &ACCOUNT_FORM)?;
    let mode = if first(root, &SUBMIT_ADD_ACCOUNT).is_some() {
        AccountFormMode::Add
    } else if let Some(id) = first(root, &SUBMIT_EDIT_ACCOUNT).and_then(|b| b.value().attr("data-account-id")) {
        AccountFormMode::Edit(AccountId::from(id))
    } else {
        AccountFormMode::Generic
    };
    Some(AccountForm {
        mode,
        form: parse_form(form_el, FormKind::EmailAccount),
    })
}

fn parse_folder_table(table: ElementRef) -> Vec<FolderCount> {
    table
        .select(&TBODY_ROW)
        .filter_map(|tr| {
            let cells: Vec<String> = tr.select(&CELL).map(|td| text_of(&td)).collect();
            if cells.len() < 3 {
                return None;
            }
            Some(FolderCount {
                folder: cells[0].clone(),
                email_count: cells[1].parse().ok()?,
                found_count: cells[2].parse().ok()?,
            })
        })
        .collect()
}

fn parse_scan_panel(root: ElementRef) -> Option<ScanPanel> {
    let indicator = first(root, &SCAN_INDICATOR);
    if first(root, &SCAN_BUTTON).is_none() && first(root, &SCAN_TOGGLE).is_none() && indicator.is_none() {
        return None;
    }
    Some(ScanPanel {
        scan_button_disabled: disabled(root, &SCAN_BUTTON),
        stop_button_visible: visible(root, &SCAN_STOP),
        running_indicator: indicator.map(|el| !is_hidden(&el)),
        live: LiveToggle {
            checked: checked(root, &SCAN_TOGGLE),
            pulsed_at: None,
        },
    })
}

fn parse_address_groups(root: ElementRef) -> Vec<AddressGroup> {
    let mut groups: Vec<AddressGroup> = Vec::new();
    for button in root.select(&ADDRESS_BUTTON) {
        let attrs = button.value();
        let Some(address_id) = attrs.attr("data-address-id").or_else(|| attrs.attr("data-email-id")) else {
            continue;
        };
        let state = attrs
            .attr("data-new-state")
            .or_else(|| attrs.attr("data-action"))
            .and_then(|s| s.parse::<AddressState>().ok());

        let idx = match groups.iter().position(|g| g.address_id == address_id) {
            Some(idx) => idx,
            None => {
                let address = attrs
                    .attr("data-address")
                    .map(str::to_string)
                    .or_else(|| {
                        enclosing_row(&button)
                            .and_then(|tr| tr.select(&CELL).next().map(|td| text_of(&td)))
                            .filter(|l| !l.is_empty())
                    })
                    .unwrap_or_else(|| address_id.to_string());
                groups.push(AddressGroup {
                    address_id: address_id.to_string(),
                    address,
                    state: None,
                });
                groups.len() - 1
            }
        };
        if let Some(state) = state {
            if has_class(&button, state.active_class()) {
                groups[idx].state = Some(state);
            }
        }
    }
    groups
}

#[derive(Clone, Copy)]
enum RowShape {
    Filter,
    Prompt,
}

fn row_action(tr: ElementRef, toggle: &Selector) -> Option<RowAction> {
    tr.select(toggle).find_map(|b| {
        let action = b.value().attr("data-action")?.parse::<RowAction>().ok()?;
        has_class(&b, action.active_class()).then_some(action)
    })
}

fn parse_rows(body: ElementRef, shape: RowShape) -> RowList {
    let (row_sel, id_attr, text_sel, toggle_sel): (&Selector, &str, &Selector, &Selector) = match shape {
        RowShape::Filter => (&FILTER_ROW, "data-filter-id", &FILTER_TEXT, &FILTER_TOGGLE),
        RowShape::Prompt => (&PROMPT_ROW, "data-id", &PROMPT_TEXT, &PROMPT_TOGGLE),
    };
    let rows = body
        .select(row_sel)
        .filter_map(|tr| {
            let id = tr.value().attr(id_attr)?;
            let text = tr
                .select(text_sel)
                .next()
                .map(|el| match el.value().name() {
                    "input" | "textarea" => field_value(&el),
                    _ => text_of(&el),
                })
                .unwrap_or_default();
            Some(ListRow {
                id: RowId::from(id),
                default_text: text.clone(),
                text,
                action: row_action(tr, toggle_sel),
                email_count: tr.select(&FILTER_COUNT).next().and_then(|c| text_of(&c).parse().ok()),
            })
        })
        .collect();
    RowList { rows, draft: None }
}

fn parse_results_panel(root: ElementRef) -> Option<ResultsPanel> {
    let status_el = first(root, &RESULTS_STATUS);
    if first(root, &PROCESS_BUTTON).is_none() && first(root, &RESULTS_TOGGLE).is_none() && status_el.is_none() {
        return None;
    }
    let status_text = status_el.map(|el| text_of(&el)).unwrap_or_default();
    Some(ResultsPanel {
        status: ResultStatus::parse(&status_text),
        status_text,
        log: first(root, &RESULTS_LOG).map(|el| field_value(&el)).unwrap_or_default(),
        process_button_disabled: disabled(root, &PROCESS_BUTTON),
        running_indicator: visible(root, &RESULTS_INDICATOR),
        stop_button_visible: visible(root, &RESULTS_STOP),
        live: LiveToggle {
            checked: checked(root, &RESULTS_TOGGLE),
            pulsed_at: None,
        },
        files_table_visible: visible(root, &FILES_TABLE),
    })
}

fn parse_result_files(root: ElementRef) -> Option<Vec<ResultFileRow>> {
    let containers: Vec<ElementRef> = root.select(&FILES_TABLE).chain(root.select(&FILES_LIST)).collect();
    if containers.is_empty() {
        return None;
    }
    let mut files: Vec<ResultFileRow> = Vec::new();
    for container in containers {
        for tr in container.select(&FILE_ROW) {
            let Some(id) = tr.value().attr("data-file-id") else { continue };
            if files.iter().any(|f| f.id.as_str() == id) {
                continue;
            }
            let link = tr.select(&LINK).next();
            let first_cell = tr.select(&CELL).next().map(|td| text_of(&td)).unwrap_or_default();
            let name = link
                .map(|a| text_of(&a))
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| first_cell.clone());
            files.push(ResultFileRow {
                id: RowId::from(id),
                name,
                download_url: link.and_then(|a| a.value().attr("href")).map(str::to_string),
                deleted: first_cell == "deleted",
            });
        }
    }
    Some(files)
}

fn parse_form(form_el: ElementRef, kind: FormKind) -> Form {
    let mut fields = Vec::new();
    for el in form_el.select(&FORM_FIELD) {
        let attrs = el.value();
        let Some(name) = attrs.attr("name") else { continue };
        let value = match attrs.name() {
            "input" => {
                let ty = attrs.attr("type").unwrap_or("text").to_ascii_lowercase();
                match ty.as_str() {
                    "submit" | "button" | "reset" | "image" | "file" => continue,
                    "checkbox" | "radio" => {
                        if attrs.attr("checked").is_none() {
                            continue;
                        }
                        attrs.attr("value").unwrap_or("on").to_string()
                    }
                    _ => attrs.attr("value").unwrap_or("").to_string(),
                }
            }
            "select" => {
                let options: Vec<ElementRef> = el.select(&OPTION).collect();
                options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first())
                    .map(|o| o.value().attr("value").map(str::to_string).unwrap_or_else(|| text_of(o)))
                    .unwrap_or_default()
            }
            _ => field_value(&el),
        };
        fields.push(FormField {
            name: name.to_string(),
            value,
        });
    }
    Form {
        kind,
        action: form_el.value().attr("action").unwrap_or("").to_string(),
        fields,
    }
}

fn parse_forms(root: ElementRef) -> Vec<Form> {
    let kinds: [(&Selector, FormKind); 4] = [
        (&WORDS_FORM, FormKind::Words),
        (&DATES_FORM, FormKind::Dates),
        (&AI_PROMPTS_FORM, FormKind::AiPrompts),
        (&EDIT_JOB_FORM, FormKind::EditJob),
    ];
    kinds
        .iter()
        .filter_map(|(selector, kind)| first(root, selector).map(|f| parse_form(f, *kind)))
        .collect()
}

fn parse_date_range(root: ElementRef) -> Option<DateRange> {
    let limit_el = first(root, &LIMIT_DATES)?;
    let limit = limit_el.value().attr("checked").is_some();
    Some(DateRange {
        field_name: limit_el.value().attr("name").map(str::to_string),
        limit,
        required: first(root, &START_DATE).map(|el| el.value().attr("required").is_some()).unwrap_or(false),
        selectors_visible: first(root, &DATE_SELECTORS).map(|el| !is_hidden(&el)).unwrap_or(limit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_detection() {
        let doc = Html::parse_fragment(
            r#"<span id="a" style="display: none"></span><span id="b" class="d-none"></span>
               <span id="c" hidden></span><span id="d" style="display:inline"></span>"#,
        );
        let hidden: Vec<bool> = ["#a", "#b", "#c", "#d"]
            .iter()
            .map(|id| is_hidden(&doc.select(&sel(id)).next().unwrap()))
            .collect();
        assert_eq!(hidden, vec![true, true, true, false]);
    }

    #[test]
    fn select_without_selected_option_uses_first() {
        let shell = parse_shell(
            r#"<select id="emailAccountSelect"><option value="4">x@y.z</option><option value="5">q@y.z</option></select>"#,
        );
        assert_eq!(shell.accounts.value, Some(AccountId::from("4")));
        let empty = parse_shell(r#"<select id="emailAccountSelect"></select>"#);
        assert_eq!(empty.accounts.value, None);
    }

    #[test]
    fn folder_rows_skip_malformed_counts() {
        let c = parse_content(
            r#"<table id="emailFolderTable"><tbody>
                <tr><td>INBOX</td><td>10</td><td>4</td></tr>
                <tr><td>Broken</td><td>n/a</td><td>1</td></tr>
            </tbody></table>"#,
        );
        let folders = c.folder_table.unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].folder, "INBOX");
    }

    #[test]
    fn unchecked_checkbox_is_not_submitted() {
        let c = parse_content(
            r#"<form id="datesForm" action="/dates">
                <input type="checkbox" name="limit_dates" id="limitDates">
                <input type="text" name="start_date" id="start_date" value="">
                <button type="submit">Save</button>
            </form>"#,
        );
        let form = c.form(FormKind::Dates).unwrap();
        assert_eq!(form.get("limit_dates"), None);
        assert_eq!(form.get("start_date"), Some(""));
        assert_eq!(form.endpoint(), "/dates");
    }
}
