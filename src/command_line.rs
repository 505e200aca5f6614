//! Console input: one line, one gesture.
//!
//! A trailing `!` answers yes to the confirmation a destructive command asks.
//! Everywhere else it is plain text.

use crate::controller::{Command, Direction, ListKind};
use crate::page::{FormKind, AI_PROMPTS_ITEM, EMAIL_ACCOUNTS_ITEM, FILTERS_ITEM};
use crate::types::{AccountId, AddressState, RowAction, RowId};

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Help,
    Show,
    Quit,
    /// One or more commands run in order; `confirmed` pre-answers prompts.
    Commands { commands: Vec<Command>, confirmed: bool },
}

pub const HELP: &str = "\
navigation   nav accounts|filters|prompts|<item-id>   account <id>   show   help   quit
accounts     add-account  view-account <id>  edit-account <id>  create-account  update-account
             delete-account <id> [!]  close  test <id>  test-new
forms        set <words|dates|ai-prompts|edit-job|account> <field> <value..>   submit <form>
             limit-dates on|off
emails       address <address-id> include|ignore|exclude   clear-emails [!]
scan         scan  stop-scan  live scan on|off
rows         filters|prompts add [text..]  filters|prompts draft <text..>  filters draft-action include|exclude
             filters|prompts save|cancel   filter|prompt move <id> up|down   filter|prompt delete <id>
             filter|prompt action <id> include|exclude   file delete <id>
             prompt edit <id> <text..>   prompt save <id>   prompt revert <id>
results      process [!]  stop-processing  live results on|off
viewer       emails filter <id>   emails address <address>   next  prev  open <n>  close-viewer";

/// Commands that can ask for a confirmation; only these take a trailing `!`.
const CONFIRMABLE: [&str; 3] = ["delete-account", "clear-emails", "process"];

fn words(line: &str) -> (Vec<&str>, bool) {
    let mut parts: Vec<&str> = line.split_whitespace().collect();
    if !parts.first().is_some_and(|head| CONFIRMABLE.contains(head)) {
        return (parts, false);
    }
    let mut confirmed = false;
    if let Some(last) = parts.last().copied() {
        if last == "!" {
            confirmed = true;
            parts.pop();
        } else if let Some(stripped) = last.strip_suffix('!') {
            confirmed = true;
            let n = parts.len();
            parts[n - 1] = stripped;
        }
    }
    (parts, confirmed)
}

fn arg<'a>(parts: &[&'a str], idx: usize, what: &str) -> Result<&'a str, String> {
    parts.get(idx).copied().filter(|s| !s.is_empty()).ok_or_else(|| format!("missing {}", what))
}

fn rest(parts: &[&str], from: usize) -> String {
    parts.get(from..).map(|r| r.join(" ")).unwrap_or_default()
}

fn on_off(value: &str) -> Result<bool, String> {
    match value {
        "on" | "yes" | "true" => Ok(true),
        "off" | "no" | "false" => Ok(false),
        other => Err(format!("expected on|off, got '{}'", other)),
    }
}

fn nav_item(name: &str) -> String {
    match name {
        "accounts" | "email-accounts" => EMAIL_ACCOUNTS_ITEM.to_string(),
        "filters" => FILTERS_ITEM.to_string(),
        "prompts" | "ai-prompts" => AI_PROMPTS_ITEM.to_string(),
        other => other.to_string(),
    }
}

fn form_kind(name: &str) -> Result<FormKind, String> {
    match name {
        "words" => Ok(FormKind::Words),
        "dates" => Ok(FormKind::Dates),
        "ai-prompts" | "prompts" => Ok(FormKind::AiPrompts),
        "edit-job" | "job" => Ok(FormKind::EditJob),
        "account" => Ok(FormKind::EmailAccount),
        other => Err(format!("unknown form '{}'", other)),
    }
}

fn list_kind(name: &str) -> Option<ListKind> {
    match name {
        "filter" | "filters" => Some(ListKind::Filters),
        "prompt" | "prompts" => Some(ListKind::Prompts),
        "file" | "files" => Some(ListKind::ResultFiles),
        _ => None,
    }
}

fn one(command: Command) -> Vec<Command> {
    vec![command]
}

pub fn parse_line(line: &str) -> Result<Input, String> {
    let (parts, confirmed) = words(line);
    let Some(&head) = parts.first() else {
        return Ok(Input::Empty);
    };

    let commands = match head {
        "help" | "?" => return Ok(Input::Help),
        "show" | "ls" => return Ok(Input::Show),
        "quit" | "exit" => return Ok(Input::Quit),

        "nav" => one(Command::Navigate(nav_item(arg(&parts, 1, "section")?))),
        "account" => one(Command::SelectAccount(AccountId::from(arg(&parts, 1, "account id")?))),

        "add-account" => one(Command::ShowAddAccount),
        "view-account" => one(Command::ViewAccount(arg(&parts, 1, "account id")?.into())),
        "edit-account" => one(Command::EditAccount(arg(&parts, 1, "account id")?.into())),
        "create-account" => one(Command::SubmitAddAccount),
        "update-account" => one(Command::SubmitEditAccount),
        "delete-account" => one(Command::DeleteAccount(arg(&parts, 1, "account id")?.into())),
        "close" | "cancel" => one(Command::CancelAccountForm),
        "test" => one(Command::TestConnection(arg(&parts, 1, "account id")?.into())),
        "test-new" => one(Command::TestNewConnection),

        "set" => one(Command::SetField {
            form: form_kind(arg(&parts, 1, "form")?)?,
            name: arg(&parts, 2, "field name")?.to_string(),
            value: rest(&parts, 3),
        }),
        "submit" => one(Command::SubmitForm(form_kind(arg(&parts, 1, "form")?)?)),
        "limit-dates" => one(Command::SetDateLimit(on_off(arg(&parts, 1, "on|off")?)?)),

        "address" => one(Command::ToggleAddressState {
            address_id: arg(&parts, 1, "address id")?.to_string(),
            state: arg(&parts, 2, "state")?.parse::<AddressState>()?,
        }),
        "clear-emails" => one(Command::ClearEmails),

        "scan" => one(Command::StartScan),
        "stop-scan" => one(Command::StopScan),
        "process" => one(Command::ProcessResults),
        "stop-processing" => one(Command::StopProcessing),
        "live" => {
            let on = on_off(arg(&parts, 2, "on|off")?)?;
            match arg(&parts, 1, "scan|results")? {
                "scan" => one(Command::SetScanLiveUpdate(on)),
                "results" => one(Command::SetResultsLiveUpdate(on)),
                other => return Err(format!("unknown live update '{}'", other)),
            }
        }

        "emails" => match arg(&parts, 1, "filter|address")? {
            "filter" => one(Command::OpenFilterEmails(RowId::from(arg(&parts, 2, "filter id")?))),
            "address" => one(Command::OpenAddressEmails(arg(&parts, 2, "address")?.to_string())),
            other => return Err(format!("unknown email source '{}'", other)),
        },
        "next" => one(Command::NextBatch),
        "prev" | "previous" => one(Command::PreviousBatch),
        "open" => {
            let n: usize = arg(&parts, 1, "email number")?
                .parse()
                .map_err(|_| "email number must be a positive integer".to_string())?;
            if n == 0 {
                return Err("emails are numbered from 1".to_string());
            }
            one(Command::SelectEmail(n - 1))
        }
        "close-viewer" => one(Command::CloseModal),

        other => match list_kind(other) {
            Some(list) => parse_row_command(list, &parts)?,
            None => return Err(format!("unknown command '{}', try 'help'", other)),
        },
    };
    Ok(Input::Commands { commands, confirmed })
}

fn parse_row_command(list: ListKind, parts: &[&str]) -> Result<Vec<Command>, String> {
    let verb = arg(parts, 1, "row command")?;
    let row_id = || arg(parts, 2, "row id").map(RowId::from);
    Ok(match verb {
        "add" => {
            let text = rest(parts, 2);
            let mut cmds = vec![Command::AddRow(list)];
            if !text.is_empty() {
                cmds.push(Command::EditDraft(list, text));
            }
            cmds
        }
        "draft" => one(Command::EditDraft(list, rest(parts, 2))),
        "draft-action" => one(Command::SetDraftAction(list, arg(parts, 2, "action")?.parse::<RowAction>()?)),
        "cancel" => one(Command::CancelDraft(list)),
        "save" if parts.len() > 2 && list == ListKind::Prompts => one(Command::SavePrompt(row_id()?)),
        "save" => one(Command::SaveDraft(list)),
        "move" => {
            let direction = match arg(parts, 3, "up|down")? {
                "up" => Direction::Up,
                "down" => Direction::Down,
                other => return Err(format!("expected up|down, got '{}'", other)),
            };
            one(Command::MoveRow { list, id: row_id()?, direction })
        }
        "delete" => one(Command::DeleteRow { list, id: row_id()? }),
        "action" => one(Command::SetRowAction {
            list,
            id: row_id()?,
            action: arg(parts, 3, "action")?.parse::<RowAction>()?,
        }),
        "edit" if list == ListKind::Prompts => one(Command::EditPrompt { id: row_id()?, text: rest(parts, 3) }),
        "revert" if list == ListKind::Prompts => one(Command::CancelPromptEdit(row_id()?)),
        other => return Err(format!("unknown {} command '{}'", list, other)),
    })
}
