use crate::error::{ConsoleError, ConsoleResult};
use crate::poller::{PollKind, Poller, TickSource};
use crate::types::AccountId;

/// Session-wide state that outlives content swaps.
///
/// The selected account is the one every account-scoped request carries;
/// the poller owns the live-update loops started from the current content.
pub struct SessionState {
    selected_account: Option<AccountId>,
    pub polls: Poller,
}

impl SessionState {
    pub fn new(ticks: Box<dyn TickSource>) -> Self {
        Self {
            selected_account: None,
            polls: Poller::new(ticks),
        }
    }

    pub fn selected(&self) -> Option<&AccountId> {
        self.selected_account.as_ref()
    }

    /// Empty ids clear the selection, like an empty select value.
    pub fn select(&mut self, id: Option<AccountId>) {
        let id = id.filter(|id| !id.as_str().trim().is_empty());
        if self.selected_account != id {
            tracing::info!(
                "selected account: {}",
                id.as_ref().map(AccountId::as_str).unwrap_or("<none>")
            );
        }
        self.selected_account = id;
    }

    /// The selected account, or `NoAccountSelected`.
    pub fn require(&self) -> ConsoleResult<AccountId> {
        self.selected_account.clone().ok_or(ConsoleError::NoAccountSelected)
    }

    pub fn is_polling(&self, kind: PollKind) -> bool {
        self.polls.is_running(kind)
    }
}
