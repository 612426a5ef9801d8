//! Gate for the "update from default branch" action.
//!
//! [`UpdateGate`] turns the merger's update status plus two editor signals
//! (unsaved content, save in progress) into what the user may do next, and
//! re-checks the remote after every save.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tether_gitea::{BranchSyncApi, RequestExtras, SyncStatus};
use tracing::{debug, info};

use crate::merger::BranchMerger;

/// Pause after a save before trusting the remote state again.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Tooltip shown next to a dialog link.
pub const DIALOG_LINK_TOOLTIP: &str = "Pull-Request URL";

const CONTACT_ADMIN: &str = "Contact your administrator.";

/// Dialog explaining why the update did not (or cannot) happen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dialog {
    pub title: String,
    pub message: String,
    /// Pull request URL, empty when there is nothing to link.
    pub link: String,
}

impl Dialog {
    fn new(title: &str, message: &str, link: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
            link: link.to_string(),
        }
    }
}

/// The update must not run.
#[must_use]
pub const fn is_blocked(status: &SyncStatus, content_is_dirty: bool) -> bool {
    status.conflict || content_is_dirty || status.error
}

/// Pick the dialog for `status`; the first matching rule wins.
#[must_use]
pub fn dialog_for(status: &SyncStatus, content_is_dirty: bool) -> Dialog {
    let link = status.pull_request.as_str();

    if status.conflict {
        return Dialog::new(
            "Conflict Error",
            "It appears that someone has merged changes that conflict with your current \
             merge request. Please contact your administrator.",
            link,
        );
    }
    if status.error && !status.message.is_empty() {
        return Dialog::new("Error", &status.message, link);
    }
    if status.error {
        return Dialog::new("Unknown error.", CONTACT_ADMIN, link);
    }
    if content_is_dirty {
        return Dialog::new("Unsaved content", "Please save and try again", "");
    }
    if !status.merge_needed {
        return Dialog::new("Up-to-date", "Your content is already up-to-date", "");
    }
    Dialog::new("Unknown state.", CONTACT_ADMIN, link)
}

/// Reloads the file being edited once the update landed.
pub trait TargetFile: Send + Sync {
    /// Reload the target file from the (now updated) user branch.
    fn load(&self) -> impl Future<Output = ()> + Send;
}

/// Everything a UI needs to render the update action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateView {
    pub pending: bool,
    pub blocked: bool,
    pub is_loading: bool,
    pub dialog_open: bool,
    pub dialog: Dialog,
}

/// What a click on the update action did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Nothing to do or not allowed; only the dialog was shown.
    Refused(Dialog),
    /// The branch was updated and the target file reloaded.
    Updated,
    /// The update ran but did not succeed cleanly.
    Failed(Dialog),
}

#[derive(Debug, Default)]
struct Flags {
    content_is_dirty: bool,
    is_saving: bool,
    loading: bool,
    dialog_open: bool,
}

/// Derives update-action state from a [`BranchMerger`] and editor signals.
pub struct UpdateGate<C: BranchSyncApi + 'static, L: TargetFile> {
    merger: Arc<BranchMerger<C>>,
    target: L,
    settle_delay: Duration,
    flags: Mutex<Flags>,
}

impl<C: BranchSyncApi + 'static, L: TargetFile> UpdateGate<C, L> {
    /// Create a gate with the default settling delay.
    pub fn new(merger: Arc<BranchMerger<C>>, target: L) -> Self {
        Self {
            merger,
            target,
            settle_delay: DEFAULT_SETTLE_DELAY,
            flags: Mutex::new(Flags::default()),
        }
    }

    /// Override the settling delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// The merger this gate reads from.
    #[must_use]
    pub const fn merger(&self) -> &Arc<BranchMerger<C>> {
        &self.merger
    }

    /// Current view, derived from the latest update status.
    #[must_use]
    pub fn view(&self) -> GateView {
        let state = self.merger.state();
        let flags = self.flags();
        let status = &state.update_status;

        GateView {
            pending: status.is_pending(),
            blocked: is_blocked(status, flags.content_is_dirty),
            is_loading: flags.loading || state.loading_update,
            dialog_open: flags.dialog_open,
            dialog: dialog_for(status, flags.content_is_dirty),
        }
    }

    /// Record whether the editor holds unsaved changes.
    pub fn set_content_dirty(&self, dirty: bool) {
        self.flags().content_is_dirty = dirty;
    }

    /// Dismiss the dialog.
    pub fn close_dialog(&self) {
        self.flags().dialog_open = false;
    }

    /// Handle a click on the update action.
    pub async fn on_click(&self) -> ClickOutcome {
        let view = self.view();
        if view.blocked || !view.pending {
            self.flags().dialog_open = true;
            return ClickOutcome::Refused(view.dialog);
        }

        self.flags().loading = true;
        let status = self.merger.update_user_branch(&RequestExtras::default()).await;

        if status.success && status.message.is_empty() {
            info!("user branch updated, reloading target file");
            self.target.load().await;
            self.flags().loading = false;
            return ClickOutcome::Updated;
        }

        let dialog = dialog_for(&status, self.flags().content_is_dirty);
        let mut flags = self.flags();
        flags.dialog_open = true;
        flags.loading = false;
        ClickOutcome::Failed(dialog)
    }

    /// Feed the editor's "saving" signal.
    ///
    /// When a save finishes (true -> false) the remote may still be
    /// finalizing the commit, so the update status is re-checked only after
    /// the settling delay. A conflict from that check is confirmed by one
    /// more immediate check. Returns the final status of the re-check, or
    /// `None` when the call was not a save completion.
    pub async fn set_saving(&self, is_saving: bool) -> Option<SyncStatus> {
        {
            let mut flags = self.flags();
            let was_saving = std::mem::replace(&mut flags.is_saving, is_saving);
            if is_saving {
                flags.loading = true;
                return None;
            }
            if !was_saving {
                return None;
            }
        }

        debug!(delay_ms = self.settle_delay.as_millis(), "save finished, settling");
        tokio::time::sleep(self.settle_delay).await;

        let none = RequestExtras::default();
        let mut status = self.merger.check_update_status(&none).await;
        if status.conflict {
            debug!("conflict right after save, confirming");
            status = self.merger.check_update_status(&none).await;
        }

        self.flags().loading = false;
        Some(status)
    }

    fn flags(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
