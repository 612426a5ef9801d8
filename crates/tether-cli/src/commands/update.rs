//! `tether update` command - Merge the default branch into the user branch.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde::Serialize;
use tether_core::{ClickOutcome, Dialog, TargetFile, UpdateGate};
use tether_gitea::RequestExtras;

use super::TargetArgs;
use super::utils;
use crate::output;

/// The CLI has no open editor; it tells the user to refresh instead.
struct WorkingCopy {
    branch: String,
}

impl TargetFile for WorkingCopy {
    async fn load(&self) {
        output::info(&format!(
            "Pull '{}' to pick up the changes in your working copy.",
            self.branch
        ));
    }
}

/// JSON output for the update command.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum UpdateOutput<'a> {
    Updated,
    Refused { dialog: &'a Dialog },
    Failed { dialog: &'a Dialog },
}

/// Run the update command.
pub fn run(target: &TargetArgs, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let (config, merger) = utils::open_merger(target, |_| {})?;
        let branch = merger.params().user_branch.clone();
        let gate = UpdateGate::new(Arc::new(merger), WorkingCopy { branch })
            .with_settle_delay(config.sync.settle_delay());

        let spinner = output::spinner("Checking for updates from the default branch...");
        let checked = gate
            .merger()
            .check_update_status(&RequestExtras::default())
            .await;
        if checked.error {
            spinner.finish_and_clear();
            return utils::ensure_ok(&checked).map(|()| None);
        }
        if checked.is_pending() {
            spinner.set_message("Updating from the default branch...");
        }
        let outcome = gate.on_click().await;
        spinner.finish_and_clear();
        anyhow::Ok(Some(outcome))
    })?;

    let Some(outcome) = outcome else {
        return Ok(());
    };

    match &outcome {
        ClickOutcome::Updated => {
            if json {
                utils::print_json(&UpdateOutput::Updated)?;
            }
            output::success("Updated from the default branch");
            Ok(())
        }
        ClickOutcome::Refused(dialog) if dialog.title == "Up-to-date" => {
            if json {
                utils::print_json(&UpdateOutput::Refused { dialog })?;
            }
            output::success("Already up to date");
            Ok(())
        }
        ClickOutcome::Refused(dialog) => {
            if json {
                utils::print_json(&UpdateOutput::Refused { dialog })?;
            } else {
                output::dialog(dialog);
            }
            bail!("Update refused: {}", dialog.title);
        }
        ClickOutcome::Failed(dialog) => {
            if json {
                utils::print_json(&UpdateOutput::Failed { dialog })?;
            } else {
                output::dialog(dialog);
            }
            bail!("Update failed: {}", dialog.title);
        }
    }
}
