//! `tether status` command - Display update and merge status.

use anyhow::Result;
use serde::Serialize;
use tether_gitea::{RequestExtras, SyncStatus};

use super::TargetArgs;
use super::utils;
use crate::output;

/// JSON output for the status command.
#[derive(Debug, Serialize)]
struct StatusOutput<'a> {
    branch: &'a str,
    update: &'a SyncStatus,
    merge: &'a SyncStatus,
}

/// Run the status command.
pub fn run(target: &TargetArgs, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let (branch, update, merge) = rt.block_on(async {
        let (_, merger) = utils::open_merger(target, |_| {})?;
        let none = RequestExtras::default();
        let spinner = output::spinner("Checking branch status...");
        let (update, merge) = tokio::join!(
            merger.check_update_status(&none),
            merger.check_merge_status(&none)
        );
        spinner.finish_and_clear();
        anyhow::Ok((merger.params().user_branch.clone(), update, merge))
    })?;
    let (update, merge) = (&update, &merge);

    if json {
        utils::print_json(&StatusOutput {
            branch: &branch,
            update,
            merge,
        })?;
    } else if !update.error && !merge.error {
        output::info(&format!("Branch {branch}"));
        output::detail(&output::status_line("Update", update));
        output::detail(&output::status_line("Merge", merge));
    }

    utils::ensure_ok(update)?;
    utils::ensure_ok(merge)
}
