//! `tether check-update` and `tether check-merge` commands.

use anyhow::Result;
use tether_gitea::{RequestExtras, SyncStatus};

use super::TargetArgs;
use super::utils;
use crate::output;

/// Check whether the default branch has changes the user branch lacks.
pub fn run_update(target: &TargetArgs, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let status = rt.block_on(async {
        let (_, merger) = utils::open_merger(target, |_| {})?;
        let spinner = output::spinner("Checking for updates from the default branch...");
        let status = merger.check_update_status(&RequestExtras::default()).await;
        spinner.finish_and_clear();
        anyhow::Ok(status)
    })?;

    report("Update", &status, json)
}

/// Check whether the user branch can be merged into the default branch.
pub fn run_merge(target: &TargetArgs, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let status = rt.block_on(async {
        let (_, merger) = utils::open_merger(target, |_| {})?;
        let spinner = output::spinner("Checking merge status...");
        let status = merger.check_merge_status(&RequestExtras::default()).await;
        spinner.finish_and_clear();
        anyhow::Ok(status)
    })?;

    report("Merge", &status, json)
}

fn report(name: &str, status: &SyncStatus, json: bool) -> Result<()> {
    if json {
        utils::print_json(status)?;
    } else if !status.error {
        output::detail(&output::status_line(name, status));
    }
    utils::ensure_ok(status)
}
