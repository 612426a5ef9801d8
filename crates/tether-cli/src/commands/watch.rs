//! `tether watch` command - Poll the update status until interrupted.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;
use tether_core::MergerState;
use tether_gitea::SyncStatus;

use super::TargetArgs;
use super::utils;
use crate::output;

/// One JSON line per observed change.
#[derive(Debug, Serialize)]
struct WatchEvent<'a> {
    at: DateTime<Local>,
    update: &'a SyncStatus,
}

/// Run the watch command.
pub fn run(target: &TargetArgs, json: bool, interval_secs: Option<u64>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let (_, merger) = utils::open_merger(target, |config| {
            config.auto_check = true;
            if let Some(secs) = interval_secs {
                config.auto_check_interval = Duration::from_secs(secs);
            }
        })?;

        let missing = merger.params().missing();
        if !missing.is_empty() {
            anyhow::bail!("Missing required parameters: {}", missing.join(", "));
        }

        let mut changes = merger.subscribe();
        merger.mount().await;
        output::info(&format!(
            "Watching '{}' every {}s (Ctrl-C to stop)",
            merger.params().user_branch,
            merger.auto_check_interval().as_secs()
        ));

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut last: Option<SyncStatus> = None;

        loop {
            tokio::select! {
                res = &mut ctrl_c => {
                    res?;
                    break;
                }
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = changes.borrow_and_update().clone();
                    if let Some(status) = settled_change(&state, last.as_ref()) {
                        print_change(status, json)?;
                        last = Some(status.clone());
                    }
                }
            }
        }

        merger.dispose();
        output::info("Stopped watching");
        anyhow::Ok(())
    })
}

/// The update status, if a finished check changed it.
fn settled_change<'a>(state: &'a MergerState, last: Option<&SyncStatus>) -> Option<&'a SyncStatus> {
    let status = &state.update_status;
    if state.loading_update || last == Some(status) {
        return None;
    }
    if last.is_none() && *status == SyncStatus::default() {
        return None;
    }
    Some(status)
}

fn print_change(status: &SyncStatus, json: bool) -> Result<()> {
    let now = Local::now();
    if json {
        output::essential(&serde_json::to_string(&WatchEvent {
            at: now,
            update: status,
        })?);
    } else if status.error {
        output::warn(&format!("{} {}", now.format("%H:%M:%S"), status.message));
    } else {
        output::detail(&format!(
            "{} {}",
            now.format("%H:%M:%S"),
            output::status_line("Update", status)
        ));
    }
    Ok(())
}
