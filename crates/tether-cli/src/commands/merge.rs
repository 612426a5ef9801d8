//! `tether merge` command - Merge the user branch into the default branch.

use std::io::IsTerminal;

use anyhow::{Context, Result, bail};
use inquire::Text;
use tether_gitea::RequestExtras;

use super::TargetArgs;
use super::utils;
use crate::output;

/// Run the merge command.
pub fn run(target: &TargetArgs, json: bool, description: Option<&str>) -> Result<()> {
    let description = match description {
        Some(text) => text.to_string(),
        None if !json && std::io::stdin().is_terminal() => Text::new("Pull request description:")
            .with_help_message("Leave empty for none")
            .prompt()
            .context("Failed to read description")?,
        None => String::new(),
    };

    let rt = tokio::runtime::Runtime::new()?;
    let (branch, status) = rt.block_on(async {
        let (_, merger) = utils::open_merger(target, |_| {})?;
        let spinner = output::spinner("Merging into the default branch...");
        let status = merger
            .merge_master_branch(&description, &RequestExtras::default())
            .await;
        spinner.finish_and_clear();
        anyhow::Ok((merger.params().user_branch.clone(), status))
    })?;

    if json {
        utils::print_json(&status)?;
    }
    utils::ensure_ok(&status)?;

    if status.conflict {
        if !json {
            output::warn("The default branch has changes that conflict with this branch.");
            if !status.pull_request.is_empty() {
                output::detail(&format!("  Resolve them in {}", status.pull_request));
            }
        }
        bail!("Merge blocked by conflicts");
    }

    output::success(&format!("The default branch now contains '{branch}'"));
    if status.user_branch_deleted {
        output::info(&format!("Deleted fully merged branch '{branch}'"));
    }
    Ok(())
}
