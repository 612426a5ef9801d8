use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tether_core::{BranchMerger, Config, DEFAULT_CONFIG_FILE, MergerConfig, ServerConfig};
use tether_gitea::{Auth, GiteaClient, SecretString, SyncParams, SyncStatus};
use tracing::debug;

use super::TargetArgs;
use crate::output;

/// Load the config file named by `--config`, or `tether.toml` if present.
pub fn load_config(target: &TargetArgs) -> Result<Config> {
    let path = target
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if target.config.is_some() && !path.exists() {
        bail!("Config file not found: {}", path.display());
    }

    Config::load(&path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Token from `--token`, else from the environment; empty when neither is set.
pub fn resolve_token(target: &TargetArgs) -> SecretString {
    let auth = target
        .token
        .clone()
        .map_or_else(Auth::auto, |t| Auth::Token(SecretString::from(t)));

    auth.resolve().unwrap_or_else(|e| {
        debug!(error = %e, "no access token");
        SecretString::from("")
    })
}

/// Combine flags with the config file; flags win. Missing values stay
/// empty so the merger reports them.
pub fn sync_params(target: &TargetArgs, server: &ServerConfig, tokenid: SecretString) -> SyncParams {
    let pick = |flag: &Option<String>, file: &Option<String>| {
        flag.clone().or_else(|| file.clone()).unwrap_or_default()
    };

    SyncParams::new(
        pick(&target.server, &server.url),
        pick(&target.owner, &server.owner),
        pick(&target.repo, &server.repo),
        pick(&target.branch, &server.user_branch),
        tokenid,
    )
}

/// Build a merger from flags and config. `adjust` may tweak the settings.
pub fn open_merger(
    target: &TargetArgs,
    adjust: impl FnOnce(&mut MergerConfig),
) -> Result<(Config, BranchMerger<GiteaClient>)> {
    let config = load_config(target)?;
    let params = sync_params(target, &config.server, resolve_token(target));
    let client = GiteaClient::new().context("Failed to create HTTP client")?;

    let mut merger_config = config.sync.merger_config();
    adjust(&mut merger_config);

    Ok((config, BranchMerger::new(client, params, merger_config)))
}

/// Print `value` as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    output::essential(&serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turn an error status into a command failure.
pub fn ensure_ok(status: &SyncStatus) -> Result<()> {
    if !status.error {
        return Ok(());
    }
    if status.message.is_empty() {
        bail!("Unknown error. Contact your administrator.");
    }
    bail!("{}", status.message);
}
