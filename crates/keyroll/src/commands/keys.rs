//! Key management commands

use anyhow::Result;
use clap::{Args, Subcommand};
use keyroll_core::Error;
use keyroll_secrets::{IndexEntry, KeyIndex, KeyProvider};
use serde::Serialize;

use super::Context;
use crate::output;

#[derive(Subcommand, Debug)]
pub enum KeysCommands {
    /// Create the first key if the namespace has none, then rebuild the index
    Seed,

    /// Create a new key and make it active
    Rotate,

    /// Show the active key id
    Active(ActiveArgs),

    /// List keys in the shared index
    List(ListArgs),

    /// Rebuild the shared index from the secret store
    Refresh,
}

#[derive(Args, Debug)]
pub struct ActiveArgs {
    /// Print only the key id
    #[arg(long)]
    pub plain: bool,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct KeyListing {
    namespace: String,
    index_key: String,
    active: Option<String>,
    keys: Vec<IndexEntry>,
}

pub async fn run(cmd: KeysCommands, ctx: &Context) -> Result<()> {
    match cmd {
        KeysCommands::Seed => seed(ctx).await,
        KeysCommands::Rotate => rotate(ctx).await,
        KeysCommands::Active(args) => active(args, ctx).await,
        KeysCommands::List(args) => list(args, ctx).await,
        KeysCommands::Refresh => refresh(ctx).await,
    }
}

async fn seed(ctx: &Context) -> Result<()> {
    let backends = ctx.backends()?;
    let namespace = backends.config.namespace.clone();

    if backends.rotator().seed().await? {
        let active = backends.provider().active_key_id().await?;
        output::success(&format!("Seeded namespace '{}' with key {}", namespace, active));
    } else {
        output::info(&format!("Namespace '{}' already seeded", namespace));
    }
    Ok(())
}

async fn rotate(ctx: &Context) -> Result<()> {
    let backends = ctx.backends()?;
    let key_id = backends.rotator().rotate().await?;

    output::success(&format!("Rotated to new key {}", key_id));
    if let Some(pinned) = &backends.config.active_key_id {
        output::warning(&format!(
            "active-key-id is pinned to {}; the new key will not be used until it is unset",
            pinned
        ));
    }
    Ok(())
}

async fn active(args: ActiveArgs, ctx: &Context) -> Result<()> {
    let backends = ctx.backends()?;
    let key_id = backends.provider().active_key_id().await?;

    if args.plain {
        println!("{}", key_id);
        return Ok(());
    }

    output::header(&format!("Active key for '{}'", backends.config.namespace));
    output::kv("Key id", &key_id);
    if backends.config.active_key_id.is_some() {
        output::kv("Source", "active-key-id override");
    } else {
        output::kv("Source", backends.naming().index_key());
    }
    Ok(())
}

async fn list(args: ListArgs, ctx: &Context) -> Result<()> {
    let backends = ctx.backends()?;
    let naming = backends.naming();
    // Resolved first: an empty index is rebuilt from the store on the way
    let active = active_key_id(&backends.provider()).await?;
    let keys = backends
        .index
        .range_by_rank(naming.index_key(), 0, -1)
        .await?;

    if args.json {
        let listing = KeyListing {
            namespace: naming.namespace().to_string(),
            index_key: naming.index_key().to_string(),
            active,
            keys,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if keys.is_empty() {
        output::info(&format!(
            "No keys indexed for '{}' (run `keyroll keys refresh` or `keyroll keys seed`)",
            naming.namespace()
        ));
        return Ok(());
    }

    output::header(&format!("Keys for '{}' (oldest first)", naming.namespace()));
    if let Some(pinned) = &backends.config.active_key_id {
        output::kv("Pinned", pinned);
    }
    for entry in &keys {
        let marker = if Some(&entry.key_id) == active.as_ref() {
            " (active)"
        } else {
            ""
        };
        output::kv(
            &entry.key_id,
            &format!("{}{}", entry.updated_at().to_rfc3339(), marker),
        );
    }
    Ok(())
}

/// Active key id as the provider resolves it, override included
async fn active_key_id(provider: &KeyProvider) -> Result<Option<String>> {
    match provider.active_key_id().await {
        Ok(key_id) => Ok(Some(key_id)),
        Err(Error::NoActiveKey { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn refresh(ctx: &Context) -> Result<()> {
    let backends = ctx.backends()?;
    let provider = backends.provider();
    provider.refresh().await?;

    match provider.active_key_id().await {
        Ok(key_id) => output::success(&format!("Index rebuilt, active key {}", key_id)),
        Err(e @ Error::NoActiveKey { .. }) => {
            output::warning(&format!("Index rebuilt, but {}", e))
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
