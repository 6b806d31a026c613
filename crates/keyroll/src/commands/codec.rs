//! Encode/decode commands

use anyhow::{Context as _, Result};
use clap::Args;
use keyroll_codec::{EncryptionCodec, PayloadCodec};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::Context;
use crate::wire::PayloadDocument;

#[derive(Args, Debug)]
pub struct CodecArgs {
    /// Payload document to read (default: stdin)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn encode(args: CodecArgs, ctx: &Context) -> Result<()> {
    let messages = read_document(args.input.as_ref())?.into_messages()?;
    let codec = codec(ctx)?;

    let encoded = codec.encode(messages).await?;
    info!("Encoded {} payloads", encoded.len());

    write_document(args.output.as_ref(), &PayloadDocument::from_messages(&encoded))
}

pub async fn decode(args: CodecArgs, ctx: &Context) -> Result<()> {
    let messages = read_document(args.input.as_ref())?.into_messages()?;
    let codec = codec(ctx)?;

    let decoded = codec.decode(messages).await?;
    info!("Decoded {} payloads", decoded.len());

    write_document(args.output.as_ref(), &PayloadDocument::from_messages(&decoded))
}

fn codec(ctx: &Context) -> Result<EncryptionCodec> {
    let backends = ctx.backends()?;
    Ok(EncryptionCodec::new(Arc::new(backends.provider())))
}

fn read_document(input: Option<&PathBuf>) -> Result<PayloadDocument> {
    let content = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    PayloadDocument::parse(&content)
}

fn write_document(output: Option<&PathBuf>, document: &PayloadDocument) -> Result<()> {
    let json = document.to_json()?;
    match output {
        Some(path) => std::fs::write(path, format!("{}\n", json))
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json).context("Failed to write stdout")
        }
    }
}
