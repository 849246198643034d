// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Backup Commands
//!
//! Uploads and downloads an already-encrypted backup blob through the relay.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use tidepost_core::{BackupError, RecoveryKey, RelayBackup};

use crate::config::CliConfig;
use crate::display;

fn client(config: &CliConfig) -> Result<RelayBackup> {
    let relay_url = config.relay_url()?;
    Ok(RelayBackup::new(
        config.connector(),
        relay_url,
        config.client.backup.clone(),
    ))
}

fn parse_meta(meta: Option<&str>) -> Result<Option<Map<String, Value>>> {
    let Some(meta) = meta else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(meta).context("--meta must be JSON")? {
        Value::Object(map) => Ok(Some(map)),
        _ => bail!("--meta must be a JSON object"),
    }
}

/// Uploads the contents of `input`.
pub async fn upload(
    config: &CliConfig,
    key: &RecoveryKey,
    input: &Path,
    meta: Option<&str>,
) -> Result<()> {
    let meta = parse_meta(meta)?;
    let blob = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let backup = client(config)?;

    let uploaded_at = backup
        .upload(key.as_bytes(), &blob, meta)
        .await
        .context("Backup upload failed")?;

    display::success(&format!(
        "Uploaded {} bytes (uploadedAtMs {})",
        blob.len(),
        uploaded_at
    ));
    Ok(())
}

/// Downloads the latest backup into `output`.
pub async fn download(config: &CliConfig, key: &RecoveryKey, output: &Path) -> Result<()> {
    let backup = client(config)?;

    let downloaded = match backup.download(key.as_bytes()).await {
        Ok(downloaded) => downloaded,
        Err(BackupError::BackupNotFound) => {
            bail!("No backup stored for this recovery key")
        }
        Err(e) => return Err(e).context("Backup download failed"),
    };

    fs::write(output, &downloaded.backup_blob)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    display::success(&format!(
        "Restored {} bytes to {}",
        downloaded.backup_blob.len(),
        output.display()
    ));
    display::info(&format!("uploadedAtMs: {}", downloaded.uploaded_at_ms));
    if let Some(meta) = downloaded.meta {
        display::info(&format!("meta: {}", Value::Object(meta)));
    }
    Ok(())
}
