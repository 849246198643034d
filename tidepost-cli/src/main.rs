// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tidepost CLI
//!
//! Command-line interface for relay cloud backup and invite signaling.

mod commands;
mod config;
mod display;
mod logging;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

use config::{parse_recovery_key, CliConfig};

#[derive(Parser)]
#[command(name = "tidepost")]
#[command(version, about = "Relay backup and invite signaling for Tidepost")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Relay server URL (overrides TIDEPOST_RELAY_URL)
    #[arg(long, global = true)]
    relay: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Store or retrieve an encrypted backup on the relay
    #[command(subcommand)]
    Backup(BackupCommands),

    /// Invite room signaling
    #[command(subcommand)]
    Invite(InviteCommands),

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Upload an encrypted backup blob
    Upload {
        /// File holding the encrypted backup
        input: PathBuf,

        /// Recovery key (64 hex characters)
        #[arg(long, env = "TIDEPOST_RECOVERY_KEY", hide_env_values = true)]
        recovery_key: String,

        /// Metadata stored next to the blob (JSON object)
        #[arg(long)]
        meta: Option<String>,
    },

    /// Download the latest backup for a recovery key
    Download {
        /// Where to write the backup blob
        output: PathBuf,

        /// Recovery key (64 hex characters)
        #[arg(long, env = "TIDEPOST_RECOVERY_KEY", hide_env_values = true)]
        recovery_key: String,
    },
}

#[derive(Subcommand)]
enum InviteCommands {
    /// Wait for participants to accept an invite
    Watch {
        /// Invite room identifier
        room: String,

        /// Maximum number of participants
        #[arg(long)]
        limit: Option<f64>,

        /// Join as the invite creator
        #[arg(long)]
        creator: bool,

        /// Exit after the first acceptance
        #[arg(long)]
        once: bool,
    },

    /// Announce that an invite was accepted
    Accept {
        /// Invite room identifier
        room: String,

        /// Name announced to the room
        #[arg(long)]
        by: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "tidepost", &mut io::stdout());
        return Ok(());
    }

    let config = CliConfig::load(cli.relay)?;

    match cli.command {
        Commands::Backup(cmd) => match cmd {
            BackupCommands::Upload {
                input,
                recovery_key,
                meta,
            } => {
                let key = parse_recovery_key(&recovery_key)?;
                commands::backup::upload(&config, &key, &input, meta.as_deref()).await?;
            }
            BackupCommands::Download {
                output,
                recovery_key,
            } => {
                let key = parse_recovery_key(&recovery_key)?;
                commands::backup::download(&config, &key, &output).await?;
            }
        },
        Commands::Invite(cmd) => match cmd {
            InviteCommands::Watch {
                room,
                limit,
                creator,
                once,
            } => {
                commands::invite::watch(&config, &room, limit, creator, once).await?;
            }
            InviteCommands::Accept { room, by } => {
                commands::invite::accept(&config, &room, &by).await?;
            }
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
