// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Invite Commands

use anyhow::{Context, Result};
use tidepost_core::{InviteChannel, InviteChannelOptions, InviteHooks};
use tokio::sync::mpsc;

use crate::config::CliConfig;
use crate::display;

enum Event {
    Accepted(String),
    Closed,
}

/// Joins an invite room and prints every acceptance until interrupted.
pub async fn watch(
    config: &CliConfig,
    room: &str,
    limit: Option<f64>,
    creator: bool,
    once: bool,
) -> Result<()> {
    let mut options = InviteChannelOptions::new(config.relay_url()?, room);
    options.limit = limit;
    options.creator = creator;

    let (tx, mut events) = mpsc::unbounded_channel();
    let closed_tx = tx.clone();
    let hooks = InviteHooks::new()
        .on_invite_accepted(move |by| {
            let _ = tx.send(Event::Accepted(by.to_string()));
        })
        .on_close(move || {
            let _ = closed_tx.send(Event::Closed);
        })
        .on_error(|e| display::warning(&format!("Invite channel error: {}", e)));

    let channel = InviteChannel::open(config.connector(), &options, hooks)
        .await
        .context("Failed to join invite room")?;
    display::info(&format!("Waiting for invite acceptance in room {}", room));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(Event::Accepted(by)) => {
                    display::success(&format!("Invite accepted by {}", by));
                    if once {
                        break;
                    }
                }
                Some(Event::Closed) | None => {
                    display::warning("Relay closed the invite channel");
                    break;
                }
            },
        }
    }

    channel.close();
    channel.closed().await;
    Ok(())
}

/// Tells the room that `by` accepted the invite.
pub async fn accept(config: &CliConfig, room: &str, by: &str) -> Result<()> {
    let options = InviteChannelOptions::new(config.relay_url()?, room);
    let channel = InviteChannel::open(config.connector(), &options, InviteHooks::new())
        .await
        .context("Failed to join invite room")?;

    channel
        .notify_accepted(by)
        .context("Failed to send acceptance")?;
    channel.close();
    channel.closed().await;

    display::success(&format!("Acceptance sent to room {}", room));
    Ok(())
}
