// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cancellable wait primitive.
//!
//! Every suspension point of the engine (retry backoff, convergence poll interval,
//! verification grace interval) goes through [`wait`], so a single
//! [`CancellationToken`] threaded from the top-level operation interrupts all of them.
//! The timer is `tokio::time`, so tests drive it with a paused clock.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{Error, Result};

/// Sleep for `duration`, returning early with [`Error::Cancelled`] if `cancel` fires.
///
/// # Arguments
///
/// * `duration` - How long to wait
/// * `cancel` - Token tied to the operation's deadline
/// * `during` - Short description of the suspension point, carried in the error
///
/// # Errors
///
/// Returns [`Error::Cancelled`] when the token is (or becomes) cancelled before the
/// timer elapses.
pub async fn wait(duration: Duration, cancel: &CancellationToken, during: &'static str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled { during });
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled { during }),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Return [`Error::Cancelled`] if the token has already fired.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] when `cancel` is cancelled.
pub fn check(cancel: &CancellationToken, during: &'static str) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled { during })
    } else {
        Ok(())
    }
}

/// Create a child token that also fires once `deadline` elapses.
///
/// The spawned timer is dropped as soon as the parent or child is cancelled.
#[must_use]
pub fn with_deadline(parent: &CancellationToken, deadline: Duration) -> CancellationToken {
    let child = parent.child_token();
    let timer_token = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = timer_token.cancelled() => {}
            () = tokio::time::sleep(deadline) => timer_token.cancel(),
        }
    });
    child
}
