// Copyright (C) 2025  Rafael Carvalho <contact@rafaelrc.com>

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as published by
// the Free Software Foundation.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

// SPDX-License-Identifier: GPL-3.0-only

//! The periodic heartbeat task of an active method. One thread per mode,
//! ticking the method's heartbeat hook until told to stop.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::method::MethodHooks;

/// How long deactivation waits for the heartbeat thread to wind down before
/// detaching it.
pub(crate) const HEARTBEAT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) struct Heartbeat {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
    method_name: String,
}

impl Heartbeat {
    /// Spawns the ticking thread. The hooks are shared with the owning
    /// mode, which locks them again during deactivation; a tick therefore
    /// never races the exit hook.
    pub(crate) fn start(
        method_name: String,
        hooks: Arc<Mutex<MethodHooks>>,
        period: Duration,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let name = method_name.clone();
        let thread = thread::spawn(move || {
            debug!(
                target: "Heartbeat::run",
                "heartbeat for \"{name}\" started, period {period:?}"
            );
            loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        let mut hooks = match hooks.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        let Some(heartbeat) = hooks.heartbeat.as_mut() else {
                            break;
                        };
                        // Tick failures do not take the mode down once it
                        // is active; they are only logged.
                        if let Err(err) = heartbeat() {
                            warn!(
                                target: "Heartbeat::run",
                                "heartbeat of \"{name}\" failed: {err}"
                            );
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!(target: "Heartbeat::run", "heartbeat for \"{name}\" stopped");
            let _ = done_tx.send(());
        });

        Self {
            stop_tx,
            done_rx,
            thread: Some(thread),
            method_name,
        }
    }

    /// Signals the thread to stop and waits for quiescence, bounded by
    /// [`HEARTBEAT_STOP_TIMEOUT`]. On timeout the thread is detached and
    /// cleanup proceeds without it.
    pub(crate) fn stop(mut self) {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(HEARTBEAT_STOP_TIMEOUT) {
            Ok(()) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
            }
            Err(_) => {
                warn!(
                    target: "Heartbeat::stop",
                    "heartbeat of \"{}\" did not stop within {HEARTBEAT_STOP_TIMEOUT:?}, detaching it",
                    self.method_name
                );
            }
        }
    }
}
