// Copyright (C) 2024-2025  Rafael Carvalho <contact@rafaelrc.com>

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

//! Inhibition on Windows through `SetThreadExecutionState`. The execution
//! state is scoped to the calling thread, so the flags are held by a
//! dedicated worker thread that lives for as long as the mode is active and
//! clears them on its way out.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::debug;

use crate::method::{Method, MethodError, MethodHooks};
use crate::platform::PlatformType;
use crate::{KEEP_PRESENTING, KEEP_RUNNING};

const ES_CONTINUOUS: u32 = 0x8000_0000;
const ES_SYSTEM_REQUIRED: u32 = 0x0000_0001;
const ES_DISPLAY_REQUIRED: u32 = 0x0000_0002;

/// How long enter/exit wait for the worker thread to confirm the state
/// change.
const WORKER_ACK_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) fn keep_running() -> Method {
    execution_state_method(KEEP_RUNNING, ES_CONTINUOUS | ES_SYSTEM_REQUIRED)
}

pub(crate) fn keep_presenting() -> Method {
    execution_state_method(
        KEEP_PRESENTING,
        ES_CONTINUOUS | ES_SYSTEM_REQUIRED | ES_DISPLAY_REQUIRED,
    )
}

fn execution_state_method(mode_name: &'static str, flags: u32) -> Method {
    Method::new(
        "SetThreadExecutionState",
        mode_name,
        &[PlatformType::Windows],
        move |_| {
            let worker: Arc<Mutex<Option<Worker>>> = Arc::new(Mutex::new(None));
            let enter_worker = Arc::clone(&worker);

            MethodHooks {
                caniuse: None,
                enter: Some(Box::new(move || {
                    let mut slot = enter_worker
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if slot.is_some() {
                        return Err(MethodError::EnterFailed(
                            "execution state is already held".to_string(),
                        ));
                    }
                    *slot = Some(Worker::spawn(flags)?);
                    Ok(())
                })),
                heartbeat: None,
                exit: Some(Box::new(move || {
                    let taken = worker
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    match taken {
                        Some(active) => active.stop(),
                        None => Ok(()),
                    }
                })),
            }
        },
    )
}

/// The thread holding the execution state flags.
struct Worker {
    stop_tx: mpsc::Sender<()>,
    ack_rx: mpsc::Receiver<Result<(), String>>,
    thread: JoinHandle<()>,
}

impl Worker {
    fn spawn(flags: u32) -> Result<Self, MethodError> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();

        let thread = thread::spawn(move || {
            let outcome = set_thread_execution_state(flags);
            let ok = outcome.is_ok();
            if ack_tx.send(outcome).is_err() || !ok {
                return;
            }
            debug!(
                target: "ExecutionStateWorker::run",
                "holding execution state {flags:#010x}"
            );
            let _ = stop_rx.recv();
            let _ = ack_tx.send(set_thread_execution_state(ES_CONTINUOUS));
        });

        match ack_rx.recv_timeout(WORKER_ACK_TIMEOUT) {
            Ok(Ok(())) => Ok(Self {
                stop_tx,
                ack_rx,
                thread,
            }),
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(MethodError::EnterFailed(message))
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                Err(MethodError::EnterFailed(
                    "execution state thread did not report back".to_string(),
                ))
            }
        }
    }

    fn stop(self) -> Result<(), MethodError> {
        if self.stop_tx.send(()).is_err() {
            return Err(MethodError::ExitFailed(
                "execution state thread is gone".to_string(),
            ));
        }
        match self.ack_rx.recv_timeout(WORKER_ACK_TIMEOUT) {
            Ok(outcome) => {
                let _ = self.thread.join();
                outcome.map_err(MethodError::ExitFailed)
            }
            Err(_) => Err(MethodError::ExitFailed(
                "execution state thread did not confirm the reset".to_string(),
            )),
        }
    }
}

#[cfg(windows)]
fn set_thread_execution_state(flags: u32) -> Result<(), String> {
    #[link(name = "kernel32")]
    extern "system" {
        fn SetThreadExecutionState(es_flags: u32) -> u32;
    }

    // Returns the previous state on success and zero on failure.
    let previous = unsafe { SetThreadExecutionState(flags) };
    if previous == 0 {
        Err(format!("SetThreadExecutionState({flags:#010x}) failed"))
    } else {
        Ok(())
    }
}

#[cfg(not(windows))]
fn set_thread_execution_state(_flags: u32) -> Result<(), String> {
    Err("SetThreadExecutionState is only available on Windows".to_string())
}
