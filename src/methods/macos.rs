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

//! Inhibition on macOS through a long-lived `caffeinate` helper process.
//! `-i` prevents idle sleep; `-d` and `-s` additionally keep the display
//! awake and prevent system sleep on AC power.

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::method::{Method, MethodError, MethodHooks};
use crate::platform::PlatformType;
use crate::{KEEP_PRESENTING, KEEP_RUNNING};

pub(crate) fn keep_running() -> Method {
    caffeinate_method(KEEP_RUNNING, &["-i"])
}

pub(crate) fn keep_presenting() -> Method {
    caffeinate_method(KEEP_PRESENTING, &["-d", "-i", "-s"])
}

fn caffeinate_method(mode_name: &'static str, args: &'static [&'static str]) -> Method {
    Method::new(
        "caffeinate",
        mode_name,
        &[PlatformType::Macos],
        move |_| {
            let child: Arc<Mutex<Option<Child>>> = Arc::new(Mutex::new(None));
            let enter_child = Arc::clone(&child);

            MethodHooks {
                caniuse: None,
                enter: Some(Box::new(move || {
                    debug!(
                        target: "Caffeinate::enter",
                        "spawning caffeinate {}", args.join(" ")
                    );
                    let spawned = Command::new("caffeinate")
                        .args(args)
                        .stdin(Stdio::null())
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .spawn()
                        .map_err(|err| {
                            MethodError::EnterFailed(format!(
                                "failed to spawn caffeinate: {err}"
                            ))
                        })?;
                    debug!(
                        target: "Caffeinate::enter",
                        "caffeinate running with pid {}", spawned.id()
                    );
                    *enter_child
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(spawned);
                    Ok(())
                })),
                heartbeat: None,
                exit: Some(Box::new(move || terminate(&child))),
            }
        },
    )
}

fn terminate(child: &Mutex<Option<Child>>) -> Result<(), MethodError> {
    let Some(mut helper) = child.lock().unwrap_or_else(PoisonError::into_inner).take() else {
        debug!(target: "Caffeinate::exit", "no helper to terminate");
        return Ok(());
    };

    // The helper having exited on its own is not an error.
    if let Ok(Some(status)) = helper.try_wait() {
        debug!(target: "Caffeinate::exit", "caffeinate already exited with {status}");
        return Ok(());
    }

    debug!(target: "Caffeinate::exit", "terminating caffeinate (pid {})", helper.id());
    helper.kill().map_err(|err| {
        MethodError::ExitFailed(format!("failed to terminate caffeinate: {err}"))
    })?;
    let status = helper
        .wait()
        .map_err(|err| MethodError::ExitFailed(format!("failed to reap caffeinate: {err}")))?;

    // A signal-terminated helper reports no exit code; that is the normal
    // outcome of the kill above.
    match status.code() {
        Some(code) if code != 0 => Err(MethodError::ExitFailed(format!(
            "caffeinate exited with status {code}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbus::NullDbusAdapter;
    use crate::method::MethodContext;

    fn ctx() -> MethodContext {
        MethodContext {
            dbus: Arc::new(NullDbusAdapter),
        }
    }

    #[test]
    fn test_exit_before_enter_is_a_no_op() {
        let mut hooks = keep_running().instantiate(&ctx());
        hooks.exit.as_mut().unwrap()().unwrap();
    }

    #[test]
    fn test_descriptor_shape() {
        let method = keep_presenting();
        assert_eq!(method.name(), "caffeinate");
        assert_eq!(method.supported_platforms(), [PlatformType::Macos]);
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_enter_spawns_and_exit_terminates() {
        let mut hooks = keep_running().instantiate(&ctx());
        hooks.enter.as_mut().unwrap()().unwrap();
        hooks.exit.as_mut().unwrap()().unwrap();
        // Exit is idempotent once the helper is gone.
        hooks.exit.as_mut().unwrap()().unwrap();
    }
}
