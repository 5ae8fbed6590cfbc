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

//! Inhibition through `org.gnome.SessionManager`, which takes a flag mask
//! selecting what to inhibit. The toplevel XID argument is always zero as
//! there is no window associated with the caller.

use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use super::{dbus_enter_error, APP_NAME, INHIBIT_REASON};
use crate::dbus::{BusType, CallArgs, CallReply, DbusMethodCall};
use crate::method::{Method, MethodError, MethodHooks};
use crate::platform::PlatformType;
use crate::{KEEP_PRESENTING, KEEP_RUNNING};

const SERVICE: &str = "org.gnome.SessionManager";
const PATH: &str = "/org/gnome/SessionManager";
const INTERFACE: &str = "org.gnome.SessionManager";

/// `org.gnome.SessionManager` inhibit flag bits.
const INHIBIT_SUSPEND: u32 = 4;
const INHIBIT_IDLE: u32 = 8;

pub(crate) fn keep_running() -> Method {
    session_manager_method(KEEP_RUNNING, INHIBIT_SUSPEND)
}

pub(crate) fn keep_presenting() -> Method {
    session_manager_method(KEEP_PRESENTING, INHIBIT_SUSPEND | INHIBIT_IDLE)
}

fn session_manager_method(mode_name: &'static str, flags: u32) -> Method {
    Method::new(SERVICE, mode_name, &[PlatformType::UnixLikeFoss], move |ctx| {
        let cookie: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));

        let enter_dbus = Arc::clone(&ctx.dbus);
        let enter_cookie = Arc::clone(&cookie);
        let exit_dbus = Arc::clone(&ctx.dbus);

        MethodHooks {
            caniuse: None,
            enter: Some(Box::new(move || {
                let call = DbusMethodCall {
                    bus: BusType::Session,
                    service: SERVICE,
                    path: PATH,
                    interface: INTERFACE,
                    member: "Inhibit",
                };
                let reply = enter_dbus
                    .call(
                        &call,
                        CallArgs::AppXidReasonFlags {
                            app: APP_NAME,
                            xid: 0,
                            reason: INHIBIT_REASON,
                            flags,
                        },
                    )
                    .map_err(dbus_enter_error)?;
                let CallReply::Cookie(value) = reply else {
                    return Err(MethodError::EnterFailed(
                        "Inhibit did not return a cookie".to_string(),
                    ));
                };
                *enter_cookie
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(value);
                info!(
                    target: "GnomeSessionInhibit::enter",
                    "inhibited with flags {flags:#x} (cookie {value})"
                );
                Ok(())
            })),
            heartbeat: None,
            exit: Some(Box::new(move || {
                let taken = cookie
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                let Some(value) = taken else {
                    return Ok(());
                };
                let call = DbusMethodCall {
                    bus: BusType::Session,
                    service: SERVICE,
                    path: PATH,
                    interface: INTERFACE,
                    member: "Uninhibit",
                };
                exit_dbus
                    .call(&call, CallArgs::Cookie(value))
                    .map_err(|err| MethodError::ExitFailed(err.to_string()))?;
                info!(target: "GnomeSessionInhibit::exit", "released cookie {value}");
                Ok(())
            })),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbus::{DbusAdapter, DbusError};
    use crate::method::{activate_method, MethodContext};

    /// Adapter asserting on the GNOME call shape and capturing the flags.
    struct FlagCheckingAdapter {
        seen_flags: Mutex<Vec<u32>>,
    }

    impl DbusAdapter for FlagCheckingAdapter {
        fn call(&self, call: &DbusMethodCall, args: CallArgs<'_>) -> Result<CallReply, DbusError> {
            match args {
                CallArgs::AppXidReasonFlags { xid, flags, .. } => {
                    assert_eq!(call.service, SERVICE);
                    assert_eq!(call.member, "Inhibit");
                    assert_eq!(xid, 0);
                    self.seen_flags.lock().unwrap().push(flags);
                    Ok(CallReply::Cookie(7))
                }
                CallArgs::Cookie(_) => {
                    assert_eq!(call.member, "Uninhibit");
                    Ok(CallReply::Empty)
                }
                CallArgs::AppReason { .. } => panic!("unexpected two-argument Inhibit"),
            }
        }
    }

    #[test]
    fn test_running_and_presenting_flag_masks() {
        let adapter = Arc::new(FlagCheckingAdapter {
            seen_flags: Mutex::new(Vec::new()),
        });
        let ctx = MethodContext {
            dbus: Arc::clone(&adapter) as Arc<dyn DbusAdapter>,
        };

        let (result, _) = activate_method(&keep_running(), &ctx);
        assert!(result.success);
        let (result, _) = activate_method(&keep_presenting(), &ctx);
        assert!(result.success);

        assert_eq!(*adapter.seen_flags.lock().unwrap(), vec![4, 12]);
    }

    #[test]
    fn test_exit_revokes_the_cookie_once() {
        let adapter = Arc::new(FlagCheckingAdapter {
            seen_flags: Mutex::new(Vec::new()),
        });
        let ctx = MethodContext {
            dbus: Arc::clone(&adapter) as Arc<dyn DbusAdapter>,
        };

        let (result, active) = activate_method(&keep_running(), &ctx);
        assert!(result.success);
        let active = active.unwrap();
        let mut hooks = active.hooks.lock().unwrap();
        let exit = hooks.exit.as_mut().unwrap();
        exit().unwrap();
        // Repeating the call without a cookie is a no-op.
        exit().unwrap();
    }
}
