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

//! Inhibition through the freedesktop session services:
//! `org.freedesktop.PowerManagement` to keep the system running and
//! `org.freedesktop.ScreenSaver` to also keep the screen on. Both hand out
//! a cookie on `Inhibit` which `UnInhibit` revokes.

use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use super::{dbus_enter_error, APP_NAME, INHIBIT_REASON};
use crate::dbus::{BusType, CallArgs, CallReply, DbusMethodCall};
use crate::method::{Method, MethodError, MethodHooks};
use crate::platform::PlatformType;
use crate::{KEEP_PRESENTING, KEEP_RUNNING};

struct InhibitTarget {
    service: &'static str,
    path: &'static str,
    interface: &'static str,
    uninhibit_member: &'static str,
}

static POWER_MANAGEMENT: InhibitTarget = InhibitTarget {
    service: "org.freedesktop.PowerManagement",
    path: "/org/freedesktop/PowerManagement/Inhibit",
    interface: "org.freedesktop.PowerManagement.Inhibit",
    uninhibit_member: "UnInhibit",
};

static SCREEN_SAVER: InhibitTarget = InhibitTarget {
    service: "org.freedesktop.ScreenSaver",
    path: "/org/freedesktop/ScreenSaver",
    interface: "org.freedesktop.ScreenSaver",
    uninhibit_member: "UnInhibit",
};

pub(crate) fn keep_running() -> Method {
    inhibit_method("org.freedesktop.PowerManagement", KEEP_RUNNING, &POWER_MANAGEMENT)
}

pub(crate) fn keep_presenting() -> Method {
    inhibit_method("org.freedesktop.ScreenSaver", KEEP_PRESENTING, &SCREEN_SAVER)
}

fn inhibit_method(
    name: &'static str,
    mode_name: &'static str,
    target: &'static InhibitTarget,
) -> Method {
    Method::new(
        name,
        mode_name,
        &[PlatformType::UnixLikeFoss],
        move |ctx| {
            let cookie: Arc<Mutex<Option<u32>>> = Arc::new(Mutex::new(None));

            let enter_dbus = Arc::clone(&ctx.dbus);
            let enter_cookie = Arc::clone(&cookie);
            let exit_dbus = Arc::clone(&ctx.dbus);

            MethodHooks {
                caniuse: None,
                enter: Some(Box::new(move || {
                    let call = DbusMethodCall {
                        bus: BusType::Session,
                        service: target.service,
                        path: target.path,
                        interface: target.interface,
                        member: "Inhibit",
                    };
                    let reply = enter_dbus
                        .call(
                            &call,
                            CallArgs::AppReason {
                                app: APP_NAME,
                                reason: INHIBIT_REASON,
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
                        target: "FreedesktopInhibit::enter",
                        "inhibited through {} (cookie {value})", target.service
                    );
                    Ok(())
                })),
                heartbeat: None,
                exit: Some(Box::new(move || {
                    let Some(value) = exit_cookie_take(&cookie) else {
                        return Ok(());
                    };
                    let call = DbusMethodCall {
                        bus: BusType::Session,
                        service: target.service,
                        path: target.path,
                        interface: target.interface,
                        member: target.uninhibit_member,
                    };
                    exit_dbus
                        .call(&call, CallArgs::Cookie(value))
                        .map_err(|err| MethodError::ExitFailed(err.to_string()))?;
                    info!(
                        target: "FreedesktopInhibit::exit",
                        "released cookie {value} at {}", target.service
                    );
                    Ok(())
                })),
            }
        },
    )
}

fn exit_cookie_take(cookie: &Mutex<Option<u32>>) -> Option<u32> {
    cookie.lock().unwrap_or_else(PoisonError::into_inner).take()
}
