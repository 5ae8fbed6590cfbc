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

use std::sync::{Mutex, PoisonError};

use log::debug;
use zbus::blocking::{Connection, Proxy};

use super::{BusType, CallArgs, CallReply, DbusAdapter, DbusError, DbusMethodCall};

/// The default transport: blocking `zbus` connections to the buses named by
/// the session environment. Connections are established on first use and
/// reused; reply timeouts are those of the underlying client.
#[derive(Debug, Default)]
pub struct ZbusAdapter {
    session: Mutex<Option<Connection>>,
    system: Mutex<Option<Connection>>,
}

impl ZbusAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&self, bus: BusType) -> Result<Connection, DbusError> {
        let slot = match bus {
            BusType::Session => &self.session,
            BusType::System => &self.system,
        };

        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }

        let connection = match bus {
            BusType::Session => Connection::session(),
            BusType::System => Connection::system(),
        }
        .map_err(map_zbus_error)?;

        debug!(target: "ZbusAdapter::connection", "connected to the {bus:?} bus");
        *guard = Some(connection.clone());
        Ok(connection)
    }
}

impl DbusAdapter for ZbusAdapter {
    fn call(&self, call: &DbusMethodCall, args: CallArgs<'_>) -> Result<CallReply, DbusError> {
        let connection = self.connection(call.bus)?;
        let proxy = Proxy::new(&connection, call.service, call.path, call.interface)
            .map_err(map_zbus_error)?;

        debug!(
            target: "ZbusAdapter::call",
            "calling {}.{} on {}{}",
            call.interface, call.member, call.service, call.path
        );

        let reply = match args {
            CallArgs::AppReason { app, reason } => {
                let cookie: u32 = proxy
                    .call(call.member, &(app, reason))
                    .map_err(map_zbus_error)?;
                CallReply::Cookie(cookie)
            }
            CallArgs::Cookie(cookie) => {
                proxy
                    .call::<_, _, ()>(call.member, &(cookie,))
                    .map_err(map_zbus_error)?;
                CallReply::Empty
            }
            CallArgs::AppXidReasonFlags {
                app,
                xid,
                reason,
                flags,
            } => {
                let cookie: u32 = proxy
                    .call(call.member, &(app, xid, reason, flags))
                    .map_err(map_zbus_error)?;
                CallReply::Cookie(cookie)
            }
        };

        Ok(reply)
    }
}

fn map_zbus_error(error: zbus::Error) -> DbusError {
    match error {
        zbus::Error::MethodError(name, message, _) => {
            let message = message.unwrap_or_default();
            match name.as_str() {
                "org.freedesktop.DBus.Error.ServiceUnknown" => DbusError::ServiceUnknown(message),
                "org.freedesktop.DBus.Error.NoReply" => DbusError::NoReply(message),
                "org.freedesktop.DBus.Error.AccessDenied" => DbusError::AccessDenied(message),
                "org.freedesktop.DBus.Error.InvalidArgs" => DbusError::InvalidArgs(message),
                "org.freedesktop.DBus.Error.Disconnected" => DbusError::Disconnected(message),
                _ => DbusError::Other {
                    name: name.to_string(),
                    message,
                },
            }
        }
        // Everything else is a transport-level failure, most commonly the
        // bus address missing from the environment.
        other => DbusError::Disconnected(other.to_string()),
    }
}
