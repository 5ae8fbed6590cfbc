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

//! The D-Bus call surface the inhibit methods depend on. The transport is
//! abstracted behind the [`DbusAdapter`] trait so methods never talk to a
//! bus library directly; [`ZbusAdapter`] is the default binding.

use thiserror::Error;

mod zbus_adapter;

pub use zbus_adapter::ZbusAdapter;

/// Which message bus a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusType {
    Session,
    System,
}

/// Target of one D-Bus method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbusMethodCall {
    pub bus: BusType,
    pub service: &'static str,
    pub path: &'static str,
    pub interface: &'static str,
    pub member: &'static str,
}

/// Arguments of the calls the engine issues, one variant per wire
/// signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallArgs<'a> {
    /// `ss`: application name and inhibit reason.
    AppReason { app: &'a str, reason: &'a str },

    /// `u`: a previously returned inhibit cookie.
    Cookie(u32),

    /// `susu`: application name, toplevel XID, inhibit reason and a flag
    /// mask.
    AppXidReasonFlags {
        app: &'a str,
        xid: u32,
        reason: &'a str,
        flags: u32,
    },
}

/// Reply of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallReply {
    /// `u`: the cookie handed out by an Inhibit call.
    Cookie(u32),

    /// Empty reply body.
    Empty,
}

#[derive(Debug, Error)]
pub enum DbusError {
    #[error("D-Bus service is unknown: {0}")]
    ServiceUnknown(String),

    #[error("D-Bus call did not get a reply: {0}")]
    NoReply(String),

    #[error("D-Bus access denied: {0}")]
    AccessDenied(String),

    #[error("invalid arguments in D-Bus call: {0}")]
    InvalidArgs(String),

    #[error("not connected to the message bus: {0}")]
    Disconnected(String),

    #[error("D-Bus error {name}: {message}")]
    Other { name: String, message: String },
}

/// The transport binding. Implementations must be usable from the heartbeat
/// thread as well as the caller's thread.
pub trait DbusAdapter: Send + Sync {
    fn call(&self, call: &DbusMethodCall, args: CallArgs<'_>) -> Result<CallReply, DbusError>;
}

/// An adapter without a transport; every call fails with
/// [`DbusError::Disconnected`]. Used where no bus is expected, e.g. in
/// tests.
#[derive(Debug, Default)]
pub struct NullDbusAdapter;

impl DbusAdapter for NullDbusAdapter {
    fn call(&self, call: &DbusMethodCall, _args: CallArgs<'_>) -> Result<CallReply, DbusError> {
        Err(DbusError::Disconnected(format!(
            "no D-Bus transport available for call to {}",
            call.service
        )))
    }
}
