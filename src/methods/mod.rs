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

//! The shipped activation methods, one module per platform family.

use std::sync::OnceLock;

use log::debug;

use crate::dbus::DbusError;
use crate::error::ConfigError;
use crate::method::MethodError;
use crate::registry;

pub(crate) mod fake;
mod freedesktop;
mod gnome;
mod macos;
mod windows;

pub use fake::FAKE_SUCCESS_NAME;

/// Application name reported to inhibit services.
pub(crate) const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Reason string reported to inhibit services.
pub(crate) const INHIBIT_REASON: &str = "wakelock active";

/// Registers the default method set for both modes in the process-wide
/// registry. Call once at program start; later calls are no-ops.
pub fn register_default_methods() -> Result<(), ConfigError> {
    static DONE: OnceLock<()> = OnceLock::new();
    if DONE.get().is_some() {
        return Ok(());
    }

    registry::register(gnome::keep_running())?;
    registry::register(freedesktop::keep_running())?;
    registry::register(windows::keep_running())?;
    registry::register(macos::keep_running())?;

    registry::register(gnome::keep_presenting())?;
    registry::register(freedesktop::keep_presenting())?;
    registry::register(windows::keep_presenting())?;
    registry::register(macos::keep_presenting())?;

    let _ = DONE.set(());
    debug!(target: "register_default_methods", "registered the default method set");
    Ok(())
}

/// A D-Bus failure while entering: a missing service or a missing bus means
/// the method's requirements are not met on this system; anything else is
/// an activation failure.
pub(crate) fn dbus_enter_error(err: DbusError) -> MethodError {
    let text = err.to_string();
    match err {
        DbusError::ServiceUnknown(_) | DbusError::Disconnected(_) => {
            MethodError::RequirementsFailed(text)
        }
        _ => MethodError::EnterFailed(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_service_maps_to_requirements() {
        let err = dbus_enter_error(DbusError::ServiceUnknown("gone".into()));
        assert!(matches!(err, MethodError::RequirementsFailed(_)));
        let err = dbus_enter_error(DbusError::Disconnected("no bus".into()));
        assert!(matches!(err, MethodError::RequirementsFailed(_)));
    }

    #[test]
    fn test_call_failure_maps_to_enter_failed() {
        let err = dbus_enter_error(DbusError::AccessDenied("denied".into()));
        assert!(matches!(err, MethodError::EnterFailed(_)));
    }
}
