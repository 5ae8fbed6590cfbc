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

//! Scoped keep-awake modes.
//!
//! This crate keeps a workstation from going to idle sleep, and optionally
//! from locking its screen or turning the display off, for exactly as long
//! as a caller-held scope lives. Nothing is changed persistently: every
//! effect is revoked when the scope ends, including when the scope ends by
//! panic.
//!
//! A [`Mode`] names what to inhibit ([`KEEP_RUNNING`] or
//! [`KEEP_PRESENTING`]) and is activated through one of several
//! [`Method`]s, each a concrete technique for one platform family (D-Bus
//! inhibit services, `SetThreadExecutionState`, a `caffeinate` helper).
//! Candidates are filtered by platform, ordered by a configurable
//! priority, and tried one by one; the first success wins and is reverted
//! on scope exit. Every attempt is recorded in an [`ActivationResult`].
//!
//! ```no_run
//! use wakepy::{keep_running, register_default_methods};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     register_default_methods()?;
//!
//!     let mut mode = keep_running().build()?;
//!     let guard = mode.enter()?;
//!     println!("keeping the system awake with {}", guard.method().unwrap());
//!     // ... long running work ...
//!     drop(guard); // sleep is allowed again
//!     Ok(())
//! }
//! ```
//!
//! Two environment variables override activation for test and CI setups:
//! `WAKEPY_FAKE_SUCCESS` injects a no-op method that always activates, and
//! `WAKEPY_FORCE_FAILURE` makes every attempt fail. An unset variable or
//! one of `""`, `"0"`, `"no"`, `"n"`, `"false"`, `"f"` (case-insensitive)
//! counts as false.

pub mod activation_result;
pub mod dbus;
mod error;
mod heartbeat;
mod method;
pub mod methods;
mod mode;
pub mod platform;
mod prioritization;
pub mod registry;
mod util;

/// Mode inhibiting automatic idle suspend.
pub const KEEP_RUNNING: &str = "keep.running";

/// Mode inhibiting automatic idle suspend, the screensaver, screen lock
/// and display power-off.
pub const KEEP_PRESENTING: &str = "keep.presenting";

pub use activation_result::{
    ActivationResult, FailureTextStyle, MethodActivationResult, ProbingResults, Stage,
};
pub use error::{ActivationError, ConfigError, ModeError};
pub use method::{
    Hook, Method, MethodContext, MethodError, MethodHooks, MethodInfo, DEFAULT_HEARTBEAT_PERIOD,
};
pub use methods::{register_default_methods, FAKE_SUCCESS_NAME};
pub use mode::{keep_presenting, keep_running, Mode, ModeBuilder, ModeGuard, OnFail};
pub use platform::{platform_supported, Platform, PlatformType};
pub use prioritization::{MethodSelector, PRIORITY_WILDCARD};
