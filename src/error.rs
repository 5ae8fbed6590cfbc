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

//! Error types surfaced by mode construction and activation.

use std::fmt;

use thiserror::Error;

use crate::activation_result::{ActivationResult, FailureTextStyle};

/// Configuration mistakes. These are raised before any side effect and are
/// never routed through a mode's on-fail action.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A method name that is not part of the selected method set.
    #[error("unknown method name \"{name}\" for mode \"{mode_name}\"")]
    UnknownMethodName { mode_name: String, name: String },

    /// A method name listed more than once in the priority order.
    #[error("method \"{0}\" appears more than once in methods_priority")]
    DuplicatePriority(String),

    /// A malformed priority order, e.g. more than one `"*"`.
    #[error("invalid methods_priority: {0}")]
    InvalidMethodsPriority(String),

    /// Registering a method under a name its mode already holds.
    #[error("mode \"{mode_name}\" already has a method named \"{name}\"")]
    DuplicateName { mode_name: String, name: String },

    /// A method defining neither an enter nor a heartbeat hook can never
    /// reach the active state.
    #[error("method \"{0}\" defines neither an enter nor a heartbeat hook")]
    InvalidMethod(String),
}

/// Returned (or handed to the on-fail action) when no method could activate
/// a mode. Carries the aggregate result of every attempt.
#[derive(Debug, Clone)]
pub struct ActivationError {
    pub result: ActivationResult,
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.result.get_failure_text(FailureTextStyle::Block))
    }
}

impl std::error::Error for ActivationError {}

/// Everything `Mode::enter` can fail with.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Activation(#[from] ActivationError),
}
