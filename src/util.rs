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

use std::env;

use log::debug;

/// Truthy ⇒ the built-in fake-success method is injected as the first
/// activation candidate.
pub(crate) const FAKE_SUCCESS_ENV: &str = "WAKEPY_FAKE_SUCCESS";

/// Truthy ⇒ every activation attempt fails. Takes precedence over
/// [`FAKE_SUCCESS_ENV`].
pub(crate) const FORCE_FAILURE_ENV: &str = "WAKEPY_FORCE_FAILURE";

/// Values considered falsy, case-insensitively. Everything else is truthy.
const FALSY_ENV_VAR_VALUES: [&str; 6] = ["", "0", "no", "n", "false", "f"];

/// Whether the environment variable `name` is set to a truthy value.
pub(crate) fn is_env_var_truthy(name: &str) -> bool {
    let Ok(value) = env::var(name) else {
        debug!(target: "is_env_var_truthy", "'{name}' is not set");
        return false;
    };

    if FALSY_ENV_VAR_VALUES.contains(&value.to_lowercase().as_str()) {
        debug!(target: "is_env_var_truthy", "'{name}' has the falsy value '{value}'");
        return false;
    }

    debug!(target: "is_env_var_truthy", "'{name}' has the truthy value '{value}'");
    true
}
