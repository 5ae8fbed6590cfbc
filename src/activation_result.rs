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

//! Structured records of an activation: one [`MethodActivationResult`] per
//! candidate, aggregated into an [`ActivationResult`].

use std::fmt;

use crate::method::MethodInfo;
use crate::methods::FAKE_SUCCESS_NAME;

/// The stage at which a method attempt was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The method does not support the current platform.
    PlatformSupport,
    /// The requirements check rejected the method.
    Requirements,
    /// The enter/heartbeat step ran; also the stage of a success.
    Activation,
    /// The method was never tried because an earlier one won.
    None,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::PlatformSupport => "PLATFORM_SUPPORT",
            Stage::Requirements => "REQUIREMENTS",
            Stage::Activation => "ACTIVATION",
            Stage::None => "NONE",
        })
    }
}

/// Outcome of considering a single method during activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodActivationResult {
    pub method_name: String,
    pub mode_name: String,
    pub stage: Stage,
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl MethodActivationResult {
    pub(crate) fn success(info: &MethodInfo) -> Self {
        Self {
            method_name: info.name.clone(),
            mode_name: info.mode_name.clone(),
            stage: Stage::Activation,
            success: true,
            failure_reason: None,
        }
    }

    pub(crate) fn failure(info: &MethodInfo, stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            method_name: info.name.clone(),
            mode_name: info.mode_name.clone(),
            stage,
            success: false,
            failure_reason: Some(reason.into()),
        }
    }

    pub(crate) fn unused(info: &MethodInfo) -> Self {
        Self {
            method_name: info.name.clone(),
            mode_name: info.mode_name.clone(),
            stage: Stage::None,
            success: false,
            failure_reason: None,
        }
    }

    /// Whether the method was never tried.
    pub fn is_unused(&self) -> bool {
        !self.success && self.stage == Stage::None && self.failure_reason.is_none()
    }

    /// Short status tag: `SUCCESS`, `FAIL`, `UNSUPPORTED` or `UNUSED`.
    pub fn status_string(&self) -> &'static str {
        if self.success {
            "SUCCESS"
        } else if self.is_unused() {
            "UNUSED"
        } else if self.stage == Stage::PlatformSupport {
            "UNSUPPORTED"
        } else {
            "FAIL"
        }
    }

    fn status_line(&self) -> String {
        if self.success || self.is_unused() {
            return self.status_string().to_string();
        }
        let reason = self.failure_reason.as_deref().unwrap_or("unknown reason");
        format!("{}: {}", self.status_string(), reason)
    }
}

/// Style of [`ActivationResult::get_failure_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTextStyle {
    /// Multi-line report, one section per method.
    Block,
    /// Single line, suitable for logging.
    Inline,
}

/// Aggregate outcome of one activation: every per-method result in the
/// order the methods were considered, plus the winner, if any.
#[derive(Debug, Clone)]
pub struct ActivationResult {
    mode_name: String,
    results: Vec<MethodActivationResult>,
    method: Option<MethodInfo>,
    success: bool,
    real_success: bool,
}

impl ActivationResult {
    pub(crate) fn new(
        mode_name: impl Into<String>,
        results: Vec<MethodActivationResult>,
        method: Option<MethodInfo>,
    ) -> Self {
        debug_assert!(
            results.iter().filter(|result| result.success).count() <= 1,
            "an activation can have at most one successful method"
        );

        let success = results
            .iter()
            .any(|result| result.success && result.stage == Stage::Activation);
        let real_success = success
            && method
                .as_ref()
                .is_some_and(|info| info.name != FAKE_SUCCESS_NAME);

        Self {
            mode_name: mode_name.into(),
            results,
            method,
            success,
            real_success,
        }
    }

    pub fn mode_name(&self) -> &str {
        &self.mode_name
    }

    /// Per-method results, unsupported methods first, then the attempts in
    /// attempt order, then any methods left untried.
    pub fn results(&self) -> &[MethodActivationResult] {
        &self.results
    }

    /// The winning method, `None` if the activation failed.
    pub fn method(&self) -> Option<&MethodInfo> {
        self.method.as_ref()
    }

    /// Whether the mode was activated. May be faked through the
    /// fake-success environment override; see [`Self::real_success`].
    pub fn success(&self) -> bool {
        self.success
    }

    /// Like [`Self::success`], but `false` when the winner is the built-in
    /// fake-success method.
    pub fn real_success(&self) -> bool {
        self.real_success
    }

    /// Human-readable description of a failed activation; empty when the
    /// activation succeeded.
    pub fn get_failure_text(&self, style: FailureTextStyle) -> String {
        if self.success {
            return String::new();
        }

        let header = format!("Could not activate Mode \"{}\"!", self.mode_name);

        if self.results.is_empty() {
            let sep = match style {
                FailureTextStyle::Block => "\n\n",
                FailureTextStyle::Inline => " ",
            };
            return format!("{header}{sep}Did not try any methods!");
        }

        match style {
            FailureTextStyle::Block => {
                let sections: Vec<String> = self
                    .results
                    .iter()
                    .enumerate()
                    .map(|(index, result)| {
                        format!(
                            "{:>3}. {}\n     {}",
                            index + 1,
                            result.method_name,
                            result.status_line()
                        )
                    })
                    .collect();
                format!(
                    "{header}\n\nTried Methods (in the order of attempt):\n\n{}",
                    sections.join("\n\n")
                )
            }
            FailureTextStyle::Inline => {
                let items: Vec<String> = self
                    .results
                    .iter()
                    .enumerate()
                    .map(|(index, result)| {
                        format!("(#{}, {}, {})", index + 1, result.method_name, result.status_line())
                    })
                    .collect();
                format!(
                    "{header} Tried Methods (in the order of attempt): {}.",
                    items.join(", ")
                )
            }
        }
    }

    /// Compact per-method listing with a status column. Untried methods are
    /// marked `*`.
    pub fn get_methods_text(&self) -> String {
        methods_text(&self.results)
    }
}

/// Outcome of probing every method of a mode. Unlike an activation there is
/// no winner: each method that activated was deactivated right away.
#[derive(Debug, Clone)]
pub struct ProbingResults {
    mode_name: String,
    results: Vec<MethodActivationResult>,
}

impl ProbingResults {
    pub(crate) fn new(mode_name: impl Into<String>, results: Vec<MethodActivationResult>) -> Self {
        Self {
            mode_name: mode_name.into(),
            results,
        }
    }

    pub fn mode_name(&self) -> &str {
        &self.mode_name
    }

    pub fn results(&self) -> &[MethodActivationResult] {
        &self.results
    }

    /// Compact per-method listing with a status column.
    pub fn get_methods_text(&self) -> String {
        methods_text(&self.results)
    }
}

fn methods_text(results: &[MethodActivationResult]) -> String {
    let lines: Vec<String> = results
        .iter()
        .enumerate()
        .map(|(index, result)| {
            let status = if result.is_unused() {
                "*"
            } else {
                result.status_string()
            };
            format!("{:>3}. {:<35}  {}", index + 1, result.method_name, status)
        })
        .collect();
    lines.join("\n")
}
