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

//! Candidate selection and ordering: the allow/deny filter, the priority
//! order with its `"*"` wildcard, and the platform support split.

use std::sync::Arc;

use crate::activation_result::{MethodActivationResult, Stage};
use crate::error::ConfigError;
use crate::method::Method;
use crate::platform::{platform_supported, Platform};

/// The sentinel expanding to "all remaining methods, in registration
/// order" inside a priority list.
pub const PRIORITY_WILDCARD: &str = "*";

/// Which of a mode's registered methods are candidates for activation.
/// A filter is an allow-list or a deny-list, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MethodSelector {
    /// Every registered method of the mode.
    #[default]
    All,
    /// Only the named methods, in registration order.
    Only(Vec<String>),
    /// Every method except the named ones.
    Omit(Vec<String>),
}

/// Applies the selector. Names that are not part of `methods` fail with
/// [`ConfigError::UnknownMethodName`], for allow- and deny-lists alike.
pub(crate) fn select_methods(
    mode_name: &str,
    methods: &[Arc<Method>],
    selector: &MethodSelector,
) -> Result<Vec<Arc<Method>>, ConfigError> {
    let check_known = |names: &[String]| -> Result<(), ConfigError> {
        for name in names {
            if !methods.iter().any(|method| method.name() == name) {
                return Err(ConfigError::UnknownMethodName {
                    mode_name: mode_name.to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    };

    match selector {
        MethodSelector::All => Ok(methods.to_vec()),
        MethodSelector::Only(names) => {
            check_known(names)?;
            Ok(methods
                .iter()
                .filter(|method| names.iter().any(|name| name == method.name()))
                .cloned()
                .collect())
        }
        MethodSelector::Omit(names) => {
            check_known(names)?;
            Ok(methods
                .iter()
                .filter(|method| !names.iter().any(|name| name == method.name()))
                .cloned()
                .collect())
        }
    }
}

/// Orders `selected` by the priority list. Names before the wildcard form
/// the head, names after it the tail; the wildcard expands to every
/// remaining method in registration order. A missing wildcard is implicit
/// at the end.
pub(crate) fn order_methods_by_priority(
    mode_name: &str,
    selected: Vec<Arc<Method>>,
    priority: Option<&[String]>,
) -> Result<Vec<Arc<Method>>, ConfigError> {
    let Some(priority) = priority else {
        return Ok(selected);
    };

    let mut wildcards = 0usize;
    let mut seen: Vec<&str> = Vec::with_capacity(priority.len());
    for item in priority {
        if item == PRIORITY_WILDCARD {
            wildcards += 1;
            if wildcards > 1 {
                return Err(ConfigError::InvalidMethodsPriority(format!(
                    "at most one \"{PRIORITY_WILDCARD}\" is allowed"
                )));
            }
            continue;
        }
        if seen.contains(&item.as_str()) {
            return Err(ConfigError::DuplicatePriority(item.clone()));
        }
        seen.push(item.as_str());
        if !selected.iter().any(|method| method.name() == item) {
            return Err(ConfigError::UnknownMethodName {
                mode_name: mode_name.to_string(),
                name: item.clone(),
            });
        }
    }

    let wildcard_position = priority
        .iter()
        .position(|item| item == PRIORITY_WILDCARD)
        .unwrap_or(priority.len());

    let find = |name: &String| {
        selected
            .iter()
            .find(|method| method.name() == name)
            .cloned()
            .expect("priority names were validated against the selected set")
    };

    let head: Vec<Arc<Method>> = priority[..wildcard_position].iter().map(find).collect();
    let tail: Vec<Arc<Method>> = priority
        .get(wildcard_position + 1..)
        .unwrap_or_default()
        .iter()
        .map(find)
        .collect();

    let mut ordered = head;
    ordered.extend(
        selected
            .iter()
            .filter(|method| !seen.contains(&method.name()))
            .cloned(),
    );
    ordered.extend(tail);

    Ok(ordered)
}

/// Splits the ordered candidates into (possibly supported, unsupported)
/// for the given platform, preserving order within both halves.
pub(crate) fn split_by_platform_support(
    ordered: Vec<Arc<Method>>,
    platform: Platform,
) -> (Vec<Arc<Method>>, Vec<Arc<Method>>) {
    ordered
        .into_iter()
        .partition(|method| platform_supported(platform, method.supported_platforms()))
}

/// The result recorded for a method dropped at the platform filter.
pub(crate) fn unsupported_result(method: &Method, platform: Platform) -> MethodActivationResult {
    MethodActivationResult::failure(
        &method.info(),
        Stage::PlatformSupport,
        format!("unsupported on {platform}"),
    )
}
