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

//! Platform identification and the tag matching used to decide whether a
//! method may run on the current system.

use std::fmt;

/// The platform this process is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Windows,
    Macos,
    Linux,
    Freebsd,
    /// Anything outside the known set. Only methods tagged
    /// [`PlatformType::Any`] are considered on such hosts.
    Unknown,
}

impl Platform {
    /// Detects the platform of the running process.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "freebsd") {
            Platform::Freebsd
        } else {
            Platform::Unknown
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Windows => "WINDOWS",
            Platform::Macos => "MACOS",
            Platform::Linux => "LINUX",
            Platform::Freebsd => "FREEBSD",
            Platform::Unknown => "UNKNOWN",
        })
    }
}

/// A platform tag a method may declare support for. Besides the concrete
/// platforms there are composite tags which expand during matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformType {
    Windows,
    Macos,
    Linux,
    Freebsd,
    /// Any BSD system.
    Bsd,
    /// Any free unix-like system: Linux or a BSD.
    UnixLikeFoss,
    /// Matches every platform.
    Any,
}

impl PlatformType {
    /// Whether this tag covers `platform`, expanding composite tags.
    pub fn matches(self, platform: Platform) -> bool {
        match self {
            PlatformType::Any => true,
            PlatformType::Windows => platform == Platform::Windows,
            PlatformType::Macos => platform == Platform::Macos,
            PlatformType::Linux => platform == Platform::Linux,
            PlatformType::Freebsd | PlatformType::Bsd => platform == Platform::Freebsd,
            PlatformType::UnixLikeFoss => {
                matches!(platform, Platform::Linux | Platform::Freebsd)
            }
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PlatformType::Windows => "WINDOWS",
            PlatformType::Macos => "MACOS",
            PlatformType::Linux => "LINUX",
            PlatformType::Freebsd => "FREEBSD",
            PlatformType::Bsd => "BSD",
            PlatformType::UnixLikeFoss => "UNIX_LIKE_FOSS",
            PlatformType::Any => "ANY",
        })
    }
}

/// Whether any of the `declared` tags covers `platform`.
pub fn platform_supported(platform: Platform, declared: &[PlatformType]) -> bool {
    declared.iter().any(|tag| tag.matches(platform))
}
