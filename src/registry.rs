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

//! The process-wide method registry: mode name → methods in registration
//! order. Populated once at program start (see
//! [`register_default_methods`](crate::register_default_methods)) and read
//! by modes during activation. Registration order is significant: it is the
//! deterministic tie-break of the prioritization.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::debug;

use crate::dbus::NullDbusAdapter;
use crate::error::ConfigError;
use crate::method::{Method, MethodContext};

/// An ordered collection of method descriptors, grouped by mode name.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    methods: Vec<Arc<Method>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a method to its mode's list.
    ///
    /// Fails with [`ConfigError::DuplicateName`] when the mode already
    /// holds the name, and with [`ConfigError::InvalidMethod`] when the
    /// method defines neither an enter nor a heartbeat hook (such a method
    /// could never activate).
    pub fn register(&mut self, method: Method) -> Result<Arc<Method>, ConfigError> {
        if self.find(method.mode_name(), method.name()).is_some() {
            return Err(ConfigError::DuplicateName {
                mode_name: method.mode_name().to_string(),
                name: method.name().to_string(),
            });
        }

        // Hook factories are side-effect free, so probing one instance is
        // enough to learn the method's capabilities.
        let probe = method.instantiate(&MethodContext {
            dbus: Arc::new(NullDbusAdapter),
        });
        if probe.enter.is_none() && probe.heartbeat.is_none() {
            return Err(ConfigError::InvalidMethod(method.name().to_string()));
        }

        debug!(
            target: "MethodRegistry::register",
            "registered method \"{}\" for mode \"{}\"", method.name(), method.mode_name()
        );
        let method = Arc::new(method);
        self.methods.push(Arc::clone(&method));
        Ok(method)
    }

    /// The methods of `mode_name` in registration order; empty for an
    /// unknown mode.
    pub fn methods_for(&self, mode_name: &str) -> Vec<Arc<Method>> {
        self.methods
            .iter()
            .filter(|method| method.mode_name() == mode_name)
            .cloned()
            .collect()
    }

    pub fn find(&self, mode_name: &str, method_name: &str) -> Option<Arc<Method>> {
        self.methods
            .iter()
            .find(|method| method.mode_name() == mode_name && method.name() == method_name)
            .cloned()
    }
}

fn global() -> &'static Mutex<MethodRegistry> {
    static GLOBAL: OnceLock<Mutex<MethodRegistry>> = OnceLock::new();
    GLOBAL.get_or_init(|| Mutex::new(MethodRegistry::new()))
}

/// Registers a method in the process-wide registry.
pub fn register(method: Method) -> Result<Arc<Method>, ConfigError> {
    global()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .register(method)
}

/// The process-wide registry's methods for `mode_name`, in registration
/// order.
pub fn methods_for(mode_name: &str) -> Vec<Arc<Method>> {
    global()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .methods_for(mode_name)
}

/// Looks a method up in the process-wide registry.
pub fn find(mode_name: &str, method_name: &str) -> Option<Arc<Method>> {
    global()
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .find(mode_name, method_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::MethodHooks;
    use crate::platform::PlatformType;

    fn enter_only(name: &str, mode_name: &str) -> Method {
        Method::new(name, mode_name, &[PlatformType::Any], |_| MethodHooks {
            enter: Some(Box::new(|| Ok(()))),
            ..Default::default()
        })
    }

    #[test]
    fn test_register_and_find() {
        let mut registry = MethodRegistry::new();
        registry.register(enter_only("A", "foo")).unwrap();
        assert!(registry.find("foo", "A").is_some());
        assert!(registry.find("foo", "B").is_none());
        assert!(registry.find("bar", "A").is_none());
    }

    #[test]
    fn test_methods_for_keeps_registration_order() {
        let mut registry = MethodRegistry::new();
        registry.register(enter_only("B", "foo")).unwrap();
        registry.register(enter_only("A", "foo")).unwrap();
        registry.register(enter_only("C", "bar")).unwrap();

        let names: Vec<String> = registry
            .methods_for("foo")
            .iter()
            .map(|method| method.name().to_string())
            .collect();
        assert_eq!(names, ["B", "A"]);
        assert!(registry.methods_for("baz").is_empty());
    }

    #[test]
    fn test_duplicate_name_within_a_mode_is_rejected() {
        let mut registry = MethodRegistry::new();
        registry.register(enter_only("A", "foo")).unwrap();
        let err = registry.register(enter_only("A", "foo")).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateName {
                mode_name: "foo".to_string(),
                name: "A".to_string(),
            }
        );
    }

    #[test]
    fn test_same_name_in_another_mode_is_allowed() {
        let mut registry = MethodRegistry::new();
        registry.register(enter_only("A", "foo")).unwrap();
        assert!(registry.register(enter_only("A", "bar")).is_ok());
    }

    #[test]
    fn test_method_without_enter_and_heartbeat_is_rejected() {
        let mut registry = MethodRegistry::new();
        let hollow = Method::new("hollow", "foo", &[PlatformType::Any], |_| MethodHooks {
            exit: Some(Box::new(|| Ok(()))),
            ..Default::default()
        });
        let err = registry.register(hollow).unwrap_err();
        assert_eq!(err, ConfigError::InvalidMethod("hollow".to_string()));
    }

    #[test]
    fn test_heartbeat_only_method_is_accepted() {
        let mut registry = MethodRegistry::new();
        let heartbeat_only = Method::new("hb", "foo", &[PlatformType::Any], |_| MethodHooks {
            heartbeat: Some(Box::new(|| Ok(()))),
            ..Default::default()
        });
        assert!(registry.register(heartbeat_only).is_ok());
    }
}
