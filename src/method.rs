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

//! The method framework. A [`Method`] describes one concrete technique for
//! inhibiting sleep; the lifecycle of a single activation attempt runs
//! through [`activate_method`].

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::activation_result::{MethodActivationResult, Stage};
use crate::dbus::DbusAdapter;
use crate::platform::PlatformType;
use crate::util::{is_env_var_truthy, FORCE_FAILURE_ENV};

/// Period between heartbeat ticks unless the method declares its own.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(55);

/// Failure of a single method hook.
#[derive(Debug, Error)]
pub enum MethodError {
    /// Preconditions are not met on this system (service missing, helper
    /// not installed, ...).
    #[error("requirements not met: {0}")]
    RequirementsFailed(String),

    #[error("failed to enter mode: {0}")]
    EnterFailed(String),

    #[error("heartbeat failed: {0}")]
    HeartbeatFailed(String),

    #[error("failed to exit mode: {0}")]
    ExitFailed(String),

    #[error("{0}")]
    Other(String),
}

/// One lifecycle hook of a method instance.
pub type Hook = Box<dyn FnMut() -> Result<(), MethodError> + Send>;

/// The per-activation lifecycle of a method, as a record of optional hooks.
/// State shared between hooks (an inhibit cookie, a helper process, a
/// worker thread) lives in the closures' captures.
///
/// At least one of `enter` and `heartbeat` must be present; the registry
/// rejects methods providing neither.
#[derive(Default)]
pub struct MethodHooks {
    /// Requirements check. Must be a pure probe without side effects.
    pub caniuse: Option<Hook>,

    /// Performs the inhibit action. Symmetric with `exit`; never invoked
    /// twice without an intervening `exit`.
    pub enter: Option<Hook>,

    /// Periodic liveness action, invoked every heartbeat period while the
    /// mode is held. The first tick runs synchronously during activation.
    pub heartbeat: Option<Hook>,

    /// Reverts `enter`. Idempotent across repeated calls; invoked exactly
    /// once per successful activation.
    pub exit: Option<Hook>,
}

impl fmt::Debug for MethodHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHooks")
            .field("caniuse", &self.caniuse.is_some())
            .field("enter", &self.enter.is_some())
            .field("heartbeat", &self.heartbeat.is_some())
            .field("exit", &self.exit.is_some())
            .finish()
    }
}

/// Context handed to hook factories when a method is instantiated.
#[derive(Clone)]
pub struct MethodContext {
    pub dbus: Arc<dyn DbusAdapter>,
}

type HookFactory = Box<dyn Fn(&MethodContext) -> MethodHooks + Send + Sync>;

/// Descriptor of one activation technique: identity, the platforms it
/// supports, and a factory producing fresh [`MethodHooks`] for every
/// activation attempt. Factories must be side-effect free; side effects
/// belong in the hooks.
pub struct Method {
    name: String,
    mode_name: String,
    supported_platforms: Vec<PlatformType>,
    heartbeat_period: Duration,
    build: HookFactory,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        mode_name: impl Into<String>,
        supported_platforms: &[PlatformType],
        build: impl Fn(&MethodContext) -> MethodHooks + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            mode_name: mode_name.into(),
            supported_platforms: supported_platforms.to_vec(),
            heartbeat_period: DEFAULT_HEARTBEAT_PERIOD,
            build: Box::new(build),
        }
    }

    /// Overrides [`DEFAULT_HEARTBEAT_PERIOD`] for this method.
    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode_name(&self) -> &str {
        &self.mode_name
    }

    pub fn supported_platforms(&self) -> &[PlatformType] {
        &self.supported_platforms
    }

    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_period
    }

    pub fn info(&self) -> MethodInfo {
        MethodInfo {
            name: self.name.clone(),
            mode_name: self.mode_name.clone(),
            supported_platforms: self.supported_platforms.clone(),
        }
    }

    pub(crate) fn instantiate(&self, ctx: &MethodContext) -> MethodHooks {
        (self.build)(ctx)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("mode_name", &self.mode_name)
            .field("supported_platforms", &self.supported_platforms)
            .finish()
    }
}

/// Value snapshot of a method's identity, used in results and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    pub mode_name: String,
    pub supported_platforms: Vec<PlatformType>,
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A successfully activated method: its hooks, shared with the heartbeat
/// thread while the mode is held.
pub(crate) struct ActiveMethod {
    pub(crate) info: MethodInfo,
    pub(crate) hooks: Arc<Mutex<MethodHooks>>,
    pub(crate) has_heartbeat: bool,
    pub(crate) heartbeat_period: Duration,
}

/// Runs the staged activation of a single method: the forced-failure
/// override, the requirements check, `enter`, and the first heartbeat tick.
///
/// The first heartbeat tick runs synchronously here; it decides whether a
/// heartbeat-only method activates at all, and its failure rolls back a
/// succeeded `enter`. The periodic task later waits one full period before
/// the second tick.
pub(crate) fn activate_method(
    method: &Method,
    ctx: &MethodContext,
) -> (MethodActivationResult, Option<ActiveMethod>) {
    let info = method.info();

    if is_env_var_truthy(FORCE_FAILURE_ENV) {
        debug!(
            target: "Method::activate",
            "{FORCE_FAILURE_ENV} is set, failing \"{}\" on purpose", info.name
        );
        return (
            MethodActivationResult::failure(&info, Stage::Activation, "forced failure"),
            None,
        );
    }

    let mut hooks = method.instantiate(ctx);

    if let Some(caniuse) = hooks.caniuse.as_mut() {
        if let Err(err) = caniuse() {
            debug!(
                target: "Method::activate",
                "\"{}\" rejected by its requirements check: {err}", info.name
            );
            return (
                MethodActivationResult::failure(&info, Stage::Requirements, err.to_string()),
                None,
            );
        }
    }

    let entered = match hooks.enter.as_mut() {
        Some(enter) => {
            if let Err(err) = enter() {
                debug!(target: "Method::activate", "\"{}\" failed to enter: {err}", info.name);
                return (
                    MethodActivationResult::failure(
                        &info,
                        failure_stage(&err, Stage::Activation),
                        err.to_string(),
                    ),
                    None,
                );
            }
            true
        }
        None => false,
    };

    if let Some(heartbeat) = hooks.heartbeat.as_mut() {
        if let Err(err) = heartbeat() {
            debug!(
                target: "Method::activate",
                "initial heartbeat of \"{}\" failed: {err}", info.name
            );
            if entered {
                best_effort_exit(&mut hooks, &info);
            }
            return (
                MethodActivationResult::failure(
                    &info,
                    failure_stage(&err, Stage::Activation),
                    err.to_string(),
                ),
                None,
            );
        }
    }

    debug!(target: "Method::activate", "activated \"{}\"", info.name);
    let has_heartbeat = hooks.heartbeat.is_some();
    let heartbeat_period = method.heartbeat_period();
    let active = ActiveMethod {
        info: info.clone(),
        hooks: Arc::new(Mutex::new(hooks)),
        has_heartbeat,
        heartbeat_period,
    };

    (MethodActivationResult::success(&info), Some(active))
}

/// A requirements failure is reported at the requirements stage no matter
/// which hook surfaced it; this is how a missing D-Bus service inside
/// `enter` ends up classified.
fn failure_stage(err: &MethodError, default: Stage) -> Stage {
    match err {
        MethodError::RequirementsFailed(_) => Stage::Requirements,
        _ => default,
    }
}

fn best_effort_exit(hooks: &mut MethodHooks, info: &MethodInfo) {
    if let Some(exit) = hooks.exit.as_mut() {
        if let Err(err) = exit() {
            warn!(
                target: "Method::activate",
                "rolling back \"{}\" after a failed activation also failed: {err}", info.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbus::NullDbusAdapter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ctx() -> MethodContext {
        MethodContext {
            dbus: Arc::new(NullDbusAdapter),
        }
    }

    fn counting_hook(counter: &Arc<AtomicUsize>) -> Hook {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn failing_hook(message: &str, variant: fn(String) -> MethodError) -> Hook {
        let message = message.to_string();
        Box::new(move || Err(variant(message.clone())))
    }

    #[test]
    fn test_enter_only_method_activates() {
        let enters = Arc::new(AtomicUsize::new(0));
        let enters_in = Arc::clone(&enters);
        let method = Method::new("m", "test.mode", &[PlatformType::Any], move |_| MethodHooks {
            enter: Some(counting_hook(&enters_in)),
            ..Default::default()
        });

        let (result, active) = activate_method(&method, &ctx());
        assert!(result.success);
        assert_eq!(result.stage, Stage::Activation);
        assert!(active.is_some());
        assert_eq!(enters.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_heartbeat_only_method_activates_through_first_tick() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_in = Arc::clone(&ticks);
        let method = Method::new("m", "test.mode", &[PlatformType::Any], move |_| MethodHooks {
            heartbeat: Some(counting_hook(&ticks_in)),
            ..Default::default()
        });

        let (result, active) = activate_method(&method, &ctx());
        assert!(result.success);
        let active = active.unwrap();
        assert!(active.has_heartbeat);
        assert_eq!(ticks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_caniuse_failure_is_requirements_stage() {
        let method = Method::new("m", "test.mode", &[PlatformType::Any], |_| MethodHooks {
            caniuse: Some(failing_hook("service gone", MethodError::RequirementsFailed)),
            enter: Some(Box::new(|| Ok(()))),
            ..Default::default()
        });

        let (result, active) = activate_method(&method, &ctx());
        assert!(!result.success);
        assert_eq!(result.stage, Stage::Requirements);
        assert!(result.failure_reason.unwrap().contains("service gone"));
        assert!(active.is_none());
    }

    #[test]
    fn test_enter_failure_is_activation_stage() {
        let method = Method::new("m", "test.mode", &[PlatformType::Any], |_| MethodHooks {
            enter: Some(failing_hook("broke", MethodError::EnterFailed)),
            ..Default::default()
        });

        let (result, active) = activate_method(&method, &ctx());
        assert!(!result.success);
        assert_eq!(result.stage, Stage::Activation);
        assert!(active.is_none());
    }

    #[test]
    fn test_requirements_error_from_enter_is_requirements_stage() {
        let method = Method::new("m", "test.mode", &[PlatformType::Any], |_| MethodHooks {
            enter: Some(failing_hook("no bus", MethodError::RequirementsFailed)),
            ..Default::default()
        });

        let (result, _) = activate_method(&method, &ctx());
        assert_eq!(result.stage, Stage::Requirements);
    }

    #[test]
    fn test_failed_initial_heartbeat_rolls_back_enter() {
        let exits = Arc::new(AtomicUsize::new(0));
        let exits_in = Arc::clone(&exits);
        let method = Method::new("m", "test.mode", &[PlatformType::Any], move |_| MethodHooks {
            enter: Some(Box::new(|| Ok(()))),
            heartbeat: Some(failing_hook("dead", MethodError::HeartbeatFailed)),
            exit: Some(counting_hook(&exits_in)),
            ..Default::default()
        });

        let (result, active) = activate_method(&method, &ctx());
        assert!(!result.success);
        assert_eq!(result.stage, Stage::Activation);
        assert!(active.is_none());
        assert_eq!(exits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_method_info_displays_its_name() {
        let method = Method::new("caffeinate", "test.mode", &[PlatformType::Macos], |_| {
            MethodHooks::default()
        });
        assert_eq!(method.info().to_string(), "caffeinate");
    }
}
