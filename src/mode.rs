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

//! The mode orchestrator. A [`Mode`] selects among the methods registered
//! for its name, activates the first one that works, supervises it while
//! the caller holds the returned [`ModeGuard`], and deactivates it when the
//! guard goes out of scope, on every path including panics.

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, PoisonError};

use log::{debug, info, warn};

use crate::activation_result::{
    ActivationResult, FailureTextStyle, MethodActivationResult, ProbingResults,
};
use crate::dbus::{DbusAdapter, NullDbusAdapter, ZbusAdapter};
use crate::error::{ActivationError, ConfigError, ModeError};
use crate::heartbeat::Heartbeat;
use crate::method::{activate_method, ActiveMethod, Method, MethodContext, MethodError, MethodInfo};
use crate::methods::fake;
use crate::platform::Platform;
use crate::prioritization::{
    order_methods_by_priority, select_methods, split_by_platform_support, unsupported_result,
    MethodSelector,
};
use crate::registry;
use crate::util::{is_env_var_truthy, FAKE_SUCCESS_ENV, FORCE_FAILURE_ENV};
use crate::{KEEP_PRESENTING, KEEP_RUNNING};

/// What a mode does when no method could be activated.
#[derive(Default)]
pub enum OnFail {
    /// `enter` returns an [`ActivationError`] carrying the aggregate
    /// result.
    #[default]
    Error,
    /// A warning is logged and the scope runs with the mode inactive.
    Warn,
    /// The scope runs with the mode inactive, silently.
    Pass,
    /// The callback is invoked with the aggregate result; the scope then
    /// runs with the mode inactive.
    Callback(Box<dyn FnMut(&ActivationResult) + Send>),
}

impl fmt::Debug for OnFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnFail::Error => "Error",
            OnFail::Warn => "Warn",
            OnFail::Pass => "Pass",
            OnFail::Callback(_) => "Callback(..)",
        })
    }
}

/// Builds a [`ModeBuilder`] for the mode inhibiting automatic idle
/// suspend.
pub fn keep_running() -> ModeBuilder {
    ModeBuilder::new(KEEP_RUNNING)
}

/// Builds a [`ModeBuilder`] for the mode that additionally inhibits the
/// screensaver, screen lock and display power-off.
pub fn keep_presenting() -> ModeBuilder {
    ModeBuilder::new(KEEP_PRESENTING)
}

/// Configures and builds a [`Mode`].
pub struct ModeBuilder {
    name: String,
    method_set: Option<Vec<Arc<Method>>>,
    selector: MethodSelector,
    methods_priority: Option<Vec<String>>,
    on_fail: OnFail,
    dbus_adapter: Option<Arc<dyn DbusAdapter>>,
    platform: Option<Platform>,
}

impl ModeBuilder {
    /// A builder drawing the named mode's methods from the process-wide
    /// registry at [`build`](Self::build) time.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method_set: None,
            selector: MethodSelector::All,
            methods_priority: None,
            on_fail: OnFail::default(),
            dbus_adapter: None,
            platform: None,
        }
    }

    /// A builder using an explicit method set instead of the registry;
    /// this is how custom modes are put together.
    pub fn with_methods(name: impl Into<String>, methods: Vec<Arc<Method>>) -> Self {
        let mut builder = Self::new(name);
        builder.method_set = Some(methods);
        builder
    }

    /// Allow-list filter: use only the named methods. Mutually exclusive
    /// with [`omit`](Self::omit); the later call wins.
    pub fn methods<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector = MethodSelector::Only(names.into_iter().map(Into::into).collect());
        self
    }

    /// Deny-list filter: use everything but the named methods. Mutually
    /// exclusive with [`methods`](Self::methods); the later call wins.
    pub fn omit<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector = MethodSelector::Omit(names.into_iter().map(Into::into).collect());
        self
    }

    /// Priority order for the activation attempts: method names plus at
    /// most one `"*"` standing for "all remaining, in registration order".
    pub fn methods_priority<I, S>(mut self, priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods_priority = Some(priority.into_iter().map(Into::into).collect());
        self
    }

    pub fn on_fail(mut self, on_fail: OnFail) -> Self {
        self.on_fail = on_fail;
        self
    }

    /// Replaces the default D-Bus transport.
    pub fn dbus_adapter(mut self, adapter: Arc<dyn DbusAdapter>) -> Self {
        self.dbus_adapter = Some(adapter);
        self
    }

    /// Overrides platform detection; useful for diagnostics and tests.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Validates the configuration and builds the mode. The registered
    /// method set is snapshotted here; later registry changes do not
    /// affect the built mode.
    pub fn build(self) -> Result<Mode, ConfigError> {
        let (all, explicit) = match self.method_set {
            Some(methods) => (methods, true),
            None => (registry::methods_for(&self.name), false),
        };

        // Registered methods were validated at registration; an explicit
        // set gets the same capability check here.
        if explicit {
            let probe_ctx = MethodContext {
                dbus: Arc::new(NullDbusAdapter),
            };
            for method in &all {
                let probe = method.instantiate(&probe_ctx);
                if probe.enter.is_none() && probe.heartbeat.is_none() {
                    return Err(ConfigError::InvalidMethod(method.name().to_string()));
                }
            }
        }

        let selected = select_methods(&self.name, &all, &self.selector)?;
        if !all.is_empty() && selected.is_empty() {
            warn!(
                target: "ModeBuilder::build",
                "no methods selected for mode \"{}\"; activation will fail", self.name
            );
        }
        debug!(
            target: "ModeBuilder::build",
            "mode \"{}\" built with {} of {} methods selected",
            self.name, selected.len(), all.len()
        );

        Ok(Mode {
            name: self.name,
            methods: selected,
            methods_priority: self.methods_priority,
            on_fail: self.on_fail,
            dbus_adapter: self
                .dbus_adapter
                .unwrap_or_else(|| Arc::new(ZbusAdapter::new())),
            platform: self.platform.unwrap_or_else(Platform::current),
            active: false,
            result: None,
            method: None,
            active_method: None,
            heartbeat: None,
        })
    }
}

/// A caller-held scope during which sleep (and optionally the screen lock)
/// is inhibited. Built through [`keep_running`], [`keep_presenting`] or
/// [`ModeBuilder`]; activated with [`enter`](Mode::enter); deactivated when
/// the returned guard is dropped. The same mode can be entered again after
/// the guard is gone, re-running the whole activation.
pub struct Mode {
    name: String,
    methods: Vec<Arc<Method>>,
    methods_priority: Option<Vec<String>>,
    on_fail: OnFail,
    dbus_adapter: Arc<dyn DbusAdapter>,
    platform: Platform,

    active: bool,
    result: Option<ActivationResult>,
    method: Option<MethodInfo>,
    active_method: Option<ActiveMethod>,
    heartbeat: Option<Heartbeat>,
}

impl Mode {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the mode is currently activated.
    pub fn active(&self) -> bool {
        self.active
    }

    /// The result of the most recent activation, kept after the scope
    /// exits. `None` before the first `enter`.
    pub fn result(&self) -> Option<&ActivationResult> {
        self.result.as_ref()
    }

    /// The active method while the mode is held; `None` otherwise.
    pub fn method(&self) -> Option<&MethodInfo> {
        self.method.as_ref()
    }

    /// Activates the mode and returns the guard that keeps it active.
    ///
    /// Candidates are tried in priority order until one succeeds.
    /// Configuration errors surface immediately; an activation failure is
    /// dispatched through the configured [`OnFail`] action, which for
    /// [`OnFail::Error`] means an error here and for the other actions a
    /// guard over an inactive mode.
    pub fn enter(&mut self) -> Result<ModeGuard<'_>, ModeError> {
        debug!(target: "Mode::enter", "entering mode \"{}\"", self.name);
        self.activate()?;
        Ok(ModeGuard { mode: Some(self) })
    }

    /// Tries every candidate method, deactivating each one right after it
    /// activates. Tells which methods would work on this system; the mode
    /// itself stays inactive.
    pub fn probe_all_methods(&mut self) -> Result<ProbingResults, ConfigError> {
        let ordered = order_methods_by_priority(
            &self.name,
            self.methods.clone(),
            self.methods_priority.as_deref(),
        )?;
        let (candidates, unsupported) = split_by_platform_support(ordered, self.platform);

        let ctx = MethodContext {
            dbus: Arc::clone(&self.dbus_adapter),
        };

        let mut results = Vec::with_capacity(candidates.len() + unsupported.len());
        for method in &candidates {
            let (result, active) = activate_method(method, &ctx);
            if let Some(active) = active {
                let mut hooks = active
                    .hooks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(exit) = hooks.exit.as_mut() {
                    if let Err(err) = exit() {
                        warn!(
                            target: "Mode::probe_all_methods",
                            "failed to deactivate \"{}\" after probing: {err}",
                            active.info.name
                        );
                    }
                }
            }
            results.push(result);
        }
        results.extend(
            unsupported
                .iter()
                .map(|method| unsupported_result(method, self.platform)),
        );

        Ok(ProbingResults::new(self.name.clone(), results))
    }

    fn activate(&mut self) -> Result<(), ModeError> {
        let ordered = order_methods_by_priority(
            &self.name,
            self.methods.clone(),
            self.methods_priority.as_deref(),
        )?;
        let (mut candidates, unsupported) = split_by_platform_support(ordered, self.platform);

        if is_env_var_truthy(FAKE_SUCCESS_ENV) {
            candidates.insert(0, fake::fake_success(&self.name));
            if is_env_var_truthy(FORCE_FAILURE_ENV) {
                warn!(
                    target: "Mode::activate",
                    "both {FAKE_SUCCESS_ENV} and {FORCE_FAILURE_ENV} are set; \
                     {FORCE_FAILURE_ENV} takes precedence and the activation will fail"
                );
            }
        }

        info!(
            target: "Mode::activate",
            "prioritized methods for mode \"{}\": {:?}",
            self.name,
            candidates.iter().map(|method| method.name()).collect::<Vec<_>>()
        );
        if !unsupported.is_empty() {
            info!(
                target: "Mode::activate",
                "methods unsupported on {}: {:?}",
                self.platform,
                unsupported.iter().map(|method| method.name()).collect::<Vec<_>>()
            );
        }

        let mut results: Vec<MethodActivationResult> = unsupported
            .iter()
            .map(|method| unsupported_result(method, self.platform))
            .collect();

        let ctx = MethodContext {
            dbus: Arc::clone(&self.dbus_adapter),
        };

        let mut winner: Option<ActiveMethod> = None;
        let mut tried = 0usize;
        for method in &candidates {
            let (result, active) = activate_method(method, &ctx);
            let succeeded = result.success;
            results.push(result);
            tried += 1;
            if succeeded {
                winner = active;
                break;
            }
        }
        for method in candidates.iter().skip(tried) {
            results.push(MethodActivationResult::unused(&method.info()));
        }

        let winner_info = winner.as_ref().map(|active| active.info.clone());
        let result = ActivationResult::new(self.name.clone(), results, winner_info.clone());
        let success = result.success();
        self.result = Some(result);

        if success {
            if let Some(active) = winner {
                if active.has_heartbeat {
                    self.heartbeat = Some(Heartbeat::start(
                        active.info.name.clone(),
                        Arc::clone(&active.hooks),
                        active.heartbeat_period,
                    ));
                }
                info!(
                    target: "Mode::activate",
                    "activated mode \"{}\" with method \"{}\"", self.name, active.info.name
                );
                self.active_method = Some(active);
            }
            self.method = winner_info;
            self.active = true;
            return Ok(());
        }

        self.active = false;
        let result = self
            .result
            .as_ref()
            .expect("the activation result was just stored");
        info!(target: "Mode::activate", "{}", result.get_failure_text(FailureTextStyle::Inline));

        match &mut self.on_fail {
            OnFail::Error => Err(ModeError::Activation(ActivationError {
                result: result.clone(),
            })),
            OnFail::Warn => {
                warn!(
                    target: "Mode::activate",
                    "{}", result.get_failure_text(FailureTextStyle::Block)
                );
                Ok(())
            }
            OnFail::Pass => Ok(()),
            OnFail::Callback(callback) => {
                callback(result);
                Ok(())
            }
        }
    }

    /// Always runs on scope exit, regardless of how the scope ended. Stops
    /// the heartbeat, reverts the winning method and clears the runtime
    /// state; an exit failure is returned but never prevents the state
    /// from being cleared.
    fn deactivate(&mut self) -> Result<(), MethodError> {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }

        let outcome = match self.active_method.take() {
            Some(active) => {
                let mut hooks = active
                    .hooks
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let outcome = match hooks.exit.as_mut() {
                    Some(exit) => exit(),
                    None => Ok(()),
                };
                match &outcome {
                    Ok(()) => {
                        debug!(
                            target: "Mode::exit",
                            "deactivated method \"{}\" of mode \"{}\"",
                            active.info.name, self.name
                        );
                    }
                    Err(err) => {
                        warn!(
                            target: "Mode::exit",
                            "failed to exit method \"{}\" of mode \"{}\": {err}",
                            active.info.name, self.name
                        );
                    }
                }
                outcome
            }
            None => Ok(()),
        };

        self.method = None;
        self.active = false;
        outcome
    }
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mode")
            .field("name", &self.name)
            .field("active", &self.active)
            .field("method", &self.method)
            .finish()
    }
}

/// Keeps its [`Mode`] active for as long as it lives. Dropping the guard
/// deactivates the mode; [`exit`](Self::exit) does the same but surfaces a
/// failing exit hook to the caller.
#[must_use = "the mode is deactivated as soon as the guard is dropped"]
pub struct ModeGuard<'a> {
    mode: Option<&'a mut Mode>,
}

impl ModeGuard<'_> {
    /// Deactivates the mode, reporting an exit-hook failure instead of
    /// just logging it.
    pub fn exit(mut self) -> Result<(), MethodError> {
        match self.mode.take() {
            Some(mode) => mode.deactivate(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ModeGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeGuard").field("mode", &self.mode).finish()
    }
}

impl Deref for ModeGuard<'_> {
    type Target = Mode;

    fn deref(&self) -> &Mode {
        self.mode
            .as_deref()
            .expect("the guard holds its mode until consumed")
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        if let Some(mode) = self.mode.take() {
            if let Err(err) = mode.deactivate() {
                warn!(target: "ModeGuard::drop", "cleanup of mode \"{}\" failed: {err}", mode.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation_result::Stage;
    use crate::dbus::NullDbusAdapter;
    use crate::method::MethodHooks;
    use crate::platform::PlatformType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Counters {
        enters: AtomicUsize,
        exits: AtomicUsize,
    }

    impl Counters {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                enters: AtomicUsize::new(0),
                exits: AtomicUsize::new(0),
            })
        }
    }

    fn counting_method(name: &str, counters: &Arc<Counters>) -> Arc<Method> {
        let counters = Arc::clone(counters);
        Arc::new(Method::new(
            name,
            "test.mode",
            &[PlatformType::Any],
            move |_| {
                let enter_counters = Arc::clone(&counters);
                let exit_counters = Arc::clone(&counters);
                MethodHooks {
                    enter: Some(Box::new(move || {
                        enter_counters.enters.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })),
                    exit: Some(Box::new(move || {
                        exit_counters.exits.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })),
                    ..Default::default()
                }
            },
        ))
    }

    fn failing_method(name: &str) -> Arc<Method> {
        Arc::new(Method::new(
            name,
            "test.mode",
            &[PlatformType::Any],
            move |_| MethodHooks {
                enter: Some(Box::new(|| {
                    Err(MethodError::EnterFailed("broken on purpose".to_string()))
                })),
                ..Default::default()
            },
        ))
    }

    fn test_mode(methods: Vec<Arc<Method>>) -> Mode {
        ModeBuilder::with_methods("test.mode", methods)
            .dbus_adapter(Arc::new(NullDbusAdapter))
            .build()
            .unwrap()
    }

    #[test]
    fn test_enter_activates_and_drop_deactivates() {
        let counters = Counters::new();
        let mut mode = test_mode(vec![counting_method("A", &counters)]);

        {
            let guard = mode.enter().unwrap();
            assert!(guard.active());
            assert_eq!(guard.method().unwrap().name, "A");
            assert!(guard.result().unwrap().success());
            assert_eq!(counters.enters.load(Ordering::SeqCst), 1);
            assert_eq!(counters.exits.load(Ordering::SeqCst), 0);
        }

        assert!(!mode.active());
        assert!(mode.method().is_none());
        assert_eq!(counters.exits.load(Ordering::SeqCst), 1);
        // The result is kept for inspection after the scope ends.
        assert!(mode.result().unwrap().success());
    }

    #[test]
    fn test_explicit_exit_reports_exit_failures() {
        let method = Arc::new(Method::new(
            "grumpy",
            "test.mode",
            &[PlatformType::Any],
            |_| MethodHooks {
                enter: Some(Box::new(|| Ok(()))),
                exit: Some(Box::new(|| {
                    Err(MethodError::ExitFailed("stuck".to_string()))
                })),
                ..Default::default()
            },
        ));
        let mut mode = test_mode(vec![method]);

        let guard = mode.enter().unwrap();
        let err = guard.exit().unwrap_err();
        assert!(matches!(err, MethodError::ExitFailed(_)));
        // The runtime state is cleared even though the exit hook failed.
        assert!(!mode.active());
        assert!(mode.method().is_none());
    }

    #[test]
    fn test_first_success_wins_and_rest_stay_unused() {
        let counters_b = Counters::new();
        let counters_c = Counters::new();
        let mut mode = test_mode(vec![
            failing_method("A"),
            counting_method("B", &counters_b),
            counting_method("C", &counters_c),
        ]);

        let guard = mode.enter().unwrap();
        let results = guard.result().unwrap().results().to_vec();
        drop(guard);

        assert_eq!(results.len(), 3);
        assert!(!results[0].success);
        assert_eq!(results[0].stage, Stage::Activation);
        assert!(results[1].success);
        assert!(results[2].is_unused());
        assert_eq!(counters_c.enters.load(Ordering::SeqCst), 0);
        assert_eq!(counters_b.exits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_priority_with_wildcard_controls_attempt_order() {
        let counters = Counters::new();
        let mut mode = ModeBuilder::with_methods(
            "test.mode",
            vec![
                counting_method("A", &counters),
                failing_method("B"),
                failing_method("C"),
            ],
        )
        .methods_priority(["C", "*", "A"])
        .dbus_adapter(Arc::new(NullDbusAdapter))
        .build()
        .unwrap();

        let guard = mode.enter().unwrap();
        let attempted: Vec<String> = guard
            .result()
            .unwrap()
            .results()
            .iter()
            .map(|result| result.method_name.clone())
            .collect();
        assert_eq!(attempted, ["C", "B", "A"]);
        assert_eq!(guard.method().unwrap().name, "A");
    }

    #[test]
    fn test_on_fail_error_returns_the_aggregate_result() {
        let mut mode = test_mode(vec![failing_method("A"), failing_method("B")]);

        let err = mode.enter().unwrap_err();
        let ModeError::Activation(activation) = err else {
            panic!("expected an activation error");
        };
        assert!(!activation.result.success());
        assert_eq!(activation.result.results().len(), 2);
        assert!(!mode.active());
    }

    #[test]
    fn test_on_fail_pass_enters_inactive() {
        let mut mode = ModeBuilder::with_methods("test.mode", vec![failing_method("A")])
            .on_fail(OnFail::Pass)
            .dbus_adapter(Arc::new(NullDbusAdapter))
            .build()
            .unwrap();

        let guard = mode.enter().unwrap();
        assert!(!guard.active());
        assert!(!guard.result().unwrap().success());
    }

    #[test]
    fn test_on_fail_callback_receives_the_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let mut mode = ModeBuilder::with_methods("test.mode", vec![failing_method("A")])
            .on_fail(OnFail::Callback(Box::new(move |result| {
                seen_in.lock().unwrap().push(result.mode_name().to_string());
            })))
            .dbus_adapter(Arc::new(NullDbusAdapter))
            .build()
            .unwrap();

        let _guard = mode.enter().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["test.mode".to_string()]);
    }

    #[test]
    fn test_platform_filter_records_unsupported_and_skips() {
        let windows_only = Arc::new(Method::new(
            "SetThreadExecutionState",
            "test.mode",
            &[PlatformType::Windows],
            |_| MethodHooks {
                enter: Some(Box::new(|| panic!("must not be tried"))),
                ..Default::default()
            },
        ));
        let counters = Counters::new();
        let mut mode = ModeBuilder::with_methods(
            "test.mode",
            vec![windows_only, counting_method("A", &counters)],
        )
        .platform(Platform::Linux)
        .dbus_adapter(Arc::new(NullDbusAdapter))
        .build()
        .unwrap();

        let guard = mode.enter().unwrap();
        let results = guard.result().unwrap().results().to_vec();
        assert_eq!(results[0].method_name, "SetThreadExecutionState");
        assert_eq!(results[0].stage, Stage::PlatformSupport);
        assert!(!results[0].success);
        assert_eq!(
            results[0].failure_reason.as_deref(),
            Some("unsupported on LINUX")
        );
        assert!(results[1].success);
    }

    #[test]
    fn test_reentering_after_exit_reactivates() {
        let counters = Counters::new();
        let mut mode = test_mode(vec![counting_method("A", &counters)]);

        drop(mode.enter().unwrap());
        drop(mode.enter().unwrap());

        assert_eq!(counters.enters.load(Ordering::SeqCst), 2);
        assert_eq!(counters.exits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panic_in_scope_still_deactivates() {
        let counters = Counters::new();
        let mut mode = test_mode(vec![counting_method("A", &counters)]);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = mode.enter().unwrap();
            panic!("scope body failed");
        }));

        assert!(outcome.is_err());
        assert_eq!(counters.exits.load(Ordering::SeqCst), 1);
        assert!(!mode.active());
    }

    #[test]
    fn test_heartbeat_only_method_activates_and_stops() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticks_in = Arc::clone(&ticks);
        let method = Arc::new(
            Method::new("hb", "test.mode", &[PlatformType::Any], move |_| {
                let ticks = Arc::clone(&ticks_in);
                MethodHooks {
                    heartbeat: Some(Box::new(move || {
                        ticks.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })),
                    ..Default::default()
                }
            })
            .with_heartbeat_period(std::time::Duration::from_millis(10)),
        );
        let mut mode = test_mode(vec![method]);

        let guard = mode.enter().unwrap();
        assert!(guard.active());
        // The initial synchronous tick ran during activation.
        assert!(ticks.load(Ordering::SeqCst) >= 1);
        std::thread::sleep(std::time::Duration::from_millis(60));
        drop(guard);

        let after_exit = ticks.load(Ordering::SeqCst);
        assert!(after_exit >= 2);
        std::thread::sleep(std::time::Duration::from_millis(40));
        assert_eq!(ticks.load(Ordering::SeqCst), after_exit);
    }

    #[test]
    fn test_explicit_method_without_capabilities_fails_at_build() {
        let hollow = Arc::new(Method::new(
            "hollow",
            "test.mode",
            &[PlatformType::Any],
            |_| MethodHooks {
                exit: Some(Box::new(|| Ok(()))),
                ..Default::default()
            },
        ));
        let err = ModeBuilder::with_methods("test.mode", vec![hollow])
            .dbus_adapter(Arc::new(NullDbusAdapter))
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidMethod("hollow".to_string()));
    }

    #[test]
    fn test_unknown_method_in_selector_fails_at_build() {
        let counters = Counters::new();
        let err = ModeBuilder::with_methods("test.mode", vec![counting_method("A", &counters)])
            .methods(["nope"])
            .dbus_adapter(Arc::new(NullDbusAdapter))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMethodName { .. }));
    }

    #[test]
    fn test_bad_priority_fails_at_enter() {
        let counters = Counters::new();
        let mut mode = ModeBuilder::with_methods("test.mode", vec![counting_method("A", &counters)])
            .methods_priority(["*", "*"])
            .dbus_adapter(Arc::new(NullDbusAdapter))
            .build()
            .unwrap();
        let err = mode.enter().unwrap_err();
        assert!(matches!(
            err,
            ModeError::Config(ConfigError::InvalidMethodsPriority(_))
        ));
        assert_eq!(counters.enters.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_probe_tries_everything_and_leaves_mode_inactive() {
        let counters = Counters::new();
        let mut mode = test_mode(vec![
            counting_method("A", &counters),
            failing_method("B"),
            counting_method("C", &counters),
        ]);

        let probing = mode.probe_all_methods().unwrap();
        assert!(!mode.active());
        assert_eq!(counters.enters.load(Ordering::SeqCst), 2);
        assert_eq!(counters.exits.load(Ordering::SeqCst), 2);

        let statuses: Vec<&str> = probing
            .results()
            .iter()
            .map(|result| result.status_string())
            .collect();
        assert_eq!(statuses, ["SUCCESS", "FAIL", "SUCCESS"]);
    }
}
