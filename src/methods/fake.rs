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

use std::sync::Arc;

use crate::method::{Method, MethodHooks};
use crate::platform::PlatformType;

/// Name of the built-in fake-success method.
pub const FAKE_SUCCESS_NAME: &str = "WakepyFakeSuccess";

/// The fake-success method: every hook is a no-op and activation always
/// succeeds, without inhibiting anything. It is never registered and never
/// selected on its own; it is injected as the first candidate when the
/// fake-success environment variable is truthy, e.g. in CI runs on hosts
/// with no inhibition mechanism.
pub(crate) fn fake_success(mode_name: &str) -> Arc<Method> {
    Arc::new(Method::new(
        FAKE_SUCCESS_NAME,
        mode_name,
        &[PlatformType::Any],
        |_| MethodHooks {
            caniuse: None,
            enter: Some(Box::new(|| Ok(()))),
            heartbeat: Some(Box::new(|| Ok(()))),
            exit: Some(Box::new(|| Ok(()))),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation_result::Stage;
    use crate::dbus::NullDbusAdapter;
    use crate::method::{activate_method, MethodContext};

    #[test]
    fn test_fake_success_always_activates() {
        let method = fake_success("test.mode");
        let ctx = MethodContext {
            dbus: Arc::new(NullDbusAdapter),
        };
        let (result, active) = activate_method(&method, &ctx);
        assert!(result.success);
        assert_eq!(result.stage, Stage::Activation);
        assert_eq!(result.method_name, FAKE_SUCCESS_NAME);
        assert!(active.is_some());
    }
}
