// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle of a discovery node.
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Observable state with a change barrier.
#[derive(Default)]
pub(crate) struct StateCell {
    state: Mutex<NodeState>,
    changed: Condvar,
}

impl StateCell {
    pub fn get(&self) -> NodeState {
        *self.state.lock()
    }

    pub fn set(&self, next: NodeState) {
        *self.state.lock() = next;
        self.changed.notify_all();
    }

    /// Move from `from` to `to`; `false` if the current state is not `from`.
    pub fn transition(&self, from: NodeState, to: NodeState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        *state = to;
        self.changed.notify_all();
        true
    }

    /// Wait until the state satisfies `done`; returns the final state.
    pub fn wait_until(&self, timeout: Duration, done: impl Fn(NodeState) -> bool) -> NodeState {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !done(*state) {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state
    }
}
