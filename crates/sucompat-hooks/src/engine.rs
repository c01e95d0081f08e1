// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The process-scoped engine context.
//!
//! One [`Engine`] per process: it owns the rewrite policy, the packed
//! mode state and the hook set, and is what every operation handler and
//! administrative entry point hangs off. Hook callbacks capture an
//! `Arc<Engine>`, so the context outlives any in-flight operation.

use std::sync::{Arc, Mutex};

#[cfg(feature = "probes")]
use sucompat_core::CallerMemory;
use sucompat_core::{DenyAll, Escalator, NullEscalator, RewritePolicy, UidGate};
use tracing::info;

use crate::arbiter::{AdminState, EngineMode, ModeState};
use crate::backend::HookBackend;
#[cfg(feature = "probes")]
use crate::backend::{HookFn, PendingOp};
use crate::lifecycle::HookSet;

/// Collaborators the engine is wired to at construction.
pub struct EngineConfig {
    /// Allow-list query. Defaults to deny-all.
    pub gate: Arc<dyn UidGate>,
    /// Privilege-elevation hand-off. Defaults to a no-op.
    pub escalator: Arc<dyn Escalator>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gate: Arc::new(DenyAll),
            escalator: Arc::new(NullEscalator),
        }
    }
}

pub struct Engine {
    pub(crate) policy: RewritePolicy,
    pub(crate) mode: ModeState,
    #[cfg_attr(not(feature = "probes"), allow(dead_code))]
    pub(crate) hooks: HookSet,
    pub(crate) admin: Mutex<AdminState>,
}

impl Engine {
    pub fn new(config: EngineConfig, backend: Arc<dyn HookBackend>) -> Arc<Self> {
        Arc::new(Self {
            policy: RewritePolicy::new(config.gate, config.escalator),
            mode: ModeState::new(),
            hooks: HookSet::new(backend),
            admin: Mutex::new(AdminState::default()),
        })
    }

    /// Lifecycle entry point for the owning process's startup sequence.
    pub fn start(self: &Arc<Self>) {
        self.switch_to(crate::arbiter::ActiveMode::Engine);
    }

    /// Lifecycle entry point for the owning process's shutdown
    /// sequence. Blocks until every installed hook has drained.
    pub fn stop(self: &Arc<Self>) {
        self.switch_to(crate::arbiter::ActiveMode::Disabled);
    }

    pub fn mode(&self) -> EngineMode {
        self.mode.load()
    }

    pub fn installed_hooks(&self) -> usize {
        self.hooks.installed_count()
    }

    /// Bring interception up. Mode is published first so directly
    /// called handlers engage as soon as hooks start landing.
    #[cfg(feature = "probes")]
    pub(crate) fn activate(self: &Arc<Self>) {
        self.mode.store(EngineMode::Probes);
        let engine = Arc::clone(self);
        let installed = self.hooks.install_all(|_symbol| {
            let engine = Arc::clone(&engine);
            // Parameters spelled out so the closure generalizes over
            // the callback's borrow lifetimes.
            Box::new(move |mem: &dyn CallerMemory, op: &mut PendingOp<'_>| {
                engine.dispatch(mem, op);
            }) as HookFn
        });
        info!(installed, "su-compat interception active");
    }

    #[cfg(not(feature = "probes"))]
    pub(crate) fn activate(self: &Arc<Self>) {
        self.mode.store(EngineMode::PresenceOnly);
        info!("su-compat presence flag set: execve/faccessat/newfstatat handled inline");
    }

    /// Take interception down. The disabled mode is published before
    /// hooks are torn down so racing operations short-circuit while the
    /// grace periods drain.
    #[cfg(feature = "probes")]
    pub(crate) fn deactivate(&self) {
        self.mode.store(EngineMode::Disabled);
        self.hooks.teardown_all();
        info!("su-compat interception stopped");
    }

    #[cfg(not(feature = "probes"))]
    pub(crate) fn deactivate(&self) {
        self.mode.store(EngineMode::Disabled);
        info!("su-compat presence flag cleared");
    }
}
