// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Mode state and arbitration.
//!
//! The engine's interception and the alternate namespace-based
//! escalation mode are mutually exclusive: at most one may be able to
//! fire at any instant. Transitions are rare administrative events and
//! are serialized under one mutex; the per-operation fast path only
//! reads the packed mode atomic.
//!
//! A handful of operations racing the exact instant of a transition may
//! observe either the old or the new mode. What can never happen is
//! both modes active at once, or a hook freed while a not-yet-completed
//! grace period could still reach it: teardown finishes before the
//! alternate flag is raised.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::engine::Engine;

/// Engine-side interception state, read on every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineMode {
    /// Not intercepting; handlers short-circuit.
    Disabled = 0,
    /// Hooks are registered with the backend.
    Probes = 1,
    /// No hook mechanism available; a presence flag gates handlers
    /// that the host calls directly.
    PresenceOnly = 2,
}

impl EngineMode {
    /// Whether handlers should act on operations at all.
    #[inline]
    pub fn intercepts(self) -> bool {
        !matches!(self, EngineMode::Disabled)
    }
}

pub(crate) struct ModeState(AtomicU8);

impl ModeState {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(EngineMode::Disabled as u8))
    }

    pub(crate) fn load(&self) -> EngineMode {
        match self.0.load(Ordering::Acquire) {
            1 => EngineMode::Probes,
            2 => EngineMode::PresenceOnly,
            _ => EngineMode::Disabled,
        }
    }

    pub(crate) fn store(&self, mode: EngineMode) {
        self.0.store(mode as u8, Ordering::Release);
    }
}

/// Target of an administrative mode switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveMode {
    /// This engine intercepts.
    Engine,
    /// The namespace-based escalation mode owns the helper path.
    Alternate,
    /// Neither mode is active.
    Disabled,
}

/// Administrative flags, only touched under the admin mutex.
#[derive(Debug, Default)]
pub(crate) struct AdminState {
    pub(crate) alternate_active: bool,
    /// Set when enabling the alternate mode is what tore the engine
    /// down; disabling the alternate mode then resumes the engine.
    /// An explicit stop clears it, so an administrator's decision to
    /// keep the engine off survives an alternate-mode round trip.
    pub(crate) suspended_by_alternate: bool,
}

// The flags stay consistent across a panic inside a critical section,
// so a poisoned admin mutex is recovered rather than propagated.
fn lock_admin(admin: &Mutex<AdminState>) -> MutexGuard<'_, AdminState> {
    admin.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    /// Switch the process to `target`. Transitions are serialized;
    /// concurrent administrative callers are ordered by mutex
    /// acquisition and the later caller wins.
    pub fn switch_to(self: &Arc<Self>, target: ActiveMode) {
        let mut admin = lock_admin(&self.admin);
        match target {
            ActiveMode::Alternate => {
                if self.mode().intercepts() {
                    self.deactivate();
                    admin.suspended_by_alternate = true;
                }
                admin.alternate_active = true;
                info!("alternate escalation mode active, engine interception off");
            }
            ActiveMode::Engine => {
                if admin.alternate_active {
                    admin.alternate_active = false;
                    info!("alternate escalation mode cleared");
                }
                admin.suspended_by_alternate = false;
                if !self.mode().intercepts() {
                    self.activate();
                }
            }
            ActiveMode::Disabled => {
                admin.alternate_active = false;
                admin.suspended_by_alternate = false;
                if self.mode().intercepts() {
                    self.deactivate();
                }
            }
        }
    }

    /// Entry point for the configuration notifier: hand the helper
    /// path over to the namespace-based mode.
    pub fn enable_alternate_mode(self: &Arc<Self>) {
        self.switch_to(ActiveMode::Alternate);
    }

    /// Entry point for the configuration notifier: leave the
    /// namespace-based mode. Resumes this engine only if enabling the
    /// alternate mode was what suspended it.
    pub fn disable_alternate_mode(self: &Arc<Self>) {
        let mut admin = lock_admin(&self.admin);
        if !admin.alternate_active {
            return;
        }
        admin.alternate_active = false;
        info!("alternate escalation mode cleared");
        if admin.suspended_by_alternate {
            admin.suspended_by_alternate = false;
            self.activate();
        }
    }

    pub fn alternate_active(&self) -> bool {
        lock_admin(&self.admin).alternate_active
    }
}
