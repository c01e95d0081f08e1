// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Caller identity gate.
//!
//! Membership storage and its update protocol belong to the management
//! daemon; the engine only asks a yes/no question per intercepted
//! operation. Queries run on the hot path and must not allocate.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

/// Decision source for escalation eligibility.
pub trait UidGate: Send + Sync {
    /// Whether `uid` may have the helper path faked and escalated for it.
    fn is_allowed(&self, uid: u32) -> bool;
}

/// Gate used while no allow-list store is attached: denies everyone.
///
/// A missing allow-list must never widen access, so this is the default
/// wherever a gate is optional.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAll;

impl UidGate for DenyAll {
    fn is_allowed(&self, _uid: u32) -> bool {
        false
    }
}

/// In-process view of the external allow-list.
///
/// The daemon-side notifier replaces the membership set on updates;
/// intercepted operations only take the read lock.
#[derive(Debug, Default)]
pub struct SharedAllowlist {
    uids: RwLock<HashSet<u32>>,
}

impl SharedAllowlist {
    pub fn new() -> Self {
        Self::default()
    }

    // The set stays coherent across a panic mid-update, so a poisoned
    // lock is recovered on the write side; queries still fail closed.
    fn write(&self) -> RwLockWriteGuard<'_, HashSet<u32>> {
        self.uids.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, uid: u32) {
        self.write().insert(uid);
    }

    pub fn remove(&self, uid: u32) {
        self.write().remove(&uid);
    }

    /// Swap in a full replacement membership set.
    pub fn replace(&self, uids: impl IntoIterator<Item = u32>) {
        let mut guard = self.write();
        guard.clear();
        guard.extend(uids);
    }
}

impl UidGate for SharedAllowlist {
    fn is_allowed(&self, uid: u32) -> bool {
        match self.uids.read() {
            Ok(guard) => guard.contains(&uid),
            // A poisoned store fails closed.
            Err(_) => false,
        }
    }
}
