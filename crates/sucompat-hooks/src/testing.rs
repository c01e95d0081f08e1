// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated hook backend for tests.
//!
//! [`SimBackend`] stands in for the host's hook mechanism: tests play
//! the role of the operating environment by constructing a
//! [`PendingOp`] and firing it at a symbol, from as many threads as the
//! scenario needs. Registration failures can be injected per symbol to
//! exercise partial installation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use sucompat_core::CallerMemory;

use crate::backend::{HookBackend, HookFn, HookHandle, PendingOp};
use crate::error::HookError;
use crate::lifecycle::HOOKED_SYMBOLS;
use crate::slot::HookCell;

pub struct SimBackend {
    cells: HashMap<&'static str, Arc<HookCell>>,
    refused: Mutex<HashSet<&'static str>>,
    registrations: AtomicUsize,
}

impl Default for SimBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimBackend {
    pub fn new() -> Self {
        Self {
            cells: HOOKED_SYMBOLS
                .iter()
                .map(|s| (*s, Arc::new(HookCell::new())))
                .collect(),
            refused: Mutex::new(HashSet::new()),
            registrations: AtomicUsize::new(0),
        }
    }

    /// Make future registrations for `symbol` fail.
    pub fn refuse(&self, symbol: &'static str) {
        self.refused.lock().unwrap().insert(symbol);
    }

    /// Deliver one operation to the hook installed at `symbol`, the way
    /// the host would. Returns whether a hook ran.
    pub fn fire(&self, symbol: &str, mem: &dyn CallerMemory, op: &mut PendingOp<'_>) -> bool {
        match self.cells.get(symbol) {
            Some(cell) => cell.dispatch(mem, op),
            None => false,
        }
    }

    pub fn is_installed(&self, symbol: &str) -> bool {
        self.cells.get(symbol).is_some_and(|c| c.is_installed())
    }

    /// Invocations currently inside the hook at `symbol`, for
    /// grace-boundary assertions.
    pub fn inflight(&self, symbol: &str) -> usize {
        self.cells.get(symbol).map_or(0, |c| c.inflight())
    }

    /// Total number of successful `register` calls, for idempotence
    /// assertions.
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }
}

impl HookBackend for SimBackend {
    fn register(&self, symbol: &'static str, hook: HookFn) -> Result<HookHandle, HookError> {
        let cell = self
            .cells
            .get(symbol)
            .ok_or(HookError::UnknownSymbol(symbol))?;
        if self.refused.lock().unwrap().contains(symbol) {
            return Err(HookError::Refused {
                symbol,
                reason: "refused by test".into(),
            });
        }
        if !cell.install(hook) {
            return Err(HookError::AlreadyInstalled(symbol));
        }
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(HookHandle::new(symbol, Arc::clone(cell)))
    }

    fn unregister(&self, handle: HookHandle) {
        handle.retire();
    }
}
