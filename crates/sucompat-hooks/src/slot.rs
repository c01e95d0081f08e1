// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Lock-free publication cell for one installed hook.
//!
//! The cell is the single-writer/many-reader point of the whole engine:
//! every intercepted operation reads it, install and teardown are rare
//! administrative writes. Readers never take a lock; they announce
//! themselves on an in-flight counter, load the pointer, invoke, and
//! leave. Removal swaps the pointer out first and only frees the entry
//! once the counter has drained to zero, so an invocation racing the
//! removal can never observe a freed hook.

use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use sucompat_core::CallerMemory;

use crate::backend::{HookFn, PendingOp};

pub struct HookCell {
    entry: AtomicPtr<HookFn>,
    inflight: AtomicUsize,
}

/// Decrements the in-flight counter even if the hook unwinds, so a
/// panicking callback cannot wedge a later grace period.
struct InflightGuard<'a>(&'a AtomicUsize);

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HookCell {
    pub const fn new() -> Self {
        Self {
            entry: AtomicPtr::new(ptr::null_mut()),
            inflight: AtomicUsize::new(0),
        }
    }

    /// Publish `hook`. Returns `false` (dropping `hook`) if the cell is
    /// already occupied.
    pub fn install(&self, hook: HookFn) -> bool {
        let raw = Box::into_raw(Box::new(hook));
        match self
            .entry
            .compare_exchange(ptr::null_mut(), raw, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => true,
            Err(_) => {
                // SAFETY: `raw` was never published; we still own it.
                unsafe { drop(Box::from_raw(raw)) };
                false
            }
        }
    }

    pub fn is_installed(&self) -> bool {
        !self.entry.load(Ordering::SeqCst).is_null()
    }

    /// Number of invocations currently inside the hook.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::SeqCst)
    }

    /// Invoke the installed hook, if any. Returns whether a hook ran.
    pub fn dispatch(&self, mem: &dyn CallerMemory, op: &mut PendingOp<'_>) -> bool {
        self.inflight.fetch_add(1, Ordering::SeqCst);
        let _guard = InflightGuard(&self.inflight);
        let raw = self.entry.load(Ordering::SeqCst);
        if raw.is_null() {
            return false;
        }
        // SAFETY: the entry was published by `install` and `retire`
        // frees it only after `inflight` drains; our increment happened
        // before the load, so the drain cannot complete under us.
        let hook = unsafe { &*raw };
        hook(mem, op);
        true
    }

    /// Unpublish the hook, wait out the grace period, then free it.
    ///
    /// Returns `false` if the cell was already empty. The
    /// swap-then-drain-then-free order is mandatory; freeing before the
    /// drain would hand a dangling pointer to a reader that loaded the
    /// entry just before the swap.
    pub fn retire(&self) -> bool {
        let raw = self.entry.swap(ptr::null_mut(), Ordering::SeqCst);
        if raw.is_null() {
            return false;
        }
        let mut spins = 0u32;
        while self.inflight.load(Ordering::SeqCst) != 0 {
            spins += 1;
            if spins < 64 {
                std::hint::spin_loop();
            } else {
                std::thread::yield_now();
            }
        }
        // SAFETY: unpublished above and no reader can still hold the
        // pointer once the counter reached zero.
        unsafe { drop(Box::from_raw(raw)) };
        true
    }
}

impl Default for HookCell {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HookCell {
    fn drop(&mut self) {
        self.retire();
    }
}
