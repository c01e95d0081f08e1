// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-operation handlers.
//!
//! Each handler is the body of one hook callback and is also callable
//! directly by hosts running in presence-flag mode. Handlers never fail
//! the caller's operation: every failure mode inside them degrades to
//! "leave the arguments untouched and let the operation proceed".

use sucompat_core::paths::MATCH_LEN;
use sucompat_core::{read_path_prefix, CallerMemory, Decision, OpKind, UserPtr};
use tracing::info;

use crate::backend::{PathArg, PendingOp};
use crate::engine::Engine;

/// Handler verdict. Either value lets the original operation proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Arguments left exactly as the caller supplied them.
    Untouched,
    /// The path argument now points at the replacement.
    Rewritten,
}

impl Engine {
    /// Route one intercepted operation to the matching handler.
    pub fn dispatch(&self, mem: &dyn CallerMemory, op: &mut PendingOp<'_>) -> Disposition {
        let kind = op.kind;
        let uid = op.uid;
        match &mut op.path {
            PathArg::User(filename) => self.handle_user_path(kind, mem, uid, filename),
            PathArg::Resolved(filename) => self.handle_resolved(kind, uid, filename),
        }
    }

    /// Existence / permission probe on a caller-supplied path pointer.
    pub fn handle_faccessat(
        &self,
        mem: &dyn CallerMemory,
        uid: u32,
        filename: &mut UserPtr,
    ) -> Disposition {
        self.handle_user_path(OpKind::Access, mem, uid, filename)
    }

    /// Stat-like probe on a caller-supplied path pointer.
    pub fn handle_stat(
        &self,
        mem: &dyn CallerMemory,
        uid: u32,
        filename: &mut UserPtr,
    ) -> Disposition {
        self.handle_user_path(OpKind::Stat, mem, uid, filename)
    }

    /// Process start from a caller-supplied path pointer.
    pub fn handle_execve(
        &self,
        mem: &dyn CallerMemory,
        uid: u32,
        filename: &mut UserPtr,
    ) -> Disposition {
        self.handle_user_path(OpKind::Exec, mem, uid, filename)
    }

    /// Process start whose path the host has already resolved into its
    /// own storage; the rewrite mutates those bytes in place.
    pub fn handle_execveat(&self, uid: u32, filename: &mut [u8]) -> Disposition {
        self.handle_resolved(OpKind::Exec, uid, filename)
    }

    fn handle_user_path(
        &self,
        kind: OpKind,
        mem: &dyn CallerMemory,
        uid: u32,
        filename: &mut UserPtr,
    ) -> Disposition {
        if !self.mode().intercepts() {
            return Disposition::Untouched;
        }
        if filename.is_null() {
            return Disposition::Untouched;
        }
        let mut fetched = [0u8; MATCH_LEN];
        read_path_prefix(mem, *filename, &mut fetched);
        match self.policy.evaluate(kind, &fetched, uid) {
            Decision::NoMatch => Disposition::Untouched,
            Decision::Redirect(target) => match mem.materialize(target) {
                Some(replacement) => {
                    info!(op = kind.symbol(), uid, "helper path rewritten");
                    *filename = replacement;
                    Disposition::Rewritten
                }
                // Scratch write failed; behave as if absent.
                None => Disposition::Untouched,
            },
        }
    }

    fn handle_resolved(&self, kind: OpKind, uid: u32, filename: &mut [u8]) -> Disposition {
        if !self.mode().intercepts() {
            return Disposition::Untouched;
        }
        let mut fetched = [0u8; MATCH_LEN];
        let n = filename.len().min(MATCH_LEN);
        fetched[..n].copy_from_slice(&filename[..n]);
        match self.policy.evaluate(kind, &fetched, uid) {
            Decision::NoMatch => Disposition::Untouched,
            Decision::Redirect(target) => {
                // The replacement must fit the storage already holding
                // the original path.
                if target.len() > filename.len() {
                    return Disposition::Untouched;
                }
                filename[..target.len()].copy_from_slice(target);
                info!(op = kind.symbol(), uid, "resolved helper path rewritten in place");
                Disposition::Rewritten
            }
        }
    }
}
