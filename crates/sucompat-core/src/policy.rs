// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The rewrite decision core.
//!
//! For every intercepted operation the policy answers one question: is
//! this the helper path, asked for by an entitled caller, and if so,
//! what should it become? The non-matching case is the overwhelmingly
//! common one and returns after a single bounded byte compare.

use std::sync::Arc;

use crate::allowlist::UidGate;
use crate::paths::{is_su_path, SH_PATH, SUD_PATH};

/// What the intercepted operation is about to do with the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// faccessat-style existence / permission probe.
    Access,
    /// newfstatat-style metadata read.
    Stat,
    /// execve-style process start.
    Exec,
}

impl OpKind {
    /// Name of the hooked operation, for log lines.
    pub fn symbol(self) -> &'static str {
        match self {
            OpKind::Access => "faccessat",
            OpKind::Stat => "newfstatat",
            OpKind::Exec => "execve",
        }
    }
}

/// Outcome of evaluating one in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the operation untouched.
    NoMatch,
    /// Substitute the operation's path with these bytes, NUL included.
    Redirect(&'static [u8]),
}

/// Hand-off into the privilege-elevation primitive.
///
/// Fired exactly once per authorized execute-class match, after the
/// redirect target has been chosen. Not expected to fail observably at
/// this layer.
pub trait Escalator: Send + Sync {
    fn escalate(&self);
}

/// Escalator for configurations where the elevation primitive is
/// unavailable or handled entirely by the redirect target.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEscalator;

impl Escalator for NullEscalator {
    fn escalate(&self) {}
}

/// The decision core: helper-path match, identity gate, target choice.
pub struct RewritePolicy {
    gate: Arc<dyn UidGate>,
    escalator: Arc<dyn Escalator>,
}

impl RewritePolicy {
    pub fn new(gate: Arc<dyn UidGate>, escalator: Arc<dyn Escalator>) -> Self {
        Self { gate, escalator }
    }

    /// Evaluate one operation.
    ///
    /// `fetched` is the path prefix a handler copied out of caller
    /// memory with [`crate::read_path_prefix`] (zero-filled on fault),
    /// or the leading bytes of an already-resolved path. The compare is
    /// terminator-included, so prefixes of longer paths never match.
    ///
    /// For [`OpKind::Exec`] a match fires the escalator as a side
    /// effect; probe kinds never escalate.
    pub fn evaluate(&self, kind: OpKind, fetched: &[u8], uid: u32) -> Decision {
        if !is_su_path(fetched) {
            return Decision::NoMatch;
        }
        if !self.gate.is_allowed(uid) {
            return Decision::NoMatch;
        }
        match kind {
            OpKind::Access | OpKind::Stat => Decision::Redirect(SH_PATH),
            OpKind::Exec => {
                self.escalator.escalate();
                Decision::Redirect(SUD_PATH)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::SharedAllowlist;
    use crate::paths::{MATCH_LEN, SU_PATH};
    use crate::testing::CountingEscalator;
    use std::sync::atomic::Ordering;

    const ALLOWED: u32 = 2000;
    const DENIED: u32 = 2001;

    fn policy() -> (RewritePolicy, Arc<CountingEscalator>) {
        let gate = Arc::new(SharedAllowlist::new());
        gate.insert(ALLOWED);
        let escalator = Arc::new(CountingEscalator::default());
        (RewritePolicy::new(gate, escalator.clone()), escalator)
    }

    fn fetched(path: &[u8]) -> [u8; MATCH_LEN] {
        let mut buf = [0u8; MATCH_LEN];
        let n = path.len().min(MATCH_LEN);
        buf[..n].copy_from_slice(&path[..n]);
        buf
    }

    #[test]
    fn non_helper_paths_never_match() {
        let (policy, escalator) = policy();
        for path in [
            &b"/system/bin/sh\0"[..],
            b"/system/bin/s\0",
            b"/system/bin/su.bak\0", // helper prefix, longer path
            b"/system/bin/sux\0",
            b"\0",
            b"",
        ] {
            for kind in [OpKind::Access, OpKind::Stat, OpKind::Exec] {
                assert_eq!(policy.evaluate(kind, &fetched(path), ALLOWED), Decision::NoMatch);
            }
        }
        assert_eq!(escalator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn denied_uid_never_matches_even_on_helper_path() {
        let (policy, escalator) = policy();
        for kind in [OpKind::Access, OpKind::Stat, OpKind::Exec] {
            assert_eq!(policy.evaluate(kind, &fetched(SU_PATH), DENIED), Decision::NoMatch);
        }
        assert_eq!(escalator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn probe_kinds_redirect_to_shell_without_escalation() {
        let (policy, escalator) = policy();
        for kind in [OpKind::Access, OpKind::Stat] {
            assert_eq!(
                policy.evaluate(kind, &fetched(SU_PATH), ALLOWED),
                Decision::Redirect(SH_PATH)
            );
        }
        assert_eq!(escalator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exec_redirects_to_daemon_and_escalates_exactly_once() {
        let (policy, escalator) = policy();
        assert_eq!(
            policy.evaluate(OpKind::Exec, &fetched(SU_PATH), ALLOWED),
            Decision::Redirect(SUD_PATH)
        );
        assert_eq!(escalator.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unterminated_max_length_input_is_a_clean_miss() {
        // A helper-prefixed byte soup with no terminator anywhere in
        // the fetch window must not match and must not read past it.
        let (policy, escalator) = policy();
        let mut soup = [b'u'; MATCH_LEN];
        soup[..14].copy_from_slice(b"/system/bin/su");
        for kind in [OpKind::Access, OpKind::Stat, OpKind::Exec] {
            assert_eq!(policy.evaluate(kind, &soup, ALLOWED), Decision::NoMatch);
        }
        assert_eq!(escalator.calls.load(Ordering::SeqCst), 0);
    }
}
