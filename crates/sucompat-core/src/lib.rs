// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Decision core of the su-compat engine.
//!
//! Legacy tooling hard-codes the path of a privileged `su` helper. This
//! crate decides, for one in-flight path operation at a time, whether the
//! requested path is that helper, whether the calling uid is entitled to
//! escalation, and which replacement path (a harmless shell for probes,
//! the management daemon for execution) the operation should be steered
//! to. Everything here is synchronous, allocation-free on the hot path,
//! and tolerant of hostile caller memory: a faulted read is a miss, never
//! an error surfaced to the caller.
//!
//! The crate is deliberately host-agnostic. Reading caller memory and
//! placing replacement bytes are abstracted behind [`uaccess::CallerMemory`]
//! so the same policy drives both the in-process interposition shim and
//! the simulated address space used by tests.

pub mod allowlist;
pub mod error;
pub mod paths;
pub mod policy;
pub mod testing;
pub mod uaccess;

pub use allowlist::{DenyAll, SharedAllowlist, UidGate};
pub use error::{ReadFault, WriteFault};
pub use policy::{Decision, Escalator, NullEscalator, OpKind, RewritePolicy};
pub use uaccess::{read_path_prefix, CallerMemory, UserPtr};
