// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The three well-known paths the engine cares about.
//!
//! These byte strings are a fixed contract with the management daemon
//! and its packaging: they are never mutated after process start and
//! are always compared terminator-included, so a longer path sharing
//! the helper prefix can never alias it.

/// Path of the legacy privileged helper that callers probe for and
/// execute. The helper does not exist on disk; this engine fakes it.
pub const SU_PATH: &[u8] = b"/system/bin/su\0";

/// Harmless substitute handed to existence and permission probes.
pub const SH_PATH: &[u8] = b"/system/bin/sh\0";

/// Management daemon entry point that authorized execute attempts are
/// redirected into.
pub const SUD_PATH: &[u8] = b"/data/adb/sud\0";

/// Bytes a handler must fetch before matching: the helper path, its
/// terminator, plus one extra byte so a longer caller path shows a
/// non-NUL where the terminator belongs.
pub const MATCH_LEN: usize = SU_PATH.len() + 1;

/// Exact match against [`SU_PATH`], terminator included.
#[inline]
pub fn is_su_path(fetched: &[u8]) -> bool {
    fetched.len() >= SU_PATH.len() && fetched[..SU_PATH.len()] == *SU_PATH
}
