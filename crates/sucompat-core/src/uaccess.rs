// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Bounded, fallible access to memory owned by the intercepted caller.
//!
//! Hook callbacks receive path arguments as raw addresses in the
//! caller's address space. All access goes through [`CallerMemory`] so
//! that a bad address is reported as a fault value instead of crashing
//! the operation, and so tests can drive the engine against a simulated
//! address space.

use crate::error::{ReadFault, WriteFault};

/// Address inside the intercepted caller's address space.
///
/// Opaque to the engine; only a [`CallerMemory`] backend may
/// dereference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserPtr(pub usize);

impl UserPtr {
    pub const NULL: UserPtr = UserPtr(0);

    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// One caller's memory, as seen from inside a hook callback.
///
/// Implementations must tolerate hostile input: an unreadable source is
/// an `Err`, never a panic, because failing the caller's operation is a
/// worse outcome than not intercepting it.
pub trait CallerMemory: Send + Sync {
    /// Copy bytes from `src` until `buf` is full or a terminating NUL
    /// has been copied. Returns the number of bytes written.
    fn try_read(&self, src: UserPtr, buf: &mut [u8]) -> Result<usize, ReadFault>;

    /// Write `bytes` to `dst`.
    fn try_write(&self, dst: UserPtr, bytes: &[u8]) -> Result<(), WriteFault>;

    /// Current top of the caller's stack.
    fn stack_pointer(&self) -> UserPtr;

    /// Place `bytes` somewhere the caller can read once the operation
    /// resumes, without creating a new mapping: directly below the
    /// caller's stack pointer, sized exactly to `bytes`. `None` means
    /// the write failed and the original argument must stay untouched.
    fn materialize(&self, bytes: &[u8]) -> Option<UserPtr> {
        let sp = self.stack_pointer();
        let dst = UserPtr(sp.0.checked_sub(bytes.len())?);
        self.try_write(dst, bytes).ok().map(|_| dst)
    }
}

/// Fetch the prefix of a caller-supplied path into `buf`.
///
/// `buf` is zero-filled first; a faulted read re-zeroes it and reports
/// zero bytes, so the caller sees a clean miss instead of an error.
/// Mirrors strncpy-from-user-nofault semantics.
pub fn read_path_prefix(mem: &dyn CallerMemory, src: UserPtr, buf: &mut [u8]) -> usize {
    buf.fill(0);
    if src.is_null() {
        return 0;
    }
    match mem.try_read(src, buf) {
        Ok(n) => n,
        Err(ReadFault) => {
            buf.fill(0);
            0
        }
    }
}
