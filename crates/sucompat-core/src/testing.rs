// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test doubles shared by this crate's tests and downstream crates.
//!
//! [`SimMemory`] models a caller's address space: a small writable
//! stack plus explicitly mapped byte regions. Anything not mapped
//! faults, which is exactly the hostile-input behavior the engine must
//! shrug off.

use std::sync::atomic::AtomicUsize;
use std::sync::Mutex;

use crate::error::{ReadFault, WriteFault};
use crate::policy::Escalator;
use crate::uaccess::{CallerMemory, UserPtr};

const STACK_TOP: usize = 0x7fff_f000;
const STACK_SIZE: usize = 0x1000;

struct Region {
    base: usize,
    bytes: Vec<u8>,
    writable: bool,
}

impl Region {
    fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.bytes.len()
    }
}

/// Simulated caller address space.
pub struct SimMemory {
    regions: Mutex<Vec<Region>>,
}

impl Default for SimMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl SimMemory {
    /// A fresh address space with an empty, writable stack and nothing
    /// else mapped.
    pub fn new() -> Self {
        Self {
            regions: Mutex::new(vec![Region {
                base: STACK_TOP - STACK_SIZE,
                bytes: vec![0; STACK_SIZE],
                writable: true,
            }]),
        }
    }

    /// Map `bytes` at `base` and return a pointer to them.
    pub fn map_bytes(&self, base: usize, bytes: &[u8]) -> UserPtr {
        self.regions.lock().unwrap().push(Region {
            base,
            bytes: bytes.to_vec(),
            writable: true,
        });
        UserPtr(base)
    }

    /// Make the stack unwritable so scratch writes fail.
    pub fn poison_stack(&self) {
        let mut regions = self.regions.lock().unwrap();
        regions[0].writable = false;
    }

    /// Read mapped memory back out, for assertions.
    pub fn read_back(&self, ptr: UserPtr, len: usize) -> Option<Vec<u8>> {
        let regions = self.regions.lock().unwrap();
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let addr = ptr.0 + i;
            let region = regions.iter().find(|r| r.contains(addr))?;
            out.push(region.bytes[addr - region.base]);
        }
        Some(out)
    }
}

impl CallerMemory for SimMemory {
    fn try_read(&self, src: UserPtr, buf: &mut [u8]) -> Result<usize, ReadFault> {
        let regions = self.regions.lock().unwrap();
        for (i, slot) in buf.iter_mut().enumerate() {
            let addr = src.0 + i;
            let region = regions.iter().find(|r| r.contains(addr)).ok_or(ReadFault)?;
            let byte = region.bytes[addr - region.base];
            *slot = byte;
            if byte == 0 {
                return Ok(i + 1);
            }
        }
        Ok(buf.len())
    }

    fn try_write(&self, dst: UserPtr, bytes: &[u8]) -> Result<(), WriteFault> {
        let mut regions = self.regions.lock().unwrap();
        // Validate the whole span before mutating any of it.
        for i in 0..bytes.len() {
            let addr = dst.0 + i;
            match regions.iter().find(|r| r.contains(addr)) {
                Some(region) if region.writable => {}
                _ => return Err(WriteFault),
            }
        }
        for (i, byte) in bytes.iter().enumerate() {
            let addr = dst.0 + i;
            let region = regions
                .iter_mut()
                .find(|r| r.contains(addr))
                .expect("span validated above");
            let offset = addr - region.base;
            region.bytes[offset] = *byte;
        }
        Ok(())
    }

    fn stack_pointer(&self) -> UserPtr {
        UserPtr(STACK_TOP)
    }
}

/// Escalator that counts hand-offs instead of performing them.
#[derive(Debug, Default)]
pub struct CountingEscalator {
    pub calls: AtomicUsize,
}

impl Escalator for CountingEscalator {
    fn escalate(&self) {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}
