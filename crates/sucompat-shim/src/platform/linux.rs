// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Linux implementation using LD_PRELOAD interposition.
//!
//! The exported `faccessat`/`fstatat`/`execve` definitions shadow
//! glibc's; each routes its path argument through the engine's
//! publication cell for that entry point, then forwards to the real
//! function resolved with `dlsym(RTLD_NEXT)`. When no hook is installed
//! (engine stopped, entry point not registered, or hooks torn down) the
//! cells are empty and the forward is a plain passthrough.

use std::cell::RefCell;
use std::sync::Arc;

use ctor::ctor;
use libc::{c_char, c_int};
use once_cell::sync::Lazy;
use sucompat_core::{CallerMemory, OpKind, ReadFault, UserPtr, WriteFault};
use sucompat_hooks::slot::HookCell;
use sucompat_hooks::{
    HookBackend, HookError, HookFn, HookHandle, PathArg, PendingOp, SYM_EXECVE, SYM_FACCESSAT,
    SYM_NEWFSTATAT,
};

use crate::core;

/// Initialize logging and the engine on library load.
#[ctor]
fn initialize_shim() {
    if std::env::var(core::ENV_LOG).is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_env(core::ENV_LOG))
            .with_writer(std::io::stderr)
            .try_init();
    }
    let backend = Arc::new(PreloadBackend);
    if let Some(engine) = core::build_engine(backend) {
        engine.start();
        let _ = core::ENGINE.set(engine);
    }
}

/// Whether the shim loaded, built an engine and is intercepting.
pub fn is_shim_enabled() -> bool {
    core::engine().map(|e| e.mode().intercepts()).unwrap_or(false)
}

struct PreloadCells {
    execve: Arc<HookCell>,
    faccessat: Arc<HookCell>,
    fstatat: Arc<HookCell>,
}

static CELLS: Lazy<PreloadCells> = Lazy::new(|| PreloadCells {
    execve: Arc::new(HookCell::new()),
    faccessat: Arc::new(HookCell::new()),
    fstatat: Arc::new(HookCell::new()),
});

// The engine names entry points after the syscalls; glibc exports the
// stat probe as `fstatat`.
fn cell_for(symbol: &'static str) -> Option<&'static Arc<HookCell>> {
    match symbol {
        SYM_EXECVE => Some(&CELLS.execve),
        SYM_FACCESSAT => Some(&CELLS.faccessat),
        SYM_NEWFSTATAT => Some(&CELLS.fstatat),
        _ => None,
    }
}

/// Registration backend mapping the engine's entry points onto the
/// interposed glibc symbols.
pub struct PreloadBackend;

impl HookBackend for PreloadBackend {
    fn register(&self, symbol: &'static str, hook: HookFn) -> Result<HookHandle, HookError> {
        let cell = cell_for(symbol).ok_or(HookError::UnknownSymbol(symbol))?;
        if !cell.install(hook) {
            return Err(HookError::AlreadyInstalled(symbol));
        }
        Ok(HookHandle::new(symbol, Arc::clone(cell)))
    }

    fn unregister(&self, handle: HookHandle) {
        handle.retire();
    }
}

const SCRATCH_LEN: usize = 64;

thread_local! {
    static SCRATCH: RefCell<[u8; SCRATCH_LEN]> = const { RefCell::new([0; SCRATCH_LEN]) };
}

/// Caller memory for the in-process case: the hook runs on the caller's
/// own thread, so its pointers are directly dereferenceable. Pointers a
/// caller could not have handed to libc in the first place are outside
/// this backend's fault tolerance.
pub struct InProcessMemory;

impl CallerMemory for InProcessMemory {
    fn try_read(&self, src: UserPtr, buf: &mut [u8]) -> Result<usize, ReadFault> {
        if src.is_null() {
            return Err(ReadFault);
        }
        let base = src.0 as *const u8;
        for (i, slot) in buf.iter_mut().enumerate() {
            // SAFETY: bounded, byte-wise walk of a pointer the caller
            // passed to libc; stops at the engine's fetch window.
            let byte = unsafe { base.add(i).read() };
            *slot = byte;
            if byte == 0 {
                return Ok(i + 1);
            }
        }
        Ok(buf.len())
    }

    fn try_write(&self, dst: UserPtr, bytes: &[u8]) -> Result<(), WriteFault> {
        if dst.is_null() {
            return Err(WriteFault);
        }
        // SAFETY: callers of this backend only write to addresses this
        // backend handed out.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst.0 as *mut u8, bytes.len()) };
        Ok(())
    }

    fn stack_pointer(&self) -> UserPtr {
        // Close enough for the default below-stack materialization,
        // which this backend overrides anyway.
        let marker = 0u8;
        UserPtr(&marker as *const u8 as usize)
    }

    fn materialize(&self, bytes: &[u8]) -> Option<UserPtr> {
        // Caller and hook share a thread, so a per-thread scratch slot
        // keeps the replacement alive until the forwarded call has
        // consumed it, without mapping anything.
        SCRATCH.with(|slot| {
            let mut slot = slot.borrow_mut();
            if bytes.len() > slot.len() {
                return None;
            }
            slot[..bytes.len()].copy_from_slice(bytes);
            Some(UserPtr(slot.as_ptr() as usize))
        })
    }
}

fn resolve_next(symbol: &'static [u8]) -> usize {
    debug_assert_eq!(symbol.last(), Some(&0u8));
    // SAFETY: NUL-terminated static symbol name.
    unsafe { libc::dlsym(libc::RTLD_NEXT, symbol.as_ptr() as *const c_char) as usize }
}

fn fail_enosys() -> c_int {
    // SAFETY: errno is thread-local.
    unsafe { *libc::__errno_location() = libc::ENOSYS };
    -1
}

/// Run the hook for one intercepted call, if installed. A panicking
/// hook must never take the caller's operation down; the operation then
/// proceeds with its original arguments.
fn dispatch_hook(cell: &HookCell, kind: OpKind, path: &mut UserPtr) {
    // SAFETY: getuid cannot fail.
    let uid = unsafe { libc::getuid() };
    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mem = InProcessMemory;
        let mut op = PendingOp {
            kind,
            uid,
            path: PathArg::User(path),
        };
        cell.dispatch(&mem, &mut op);
    }));
}

type FaccessatFn = unsafe extern "C" fn(c_int, *const c_char, c_int, c_int) -> c_int;
type FstatatFn = unsafe extern "C" fn(c_int, *const c_char, *mut libc::stat, c_int) -> c_int;
type ExecveFn =
    unsafe extern "C" fn(*const c_char, *const *const c_char, *const *const c_char) -> c_int;

fn real_faccessat() -> Option<FaccessatFn> {
    static REAL: Lazy<usize> = Lazy::new(|| resolve_next(b"faccessat\0"));
    // SAFETY: the address came from dlsym for this exact signature.
    (*REAL != 0).then(|| unsafe { std::mem::transmute::<usize, FaccessatFn>(*REAL) })
}

fn real_fstatat() -> Option<FstatatFn> {
    static REAL: Lazy<usize> = Lazy::new(|| resolve_next(b"fstatat\0"));
    // SAFETY: as above.
    (*REAL != 0).then(|| unsafe { std::mem::transmute::<usize, FstatatFn>(*REAL) })
}

fn real_execve() -> Option<ExecveFn> {
    static REAL: Lazy<usize> = Lazy::new(|| resolve_next(b"execve\0"));
    // SAFETY: as above.
    (*REAL != 0).then(|| unsafe { std::mem::transmute::<usize, ExecveFn>(*REAL) })
}

/// # Safety
///
/// Interposed libc entry point; argument contracts are libc's.
#[no_mangle]
pub unsafe extern "C" fn faccessat(
    dirfd: c_int,
    pathname: *const c_char,
    mode: c_int,
    flags: c_int,
) -> c_int {
    let Some(real) = real_faccessat() else {
        return fail_enosys();
    };
    let mut path = UserPtr(pathname as usize);
    dispatch_hook(&CELLS.faccessat, OpKind::Access, &mut path);
    real(dirfd, path.0 as *const c_char, mode, flags)
}

/// # Safety
///
/// Interposed libc entry point; argument contracts are libc's.
#[no_mangle]
pub unsafe extern "C" fn fstatat(
    dirfd: c_int,
    pathname: *const c_char,
    statbuf: *mut libc::stat,
    flags: c_int,
) -> c_int {
    let Some(real) = real_fstatat() else {
        return fail_enosys();
    };
    let mut path = UserPtr(pathname as usize);
    dispatch_hook(&CELLS.fstatat, OpKind::Stat, &mut path);
    real(dirfd, path.0 as *const c_char, statbuf, flags)
}

/// # Safety
///
/// Interposed libc entry point; argument contracts are libc's.
#[no_mangle]
pub unsafe extern "C" fn execve(
    pathname: *const c_char,
    argv: *const *const c_char,
    envp: *const *const c_char,
) -> c_int {
    let Some(real) = real_execve() else {
        return fail_enosys();
    };
    let mut path = UserPtr(pathname as usize);
    dispatch_hook(&CELLS.execve, OpKind::Exec, &mut path);
    real(path.0 as *const c_char, argv, envp)
}
