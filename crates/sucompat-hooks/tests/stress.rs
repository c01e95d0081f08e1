// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Teardown-versus-in-flight stress tests.
//!
//! The one structural guarantee the hook layer makes is that a callback
//! can never observe a freed hook: removal unpublishes first, then
//! waits out a grace period, then frees. These tests hammer the
//! publication cells from several threads while an administrative
//! thread installs and tears down in a loop, with a deliberate delay
//! inside the callback so invocations are reliably in flight when the
//! grace period begins.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sucompat_core::paths::SU_PATH;
use sucompat_core::testing::SimMemory;
use sucompat_core::{CallerMemory, OpKind, SharedAllowlist, UserPtr};
use sucompat_hooks::testing::SimBackend;
use sucompat_hooks::{
    Engine, EngineConfig, HookFn, HookSet, PathArg, PendingOp, HOOKED_SYMBOLS, SYM_FACCESSAT,
};

fn fire_probe(backend: &SimBackend, symbol: &str) -> bool {
    let mem = SimMemory::new();
    let mut ptr = mem.map_bytes(0x1000, SU_PATH);
    let mut op = PendingOp {
        kind: OpKind::Access,
        uid: 0,
        path: PathArg::User(&mut ptr),
    };
    backend.fire(symbol, &mem, &mut op)
}

/// Every invocation that entered the callback has also left it by the
/// time `teardown_all` returns, across repeated install/teardown cycles
/// under continuous fire from reader threads.
#[test]
fn teardown_waits_for_in_flight_callbacks() {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();
    let backend = Arc::new(SimBackend::new());
    let hooks = HookSet::new(backend.clone());

    let entered = Arc::new(AtomicUsize::new(0));
    let exited = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..4 {
        let backend = backend.clone();
        let stop = stop.clone();
        readers.push(thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                fire_probe(&backend, SYM_FACCESSAT);
            }
        }));
    }

    for _cycle in 0..20 {
        let installed = hooks.install_all(|_symbol| {
            let entered = entered.clone();
            let exited = exited.clone();
            Box::new(move |_mem: &dyn CallerMemory, _op: &mut PendingOp<'_>| {
                entered.fetch_add(1, Ordering::SeqCst);
                // Keep the invocation in flight across the start of the
                // grace period.
                thread::sleep(Duration::from_millis(1));
                exited.fetch_add(1, Ordering::SeqCst);
            }) as HookFn
        });
        assert_eq!(installed, HOOKED_SYMBOLS.len());

        // Let readers land inside the callback.
        thread::sleep(Duration::from_millis(5));

        hooks.teardown_all();

        // The grace period has completed: nothing may still be inside
        // the callback, and nothing may enter it anymore.
        assert_eq!(
            entered.load(Ordering::SeqCst),
            exited.load(Ordering::SeqCst),
            "teardown returned while a callback was still in flight"
        );
    }

    stop.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().unwrap();
    }
    assert!(!fire_probe(&backend, SYM_FACCESSAT));
    assert_eq!(entered.load(Ordering::SeqCst), exited.load(Ordering::SeqCst));
    // With the readers gone, every cell's in-flight count must have
    // drained back to exactly zero.
    for symbol in HOOKED_SYMBOLS {
        assert_eq!(backend.inflight(symbol), 0, "{symbol} did not drain to zero");
    }
}

/// Whole-engine smoke test: operations racing start/stop/mode flips may
/// observe either side of a transition but must never crash, corrupt an
/// argument into a non-replacement value, or fire after teardown has
/// completed.
#[test]
fn engine_survives_concurrent_lifecycle_churn() {
    let backend = Arc::new(SimBackend::new());
    let gate = Arc::new(SharedAllowlist::new());
    gate.insert(0);
    let engine = Engine::new(
        EngineConfig {
            gate,
            escalator: Arc::new(sucompat_core::NullEscalator),
        },
        backend.clone(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let mut workers = Vec::new();
    for _ in 0..4 {
        let backend = backend.clone();
        let stop = stop.clone();
        workers.push(thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let mem = SimMemory::new();
                let mut ptr = mem.map_bytes(0x1000, SU_PATH);
                let before = ptr;
                let mut op = PendingOp {
                    kind: OpKind::Access,
                    uid: 0,
                    path: PathArg::User(&mut ptr),
                };
                backend.fire(SYM_FACCESSAT, &mem, &mut op);
                // Either untouched or pointing at the materialized
                // replacement below the simulated stack.
                assert!(ptr == before || !ptr.is_null());
            }
        }));
    }

    for _ in 0..50 {
        engine.start();
        engine.enable_alternate_mode();
        engine.disable_alternate_mode();
        engine.stop();
    }

    stop.store(true, Ordering::SeqCst);
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(engine.installed_hooks(), 0);
}
