#![cfg_attr(not(target_os = "linux"), allow(dead_code))]
// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! LD_PRELOAD shim for the su-compat engine.
//!
//! Preloading this library into a process makes the legacy helper path
//! appear present: `faccessat`/`fstatat` probes against it answer for
//! the fallback shell, and `execve` of it is redirected into the
//! management daemon, both gated by the allow-list. Interposition uses
//! `dlsym(RTLD_NEXT)` forwarding; the engine's hook lifecycle decides
//! which of the three libc entry points are actually intercepted.

#[cfg(target_os = "linux")]
pub mod platform;

#[cfg(not(target_os = "linux"))]
mod unsupported;

#[cfg(not(target_os = "linux"))]
pub use unsupported::*;

/// Configuration and global state shared across platforms.
pub mod core {
    use std::sync::Arc;

    use once_cell::sync::OnceCell;
    use sucompat_core::{Escalator, SharedAllowlist};
    use sucompat_hooks::{Engine, EngineConfig, HookBackend};
    use tracing::info;

    /// Master switch; unset defaults to enabled.
    pub const ENV_ENABLED: &str = "SUCOMPAT_ENABLED";
    /// Comma-separated uids admitted to the allow-list at load.
    pub const ENV_ALLOW_UIDS: &str = "SUCOMPAT_ALLOW_UIDS";
    /// Log filter for the shim's tracing output; unset means silent.
    pub const ENV_LOG: &str = "SUCOMPAT_LOG";

    /// The process-wide engine, set once by platform initialization.
    pub static ENGINE: OnceCell<Arc<Engine>> = OnceCell::new();

    pub fn engine() -> Option<&'static Arc<Engine>> {
        ENGINE.get()
    }

    /// Elevation happens daemon-side once the redirected execve lands
    /// there; the shim only records the hand-off.
    pub struct LogEscalator;

    impl Escalator for LogEscalator {
        fn escalate(&self) {
            info!("escalation handed off to the daemon");
        }
    }

    pub fn env_enabled() -> bool {
        std::env::var(ENV_ENABLED)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(true)
    }

    /// Parse `SUCOMPAT_ALLOW_UIDS`; unparsable entries are skipped so a
    /// typo narrows access instead of widening it.
    pub fn allowed_uids_from_env() -> Vec<u32> {
        std::env::var(ENV_ALLOW_UIDS)
            .map(|raw| {
                raw.split(',')
                    .filter_map(|part| part.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Build the engine from environment configuration. `None` when the
    /// shim is disabled outright.
    pub fn build_engine(backend: Arc<dyn HookBackend>) -> Option<Arc<Engine>> {
        if !env_enabled() {
            return None;
        }
        let gate = Arc::new(SharedAllowlist::new());
        gate.replace(allowed_uids_from_env());
        Some(Engine::new(
            EngineConfig {
                gate,
                escalator: Arc::new(LogEscalator),
            },
            backend,
        ))
    }
}
