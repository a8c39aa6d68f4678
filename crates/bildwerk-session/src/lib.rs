// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-session: The facade a host UI drives.
//
// A host creates one `Session`, feeds it files and settings, and reads back
// results, downloads, and the current error message. Reconfiguration is
// debounced with `Debouncer` and gated by `RequestToken`s so a slow, stale
// recomputation never overwrites a newer one.

pub mod debounce;
pub mod generation;
pub mod session;

pub use debounce::Debouncer;
pub use generation::{RequestGeneration, RequestToken};
pub use session::{Applied, RecompressJob, RecompressOutcome, Session};

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG` (default `info`).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .is_ok();
    if installed {
        tracing::info!("Bildwerk tracing initialised");
    }
}
