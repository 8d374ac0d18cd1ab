//! Process-wide init and teardown (spec §4.2). These are the bodies the
//! `ctor`/`dtor`-attributed functions in `dyad-hook` call; kept here, free
//! of any `extern "C"` or libc concerns, so they can be driven directly from
//! tests.

use std::sync::Arc;
use std::time::SystemTime;

use tracing::{info, warn};

use dyad_transport::tcp::TcpTransport;
use dyad_transport::Transport;
use dyad_types::Config;

use crate::barrier::startup_barrier;
use crate::context::{set_shared_state, shared_state, SharedState};

/// Runs once per process. Reads the environment, tries to connect the
/// transport, and — on success — takes the `DYAD_SYNC_START` barrier. A
/// transport that fails to connect is logged and the process proceeds in
/// degraded (pass-through) mode rather than aborting (spec §5, "Missing
/// transport"); a second call after the first succeeded is a no-op (spec
/// §4.2 Open Question on re-init).
pub fn init() {
    if shared_state().is_some() {
        return;
    }

    let config = Config::from_env();
    let transport = connect_transport(&config);

    let mut sync_started = false;
    if let Some(t) = &transport {
        if config.sync_start > 0 {
            match startup_barrier(t.as_ref(), config.sync_start) {
                Ok(()) => sync_started = true,
                Err(e) => warn!("dyad: startup barrier failed: {e}"),
            }
        }
    }

    set_shared_state(SharedState {
        config,
        transport,
        sync_started,
    });
}

fn connect_transport(config: &Config) -> Option<Arc<dyn Transport>> {
    let addr = config.transport_addr.as_deref()?;
    let managed_dir = config
        .path_prod
        .clone()
        .or_else(|| config.path_cons.clone())
        .unwrap_or_default();

    // Our reference TcpTransport has no rank-negotiation handshake with the
    // coordinator, so the rank has to come from the job launcher's own
    // environment (spec §4.2 step 4 leaves "obtain the local rank from the
    // transport" to whatever transport is in use). Defaulting to 0 when
    // nothing is set means every such process collapses onto one rank and
    // cross-rank fetches silently never happen, so this is logged loudly
    // rather than silently assumed.
    let rank = config.rank.unwrap_or_else(|| {
        warn!(
            "dyad: no rank env var found (DYAD_RANK/PMI_RANK/OMPI_COMM_WORLD_RANK); \
             defaulting to rank 0, cross-rank fetches will not work correctly"
        );
        0
    });

    match TcpTransport::connect(addr, rank, managed_dir) {
        Ok(t) => {
            info!("dyad: connected to transport at {addr} as rank {rank}");
            Some(Arc::new(t))
        }
        Err(e) => {
            warn!("dyad: transport unavailable ({e}), running in pass-through mode");
            None
        }
    }
}

/// Runs once per process at exit. A no-op unless `init` actually took the
/// `DYAD_SYNC_START` barrier, in which case it logs the teardown timestamp
/// so operators can correlate job-exit ordering against the KVS (spec §4.2
/// step 8, "if a start-barrier was taken, print a teardown timestamp").
pub fn teardown() {
    if let Some(state) = shared_state() {
        if state.sync_started {
            info!(at = ?SystemTime::now(), "dyad: process teardown");
        }
    }
}
