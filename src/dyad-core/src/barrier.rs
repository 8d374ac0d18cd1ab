//! The `DYAD_SYNC_START=N` startup rendezvous (spec §4.2 step 6, §5).
//!
//! Rather than adding a dedicated barrier opcode to the transport, each
//! participant publishes its own arrival under `sync_start.<rank>` and then
//! waits for all `N` arrival topics to exist — the existing wait-create
//! lookup already gives an unbounded, no-timeout wait, which is exactly
//! what spec §5 calls for ("waits for exactly N participants with no
//! timeout").

use std::time::SystemTime;

use dyad_types::error::DyadResult;
use dyad_types::OwnerRecord;
use tracing::info;

use dyad_transport::Transport;

const BARRIER_NAMESPACE: &str = "sync_start";

/// Blocks until `n` ranks (including this one) have called this function.
/// A no-op when `n == 0` (the feature is disabled).
pub fn startup_barrier(transport: &dyn Transport, n: u32) -> DyadResult<()> {
    if n == 0 {
        return Ok(());
    }

    let rank = transport.rank();
    transport.kvs_commit(&format!("{BARRIER_NAMESPACE}.{rank}"), OwnerRecord(rank))?;

    for peer in 0..n {
        transport.kvs_lookup_wait_create(&format!("{BARRIER_NAMESPACE}.{peer}"))?;
    }

    info!(rank, n, at = ?SystemTime::now(), "dyad: sync_start barrier satisfied");
    Ok(())
}
