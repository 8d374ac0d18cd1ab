//! Per-thread interposition context and process-wide shared state (spec §4.1,
//! §4.2). The reentrancy guard mirrors `wormhole::flock::FlockGuard` — a
//! value whose `Drop` releases a flag, here used to keep a hooked call from
//! re-entering our own machinery when it performs its own file I/O.

use std::cell::Cell;
use std::sync::{Arc, OnceLock};

use dyad_transport::Transport;
use dyad_types::Config;

thread_local! {
    static REENTER: Cell<bool> = const { Cell::new(false) };
}

/// Held for the duration of one hook invocation. While held, nested calls
/// into the hooked functions (`open`, `fopen`, ...) from within our own
/// coordination code see [`is_reentrant`] return `true` and skip straight to
/// the real function (spec §4.1, "Re-entrancy").
pub struct ReentryGuard {
    _private: (),
}

impl ReentryGuard {
    /// Returns `None` if a guard is already held on this thread — the caller
    /// must treat that as "already inside our own code" and pass through.
    pub fn enter() -> Option<Self> {
        REENTER.with(|r| {
            if r.get() {
                None
            } else {
                r.set(true);
                Some(ReentryGuard { _private: () })
            }
        })
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        REENTER.with(|r| r.set(false));
    }
}

/// `true` if a [`ReentryGuard`] is currently held on this thread.
pub fn is_reentrant() -> bool {
    REENTER.with(|r| r.get())
}

/// Process-wide state established once by [`crate::lifecycle::init`] and
/// read by every hooked call thereafter. `None` until `init` runs, and left
/// `None` forever in degraded mode (spec §5, "Missing transport").
pub struct SharedState {
    pub config: Config,
    pub transport: Option<Arc<dyn Transport>>,
    /// Whether `DYAD_SYNC_START`'s barrier actually ran and succeeded
    /// during init (spec §3's `sync_started` context field). `teardown`
    /// gates its timestamp log on this, not merely on having a transport.
    pub sync_started: bool,
}

static SHARED: OnceLock<SharedState> = OnceLock::new();

/// Installs the process-wide state. A second call (possible if the host
/// process forks and the interposed library re-runs its constructor, spec
/// §4.2 Open Question) is a no-op: the first process to initialize wins and
/// later callers observe the same `SharedState` rather than reconnecting.
pub fn set_shared_state(state: SharedState) -> &'static SharedState {
    match SHARED.set(state) {
        Ok(()) => SHARED.get().expect("just set"),
        Err(_rejected) => SHARED.get().expect("OnceLock::set failed only after a successful set"),
    }
}

pub fn shared_state() -> Option<&'static SharedState> {
    SHARED.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_blocks_nested_enter_on_same_thread() {
        assert!(!is_reentrant());
        let outer = ReentryGuard::enter().expect("first enter succeeds");
        assert!(is_reentrant());
        assert!(ReentryGuard::enter().is_none());
        drop(outer);
        assert!(!is_reentrant());
    }

    #[test]
    fn guard_is_per_thread() {
        let outer = ReentryGuard::enter().unwrap();
        let joined = std::thread::spawn(|| ReentryGuard::enter().is_some())
            .join()
            .unwrap();
        assert!(joined);
        drop(outer);
    }
}
