pub mod memory;
pub mod tcp;
pub mod wire;

use dyad_types::{error::DyadResult, OwnerRecord};

/// The client-side face of the external KVS/RPC collaborator (spec §1,
/// "out of scope: the KVS/RPC transport itself"). `dyad-core` depends only
/// on this trait; `memory::MemoryTransport` and `tcp::TcpTransport` are two
/// concrete bindings this workspace ships so the engine can actually run
/// and be tested.
pub trait Transport: Send + Sync {
    /// This process's rank in the job, as obtained from the transport at
    /// connect time (spec §4.2 step 4).
    fn rank(&self) -> u32;

    /// Transactional put of `topic -> rank`, blocking until the commit is
    /// durable (spec §4.3).
    fn kvs_commit(&self, topic: &str, owner: OwnerRecord) -> DyadResult<()>;

    /// Wait-create lookup: blocks until `topic` exists, then returns its
    /// value (spec §4.4 step 2).
    fn kvs_lookup_wait_create(&self, topic: &str) -> DyadResult<OwnerRecord>;

    /// Issues the `dyad.fetch` RPC to `owner_rank` for `user_path` and
    /// returns the raw file bytes (spec §4.4 steps 5-6).
    fn rpc_fetch(&self, owner_rank: u32, user_path: &str) -> DyadResult<Vec<u8>>;
}
