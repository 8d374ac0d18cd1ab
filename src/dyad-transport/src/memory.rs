//! A single-process `Transport` for tests: ranks share one KVS table and
//! fetches are served by reading straight out of each rank's managed
//! directory, which is what the out-of-scope producer-side fetch handler
//! would ultimately do anyway (spec §1).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use dyad_types::error::DyadError;
use dyad_types::{error::DyadResult, OwnerRecord};

use crate::Transport;

#[derive(Default)]
struct Kvs {
    table: Mutex<HashMap<String, OwnerRecord>>,
    condvar: Condvar,
}

impl Kvs {
    fn commit(&self, topic: &str, owner: OwnerRecord) {
        let mut table = self.table.lock().unwrap();
        table.insert(topic.to_string(), owner);
        drop(table);
        self.condvar.notify_all();
    }

    fn wait_create(&self, topic: &str) -> OwnerRecord {
        let mut table = self.table.lock().unwrap();
        loop {
            if let Some(owner) = table.get(topic) {
                return *owner;
            }
            table = self.condvar.wait(table).unwrap();
        }
    }
}

/// One rank's handle onto a shared in-memory job. Construct a whole job with
/// [`MemoryTransport::new_job`].
pub struct MemoryTransport {
    rank: u32,
    kvs: Arc<Kvs>,
    /// `rank -> that rank's producer-managed directory`, so `rpc_fetch` can
    /// read the bytes the producer actually wrote.
    managed_dirs: Arc<HashMap<u32, PathBuf>>,
    fetch_calls: Arc<AtomicUsize>,
}

impl MemoryTransport {
    /// Builds one `MemoryTransport` per rank in `managed_dirs` (keyed by
    /// rank), all sharing one KVS table.
    pub fn new_job(managed_dirs: HashMap<u32, PathBuf>) -> Vec<MemoryTransport> {
        let kvs = Arc::new(Kvs::default());
        let dirs = Arc::new(managed_dirs);
        let fetch_calls = Arc::new(AtomicUsize::new(0));
        let mut ranks: Vec<u32> = dirs.keys().copied().collect();
        ranks.sort_unstable();
        ranks
            .into_iter()
            .map(|rank| MemoryTransport {
                rank,
                kvs: kvs.clone(),
                managed_dirs: dirs.clone(),
                fetch_calls: fetch_calls.clone(),
            })
            .collect()
    }

    /// Total `rpc_fetch` calls issued by any rank sharing this job — used to
    /// assert the shared-storage and self-ownership short-circuits never
    /// issue an RPC (spec §8, properties 6-7).
    pub fn fetch_call_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn kvs_commit(&self, topic: &str, owner: OwnerRecord) -> DyadResult<()> {
        self.kvs.commit(topic, owner);
        Ok(())
    }

    fn kvs_lookup_wait_create(&self, topic: &str) -> DyadResult<OwnerRecord> {
        Ok(self.kvs.wait_create(topic))
    }

    fn rpc_fetch(&self, owner_rank: u32, user_path: &str) -> DyadResult<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let dir = self
            .managed_dirs
            .get(&owner_rank)
            .ok_or_else(|| DyadError::BadFetch(format!("no such rank {owner_rank}")))?;
        let path = dir.join(user_path);
        std::fs::read(&path).map_err(|e| DyadError::BadFetch(format!("{path:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn commit_then_lookup_same_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = HashMap::new();
        dirs.insert(0, dir.path().to_path_buf());
        let ranks = MemoryTransport::new_job(dirs);
        let rank0 = &ranks[0];

        rank0.kvs_commit("topic.a", OwnerRecord(0)).unwrap();
        let owner = rank0.kvs_lookup_wait_create("topic.a").unwrap();
        assert_eq!(owner, OwnerRecord(0));
    }

    #[test]
    fn fetch_reads_producer_directory() {
        let prod_dir = tempfile::tempdir().unwrap();
        fs::write(prod_dir.path().join("f.dat"), b"hello").unwrap();

        let mut dirs = HashMap::new();
        dirs.insert(0, prod_dir.path().to_path_buf());
        let ranks = MemoryTransport::new_job(dirs);

        let bytes = ranks[0].rpc_fetch(0, "f.dat").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ranks[0].fetch_call_count(), 1);
    }

    #[test]
    fn wait_create_blocks_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let mut dirs = HashMap::new();
        dirs.insert(0, dir.path().to_path_buf());
        dirs.insert(1, dir.path().to_path_buf());
        let mut ranks = MemoryTransport::new_job(dirs);
        let consumer = ranks.pop().unwrap();
        let producer = ranks.pop().unwrap();

        let consumer = Arc::new(consumer);
        let consumer_thread = {
            let consumer = consumer.clone();
            std::thread::spawn(move || consumer.kvs_lookup_wait_create("topic.b").unwrap())
        };

        std::thread::sleep(std::time::Duration::from_millis(50));
        producer.kvs_commit("topic.b", OwnerRecord(0)).unwrap();

        let owner = consumer_thread.join().unwrap();
        assert_eq!(owner, OwnerRecord(0));
    }
}
