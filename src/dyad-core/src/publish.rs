//! Producer-side publish (spec §4.3).

use std::path::Path;

use dyad_hash::gen_path_key;
use dyad_transport::Transport;
use dyad_types::error::{DyadError, DyadResult};
use dyad_types::{Config, ManagedPath, OwnerRecord};

/// Advertises ownership of the file at `path` (which must live under
/// `producer_prefix`) to the KVS. Blocks until the commit is durable — this
/// is the ordering primitive subscribers rely on via wait-create.
pub fn publish(
    transport: &dyn Transport,
    config: &Config,
    producer_prefix: &ManagedPath,
    path: &Path,
) -> DyadResult<()> {
    let user_path = producer_prefix
        .user_path(path)?
        .ok_or_else(|| DyadError::BadManagedPath(format!("{path:?} not under managed prefix")))?;

    let topic = gen_path_key(&user_path, config.key_depth, config.key_bins)
        .map_err(|e| DyadError::BadPack(e.to_string()))?;

    transport
        .kvs_commit(&topic, OwnerRecord(transport.rank()))
        .map_err(tag_commit_failure)
}

/// Transport errors already carry a specific code for transport-level
/// failures (`FLUXFAIL`); anything else that bubbles out of a commit is
/// re-tagged as `BADCOMMIT` per spec §4.3's error taxonomy.
fn tag_commit_failure(e: DyadError) -> DyadError {
    match e {
        DyadError::FluxFail(_) => e,
        other => DyadError::BadCommit(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dyad_transport::memory::MemoryTransport;
    use std::collections::HashMap;
    use std::fs;

    #[test]
    fn publish_commits_owner() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f.dat"), b"hi").unwrap();

        let mut dirs = HashMap::new();
        dirs.insert(0u32, dir.path().to_path_buf());
        let ranks = MemoryTransport::new_job(dirs);
        let config = Config::default();
        let prefix = ManagedPath::new(dir.path());

        publish(&ranks[0], &config, &prefix, &dir.path().join("f.dat")).unwrap();

        let topic = gen_path_key("f.dat", config.key_depth, config.key_bins).unwrap();
        let owner = ranks[0].kvs_lookup_wait_create(&topic).unwrap();
        assert_eq!(owner, OwnerRecord(0));
    }

    #[test]
    fn rejects_path_outside_managed_prefix() {
        let managed = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        fs::write(elsewhere.path().join("f.dat"), b"hi").unwrap();

        let mut dirs = HashMap::new();
        dirs.insert(0u32, managed.path().to_path_buf());
        let ranks = MemoryTransport::new_job(dirs);
        let config = Config::default();
        let prefix = ManagedPath::new(managed.path());

        let err = publish(&ranks[0], &config, &prefix, &elsewhere.path().join("f.dat"))
            .unwrap_err();
        assert_eq!(err.code(), "BADMANAGEDPATH");
    }
}
