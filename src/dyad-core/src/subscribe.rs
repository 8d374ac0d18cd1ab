//! Consumer-side subscribe (spec §4.4).

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use dyad_hash::gen_path_key;
use dyad_transport::Transport;
use dyad_types::error::{DyadError, DyadResult};
use dyad_types::{Config, ManagedPath};

/// Resolves the owner of the file at `path` (under `consumer_prefix`) and,
/// unless it is already local, fetches and writes it before the real open
/// proceeds. Blocks on the wait-create lookup with no timeout.
pub fn subscribe(
    transport: &dyn Transport,
    config: &Config,
    consumer_prefix: &ManagedPath,
    path: &Path,
) -> DyadResult<()> {
    let user_path = consumer_prefix
        .user_path(path)?
        .ok_or_else(|| DyadError::BadManagedPath(format!("{path:?} not under managed prefix")))?;

    let topic = gen_path_key(&user_path, config.key_depth, config.key_bins)
        .map_err(|e| DyadError::BadLookup(e.to_string()))?;

    let owner = transport
        .kvs_lookup_wait_create(&topic)
        .map_err(tag_lookup_failure)?;

    if config.shared_storage || owner.0 == transport.rank() {
        return Ok(());
    }

    let bytes = transport
        .rpc_fetch(owner.0, &user_path)
        .map_err(tag_fetch_failure)?;

    let local_path = consumer_prefix.local_path(&user_path);
    write_fetched_file(&local_path, &bytes, config.sync_dir)
}

fn tag_lookup_failure(e: DyadError) -> DyadError {
    match e {
        DyadError::FluxFail(_) => e,
        other => DyadError::BadLookup(other.to_string()),
    }
}

fn tag_fetch_failure(e: DyadError) -> DyadError {
    match e {
        DyadError::FluxFail(_) | DyadError::RpcFinished => e,
        other => DyadError::BadFetch(other.to_string()),
    }
}

/// Creates `local_path`'s parent directory tree with mode `u=rwx g=rwx o=rx,
/// setgid` (spec §6, "Filesystem output") and writes `bytes` into it. A
/// parent of `.` is left alone (spec §4.4 edge cases).
fn write_fetched_file(local_path: &Path, bytes: &[u8], sync_dir: bool) -> DyadResult<()> {
    if let Some(parent) = non_trivial_parent(local_path) {
        ensure_managed_dir(parent)?;
    }

    let mut file = File::create(local_path)
        .map_err(|e| DyadError::BadFio(format!("create {local_path:?}: {e}")))?;
    file.write_all(bytes)
        .map_err(|e| DyadError::BadFio(format!("short write to {local_path:?}: {e}")))?;

    if sync_dir {
        fsync_parent_dir(local_path)?;
    }
    Ok(())
}

fn non_trivial_parent(path: &Path) -> Option<&Path> {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() && p != Path::new(".") => Some(p),
        _ => None,
    }
}

#[cfg(unix)]
fn ensure_managed_dir(dir: &Path) -> DyadResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::create_dir_all(dir).map_err(|e| DyadError::BadFio(format!("mkdir {dir:?}: {e}")))?;

    // rwxrwxr-x + setgid, so files written by any rank's fetch land with the
    // same group ownership as the managed directory itself.
    let mode = 0o2775;
    let mut perms = std::fs::metadata(dir)
        .map_err(|e| DyadError::BadFio(format!("stat {dir:?}: {e}")))?
        .permissions();
    perms.set_mode(mode);
    std::fs::set_permissions(dir, perms)
        .map_err(|e| DyadError::BadFio(format!("chmod {dir:?}: {e}")))
}

#[cfg(not(unix))]
fn ensure_managed_dir(dir: &Path) -> DyadResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| DyadError::BadFio(format!("mkdir {dir:?}: {e}")))
}

fn fsync_parent_dir(path: &Path) -> DyadResult<()> {
    let parent = match non_trivial_parent(path) {
        Some(p) => p,
        None => return Ok(()),
    };
    let dir = File::open(parent).map_err(|e| DyadError::BadFio(format!("open {parent:?}: {e}")))?;
    dir.sync_all()
        .map_err(|e| DyadError::BadFio(format!("fsync {parent:?}: {e}")))
}
