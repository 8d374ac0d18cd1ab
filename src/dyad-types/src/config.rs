use std::path::PathBuf;

/// Process-wide configuration, read once from the environment (spec §6).
#[derive(Debug, Clone)]
pub struct Config {
    pub path_cons: Option<PathBuf>,
    pub path_prod: Option<PathBuf>,
    pub is_producer: bool,
    pub is_consumer: bool,
    pub kvs_namespace: Option<String>,
    pub key_depth: u32,
    pub key_bins: u32,
    pub shared_storage: bool,
    pub debug: bool,
    pub check: bool,
    pub sync_start: u32,
    pub sync_dir: bool,
    /// Address of the coordination transport this workspace's reference
    /// `Transport` implementations connect to. Not part of the spec's wire
    /// contract — the spec treats the KVS/RPC transport as a pre-existing
    /// external service; this variable only configures *our* stand-in
    /// client/server pair (see `dyad-transport`).
    pub transport_addr: Option<String>,
    /// This process's rank in the job, read from whichever job-launcher
    /// convention is present (spec §4.2 step 4, "Obtain the local rank from
    /// the transport" — our reference `TcpTransport` has no such
    /// negotiation, so the rank has to come from the environment the
    /// launcher sets up instead). `None` means no rank-bearing variable was
    /// found; callers must not silently treat that as rank 0 without
    /// logging, since every process doing so collapses the whole job onto
    /// one rank.
    pub rank: Option<u32>,
}

pub const DEFAULT_KEY_DEPTH: u32 = 3;
pub const DEFAULT_KEY_BINS: u32 = 1024;

impl Default for Config {
    fn default() -> Self {
        Config {
            path_cons: None,
            path_prod: None,
            is_producer: false,
            is_consumer: false,
            kvs_namespace: None,
            key_depth: DEFAULT_KEY_DEPTH,
            key_bins: DEFAULT_KEY_BINS,
            shared_storage: false,
            debug: false,
            check: false,
            sync_start: 0,
            sync_dir: false,
            transport_addr: None,
            rank: None,
        }
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name).map(PathBuf::from)
}

fn env_flag(name: &str) -> bool {
    std::env::var_os(name).is_some()
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

/// Job-launcher rank conventions, checked in order. `DYAD_RANK` is this
/// system's own variable; `PMI_RANK` and `OMPI_COMM_WORLD_RANK` are the
/// common MPI-launcher fallbacks the HPC workflows this system targets
/// already run under.
const RANK_ENV_VARS: [&str; 3] = ["DYAD_RANK", "PMI_RANK", "OMPI_COMM_WORLD_RANK"];

fn env_rank() -> Option<u32> {
    RANK_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok().and_then(|v| v.parse::<u32>().ok()))
}

impl Config {
    /// Mirrors the env-var reading step of lifecycle startup (spec §4.2.2).
    pub fn from_env() -> Self {
        Config {
            path_cons: env_path("DYAD_PATH_CONS"),
            path_prod: env_path("DYAD_PATH_PROD"),
            is_producer: env_flag("DYAD_KIND_PROD"),
            is_consumer: env_flag("DYAD_KIND_CONS"),
            kvs_namespace: std::env::var("DYAD_KVS_NAMESPACE").ok(),
            key_depth: env_u32("DYAD_KEY_DEPTH", DEFAULT_KEY_DEPTH),
            key_bins: env_u32("DYAD_KEY_BINS", DEFAULT_KEY_BINS),
            shared_storage: env_flag("DYAD_SHARED_STORAGE"),
            debug: env_flag("DYAD_SYNC_DEBUG"),
            check: env_flag("DYAD_SYNC_CHECK"),
            sync_start: std::env::var("DYAD_SYNC_START")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(0),
            sync_dir: env_flag("DYAD_SYNC_DIR"),
            transport_addr: std::env::var("DYAD_TRANSPORT_ADDR").ok(),
            rank: env_rank(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_VARS: &[&str] = &[
        "DYAD_PATH_CONS",
        "DYAD_PATH_PROD",
        "DYAD_KIND_PROD",
        "DYAD_KIND_CONS",
        "DYAD_KVS_NAMESPACE",
        "DYAD_KEY_DEPTH",
        "DYAD_KEY_BINS",
        "DYAD_SHARED_STORAGE",
        "DYAD_SYNC_DEBUG",
        "DYAD_SYNC_CHECK",
        "DYAD_SYNC_START",
        "DYAD_SYNC_DIR",
        "DYAD_TRANSPORT_ADDR",
        "DYAD_RANK",
        "PMI_RANK",
        "OMPI_COMM_WORLD_RANK",
    ];

    fn clear_all() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn from_env_with_nothing_set_matches_default() {
        clear_all();
        let config = Config::from_env();
        assert_eq!(config.key_depth, DEFAULT_KEY_DEPTH);
        assert_eq!(config.key_bins, DEFAULT_KEY_BINS);
        assert_eq!(config.sync_start, 0);
        assert!(!config.shared_storage);
        assert!(config.rank.is_none());
        clear_all();
    }

    #[test]
    #[serial]
    fn from_env_reads_paths_and_flags() {
        clear_all();
        std::env::set_var("DYAD_PATH_CONS", "/cons");
        std::env::set_var("DYAD_PATH_PROD", "/prod");
        std::env::set_var("DYAD_KIND_PROD", "1");
        std::env::set_var("DYAD_SHARED_STORAGE", "1");
        std::env::set_var("DYAD_KEY_DEPTH", "5");

        let config = Config::from_env();
        assert_eq!(config.path_cons, Some(PathBuf::from("/cons")));
        assert_eq!(config.path_prod, Some(PathBuf::from("/prod")));
        assert!(config.is_producer);
        assert!(!config.is_consumer);
        assert!(config.shared_storage);
        assert_eq!(config.key_depth, 5);

        clear_all();
    }

    #[test]
    #[serial]
    fn env_u32_falls_back_to_default_on_zero_or_garbage() {
        clear_all();
        std::env::set_var("DYAD_KEY_BINS", "0");
        assert_eq!(Config::from_env().key_bins, DEFAULT_KEY_BINS);

        std::env::set_var("DYAD_KEY_BINS", "not-a-number");
        assert_eq!(Config::from_env().key_bins, DEFAULT_KEY_BINS);

        clear_all();
    }

    #[test]
    #[serial]
    fn rank_prefers_dyad_rank_over_mpi_fallbacks() {
        clear_all();
        std::env::set_var("OMPI_COMM_WORLD_RANK", "3");
        assert_eq!(Config::from_env().rank, Some(3));

        std::env::set_var("PMI_RANK", "2");
        assert_eq!(Config::from_env().rank, Some(2));

        std::env::set_var("DYAD_RANK", "1");
        assert_eq!(Config::from_env().rank, Some(1));

        clear_all();
    }
}
