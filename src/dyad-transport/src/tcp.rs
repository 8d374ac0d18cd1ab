//! A minimal network-backed `Transport` and its matching coordinator
//! service — the concrete realization of spec §6's KVS/RPC wire contract
//! this workspace ships so the engine can run against something real. This
//! is a reference implementation of the contract, not a production
//! distributed KVS: `TcpCoordinator` centralizes both the key/value store
//! and the `dyad.fetch` relay in one process, where the spec's architecture
//! has the KVS as a pre-existing distributed service and `dyad.fetch` as a
//! point-to-point RPC straight to the owning rank (spec §1, §5).

use std::collections::HashMap;
use std::io::{self};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use dyad_types::error::DyadError;
use dyad_types::{error::DyadResult, OwnerRecord};
use tracing::{debug, warn};

use crate::wire::{read_frame, write_frame, Opcode};
use crate::Transport;

fn encode_register(rank: u32, managed_dir: &std::path::Path) -> Vec<u8> {
    let mut buf = rank.to_be_bytes().to_vec();
    buf.extend_from_slice(managed_dir.to_string_lossy().as_bytes());
    buf
}

fn decode_register(payload: &[u8]) -> DyadResult<(u32, PathBuf)> {
    if payload.len() < 4 {
        return Err(DyadError::BadRpc("short REGISTER payload".into()));
    }
    let rank = u32::from_be_bytes(payload[0..4].try_into().unwrap());
    let dir = String::from_utf8_lossy(&payload[4..]).into_owned();
    Ok((rank, PathBuf::from(dir)))
}

fn encode_commit(owner: OwnerRecord, topic: &str) -> Vec<u8> {
    let mut buf = owner.0.to_be_bytes().to_vec();
    buf.extend_from_slice(topic.as_bytes());
    buf
}

fn decode_commit(payload: &[u8]) -> DyadResult<(OwnerRecord, String)> {
    if payload.len() < 4 {
        return Err(DyadError::BadPack("short COMMIT payload".into()));
    }
    let rank = u32::from_be_bytes(payload[0..4].try_into().unwrap());
    let topic = String::from_utf8(payload[4..].to_vec())
        .map_err(|e| DyadError::BadPack(format!("topic not utf8: {e}")))?;
    Ok((OwnerRecord(rank), topic))
}

fn encode_fetch(owner_rank: u32, user_path: &str) -> Vec<u8> {
    let mut buf = owner_rank.to_be_bytes().to_vec();
    buf.extend_from_slice(user_path.as_bytes());
    buf
}

fn decode_fetch(payload: &[u8]) -> DyadResult<(u32, String)> {
    if payload.len() < 4 {
        return Err(DyadError::BadRpc("short FETCH payload".into()));
    }
    let owner_rank = u32::from_be_bytes(payload[0..4].try_into().unwrap());
    let user_path = String::from_utf8(payload[4..].to_vec())
        .map_err(|e| DyadError::BadRpc(format!("user path not utf8: {e}")))?;
    Ok((owner_rank, user_path))
}

/// Client-side handle: connects to `addr` fresh for each operation (spec
/// §4.2 step 3's "open the transport handle" is, for this binding, just
/// remembering the address and this rank's own managed directory so a
/// `Register` frame can be sent ahead of every request).
pub struct TcpTransport {
    addr: String,
    rank: u32,
    managed_dir: PathBuf,
}

impl TcpTransport {
    /// "Opens" the transport by performing one round-trip against the
    /// coordinator, so construction fails fast if it is unreachable (spec
    /// §4.2 step 3: failure here must degrade the caller to pass-through,
    /// not panic).
    pub fn connect(addr: &str, rank: u32, managed_dir: PathBuf) -> DyadResult<Self> {
        let transport = TcpTransport {
            addr: addr.to_string(),
            rank,
            managed_dir,
        };
        // Probe with a commit of our own presence; any reachable coordinator
        // accepts this as a no-op-ish registration check.
        TcpStream::connect(&transport.addr)
            .map_err(|e| DyadError::FluxFail(format!("connect {addr}: {e}")))?;
        Ok(transport)
    }

    fn request(&self, op: Opcode, payload: &[u8]) -> DyadResult<(Opcode, Vec<u8>)> {
        let mut stream = TcpStream::connect(&self.addr)
            .map_err(|e| DyadError::FluxFail(format!("connect {}: {e}", self.addr)))?;

        write_frame(
            &mut stream,
            Opcode::Register,
            &encode_register(self.rank, &self.managed_dir),
        )
        .map_err(|e| DyadError::BadRpc(format!("send register: {e}")))?;
        write_frame(&mut stream, op, payload)
            .map_err(|e| DyadError::BadRpc(format!("send request: {e}")))?;

        match read_frame(&mut stream)? {
            None => Err(DyadError::RpcFinished),
            Some((Opcode::Error, body)) => {
                Err(DyadError::BadRpc(String::from_utf8_lossy(&body).into_owned()))
            }
            Some((opcode, body)) => Ok((opcode, body)),
        }
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> u32 {
        self.rank
    }

    fn kvs_commit(&self, topic: &str, owner: OwnerRecord) -> DyadResult<()> {
        self.request(Opcode::Commit, &encode_commit(owner, topic))?;
        Ok(())
    }

    fn kvs_lookup_wait_create(&self, topic: &str) -> DyadResult<OwnerRecord> {
        let (_, body) = self.request(Opcode::Lookup, topic.as_bytes())?;
        OwnerRecord::decode(&body)
    }

    fn rpc_fetch(&self, owner_rank: u32, user_path: &str) -> DyadResult<Vec<u8>> {
        let (_, body) = self.request(Opcode::Fetch, &encode_fetch(owner_rank, user_path))?;
        Ok(body)
    }
}

#[derive(Default)]
struct KvsTable {
    table: Mutex<HashMap<String, OwnerRecord>>,
    condvar: Condvar,
}

impl KvsTable {
    fn commit(&self, topic: String, owner: OwnerRecord) {
        let mut table = self.table.lock().unwrap();
        table.insert(topic, owner);
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

/// Reference coordinator: one process standing in for both the pre-existing
/// KVS and the per-rank fetch handler the spec treats as external (spec §1,
/// §6). Accepts one connection per client request and spawns a thread per
/// connection — wait-create lookups block their own thread without
/// affecting any other client.
pub struct TcpCoordinator {
    kvs: Arc<KvsTable>,
    registrations: Arc<Mutex<HashMap<u32, PathBuf>>>,
}

impl TcpCoordinator {
    pub fn new() -> Self {
        TcpCoordinator {
            kvs: Arc::new(KvsTable::default()),
            registrations: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Binds `addr` and serves forever on a background thread, returning
    /// the bound local address (useful for tests that bind to port 0).
    pub fn spawn(addr: &str) -> io::Result<(std::net::SocketAddr, thread::JoinHandle<()>)> {
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        let coordinator = Arc::new(TcpCoordinator::new());
        let handle = thread::spawn(move || coordinator.serve(listener));
        Ok((local_addr, handle))
    }

    fn serve(self: Arc<Self>, listener: TcpListener) {
        for conn in listener.incoming() {
            let stream = match conn {
                Ok(s) => s,
                Err(e) => {
                    warn!("dyadd: accept failed: {e}");
                    continue;
                }
            };
            let this = self.clone();
            thread::spawn(move || this.handle_conn(stream));
        }
    }

    fn handle_conn(&self, mut stream: TcpStream) {
        let (reg_rank, reg_dir) = match read_frame(&mut stream) {
            Ok(Some((Opcode::Register, payload))) => match decode_register(&payload) {
                Ok(v) => v,
                Err(e) => {
                    let _ = write_frame(&mut stream, Opcode::Error, e.to_string().as_bytes());
                    return;
                }
            },
            _ => {
                let _ = write_frame(&mut stream, Opcode::Error, b"expected REGISTER frame");
                return;
            }
        };
        self.registrations.lock().unwrap().insert(reg_rank, reg_dir);

        let (opcode, payload) = match read_frame(&mut stream) {
            Ok(Some(v)) => v,
            Ok(None) => return,
            Err(e) => {
                let _ = write_frame(&mut stream, Opcode::Error, e.to_string().as_bytes());
                return;
            }
        };

        let result = match opcode {
            Opcode::Commit => self.handle_commit(&payload),
            Opcode::Lookup => self.handle_lookup(&payload),
            Opcode::Fetch => self.handle_fetch(&payload),
            other => Err(DyadError::BadRpc(format!("unexpected opcode {other:?}"))),
        };

        match result {
            Ok(body) => {
                let _ = write_frame(&mut stream, Opcode::Response, &body);
            }
            Err(e) => {
                debug!("dyadd: request failed: {e}");
                let _ = write_frame(&mut stream, Opcode::Error, e.to_string().as_bytes());
            }
        }
    }

    fn handle_commit(&self, payload: &[u8]) -> DyadResult<Vec<u8>> {
        let (owner, topic) = decode_commit(payload)?;
        self.kvs.commit(topic, owner);
        Ok(Vec::new())
    }

    fn handle_lookup(&self, payload: &[u8]) -> DyadResult<Vec<u8>> {
        let topic = String::from_utf8(payload.to_vec())
            .map_err(|e| DyadError::BadLookup(format!("topic not utf8: {e}")))?;
        let owner = self.kvs.wait_create(&topic);
        Ok(owner.encode())
    }

    fn handle_fetch(&self, payload: &[u8]) -> DyadResult<Vec<u8>> {
        let (owner_rank, user_path) = decode_fetch(payload)?;
        let dir = self
            .registrations
            .lock()
            .unwrap()
            .get(&owner_rank)
            .cloned()
            .ok_or_else(|| DyadError::BadFetch(format!("rank {owner_rank} never registered")))?;
        let path = dir.join(&user_path);
        std::fs::read(&path).map_err(|e| DyadError::BadFetch(format!("{path:?}: {e}")))
    }
}

impl Default for TcpCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
