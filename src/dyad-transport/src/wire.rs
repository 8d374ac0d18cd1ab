//! Length-prefixed framing for the reference `TcpTransport`/`TcpCoordinator`
//! pair (spec §6's KVS/RPC wire contract, given a concrete byte layout).
//!
//! Modeled on the framing `wormhole::rpc::{read_bytes, read_bytes_sync}`
//! uses for its own client/server protocol: a fixed-size header followed by
//! a length-prefixed payload, read with `read_exact` so short reads are
//! distinguishable from a clean end-of-stream.

use std::io::{self, Read, Write};

use dyad_types::error::DyadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Register this connection's rank and the local directory its
    /// producer-managed files live under (reference-coordinator only; not
    /// part of the spec's wire contract proper).
    Register = 1,
    /// Transactional put: `topic -> rank`.
    Commit = 2,
    /// Wait-create lookup of a topic.
    Lookup = 3,
    /// `dyad.fetch` RPC request.
    Fetch = 4,
    /// A response payload (owner rank, file bytes, or nothing for acks).
    Response = 5,
    /// An error response; payload is a UTF-8 message.
    Error = 6,
}

impl Opcode {
    fn from_byte(b: u8) -> Result<Self, DyadError> {
        match b {
            1 => Ok(Opcode::Register),
            2 => Ok(Opcode::Commit),
            3 => Ok(Opcode::Lookup),
            4 => Ok(Opcode::Fetch),
            5 => Ok(Opcode::Response),
            6 => Ok(Opcode::Error),
            other => Err(DyadError::BadRpc(format!("unknown opcode {other}"))),
        }
    }
}

/// Writes one frame: `[opcode: u8][len: u32 BE][payload]`.
pub fn write_frame(w: &mut impl Write, opcode: Opcode, payload: &[u8]) -> io::Result<()> {
    w.write_all(&[opcode as u8])?;
    w.write_all(&(payload.len() as u32).to_be_bytes())?;
    w.write_all(payload)?;
    w.flush()
}

/// Reads one frame. A clean EOF before the opcode byte is reported via
/// `Ok(None)`; any other truncation is a `DyadError`.
pub fn read_frame(r: &mut impl Read) -> Result<Option<(Opcode, Vec<u8>)>, DyadError> {
    let mut opcode_byte = [0u8; 1];
    match r.read(&mut opcode_byte) {
        Ok(0) => return Ok(None),
        Ok(_) => {}
        Err(e) => return Err(DyadError::BadRpc(format!("read opcode: {e}"))),
    }
    let opcode = Opcode::from_byte(opcode_byte[0])?;

    let mut len_bytes = [0u8; 4];
    r.read_exact(&mut len_bytes).map_err(io_to_dyad_error)?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .map_err(|e| DyadError::BadRpc(format!("short frame body: {e}")))?;

    Ok(Some((opcode, payload)))
}

fn io_to_dyad_error(e: io::Error) -> DyadError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DyadError::RpcFinished
    } else {
        DyadError::BadRpc(format!("{e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, Opcode::Commit, b"hello").unwrap();
        let mut cursor = Cursor::new(buf);
        let (op, payload) = read_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(op, Opcode::Commit);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn clean_eof_is_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn truncated_length_is_rpc_finished() {
        let mut cursor = Cursor::new(vec![Opcode::Fetch as u8]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.code(), "RPC_FINISHED");
    }
}
