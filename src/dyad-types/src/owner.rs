use crate::error::DyadError;

/// The value stored at a topic key: the rank of the producer that most
/// recently published the corresponding user path (spec §3, "Ownership
/// record"). Encoded on the wire as ASCII decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerRecord(pub u32);

impl OwnerRecord {
    pub fn encode(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DyadError> {
        let s = std::str::from_utf8(bytes)
            .map_err(|e| DyadError::BadUnpack(format!("owner record not utf8: {e}")))?;
        s.trim()
            .parse::<u32>()
            .map(OwnerRecord)
            .map_err(|e| DyadError::BadUnpack(format!("owner record not an integer: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let rec = OwnerRecord(42);
        assert_eq!(OwnerRecord::decode(&rec.encode()).unwrap(), rec);
    }

    #[test]
    fn rejects_non_integer() {
        assert!(OwnerRecord::decode(b"not-a-number").is_err());
    }
}
