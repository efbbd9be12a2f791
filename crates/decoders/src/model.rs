use transit_keying::Table;

use crate::error::DecodeError;

/// One `(sub_table, records)` pair yielded by a decoder, plus the MD5 digest
/// of the bytes it was derived from.
pub struct DecodedGroup {
    pub sub_table: Table,
    pub records: Vec<serde_json::Value>,
    pub digest: [u8; 16],
}

/// Consumes raw bytes for one feed and yields a finite sequence of decoded
/// groups. Implementations never see `Table`-internal storage keys; they
/// only classify which sub-table each group belongs to.
pub trait Decoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<DecodedGroup>, DecodeError>;
}

pub(crate) fn digest(bytes: &[u8]) -> [u8; 16] {
    md5::compute(bytes).0
}

/// MD5 of the concatenation of per-sub-file digests, in emit order, as hex.
pub fn combined_digest_hex(digests: impl IntoIterator<Item = [u8; 16]>) -> String {
    let mut concat = Vec::new();
    for d in digests {
        concat.extend_from_slice(&d);
    }
    format!("{:x}", md5::compute(concat))
}
