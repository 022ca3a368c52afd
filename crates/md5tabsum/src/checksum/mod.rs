//! Order-independent table checksum.
//!
//! Each row is reduced to an MD5 hex digest over its canonicalized columns. The
//! digest is split into four 8-hex-digit chunks; each chunk position is summed
//! across all rows, and the four decimal sums are concatenated and hashed once
//! more. Addition commutes, so row order never changes the result.
//!
//! The dialects compute exactly this inside the engine. [`row_hash`] and
//! [`TableDigest`] are the in-process reference model of that SQL, exercised by the
//! tests; only [`normalize_checksum`] runs on engine results.

mod canonical;

use md5::{Digest, Md5};

use crate::error::{Result, TabsumError};

pub use canonical::{canonical_decimal, NULL_SENTINEL};

/// `MD5("")` in lowercase hex.
pub const MD5_OF_EMPTY: &str = "d41d8cd98f00b204e9800998ecf8427e";

/// Checksum of a table with zero rows.
pub const EMPTY_TABLE_CHECKSUM: &str = MD5_OF_EMPTY;

/// Number of 32-bit chunks in one row hash.
pub const CHUNKS: usize = 4;

/// Hex width of one chunk.
pub const CHUNK_HEX_LEN: usize = 8;

/// 1-based start offsets of the chunks within a row hash, for SQL `substr`.
pub fn chunk_offsets() -> impl Iterator<Item = usize> {
    (0..CHUNKS).map(|i| i * CHUNK_HEX_LEN + 1)
}

/// Lowercase hex MD5 of a string.
pub fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Row hash over already-canonicalized column values, concatenated in column order.
pub fn row_hash<S: AsRef<str>>(canonical_fields: &[S]) -> String {
    hex::encode(row_digest(canonical_fields))
}

fn row_digest<S: AsRef<str>>(canonical_fields: &[S]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for field in canonical_fields {
        hasher.update(field.as_ref().as_bytes());
    }
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hasher.finalize());
    bytes
}

/// Split a 32-character hex row hash into its four chunk values.
fn parse_chunks(hash: &str) -> Result<[u32; CHUNKS]> {
    if hash.len() != CHUNKS * CHUNK_HEX_LEN || !hash.is_ascii() {
        return Err(TabsumError::Config(format!(
            "Row hash must be {} hex characters, got {:?}",
            CHUNKS * CHUNK_HEX_LEN,
            hash
        )));
    }
    let mut chunks = [0u32; CHUNKS];
    for (i, value) in chunks.iter_mut().enumerate() {
        let chunk = &hash[i * CHUNK_HEX_LEN..(i + 1) * CHUNK_HEX_LEN];
        *value = u32::from_str_radix(chunk, 16).map_err(|_| {
            TabsumError::Config(format!("Row hash chunk {:?} is not hexadecimal", chunk))
        })?;
    }
    Ok(chunks)
}

/// Accumulates row hashes into a table checksum.
///
/// Sums use `u128` so no realistic row count can overflow a chunk position.
#[derive(Debug, Clone, Default)]
pub struct TableDigest {
    sums: [u128; CHUNKS],
    rows: u64,
}

impl TableDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one 32-character row hash into the running sums.
    pub fn add_row_hash(&mut self, hash: &str) -> Result<()> {
        let chunks = parse_chunks(hash)?;
        self.fold(chunks);
        Ok(())
    }

    /// Hash a row of canonical values and fold it in.
    pub fn add_row<S: AsRef<str>>(&mut self, canonical_fields: &[S]) {
        let digest = row_digest(canonical_fields);
        let mut chunks = [0u32; CHUNKS];
        for (i, value) in chunks.iter_mut().enumerate() {
            let mut word = [0u8; 4];
            word.copy_from_slice(&digest[i * 4..(i + 1) * 4]);
            *value = u32::from_be_bytes(word);
        }
        self.fold(chunks);
    }

    fn fold(&mut self, chunks: [u32; CHUNKS]) {
        for (sum, value) in self.sums.iter_mut().zip(chunks) {
            *sum += u128::from(value);
        }
        self.rows += 1;
    }

    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// The four per-chunk sums.
    pub fn sums(&self) -> [u128; CHUNKS] {
        self.sums
    }

    /// Final table checksum.
    pub fn finish(&self) -> String {
        if self.rows == 0 {
            return EMPTY_TABLE_CHECKSUM.to_string();
        }
        let joined: String = self.sums.iter().map(u128::to_string).collect();
        md5_hex(&joined)
    }
}

/// Compute a table checksum from row hashes in any order.
pub fn aggregate_row_hashes<I, S>(hashes: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut digest = TableDigest::new();
    for hash in hashes {
        digest.add_row_hash(hash.as_ref())?;
    }
    Ok(digest.finish())
}

/// Normalize a checksum returned by an engine: trimmed, lowercase, 32 hex digits.
pub fn normalize_checksum(raw: &str) -> Option<String> {
    let hex = raw.trim().to_ascii_lowercase();
    if hex.len() == CHUNKS * CHUNK_HEX_LEN && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(hex)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_rows() -> Vec<Vec<String>> {
        // (id INT, name VARCHAR) with name hashed the way every dialect hashes strings.
        vec![
            vec!["1".to_string(), md5_hex("a")],
            vec!["2".to_string(), md5_hex("b")],
        ]
    }

    fn checksum_of(rows: &[Vec<String>]) -> String {
        let mut digest = TableDigest::new();
        for row in rows {
            digest.add_row(row);
        }
        digest.finish()
    }

    #[test]
    fn test_md5_hex_known_values() {
        assert_eq!(md5_hex(""), EMPTY_TABLE_CHECKSUM);
        assert_eq!(md5_hex("a"), "0cc175b9c0f1b6a831c399e269772661");
    }

    #[test]
    fn test_row_hash_is_lowercase_hex_of_concatenation() {
        let hash = row_hash(&["ab", "c"]);
        assert_eq!(hash, "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(hash, md5_hex("abc"));
        assert_eq!(row_hash(&[""; 0]), EMPTY_TABLE_CHECKSUM);
    }

    #[test]
    fn test_empty_table_yields_constant() {
        assert_eq!(TableDigest::new().finish(), EMPTY_TABLE_CHECKSUM);
        let none: Vec<&str> = Vec::new();
        assert_eq!(aggregate_row_hashes(none).unwrap(), EMPTY_TABLE_CHECKSUM);
    }

    #[test]
    fn test_row_order_does_not_change_checksum() {
        let rows = table_rows();
        let mut reversed = rows.clone();
        reversed.reverse();
        assert_eq!(checksum_of(&rows), checksum_of(&reversed));
    }

    #[test]
    fn test_permutations_of_many_rows_agree() {
        let hashes: Vec<String> = (0..50).map(|i| md5_hex(&format!("row-{}", i))).collect();
        let forward = aggregate_row_hashes(&hashes).unwrap();
        let mut shuffled = hashes.clone();
        shuffled.rotate_left(17);
        shuffled.swap(3, 41);
        assert_eq!(forward, aggregate_row_hashes(&shuffled).unwrap());
    }

    #[test]
    fn test_checksum_is_deterministic() {
        let rows = table_rows();
        assert_eq!(checksum_of(&rows), checksum_of(&rows));
    }

    #[test]
    fn test_single_cell_change_changes_checksum() {
        let rows = table_rows();
        let mut changed = rows.clone();
        changed[1][1] = md5_hex("c");
        assert_ne!(checksum_of(&rows), checksum_of(&changed));

        let mut null_cell = rows.clone();
        null_cell[0][1] = NULL_SENTINEL.to_string();
        assert_ne!(checksum_of(&rows), checksum_of(&null_cell));
    }

    #[test]
    fn test_add_row_matches_add_row_hash() {
        let row = vec!["42".to_string(), md5_hex("x")];
        let mut by_row = TableDigest::new();
        by_row.add_row(&row);
        let mut by_hash = TableDigest::new();
        by_hash.add_row_hash(&row_hash(&row)).unwrap();
        assert_eq!(by_row.sums(), by_hash.sums());
        assert_eq!(by_row.finish(), by_hash.finish());
    }

    #[test]
    fn test_chunk_sums_are_decimal_concatenation() {
        let hash = "00000001000000020000000300000004";
        let mut digest = TableDigest::new();
        digest.add_row_hash(hash).unwrap();
        digest.add_row_hash(hash).unwrap();
        assert_eq!(digest.sums(), [2, 4, 6, 8]);
        assert_eq!(digest.finish(), md5_hex("2468"));
        assert_eq!(digest.row_count(), 2);
    }

    #[test]
    fn test_chunk_sums_exceed_32_bits() {
        let mut digest = TableDigest::new();
        for _ in 0..3 {
            digest.add_row_hash("ffffffffffffffffffffffffffffffff").unwrap();
        }
        let expected = 3 * u128::from(u32::MAX);
        assert_eq!(digest.sums(), [expected; CHUNKS]);
    }

    #[test]
    fn test_add_row_hash_rejects_malformed_input() {
        let mut digest = TableDigest::new();
        assert!(digest.add_row_hash("abc").is_err());
        assert!(digest
            .add_row_hash("zzzzzzzz000000000000000000000000")
            .is_err());
        assert_eq!(digest.row_count(), 0);
    }

    #[test]
    fn test_chunk_offsets_are_one_based() {
        assert_eq!(chunk_offsets().collect::<Vec<_>>(), vec![1, 9, 17, 25]);
    }

    #[test]
    fn test_normalize_checksum() {
        assert_eq!(
            normalize_checksum(" D41D8CD98F00B204E9800998ECF8427E\n").as_deref(),
            Some(EMPTY_TABLE_CHECKSUM)
        );
        assert_eq!(normalize_checksum("not-a-checksum"), None);
        assert_eq!(normalize_checksum(""), None);
    }
}
