//! Embedding blob encoding
//!
//! Embeddings are persisted as fixed-width little-endian f32 arrays of
//! length `dim`, independent of host endianness.

/// Encode a vector as little-endian f32 bytes
pub fn vec_f32_to_bytes(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|&f| f.to_le_bytes()).collect()
}

/// Decode a little-endian f32 blob holding exactly `dim` values.
///
/// Returns None when the blob length is not `dim * 4`; callers treat that
/// as corruption rather than truncating or padding.
pub fn bytes_to_vec_f32(bytes: &[u8], dim: usize) -> Option<Vec<f32>> {
    if dim.checked_mul(4) != Some(bytes.len()) {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
