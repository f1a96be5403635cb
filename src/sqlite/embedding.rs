//! Embedding BLOB conversion.
//!
//! Vectors are stored as little-endian `f32` bytes. No dimensionality is enforced.

use crate::errors::Error;

/// Convert a vector of f32 embedding values to a BLOB (little-endian bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|&x| x.to_le_bytes()).collect()
}

/// Convert a BLOB (little-endian bytes) to a vector of f32 embedding values.
///
/// # Errors
///
/// Returns `Error::InvalidEmbedding` if the blob length is not a multiple of 4.
pub fn blob_to_vec(blob: &[u8]) -> Result<Vec<f32>, Error> {
    if blob.len() % 4 != 0 {
        return Err(Error::InvalidEmbedding(format!(
            "BLOB of {} bytes is not a sequence of f32 values",
            blob.len()
        )));
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
