//! Weight and feature file I/O
//!
//! Files are memory-mapped rather than read into an intermediate buffer;
//! decoding is explicit little-endian with length checks mapped to
//! `FormatError`, so a truncated or odd-sized file fails with the byte
//! counts involved instead of producing garbage floats.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{AparentarError, Result};
use crate::params::{BOTTLENECK_HEIGHT, BOTTLENECK_WIDTH, FEATURE_DIM};
use crate::tensor::Tensor;

/// Memory-map a file read-only
///
/// # Errors
///
/// Returns `IoError` if the file cannot be opened or mapped.
pub(crate) fn mmap_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).map_err(|e| AparentarError::IoError {
        message: format!("Failed to open {}: {e}", path.display()),
    })?;
    // SAFETY: The mapping is read-only and dropped before this call's
    // caller returns the decoded data; we never write through it.
    unsafe {
        Mmap::map(&file).map_err(|e| AparentarError::IoError {
            message: format!("Failed to mmap {}: {e}", path.display()),
        })
    }
}

/// Decode a byte slice as packed little-endian f32
///
/// # Errors
///
/// Returns `FormatError` if the length is not a multiple of 4.
pub fn decode_f32_le(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AparentarError::FormatError {
            reason: format!(
                "File size {} is not a whole number of f32 values (multiple of 4 bytes)",
                bytes.len()
            ),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Read a raw flat weight file: packed little-endian f32, no header
///
/// # Errors
///
/// Returns `IoError` on open/map failure, `FormatError` if the size is not
/// a multiple of 4 bytes.
pub fn read_flat_weights<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let mmap = mmap_file(path.as_ref())?;
    decode_f32_le(&mmap)
}

/// Read a bottleneck feature file into an `[N, 7, 7, 512]` batch
///
/// The file is packed little-endian f32 in NHWC order; the batch size is
/// inferred from the file length.
///
/// # Errors
///
/// Returns `FormatError` if the scalar count is zero or not a whole number
/// of `7 * 7 * 512` samples.
pub fn read_feature_file<P: AsRef<Path>>(path: P) -> Result<Tensor> {
    let values = read_flat_weights(path)?;
    let sample_size = BOTTLENECK_HEIGHT * BOTTLENECK_WIDTH * FEATURE_DIM;
    if values.is_empty() || values.len() % sample_size != 0 {
        return Err(AparentarError::FormatError {
            reason: format!(
                "Feature file holds {} floats, expected a positive multiple of {sample_size} \
                 ([N, {BOTTLENECK_HEIGHT}, {BOTTLENECK_WIDTH}, {FEATURE_DIM}] batches)",
                values.len()
            ),
        });
    }
    let batch = values.len() / sample_size;
    Tensor::from_vec(
        vec![batch, BOTTLENECK_HEIGHT, BOTTLENECK_WIDTH, FEATURE_DIM],
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_decode_f32_le_roundtrip() {
        let mut bytes = Vec::new();
        for v in [1.0f32, -2.5, 0.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(decode_f32_le(&bytes).unwrap(), vec![1.0, -2.5, 0.0]);
    }

    #[test]
    fn test_decode_f32_le_rejects_ragged_length() {
        let err = decode_f32_le(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, AparentarError::FormatError { .. }));
    }

    #[test]
    fn test_read_flat_weights_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("test");
        for v in [0.5f32, 1.5] {
            file.write_all(&v.to_le_bytes()).expect("test");
        }
        file.flush().expect("test");
        let values = read_flat_weights(file.path()).unwrap();
        assert_eq!(values, vec![0.5, 1.5]);
    }

    #[test]
    fn test_read_flat_weights_missing_file() {
        let err = read_flat_weights("/nonexistent/weights.bin").unwrap_err();
        assert!(matches!(err, AparentarError::IoError { .. }));
    }

    #[test]
    fn test_read_feature_file_infers_batch() {
        let sample_size = 7 * 7 * 512;
        let mut file = tempfile::NamedTempFile::new().expect("test");
        for _ in 0..2 * sample_size {
            file.write_all(&1.0f32.to_le_bytes()).expect("test");
        }
        file.flush().expect("test");
        let features = read_feature_file(file.path()).unwrap();
        assert_eq!(features.shape(), &[2, 7, 7, 512]);
    }

    #[test]
    fn test_read_feature_file_rejects_partial_sample() {
        let mut file = tempfile::NamedTempFile::new().expect("test");
        for _ in 0..100 {
            file.write_all(&0.0f32.to_le_bytes()).expect("test");
        }
        file.flush().expect("test");
        let err = read_feature_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("25088"));
    }

    #[test]
    fn test_read_feature_file_rejects_empty() {
        let file = tempfile::NamedTempFile::new().expect("test");
        assert!(read_feature_file(file.path()).is_err());
    }
}
