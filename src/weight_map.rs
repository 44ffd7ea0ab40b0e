//! Named tensor bundles and the safetensors-style reader
//!
//! A [`WeightMap`] is the named-path counterpart of the flat weight buffer:
//! a name → tensor dictionary following the two-namespace key convention
//! (`fc/...` for the classifier head, everything else backbone-side).
//!
//! Bundles on disk use the standard safetensors layout:
//!
//! ```text
//! BUNDLE := HEADER_LEN METADATA TENSOR_DATA
//!
//! HEADER_LEN := u64 (little-endian) — byte length of METADATA
//!
//! METADATA := JSON {
//!   "tensor_name": {
//!     "dtype": "F32" | "F16",
//!     "shape": [dim1, dim2, ...],
//!     "data_offsets": [start, end]
//!   },
//!   ...
//! }
//! ```
//!
//! Only F32 and F16 payloads are accepted; F16 is widened to f32 at load
//! since the whole pipeline is f32 end to end.

use std::collections::btree_map::{self, BTreeMap};
use std::path::Path;

use half::f16;
use serde::Deserialize;

use crate::error::{AparentarError, Result};
use crate::io::mmap_file;
use crate::tensor::Tensor;

/// Supported element types in a named bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum BundleDtype {
    /// 32-bit float, stored as-is
    F32,
    /// 16-bit float, widened to f32
    F16,
}

impl BundleDtype {
    fn byte_width(self) -> usize {
        match self {
            Self::F32 => 4,
            Self::F16 => 2,
        }
    }
}

/// JSON tensor metadata (internal)
#[derive(Debug, Deserialize)]
struct TensorMetadata {
    dtype: BundleDtype,
    shape: Vec<usize>,
    data_offsets: [usize; 2],
}

/// Ordered name → tensor map
///
/// Backed by a `BTreeMap` so iteration order is deterministic, which keeps
/// backbone ledger entries stable across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightMap {
    tensors: BTreeMap<String, Tensor>,
}

impl WeightMap {
    /// Create an empty map
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor under `name`, replacing any previous entry
    pub fn insert(&mut self, name: String, tensor: Tensor) {
        self.tensors.insert(name, tensor);
    }

    /// Look up a tensor by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Remove a tensor by name, returning it if present
    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    /// Number of tensors held
    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Whether the map holds no tensors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Iterate over (name, tensor) pairs in key order
    pub fn iter(&self) -> btree_map::Iter<'_, String, Tensor> {
        self.tensors.iter()
    }

    /// Iterate over tensor names in key order
    pub fn keys(&self) -> btree_map::Keys<'_, String, Tensor> {
        self.tensors.keys()
    }

    /// Parse a safetensors-style bundle from raw bytes
    ///
    /// # Errors
    ///
    /// Returns `FormatError` if the header is truncated, the JSON index is
    /// malformed, a dtype is unsupported, or a tensor's data offsets fall
    /// outside the data region or disagree with its shape.
    pub fn from_safetensors_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(AparentarError::FormatError {
                reason: format!("Bundle header truncated: need 8 bytes, got {}", bytes.len()),
            });
        }
        let mut len_buf = [0u8; 8];
        len_buf.copy_from_slice(&bytes[..8]);
        let header_len =
            usize::try_from(u64::from_le_bytes(len_buf)).map_err(|_| AparentarError::FormatError {
                reason: "Header length exceeds platform usize limit".to_string(),
            })?;

        let data_start = 8_usize
            .checked_add(header_len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| AparentarError::FormatError {
                reason: format!(
                    "Header length {header_len} exceeds bundle size {}",
                    bytes.len()
                ),
            })?;

        let index: BTreeMap<String, TensorMetadata> = serde_json::from_slice(&bytes[8..data_start])
            .map_err(|e| AparentarError::FormatError {
                reason: format!("Malformed JSON tensor index: {e}"),
            })?;

        let data = &bytes[data_start..];
        let mut map = Self::new();
        for (name, meta) in index {
            let tensor = decode_tensor(&name, &meta, data)?;
            map.insert(name, tensor);
        }
        Ok(map)
    }

    /// Memory-map and parse a safetensors-style bundle file
    ///
    /// # Errors
    ///
    /// Returns `IoError` if the file cannot be opened or mapped, plus the
    /// `from_safetensors_bytes` failure modes.
    pub fn from_safetensors_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mmap = mmap_file(path.as_ref())?;
        Self::from_safetensors_bytes(&mmap)
    }
}

impl<'a> IntoIterator for &'a WeightMap {
    type Item = (&'a String, &'a Tensor);
    type IntoIter = btree_map::Iter<'a, String, Tensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Decode one tensor out of the data region, by dtype
fn decode_tensor(name: &str, meta: &TensorMetadata, data: &[u8]) -> Result<Tensor> {
    let [start, end] = meta.data_offsets;
    if start > end || end > data.len() {
        return Err(AparentarError::FormatError {
            reason: format!(
                "Tensor '{name}' has offsets [{start}, {end}) outside data region of {} bytes",
                data.len()
            ),
        });
    }

    // Hostile headers can claim shapes whose product overflows; map that to
    // FormatError like the other bounds checks instead of panicking
    let expected_bytes = meta
        .shape
        .iter()
        .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
        .and_then(|count| count.checked_mul(meta.dtype.byte_width()))
        .ok_or_else(|| AparentarError::FormatError {
            reason: format!("Tensor '{name}' shape {:?} overflows its byte size", meta.shape),
        })?;
    let actual_bytes = end - start;
    if actual_bytes != expected_bytes {
        return Err(AparentarError::FormatError {
            reason: format!(
                "Tensor '{name}' shape {:?} needs {expected_bytes} bytes, offsets span {actual_bytes}",
                meta.shape
            ),
        });
    }

    let raw = &data[start..end];
    let values: Vec<f32> = match meta.dtype {
        BundleDtype::F32 => raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        BundleDtype::F16 => raw
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
    };

    Tensor::from_vec(meta.shape.clone(), values)
}
