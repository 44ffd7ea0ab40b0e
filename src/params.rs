//! Classifier parameter structures and the wire-format contract
//!
//! The flat weight buffer encodes the classifier head as a fixed-size block
//! at the tail of the file:
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────┐
//! │ backbone prefix          │ classifier suffix (1539 f32)             │
//! │ (total − 1539 f32)       │ age.w [512,1] │ age.b [1]                │
//! │                          │ gender.w [512,2] │ gender.b [2]          │
//! └──────────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! The ordering and sizes are a wire-format contract: offsets are computed
//! arithmetically from these constants, never inferred from names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AparentarError, Result};
use crate::tensor::Tensor;

/// Width of the backbone's bottleneck output (input features to both heads)
pub const FEATURE_DIM: usize = 512;

/// Output width of the age head (one scalar per sample)
pub const AGE_OUT: usize = 1;

/// Output width of the gender head (two logits per sample)
pub const GENDER_OUT: usize = 2;

/// Total scalar count of the classifier block:
/// `512*1 + 1 + 512*2 + 2 = 1539`
pub const CLASSIFIER_PARAM_COUNT: usize =
    FEATURE_DIM * AGE_OUT + AGE_OUT + FEATURE_DIM * GENDER_OUT + GENDER_OUT;

/// Spatial height of the bottleneck feature map
pub const BOTTLENECK_HEIGHT: usize = 7;

/// Spatial width of the bottleneck feature map
pub const BOTTLENECK_WIDTH: usize = 7;

/// Pooling window edge (square window over the bottleneck spatial dims)
pub const POOL_WINDOW: usize = 7;

/// Pooling stride (both spatial dims)
pub const POOL_STRIDE: usize = 2;

/// Parameters of one linear layer: `weights [D_in, D_out]`, `bias [D_out]`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearParams {
    weights: Tensor,
    bias: Tensor,
}

impl LinearParams {
    /// Build a linear parameter set, validating the weight/bias contract
    ///
    /// # Errors
    ///
    /// Returns `MalformedWeights` if `weights` is not 2-D, `bias` is not
    /// 1-D, or `bias.len() != weights.cols`.
    pub fn new(weights: Tensor, bias: Tensor) -> Result<Self> {
        if weights.ndim() != 2 {
            return Err(AparentarError::MalformedWeights {
                reason: format!(
                    "Linear weights must be 2-D, got shape {:?}",
                    weights.shape()
                ),
            });
        }
        if bias.ndim() != 1 {
            return Err(AparentarError::MalformedWeights {
                reason: format!("Linear bias must be 1-D, got shape {:?}", bias.shape()),
            });
        }
        let out_features = weights.shape()[1];
        if bias.size() != out_features {
            return Err(AparentarError::MalformedWeights {
                reason: format!(
                    "Bias length {} does not match weight columns {}",
                    bias.size(),
                    out_features
                ),
            });
        }
        Ok(Self { weights, bias })
    }

    /// Input feature count (`weights.rows`)
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.weights.shape()[0]
    }

    /// Output feature count (`weights.cols == bias.len`)
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.weights.shape()[1]
    }

    /// Weight tensor, shape `[D_in, D_out]`
    #[must_use]
    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    /// Bias tensor, shape `[D_out]`
    #[must_use]
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Total scalar count held by this layer
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.weights.size() + self.bias.size()
    }
}

/// The two linear-layer parameter sets of the classifier head
///
/// Immutable once constructed; shapes are pinned to the wire contract:
/// age `[512,1]+[1]`, gender `[512,2]+[2]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierParams {
    /// Age regression head, `D_out = 1`
    pub age: LinearParams,
    /// Gender classification head, `D_out = 2`
    pub gender: LinearParams,
}

impl ClassifierParams {
    /// Compose the classifier head, validating both layers against the
    /// fixed `[512,1]/[1]/[512,2]/[2]` contract
    ///
    /// # Errors
    ///
    /// Returns `MalformedWeights` naming the offending dimension.
    pub fn new(age: LinearParams, gender: LinearParams) -> Result<Self> {
        if age.in_features() != FEATURE_DIM || age.out_features() != AGE_OUT {
            return Err(AparentarError::MalformedWeights {
                reason: format!(
                    "Age head must be [{FEATURE_DIM}, {AGE_OUT}], got [{}, {}]",
                    age.in_features(),
                    age.out_features()
                ),
            });
        }
        if gender.in_features() != FEATURE_DIM || gender.out_features() != GENDER_OUT {
            return Err(AparentarError::MalformedWeights {
                reason: format!(
                    "Gender head must be [{FEATURE_DIM}, {GENDER_OUT}], got [{}, {}]",
                    gender.in_features(),
                    gender.out_features()
                ),
            });
        }
        Ok(Self { age, gender })
    }

    /// Total scalar count across both layers (always 1539 for valid params)
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.age.scalar_count() + self.gender.scalar_count()
    }
}

/// One ledger entry describing an extracted parameter tensor
///
/// The ledger is introspection/debugging metadata only; nothing in the
/// forward pipeline consults it. Flat-buffer extraction records the absolute
/// scalar offset where the tensor started; named-map extraction records
/// `None` since shapes come from the tensors themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamMapping {
    /// Slash-separated parameter path, e.g. `fc/age/weights`
    pub path: String,
    /// Shape of the extracted tensor
    pub shape: Vec<usize>,
    /// Scalar offset into the flat buffer, if extracted positionally
    pub offset: Option<usize>,
}

impl ParamMapping {
    /// Ledger entry for a positionally extracted tensor
    #[must_use]
    pub fn at_offset(path: &str, shape: Vec<usize>, offset: usize) -> Self {
        Self {
            path: path.to_string(),
            shape,
            offset: Some(offset),
        }
    }

    /// Ledger entry for a tensor resolved by name
    #[must_use]
    pub fn named(path: &str, shape: Vec<usize>) -> Self {
        Self {
            path: path.to_string(),
            shape,
            offset: None,
        }
    }

    /// Number of scalars this entry covers
    #[must_use]
    pub fn scalar_count(&self) -> usize {
        self.shape.iter().product()
    }
}

impl fmt::Display for ParamMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(off) => write!(f, "{} {:?} @ {}", self.path, self.shape, off),
            None => write!(f, "{} {:?}", self.path, self.shape),
        }
    }
}
