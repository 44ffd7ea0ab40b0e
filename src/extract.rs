//! Parameter extraction: flat-buffer slicing and named-map lookup
//!
//! Two front doors producing the same `(ClassifierParams, Vec<ParamMapping>)`
//! pair, so the forward pipeline never sees raw offsets or key names:
//!
//! - **Flat path**: the classifier block is the last 1539 scalars of a flat
//!   f32 buffer, decoded positionally as `age.w [512,1]`, `age.b [1]`,
//!   `gender.w [512,2]`, `gender.b [2]`. Offsets are computed arithmetically
//!   from the wire-contract constants, never inferred from names.
//! - **Named path**: classifier tensors are resolved from a [`WeightMap`] by
//!   four fixed `fc/...` keys; shapes are read from the tensors themselves
//!   and checked against the contract.

use crate::error::{AparentarError, Result};
use crate::params::{
    ClassifierParams, LinearParams, ParamMapping, AGE_OUT, CLASSIFIER_PARAM_COUNT, FEATURE_DIM,
    GENDER_OUT,
};
use crate::tensor::Tensor;
use crate::weight_map::WeightMap;

/// Named-map key for the age head weights
pub const KEY_AGE_WEIGHTS: &str = "fc/age/weights";
/// Named-map key for the age head bias
pub const KEY_AGE_BIAS: &str = "fc/age/bias";
/// Named-map key for the gender head weights
pub const KEY_GENDER_WEIGHTS: &str = "fc/gender/weights";
/// Named-map key for the gender head bias
pub const KEY_GENDER_BIAS: &str = "fc/gender/bias";

/// Key prefix that marks a tensor as classifier-side in a named bundle
pub const CLASSIFIER_KEY_PREFIX: &str = "fc";

/// Sequential reader over a flat f32 slice, tracking the absolute offset
///
/// The offset it reports is absolute into the *original* buffer (the cursor
/// is constructed with the base offset where its slice started), so ledger
/// entries can point back into the file the weights came from.
pub(crate) struct FloatCursor<'a> {
    data: &'a [f32],
    pos: usize,
    base: usize,
}

impl<'a> FloatCursor<'a> {
    /// Create a cursor over `data`, which starts at absolute offset `base`
    pub(crate) fn new(data: &'a [f32], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Absolute offset of the next scalar to be read
    pub(crate) fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Read the next `count` scalars, advancing the cursor
    pub(crate) fn take(&mut self, count: usize) -> Result<&'a [f32]> {
        let remaining = self.data.len() - self.pos;
        if count > remaining {
            return Err(AparentarError::MalformedWeights {
                reason: format!(
                    "Buffer exhausted at offset {}: need {count} more floats, {remaining} left",
                    self.offset()
                ),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Number of unread scalars
    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

/// Split a flat weight buffer into backbone prefix and classifier suffix
///
/// The classifier block is always the last [`CLASSIFIER_PARAM_COUNT`]
/// scalars; everything before it belongs to the backbone.
///
/// # Errors
///
/// Returns `MalformedWeights` if the buffer holds fewer than 1539 scalars
/// (a negative prefix length), reporting expected vs. actual.
pub fn split_flat_buffer(weights: &[f32]) -> Result<(&[f32], &[f32])> {
    if weights.len() < CLASSIFIER_PARAM_COUNT {
        return Err(AparentarError::MalformedWeights {
            reason: format!(
                "Flat buffer too small: expected at least {CLASSIFIER_PARAM_COUNT} floats \
                 for the classifier block, got {}",
                weights.len()
            ),
        });
    }
    let split = weights.len() - CLASSIFIER_PARAM_COUNT;
    Ok((&weights[..split], &weights[split..]))
}

/// Decode one linear layer from the cursor, recording both ledger entries
fn decode_linear(
    cursor: &mut FloatCursor<'_>,
    weights_path: &str,
    bias_path: &str,
    out_features: usize,
    ledger: &mut Vec<ParamMapping>,
) -> Result<LinearParams> {
    let weights_offset = cursor.offset();
    let weights_data = cursor.take(FEATURE_DIM * out_features)?;
    let weights = Tensor::from_vec(vec![FEATURE_DIM, out_features], weights_data.to_vec())?;
    ledger.push(ParamMapping::at_offset(
        weights_path,
        vec![FEATURE_DIM, out_features],
        weights_offset,
    ));

    let bias_offset = cursor.offset();
    let bias_data = cursor.take(out_features)?;
    let bias = Tensor::from_vec(vec![out_features], bias_data.to_vec())?;
    ledger.push(ParamMapping::at_offset(
        bias_path,
        vec![out_features],
        bias_offset,
    ));

    LinearParams::new(weights, bias)
}

/// Decode the 1539-scalar classifier suffix positionally
///
/// `base_offset` is where the suffix starts in the original buffer, so the
/// returned ledger carries absolute offsets.
///
/// # Errors
///
/// Returns `MalformedWeights` if the suffix is not exactly 1539 scalars.
pub fn extract_classifier_flat(
    suffix: &[f32],
    base_offset: usize,
) -> Result<(ClassifierParams, Vec<ParamMapping>)> {
    if suffix.len() != CLASSIFIER_PARAM_COUNT {
        return Err(AparentarError::MalformedWeights {
            reason: format!(
                "Classifier block must be exactly {CLASSIFIER_PARAM_COUNT} floats, got {}",
                suffix.len()
            ),
        });
    }

    let mut cursor = FloatCursor::new(suffix, base_offset);
    let mut ledger = Vec::with_capacity(4);

    // Wire-contract order: age.w, age.b, gender.w, gender.b
    let age = decode_linear(&mut cursor, KEY_AGE_WEIGHTS, KEY_AGE_BIAS, AGE_OUT, &mut ledger)?;
    let gender = decode_linear(
        &mut cursor,
        KEY_GENDER_WEIGHTS,
        KEY_GENDER_BIAS,
        GENDER_OUT,
        &mut ledger,
    )?;
    debug_assert_eq!(cursor.remaining(), 0);

    let params = ClassifierParams::new(age, gender)?;
    Ok((params, ledger))
}

/// Partition a named bundle into backbone and classifier sub-maps
///
/// Keys starting with `fc` are classifier-side; everything else is backbone
/// namespace. Entries are regrouped, not re-decoded.
#[must_use]
pub fn partition_weight_map(map: &WeightMap) -> (WeightMap, WeightMap) {
    let mut backbone = WeightMap::new();
    let mut classifier = WeightMap::new();
    for (key, tensor) in map.iter() {
        if key.starts_with(CLASSIFIER_KEY_PREFIX) {
            classifier.insert(key.clone(), tensor.clone());
        } else {
            backbone.insert(key.clone(), tensor.clone());
        }
    }
    (backbone, classifier)
}

/// Look up one tensor by key and check its shape against the contract
fn resolve_named(map: &WeightMap, key: &str, expected_shape: &[usize]) -> Result<Tensor> {
    let tensor = map.get(key).ok_or_else(|| AparentarError::MissingParameter {
        key: key.to_string(),
    })?;
    if tensor.shape() != expected_shape {
        return Err(AparentarError::MalformedWeights {
            reason: format!(
                "Tensor '{key}' has shape {:?}, expected {expected_shape:?}",
                tensor.shape()
            ),
        });
    }
    Ok(tensor.clone())
}

/// Resolve the classifier head from a named sub-map
///
/// Queries the four fixed `fc/...` keys; each miss is a fatal
/// `MissingParameter` naming the key, each hit is shape-checked. Extra
/// `fc`-prefixed keys are warned about and ignored.
///
/// # Errors
///
/// Returns `MissingParameter` for an absent key, `MalformedWeights` for a
/// shape mismatch.
pub fn extract_classifier_named(
    map: &WeightMap,
) -> Result<(ClassifierParams, Vec<ParamMapping>)> {
    const REQUIRED: [&str; 4] = [
        KEY_AGE_WEIGHTS,
        KEY_AGE_BIAS,
        KEY_GENDER_WEIGHTS,
        KEY_GENDER_BIAS,
    ];

    let age_w = resolve_named(map, KEY_AGE_WEIGHTS, &[FEATURE_DIM, AGE_OUT])?;
    let age_b = resolve_named(map, KEY_AGE_BIAS, &[AGE_OUT])?;
    let gender_w = resolve_named(map, KEY_GENDER_WEIGHTS, &[FEATURE_DIM, GENDER_OUT])?;
    let gender_b = resolve_named(map, KEY_GENDER_BIAS, &[GENDER_OUT])?;

    for key in map.keys() {
        if !REQUIRED.contains(&key.as_str()) {
            eprintln!("warning: ignoring unused classifier tensor '{key}'");
        }
    }

    let ledger = vec![
        ParamMapping::named(KEY_AGE_WEIGHTS, age_w.shape().to_vec()),
        ParamMapping::named(KEY_AGE_BIAS, age_b.shape().to_vec()),
        ParamMapping::named(KEY_GENDER_WEIGHTS, gender_w.shape().to_vec()),
        ParamMapping::named(KEY_GENDER_BIAS, gender_b.shape().to_vec()),
    ];

    let age = LinearParams::new(age_w, age_b)?;
    let gender = LinearParams::new(gender_w, gender_b)?;
    let params = ClassifierParams::new(age, gender)?;
    Ok((params, ledger))
}
