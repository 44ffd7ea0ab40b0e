//! Classifier head: parameter store and head-only forward pass
//!
//! The head owns the two [`LinearParams`] sets and its four ledger entries,
//! immutably once constructed. Its forward pass is the deterministic part of
//! the pipeline that never touches the backbone: pool the bottleneck batch,
//! flatten, project through both heads.

use crate::error::{AparentarError, Result};
use crate::extract::{extract_classifier_flat, extract_classifier_named};
use crate::layers::{avg_pool2d, linear_forward};
use crate::params::{
    ClassifierParams, ParamMapping, BOTTLENECK_HEIGHT, BOTTLENECK_WIDTH, FEATURE_DIM,
    GENDER_OUT, POOL_STRIDE, POOL_WINDOW,
};
use crate::tensor::Tensor;
use crate::weight_map::WeightMap;

/// Raw outputs of one head forward pass: logits, not probabilities
#[derive(Debug, Clone, PartialEq)]
pub struct HeadOutput {
    /// Age output, shape `[N]` (squeezed from `[N, 1]`)
    pub age: Tensor,
    /// Gender logits, shape `[N, 2]`
    pub gender: Tensor,
}

/// Immutable parameter store for the classifier head
#[derive(Debug, Clone)]
pub struct ClassifierHead {
    params: ClassifierParams,
    mappings: Vec<ParamMapping>,
}

impl ClassifierHead {
    /// Decode the head from the 1539-scalar classifier suffix of a flat
    /// buffer starting at absolute offset `base_offset`
    ///
    /// # Errors
    ///
    /// Returns `MalformedWeights` if the suffix size is wrong.
    pub fn from_flat(suffix: &[f32], base_offset: usize) -> Result<Self> {
        let (params, mappings) = extract_classifier_flat(suffix, base_offset)?;
        Ok(Self { params, mappings })
    }

    /// Resolve the head from the classifier namespace of a named bundle
    ///
    /// # Errors
    ///
    /// Returns `MissingParameter` for an absent key, `MalformedWeights` for
    /// a shape mismatch.
    pub fn from_named(map: &WeightMap) -> Result<Self> {
        let (params, mappings) = extract_classifier_named(map)?;
        Ok(Self { params, mappings })
    }

    /// The held parameter sets
    #[must_use]
    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    /// The four ledger entries recorded at extraction
    #[must_use]
    pub fn mappings(&self) -> &[ParamMapping] {
        &self.mappings
    }

    /// Run the head over a `[N, 7, 7, 512]` bottleneck batch
    ///
    /// Pools with the fixed 7×7 window and stride 2 (which on a 7×7 input
    /// degenerates to the spatial mean), flattens to `[N, 512]`, and applies
    /// both linear layers. No activation: the gender output is logits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidShape` if the batch is not `[N, 7, 7, 512]`.
    pub fn forward(&self, features: &Tensor) -> Result<HeadOutput> {
        validate_feature_shape(features)?;
        let batch = features.shape()[0];

        let pooled = avg_pool2d(features, (POOL_WINDOW, POOL_WINDOW), (POOL_STRIDE, POOL_STRIDE))?;
        let flat = pooled.reshape(vec![batch, FEATURE_DIM])?;

        let age = linear_forward(&flat, &self.params.age)?.reshape(vec![batch])?;
        let gender = linear_forward(&flat, &self.params.gender)?;
        debug_assert_eq!(gender.shape(), &[batch, GENDER_OUT]);

        Ok(HeadOutput { age, gender })
    }
}

/// Check a feature batch against the bottleneck contract
fn validate_feature_shape(features: &Tensor) -> Result<()> {
    let shape = features.shape();
    let expected = [BOTTLENECK_HEIGHT, BOTTLENECK_WIDTH, FEATURE_DIM];
    if shape.len() != 4 || shape[1..] != expected {
        return Err(AparentarError::InvalidShape {
            reason: format!(
                "Feature batch must be [N, {BOTTLENECK_HEIGHT}, {BOTTLENECK_WIDTH}, \
                 {FEATURE_DIM}], got {shape:?}"
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::CLASSIFIER_PARAM_COUNT;

    /// Head whose weights make outputs easy to predict: every age weight is
    /// `a`, every gender weight is `g0`/`g1` by column, all biases zero
    fn uniform_head(a: f32, g0: f32, g1: f32) -> ClassifierHead {
        let mut block = Vec::with_capacity(CLASSIFIER_PARAM_COUNT);
        block.extend(vec![a; 512]); // age weights
        block.push(0.0); // age bias
        for _ in 0..512 {
            block.push(g0);
            block.push(g1);
        }
        block.extend([0.0, 0.0]); // gender bias
        ClassifierHead::from_flat(&block, 0).expect("test")
    }

    fn constant_features(batch: usize, value: f32) -> Tensor {
        Tensor::from_vec(vec![batch, 7, 7, 512], vec![value; batch * 7 * 7 * 512]).expect("test")
    }

    #[test]
    fn test_forward_shapes() {
        let head = uniform_head(0.01, 0.1, -0.1);
        let output = head.forward(&constant_features(3, 1.0)).unwrap();
        assert_eq!(output.age.shape(), &[3]);
        assert_eq!(output.gender.shape(), &[3, 2]);
    }

    #[test]
    fn test_forward_known_values() {
        // Constant features pool to 512 ones; age = sum of weights = 512 * a
        let head = uniform_head(0.01, 0.002, -0.002);
        let output = head.forward(&constant_features(1, 1.0)).unwrap();
        assert!((output.age.data()[0] - 5.12).abs() < 1e-3);
        assert!((output.gender.data()[0] - 1.024).abs() < 1e-3);
        assert!((output.gender.data()[1] + 1.024).abs() < 1e-3);
    }

    #[test]
    fn test_forward_pools_spatial_mean() {
        // 25 even cells at 1.0, 24 odd cells at 3.0 -> spatial mean 97/49
        let mut data = Vec::with_capacity(7 * 7 * 512);
        for cell in 0..49 {
            let v = if cell % 2 == 0 { 1.0 } else { 3.0 };
            data.extend(vec![v; 512]);
        }
        let features = Tensor::from_vec(vec![1, 7, 7, 512], data).unwrap();
        let head = uniform_head(1.0, 0.0, 0.0);
        let output = head.forward(&features).unwrap();
        let expected_mean = 97.0 / 49.0;
        assert!((output.age.data()[0] - 512.0 * expected_mean).abs() < 1e-1);
    }

    #[test]
    fn test_forward_rejects_wrong_spatial_dims() {
        let head = uniform_head(0.0, 0.0, 0.0);
        let features = Tensor::from_vec(vec![1, 5, 5, 512], vec![0.0; 5 * 5 * 512]).unwrap();
        let err = head.forward(&features).unwrap_err();
        assert!(matches!(err, AparentarError::InvalidShape { .. }));
    }

    #[test]
    fn test_forward_rejects_wrong_channel_count() {
        let head = uniform_head(0.0, 0.0, 0.0);
        let features = Tensor::from_vec(vec![1, 7, 7, 256], vec![0.0; 7 * 7 * 256]).unwrap();
        assert!(head.forward(&features).is_err());
    }

    #[test]
    fn test_forward_is_deterministic() {
        let head = uniform_head(0.03, 0.7, -0.7);
        let features = constant_features(2, 0.5);
        let a = head.forward(&features).unwrap();
        let b = head.forward(&features).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mappings_preserved() {
        let head = uniform_head(0.0, 0.0, 0.0);
        assert_eq!(head.mappings().len(), 4);
        assert_eq!(head.params().scalar_count(), CLASSIFIER_PARAM_COUNT);
    }
}
