//! Backbone collaborator boundary
//!
//! The feature-extraction network is an external collaborator: it turns raw
//! input into `[N, 7, 7, 512]` bottleneck feature maps and extracts its own
//! parameters from whichever source the model was loaded from. This module
//! defines the trait that boundary is expressed as, plus [`StubBackbone`], a
//! deterministic stand-in used by tests and by the CLI when a weight file
//! carries no real backbone.

use crate::error::{AparentarError, Result};
use crate::params::{ParamMapping, BOTTLENECK_HEIGHT, BOTTLENECK_WIDTH, FEATURE_DIM};
use crate::tensor::Tensor;
use crate::weight_map::WeightMap;

/// Contract of the feature-extraction backbone
///
/// Implementations own their parameters and their ledger entries; the model
/// composes their ledger with the classifier's for reporting. Failures
/// surface as [`AparentarError::Backbone`] and are propagated unchanged.
pub trait Backbone {
    /// Turn a raw input batch into a `[N, 7, 7, 512]` bottleneck batch
    ///
    /// # Errors
    ///
    /// Returns `Backbone` if the input cannot be processed.
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Consume the backbone's share of a flat weight buffer
    ///
    /// # Errors
    ///
    /// Returns `Backbone` if the prefix cannot be decoded.
    fn load_flat(&mut self, weights: &[f32]) -> Result<Vec<ParamMapping>>;

    /// Consume the backbone's namespace of a named bundle
    ///
    /// # Errors
    ///
    /// Returns `Backbone` or `MissingParameter` if a required tensor is
    /// absent or malformed.
    fn load_named(&mut self, map: &WeightMap) -> Result<Vec<ParamMapping>>;

    /// Release held resources; `strict` makes double-disposal an error
    ///
    /// # Errors
    ///
    /// Returns `AlreadyDisposed` under `strict` when already disposed.
    fn dispose(&mut self, strict: bool) -> Result<()>;

    /// Number of flat-buffer scalars this backbone consumes
    ///
    /// Introspection only: the model splits the buffer by the classifier's
    /// fixed suffix size, never by this value.
    fn param_count(&self) -> usize;
}

/// Deterministic reference backbone
///
/// Stores its flat prefix uninterpreted and ledgers it as one entry. Raw
/// input is reduced to a per-sample mean which is broadcast across every
/// spatial cell and channel of the bottleneck shape, so the output is a
/// pure function of the input and tests can predict it exactly.
#[derive(Debug, Default)]
pub struct StubBackbone {
    params: Vec<f32>,
    disposed: bool,
}

impl StubBackbone {
    /// Create an empty, undisposed stub
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backbone for StubBackbone {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let shape = input.shape();
        if shape.is_empty() || input.size() == 0 {
            return Err(AparentarError::Backbone {
                reason: format!("Stub backbone cannot process input of shape {shape:?}"),
            });
        }
        let batch = shape[0];
        let sample_size = input.size() / batch;
        let cell_count = BOTTLENECK_HEIGHT * BOTTLENECK_WIDTH * FEATURE_DIM;

        let mut output = Vec::with_capacity(batch * cell_count);
        for n in 0..batch {
            let sample = input.sample(n)?;
            let mean = sample.iter().sum::<f32>() / sample_size as f32;
            output.extend(vec![mean; cell_count]);
        }
        Tensor::from_vec(
            vec![batch, BOTTLENECK_HEIGHT, BOTTLENECK_WIDTH, FEATURE_DIM],
            output,
        )
    }

    fn load_flat(&mut self, weights: &[f32]) -> Result<Vec<ParamMapping>> {
        self.params = weights.to_vec();
        self.disposed = false;
        if weights.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![ParamMapping::at_offset(
            "backbone/flat",
            vec![weights.len()],
            0,
        )])
    }

    fn load_named(&mut self, map: &WeightMap) -> Result<Vec<ParamMapping>> {
        self.params.clear();
        self.disposed = false;
        Ok(map
            .iter()
            .map(|(name, tensor)| ParamMapping::named(name, tensor.shape().to_vec()))
            .collect())
    }

    fn dispose(&mut self, strict: bool) -> Result<()> {
        if self.disposed {
            if strict {
                return Err(AparentarError::AlreadyDisposed {
                    model: "StubBackbone".to_string(),
                });
            }
            return Ok(());
        }
        self.params = Vec::new();
        self.disposed = true;
        Ok(())
    }

    fn param_count(&self) -> usize {
        self.params.len()
    }
}
