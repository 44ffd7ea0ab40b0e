//! Top-level age/gender model: lifecycle, loading, and the inference surface
//!
//! `AgeGenderNet` composes a [`Backbone`] collaborator with the
//! [`ClassifierHead`] parameter store behind an explicit
//! `Unloaded → Loaded` lifecycle. Loading (from a flat buffer, a named
//! bundle, or either file form) is the only state mutator and replaces the
//! loaded state atomically; every inference entry point passes through one
//! guard on that state.
//!
//! Inference takes `&self`, load and dispose take `&mut self`, so the
//! borrow checker enforces the contract that loads and disposals are
//! serialized against in-flight inference while concurrent inference over
//! one loaded model is safe.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backbone::Backbone;
use crate::error::{AparentarError, Result};
use crate::extract::{partition_weight_map, split_flat_buffer};
use crate::head::ClassifierHead;
use crate::io::read_flat_weights;
use crate::layers::softmax;
use crate::params::ParamMapping;
use crate::tensor::Tensor;
use crate::weight_map::WeightMap;

/// Name reported by lifecycle errors
const MODEL_NAME: &str = "AgeGenderNet";

/// Input to one inference call
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// Precomputed bottleneck feature batch, `[N, 7, 7, 512]`
    Features(Tensor),
    /// Raw input batch, routed through the backbone first
    Raw(Tensor),
}

/// Age and gender outputs of one forward pass
///
/// `age` is always `[N]`. `gender` is `[N, 2]`: logits from
/// [`AgeGenderNet::infer_raw`], a per-sample probability distribution from
/// [`AgeGenderNet::infer_normalized`].
#[derive(Debug, Clone, PartialEq)]
pub struct AgeGenderOutput {
    /// Age output, one scalar per sample
    pub age: Tensor,
    /// Gender output, two values per sample
    pub gender: Tensor,
}

/// Decoded gender label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Class index 0, and the tie side of the threshold
    Female,
    /// Class index 1
    Male,
}

impl Gender {
    /// Decode a male-class probability against the fixed threshold
    ///
    /// Strictly greater than 0.5 decodes `Male` with that probability;
    /// anything else, a tie at exactly 0.5 included, decodes `Female` with
    /// `1 − p`.
    #[must_use]
    pub fn from_male_probability(p_male: f32) -> (Self, f32) {
        if p_male > 0.5 {
            (Self::Male, p_male)
        } else {
            (Self::Female, 1.0 - p_male)
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Female => write!(f, "female"),
            Self::Male => write!(f, "male"),
        }
    }
}

/// Decoded single-sample prediction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgeGenderPrediction {
    /// Predicted age
    pub age: f32,
    /// Decoded gender label
    pub gender: Gender,
    /// Probability of the reported label
    pub gender_probability: f32,
}

/// Everything that exists only while the model is loaded
#[derive(Debug)]
struct LoadedState {
    head: ClassifierHead,
    /// Composed ledger: backbone entries first, then the four classifier
    /// entries, in extraction order
    mappings: Vec<ParamMapping>,
}

/// Age/gender inference model over a pluggable backbone
#[derive(Debug)]
pub struct AgeGenderNet<B: Backbone> {
    backbone: B,
    state: Option<LoadedState>,
    disposed: bool,
}

impl<B: Backbone> AgeGenderNet<B> {
    /// Create an unloaded model over `backbone`
    pub fn new(backbone: B) -> Self {
        Self {
            backbone,
            state: None,
            disposed: false,
        }
    }

    /// Whether parameters are loaded
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    /// The composed extraction ledger; empty while unloaded
    #[must_use]
    pub fn param_mappings(&self) -> &[ParamMapping] {
        self.state.as_ref().map_or(&[], |s| s.mappings.as_slice())
    }

    /// The backbone collaborator
    pub fn backbone(&self) -> &B {
        &self.backbone
    }

    /// Single loaded-state guard used by every inference entry point
    fn loaded(&self) -> Result<&LoadedState> {
        self.state.as_ref().ok_or_else(|| AparentarError::NotLoaded {
            model: MODEL_NAME.to_string(),
        })
    }

    /// Install a freshly extracted state, replacing any previous one
    fn install(&mut self, head: ClassifierHead, backbone_mappings: Vec<ParamMapping>) {
        let mut mappings = backbone_mappings;
        mappings.extend(head.mappings().iter().cloned());
        self.state = Some(LoadedState { head, mappings });
        self.disposed = false;
    }

    /// Load from a flat f32 buffer: backbone prefix, 1539-scalar classifier
    /// suffix
    ///
    /// # Errors
    ///
    /// Returns `MalformedWeights` if the buffer is shorter than 1539
    /// scalars, plus any backbone extraction failure.
    pub fn load_from_buffer(&mut self, weights: &[f32]) -> Result<()> {
        let (prefix, suffix) = split_flat_buffer(weights)?;
        // Decode the classifier before the backbone consumes its share, so
        // a failed load leaves both the model state and the backbone as the
        // previous load left them
        let head = ClassifierHead::from_flat(suffix, prefix.len())?;
        let backbone_mappings = self.backbone.load_flat(prefix)?;
        self.install(head, backbone_mappings);
        Ok(())
    }

    /// Load from a named bundle, partitioned by key namespace
    ///
    /// # Errors
    ///
    /// Returns `MissingParameter` for an absent classifier key,
    /// `MalformedWeights` for a shape mismatch, plus any backbone failure.
    pub fn load_from_weight_map(&mut self, map: &WeightMap) -> Result<()> {
        let (backbone_map, classifier_map) = partition_weight_map(map);
        // Validate the classifier namespace before the backbone consumes
        // its sub-map: a missing or malformed fc key must not leave the
        // backbone re-loaded from the failed bundle
        let head = ClassifierHead::from_named(&classifier_map)?;
        let backbone_mappings = self.backbone.load_named(&backbone_map)?;
        self.install(head, backbone_mappings);
        Ok(())
    }

    /// Load a raw flat weight file (packed little-endian f32)
    ///
    /// # Errors
    ///
    /// Returns `IoError`/`FormatError` on read failure, plus the
    /// `load_from_buffer` failure modes.
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let weights = read_flat_weights(path)?;
        self.load_from_buffer(&weights)
    }

    /// Load a safetensors-style bundle file
    ///
    /// # Errors
    ///
    /// Returns `IoError`/`FormatError` on read failure, plus the
    /// `load_from_weight_map` failure modes.
    pub fn load_from_safetensors_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let map = WeightMap::from_safetensors_file(path)?;
        self.load_from_weight_map(&map)
    }

    /// Resolve an input to a bottleneck feature batch
    fn resolve_features(&self, input: &ModelInput) -> Result<Tensor> {
        match input {
            ModelInput::Features(features) => Ok(features.clone()),
            ModelInput::Raw(raw) => self.backbone.forward(raw),
        }
    }

    /// Forward pass producing logits: `age [N]`, `gender [N, 2]`
    ///
    /// # Errors
    ///
    /// Returns `NotLoaded` while unloaded, `InvalidShape` for a
    /// wrong-shaped feature batch, `Backbone` for raw-input failures.
    pub fn infer_raw(&self, input: &ModelInput) -> Result<AgeGenderOutput> {
        let state = self.loaded()?;
        let features = self.resolve_features(input)?;
        let output = state.head.forward(&features)?;
        Ok(AgeGenderOutput {
            age: output.age,
            gender: output.gender,
        })
    }

    /// Forward pass with the gender logits softmaxed into a per-sample
    /// two-class distribution; the age tensor is unchanged
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::infer_raw`].
    pub fn infer_normalized(&self, input: &ModelInput) -> Result<AgeGenderOutput> {
        let raw = self.infer_raw(input)?;
        Ok(AgeGenderOutput {
            age: raw.age,
            gender: softmax(&raw.gender)?,
        })
    }

    /// Decode the first sample of a normalized forward pass
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::infer_raw`].
    pub fn predict_age_and_gender(&self, input: &ModelInput) -> Result<AgeGenderPrediction> {
        let output = self.infer_normalized(input)?;
        decode_sample(&output, 0)
    }

    /// Decode every sample of a normalized forward pass
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::infer_raw`].
    pub fn predict_all(&self, input: &ModelInput) -> Result<Vec<AgeGenderPrediction>> {
        let output = self.infer_normalized(input)?;
        let batch = output.age.shape()[0];
        (0..batch).map(|i| decode_sample(&output, i)).collect()
    }

    /// Release the backbone's resources first, then the classifier's
    ///
    /// Lenient double-disposal is a no-op; under `strict` it fails with
    /// `AlreadyDisposed`. A later load is legal and re-arms the lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyDisposed` under `strict` when already disposed, or
    /// a propagated backbone disposal failure.
    pub fn dispose(&mut self, strict: bool) -> Result<()> {
        if self.disposed {
            if strict {
                return Err(AparentarError::AlreadyDisposed {
                    model: MODEL_NAME.to_string(),
                });
            }
            return Ok(());
        }
        self.backbone.dispose(strict)?;
        self.state = None;
        self.disposed = true;
        Ok(())
    }
}

impl<B: Backbone + Default> Default for AgeGenderNet<B> {
    fn default() -> Self {
        Self::new(B::default())
    }
}

/// Decode one sample of a normalized output into a labeled prediction
fn decode_sample(output: &AgeGenderOutput, index: usize) -> Result<AgeGenderPrediction> {
    let age = output.age.sample(index)?[0];
    let p_male = output.gender.sample(index)?[1];
    let (gender, gender_probability) = Gender::from_male_probability(p_male);
    Ok(AgeGenderPrediction {
        age,
        gender,
        gender_probability,
    })
}
