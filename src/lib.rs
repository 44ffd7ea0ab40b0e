//! # Aparentar
//!
//! Age and gender inference from facial-image embeddings, built around a
//! verifiable parameter-extraction layer.
//!
//! Aparentar (Spanish: "to look a certain age") decodes a pretrained
//! classifier head - two small linear layers - out of either an opaque flat
//! f32 weight buffer or a named tensor bundle, records a ledger of every
//! extracted parameter's path, shape, and offset, and runs a deterministic
//! forward pipeline (average pool, flatten, two projections, softmax) over
//! bottleneck feature maps produced by a pluggable backbone.
//!
//! ## Example
//!
//! ```rust
//! use aparentar::{AgeGenderNet, ModelInput, StubBackbone, Tensor};
//! use aparentar::params::CLASSIFIER_PARAM_COUNT;
//!
//! // A classifier-only flat buffer (no backbone prefix)
//! let weights = vec![0.01f32; CLASSIFIER_PARAM_COUNT];
//!
//! let mut model: AgeGenderNet<StubBackbone> = AgeGenderNet::default();
//! model.load_from_buffer(&weights).unwrap();
//!
//! // Four ledger entries: age.w, age.b, gender.w, gender.b
//! assert_eq!(model.param_mappings().len(), 4);
//!
//! let features = Tensor::from_vec(vec![1, 7, 7, 512], vec![1.0; 7 * 7 * 512]).unwrap();
//! let prediction = model
//!     .predict_age_and_gender(&ModelInput::Features(features))
//!     .unwrap();
//! assert!(prediction.gender_probability >= 0.5);
//! ```
//!
//! ## Wire contract
//!
//! The flat buffer ends with a fixed 1539-scalar classifier block,
//! `age.w [512,1] + age.b [1] + gender.w [512,2] + gender.b [2]` in that
//! exact order; everything before it belongs to the backbone. Named bundles
//! use `fc/...` keys for the classifier namespace instead. Both extraction
//! paths produce the same `ClassifierParams`, so the pipeline never depends
//! on raw offsets or key names.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)] // usize -> f32 for means and counts is fine
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::float_cmp)] // exact comparisons are deliberate in tests

/// Backbone collaborator trait and the deterministic stub
pub mod backbone;
/// CLI command implementations
pub mod cli;
/// Error types
pub mod error;
/// Flat-buffer and named-map parameter extraction
pub mod extract;
/// Classifier head parameter store and forward pass
pub mod head;
/// Weight and feature file I/O
pub mod io;
/// Forward-pipeline primitives: pooling, linear, softmax
pub mod layers;
/// Top-level model, lifecycle, and inference surface
pub mod model;
/// Parameter structures and wire-contract constants
pub mod params;
/// Row-major f32 tensor
pub mod tensor;
/// Named tensor bundles and the safetensors-style reader
pub mod weight_map;

pub use backbone::{Backbone, StubBackbone};
pub use error::{AparentarError, Result};
pub use head::{ClassifierHead, HeadOutput};
pub use model::{AgeGenderNet, AgeGenderOutput, AgeGenderPrediction, Gender, ModelInput};
pub use params::{ClassifierParams, LinearParams, ParamMapping};
pub use tensor::Tensor;
pub use weight_map::WeightMap;
