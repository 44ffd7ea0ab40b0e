//! CLI command implementations
//!
//! Business logic for the `aparentar` binary, extracted from main.rs for
//! testability. Each handler returns the rendered output as a `String`
//! rather than printing, so tests can assert on it directly.

use std::path::Path;

use serde::Serialize;

use crate::backbone::StubBackbone;
use crate::error::{AparentarError, Result};
use crate::extract::{extract_classifier_flat, extract_classifier_named, partition_weight_map, split_flat_buffer};
use crate::io::{read_feature_file, read_flat_weights};
use crate::model::{AgeGenderNet, AgeGenderPrediction, ModelInput};
use crate::params::{ParamMapping, CLASSIFIER_PARAM_COUNT};
use crate::weight_map::WeightMap;

/// Output rendering for CLI results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// Machine-readable JSON
    Json,
}

impl OutputFormat {
    /// Parse a `--format` argument
    ///
    /// # Errors
    ///
    /// Returns `FormatError` for anything other than `table` or `json`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(AparentarError::FormatError {
                reason: format!("Unknown output format '{other}' (expected table or json)"),
            }),
        }
    }
}

/// Weight-file kind, detected from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WeightFormat {
    /// Packed little-endian f32, backbone prefix + classifier suffix
    Flat,
    /// Safetensors-style named bundle
    Safetensors,
}

fn detect_weight_format(path: &Path) -> WeightFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("safetensors") => WeightFormat::Safetensors,
        _ => WeightFormat::Flat,
    }
}

/// JSON payload of `inspect`
#[derive(Debug, Serialize)]
struct InspectReport {
    format: &'static str,
    backbone_scalars: usize,
    classifier_scalars: usize,
    mappings: Vec<ParamMapping>,
}

fn render_mappings_table(report: &InspectReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "format: {}\nbackbone scalars: {}\nclassifier scalars: {}\n\n",
        report.format, report.backbone_scalars, report.classifier_scalars
    ));
    out.push_str(&format!("{:<24} {:<12} {}\n", "PATH", "SHAPE", "OFFSET"));
    for m in &report.mappings {
        let offset = m.offset.map_or_else(|| "-".to_string(), |o| o.to_string());
        let shape = format!("{:?}", m.shape);
        out.push_str(&format!("{:<24} {:<12} {}\n", m.path, shape, offset));
    }
    out
}

fn render_report(report: &InspectReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(render_mappings_table(report)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).map_err(|e| AparentarError::FormatError {
                reason: format!("Failed to serialize report: {e}"),
            })
        },
    }
}

/// `inspect` command: print the extraction ledger of a weight file
///
/// Pure extraction, no model is instantiated. For flat files the backbone
/// prefix size is reported and the classifier block is verified by decoding
/// it; for named bundles both namespaces are listed.
///
/// # Errors
///
/// Returns the extraction failure modes of whichever path applies.
pub fn handle_inspect(weights: &Path, format: OutputFormat) -> Result<String> {
    let report = match detect_weight_format(weights) {
        WeightFormat::Flat => {
            let buffer = read_flat_weights(weights)?;
            let (prefix, suffix) = split_flat_buffer(&buffer)?;
            let (_, classifier_mappings) = extract_classifier_flat(suffix, prefix.len())?;
            let mut mappings = Vec::new();
            if !prefix.is_empty() {
                mappings.push(ParamMapping::at_offset("backbone/flat", vec![prefix.len()], 0));
            }
            mappings.extend(classifier_mappings);
            InspectReport {
                format: "flat",
                backbone_scalars: prefix.len(),
                classifier_scalars: CLASSIFIER_PARAM_COUNT,
                mappings,
            }
        },
        WeightFormat::Safetensors => {
            let map = WeightMap::from_safetensors_file(weights)?;
            let (backbone_map, classifier_map) = partition_weight_map(&map);
            let (params, classifier_mappings) = extract_classifier_named(&classifier_map)?;
            let mut mappings: Vec<ParamMapping> = backbone_map
                .iter()
                .map(|(name, tensor)| ParamMapping::named(name, tensor.shape().to_vec()))
                .collect();
            let backbone_scalars: usize =
                backbone_map.iter().map(|(_, t)| t.size()).sum();
            mappings.extend(classifier_mappings);
            InspectReport {
                format: "safetensors",
                backbone_scalars,
                classifier_scalars: params.scalar_count(),
                mappings,
            }
        },
    };
    render_report(&report, format)
}

fn render_predictions(predictions: &[AgeGenderPrediction], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(predictions).map_err(|e| AparentarError::FormatError {
                reason: format!("Failed to serialize predictions: {e}"),
            })
        },
        OutputFormat::Table => {
            let mut out = String::new();
            out.push_str(&format!(
                "{:<8} {:<8} {:<8} {}\n",
                "SAMPLE", "AGE", "GENDER", "PROBABILITY"
            ));
            for (i, p) in predictions.iter().enumerate() {
                out.push_str(&format!(
                    "{:<8} {:<8.1} {:<8} {:.4}\n",
                    i, p.age, p.gender, p.gender_probability
                ));
            }
            Ok(out)
        },
    }
}

/// `predict` command: run the full pipeline over a feature file
///
/// Loads the weight file into a model over [`StubBackbone`] (a flat file may
/// be classifier-only or carry a stub-consumed prefix), reads a packed f32
/// NHWC feature file, and decodes every sample.
///
/// # Errors
///
/// Returns the loading and inference failure modes.
pub fn handle_predict(weights: &Path, features: &Path, format: OutputFormat) -> Result<String> {
    let mut model: AgeGenderNet<StubBackbone> = AgeGenderNet::default();
    match detect_weight_format(weights) {
        WeightFormat::Flat => model.load_from_file(weights)?,
        WeightFormat::Safetensors => model.load_from_safetensors_file(weights)?,
    }

    let batch = read_feature_file(features)?;
    let predictions = model.predict_all(&ModelInput::Features(batch))?;
    render_predictions(&predictions, format)
}

/// `info` command: version and wire-contract summary
#[must_use]
pub fn handle_info() -> String {
    format!(
        "aparentar {}\nclassifier block: {} f32 scalars ([512,1] + [1] + [512,2] + [2])\n",
        env!("CARGO_PKG_VERSION"),
        CLASSIFIER_PARAM_COUNT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_flat_file(dir: &tempfile::TempDir, name: &str, values: &[f32]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("test");
        for v in values {
            file.write_all(&v.to_le_bytes()).expect("test");
        }
        path
    }

    fn classifier_block() -> Vec<f32> {
        let mut block = Vec::with_capacity(CLASSIFIER_PARAM_COUNT);
        block.extend(vec![0.01; 512]);
        block.push(0.0);
        block.extend(vec![0.0; 1024]);
        block.extend([0.0, 1.0]);
        block
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("table").unwrap(), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("json").unwrap(), OutputFormat::Json);
        assert!(OutputFormat::parse("yaml").is_err());
    }

    #[test]
    fn test_detect_weight_format() {
        assert_eq!(
            detect_weight_format(Path::new("model.safetensors")),
            WeightFormat::Safetensors
        );
        assert_eq!(detect_weight_format(Path::new("model.bin")), WeightFormat::Flat);
        assert_eq!(detect_weight_format(Path::new("weights")), WeightFormat::Flat);
    }

    #[test]
    fn test_inspect_flat_table() {
        let dir = tempfile::tempdir().expect("test");
        let mut values = vec![0.5f32; 8];
        values.extend(classifier_block());
        let path = write_flat_file(&dir, "model.bin", &values);

        let out = handle_inspect(&path, OutputFormat::Table).unwrap();
        assert!(out.contains("backbone scalars: 8"));
        assert!(out.contains("fc/age/weights"));
        assert!(out.contains("fc/gender/bias"));
    }

    #[test]
    fn test_inspect_flat_json_lists_four_classifier_rows() {
        let dir = tempfile::tempdir().expect("test");
        let path = write_flat_file(&dir, "model.bin", &classifier_block());

        let out = handle_inspect(&path, OutputFormat::Json).unwrap();
        let report: serde_json::Value = serde_json::from_str(&out).expect("test");
        assert_eq!(report["backbone_scalars"], 0);
        assert_eq!(report["mappings"].as_array().expect("test").len(), 4);
    }

    #[test]
    fn test_inspect_short_flat_file_fails() {
        let dir = tempfile::tempdir().expect("test");
        let path = write_flat_file(&dir, "model.bin", &[0.0; 10]);
        let err = handle_inspect(&path, OutputFormat::Table).unwrap_err();
        assert!(matches!(err, AparentarError::MalformedWeights { .. }));
    }

    #[test]
    fn test_predict_classifier_only_flat_file() {
        let dir = tempfile::tempdir().expect("test");
        let weights = write_flat_file(&dir, "model.bin", &classifier_block());
        let feature_data = vec![1.0f32; 7 * 7 * 512];
        let features = write_flat_file(&dir, "features.bin", &feature_data);

        let out = handle_predict(&weights, &features, OutputFormat::Table).unwrap();
        // Gender bias favors class 1 -> male
        assert!(out.contains("male"));
        assert!(out.contains("5.1"));
    }

    #[test]
    fn test_predict_json_output() {
        let dir = tempfile::tempdir().expect("test");
        let weights = write_flat_file(&dir, "model.bin", &classifier_block());
        let feature_data = vec![0.0f32; 7 * 7 * 512];
        let features = write_flat_file(&dir, "features.bin", &feature_data);

        let out = handle_predict(&weights, &features, OutputFormat::Json).unwrap();
        let parsed: Vec<AgeGenderPrediction> = serde_json::from_str(&out).expect("test");
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_info_mentions_wire_contract() {
        let out = handle_info();
        assert!(out.contains("1539"));
        assert!(out.contains("aparentar"));
    }
}
