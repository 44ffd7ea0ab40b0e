//! Coverage tests for the two parameter-extraction paths
//!
//! Exercises the flat-buffer split/decode, the named-map partition/lookup,
//! and every extraction error path through the public model surface.

use aparentar::extract::{
    extract_classifier_flat, extract_classifier_named, partition_weight_map, split_flat_buffer,
    KEY_AGE_BIAS, KEY_AGE_WEIGHTS, KEY_GENDER_BIAS, KEY_GENDER_WEIGHTS,
};
use aparentar::params::CLASSIFIER_PARAM_COUNT;
use aparentar::{
    AgeGenderNet, AparentarError, ModelInput, StubBackbone, Tensor, WeightMap,
};

// ============================================================================
// HELPERS
// ============================================================================

/// Classifier block where every scalar is its own index, so positional
/// decoding can be checked value by value
fn indexed_block() -> Vec<f32> {
    (0..CLASSIFIER_PARAM_COUNT).map(|i| i as f32).collect()
}

/// Named map equivalent to `indexed_block()` under the flat layout
fn indexed_map() -> WeightMap {
    let block = indexed_block();
    let mut map = WeightMap::new();
    map.insert(
        KEY_AGE_WEIGHTS.to_string(),
        Tensor::from_vec(vec![512, 1], block[..512].to_vec()).expect("test"),
    );
    map.insert(
        KEY_AGE_BIAS.to_string(),
        Tensor::from_vec(vec![1], block[512..513].to_vec()).expect("test"),
    );
    map.insert(
        KEY_GENDER_WEIGHTS.to_string(),
        Tensor::from_vec(vec![512, 2], block[513..1537].to_vec()).expect("test"),
    );
    map.insert(
        KEY_GENDER_BIAS.to_string(),
        Tensor::from_vec(vec![2], block[1537..].to_vec()).expect("test"),
    );
    map
}

fn feature_batch(batch: usize, value: f32) -> ModelInput {
    ModelInput::Features(
        Tensor::from_vec(vec![batch, 7, 7, 512], vec![value; batch * 7 * 7 * 512]).expect("test"),
    )
}

// ============================================================================
// FLAT PATH
// ============================================================================

#[test]
fn test_flat_shapes_match_wire_contract() {
    let (params, ledger) = extract_classifier_flat(&indexed_block(), 0).expect("test");
    assert_eq!(params.age.weights().shape(), &[512, 1]);
    assert_eq!(params.age.bias().shape(), &[1]);
    assert_eq!(params.gender.weights().shape(), &[512, 2]);
    assert_eq!(params.gender.bias().shape(), &[2]);
    assert_eq!(ledger.len(), 4);
    assert_eq!(params.scalar_count(), CLASSIFIER_PARAM_COUNT);
}

#[test]
fn test_flat_ledger_offsets_are_arithmetic() {
    let (_, ledger) = extract_classifier_flat(&indexed_block(), 100).expect("test");
    let offsets: Vec<usize> = ledger.iter().map(|m| m.offset.expect("flat")).collect();
    assert_eq!(offsets, [100, 612, 613, 1637]);
}

#[test]
fn test_flat_decode_order_age_then_gender() {
    let (params, _) = extract_classifier_flat(&indexed_block(), 0).expect("test");
    assert_eq!(params.age.weights().data()[0], 0.0);
    assert_eq!(params.age.bias().data()[0], 512.0);
    assert_eq!(params.gender.weights().data()[0], 513.0);
    assert_eq!(params.gender.bias().data(), &[1537.0, 1538.0]);
}

#[test]
fn test_split_rejects_short_buffer_with_lengths() {
    let err = split_flat_buffer(&[0.0; 17]).expect_err("must fail");
    match err {
        AparentarError::MalformedWeights { reason } => {
            assert!(reason.contains("1539"));
            assert!(reason.contains("17"));
        },
        other => panic!("expected MalformedWeights, got {other:?}"),
    }
}

#[test]
fn test_load_from_buffer_short_fails_and_stays_unloaded() {
    let mut model = AgeGenderNet::new(StubBackbone::new());
    let err = model.load_from_buffer(&[0.0; 1538]).expect_err("must fail");
    assert!(matches!(err, AparentarError::MalformedWeights { .. }));
    assert!(!model.is_loaded());
    assert!(model.param_mappings().is_empty());
}

#[test]
fn test_load_from_buffer_composes_ledger() {
    let mut buffer = vec![1.0f32; 32];
    buffer.extend(indexed_block());
    let mut model = AgeGenderNet::new(StubBackbone::new());
    model.load_from_buffer(&buffer).expect("test");

    let mappings = model.param_mappings();
    assert_eq!(mappings.len(), 5);
    // Backbone entries interleave first, classifier entries follow
    assert_eq!(mappings[0].path, "backbone/flat");
    let classifier: Vec<&str> = mappings[1..].iter().map(|m| m.path.as_str()).collect();
    assert_eq!(
        classifier,
        [KEY_AGE_WEIGHTS, KEY_AGE_BIAS, KEY_GENDER_WEIGHTS, KEY_GENDER_BIAS]
    );
    // Classifier offsets are absolute into the original buffer
    assert_eq!(mappings[1].offset, Some(32));
}

// ============================================================================
// NAMED PATH
// ============================================================================

#[test]
fn test_named_extraction_matches_flat() {
    let (flat_params, _) = extract_classifier_flat(&indexed_block(), 0).expect("test");
    let (named_params, ledger) = extract_classifier_named(&indexed_map()).expect("test");
    assert_eq!(flat_params, named_params);
    assert!(ledger.iter().all(|m| m.offset.is_none()));
}

#[test]
fn test_named_missing_key_errors_name_the_key() {
    for key in [KEY_AGE_WEIGHTS, KEY_AGE_BIAS, KEY_GENDER_WEIGHTS, KEY_GENDER_BIAS] {
        let mut map = indexed_map();
        map.remove(key);
        let err = extract_classifier_named(&map).expect_err("must fail");
        assert_eq!(
            err,
            AparentarError::MissingParameter {
                key: key.to_string()
            }
        );
    }
}

#[test]
fn test_named_rejects_wrong_rank() {
    let mut map = indexed_map();
    map.insert(
        KEY_GENDER_WEIGHTS.to_string(),
        Tensor::from_vec(vec![1024], vec![0.0; 1024]).expect("test"),
    );
    let err = extract_classifier_named(&map).expect_err("must fail");
    assert!(matches!(err, AparentarError::MalformedWeights { .. }));
}

#[test]
fn test_partition_keeps_tensor_data() {
    let mut map = indexed_map();
    map.insert(
        "block1/conv/weights".to_string(),
        Tensor::from_vec(vec![2, 2], vec![7.0; 4]).expect("test"),
    );
    let (backbone, classifier) = partition_weight_map(&map);
    assert_eq!(backbone.len(), 1);
    assert_eq!(classifier.len(), 4);
    assert_eq!(
        backbone.get("block1/conv/weights").expect("test").data(),
        &[7.0; 4]
    );
}

#[test]
fn test_load_from_weight_map_ledger_backbone_first() {
    let mut map = indexed_map();
    map.insert(
        "conv1/weights".to_string(),
        Tensor::from_vec(vec![3, 3], vec![0.0; 9]).expect("test"),
    );
    let mut model = AgeGenderNet::new(StubBackbone::new());
    model.load_from_weight_map(&map).expect("test");

    let mappings = model.param_mappings();
    assert_eq!(mappings.len(), 5);
    assert_eq!(mappings[0].path, "conv1/weights");
    assert_eq!(mappings[0].shape, vec![3, 3]);
    assert_eq!(mappings[1].path, KEY_AGE_WEIGHTS);
}

// ============================================================================
// CROSS-PATH PARITY
// ============================================================================

#[test]
fn test_both_paths_give_identical_inference() {
    let mut flat_model = AgeGenderNet::new(StubBackbone::new());
    flat_model.load_from_buffer(&indexed_block()).expect("test");

    let mut named_model = AgeGenderNet::new(StubBackbone::new());
    named_model.load_from_weight_map(&indexed_map()).expect("test");

    let input = feature_batch(2, 0.001);
    let flat_out = flat_model.infer_raw(&input).expect("test");
    let named_out = named_model.infer_raw(&input).expect("test");

    for (a, b) in flat_out.age.data().iter().zip(named_out.age.data()) {
        assert!((a - b).abs() < 1e-6);
    }
    for (a, b) in flat_out.gender.data().iter().zip(named_out.gender.data()) {
        assert!((a - b).abs() < 1e-6);
    }
}
