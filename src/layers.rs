//! Forward-pipeline primitives
//!
//! Implements the three operations the classifier head is built from:
//! - Average pooling over NHWC spatial dims (valid padding)
//! - Linear projection against a [`LinearParams`] set
//! - Numerically stable softmax along the last dimension
//!
//! All three are scalar, deterministic implementations: outputs are compared
//! bit-for-bit by downstream consumers, so there is no fast-math or
//! backend-dependent reassociation here.
//!
//! ## Example
//!
//! ```rust,ignore
//! use aparentar::layers::{avg_pool2d, softmax};
//!
//! let pooled = avg_pool2d(&features, (7, 7), (2, 2))?;
//! let probs = softmax(&logits)?;
//! ```

use crate::{
    error::{AparentarError, Result},
    params::LinearParams,
    tensor::Tensor,
};

/// Apply softmax activation function
///
/// Softmax: `y[i] = exp(x[i]) / sum(exp(x[j]))` for all j
///
/// Applies softmax normalization along the last dimension. Uses numerically
/// stable implementation with max subtraction to prevent overflow.
///
/// # Arguments
///
/// * `input` - Input tensor
///
/// # Returns
///
/// Tensor with softmax applied along last dimension (each group sums to 1.0)
///
/// # Errors
///
/// Returns error if input is empty
pub fn softmax(input: &Tensor) -> Result<Tensor> {
    let data = input.data();
    let shape = input.shape();

    if data.is_empty() {
        return Err(AparentarError::InvalidShape {
            reason: "Cannot apply softmax to empty tensor".to_string(),
        });
    }

    let last_dim = shape[shape.len() - 1];
    let num_groups = data.len() / last_dim;
    let mut output = Vec::with_capacity(data.len());

    // Apply softmax to each group (row) independently
    for group_idx in 0..num_groups {
        let start = group_idx * last_dim;
        let end = start + last_dim;
        let group = &data[start..end];

        // Find max for numerical stability
        let max_val = group.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        // Compute exp(x - max) for each element
        let exp_vals: Vec<f32> = group.iter().map(|&x| (x - max_val).exp()).collect();

        // Sum of exponentials
        let sum_exp: f32 = exp_vals.iter().sum();

        // Normalize to get probabilities
        for &exp_val in &exp_vals {
            output.push(exp_val / sum_exp);
        }
    }

    Tensor::from_vec(shape.to_vec(), output)
}

/// Average pooling over the spatial dimensions of an NHWC batch
///
/// Valid padding: only windows that fit entirely inside the input
/// contribute, so the output spatial dims are
/// `(h - window.0) / stride.0 + 1` by `(w - window.1) / stride.1 + 1`.
///
/// # Arguments
///
/// * `input` - Tensor of shape `[N, H, W, C]`
/// * `window` - Pooling window `(height, width)`
/// * `stride` - Step `(rows, cols)` between windows
///
/// # Returns
///
/// Tensor of shape `[N, out_h, out_w, C]`
///
/// # Errors
///
/// Returns error if the input is not 4-D, the window or stride is zero, or
/// the window is larger than the spatial dims.
pub fn avg_pool2d(input: &Tensor, window: (usize, usize), stride: (usize, usize)) -> Result<Tensor> {
    let shape = input.shape();
    if shape.len() != 4 {
        return Err(AparentarError::InvalidShape {
            reason: format!("avg_pool2d expects [N, H, W, C] input, got shape {shape:?}"),
        });
    }
    if window.0 == 0 || window.1 == 0 || stride.0 == 0 || stride.1 == 0 {
        return Err(AparentarError::InvalidShape {
            reason: format!("Pooling window {window:?} and stride {stride:?} must be non-zero"),
        });
    }

    let (batch, height, width, channels) = (shape[0], shape[1], shape[2], shape[3]);
    if window.0 > height || window.1 > width {
        return Err(AparentarError::InvalidShape {
            reason: format!(
                "Pooling window {window:?} exceeds spatial dims [{height}, {width}]"
            ),
        });
    }

    let out_h = (height - window.0) / stride.0 + 1;
    let out_w = (width - window.1) / stride.1 + 1;
    let window_size = (window.0 * window.1) as f32;

    let data = input.data();
    let mut output = Vec::with_capacity(batch * out_h * out_w * channels);

    // Row-major NHWC walk: each output cell averages one spatial window per channel
    for n in 0..batch {
        let sample_base = n * height * width * channels;
        for oh in 0..out_h {
            for ow in 0..out_w {
                let row0 = oh * stride.0;
                let col0 = ow * stride.1;
                for c in 0..channels {
                    let mut sum = 0.0f32;
                    for dr in 0..window.0 {
                        let row_base = sample_base + (row0 + dr) * width * channels;
                        for dc in 0..window.1 {
                            sum += data[row_base + (col0 + dc) * channels + c];
                        }
                    }
                    output.push(sum / window_size);
                }
            }
        }
    }

    Tensor::from_vec(vec![batch, out_h, out_w, channels], output)
}

/// Linear projection of a batch against one parameter set
///
/// Computes `output[row] = input[row] · weights + bias` for every row of the
/// input, where `weights` is `[D_in, D_out]` and rows are the flattened
/// leading dims of the input.
///
/// # Arguments
///
/// * `input` - Tensor with last dimension `D_in`
/// * `params` - Weight/bias pair to project against
///
/// # Returns
///
/// Tensor with the last dimension replaced by `D_out`
///
/// # Errors
///
/// Returns error if the input's last dimension doesn't match the parameter
/// set's input width.
pub fn linear_forward(input: &Tensor, params: &LinearParams) -> Result<Tensor> {
    let shape = input.shape();
    let in_features = params.in_features();
    let out_features = params.out_features();

    let last_dim = shape[shape.len() - 1];
    if last_dim != in_features {
        return Err(AparentarError::InvalidShape {
            reason: format!(
                "Last dimension {last_dim} doesn't match in_features {in_features}"
            ),
        });
    }

    let data = input.data();
    let weight = params.weights().data();
    let bias = params.bias().data();
    let num_rows = data.len() / in_features;

    let mut output = Vec::with_capacity(num_rows * out_features);

    // For each input row, compute: output = input * weight + bias
    for row_idx in 0..num_rows {
        let input_start = row_idx * in_features;
        let input_row = &data[input_start..input_start + in_features];

        // Matrix-vector multiplication: output[j] = sum(input[i] * weight[i][j]) + bias[j]
        for j in 0..out_features {
            let mut sum = bias[j];
            for (i, &input_val) in input_row.iter().enumerate() {
                sum += input_val * weight[i * out_features + j];
            }
            output.push(sum);
        }
    }

    let mut output_shape = shape[..shape.len() - 1].to_vec();
    output_shape.push(out_features);

    Tensor::from_vec(output_shape, output)
}
