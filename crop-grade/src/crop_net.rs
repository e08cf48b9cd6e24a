//! The `crop-net` architecture rebuilt in code.
//!
//! Used when the model artifact cannot be deserialized as a whole: the layer
//! graph is fixed here and only the weight tensors are read from disk.
//!
//! ```text
//! 180x180x3 -> conv3x3(8) relu -> maxpool2 -> conv3x3(16) relu -> maxpool2
//!           -> global average pool -> dense(2) -> softmax
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use log::debug;
use serde::Deserialize;

use crate::classifier::{preprocess, scores_to_classification, Classifier, INPUT_SIZE};
use crate::error::{Error, Result};
use crate::grade::ClassificationResult;
use crate::timer::Timer;

pub const ARCHITECTURE: &str = "crop-net";

/// File looked up when the artifact path is a directory
pub const WEIGHTS_FILE: &str = "weights.json";

const CHANNELS: usize = 3;
const CONV1_FILTERS: usize = 8;
const CONV2_FILTERS: usize = 16;
const CLASSES: usize = 2;

#[derive(Deserialize)]
struct WeightsFile {
    architecture: String,
    tensors: HashMap<String, RawTensor>,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    values: Vec<f32>,
}

struct Conv2d {
    size: usize,
    filters_in: usize,
    filters_out: usize,
    /// height, width, in, out
    kernel: Vec<f32>,
    bias: Vec<f32>,
}

impl Conv2d {
    /// Valid 3x3 convolution followed by ReLU over an HWC tensor.
    fn forward(&self, input: &[f32], height: usize, width: usize) -> (Vec<f32>, usize, usize) {
        let out_h = height + 1 - self.size;
        let out_w = width + 1 - self.size;
        let mut out = vec![0f32; out_h * out_w * self.filters_out];

        for oy in 0..out_h {
            for ox in 0..out_w {
                let acc = &mut out[(oy * out_w + ox) * self.filters_out..][..self.filters_out];
                acc.copy_from_slice(&self.bias);

                for ky in 0..self.size {
                    for kx in 0..self.size {
                        let pixel = ((oy + ky) * width + ox + kx) * self.filters_in;
                        for ci in 0..self.filters_in {
                            let v = input[pixel + ci];
                            let k = ((ky * self.size + kx) * self.filters_in + ci) * self.filters_out;
                            for (a, w) in acc.iter_mut().zip(&self.kernel[k..k + self.filters_out]) {
                                *a += v * w;
                            }
                        }
                    }
                }

                for a in acc.iter_mut() {
                    *a = a.max(0.0);
                }
            }
        }

        (out, out_h, out_w)
    }
}

fn max_pool2(input: &[f32], height: usize, width: usize, channels: usize) -> (Vec<f32>, usize, usize) {
    let out_h = height / 2;
    let out_w = width / 2;
    let mut out = vec![f32::NEG_INFINITY; out_h * out_w * channels];

    for oy in 0..out_h {
        for ox in 0..out_w {
            let dst = (oy * out_w + ox) * channels;
            for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                let src = ((oy * 2 + dy) * width + ox * 2 + dx) * channels;
                for c in 0..channels {
                    out[dst + c] = out[dst + c].max(input[src + c]);
                }
            }
        }
    }

    (out, out_h, out_w)
}

fn global_average_pool(input: &[f32], channels: usize) -> Vec<f32> {
    let mut sums = vec![0f32; channels];
    for pixel in input.chunks_exact(channels) {
        for (s, v) in sums.iter_mut().zip(pixel) {
            *s += v;
        }
    }

    let count = (input.len() / channels).max(1) as f32;
    sums.iter().map(|s| s / count).collect()
}

pub struct CropNet {
    conv1: Conv2d,
    conv2: Conv2d,
    /// in, out
    dense_kernel: Vec<f32>,
    dense_bias: Vec<f32>,
}

impl CropNet {
    /// Load weights from a JSON file, or from `weights.json` inside a directory.
    pub fn load(path: &Path) -> Result<Self> {
        let file = weights_path(path);
        debug!("Reading {} weights from {}", ARCHITECTURE, file.display());

        let raw = fs::read_to_string(&file)?;
        CropNet::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let weights: WeightsFile = serde_json::from_str(raw)?;

        if weights.architecture != ARCHITECTURE {
            return Err(Error::InvalidWeights(format!(
                "weights are for '{}', expected '{}'",
                weights.architecture, ARCHITECTURE
            )));
        }

        let mut tensors = weights.tensors;

        let conv1 = Conv2d {
            size: 3,
            filters_in: CHANNELS,
            filters_out: CONV1_FILTERS,
            kernel: take(&mut tensors, "conv1/kernel", &[3, 3, CHANNELS, CONV1_FILTERS])?,
            bias: take(&mut tensors, "conv1/bias", &[CONV1_FILTERS])?,
        };
        let conv2 = Conv2d {
            size: 3,
            filters_in: CONV1_FILTERS,
            filters_out: CONV2_FILTERS,
            kernel: take(&mut tensors, "conv2/kernel", &[3, 3, CONV1_FILTERS, CONV2_FILTERS])?,
            bias: take(&mut tensors, "conv2/bias", &[CONV2_FILTERS])?,
        };

        Ok(CropNet {
            conv1,
            conv2,
            dense_kernel: take(&mut tensors, "dense/kernel", &[CONV2_FILTERS, CLASSES])?,
            dense_bias: take(&mut tensors, "dense/bias", &[CLASSES])?,
        })
    }

    /// Run the layer stack on a preprocessed image and return raw logits.
    pub fn forward(&self, input: &[f32]) -> Result<Vec<f32>> {
        let side = INPUT_SIZE as usize;
        if input.len() != side * side * CHANNELS {
            return Err(Error::Inference(format!(
                "input has {} values, expected {}",
                input.len(),
                side * side * CHANNELS
            )));
        }

        let (x, h, w) = self.conv1.forward(input, side, side);
        let (x, h, w) = max_pool2(&x, h, w, CONV1_FILTERS);
        let (x, h, w) = self.conv2.forward(&x, h, w);
        let (x, _, _) = max_pool2(&x, h, w, CONV2_FILTERS);
        let features = global_average_pool(&x, CONV2_FILTERS);

        let mut logits = self.dense_bias.clone();
        for (i, f) in features.iter().enumerate() {
            let row = &self.dense_kernel[i * CLASSES..(i + 1) * CLASSES];
            for (l, w) in logits.iter_mut().zip(row) {
                *l += f * w;
            }
        }

        Ok(logits)
    }
}

impl Classifier for CropNet {
    fn classify(&self, image: &DynamicImage) -> Result<ClassificationResult> {
        let input = preprocess(image, INPUT_SIZE);

        let mut t = Timer::started("Running crop-net");
        let logits = self.forward(&input)?;
        t.stop();

        scores_to_classification(&logits)
    }
}

fn weights_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(WEIGHTS_FILE)
    } else {
        path.to_path_buf()
    }
}

fn take(tensors: &mut HashMap<String, RawTensor>, name: &str, shape: &[usize]) -> Result<Vec<f32>> {
    let tensor = tensors
        .remove(name)
        .ok_or_else(|| Error::InvalidWeights(format!("missing tensor '{}'", name)))?;

    if tensor.shape != shape {
        return Err(Error::InvalidWeights(format!(
            "tensor '{}' has shape {:?}, expected {:?}",
            name, tensor.shape, shape
        )));
    }

    let expected: usize = shape.iter().product();
    if tensor.values.len() != expected {
        return Err(Error::InvalidWeights(format!(
            "tensor '{}' has {} values, expected {}",
            name,
            tensor.values.len(),
            expected
        )));
    }

    Ok(tensor.values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::RawLabel;
    use image::{Rgb, RgbImage};
    use serde_json::{json, Value};

    fn tensor(shape: &[usize], fill: f32) -> Value {
        let n: usize = shape.iter().product();
        json!({ "shape": shape, "values": vec![fill; n] })
    }

    fn weights(dense_bias: [f32; 2]) -> Value {
        json!({
            "architecture": "crop-net",
            "tensors": {
                "conv1/kernel": tensor(&[3, 3, 3, 8], 0.0),
                "conv1/bias": tensor(&[8], 0.0),
                "conv2/kernel": tensor(&[3, 3, 8, 16], 0.0),
                "conv2/bias": tensor(&[16], 0.0),
                "dense/kernel": tensor(&[16, 2], 0.0),
                "dense/bias": { "shape": [2], "values": dense_bias },
            }
        })
    }

    fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, Rgb([120, 200, 40])))
    }

    #[test]
    fn zero_weights_tie_on_fresh() {
        let net = CropNet::from_json(&weights([0.0, 0.0]).to_string()).unwrap();
        let result = net.classify(&sample_image()).unwrap();

        assert_eq!(result.label, RawLabel::Fresh);
        assert!((result.confidence - 50.0).abs() < 1e-3);
    }

    #[test]
    fn dense_bias_drives_the_label() {
        let net = CropNet::from_json(&weights([0.0, 3.0]).to_string()).unwrap();
        let result = net.classify(&sample_image()).unwrap();

        assert_eq!(result.label, RawLabel::Rotten);
        assert!((result.confidence - 95.257).abs() < 1e-2);
    }

    #[test]
    fn features_flow_through_the_stack() {
        // conv1 copies the red channel into every filter, conv2 sums them,
        // dense pushes the pooled activation towards "fresh"
        let mut w = weights([0.0, 0.0]);
        let mut k1 = vec![0.0f32; 3 * 3 * 3 * 8];
        let centre_red = 4 * 3 * 8; // ky=1, kx=1, ci=0
        for co in 0..8 {
            k1[centre_red + co] = 1.0;
        }
        w["tensors"]["conv1/kernel"]["values"] = json!(k1);
        w["tensors"]["conv2/kernel"] = tensor(&[3, 3, 8, 16], 0.1);
        let mut dense = vec![0.0f32; 16 * 2];
        for i in 0..16 {
            dense[i * 2] = 1.0;
        }
        w["tensors"]["dense/kernel"]["values"] = json!(dense);

        let net = CropNet::from_json(&w.to_string()).unwrap();
        let result = net.classify(&sample_image()).unwrap();

        assert_eq!(result.label, RawLabel::Fresh);
        assert!(result.confidence > 99.0);
    }

    #[test]
    fn rejects_foreign_architecture() {
        let mut w = weights([0.0, 0.0]);
        w["architecture"] = json!("resnet50");

        assert!(matches!(
            CropNet::from_json(&w.to_string()),
            Err(Error::InvalidWeights(_))
        ));
    }

    #[test]
    fn rejects_missing_and_misshapen_tensors() {
        let mut missing = weights([0.0, 0.0]);
        missing["tensors"].as_object_mut().unwrap().remove("conv2/bias");
        assert!(CropNet::from_json(&missing.to_string()).is_err());

        let mut misshapen = weights([0.0, 0.0]);
        misshapen["tensors"]["dense/kernel"] = tensor(&[2, 16], 0.0);
        assert!(CropNet::from_json(&misshapen.to_string()).is_err());

        let mut short = weights([0.0, 0.0]);
        short["tensors"]["conv1/bias"] = json!({ "shape": [8], "values": [0.0] });
        assert!(CropNet::from_json(&short.to_string()).is_err());
    }

    #[test]
    fn rejects_keras_h5_bytes() {
        assert!(matches!(CropNet::from_json("\u{89}HDF\r\n"), Err(Error::Json(_))));
    }

    #[test]
    fn loads_from_directory_or_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(WEIGHTS_FILE);
        fs::write(&file, weights([0.0, 0.0]).to_string()).unwrap();

        assert!(CropNet::load(dir.path()).is_ok());
        assert!(CropNet::load(&file).is_ok());
        assert!(matches!(
            CropNet::load(&dir.path().join("nope.json")),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn forward_checks_input_length() {
        let net = CropNet::from_json(&weights([0.0, 0.0]).to_string()).unwrap();
        assert!(net.forward(&[0.0; 12]).is_err());
    }
}
