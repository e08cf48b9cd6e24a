use image::DynamicImage;

use crate::error::{Error, Result};
use crate::grade::{ClassificationResult, RawLabel};
use crate::timer::Timer;

/// Side length the models were trained on
pub const INPUT_SIZE: u32 = 180;

/// A loaded fresh/rotten model
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Result<ClassificationResult>;
}

/// Resize to `size` x `size` RGB and scale pixels to [0, 1], HWC order.
pub fn preprocess(image: &DynamicImage, size: u32) -> Vec<f32> {
    let mut t = Timer::started("Resizing image");

    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, size, size, image::imageops::FilterType::Triangle);

    let raw: Vec<f32> = resized
        .into_raw()
        .iter()
        .map(|x| *x as f32 / 255f32)
        .collect();

    t.stop();

    raw
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();

    exps.iter().map(|x| x / sum).collect()
}

/// Turn the two model scores into a label and a percentage.
///
/// `scores` are softmaxed first; on a tie the first label wins.
pub fn scores_to_classification(scores: &[f32]) -> Result<ClassificationResult> {
    if scores.len() != RawLabel::ALL.len() {
        return Err(Error::Inference(format!(
            "expected {} scores, got {}",
            RawLabel::ALL.len(),
            scores.len()
        )));
    }

    if scores.iter().any(|s| !s.is_finite()) {
        return Err(Error::Inference("model produced non-finite scores".into()));
    }

    let probabilities = softmax(scores);

    let mut best = 0;
    for (i, p) in probabilities.iter().enumerate() {
        if *p > probabilities[best] {
            best = i;
        }
    }

    Ok(ClassificationResult {
        label: RawLabel::ALL[best],
        confidence: 100.0 * probabilities[best],
    })
}
