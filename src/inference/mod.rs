//! Binary image classification on top of a pre-trained model.

mod onnx;

use std::sync::Arc;

use anyhow::Context;
use image::imageops::FilterType;

pub use onnx::OnnxModel;

/// A loaded model. Input is one RGB image of `side`×`side` pixels in NHWC
/// order with values in [0, 1]; output is the probability of the positive class.
pub trait Model: Send + Sync {
    fn predict(&self, pixels: &[f32], side: u32) -> anyhow::Result<f32>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    /// Probability mass of `label`, as a percentage.
    pub confidence: f64,
}

/// Decodes, resizes and normalizes images, then maps the model's output to a
/// label. Shared read-only across requests.
pub struct ImageClassifier {
    model: Arc<dyn Model>,
    input_size: u32,
    labels: [String; 2],
}

impl ImageClassifier {
    pub fn new(model: Arc<dyn Model>, input_size: u32, labels: [String; 2]) -> Self {
        Self {
            model,
            input_size,
            labels,
        }
    }

    pub fn classify(&self, image_bytes: &[u8]) -> anyhow::Result<Classification> {
        let pixels = preprocess(image_bytes, self.input_size)?;
        let p = self.model.predict(&pixels, self.input_size)?;
        anyhow::ensure!(
            p.is_finite() && (0.0..=1.0).contains(&p),
            "model output {p} is not a probability"
        );
        Ok(self.label_for(p))
    }

    fn label_for(&self, p: f32) -> Classification {
        let p = f64::from(p);
        let (idx, mass) = if p > 0.5 { (1, p) } else { (0, 1.0 - p) };
        Classification {
            label: self.labels[idx].clone(),
            confidence: mass * 100.0,
        }
    }
}

fn preprocess(image_bytes: &[u8], side: u32) -> anyhow::Result<Vec<f32>> {
    let rgb = image::load_from_memory(image_bytes)
        .context("decode image")?
        .to_rgb8();
    let resized = image::imageops::resize(&rgb, side, side, FilterType::CatmullRom);
    Ok(resized
        .as_raw()
        .iter()
        .map(|&v| f32::from(v) / 255.0)
        .collect())
}
