use std::path::Path;

use anyhow::Context;
use tract_onnx::prelude::*;
use tracing::info;

use super::Model;

type Plan = TypedRunnableModel<TypedModel>;

/// ONNX export of the classifier, optimized once at load time.
pub struct OnnxModel {
    plan: Plan,
    side: u32,
}

impl OnnxModel {
    pub fn load(path: &Path, side: u32) -> anyhow::Result<Self> {
        let s = side as usize;
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("load onnx model {}", path.display()))?
            .with_input_fact(0, f32::fact([1, s, s, 3]).into())?
            .into_optimized()?
            .into_runnable()?;
        info!(path = %path.display(), side, "classification model loaded");
        Ok(Self { plan, side })
    }
}

impl Model for OnnxModel {
    fn predict(&self, pixels: &[f32], side: u32) -> anyhow::Result<f32> {
        anyhow::ensure!(
            side == self.side,
            "model expects {}px input, got {}px",
            self.side,
            side
        );
        let s = side as usize;
        let input: Tensor = tract_ndarray::Array4::from_shape_vec((1, s, s, 3), pixels.to_vec())
            .context("shape input tensor")?
            .into();
        let outputs = self.plan.run(tvec!(input.into()))?;
        let probs = outputs[0].to_array_view::<f32>()?;
        probs
            .iter()
            .next()
            .copied()
            .context("model produced an empty output")
    }
}
