// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX Runtime 推理后端
//!
//! 加载时从会话的输入/输出描述推断 [`ModelGeometry`]; 推理时把 NHWC/NCHW 输入张量
//! 送入会话, 取第一个输出作为 `[1, C, N]` 检测头.

use std::fmt::Display;
use std::path::Path;

use ndarray::{Array3, ArrayView4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{TensorRef, ValueType};

use super::InferenceEngine;
use crate::detection::types::ModelGeometry;
use crate::error::{DetectError, Result};

pub struct OrtEngine {
    session: Session,
    geometry: ModelGeometry,
    model_path: String,
}

/// 加载模型并推断几何参数
pub fn load_model(path: impl AsRef<Path>, num_threads: usize) -> Result<OrtEngine> {
    OrtEngine::load(path, num_threads)
}

fn tensor_dims(value_type: &ValueType) -> Option<Vec<i64>> {
    match value_type {
        ValueType::Tensor { shape, .. } => Some(shape.iter().copied().collect()),
        _ => None,
    }
}

impl OrtEngine {
    pub fn load(path: impl AsRef<Path>, num_threads: usize) -> Result<Self> {
        let path = path.as_ref();
        let model_path = path.display().to_string();
        let load_err = |e: &dyn Display| DetectError::ModelLoad {
            path: model_path.clone(),
            reason: e.to_string(),
        };

        if !path.is_file() {
            return Err(load_err(&"file not found"));
        }

        let session = Session::builder()
            .map_err(|e| load_err(&e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(&e))?
            .with_intra_threads(num_threads.max(1))
            .map_err(|e| load_err(&e))?
            .commit_from_file(path)
            .map_err(|e| load_err(&e))?;

        let input = session
            .inputs
            .first()
            .and_then(|i| tensor_dims(&i.input_type))
            .ok_or_else(|| DetectError::ModelShape("model has no tensor input".into()))?;
        let output = session
            .outputs
            .first()
            .and_then(|o| tensor_dims(&o.output_type))
            .ok_or_else(|| DetectError::ModelShape("model has no tensor output".into()))?;

        // 动态 batch 维按 1 处理, 其余动态维度无法推断
        let geometry = ModelGeometry::from_shapes(&fix_batch(input), &fix_batch(output))?;

        log::info!("✅ 模型加载成功: {}", model_path);
        log::info!(
            "   输入 {}x{} ({:?}) | 输出 [1, {}, {}] | {} 类 | 线程 {}",
            geometry.width(),
            geometry.height(),
            geometry.layout(),
            geometry.num_channel(),
            geometry.num_elements(),
            geometry.num_classes(),
            num_threads.max(1)
        );

        Ok(Self {
            session,
            geometry,
            model_path,
        })
    }

    pub fn model_path(&self) -> &str {
        &self.model_path
    }
}

fn fix_batch(mut shape: Vec<i64>) -> Vec<i64> {
    if let Some(b) = shape.first_mut() {
        if *b <= 0 {
            *b = 1;
        }
    }
    shape
}

impl InferenceEngine for OrtEngine {
    fn name(&self) -> &str {
        "onnxruntime"
    }

    fn geometry(&self) -> &ModelGeometry {
        &self.geometry
    }

    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
        let infer_err = |e: &dyn Display| DetectError::Inference(e.to_string());

        let tensor = TensorRef::from_array_view(input).map_err(|e| infer_err(&e))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| infer_err(&e))?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| infer_err(&e))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        let (b, c, n) = match dims.as_slice() {
            [b, c, n] => (*b, *c, *n),
            _ => {
                return Err(DetectError::OutputShape {
                    expected: self.geometry.output_shape(),
                    got: dims,
                })
            }
        };
        Array3::from_shape_vec((b, c, n), data.to_vec()).map_err(|e| infer_err(&e))
    }
}
