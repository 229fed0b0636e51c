// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 推理引擎接口与模型描述
//!
//! # 架构说明
//!
//! 推理引擎是一个同步、可能较慢的纯函数: 固定形状的输入张量 → 固定形状的输出张量.
//! 流水线只通过 [`InferenceEngine`] 访问它, 具体运行时 (ONNX Runtime 等) 在
//! 子模块中实现.
//!
//! ```text
//! load_model(path)  → ModelGeometry + 引擎句柄
//! load_labels(path) → Vec<String>
//!          ↓
//!     ModelSpec (不可变)
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::{Array3, ArrayView4};

use crate::detection::types::ModelGeometry;
use crate::error::{DetectError, Result};

#[cfg(feature = "onnx")]
pub mod ort_backend;

#[cfg(feature = "onnx")]
pub use ort_backend::{load_model, OrtEngine};

#[cfg(test)]
pub(crate) mod mock;

/// 统一的推理引擎接口
pub trait InferenceEngine: Send {
    /// 引擎名称 (日志用)
    fn name(&self) -> &str;

    /// 加载时确定的几何参数
    fn geometry(&self) -> &ModelGeometry;

    /// 执行一次前向推理, 输出形状 `[1, C, N]`
    ///
    /// 失败时返回 [`DetectError::Inference`], 由调用方决定如何处理, 不会重试.
    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<Array3<f32>>;
}

/// 读取标签文件: 每行一个类别, 遇到第一个空行停止
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let err = |source| DetectError::LabelsLoad {
        path: path.display().to_string(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(err)?);
    let mut labels = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(err)?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            break;
        }
        labels.push(line.to_string());
    }
    log::info!("✅ 标签加载成功: {} ({} 类)", path.display(), labels.len());
    Ok(labels)
}

/// 模型描述: 几何参数 + 标签, 初始化后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    geometry: ModelGeometry,
    labels: Vec<String>,
}

impl ModelSpec {
    /// 标签数少于输出类别数时视为形状不匹配
    pub fn new(geometry: ModelGeometry, labels: Vec<String>) -> Result<Self> {
        if labels.len() < geometry.num_classes() {
            return Err(DetectError::ModelShape(format!(
                "model has {} classes but only {} labels",
                geometry.num_classes(),
                labels.len()
            )));
        }
        if labels.len() > geometry.num_classes() {
            log::warn!(
                "⚠️ 标签数 {} 多于模型类别数 {}, 多余标签不会出现",
                labels.len(),
                geometry.num_classes()
            );
        }
        Ok(Self { geometry, labels })
    }

    pub fn geometry(&self) -> &ModelGeometry {
        &self.geometry
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::TensorLayout;
    use std::io::Write;

    #[test]
    fn test_load_labels_stops_at_blank_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "door\r\nexit sign\nStair\n\nignored\n").unwrap();
        let labels = load_labels(file.path()).unwrap();
        assert_eq!(labels, vec!["door", "exit sign", "Stair"]);
    }

    #[test]
    fn test_load_labels_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_labels(dir.path().join("labels.txt")).unwrap_err();
        assert!(matches!(err, DetectError::LabelsLoad { .. }));
        assert!(err.is_setup_failure());
    }

    #[test]
    fn test_model_spec_label_count() {
        let geometry = ModelGeometry::new(32, 32, TensorLayout::Nhwc, 7, 4).unwrap();
        let labels = |n: usize| (0..n).map(|i| format!("c{}", i)).collect::<Vec<_>>();
        assert!(ModelSpec::new(geometry, labels(2)).is_err());
        assert!(ModelSpec::new(geometry, labels(3)).is_ok());
        assert!(ModelSpec::new(geometry, labels(4)).is_ok());
    }
}
