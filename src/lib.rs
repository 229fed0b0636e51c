// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 实时目标检测流水线
//!
//! 摄像头帧 → 预处理 → 推理 → YOLOv8 输出解码 → 类别过滤 → NMS → 数量变化播报

pub mod config; // 检测参数配置
pub mod detection; // 解码/过滤/NMS/追踪
pub mod engine; // 推理引擎接口
pub mod error; // 错误类型
pub mod input; // 帧输入与预处理
pub mod pipeline; // 流水线与工作线程

pub use crate::config::{Args, DetectorConfig};
pub use crate::detection::{
    Announcement, CategorySelection, Detection, FrameResult, ModelGeometry, ObjectTracker,
    OutputParser, SharedCategories, TensorLayout,
};
pub use crate::engine::{load_labels, InferenceEngine, ModelSpec};
#[cfg(feature = "onnx")]
pub use crate::engine::{load_model, OrtEngine};
pub use crate::error::{DetectError, Result};
pub use crate::input::{Frame, FrameDecoder, FrameTransform, PixelFormat, Rotation};
pub use crate::pipeline::{
    DetectionPipeline, DetectionWorker, FrameOutcome, FrameReport, WorkerOutputs,
};
