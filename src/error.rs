// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测流水线错误类型
//! Error taxonomy of the detection pipeline
//!
//! - 初始化失败 (模型/标签/张量形状): 致命, 流水线不可再用
//! - 推理失败: 仅当前帧失败, 向上传递, 不会被当作"无检测"
//! - 越界框不是错误, 由解析器静默丢弃

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    /// 模型文件无法读取或无法构建推理会话
    #[error("failed to load model `{path}`: {reason}")]
    ModelLoad { path: String, reason: String },

    /// 标签文件无法读取
    #[error("failed to load labels `{path}`: {source}")]
    LabelsLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 输入/输出张量形状无法识别, 或与标签数量不一致
    #[error("unexpected model shape: {0}")]
    ModelShape(String),

    /// 推理引擎调用失败
    #[error("inference failed: {0}")]
    Inference(String),

    /// 推理输出与 ModelGeometry 不匹配
    #[error("output tensor shape {got:?} does not match expected {expected:?}")]
    OutputShape {
        expected: [usize; 3],
        got: Vec<usize>,
    },

    /// clear() 之后继续调用
    #[error("inference engine already released")]
    EngineReleased,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("detection worker stopped")]
    WorkerStopped,
}

impl DetectError {
    /// 是否属于初始化阶段的致命错误
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            DetectError::ModelLoad { .. } | DetectError::LabelsLoad { .. } | DetectError::ModelShape(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DetectError>;
