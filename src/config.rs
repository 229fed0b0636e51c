// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器配置 - 命令行参数 + JSON文件

use std::fs;
use std::path::Path;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::detection::types::{CONFIDENCE_THRESHOLD, INPUT_MEAN, INPUT_SCALE, IOU_THRESHOLD};
use crate::error::{DetectError, Result};

/// 命令行参数
#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "实时目标检测 + 数量变化播报", long_about = None)]
pub struct Args {
    /// JSON 配置文件
    #[arg(long, default_value = "detector.json")]
    pub config: String,

    /// ONNX 模型路径 (覆盖配置文件)
    #[arg(short, long)]
    pub model: Option<String>,

    /// 标签文件路径 (覆盖配置文件)
    #[arg(short, long)]
    pub labels: Option<String>,

    /// 输入图片或图片目录 (按文件名顺序作为帧序列)
    #[arg(short, long, default_value = "frames")]
    pub source: String,

    /// 只检测这些类别, 可重复 (例如 --category door --category "exit sign")
    #[arg(short, long)]
    pub category: Vec<String>,

    /// 类别置信度阈值
    #[arg(long)]
    pub conf: Option<f32>,

    /// NMS IoU 阈值
    #[arg(long)]
    pub iou: Option<f32>,

    /// 推理线程数
    #[arg(long)]
    pub threads: Option<usize>,

    /// 显示视图宽度 (像素), 用于换算检测框
    #[arg(long, default_value_t = 1080)]
    pub view_width: u32,

    /// 显示视图高度 (像素)
    #[arg(long, default_value_t = 1920)]
    pub view_height: u32,
}

/// 检测器参数配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: String,
    pub labels_path: String,

    // === 检测参数 ===
    pub confidence_threshold: f32, // 类别置信度阈值
    pub iou_threshold: f32,        // NMS IOU阈值

    // === 预处理 ===
    pub input_mean: f32,
    pub input_scale: f32,

    pub num_threads: usize,

    /// 初始类别过滤, 空表示全部
    pub categories: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "model.onnx".to_string(),
            labels_path: "labels.txt".to_string(),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            iou_threshold: IOU_THRESHOLD,
            input_mean: INPUT_MEAN,
            input_scale: INPUT_SCALE,
            num_threads: 4,
            categories: Vec::new(),
        }
    }
}

impl DetectorConfig {
    /// 从JSON文件加载配置; 文件不存在时使用默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("配置文件 {} 不存在, 使用默认值", path.display());
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)
            .map_err(|e| DetectError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| DetectError::Config(format!("{}: {}", path.display(), e)))?;
        log::info!("✅ 配置已从 {} 加载", path.display());
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| DetectError::Config(e.to_string()))?;
        fs::write(path.as_ref(), json)
            .map_err(|e| DetectError::Config(format!("{}: {}", path.as_ref().display(), e)))
    }

    /// 命令行参数覆盖配置文件
    pub fn merge_args(mut self, args: &Args) -> Self {
        if let Some(model) = &args.model {
            self.model_path = model.clone();
        }
        if let Some(labels) = &args.labels {
            self.labels_path = labels.clone();
        }
        if let Some(conf) = args.conf {
            self.confidence_threshold = conf;
        }
        if let Some(iou) = args.iou {
            self.iou_threshold = iou;
        }
        if let Some(threads) = args.threads {
            self.num_threads = threads;
        }
        if !args.category.is_empty() {
            self.categories = args.category.clone();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let unit = 0.0f32..=1.0;
        if !unit.contains(&self.confidence_threshold) {
            return Err(DetectError::Config(format!(
                "confidence_threshold {} not in [0, 1]",
                self.confidence_threshold
            )));
        }
        if !unit.contains(&self.iou_threshold) {
            return Err(DetectError::Config(format!(
                "iou_threshold {} not in [0, 1]",
                self.iou_threshold
            )));
        }
        if self.input_scale == 0.0 || !self.input_scale.is_finite() {
            return Err(DetectError::Config("input_scale must be non-zero".into()));
        }
        Ok(())
    }
}
