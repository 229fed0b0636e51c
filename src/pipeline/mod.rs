// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测流水线 (Detection Pipeline)
//!
//! 每帧顺序执行, 不并行:
//!
//! ```text
//! Frame → FrameDecoder → InferenceEngine → OutputParser(+类别过滤) → NMS → ObjectTracker
//!                                                                      ↓
//!                                                        FrameReport + 播报事件
//! ```
//!
//! 引擎与追踪状态只属于流水线本身; 唯一跨线程共享的是类别过滤集合.

pub mod worker;

use std::time::{Duration, Instant};

use crate::config::DetectorConfig;
use crate::detection::category::{CategorySelection, SharedCategories};
use crate::detection::parser::OutputParser;
use crate::detection::suppress::suppress;
use crate::detection::tracker::ObjectTracker;
use crate::detection::types::{Announcement, FrameResult, IOU_THRESHOLD};
use crate::engine::{InferenceEngine, ModelSpec};
use crate::error::{DetectError, Result};
use crate::input::decoder::FrameDecoder;
use crate::input::frame::Frame;

pub use worker::{DetectionWorker, FrameOutcome, WorkerOutputs};

/// 单帧处理结果 (流水线 → 展示层)
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub result: FrameResult,
    /// 仅引擎调用的耗时, 只用于显示
    pub inference_time: Duration,
    /// 本帧的数量变化事件
    pub announcements: Vec<Announcement>,
    /// 最近一秒的处理帧率
    pub fps: f64,
}

pub struct DetectionPipeline {
    engine: Option<Box<dyn InferenceEngine>>,
    spec: ModelSpec,
    decoder: FrameDecoder,
    parser: OutputParser,
    iou_threshold: f32,
    categories: SharedCategories,
    tracker: ObjectTracker,

    // 统计
    count: u64,
    frames: u64,
    last: Instant,
    current_fps: f64,
}

impl DetectionPipeline {
    /// 默认阈值与归一化参数
    pub fn new(engine: Box<dyn InferenceEngine>, labels: Vec<String>) -> Result<Self> {
        Self::with_config(engine, labels, &DetectorConfig::default())
    }

    /// 按配置构建; 标签数与模型类别数不符时失败
    pub fn with_config(
        engine: Box<dyn InferenceEngine>,
        labels: Vec<String>,
        config: &DetectorConfig,
    ) -> Result<Self> {
        config.validate()?;
        let geometry = *engine.geometry();
        let spec = ModelSpec::new(geometry, labels)?;
        let decoder =
            FrameDecoder::with_normalization(geometry, config.input_mean, config.input_scale);

        let selection = CategorySelection::new(&config.categories);
        if !selection.is_empty() {
            log::info!("🏷️ 类别过滤: {:?}", selection.names().collect::<Vec<_>>());
        }
        log::info!(
            "✅ 检测流水线就绪: 引擎 {} | conf {} | iou {}",
            engine.name(),
            config.confidence_threshold,
            config.iou_threshold
        );

        Ok(Self {
            engine: Some(engine),
            spec,
            decoder,
            parser: OutputParser::new(config.confidence_threshold),
            iou_threshold: config.iou_threshold,
            categories: SharedCategories::new(selection),
            tracker: ObjectTracker::new(),
            count: 0,
            frames: 0,
            last: Instant::now(),
            current_fps: 0.0,
        })
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn tracker(&self) -> &ObjectTracker {
        &self.tracker
    }

    /// 类别过滤集合的共享句柄, 可交给 UI 线程
    pub fn categories(&self) -> SharedCategories {
        self.categories.clone()
    }

    /// 整体替换允许的类别 (规范化后), 下一帧生效
    pub fn set_selected_categories<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories.set_selected(names);
    }

    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }

    /// 处理一帧: 解码 → 推理 → 解析 → NMS → 追踪
    ///
    /// 推理失败直接返回错误, 不会当作空结果; 此时追踪状态保持不变.
    pub fn process(&mut self, frame: &Frame) -> Result<FrameReport> {
        let engine = self.engine.as_mut().ok_or(DetectError::EngineReleased)?;

        let input = self.decoder.prepare(frame)?;

        let start = Instant::now();
        let output = engine.run(input.view())?;
        let inference_time = start.elapsed();

        // 解析时取快照, 替换只对下一帧可见
        let categories = self.categories.snapshot();
        let detections = self.parser.parse(
            output.view(),
            self.spec.geometry(),
            self.spec.labels(),
            &categories,
        )?;
        let detections = suppress(detections, self.iou_threshold);
        let announcements = self.tracker.update(&detections);

        let fps = self.update_stats(inference_time, detections.len());

        Ok(FrameReport {
            result: FrameResult::from(detections),
            inference_time,
            announcements,
            fps,
        })
    }

    fn update_stats(&mut self, inference_time: Duration, survivors: usize) -> f64 {
        self.count += 1;
        self.frames += 1;

        let elapsed = self.last.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.current_fps = self.count as f64 / elapsed.as_secs_f64();
            self.count = 0;
            self.last = Instant::now();
        }

        if self.frames % 30 == 0 {
            log::debug!(
                "📊 帧 {} | {:.1} FPS | 推理 {:.2}ms | 检测 {}",
                self.frames,
                self.current_fps,
                inference_time.as_secs_f64() * 1000.0,
                survivors
            );
        }
        self.current_fps
    }

    /// 释放推理引擎并清空追踪状态; 可重复调用
    pub fn clear(&mut self) {
        if let Some(engine) = self.engine.take() {
            log::info!("🛑 释放推理引擎 {} (共处理 {} 帧)", engine.name(), self.frames);
        }
        self.tracker.clear();
    }
}

impl Drop for DetectionPipeline {
    fn drop(&mut self) {
        self.clear();
    }
}
