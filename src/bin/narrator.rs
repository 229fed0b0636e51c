// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测播报器 (Narrator)
//!
//! 以图片序列模拟摄像头帧源:
//! 1. 主线程:   读取图片 → 按固定帧间隔投递 (只保留最新帧)
//! 2. 检测线程: 解码 → 推理 → 解析 → NMS → 数量追踪
//! 3. 展示线程: 打印检测框 (换算到视图像素) 与推理耗时
//! 4. 播报线程: 打印数量变化事件

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use walkdir::WalkDir;

use idt_detect::config::{Args, DetectorConfig};
use idt_detect::engine::{load_labels, load_model};
use idt_detect::input::Frame;
use idt_detect::pipeline::{DetectionPipeline, DetectionWorker, WorkerOutputs};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// 模拟 30 FPS 摄像头
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// 单个文件或目录下的全部图片 (按文件名排序)
fn collect_frames(source: &str) -> Result<Vec<PathBuf>> {
    let root = Path::new(source);
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        bail!("输入源不存在: {}", source);
    }

    let mut frames = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("遍历目录失败: {}", source))?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            frames.push(entry.into_path());
        }
    }
    if frames.is_empty() {
        bail!("目录中没有图片: {}", source);
    }
    Ok(frames)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // 1. 配置: 文件 + 命令行覆盖
    let config = DetectorConfig::load(&args.config)?.merge_args(&args);
    config.validate()?;

    // 2. 加载模型与标签 (失败即退出)
    let engine = load_model(&config.model_path, config.num_threads)
        .with_context(|| format!("加载模型失败: {}", config.model_path))?;
    let labels = load_labels(&config.labels_path)
        .with_context(|| format!("加载标签失败: {}", config.labels_path))?;
    let pipeline = DetectionPipeline::with_config(Box::new(engine), labels, &config)?;

    let frames = collect_frames(&args.source)?;
    log::info!("🎬 输入源 {} ({} 帧)", args.source, frames.len());

    // 3. 启动检测线程与两个订阅者
    let (mut worker, outputs) = DetectionWorker::spawn(pipeline);
    let WorkerOutputs {
        presentation,
        narration,
    } = outputs;

    let (view_w, view_h) = (args.view_width as f32, args.view_height as f32);
    let presenter = std::thread::spawn(move || {
        let mut failures = 0u64;
        for outcome in presentation.iter() {
            match outcome {
                Ok(report) if report.result.is_empty() => {
                    log::info!(
                        "⬜ 无检测 | 推理 {:.2}ms",
                        report.inference_time.as_secs_f64() * 1000.0
                    );
                }
                Ok(report) => {
                    log::info!(
                        "🎯 {} 个目标 | 推理 {:.2}ms | {:.1} FPS",
                        report.result.len(),
                        report.inference_time.as_secs_f64() * 1000.0,
                        report.fps
                    );
                    for d in report.result.detections() {
                        let (l, t, r, b) = d.to_view_rect(view_w, view_h);
                        log::info!(
                            "   {} {:.2} [{:.0}, {:.0}, {:.0}, {:.0}]",
                            d.class_name(),
                            d.confidence(),
                            l,
                            t,
                            r,
                            b
                        );
                    }
                }
                Err(e) => {
                    failures += 1;
                    log::error!("❌ 推理失败: {}", e);
                }
            }
        }
        failures
    });
    let narrator = std::thread::spawn(move || {
        for text in narration.iter() {
            log::info!("🔊 {}", text);
        }
    });

    // 4. 投递帧
    for path in &frames {
        let image = match image::open(path) {
            Ok(image) => image.to_rgba8(),
            Err(e) => {
                log::warn!("⚠️ 跳过 {}: {}", path.display(), e);
                continue;
            }
        };
        let frame = match Frame::from_rgba_image(image) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("⚠️ 跳过 {}: {}", path.display(), e);
                continue;
            }
        };
        worker.submit(frame)?;
        std::thread::sleep(FRAME_INTERVAL);
    }

    // 等最后一帧被取走, shutdown 会等它处理完
    while worker.has_pending() {
        std::thread::sleep(Duration::from_millis(5));
    }
    let dropped = worker.dropped_frames();
    worker.shutdown();

    let failures = presenter.join().unwrap_or(0);
    let _ = narrator.join();
    log::info!(
        "✅ 完成: {} 帧, 丢弃 {} 帧, 失败 {} 帧",
        frames.len(),
        dropped,
        failures
    );
    Ok(())
}
