// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测工作线程
//!
//! 帧源线程通过 [`FrameSlot`] 投递 (只保留最新帧), 工作线程逐帧处理, 结果分两路发出:
//! - presentation: 每帧一个 [`FrameOutcome`] (成功结果或本帧错误)
//! - narration:    数量变化事件, 纯文本 `"{count} {class}"`
//!
//! 追踪器一旦记下新数量, 对应事件就必须送达, 因此 narration 通道不设上限.
//! presentation 只关心最新画面, 订阅者跟不上时丢弃并计数.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};

use super::{DetectionPipeline, FrameReport};
use crate::detection::category::SharedCategories;
use crate::error::{DetectError, Result};
use crate::input::frame::{frame_slot, Frame, FrameSlot};

/// 单帧输出: 空结果是 `Ok`, 推理失败是 `Err`
pub type FrameOutcome = std::result::Result<FrameReport, DetectError>;

const PRESENTATION_CAPACITY: usize = 60;

/// 工作线程的两路输出, 各自只有一个订阅者
pub struct WorkerOutputs {
    pub presentation: Receiver<FrameOutcome>,
    pub narration: Receiver<String>,
}

pub struct DetectionWorker {
    slot: FrameSlot,
    categories: SharedCategories,
    dropped_outcomes: Arc<AtomicU64>,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    /// 把流水线移交给专用线程
    pub fn spawn(pipeline: DetectionPipeline) -> (Self, WorkerOutputs) {
        let (slot, frames) = frame_slot();
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (tx_present, rx_present) = bounded(PRESENTATION_CAPACITY);
        let (tx_narrate, rx_narrate) = unbounded();
        let categories = pipeline.categories();
        let dropped_outcomes = Arc::new(AtomicU64::new(0));

        let presentation = Presentation {
            tx: tx_present,
            dropped: dropped_outcomes.clone(),
        };
        let handle = std::thread::spawn(move || {
            worker_loop(pipeline, frames, stop_rx, presentation, tx_narrate);
        });

        (
            Self {
                slot,
                categories,
                dropped_outcomes,
                stop_tx: Some(stop_tx),
                handle: Some(handle),
            },
            WorkerOutputs {
                presentation: rx_present,
                narration: rx_narrate,
            },
        )
    }

    /// 投递一帧; 尚未处理的旧帧会被替换
    pub fn submit(&self, frame: Frame) -> Result<()> {
        self.slot.submit(frame)
    }

    /// 投递端句柄, 可交给帧源线程
    pub fn slot(&self) -> FrameSlot {
        self.slot.clone()
    }

    /// 是否还有帧尚未被工作线程取走
    pub fn has_pending(&self) -> bool {
        self.slot.is_pending()
    }

    /// 被新帧取代而丢弃的帧数
    pub fn dropped_frames(&self) -> u64 {
        self.slot.dropped()
    }

    /// presentation 订阅者跟不上而丢弃的帧结果数
    pub fn dropped_outcomes(&self) -> u64 {
        self.dropped_outcomes.load(Ordering::Relaxed)
    }

    /// 任意线程可调用, 下一帧生效
    pub fn set_selected_categories<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories.set_selected(names);
    }

    pub fn categories(&self) -> SharedCategories {
        self.categories.clone()
    }

    /// 停止接收新帧, 等待当前帧完成, 释放引擎并回收线程; 可重复调用
    pub fn shutdown(&mut self) {
        self.slot.close();
        // 断开停止通道即通知退出
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("❌ 检测线程异常退出");
            }
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// presentation 发送端: 满了就丢弃, 不阻塞检测线程
struct Presentation {
    tx: Sender<FrameOutcome>,
    dropped: Arc<AtomicU64>,
}

impl Presentation {
    fn send(&self, outcome: FrameOutcome) {
        match self.tx.try_send(outcome) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => {
                let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("⚠️ presentation 通道已满, 丢弃帧结果 (累计 {})", n);
            }
        }
    }
}

fn worker_loop(
    mut pipeline: DetectionPipeline,
    frames: Receiver<Frame>,
    stop: Receiver<()>,
    presentation: Presentation,
    narration: Sender<String>,
) {
    log::info!("🔍 检测线程启动");

    loop {
        select! {
            recv(stop) -> _ => break,
            recv(frames) -> msg => {
                let Ok(frame) = msg else { break };
                let outcome = pipeline.process(&frame);
                match &outcome {
                    Ok(report) => {
                        for event in &report.announcements {
                            log::debug!("📢 {}", event);
                            // 订阅者已退出时丢弃即可
                            let _ = narration.send(event.to_string());
                        }
                    }
                    Err(e) => log::warn!("⚠️ 帧处理失败: {}", e),
                }
                presentation.send(outcome);
            }
        }
    }

    pipeline.clear();
    log::info!("检测线程退出");
}
