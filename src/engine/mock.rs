// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 测试用推理引擎
//! - [`ScriptedEngine`]: 按脚本依次返回输出, 用完后重复最后一条
//! - [`GatedEngine`]: 推理阻塞到测试放行为止, 并记录释放时机

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use ndarray::{Array3, ArrayView4};

use super::InferenceEngine;
use crate::detection::types::{ModelGeometry, TensorLayout};
use crate::error::{DetectError, Result};

/// 标签: door, exit sign, Stair
pub(crate) fn labels() -> Vec<String> {
    vec!["door".into(), "exit sign".into(), "Stair".into()]
}

/// 8x8 NHWC 输入, 3 类, 4 个候选位
pub(crate) fn geometry() -> ModelGeometry {
    ModelGeometry::new(8, 8, TensorLayout::Nhwc, 7, 4).unwrap()
}

/// 一个候选位: (cx, cy, w, h, class, score)
pub(crate) type Slot = (f32, f32, f32, f32, usize, f32);

/// 按候选位构造 `[1, 7, 4]` 输出张量, 未指定的位全为 0
pub(crate) fn output(slots: &[Slot]) -> Array3<f32> {
    let g = geometry();
    let mut out = Array3::<f32>::zeros((1, g.num_channel(), g.num_elements()));
    for (i, &(cx, cy, w, h, class, score)) in slots.iter().enumerate() {
        out[[0, 0, i]] = cx;
        out[[0, 1, i]] = cy;
        out[[0, 2, i]] = w;
        out[[0, 3, i]] = h;
        out[[0, 4 + class, i]] = score;
    }
    out
}

/// `None` 表示该次调用失败
pub(crate) struct ScriptedEngine {
    geometry: ModelGeometry,
    script: VecDeque<Option<Array3<f32>>>,
    last: Option<Array3<f32>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub(crate) fn new(script: Vec<Option<Array3<f32>>>) -> Self {
        Self {
            geometry: geometry(),
            script: script.into(),
            last: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn repeat(output: Array3<f32>) -> Self {
        Self::new(vec![Some(output)])
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl InferenceEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    fn geometry(&self) -> &ModelGeometry {
        &self.geometry
    }

    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.shape(), &self.geometry.input_shape()[..]);
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
            .clone()
            .ok_or_else(|| DetectError::Inference("scripted failure".into()))
    }
}

/// 每次 `run` 先通知已开始, 再等待放行
pub(crate) struct GatedEngine {
    geometry: ModelGeometry,
    output: Array3<f32>,
    started: Sender<()>,
    release: Receiver<()>,
    finished: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
    dropped_after_run: Arc<AtomicBool>,
}

/// 测试端控制句柄
pub(crate) struct EngineGate {
    started: Receiver<()>,
    release: Sender<()>,
    dropped: Arc<AtomicBool>,
    dropped_after_run: Arc<AtomicBool>,
}

impl GatedEngine {
    pub(crate) fn new(output: Array3<f32>) -> (Self, EngineGate) {
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let (release_tx, release_rx) = crossbeam_channel::unbounded();
        let dropped = Arc::new(AtomicBool::new(false));
        let dropped_after_run = Arc::new(AtomicBool::new(false));
        (
            Self {
                geometry: geometry(),
                output,
                started: started_tx,
                release: release_rx,
                finished: Arc::new(AtomicBool::new(false)),
                dropped: dropped.clone(),
                dropped_after_run: dropped_after_run.clone(),
            },
            EngineGate {
                started: started_rx,
                release: release_tx,
                dropped,
                dropped_after_run,
            },
        )
    }
}

impl InferenceEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    fn geometry(&self) -> &ModelGeometry {
        &self.geometry
    }

    fn run(&mut self, _input: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
        self.finished.store(false, Ordering::SeqCst);
        let _ = self.started.send(());
        // 句柄被丢弃时直接放行
        let _ = self.release.recv();
        self.finished.store(true, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

impl Drop for GatedEngine {
    fn drop(&mut self) {
        self.dropped_after_run
            .store(self.finished.load(Ordering::SeqCst), Ordering::SeqCst);
        self.dropped.store(true, Ordering::SeqCst);
    }
}

impl EngineGate {
    /// 等待一次 `run` 进入阻塞
    pub(crate) fn wait_started(&self, timeout: Duration) -> bool {
        self.started.recv_timeout(timeout).is_ok()
    }

    pub(crate) fn release(&self) {
        let _ = self.release.send(());
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    /// 引擎释放时最后一次 `run` 是否已经返回
    pub(crate) fn dropped_after_run(&self) -> bool {
        self.dropped_after_run.load(Ordering::SeqCst)
    }
}
