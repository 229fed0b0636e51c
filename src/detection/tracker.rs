// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 目标数量追踪 (Object count tracker)
//!
//! 每帧按类别统计数量, 与上一帧对比:
//! - 新类别或数量变化 → 播报 `"{count} {class}"`
//! - 数量不变 → 不播报
//! - 本帧缺失的类别 → 静默移除

use std::collections::HashMap;

use super::types::{Announcement, Detection};

#[derive(Debug, Default)]
pub struct ObjectTracker {
    tracked: HashMap<String, usize>,
}

impl ObjectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用本帧 (已 NMS) 的检测结果更新状态, 返回播报事件
    ///
    /// 事件按类别在 `detections` 中首次出现的顺序排列, 每个类别每帧至多一条.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<Announcement> {
        // 保持首次出现顺序
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for d in detections {
            let name = d.class_name().trim();
            if name.is_empty() {
                continue;
            }
            let count = counts.entry(name).or_insert(0);
            if *count == 0 {
                order.push(name);
            }
            *count += 1;
        }

        let mut events = Vec::new();
        for name in order {
            let count = counts[name];
            match self.tracked.get_mut(name) {
                Some(last) if *last == count => {}
                Some(last) => {
                    *last = count;
                    events.push(Announcement {
                        class_name: name.to_string(),
                        count,
                    });
                }
                None => {
                    self.tracked.insert(name.to_string(), count);
                    events.push(Announcement {
                        class_name: name.to_string(),
                        count,
                    });
                }
            }
        }

        self.tracked.retain(|label, _| {
            let keep = counts.contains_key(label.as_str());
            if !keep {
                log::debug!("目标移除: {}", label);
            }
            keep
        });

        for e in &events {
            log::debug!("播报: {}", e);
        }
        log::trace!("当前追踪: {:?}", self.tracked);

        events
    }

    /// 当前 类别 → 数量 快照
    pub fn tracked(&self) -> &HashMap<String, usize> {
        &self.tracked
    }

    pub fn count_of(&self, class_name: &str) -> Option<usize> {
        self.tracked.get(class_name).copied()
    }

    pub fn clear(&mut self) {
        self.tracked.clear();
    }
}
