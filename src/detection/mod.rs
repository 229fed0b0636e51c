/// 检测系统 (Detection System)
///
/// 模型输出 → 候选框 → 类别过滤 → NMS → 数量追踪
/// - Parser:   输出张量解码
/// - Suppress: 非极大值抑制
/// - Tracker:  类别数量变化播报
pub mod category;
pub mod parser;
pub mod suppress;
pub mod tracker;
pub mod types;

pub use category::{normalize_category, CategorySelection, SharedCategories, DEFAULT_CATEGORIES};
pub use parser::OutputParser;
pub use suppress::{non_max_suppression, suppress};
pub use tracker::ObjectTracker;
pub use types::{Announcement, Detection, FrameResult, ModelGeometry, TensorLayout};
