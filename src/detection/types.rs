// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测系统数据结构定义
//! Data structures for the detection pipeline

use std::fmt;

use crate::error::{DetectError, Result};

// ========== 公共常量 ==========

/// 类别置信度阈值 (严格大于才保留)
pub const CONFIDENCE_THRESHOLD: f32 = 0.45;

/// NMS IoU 阈值 (大于等于即抑制)
pub const IOU_THRESHOLD: f32 = 0.6;

/// 像素归一化: (p - mean) / scale
pub const INPUT_MEAN: f32 = 0.0;
pub const INPUT_SCALE: f32 = 255.0;

/// 输入图像通道数 (RGB)
pub const INPUT_CHANNELS: usize = 3;

/// 输出张量前4个通道为 cx, cy, w, h
pub const CXYWH_OFFSET: usize = 4;

// ========== 数据结构 ==========

/// 检测框 (归一化坐标, 0..1)
///
/// 只能通过 [`Detection::from_cxcywh`] 构造, 保证 `0 <= x1 < x2 <= 1`,
/// `0 <= y1 < y2 <= 1`. 越界框直接丢弃, 不做裁剪.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    cx: f32,
    cy: f32,
    w: f32,
    h: f32,
    confidence: f32,
    class_id: usize,
    class_name: String,
}

impl Detection {
    /// 中心点格式 → 角点格式; 任一角点超出 [0,1] 或宽高非正时返回 None
    pub fn from_cxcywh(
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        confidence: f32,
        class_id: usize,
        class_name: impl Into<String>,
    ) -> Option<Self> {
        let x1 = cx - w / 2.;
        let y1 = cy - h / 2.;
        let x2 = cx + w / 2.;
        let y2 = cy + h / 2.;

        let unit = 0.0f32..=1.0;
        if !(unit.contains(&x1) && unit.contains(&y1) && unit.contains(&x2) && unit.contains(&y2))
        {
            return None;
        }
        if x1 >= x2 || y1 >= y2 {
            return None;
        }

        Some(Self {
            x1,
            y1,
            x2,
            y2,
            cx,
            cy,
            w,
            h,
            confidence,
            class_id,
            class_name: class_name.into(),
        })
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn cx(&self) -> f32 {
        self.cx
    }

    pub fn cy(&self) -> f32 {
        self.cy
    }

    pub fn width(&self) -> f32 {
        self.w
    }

    pub fn height(&self) -> f32 {
        self.h
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn class_id(&self) -> usize {
        self.class_id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// 角点计算的面积
    pub fn area(&self) -> f32 {
        (self.x2 - self.x1) * (self.y2 - self.y1)
    }

    pub fn intersection_area(&self, another: &Detection) -> f32 {
        let l = self.x1.max(another.x1);
        let r = self.x2.min(another.x2);
        let t = self.y1.max(another.y1);
        let b = self.y2.min(another.y2);
        (r - l).max(0.) * (b - t).max(0.)
    }

    pub fn union(&self, another: &Detection) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Detection) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }

    /// 缩放到显示视图像素坐标 (left, top, right, bottom)
    pub fn to_view_rect(&self, view_width: f32, view_height: f32) -> (f32, f32, f32, f32) {
        (
            self.x1 * view_width,
            self.y1 * view_height,
            self.x2 * view_width,
            self.y2 * view_height,
        )
    }
}

/// 输入张量内存布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// [1, H, W, 3] (TFLite 导出)
    Nhwc,
    /// [1, 3, H, W] (ONNX 导出)
    Nchw,
}

/// 模型几何参数, 加载模型时确定, 之后不可变
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelGeometry {
    width: usize,
    height: usize,
    layout: TensorLayout,
    num_channel: usize,
    num_elements: usize,
}

impl ModelGeometry {
    pub fn new(
        width: usize,
        height: usize,
        layout: TensorLayout,
        num_channel: usize,
        num_elements: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DetectError::ModelShape(format!(
                "input size must be positive, got {}x{}",
                width, height
            )));
        }
        if num_channel <= CXYWH_OFFSET {
            return Err(DetectError::ModelShape(format!(
                "output needs more than {} channels, got {}",
                CXYWH_OFFSET, num_channel
            )));
        }
        if num_elements == 0 {
            return Err(DetectError::ModelShape("output has no candidate slots".into()));
        }
        Ok(Self {
            width,
            height,
            layout,
            num_channel,
            num_elements,
        })
    }

    /// 从模型输入/输出形状推断几何参数
    ///
    /// 输入支持 `[1,H,W,3]` 与 `[1,3,H,W]`, 输出必须为 `[1,C,N]`.
    /// 动态维度 (<=0) 视为无法识别.
    pub fn from_shapes(input: &[i64], output: &[i64]) -> Result<Self> {
        let dims = |shape: &[i64]| -> Result<Vec<usize>> {
            shape
                .iter()
                .map(|&d| {
                    if d > 0 {
                        Ok(d as usize)
                    } else {
                        Err(DetectError::ModelShape(format!(
                            "dynamic dimension in shape {:?}",
                            shape
                        )))
                    }
                })
                .collect()
        };
        let input = dims(input)?;
        let output = dims(output)?;

        let (layout, height, width) = match input.as_slice() {
            [1, c, h, w] if *c == INPUT_CHANNELS => (TensorLayout::Nchw, *h, *w),
            [1, h, w, c] if *c == INPUT_CHANNELS => (TensorLayout::Nhwc, *h, *w),
            _ => {
                return Err(DetectError::ModelShape(format!(
                    "input shape {:?} is neither [1,H,W,3] nor [1,3,H,W]",
                    input
                )))
            }
        };

        let (num_channel, num_elements) = match output.as_slice() {
            [1, c, n] => (*c, *n),
            _ => {
                return Err(DetectError::ModelShape(format!(
                    "output shape {:?} is not [1,C,N]",
                    output
                )))
            }
        };

        Self::new(width, height, layout, num_channel, num_elements)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn num_channel(&self) -> usize {
        self.num_channel
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    pub fn num_classes(&self) -> usize {
        self.num_channel - CXYWH_OFFSET
    }

    pub fn input_shape(&self) -> [usize; 4] {
        match self.layout {
            TensorLayout::Nhwc => [1, self.height, self.width, INPUT_CHANNELS],
            TensorLayout::Nchw => [1, INPUT_CHANNELS, self.height, self.width],
        }
    }

    pub fn output_shape(&self) -> [usize; 3] {
        [1, self.num_channel, self.num_elements]
    }
}

/// 单帧结果
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FrameResult {
    /// 过滤后没有任何检测
    #[default]
    Empty,
    Detections(Vec<Detection>),
}

impl FrameResult {
    pub fn detections(&self) -> &[Detection] {
        match self {
            FrameResult::Empty => &[],
            FrameResult::Detections(d) => d,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FrameResult::Empty)
    }

    pub fn len(&self) -> usize {
        self.detections().len()
    }
}

impl From<Vec<Detection>> for FrameResult {
    fn from(detections: Vec<Detection>) -> Self {
        if detections.is_empty() {
            FrameResult::Empty
        } else {
            FrameResult::Detections(detections)
        }
    }
}

/// 播报事件: 某类别新出现或数量变化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub class_name: String,
    pub count: usize,
}

impl fmt::Display for Announcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.count, self.class_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cxcywh_corners() {
        let d = Detection::from_cxcywh(0.5, 0.5, 0.2, 0.4, 0.9, 3, "door").unwrap();
        assert!((d.x1() - 0.4).abs() < 1e-6);
        assert!((d.y1() - 0.3).abs() < 1e-6);
        assert!((d.x2() - 0.6).abs() < 1e-6);
        assert!((d.y2() - 0.7).abs() < 1e-6);
        assert_eq!(d.class_id(), 3);
        assert_eq!(d.class_name(), "door");
    }

    #[test]
    fn test_out_of_range_box_rejected() {
        // 左边界 -0.05
        assert!(Detection::from_cxcywh(0.05, 0.5, 0.2, 0.2, 0.9, 0, "door").is_none());
        // 下边界 1.1
        assert!(Detection::from_cxcywh(0.5, 0.9, 0.2, 0.4, 0.9, 0, "door").is_none());
        // 零宽
        assert!(Detection::from_cxcywh(0.5, 0.5, 0.0, 0.4, 0.9, 0, "door").is_none());
        assert!(Detection::from_cxcywh(f32::NAN, 0.5, 0.1, 0.1, 0.9, 0, "door").is_none());
    }

    #[test]
    fn test_full_frame_box_accepted() {
        assert!(Detection::from_cxcywh(0.5, 0.5, 1.0, 1.0, 0.9, 0, "door").is_some());
    }

    #[test]
    fn test_iou() {
        let a = Detection::from_cxcywh(0.25, 0.25, 0.5, 0.5, 0.9, 0, "a").unwrap();
        let b = Detection::from_cxcywh(0.75, 0.75, 0.5, 0.5, 0.9, 0, "a").unwrap();
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);

        // 一半重叠: 交 0.125, 并 0.375
        let c = Detection::from_cxcywh(0.5, 0.25, 0.5, 0.5, 0.9, 0, "a").unwrap();
        assert!((a.iou(&c) - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_view_rect() {
        let d = Detection::from_cxcywh(0.5, 0.5, 0.5, 0.5, 0.9, 0, "a").unwrap();
        assert_eq!(d.to_view_rect(400., 800.), (100., 200., 300., 600.));
    }

    #[test]
    fn test_geometry_from_nhwc() {
        let g = ModelGeometry::from_shapes(&[1, 640, 640, 3], &[1, 9, 8400]).unwrap();
        assert_eq!(g.layout(), TensorLayout::Nhwc);
        assert_eq!(g.num_classes(), 5);
        assert_eq!(g.input_shape(), [1, 640, 640, 3]);
        assert_eq!(g.output_shape(), [1, 9, 8400]);
    }

    #[test]
    fn test_geometry_from_nchw() {
        let g = ModelGeometry::from_shapes(&[1, 3, 320, 480], &[1, 84, 2100]).unwrap();
        assert_eq!(g.layout(), TensorLayout::Nchw);
        assert_eq!(g.height(), 320);
        assert_eq!(g.width(), 480);
        assert_eq!(g.num_elements(), 2100);
    }

    #[test]
    fn test_geometry_rejects_bad_shapes() {
        assert!(ModelGeometry::from_shapes(&[1, 3, -1, 640], &[1, 84, 8400]).is_err());
        assert!(ModelGeometry::from_shapes(&[1, 640, 640], &[1, 84, 8400]).is_err());
        assert!(ModelGeometry::from_shapes(&[1, 640, 640, 3], &[84, 8400]).is_err());
        assert!(ModelGeometry::from_shapes(&[1, 640, 640, 3], &[1, 4, 8400]).is_err());
    }

    #[test]
    fn test_frame_result_from_vec() {
        assert_eq!(FrameResult::from(Vec::new()), FrameResult::Empty);
        let d = Detection::from_cxcywh(0.5, 0.5, 0.2, 0.2, 0.9, 0, "door").unwrap();
        let r = FrameResult::from(vec![d]);
        assert_eq!(r.len(), 1);
        assert!(!r.is_empty());
    }

    #[test]
    fn test_announcement_display() {
        let a = Announcement {
            class_name: "exit_sign".into(),
            count: 2,
        };
        assert_eq!(a.to_string(), "2 exit_sign");
    }
}
