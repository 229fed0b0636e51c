// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 输出张量解码 (YOLOv8 head)
//!
//! 输出布局 `[1, C, N]`: 前4个通道为 `cx, cy, w, h`, 其余 `C-4` 个通道为各类别得分,
//! 每个候选位 (slot) 占一列.

use ndarray::{s, ArrayView3, Axis};

use super::category::CategorySelection;
use super::types::{Detection, ModelGeometry, CONFIDENCE_THRESHOLD, CXYWH_OFFSET};
use crate::error::{DetectError, Result};

#[derive(Debug, Clone, Copy)]
pub struct OutputParser {
    conf: f32,
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new(CONFIDENCE_THRESHOLD)
    }
}

impl OutputParser {
    pub fn new(conf: f32) -> Self {
        Self { conf }
    }

    pub fn conf(&self) -> f32 {
        self.conf
    }

    /// 解码全部候选位
    ///
    /// 依次: 最大类别得分 → 置信度过滤 (`<= conf` 丢弃) → 类别过滤 → 角点越界过滤.
    /// 不满足的候选在构造 [`Detection`] 之前就被跳过. 没有候选存活时返回空列表.
    ///
    /// 输出张量形状与 `geometry` 不符时返回 [`DetectError::OutputShape`].
    pub fn parse(
        &self,
        output: ArrayView3<'_, f32>,
        geometry: &ModelGeometry,
        labels: &[String],
        categories: &CategorySelection,
    ) -> Result<Vec<Detection>> {
        let expected = geometry.output_shape();
        if output.shape() != &expected[..] {
            return Err(DetectError::OutputShape {
                expected,
                got: output.shape().to_vec(),
            });
        }

        let preds = output.index_axis(Axis(0), 0);
        let mut ys = Vec::new();
        for pred in preds.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..]);

            // 跳过 NaN 得分; 并列最高分取第一个
            let Some((id, &confidence)) = clss
                .into_iter()
                .enumerate()
                .filter(|(_, s)| !s.is_nan())
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };

            if confidence <= self.conf {
                continue;
            }

            let Some(label) = labels.get(id) else {
                continue;
            };
            if !categories.allows(label) {
                continue;
            }

            if let Some(d) =
                Detection::from_cxcywh(bbox[0], bbox[1], bbox[2], bbox[3], confidence, id, label)
            {
                ys.push(d);
            }
        }

        Ok(ys)
    }
}
