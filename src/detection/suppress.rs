// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 非极大值抑制 (Non-Maximum Suppression)

use super::types::Detection;

/// 贪心 NMS, 不区分类别
///
/// 按置信度降序稳定排序, 依次保留最高者, 与已保留框 IoU >= `iou_threshold`
/// 的候选全部丢弃. 输出顺序即保留顺序 (置信度从高到低), 决定显示优先级.
pub fn non_max_suppression(xs: &mut Vec<Detection>, iou_threshold: f32) {
    xs.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));

    let mut current_index = 0;
    for index in 0..xs.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let iou = xs[prev_index].iou(&xs[index]);
            if iou >= iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            xs.swap(current_index, index);
            current_index += 1;
        }
    }
    xs.truncate(current_index);
}

/// 按值版本
pub fn suppress(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    non_max_suppression(&mut detections, iou_threshold);
    detections
}
