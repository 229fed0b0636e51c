/// 视频输入系统 (Video Input System)
///
/// - Frame:   原始帧 + 方向变换, 只保留最新帧的投递槽
/// - Decoder: 帧 → 模型输入张量
pub mod decoder;
pub mod frame;

pub use decoder::FrameDecoder;
pub use frame::{frame_slot, Frame, FrameSlot, FrameTransform, PixelFormat, Rotation};
