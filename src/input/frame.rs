// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 输入帧定义与"只保留最新帧"投递
//! Frame definition and keep-only-latest delivery

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use image::RgbaImage;

use crate::error::{DetectError, Result};

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// 顺时针旋转角度 (由传感器方向决定)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    None,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }
}

/// 缩放前的方向变换: 先旋转, 再水平镜像 (前置摄像头)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameTransform {
    pub rotation: Rotation,
    pub mirror: bool,
}

impl FrameTransform {
    pub fn is_identity(&self) -> bool {
        self.rotation == Rotation::None && !self.mirror
    }
}

/// 一帧原始图像
///
/// 构造时校验缓冲区长度, 之后解码器可以假定数据完整.
#[derive(Clone)]
pub struct Frame {
    pixels: Arc<Vec<u8>>, // 使用Arc共享数据,避免复制
    width: u32,
    height: u32,
    format: PixelFormat,
    transform: FrameTransform,
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("transform", &self.transform)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(DetectError::InvalidFrame(format!(
                "empty frame {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if pixels.len() != expected {
            return Err(DetectError::InvalidFrame(format!(
                "{}x{} {:?} needs {} bytes, got {}",
                width,
                height,
                format,
                expected,
                pixels.len()
            )));
        }
        Ok(Self {
            pixels: Arc::new(pixels),
            width,
            height,
            format,
            transform: FrameTransform::default(),
        })
    }

    /// 与 [`Frame::new`] 相同的校验, 空图像返回错误
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, PixelFormat::Rgba8)
    }

    pub fn with_transform(mut self, transform: FrameTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn transform(&self) -> FrameTransform {
        self.transform
    }
}

/// 帧投递端: 容量为1, 新帧到达时挤掉尚未处理的旧帧
///
/// 投递端自己也持有一个接收者用于挤掉旧帧, 因此通道不会因工作线程退出而断开,
/// 退出由 `closed` 标志通知.
#[derive(Clone)]
pub struct FrameSlot {
    tx: Sender<Frame>,
    evict: Receiver<Frame>,
    dropped: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

/// 创建投递端与工作线程的接收端
pub fn frame_slot() -> (FrameSlot, Receiver<Frame>) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (
        FrameSlot {
            tx,
            evict: rx.clone(),
            dropped: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        },
        rx,
    )
}

impl FrameSlot {
    /// 投递一帧; 工作线程已停止时返回 [`DetectError::WorkerStopped`]
    pub fn submit(&self, frame: Frame) -> Result<()> {
        if self.is_closed() {
            return Err(DetectError::WorkerStopped);
        }
        let mut frame = frame;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(f)) => {
                    if self.evict.try_recv().is_ok() {
                        let n = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        log::trace!("丢弃过期帧 (累计 {})", n);
                    }
                    frame = f;
                }
                Err(TrySendError::Disconnected(_)) => return Err(DetectError::WorkerStopped),
            }
        }
    }

    /// 被新帧取代而丢弃的帧数
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 是否还有帧等待工作线程取走
    pub fn is_pending(&self) -> bool {
        !self.evict.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 停止接收新帧, 并清掉尚未处理的帧
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        while self.evict.try_recv().is_ok() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![0; (w * h * 4) as usize], w, h, PixelFormat::Rgba8).unwrap()
    }

    #[test]
    fn test_frame_length_checked() {
        assert!(Frame::new(vec![0; 11], 2, 2, PixelFormat::Rgb8).is_err());
        assert!(Frame::new(vec![0; 12], 2, 2, PixelFormat::Rgb8).is_ok());
        assert!(Frame::new(vec![], 0, 2, PixelFormat::Rgba8).is_err());
    }

    #[test]
    fn test_from_rgba_image_checked() {
        assert!(matches!(
            Frame::from_rgba_image(RgbaImage::new(0, 0)),
            Err(DetectError::InvalidFrame(_))
        ));
        let f = Frame::from_rgba_image(RgbaImage::new(3, 2)).unwrap();
        assert_eq!((f.width(), f.height(), f.format()), (3, 2, PixelFormat::Rgba8));
        assert_eq!(f.pixels().len(), 24);
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(360), Some(Rotation::None));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn test_slot_keeps_only_latest() {
        let (slot, rx) = frame_slot();
        slot.submit(frame(1, 1)).unwrap();
        slot.submit(frame(2, 2)).unwrap();
        slot.submit(frame(3, 3)).unwrap();

        assert!(slot.is_pending());
        let f = rx.try_recv().unwrap();
        assert_eq!(f.width(), 3);
        assert!(!slot.is_pending());
        assert!(rx.try_recv().is_err());
        assert_eq!(slot.dropped(), 2);
    }

    #[test]
    fn test_slot_closed() {
        let (slot, rx) = frame_slot();
        let producer = slot.clone();
        slot.submit(frame(1, 1)).unwrap();
        slot.close();

        assert!(rx.try_recv().is_err());
        assert!(producer.is_closed());
        assert!(matches!(
            producer.submit(frame(1, 1)),
            Err(DetectError::WorkerStopped)
        ));
    }
}
