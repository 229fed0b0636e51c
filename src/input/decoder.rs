// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 帧预处理: 方向变换 → Resize → 归一化 → 张量
//! Frame preprocessing into the model's fixed input tensor

use std::borrow::Cow;

use fast_image_resize as fr;
use image::{imageops, DynamicImage, RgbImage, RgbaImage};
use ndarray::Array4;

use super::frame::{Frame, PixelFormat, Rotation};
use crate::detection::types::{ModelGeometry, TensorLayout, INPUT_MEAN, INPUT_SCALE};
use crate::error::{DetectError, Result};

pub struct FrameDecoder {
    geometry: ModelGeometry,
    mean: f32,
    scale: f32,
    resizer: fr::Resizer,
}

impl FrameDecoder {
    pub fn new(geometry: ModelGeometry) -> Self {
        Self::with_normalization(geometry, INPUT_MEAN, INPUT_SCALE)
    }

    pub fn with_normalization(geometry: ModelGeometry, mean: f32, scale: f32) -> Self {
        Self {
            geometry,
            mean,
            scale,
            resizer: fr::Resizer::new(),
        }
    }

    pub fn geometry(&self) -> &ModelGeometry {
        &self.geometry
    }

    /// 把一帧转换为模型输入张量
    ///
    /// 直接拉伸到模型尺寸 (不保持宽高比), 最近邻插值, 像素值 `(p - mean) / scale`.
    /// 张量布局跟随 `ModelGeometry` (NHWC 或 NCHW).
    pub fn prepare(&mut self, frame: &Frame) -> Result<Array4<f32>> {
        // 1. 方向变换 → RGBA
        let (rgba, width, height) = Self::oriented_rgba(frame)?;

        // 2. Resize (最近邻, 不做滤波)
        let (tw, th) = (self.geometry.width(), self.geometry.height());
        // 无变换时直接借用帧缓冲区
        let src_image = fr::images::ImageRef::new(width, height, &rgba, fr::PixelType::U8x4)
            .map_err(|e| DetectError::Resize(e.to_string()))?;
        let mut dst_image = fr::images::Image::new(tw as u32, th as u32, fr::PixelType::U8x4);
        self.resizer
            .resize(
                &src_image,
                &mut dst_image,
                &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Nearest),
            )
            .map_err(|e| DetectError::Resize(e.to_string()))?;

        // 3. 归一化 + 布局
        let shape = self.geometry.input_shape();
        let mut ys = Array4::<f32>::zeros((shape[0], shape[1], shape[2], shape[3]));
        for (i, chunk) in dst_image.buffer().chunks_exact(4).enumerate() {
            let (y, x) = (i / tw, i % tw);
            for c in 0..3 {
                let v = (chunk[c] as f32 - self.mean) / self.scale;
                match self.geometry.layout() {
                    TensorLayout::Nhwc => ys[[0, y, x, c]] = v,
                    TensorLayout::Nchw => ys[[0, c, y, x]] = v,
                }
            }
        }

        Ok(ys)
    }

    /// 旋转/镜像后的 RGBA 缓冲区; 无变换的 RGBA 帧不复制
    fn oriented_rgba(frame: &Frame) -> Result<(Cow<'_, [u8]>, u32, u32)> {
        let transform = frame.transform();
        if transform.is_identity() && frame.format() == PixelFormat::Rgba8 {
            return Ok((Cow::Borrowed(frame.pixels()), frame.width(), frame.height()));
        }

        let invalid = || DetectError::InvalidFrame("buffer does not match dimensions".into());
        let img: RgbaImage = match frame.format() {
            PixelFormat::Rgba8 => {
                RgbaImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
                    .ok_or_else(invalid)?
            }
            PixelFormat::Rgb8 => {
                let rgb = RgbImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
                    .ok_or_else(invalid)?;
                DynamicImage::ImageRgb8(rgb).to_rgba8()
            }
        };

        let img = match transform.rotation {
            Rotation::None => img,
            Rotation::Deg90 => imageops::rotate90(&img),
            Rotation::Deg180 => imageops::rotate180(&img),
            Rotation::Deg270 => imageops::rotate270(&img),
        };
        let img = if transform.mirror {
            imageops::flip_horizontal(&img)
        } else {
            img
        };

        let (w, h) = img.dimensions();
        Ok((Cow::Owned(img.into_raw()), w, h))
    }
}
