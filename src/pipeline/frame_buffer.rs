//! 帧缓冲管理 (Frame Buffer Manager)
//!
//! 持有两块工作缓冲区:
//! - 预览分辨率 RGBA 缓冲 (每帧被采集线程覆盖)
//! - 模型输入分辨率 RGBA 缓冲 (每帧经正向变换重新生成)

use image::{DynamicImage, RgbImage};
use ndarray::{Array, IxDyn};

use crate::error::{PipelineError, Result};
use crate::utils::affine_transform::{warp_affine_rgba_into, AffineMatrix, InterpolationMethod};

/// 模型输入图像 (size x size RGBA)
///
/// 提交给后台线程的是它的私有副本, 不与采集线程共享
#[derive(Clone, Debug, PartialEq)]
pub struct ModelInput {
    pub size: u32,
    pub rgba_data: Vec<u8>,
}

impl ModelInput {
    pub fn new(size: u32) -> Self {
        Self {
            size,
            rgba_data: vec![0; (size as usize) * (size as usize) * 4],
        }
    }

    /// RGBA → RGB DynamicImage (丢弃 Alpha 通道)
    pub fn to_rgb_image(&self) -> Option<DynamicImage> {
        let mut rgb_data = Vec::with_capacity(self.rgba_data.len() / 4 * 3);
        for chunk in self.rgba_data.chunks_exact(4) {
            rgb_data.extend_from_slice(&chunk[..3]);
        }
        RgbImage::from_raw(self.size, self.size, rgb_data).map(DynamicImage::ImageRgb8)
    }

    /// NCHW 格式张量 [1, 3, size, size], 像素归一化到 [0, 1]
    pub fn to_tensor(&self) -> Array<f32, IxDyn> {
        let size = self.size as usize;
        let mut tensor = Array::zeros(IxDyn(&[1, 3, size, size]));
        for (i, chunk) in self.rgba_data.chunks_exact(4).enumerate() {
            let (y, x) = (i / size, i % size);
            for c in 0..3 {
                tensor[[0, c, y, x]] = chunk[c] as f32 / 255.0;
            }
        }
        tensor
    }
}

pub struct FrameBuffers {
    preview_width: u32,
    preview_height: u32,
    orientation: i32,
    rgb_frame: Vec<u8>,
    cropped: ModelInput,
}

impl FrameBuffers {
    pub fn new(preview_width: u32, preview_height: u32, model_size: u32) -> Self {
        Self {
            preview_width,
            preview_height,
            orientation: 0,
            rgb_frame: vec![0; (preview_width as usize) * (preview_height as usize) * 4],
            cropped: ModelInput::new(model_size),
        }
    }

    /// 记录传感器旋转角度, 仅用于错误报告
    pub fn with_orientation(mut self, orientation: i32) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn preview_size(&self) -> (u32, u32) {
        (self.preview_width, self.preview_height)
    }

    pub fn model_size(&self) -> u32 {
        self.cropped.size
    }

    /// 复制原始像素到预览分辨率缓冲
    pub fn ingest(&mut self, rgba: &[u8], width: u32, height: u32) -> Result<()> {
        if width != self.preview_width
            || height != self.preview_height
            || rgba.len() != self.rgb_frame.len()
        {
            return Err(PipelineError::FrameSize {
                width,
                height,
                expected: self.rgb_frame.len(),
                actual: rgba.len(),
            });
        }
        self.rgb_frame.copy_from_slice(rgba);
        Ok(())
    }

    /// 经正向变换把预览缓冲渲染到模型输入缓冲
    pub fn project(
        &mut self,
        forward: &AffineMatrix,
        interpolation: InterpolationMethod,
    ) -> Result<&ModelInput> {
        let size = self.cropped.size as usize;
        warp_affine_rgba_into(
            &self.rgb_frame,
            self.preview_width as usize,
            self.preview_height as usize,
            forward,
            &mut self.cropped.rgba_data,
            size,
            size,
            interpolation,
        )
        .ok_or(PipelineError::DegenerateTransform {
            preview_width: self.preview_width,
            preview_height: self.preview_height,
            model_size: self.cropped.size,
            orientation: self.orientation,
        })?;
        Ok(&self.cropped)
    }
}
