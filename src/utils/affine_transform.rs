/// 仿射变换工具模块
/// 预览坐标 ↔ 模型输入坐标的矩阵运算, 以及 RGBA 图像的仿射重采样
use serde::{Deserialize, Serialize};

use crate::detection::types::BBox;

/// 仿射变换矩阵 (2x3)
/// | a11 a12 b1 |
/// | a21 a22 b2 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    pub a11: f32,
    pub a12: f32,
    pub b1: f32,
    pub a21: f32,
    pub a22: f32,
    pub b2: f32,
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineMatrix {
    /// 创建单位仿射矩阵
    pub fn identity() -> Self {
        Self {
            a11: 1.0,
            a12: 0.0,
            b1: 0.0,
            a21: 0.0,
            a22: 1.0,
            b2: 0.0,
        }
    }

    /// 应用仿射变换到点 (x, y)
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let new_x = self.a11 * x + self.a12 * y + self.b1;
        let new_y = self.a21 * x + self.a22 * y + self.b2;
        (new_x, new_y)
    }

    /// 行列式
    pub fn determinant(&self) -> f32 {
        self.a11 * self.a22 - self.a12 * self.a21
    }

    /// 计算逆矩阵 (用于反向映射)
    ///
    /// 行列式接近0或非有限值(NaN/inf)时返回 `None`
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-10 {
            return None; // 矩阵不可逆
        }

        let inv_det = 1.0 / det;
        let inv = Self {
            a11: self.a22 * inv_det,
            a12: -self.a12 * inv_det,
            b1: (self.a12 * self.b2 - self.a22 * self.b1) * inv_det,
            a21: -self.a21 * inv_det,
            a22: self.a11 * inv_det,
            b2: (self.a21 * self.b1 - self.a11 * self.b2) * inv_det,
        };
        inv.is_finite().then_some(inv)
    }

    /// 所有系数均为有限值
    pub fn is_finite(&self) -> bool {
        [self.a11, self.a12, self.b1, self.a21, self.a22, self.b2]
            .iter()
            .all(|v| v.is_finite())
    }

    /// 创建平移矩阵
    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            b1: dx,
            b2: dy,
            ..Self::identity()
        }
    }

    /// 创建缩放矩阵
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a11: sx,
            a22: sy,
            ..Self::identity()
        }
    }

    /// 创建旋转矩阵 (角度制, y轴向下时为顺时针)
    pub fn rotation(angle_degrees: f32) -> Self {
        // 直角取精确值
        let (sin_a, cos_a) = match (angle_degrees as i32).rem_euclid(360) {
            0 if angle_degrees.fract() == 0.0 => (0.0, 1.0),
            90 if angle_degrees.fract() == 0.0 => (1.0, 0.0),
            180 if angle_degrees.fract() == 0.0 => (0.0, -1.0),
            270 if angle_degrees.fract() == 0.0 => (-1.0, 0.0),
            _ => angle_degrees.to_radians().sin_cos(),
        };
        Self {
            a11: cos_a,
            a12: -sin_a,
            b1: 0.0,
            a21: sin_a,
            a22: cos_a,
            b2: 0.0,
        }
    }

    /// 矩阵组合 (self * other): 先应用 other, 再应用 self
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            a11: self.a11 * other.a11 + self.a12 * other.a21,
            a12: self.a11 * other.a12 + self.a12 * other.a22,
            b1: self.a11 * other.b1 + self.a12 * other.b2 + self.b1,
            a21: self.a21 * other.a11 + self.a22 * other.a21,
            a22: self.a21 * other.a12 + self.a22 * other.a22,
            b2: self.a21 * other.b1 + self.a22 * other.b2 + self.b2,
        }
    }

    /// 在当前变换之后追加平移
    pub fn then_translate(&self, dx: f32, dy: f32) -> Self {
        Self::translation(dx, dy).compose(self)
    }

    /// 在当前变换之后追加旋转
    pub fn then_rotate(&self, angle_degrees: f32) -> Self {
        Self::rotation(angle_degrees).compose(self)
    }

    /// 在当前变换之后追加缩放
    pub fn then_scale(&self, sx: f32, sy: f32) -> Self {
        Self::scale(sx, sy).compose(self)
    }

    /// 映射矩形: 变换四个角点后取外接矩形
    ///
    /// 含旋转时结果仍是轴对齐框
    pub fn map_rect(&self, rect: &BBox) -> BBox {
        let corners = [
            self.transform_point(rect.x1, rect.y1),
            self.transform_point(rect.x2, rect.y1),
            self.transform_point(rect.x1, rect.y2),
            self.transform_point(rect.x2, rect.y2),
        ];

        let mut out = BBox {
            x1: f32::INFINITY,
            y1: f32::INFINITY,
            x2: f32::NEG_INFINITY,
            y2: f32::NEG_INFINITY,
        };
        for (x, y) in corners {
            out.x1 = out.x1.min(x);
            out.y1 = out.y1.min(y);
            out.x2 = out.x2.max(x);
            out.y2 = out.y2.max(y);
        }
        out
    }
}

/// 插值方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    #[default]
    Nearest, // 最近邻插值
    Bilinear, // 双线性插值
}

/// 仿射变换函数 (RGBA图像), 写入调用方提供的目标缓冲区
///
/// 以像素中心采样: 目标像素 (x+0.5, y+0.5) 经逆矩阵映射回源图像.
/// 源图像之外的像素填充 0 (透明黑).
///
/// # 参数
/// - `src`: 源图像 (height x width x 4)
/// - `matrix`: 源 → 目标的仿射变换矩阵
/// - `dst`: 目标缓冲区, 长度必须为 `dst_width * dst_height * 4`
///
/// 矩阵不可逆时返回 `None`, 目标缓冲区保持不变
#[allow(clippy::too_many_arguments)]
pub fn warp_affine_rgba_into(
    src: &[u8],
    src_width: usize,
    src_height: usize,
    matrix: &AffineMatrix,
    dst: &mut [u8],
    dst_width: usize,
    dst_height: usize,
    interpolation: InterpolationMethod,
) -> Option<()> {
    debug_assert_eq!(src.len(), src_width * src_height * 4);
    debug_assert_eq!(dst.len(), dst_width * dst_height * 4);

    // 使用逆变换进行反向映射
    let inv_matrix = matrix.inverse()?;

    for dst_y in 0..dst_height {
        for dst_x in 0..dst_width {
            let (src_x, src_y) =
                inv_matrix.transform_point(dst_x as f32 + 0.5, dst_y as f32 + 0.5);

            let pixel = match interpolation {
                InterpolationMethod::Nearest => {
                    sample_nearest(src, src_x, src_y, src_width, src_height)
                }
                InterpolationMethod::Bilinear => {
                    sample_bilinear(src, src_x, src_y, src_width, src_height)
                }
            };

            let dst_idx = (dst_y * dst_width + dst_x) * 4;
            dst[dst_idx..dst_idx + 4].copy_from_slice(&pixel);
        }
    }

    Some(())
}

/// 最近邻插值 (坐标为像素中心坐标系)
fn sample_nearest(src: &[u8], x: f32, y: f32, width: usize, height: usize) -> [u8; 4] {
    pixel_at(src, x.floor() as i64, y.floor() as i64, width, height)
}

/// 双线性插值
fn sample_bilinear(src: &[u8], x: f32, y: f32, width: usize, height: usize) -> [u8; 4] {
    let x = x - 0.5;
    let y = y - 0.5;
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = pixel_at(src, x0, y0, width, height);
    let p10 = pixel_at(src, x0 + 1, y0, width, height);
    let p01 = pixel_at(src, x0, y0 + 1, width, height);
    let p11 = pixel_at(src, x0 + 1, y0 + 1, width, height);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let v0 = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let v1 = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// 边界外返回透明黑
fn pixel_at(src: &[u8], x: i64, y: i64, width: usize, height: usize) -> [u8; 4] {
    if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
        return [0; 4];
    }
    let idx = (y as usize * width + x as usize) * 4;
    [src[idx], src[idx + 1], src[idx + 2], src[idx + 3]]
}
