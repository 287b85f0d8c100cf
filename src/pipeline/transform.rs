//! 坐标变换 (Coordinate Transform)
//! 预览坐标 → 模型输入坐标的正向矩阵及其逆矩阵, 每个会话计算一次

use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::utils::affine_transform::AffineMatrix;

/// 正向/逆向变换对
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransform {
    /// 预览坐标 → 模型输入坐标
    pub forward: AffineMatrix,
    /// 模型输入坐标 → 预览坐标
    pub inverse: AffineMatrix,
}

/// 计算预览帧到模型输入的变换矩阵
///
/// 以预览中心为原点旋转 `sensor_orientation` 度, 再缩放到 `model_size x model_size`,
/// 最后平移回目标中心. `maintain_aspect` 为 true 时两轴取较大的缩放系数 (铺满目标, 超出部分裁掉).
pub fn compute_transform(
    preview_width: u32,
    preview_height: u32,
    model_size: u32,
    sensor_orientation: i32,
    maintain_aspect: bool,
) -> Result<FrameTransform> {
    let degenerate = || PipelineError::DegenerateTransform {
        preview_width,
        preview_height,
        model_size,
        orientation: sensor_orientation,
    };

    if preview_width == 0 || preview_height == 0 || model_size == 0 {
        return Err(degenerate());
    }

    let (src_w, src_h) = (preview_width as f32, preview_height as f32);
    let dst = model_size as f32;
    let mut forward = AffineMatrix::identity();

    if sensor_orientation != 0 {
        if sensor_orientation % 90 != 0 {
            warn!("⚠️ 旋转角度 {} 不是90的倍数", sensor_orientation);
        }
        forward = forward
            .then_translate(-src_w / 2.0, -src_h / 2.0)
            .then_rotate(sensor_orientation as f32);
    }

    // 旋转90/270度后宽高互换
    let transpose = (sensor_orientation.abs() + 90) % 180 == 0;
    let (in_w, in_h) = if transpose {
        (preview_height, preview_width)
    } else {
        (preview_width, preview_height)
    };

    if in_w != model_size || in_h != model_size {
        let scale_x = dst / in_w as f32;
        let scale_y = dst / in_h as f32;
        forward = if maintain_aspect {
            let s = scale_x.max(scale_y);
            forward.then_scale(s, s)
        } else {
            forward.then_scale(scale_x, scale_y)
        };
    }

    if sensor_orientation != 0 {
        forward = forward.then_translate(dst / 2.0, dst / 2.0);
    }

    let inverse = forward.inverse().ok_or_else(degenerate)?;

    debug!(
        ?forward,
        ?inverse,
        "📐 预览 {}x{} → 模型 {}x{} (旋转 {}°)",
        preview_width,
        preview_height,
        model_size,
        model_size,
        sensor_orientation
    );

    Ok(FrameTransform { forward, inverse })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn assert_close(a: f32, b: f32, tol: f32) {
        assert!((a - b).abs() <= tol, "{a} != {b}");
    }

    #[test]
    fn scales_each_axis_without_aspect() {
        let t = compute_transform(640, 480, 300, 0, false).unwrap();
        assert_close(t.forward.a11, 300.0 / 640.0, 1e-7);
        assert_close(t.forward.a22, 300.0 / 480.0, 1e-7);
        assert_eq!(t.forward.a12, 0.0);
        assert_eq!(t.forward.a21, 0.0);
        assert_eq!(t.forward.b1, 0.0);
        assert_eq!(t.forward.b2, 0.0);

        let mapped = t.inverse.map_rect(&BBox::new(0.0, 0.0, 300.0, 300.0));
        assert_close(mapped.x1, 0.0, 1e-3);
        assert_close(mapped.y1, 0.0, 1e-3);
        assert_close(mapped.x2, 640.0, 1e-3);
        assert_close(mapped.y2, 480.0, 1e-3);
    }

    #[test]
    fn maintain_aspect_uses_larger_factor() {
        let t = compute_transform(640, 480, 300, 0, true).unwrap();
        let s = 300.0 / 480.0;
        assert_close(t.forward.a11, s, 1e-7);
        assert_close(t.forward.a22, s, 1e-7);
    }

    #[test]
    fn same_size_without_rotation_is_identity() {
        let t = compute_transform(300, 300, 300, 0, false).unwrap();
        assert_eq!(t.forward, AffineMatrix::identity());
        assert_eq!(t.inverse, AffineMatrix::identity());
    }

    #[test]
    fn rotation_90_transposes_and_centers() {
        // 旋转90度后宽高互换
        let t = compute_transform(640, 480, 300, 90, false).unwrap();
        // 预览中心映射到模型中心
        let (cx, cy) = t.forward.transform_point(320.0, 240.0);
        assert_close(cx, 150.0, 1e-3);
        assert_close(cy, 150.0, 1e-3);

        // 预览四角全部落在模型输入范围内
        let mapped = t.forward.map_rect(&BBox::new(0.0, 0.0, 640.0, 480.0));
        assert_close(mapped.x1, 0.0, 1e-3);
        assert_close(mapped.y1, 0.0, 1e-3);
        assert_close(mapped.x2, 300.0, 1e-3);
        assert_close(mapped.y2, 300.0, 1e-3);
    }

    #[test]
    fn round_trip_for_random_sessions() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let w = rng.gen_range(1..4000);
            let h = rng.gen_range(1..4000);
            let size = rng.gen_range(1..1024);
            let orientation = [0, 90, 180, 270, -90][rng.gen_range(0..5)];
            let t = compute_transform(w, h, size, orientation, rng.gen()).unwrap();

            for _ in 0..10 {
                let x = rng.gen_range(0.0..w as f32);
                let y = rng.gen_range(0.0..h as f32);
                let (mx, my) = t.forward.transform_point(x, y);
                let (bx, by) = t.inverse.transform_point(mx, my);
                let tol = 1e-3 * (w.max(h) as f32).max(1.0);
                assert_close(bx, x, tol);
                assert_close(by, y, tol);
            }
        }
    }

    #[test]
    fn zero_dimensions_are_degenerate() {
        for (w, h, s) in [(0, 480, 300), (640, 0, 300), (640, 480, 0)] {
            let err = compute_transform(w, h, s, 0, false).unwrap_err();
            assert!(matches!(err, PipelineError::DegenerateTransform { .. }));
        }
    }
}
