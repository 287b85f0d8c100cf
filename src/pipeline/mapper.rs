//! 结果映射 (Result Mapper)
//! 置信度过滤 + 模型坐标 → 预览坐标

use crate::detection::types::Detection;
use crate::utils::affine_transform::AffineMatrix;

/// 过滤并映射检测结果
///
/// 保持模型输出顺序 (同分不重新排序); 无检测框、置信度为 NaN 或低于阈值的结果直接丢弃.
pub fn map_results(
    raw: Vec<Detection>,
    inverse: &AffineMatrix,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let mut mapped = Vec::with_capacity(raw.len());
    for mut detection in raw {
        let Some(location) = detection.location else {
            continue;
        };
        if detection.confidence.is_nan() || detection.confidence < confidence_threshold {
            continue;
        }
        detection.location = Some(inverse.map_rect(&location));
        mapped.push(detection);
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::BBox;
    use crate::pipeline::transform::compute_transform;

    fn det(id: &str, confidence: f32, location: Option<BBox>) -> Detection {
        Detection {
            id: id.to_string(),
            label: "obj".to_string(),
            class_id: 0,
            confidence,
            location,
        }
    }

    #[test]
    fn keeps_threshold_and_order() {
        let inverse = AffineMatrix::scale(2.0, 2.0);
        let raw = vec![
            det("b1", 0.9, Some(BBox::new(1.0, 1.0, 2.0, 2.0))),
            det("b2", 0.3, Some(BBox::new(3.0, 3.0, 4.0, 4.0))),
            det("b3", 0.5, Some(BBox::new(5.0, 5.0, 6.0, 6.0))),
        ];

        let out = map_results(raw, &inverse, 0.5);
        let ids: Vec<_> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b1", "b3"]);
        assert_eq!(out[0].location, Some(BBox::new(2.0, 2.0, 4.0, 4.0)));
        assert_eq!(out[1].location, Some(BBox::new(10.0, 10.0, 12.0, 12.0)));
        assert_eq!(out[0].confidence, 0.9);
    }

    #[test]
    fn drops_missing_location() {
        let raw = vec![det("none", 0.99, None), det("ok", 0.6, Some(BBox::default()))];
        let out = map_results(raw, &AffineMatrix::identity(), 0.5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "ok");
    }

    #[test]
    fn equal_confidence_is_not_reordered() {
        let raw: Vec<_> = (0..5)
            .map(|i| det(&i.to_string(), 0.7, Some(BBox::default())))
            .collect();
        let out = map_results(raw, &AffineMatrix::identity(), 0.0);
        let ids: Vec<_> = out.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids, ["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn maps_model_box_back_to_preview() {
        let t = compute_transform(640, 480, 300, 0, false).unwrap();
        let raw = vec![det("full", 0.8, Some(BBox::new(0.0, 0.0, 300.0, 300.0)))];
        let out = map_results(raw, &t.inverse, 0.5);
        let b = out[0].location.unwrap();
        assert!((b.x2 - 640.0).abs() < 1e-3);
        assert!((b.y2 - 480.0).abs() < 1e-3);
        assert!(b.x1.abs() < 1e-3 && b.y1.abs() < 1e-3);
    }

    #[test]
    fn nan_confidence_is_dropped() {
        let raw = vec![
            det("nan", f32::NAN, Some(BBox::new(0.0, 0.0, 1.0, 1.0))),
            det("ok", 0.5, Some(BBox::new(0.0, 0.0, 1.0, 1.0))),
        ];
        let out = map_results(raw, &AffineMatrix::identity(), 0.5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "ok");

        // 阈值为0时也不放行
        let raw = vec![det("nan", f32::NAN, Some(BBox::default()))];
        assert!(map_results(raw, &AffineMatrix::identity(), 0.0).is_empty());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(map_results(Vec::new(), &AffineMatrix::identity(), 0.5).is_empty());
    }
}
