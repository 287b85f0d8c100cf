/// 检测系统数据结构定义
/// Data structures for the detection pipeline
use serde::{Deserialize, Serialize};

// ========== 数据结构 ==========

/// 检测框 (left/top/right/bottom)
///
/// 坐标系取决于所处阶段: 检测模型输出时为模型输入坐标, 经结果映射后为预览坐标
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// 获取中心点
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// 单个检测结果 (Recognition)
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Detection {
    /// 模型给出的不透明标识
    #[serde(default)]
    pub id: String,

    /// 类别名称
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub class_id: u32,

    /// 置信度 [0, 1]
    pub confidence: f32,

    /// 检测框, 模型可能不给出
    #[serde(default)]
    pub location: Option<BBox>,
}

impl Detection {
    pub fn new(id: impl Into<String>, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            confidence,
            ..Default::default()
        }
    }

    pub fn with_class_id(mut self, class_id: u32) -> Self {
        self.class_id = class_id;
        self
    }

    pub fn with_location(mut self, location: BBox) -> Self {
        self.location = Some(location);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bbox_geometry() {
        let b = BBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 40.0);
        assert_eq!(b.center(), (20.0, 40.0));
    }

    #[test]
    fn detection_parses_without_location() {
        let d: Detection = serde_json::from_str(r#"{"label":"dice","confidence":0.7}"#).unwrap();
        assert_eq!(d.label, "dice");
        assert!(d.location.is_none());
    }
}
