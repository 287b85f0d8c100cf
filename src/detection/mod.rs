/// 检测系统 (Detection System)
///
/// 外部协作者接口与数据结构
/// - Detector: 目标检测模型
/// - Tracker:  目标跟踪/渲染
pub mod detector;
pub mod tracker;
pub mod types;

pub use detector::{load_labels, ObjectDetector, ReplayDetector};
pub use tracker::{DetectionTracker, NoRefresh, RefreshSignal};
pub use types::{BBox, Detection};
