// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 流水线配置参数
pub mod detection; // 检测/跟踪协作者接口
pub mod error; // 错误类型
pub mod pipeline; // 逐帧处理流水线
pub mod utils; // 仿射变换等工具

pub use crate::config::PipelineConfig;
pub use crate::detection::{
    BBox, Detection, DetectionTracker, NoRefresh, ObjectDetector, RefreshSignal, ReplayDetector,
};
pub use crate::error::{DetectorError, PipelineError};
pub use crate::pipeline::{
    CapturedFrame, DetectionPipeline, FrameOutcome, Notice, OwnedFrame, PipelineStats,
    SessionParams,
};
pub use crate::utils::affine_transform::{AffineMatrix, InterpolationMethod};
