/// 帧处理流水线 (Frame Processing Pipeline)
///
/// 双线程架构:
/// - 采集线程: 帧序号、像素复制、坐标变换、提交检测 (永不阻塞)
/// - 后台线程: 目标检测、结果映射、交给跟踪器
///
/// 两个线程之间唯一共享的可变状态是调度器的 "检测中" 原子标志
pub mod capture;
pub mod coordinator;
pub mod frame_buffer;
pub mod mapper;
pub mod scheduler;
pub mod transform;

pub use capture::{CapturedFrame, FramePool, OwnedFrame, PooledFrame, SessionParams};
pub use coordinator::{DetectionPipeline, FrameOutcome, Notice, PipelineStats};
pub use frame_buffer::{FrameBuffers, ModelInput};
pub use mapper::map_results;
pub use scheduler::{BackgroundExecutor, DetectionScheduler, SchedulerState, Submission};
pub use transform::{compute_transform, FrameTransform};
