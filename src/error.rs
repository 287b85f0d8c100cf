//! 错误类型
//!
//! - `PipelineError`: 会话级错误 (配置/变换/帧尺寸), 返回给调用方
//! - `DetectorError`: 检测器运行时配置错误, 由流水线转换为提示消息

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// 检测模型初始化失败 (模型/标签文件缺失或损坏), 会话终止
    #[error("detector could not be initialized")]
    DetectorInit(#[source] anyhow::Error),

    /// 配置参数非法
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 变换矩阵不可逆 (缩放为0或非有限值)
    #[error(
        "degenerate transform for preview {preview_width}x{preview_height} \
         -> model {model_size}x{model_size} (orientation {orientation}°)"
    )]
    DegenerateTransform {
        preview_width: u32,
        preview_height: u32,
        model_size: u32,
        orientation: i32,
    },

    /// 帧数据与会话预览尺寸不符
    #[error("frame {width}x{height} with {actual} bytes does not match preview buffer of {expected} bytes")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// 后台工作线程创建失败
    #[error("failed to spawn background worker")]
    Spawn(#[from] std::io::Error),

    /// 后台执行器已关闭
    #[error("background executor has shut down")]
    ExecutorClosed,
}

#[derive(Debug, Error)]
pub enum DetectorError {
    /// 请求的运行时功能不可用 (例如硬件加速)
    #[error("{0}")]
    Unsupported(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
