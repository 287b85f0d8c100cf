//! 流水线协调 (Pipeline Coordinator)
//!
//! 每帧在采集线程调用一次 `process_frame`:
//! 1. 帧序号+1, 请求刷新
//! 2. 检测进行中 → 归还帧, 丢弃
//! 3. 复制像素 → 立即归还帧 → 正向变换生成模型输入
//! 4. 模型输入私有副本 + 帧序号 提交后台任务
//!
//! 后台任务: 检测 → 置信度过滤与坐标映射 → 交给跟踪器 → 请求刷新

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, trace, warn};

use super::capture::{CapturedFrame, SessionParams};
use super::frame_buffer::{FrameBuffers, ModelInput};
use super::mapper::map_results;
use super::scheduler::{BackgroundExecutor, DetectionScheduler, Submission};
use super::transform::{compute_transform, FrameTransform};
use crate::config::PipelineConfig;
use crate::detection::{DetectionTracker, ObjectDetector, RefreshSignal};
use crate::error::{DetectorError, PipelineError, Result};
use crate::utils::affine_transform::AffineMatrix;

/// 单帧处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 已提交后台检测
    Submitted { frame_id: u64 },
    /// 上一次检测尚未完成, 本帧丢弃
    Dropped { frame_id: u64 },
}

impl FrameOutcome {
    pub fn frame_id(&self) -> u64 {
        match *self {
            FrameOutcome::Submitted { frame_id } | FrameOutcome::Dropped { frame_id } => frame_id,
        }
    }
}

/// 面向用户的临时提示
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 请求的运行时功能不可用, 处理照常继续
    Unsupported(String),
    /// 检测器运行时配置失败
    ConfigFailed(String),
}

/// 运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    pub frames_seen: u64,
    pub frames_dropped: u64,
    pub frames_submitted: u64,
    pub inference_failures: u64,
    pub results_delivered: u64,
    pub last_inference_ms: f64,
}

#[derive(Default)]
struct StatsCounters {
    frames_seen: AtomicU64,
    frames_dropped: AtomicU64,
    frames_submitted: AtomicU64,
    inference_failures: AtomicU64,
    results_delivered: AtomicU64,
    last_inference_us: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_seen: self.frames_seen.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_submitted: self.frames_submitted.load(Ordering::Relaxed),
            inference_failures: self.inference_failures.load(Ordering::Relaxed),
            results_delivered: self.results_delivered.load(Ordering::Relaxed),
            last_inference_ms: self.last_inference_us.load(Ordering::Relaxed) as f64 / 1000.0,
        }
    }
}

/// 后台检测任务, 持有模型输入的私有副本
struct DetectionTask<D, T, R> {
    frame_id: u64,
    input: ModelInput,
    inverse: AffineMatrix,
    confidence_threshold: f32,
    detector: Arc<Mutex<D>>,
    tracker: Arc<Mutex<T>>,
    refresh: Arc<R>,
    stats: Arc<StatsCounters>,
}

impl<D, T, R> DetectionTask<D, T, R>
where
    D: ObjectDetector,
    T: DetectionTracker,
    R: RefreshSignal,
{
    fn run(self) -> anyhow::Result<()> {
        let outcome = self.detect_and_track();
        // 无论成功与否都刷新一次显示
        self.refresh.request_refresh();
        outcome
    }

    fn detect_and_track(&self) -> anyhow::Result<()> {
        trace!("🔍 第 {} 帧开始检测", self.frame_id);

        let start = Instant::now();
        let raw = {
            let mut detector = self
                .detector
                .lock()
                .map_err(|_| anyhow!("detector mutex poisoned"))?;
            detector.detect(&self.input)
        };
        let elapsed = start.elapsed();
        self.stats
            .last_inference_us
            .store(elapsed.as_micros() as u64, Ordering::Relaxed);

        let raw = match raw {
            Ok(raw) => raw,
            Err(e) => {
                StatsCounters::bump(&self.stats.inference_failures);
                return Err(e.context(format!("frame {} lost", self.frame_id)));
            }
        };

        let raw_count = raw.len();
        let mapped = map_results(raw, &self.inverse, self.confidence_threshold);
        debug!(
            "🎯 第 {} 帧: 原始 {} 个 → 跟踪 {} 个 | 推理 {:.1}ms",
            self.frame_id,
            raw_count,
            mapped.len(),
            elapsed.as_secs_f64() * 1000.0
        );

        self.tracker
            .lock()
            .map_err(|_| anyhow!("tracker mutex poisoned"))?
            .track_results(mapped, self.frame_id);
        StatsCounters::bump(&self.stats.results_delivered);
        Ok(())
    }
}

pub struct DetectionPipeline<D, T, R> {
    config: PipelineConfig,
    session: SessionParams,
    transform: FrameTransform,
    buffers: FrameBuffers,
    timestamp: u64,

    detector: Arc<Mutex<D>>,
    tracker: Arc<Mutex<T>>,
    refresh: Arc<R>,

    scheduler: DetectionScheduler,
    executor: Arc<BackgroundExecutor>,

    stats: Arc<StatsCounters>,
    notice_tx: Sender<Notice>,
    notice_rx: Receiver<Notice>,
}

impl<D, T, R> DetectionPipeline<D, T, R>
where
    D: ObjectDetector + 'static,
    T: DetectionTracker + 'static,
    R: RefreshSignal + 'static,
{
    /// 开始一个采集会话: 计算变换矩阵, 分配缓冲, 启动后台执行器
    pub fn new(
        config: PipelineConfig,
        session: SessionParams,
        detector: D,
        tracker: Arc<Mutex<T>>,
        refresh: R,
    ) -> Result<Self> {
        config.validate()?;
        if (config.preview_width, config.preview_height)
            != (session.preview_width, session.preview_height)
        {
            return Err(PipelineError::Config(format!(
                "configured preview {}x{} does not match session preview {}x{}",
                config.preview_width,
                config.preview_height,
                session.preview_width,
                session.preview_height
            )));
        }

        info!(
            "📷 相机相对屏幕旋转: {}°, 预览尺寸 {}x{}",
            session.sensor_orientation, session.preview_width, session.preview_height
        );

        let transform = compute_transform(
            session.preview_width,
            session.preview_height,
            config.model_input_size,
            session.sensor_orientation,
            config.maintain_aspect,
        )?;

        let buffers = FrameBuffers::new(
            session.preview_width,
            session.preview_height,
            config.model_input_size,
        )
        .with_orientation(session.sensor_orientation);

        match tracker.lock() {
            Ok(mut t) => t.set_frame_configuration(
                session.preview_width,
                session.preview_height,
                session.sensor_orientation,
            ),
            Err(_) => warn!("⚠️ 跟踪器锁已损坏, 跳过帧配置"),
        }

        let executor = Arc::new(BackgroundExecutor::new("detect", config.background_threads)?);
        let scheduler = DetectionScheduler::new(executor.clone());
        let (notice_tx, notice_rx) = unbounded();

        let pipeline = Self {
            config,
            session,
            transform,
            buffers,
            timestamp: 0,
            detector: Arc::new(Mutex::new(detector)),
            tracker,
            refresh: Arc::new(refresh),
            scheduler,
            executor,
            stats: Arc::new(StatsCounters::default()),
            notice_tx,
            notice_rx,
        };

        if pipeline.config.use_accelerator {
            pipeline.set_use_accelerator(true)?;
        }
        if let Some(n) = pipeline.config.detector_threads {
            pipeline.set_num_threads(n)?;
        }

        Ok(pipeline)
    }

    /// 同 `new`, 但由流水线负责调用检测器加载函数; 加载失败即会话失败
    pub fn from_loader<L>(
        config: PipelineConfig,
        session: SessionParams,
        loader: L,
        tracker: Arc<Mutex<T>>,
        refresh: R,
    ) -> Result<Self>
    where
        L: FnOnce() -> anyhow::Result<D>,
    {
        let detector = loader().map_err(|e| {
            error!("❌ 检测器初始化失败: {:#}", e);
            PipelineError::DetectorInit(e)
        })?;
        Self::new(config, session, detector, tracker, refresh)
    }

    /// 处理一帧 (采集线程调用, 不阻塞)
    pub fn process_frame<F: CapturedFrame>(&mut self, frame: F) -> Result<FrameOutcome> {
        self.timestamp += 1;
        let frame_id = self.timestamp;
        StatsCounters::bump(&self.stats.frames_seen);
        self.refresh.request_refresh();

        if self.scheduler.is_busy() {
            frame.release();
            StatsCounters::bump(&self.stats.frames_dropped);
            trace!("⏭️ 第 {} 帧: 检测进行中, 丢弃", frame_id);
            return Ok(FrameOutcome::Dropped { frame_id });
        }

        trace!("📥 第 {} 帧准备送后台检测", frame_id);
        let copied = self
            .buffers
            .ingest(frame.rgba(), frame.width(), frame.height());
        frame.release();
        copied?;

        let input = self
            .buffers
            .project(&self.transform.forward, self.config.interpolation)?
            .clone();

        let task = DetectionTask {
            frame_id,
            input,
            inverse: self.transform.inverse,
            confidence_threshold: self.config.confidence_threshold,
            detector: self.detector.clone(),
            tracker: self.tracker.clone(),
            refresh: self.refresh.clone(),
            stats: self.stats.clone(),
        };

        match self.scheduler.try_submit(move || task.run()) {
            Submission::Accepted => {
                StatsCounters::bump(&self.stats.frames_submitted);
                Ok(FrameOutcome::Submitted { frame_id })
            }
            Submission::Rejected => {
                StatsCounters::bump(&self.stats.frames_dropped);
                Ok(FrameOutcome::Dropped { frame_id })
            }
        }
    }

    /// 开关检测器硬件加速 (在后台线程转发, 不支持时发出提示)
    pub fn set_use_accelerator(&self, enabled: bool) -> Result<()> {
        self.forward_to_detector(move |d| d.set_use_accelerator(enabled))
    }

    /// 设置检测器线程数 (在后台线程转发)
    pub fn set_num_threads(&self, num_threads: usize) -> Result<()> {
        self.forward_to_detector(move |d| d.set_num_threads(num_threads))
    }

    fn forward_to_detector<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&mut D) -> std::result::Result<(), DetectorError> + Send + 'static,
    {
        let detector = self.detector.clone();
        let notices = self.notice_tx.clone();
        self.executor.execute(move || {
            let result = match detector.lock() {
                Ok(mut d) => op(&mut *d),
                Err(_) => Err(DetectorError::Other(anyhow!("detector mutex poisoned"))),
            };
            let notice = match result {
                Ok(()) => return,
                Err(DetectorError::Unsupported(msg)) => {
                    warn!("⚠️ 检测器不支持该设置: {}", msg);
                    Notice::Unsupported(msg)
                }
                Err(DetectorError::Other(e)) => {
                    warn!("⚠️ 检测器设置失败: {:#}", e);
                    Notice::ConfigFailed(format!("{e:#}"))
                }
            };
            let _ = notices.send(notice);
        })
    }

    /// 临时提示消息 (例如硬件加速不可用)
    pub fn notices(&self) -> Receiver<Notice> {
        self.notice_rx.clone()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats.snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.scheduler.is_busy()
    }

    /// 等待当前检测任务完成
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    pub fn transform(&self) -> &FrameTransform {
        &self.transform
    }

    pub fn session(&self) -> &SessionParams {
        &self.session
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 已处理的帧数 (即最近一帧的序号)
    pub fn frame_count(&self) -> u64 {
        self.timestamp
    }

    pub fn tracker(&self) -> Arc<Mutex<T>> {
        self.tracker.clone()
    }
}
