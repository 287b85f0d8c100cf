/// 图片序列回放 (Replay)
///
/// 把目录中的图片当作相机帧, 按固定帧率送入检测流水线,
/// 检测模型由录制的 JSONL 输出代替, 跟踪结果以 JSON 行打印到标准输出.
///
/// 线程:
/// 1. 主线程:   采集 + 流水线 (模拟相机回调)
/// 2. 后台线程: 检测 + 结果映射
/// 3. 绘制线程: 响应刷新信号
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use camdet_rs::detection::load_labels;
use camdet_rs::pipeline::FramePool;
use camdet_rs::{
    Detection, DetectionPipeline, DetectionTracker, PipelineConfig, ReplayDetector, SessionParams,
};
use clap::Parser;
use fast_image_resize as fr;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 回放参数
#[derive(Parser, Debug)]
#[command(author, version, about = "图片序列回放 - 检测流水线离线验证", long_about = None)]
struct Args {
    /// 帧图片目录 (png/jpg/bmp, 按文件名排序)
    #[arg(short, long)]
    frames: PathBuf,

    /// 录制的检测输出 (JSONL, 每行一次推理)
    #[arg(short, long)]
    detections: PathBuf,

    /// 标签文件 (每行一个类别)
    #[arg(short, long)]
    labels: Option<PathBuf>,

    /// 配置文件
    #[arg(short, long, default_value = "pipeline.json")]
    config: PathBuf,

    /// 传感器旋转角度
    #[arg(long, default_value_t = 0)]
    orientation: i32,

    /// 回放帧率
    #[arg(long, default_value_t = 30.0)]
    fps: f64,

    /// 覆盖配置中的置信度阈值
    #[arg(long)]
    threshold: Option<f32>,

    /// 检测记录用尽后循环
    #[arg(long, default_value_t = false)]
    loop_detections: bool,

    /// 请求硬件加速
    #[arg(long, default_value_t = false)]
    accelerator: bool,
}

/// 跟踪结果输出 (每个检测任务一行)
#[derive(Serialize)]
struct TrackedLine<'a> {
    frame_id: u64,
    detections: &'a [Detection],
}

/// 把跟踪结果写成 JSON 行, 同时保留最新一组用于绘制
#[derive(Default)]
struct JsonLinesTracker {
    latest: Vec<Detection>,
    last_frame_id: u64,
    canvas: (u32, u32, i32),
}

impl DetectionTracker for JsonLinesTracker {
    fn set_frame_configuration(&mut self, width: u32, height: u32, orientation: i32) {
        info!("🖼️ 画布 {}x{}, 旋转 {}°", width, height, orientation);
        self.canvas = (width, height, orientation);
    }

    fn track_results(&mut self, detections: Vec<Detection>, frame_id: u64) {
        let line = TrackedLine {
            frame_id,
            detections: &detections,
        };
        match serde_json::to_string(&line) {
            Ok(json) => {
                let mut stdout = io::stdout().lock();
                let _ = writeln!(stdout, "{json}");
            }
            Err(e) => warn!("⚠️ 序列化跟踪结果失败: {}", e),
        }
        self.latest = detections;
        self.last_frame_id = frame_id;
    }
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("读取帧目录失败: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp"))
                .unwrap_or(false)
        })
        .collect();
    frames.sort();
    Ok(frames)
}

/// 读取图片并缩放到预览尺寸 (RGBA)
fn load_preview(path: &Path, width: u32, height: u32) -> Result<Vec<u8>> {
    let rgba = image::open(path)
        .with_context(|| format!("打开图片失败: {}", path.display()))?
        .to_rgba8();
    if rgba.dimensions() == (width, height) {
        return Ok(rgba.into_raw());
    }

    let (src_w, src_h) = rgba.dimensions();
    let src_image = fr::images::Image::from_vec_u8(src_w, src_h, rgba.into_raw(), fr::PixelType::U8x4)?;
    let mut dst_image = fr::images::Image::new(width, height, fr::PixelType::U8x4);
    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src_image,
        &mut dst_image,
        &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Nearest),
    )?;
    Ok(dst_image.into_vec())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config);
    if let Some(threshold) = args.threshold {
        config.confidence_threshold = threshold;
    }
    if args.accelerator {
        config.use_accelerator = true;
    }
    config.log_summary();

    let frames = list_frames(&args.frames)?;
    info!("🚀 回放启动: {} 帧 @ {:.1}fps", frames.len(), args.fps);

    let session = SessionParams {
        preview_width: config.preview_width,
        preview_height: config.preview_height,
        sensor_orientation: args.orientation,
    };

    // ========== 绘制线程: 响应刷新信号 ==========
    let tracker = Arc::new(Mutex::new(JsonLinesTracker::default()));
    let (refresh_tx, refresh_rx) = crossbeam_channel::bounded::<()>(1);
    let draw_tracker = tracker.clone();
    let drawer = thread::Builder::new()
        .name("draw".to_string())
        .spawn(move || {
            let mut draws = 0u64;
            for () in refresh_rx.iter() {
                if let Ok(t) = draw_tracker.lock() {
                    let (w, h, _) = t.canvas;
                    debug!(
                        "🎨 绘制 {} 个目标 (第 {} 帧, 画布 {}x{})",
                        t.latest.len(),
                        t.last_frame_id,
                        w,
                        h
                    );
                }
                draws += 1;
            }
            draws
        })?;

    // ========== 流水线 ==========
    let labels = args.labels.clone();
    let detections = args.detections.clone();
    let loop_detections = args.loop_detections;
    let mut pipeline = DetectionPipeline::from_loader(
        config.clone(),
        session,
        move || {
            let mut detector = ReplayDetector::from_path(&detections)?.with_looping(loop_detections);
            if let Some(path) = labels {
                detector = detector.with_labels(load_labels(path)?);
            }
            Ok(detector)
        },
        tracker.clone(),
        refresh_tx,
    )?;
    let notices = pipeline.notices();

    // ========== 主线程: 模拟相机回调 ==========
    let pool = FramePool::new(config.preview_width, config.preview_height, 2);
    let interval = Duration::from_secs_f64(1.0 / args.fps.max(1e-3));
    let mut starved = 0u64;

    for path in &frames {
        let tick = Instant::now();

        let pixels = match load_preview(path, config.preview_width, config.preview_height) {
            Ok(p) => p,
            Err(e) => {
                warn!("⚠️ 跳过帧 {}: {:#}", path.display(), e);
                continue;
            }
        };

        let Some(mut frame) = pool.acquire() else {
            starved += 1;
            continue;
        };
        frame.rgba_mut().copy_from_slice(&pixels);
        if let Err(e) = pipeline.process_frame(frame) {
            warn!("⚠️ 帧处理失败 {}: {}", path.display(), e);
        }

        for notice in notices.try_iter() {
            warn!("💬 {:?}", notice);
        }

        if let Some(rest) = interval.checked_sub(tick.elapsed()) {
            thread::sleep(rest);
        }
    }

    if !pipeline.wait_idle(Duration::from_secs(10)) {
        warn!("⚠️ 等待最后一次检测超时");
    }
    for notice in notices.try_iter() {
        warn!("💬 {:?}", notice);
    }

    let stats = pipeline.stats();
    drop(pipeline);
    let draws = drawer.join().unwrap_or_default();

    info!(
        "📊 帧 {} | 提交 {} | 丢弃 {} | 失败 {} | 交付 {} | 最近推理 {:.1}ms | 绘制 {} | 缓冲耗尽 {}",
        stats.frames_seen,
        stats.frames_submitted,
        stats.frames_dropped,
        stats.inference_failures,
        stats.results_delivered,
        stats.last_inference_ms,
        draws,
        starved
    );
    Ok(())
}
