//! 检测器接口 (Detector)
//! 职责: 模型输入图像 → 检测结果 (模型输入坐标)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::detection::types::Detection;
use crate::error::DetectorError;
use crate::pipeline::frame_buffer::ModelInput;

/// 检测模型能力接口
///
/// 流水线只依赖此 trait, 具体模型 (TFLite/ONNX/回放) 由调用方提供.
/// 所有方法都在后台线程调用.
pub trait ObjectDetector: Send {
    /// 对一张 `size x size` 输入图像执行检测, 返回顺序即模型输出顺序
    fn detect(&mut self, input: &ModelInput) -> Result<Vec<Detection>>;

    /// 开关硬件加速, 不支持时返回 `DetectorError::Unsupported`
    fn set_use_accelerator(&mut self, enabled: bool) -> Result<(), DetectorError> {
        if enabled {
            Err(DetectorError::Unsupported(
                "hardware acceleration is not supported by this detector".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// 设置推理线程数
    fn set_num_threads(&mut self, _num_threads: usize) -> Result<(), DetectorError> {
        Ok(())
    }
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn detect(&mut self, input: &ModelInput) -> Result<Vec<Detection>> {
        (**self).detect(input)
    }

    fn set_use_accelerator(&mut self, enabled: bool) -> Result<(), DetectorError> {
        (**self).set_use_accelerator(enabled)
    }

    fn set_num_threads(&mut self, num_threads: usize) -> Result<(), DetectorError> {
        (**self).set_num_threads(num_threads)
    }
}

/// 读取标签文件 (每行一个类别名, 跳过空行)
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).with_context(|| format!("读取标签文件失败: {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// 回放检测器: 从 JSONL 文件按顺序返回录制的模型输出
///
/// 每行是一次推理的结果数组, 例如
/// `[{"label":"dice","confidence":0.9,"location":{"x1":0,"y1":0,"x2":30,"y2":30}}]`
pub struct ReplayDetector {
    records: Vec<Vec<Detection>>,
    labels: Vec<String>,
    next: usize,
    looping: bool,
    num_threads: usize,
}

impl ReplayDetector {
    pub fn new(records: Vec<Vec<Detection>>) -> Self {
        Self {
            records,
            labels: Vec::new(),
            next: 0,
            looping: false,
            num_threads: 1,
        }
    }

    /// 从 JSONL 文件加载
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("读取检测记录失败: {}", path.display()))?;

        let mut records = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record: Vec<Detection> = serde_json::from_str(line)
                .with_context(|| format!("{}:{} 不是合法的检测记录", path.display(), line_no + 1))?;
            records.push(record);
        }

        info!("✅ 回放检测器加载 {} 条记录: {}", records.len(), path.display());
        Ok(Self::new(records))
    }

    /// 记录用尽后从头开始
    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// 用标签表补全缺失的类别名
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }
}

impl ObjectDetector for ReplayDetector {
    fn detect(&mut self, _input: &ModelInput) -> Result<Vec<Detection>> {
        if self.next >= self.records.len() {
            if self.looping && !self.records.is_empty() {
                self.next = 0;
            } else {
                anyhow::bail!("回放记录已耗尽 ({} 条)", self.records.len());
            }
        }

        let mut detections = self.records[self.next].clone();
        self.next += 1;

        for (i, d) in detections.iter_mut().enumerate() {
            if d.label.is_empty() {
                if let Some(label) = self.labels.get(d.class_id as usize) {
                    d.label = label.clone();
                }
            }
            if d.id.is_empty() {
                d.id = i.to_string();
            }
        }
        Ok(detections)
    }

    fn set_num_threads(&mut self, num_threads: usize) -> Result<(), DetectorError> {
        debug!("回放检测器线程数: {}", num_threads);
        self.num_threads = num_threads;
        Ok(())
    }
}
