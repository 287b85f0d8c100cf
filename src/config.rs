//! 流水线配置 - 通过JSON文件调整参数

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::utils::affine_transform::InterpolationMethod;

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 模型输入 ===
    pub model_input_size: u32,    // 模型输入边长 (正方形)
    pub confidence_threshold: f32, // 最低跟踪置信度
    pub maintain_aspect: bool,    // 缩放时保持宽高比
    pub interpolation: InterpolationMethod,

    // === 预览 ===
    pub preview_width: u32,
    pub preview_height: u32,

    // === 后台执行 ===
    pub background_threads: usize, // 后台执行器线程数

    // === 检测器运行时选项 (原样转发给检测器) ===
    pub use_accelerator: bool,
    pub detector_threads: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_input_size: 300,
            confidence_threshold: 0.5,
            maintain_aspect: false,
            interpolation: InterpolationMethod::Nearest,

            preview_width: 640,
            preview_height: 480,

            background_threads: 1,

            use_accelerator: false,
            detector_threads: None,
        }
    }
}

impl PipelineConfig {
    /// 从JSON文件加载配置, 文件不存在或解析失败时使用默认值
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️ 配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件 {} 不存在, 使用默认配置", path.display());
                Self::default()
            }
        }
    }

    /// 检查参数合法性
    pub fn validate(&self) -> Result<()> {
        if self.model_input_size == 0 {
            return Err(PipelineError::Config(
                "model_input_size must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::Config(format!(
                "confidence_threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        if self.preview_width == 0 || self.preview_height == 0 {
            return Err(PipelineError::Config(format!(
                "preview size {}x{} is empty",
                self.preview_width, self.preview_height
            )));
        }
        if self.background_threads == 0 {
            return Err(PipelineError::Config(
                "background_threads must be at least 1".to_string(),
            ));
        }
        if self.detector_threads == Some(0) {
            return Err(PipelineError::Config(
                "detector_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!(
            "🎛️ 模型输入 {}x{} | 置信度 {:.2} | 保持比例 {} | 插值 {:?}",
            self.model_input_size,
            self.model_input_size,
            self.confidence_threshold,
            self.maintain_aspect,
            self.interpolation
        );
        info!(
            "🎛️ 预览 {}x{} | 后台线程 {} | 硬件加速 {} | 检测线程 {:?}",
            self.preview_width,
            self.preview_height,
            self.background_threads,
            self.use_accelerator,
            self.detector_threads
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert_eq!(config.model_input_size, 300);
        assert_eq!(config.confidence_threshold, 0.5);
        assert!(!config.maintain_aspect);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"confidence_threshold":0.7,"interpolation":"bilinear"}"#)
                .unwrap();
        assert_eq!(config.confidence_threshold, 0.7);
        assert_eq!(config.interpolation, InterpolationMethod::Bilinear);
        assert_eq!(config.preview_width, 640);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            PipelineConfig {
                model_input_size: 0,
                ..Default::default()
            },
            PipelineConfig {
                confidence_threshold: 1.5,
                ..Default::default()
            },
            PipelineConfig {
                background_threads: 0,
                ..Default::default()
            },
            PipelineConfig {
                detector_threads: Some(0),
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
        }
    }

    #[test]
    fn missing_file_falls_back_to_default() {
        let config = PipelineConfig::load("/definitely/not/here.json");
        assert_eq!(config, PipelineConfig::default());
    }
}
