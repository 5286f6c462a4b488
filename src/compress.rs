//! Compression options and the default pass-through compressor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::core::{Compressor, FilePayload, Result};

/// 图片压缩参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// 编码质量，0.0..=1.0
    pub quality: f32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1920,
            quality: 0.8,
        }
    }
}

/// 直通压缩器 - 原样返回输入
///
/// 未接入图片编码器时使用，任务仍会经过压缩阶段
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompressor;

#[async_trait]
impl Compressor for PassthroughCompressor {
    async fn compress(&self, file: &FilePayload, _options: &CompressOptions) -> Result<FilePayload> {
        Ok(file.clone())
    }
}
