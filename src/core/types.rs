use std::fmt;
use std::time::Duration;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::compress::CompressOptions;
use crate::utils::RetryStrategy;
use super::errors::{Result, TransferError};

// 配置文件中的 Duration 以毫秒存储
pub(crate) fn serialize_millis<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis = u64::deserialize(deserializer)?;
    Ok(Duration::from_millis(millis))
}

/// 上传任务唯一标识（入队时生成）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct UploadId(pub Uuid);

impl UploadId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上传状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// 等待中（初始状态，自动重试后也回到此状态）
    Pending,
    /// 压缩中（仅图片）
    Compressing,
    /// 上传中（获取上传地址并传输）
    Uploading,
    /// 记录中（写入订单元数据）
    Recording,
    /// 已完成
    Completed,
    /// 失败（重试次数耗尽，等待手动重试）
    Failed,
}

impl UploadStatus {
    /// 是否占用并发槽位
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Compressing | Self::Uploading | Self::Recording)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// 计入 `UploadQueue::active_count`
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn is_valid_transition(from: Self, to: Self) -> bool {
        use UploadStatus::*;

        match (from, to) {
            (Pending, Compressing) => true,
            (Compressing, Uploading) | (Uploading, Recording) | (Recording, Completed) => true,
            (Compressing | Uploading | Recording, Pending | Failed) => true,
            // 关闭时未获得槽位的任务直接失败
            (Pending, Failed) => true,
            (Failed, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Compressing => "compressing",
            Self::Uploading => "uploading",
            Self::Recording => "recording",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// 待上传文件
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePayload {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    #[serde(skip_serializing)]
    pub content: Bytes,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size: content.len() as u64,
            content,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// 上传任务快照
///
/// 队列持有唯一的权威副本，观察者和读取方只拿到克隆
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTask {
    pub id: UploadId,
    pub order_id: String,
    pub area: String,
    pub file: FilePayload,
    pub status: UploadStatus,
    /// 0..=100，单次尝试内不回退
    pub progress: u8,
    pub retries: u32,
    pub error: Option<String>,
    /// 读取地址，获取失败时为记录步骤返回的公开地址
    pub result_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UploadTask {
    pub fn new(order_id: impl Into<String>, area: impl Into<String>, file: FilePayload) -> Self {
        Self {
            id: UploadId::new(),
            order_id: order_id.into(),
            area: area.into(),
            file,
            status: UploadStatus::Pending,
            progress: 0,
            retries: 0,
            error: None,
            result_url: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// 各阶段上报的进度值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressMarks {
    pub compressing: u8,
    pub uploading: u8,
    pub transferring: u8,
    pub transferred: u8,
    pub recording: u8,
    pub resolving: u8,
}

impl Default for ProgressMarks {
    fn default() -> Self {
        Self {
            compressing: 10,
            uploading: 30,
            transferring: 40,
            transferred: 70,
            recording: 80,
            resolving: 90,
        }
    }
}

impl ProgressMarks {
    fn as_array(&self) -> [u8; 6] {
        [
            self.compressing,
            self.uploading,
            self.transferring,
            self.transferred,
            self.recording,
            self.resolving,
        ]
    }
}

/// 队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 最大并发数
    pub concurrency: usize,
    /// 标记失败前的自动重试次数
    pub max_retries: u32,
    /// 重试策略
    pub retry: RetryStrategy,
    /// 单个步骤的超时时间
    #[serde(
        rename = "operation_timeout_ms",
        serialize_with = "serialize_millis",
        deserialize_with = "deserialize_millis"
    )]
    pub operation_timeout: Duration,
    pub progress: ProgressMarks,
    pub compression: CompressOptions,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 2,
            retry: RetryStrategy::default(),
            operation_timeout: Duration::from_secs(60),
            progress: ProgressMarks::default(),
            compression: CompressOptions::default(),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(TransferError::Config("concurrency must be at least 1".to_string()));
        }

        if self.operation_timeout.is_zero() {
            return Err(TransferError::Config("operation timeout must be positive".to_string()));
        }

        let marks = self.progress.as_array();
        if marks.windows(2).any(|pair| pair[0] > pair[1]) || marks[marks.len() - 1] >= 100 {
            return Err(TransferError::Config(
                "progress marks must be non-decreasing and below 100".to_string(),
            ));
        }

        Ok(())
    }
}

/// 队列统计信息
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub completed: usize,
    pub failed: usize,
    /// 未失败任务的平均进度
    pub overall_progress: f64,
}
