use async_trait::async_trait;
use crate::compress::CompressOptions;
use super::errors::Result;
use super::types::{FilePayload, UploadTask};

/// 服务端签发的上传地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// 预签名地址，接受一次 PUT
    pub upload_url: String,
    /// 存储路径，记录上传时回传
    pub path: String,
    pub public_url: String,
}

/// 写入订单的上传元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub order_id: String,
    pub area: String,
    pub path: String,
    pub content_type: String,
    pub size: u64,
}

/// 记录上传的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub id: String,
    pub public_url: String,
}

/// 有时效的读取地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadLocation {
    pub url: String,
    pub expires_in: u64,
}

/// 上传接口 trait - 上传流程依赖的远端操作
#[async_trait]
pub trait UploadApi: Send + Sync {
    async fn get_upload_url(
        &self,
        order_id: &str,
        area: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadTarget>;

    /// 将文件内容 PUT 到上传地址
    async fn transfer(&self, upload_url: &str, file: &FilePayload) -> Result<()>;

    async fn record_upload(&self, record: &UploadRecord) -> Result<RecordedUpload>;

    /// 此步骤失败不会导致任务失败
    async fn get_read_url(&self, order_id: &str, upload_id: &str) -> Result<ReadLocation>;
}

/// 图片压缩器
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(&self, file: &FilePayload, options: &CompressOptions) -> Result<FilePayload>;
}

/// 任务观察者 - 每次任务变化时收到快照
pub trait TaskObserver: Send + Sync {
    fn on_task_changed(&self, task: &UploadTask);
}

impl<F> TaskObserver for F
where
    F: Fn(&UploadTask) + Send + Sync,
{
    fn on_task_changed(&self, task: &UploadTask) {
        self(task)
    }
}
