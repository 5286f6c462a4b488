mod errors;
mod observer;
mod queue;
mod store;
mod traits;
pub(crate) mod types;
mod worker;


pub use errors::{Result, TransferError};
pub use observer::Subscription;
pub use queue::{UploadQueue, UploadQueueBuilder};
pub use traits::{
    Compressor,
    ReadLocation,
    RecordedUpload,
    TaskObserver,
    UploadApi,
    UploadRecord,
    UploadTarget,
};
pub use types::{
    FilePayload,
    ProgressMarks,
    QueueConfig,
    QueueStats,
    UploadId,
    UploadStatus,
    UploadTask,
};
