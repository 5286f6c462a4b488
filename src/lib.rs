//! Background upload queue for the Bauklar order funnel.
//!
//! Files attached to an order are compressed, transferred to a pre-signed
//! storage location and recorded against the order, with bounded
//! concurrency and automatic retries. UI code observes task snapshots and
//! never mutates queue state directly.

pub mod api;
pub mod compress;
pub mod config;
pub mod core;
pub mod utils;

// Re-export the core types
pub use crate::core::{
    Compressor,
    FilePayload,
    QueueConfig,
    QueueStats,
    Result,
    Subscription,
    TaskObserver,
    TransferError,
    UploadApi,
    UploadId,
    UploadQueue,
    UploadQueueBuilder,
    UploadStatus,
    UploadTask,
};

pub use api::{HttpUploadApi, NewOrder};
pub use compress::{CompressOptions, PassthroughCompressor};
pub use config::Config;
