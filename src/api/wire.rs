//! JSON bodies exchanged with the order backend.

use serde::{Deserialize, Serialize};
use crate::core::{ReadLocation, RecordedUpload, Result, TransferError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadUrlRequest<'a> {
    pub order_id: &'a str,
    pub area: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadUrlResponse {
    pub success: bool,
    pub error: Option<String>,
    pub upload_url: Option<String>,
    pub path: Option<String>,
    pub public_url: Option<String>,
}

/// Write location before the upload url is resolved against the base url.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct RawUploadTarget {
    pub upload_url: String,
    pub path: String,
    pub public_url: String,
}

impl UploadUrlResponse {
    pub fn into_target(self) -> Result<RawUploadTarget> {
        const FALLBACK: &str = "Failed to get upload URL";

        if !self.success {
            return Err(api_error(self.error, FALLBACK));
        }

        match (self.upload_url, self.path) {
            (Some(upload_url), Some(path)) => Ok(RawUploadTarget {
                upload_url,
                path,
                public_url: self.public_url.unwrap_or_default(),
            }),
            _ => Err(TransferError::api(FALLBACK)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordUploadRequest<'a> {
    pub order_id: &'a str,
    pub area: &'a str,
    pub path: &'a str,
    pub content_type: &'a str,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadRecordBody {
    pub id: String,
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordUploadResponse {
    pub success: bool,
    pub error: Option<String>,
    pub upload: Option<UploadRecordBody>,
}

impl RecordUploadResponse {
    pub fn into_recorded(self) -> Result<RecordedUpload> {
        const FALLBACK: &str = "Failed to record upload";

        if !self.success {
            return Err(api_error(self.error, FALLBACK));
        }

        let upload = self.upload.ok_or_else(|| TransferError::api(FALLBACK))?;
        Ok(RecordedUpload {
            id: upload.id,
            public_url: upload.public_url.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadUrlResponse {
    pub success: bool,
    pub error: Option<String>,
    pub url: Option<String>,
    pub expires_in: Option<u64>,
}

impl ReadUrlResponse {
    pub fn into_location(self) -> Result<ReadLocation> {
        const FALLBACK: &str = "Failed to get read URL";

        if !self.success {
            return Err(api_error(self.error, FALLBACK));
        }

        let url = self.url.ok_or_else(|| TransferError::api(FALLBACK))?;
        Ok(ReadLocation {
            url,
            expires_in: self.expires_in.unwrap_or_default(),
        })
    }
}

/// New order submitted from the funnel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub property_address: String,
    /// Inspection package chosen in the funnel
    pub package: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateOrderResponse {
    pub success: bool,
    pub error: Option<String>,
    pub order_id: Option<String>,
}

impl CreateOrderResponse {
    pub fn into_order_id(self) -> Result<String> {
        const FALLBACK: &str = "Failed to create order";

        if !self.success {
            return Err(api_error(self.error, FALLBACK));
        }
        self.order_id.ok_or_else(|| TransferError::api(FALLBACK))
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SaveTextRequest<'a> {
    pub area: &'a str,
    pub text: &'a str,
}

/// Body of calls that only report success.
#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn into_result(self, fallback: &str) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(api_error(self.error, fallback))
        }
    }
}

fn api_error(error: Option<String>, fallback: &str) -> TransferError {
    match error {
        Some(message) if !message.trim().is_empty() => TransferError::api(message),
        _ => TransferError::api(fallback),
    }
}
