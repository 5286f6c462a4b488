use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use crate::config::ApiConfig;
use crate::core::{
    FilePayload,
    ReadLocation,
    RecordedUpload,
    Result,
    TransferError,
    UploadApi,
    UploadRecord,
    UploadTarget,
};
use super::wire::{
    CreateOrderResponse,
    NewOrder,
    ReadUrlResponse,
    RecordUploadRequest,
    RecordUploadResponse,
    SaveTextRequest,
    StatusResponse,
    UploadUrlRequest,
    UploadUrlResponse,
};

/// `UploadApi` over the order backend's JSON endpoints.
#[derive(Debug, Clone)]
pub struct HttpUploadApi {
    client: Client,
    base_url: Url,
}

impl HttpUploadApi {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;

        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|token| !token.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|err| TransferError::Config(format!("invalid api token: {err}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Absolute write urls are used as-is, relative ones hang off the base url.
    fn resolve(&self, location: &str) -> Result<String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Ok(location.to_string())
        } else {
            Ok(self.base_url.join(location)?.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str(&body) {
            Ok(value) => Ok(value),
            // Non-JSON error pages still carry a useful status
            Err(_) if !status.is_success() => Err(TransferError::api(format!("Request failed with status {status}"))),
            Err(err) => Err(err.into()),
        }
    }

    /// Create an order from the funnel; returns the new order id.
    pub async fn create_order(&self, order: &NewOrder) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("api/orders")?)
            .json(order)
            .send()
            .await?;

        Self::read_json::<CreateOrderResponse>(response).await?.into_order_id()
    }

    /// Store the free-text notes the customer entered for one area.
    pub async fn save_area_text(&self, order_id: &str, area: &str, text: &str) -> Result<()> {
        let url = self.endpoint(&format!("api/orders/{order_id}/texts"))?;
        let response = self
            .client
            .post(url)
            .json(&SaveTextRequest { area, text })
            .send()
            .await?;

        Self::read_json::<StatusResponse>(response)
            .await?
            .into_result("Failed to save text")
    }
}

#[async_trait]
impl UploadApi for HttpUploadApi {
    async fn get_upload_url(
        &self,
        order_id: &str,
        area: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadTarget> {
        let request = UploadUrlRequest { order_id, area, filename, content_type };
        let response = self
            .client
            .post(self.endpoint("api/uploads/url")?)
            .json(&request)
            .send()
            .await?;

        let raw = Self::read_json::<UploadUrlResponse>(response).await?.into_target()?;
        Ok(UploadTarget {
            upload_url: self.resolve(&raw.upload_url)?,
            path: raw.path,
            public_url: raw.public_url,
        })
    }

    async fn transfer(&self, upload_url: &str, file: &FilePayload) -> Result<()> {
        let response = self
            .client
            .put(upload_url)
            .header(CONTENT_TYPE, file.content_type.as_str())
            .body(file.content.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, file = %file.name, "storage rejected upload");
            return Err(TransferError::UploadRejected { status: status.as_u16() });
        }

        Ok(())
    }

    async fn record_upload(&self, record: &UploadRecord) -> Result<RecordedUpload> {
        let request = RecordUploadRequest {
            order_id: &record.order_id,
            area: &record.area,
            path: &record.path,
            content_type: &record.content_type,
            size: record.size,
        };
        let response = self
            .client
            .post(self.endpoint("api/uploads")?)
            .json(&request)
            .send()
            .await?;

        Self::read_json::<RecordUploadResponse>(response).await?.into_recorded()
    }

    async fn get_read_url(&self, order_id: &str, upload_id: &str) -> Result<ReadLocation> {
        let mut url = self.endpoint(&format!("api/uploads/{upload_id}/url"))?;
        url.query_pairs_mut().append_pair("orderId", order_id);

        let response = self.client.get(url).send().await?;
        Self::read_json::<ReadUrlResponse>(response).await?.into_location()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base_url: &str) -> HttpUploadApi {
        HttpUploadApi::new(&ApiConfig {
            base_url: base_url.to_string(),
            token: Some("secret".to_string()),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoints_join_base_url() {
        let api = api("https://bauklar.example/");

        assert_eq!(
            api.endpoint("api/uploads/url").unwrap().as_str(),
            "https://bauklar.example/api/uploads/url"
        );
    }

    #[test]
    fn test_relative_write_url_is_resolved() {
        let api = api("https://bauklar.example/");

        assert_eq!(
            api.resolve("/storage/put/abc?sig=1").unwrap(),
            "https://bauklar.example/storage/put/abc?sig=1"
        );
        assert_eq!(
            api.resolve("https://bucket.example/put/abc").unwrap(),
            "https://bucket.example/put/abc"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = HttpUploadApi::new(&ApiConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        });

        assert!(matches!(result, Err(TransferError::Url(_))));
    }
}
