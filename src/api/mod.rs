mod http;
mod wire;

pub use http::HttpUploadApi;
pub use wire::NewOrder;
