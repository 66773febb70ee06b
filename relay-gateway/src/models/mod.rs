pub mod error;
pub mod request;
pub mod response;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use request::{
    parse_json_body, ApiKey, CreateTaskRequest, CredentialRequest, UpstreamTaskPayload,
};
pub use response::{HealthResponse, RelayedResponse, ServiceStatus, UploadResponse};
