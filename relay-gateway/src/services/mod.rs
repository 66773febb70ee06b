pub mod upload;
pub mod upstream;

pub use upload::{FileRecord, PendingUpload, UploadCoordinator, UploadResult};
pub use upstream::{Operation, RawResponse, UpstreamClient};
