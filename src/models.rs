use bytes::Bytes;

use crate::error::AppError;
use crate::services::dataset::{self, Dataset, FileFormat};

/// A file received from a multipart upload, held only for one request.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub format: FileFormat,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn display_name(&self) -> &str {
        self.file_name.as_deref().unwrap_or("<unnamed>")
    }

    pub fn into_dataset(self, max_bytes: usize) -> Result<Dataset, AppError> {
        dataset::load(self.bytes, self.format, max_bytes)
    }
}
