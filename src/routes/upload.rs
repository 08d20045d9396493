use axum::extract::Multipart;
use bytes::BytesMut;

use crate::error::AppError;
use crate::models::UploadedFile;
use crate::services::dataset::FileFormat;

pub const FILE_FIELD: &str = "file";

/// Reads the `file` field of a multipart body. The format is checked from
/// the file name before the body is read, and reading stops as soon as the
/// buffered bytes pass `max_bytes`.
pub async fn read_upload(mut multipart: Multipart, max_bytes: usize) -> Result<UploadedFile, AppError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            tracing::debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let format = FileFormat::from_file_name(file_name.as_deref())?;

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.chunk().await? {
            let size = buf.len() + chunk.len();
            if size > max_bytes {
                return Err(AppError::FileTooLarge { size, limit: max_bytes });
            }
            buf.extend_from_slice(&chunk);
        }

        return Ok(UploadedFile { file_name, format, bytes: buf.freeze() });
    }

    Err(AppError::InvalidInput(format!("No file provided in the '{}' field", FILE_FIELD)))
}
