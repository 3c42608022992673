//! Checks applied to an uploaded image part before it reaches the pipeline.
//!
//! Only the declared media type and the byte count are looked at here.
//! Whether the bytes decode as an image is decided by fingerprinting.

use crate::error::ApiError;

const MIB: usize = 1024 * 1024;

/// Per-upload byte limit when none is configured.
pub const DEFAULT_MAX_FILE_SIZE: usize = 25 * MIB;

/// `image/*` or `application/octet-stream`, ignoring case and parameters.
fn is_image_media_type(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let Some((kind, subtype)) = essence.split_once('/') else {
        return false;
    };
    if subtype.is_empty() {
        return false;
    }
    kind.eq_ignore_ascii_case("image")
        || (kind.eq_ignore_ascii_case("application")
            && subtype.eq_ignore_ascii_case("octet-stream"))
}

/// Reject parts declared as something other than an image.
///
/// An undeclared part passes; the decoder has the final word.
pub fn validate_content_type(content_type: Option<&str>) -> Result<(), ApiError> {
    match content_type {
        Some(declared) if !is_image_media_type(declared) => Err(ApiError::bad_request(format!(
            "Unsupported Content-Type '{}': upload an image/* or application/octet-stream part",
            declared
        ))),
        _ => Ok(()),
    }
}

/// Reject empty uploads and uploads over `max_size` bytes.
pub fn validate_file_size(size: usize, max_size: usize) -> Result<(), ApiError> {
    if size == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    if size > max_size {
        return Err(ApiError::bad_request(format!(
            "File too large: {} bytes exceeds the {} MB limit",
            size,
            max_size.div_ceil(MIB)
        )));
    }
    Ok(())
}
