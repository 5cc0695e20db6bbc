use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No filename provided")]
    MissingFilename,

    #[error("File extension '{extension}' is not allowed (accepted: {allowed})")]
    DisallowedExtension { extension: String, allowed: String },

    #[error("Content type {} is not an image type", .0.as_deref().unwrap_or("<missing>"))]
    MissingOrNonImageContentType(Option<String>),

    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },
}

/// Cheap checks on upload metadata, run before any decoding.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    allowed_extensions: BTreeSet<String>,
    max_upload_bytes: usize,
}

impl ImageValidator {
    pub fn new<I, S>(allowed_extensions: I, max_upload_bytes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    pub fn allowed_extensions(&self) -> impl Iterator<Item = &str> {
        self.allowed_extensions.iter().map(String::as_str)
    }

    pub fn validate(
        &self,
        filename: Option<&str>,
        content_type: Option<&str>,
        byte_length: usize,
    ) -> Result<(), ValidationError> {
        let filename = filename
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or(ValidationError::MissingFilename)?;

        let extension = filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::DisallowedExtension {
                extension,
                allowed: self.allowed_extensions().collect::<Vec<_>>().join(", "),
            });
        }

        let is_image = content_type
            .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false);
        if !is_image {
            return Err(ValidationError::MissingOrNonImageContentType(
                content_type.map(str::to_string),
            ));
        }

        if byte_length > self.max_upload_bytes {
            return Err(ValidationError::PayloadTooLarge {
                size: byte_length,
                limit: self.max_upload_bytes,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ImageValidator {
        ImageValidator::new(["jpg", "jpeg", "png", "bmp", "tiff", "webp"], 10 * 1024 * 1024)
    }

    #[test]
    fn test_accepts_image_upload() {
        assert_eq!(
            validator().validate(Some("cat.png"), Some("image/png"), 1000),
            Ok(())
        );
        assert_eq!(
            validator().validate(Some("IMG_0001.JPEG"), Some("Image/JPEG"), 1),
            Ok(())
        );
    }

    #[test]
    fn test_rejects_executable() {
        let err = validator()
            .validate(Some("malware.exe"), Some("application/octet-stream"), 1000)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::DisallowedExtension {
                extension: "exe".to_string(),
                allowed: "bmp, jpeg, jpg, png, tiff, webp".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_filename() {
        for name in [None, Some(""), Some("   ")] {
            assert_eq!(
                validator().validate(name, Some("image/png"), 10),
                Err(ValidationError::MissingFilename)
            );
        }
    }

    #[test]
    fn test_filename_without_extension() {
        let err = validator()
            .validate(Some("README"), Some("image/png"), 10)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::DisallowedExtension { ref extension, .. } if extension.is_empty()
        ));
    }

    #[test]
    fn test_content_type_must_be_image() {
        assert_eq!(
            validator().validate(Some("a.png"), None, 10),
            Err(ValidationError::MissingOrNonImageContentType(None))
        );
        assert_eq!(
            validator().validate(Some("a.png"), Some("text/plain"), 10),
            Err(ValidationError::MissingOrNonImageContentType(Some(
                "text/plain".to_string()
            )))
        );
    }

    #[test]
    fn test_payload_limit_is_inclusive() {
        let validator = ImageValidator::new(["png"], 100);
        assert_eq!(validator.validate(Some("a.png"), Some("image/png"), 100), Ok(()));
        assert_eq!(
            validator.validate(Some("a.png"), Some("image/png"), 101),
            Err(ValidationError::PayloadTooLarge {
                size: 101,
                limit: 100
            })
        );
    }

    #[test]
    fn test_allow_set_ignores_case_and_dots() {
        let validator = ImageValidator::new([".PNG"], 100);
        assert!(validator.validate(Some("a.png"), Some("image/png"), 1).is_ok());
    }

    #[test]
    fn test_empty_payload_passes_to_decoder() {
        // Emptiness is the decoder's call
        assert!(validator().validate(Some("a.png"), Some("image/png"), 0).is_ok());
    }
}
