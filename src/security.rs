use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::config::UploaderConfig;
use crate::errors::{AppError, AppResult};
use crate::models::SelectedFile;
use crate::uploader::ports::Validator;

/// Characters `encodeURI` leaves untouched.
const URI_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

pub const MAX_APP_NAME_CHARS: usize = 64;

pub struct InputValidator;

impl InputValidator {
    pub fn validate_app_name(name: &str) -> AppResult<()> {
        let trimmed = name.trim();

        if trimmed.is_empty() {
            return Err(AppError::validation("name", "Name cannot be empty"));
        }

        if trimmed.chars().count() > MAX_APP_NAME_CHARS {
            return Err(AppError::validation(
                "name",
                "Name must be between 1 and 64 characters",
            ));
        }

        Ok(())
    }

    pub fn validate_file_name(name: &str) -> AppResult<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::validation("file_name", "File name cannot be empty"));
        }

        // A bare name: no separators and not a relative path component
        if name.contains('/') || name.contains('\\') || trimmed == "." || trimmed == ".." {
            return Err(AppError::validation("file_name", "Invalid file name detected"));
        }

        Ok(())
    }

    /// Lower-cased extension of `name`, if it has one.
    pub fn file_extension(name: &str) -> Option<String> {
        Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }

    pub fn sanitize_filename(filename: &str) -> String {
        let unsafe_chars = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();
        let sanitized = unsafe_chars.replace_all(filename.trim(), "_");

        if sanitized.chars().count() > 255 {
            sanitized.chars().take(252).collect::<String>() + "..."
        } else {
            sanitized.to_string()
        }
    }

    /// Percent-encode a file name the way `encodeURI` does.
    pub fn encode_attachment_filename(name: &str) -> String {
        utf8_percent_encode(name, URI_RESERVED).to_string()
    }
}

/// Extension allow-list and size limit applied before any upload.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    accepted_extensions: Vec<String>,
    max_file_size_mb: u64,
}

impl ImageValidator {
    pub fn new(accepted_extensions: &[String], max_file_size_mb: u64) -> Self {
        Self {
            accepted_extensions: accepted_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            max_file_size_mb,
        }
    }

    pub fn from_config(config: &UploaderConfig) -> Self {
        Self::new(&config.accepted_extensions, config.max_file_size_mb)
    }

    fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Validator for ImageValidator {
    fn check(&self, file: &SelectedFile) -> AppResult<()> {
        InputValidator::validate_file_name(&file.name)?;

        match InputValidator::file_extension(&file.name) {
            Some(ext) if self.accepted_extensions.contains(&ext) => {}
            _ => return Err(AppError::invalid_file_type(&file.name)),
        }

        if file.size == 0 {
            return Err(AppError::validation("file", "File is empty"));
        }

        if file.size > self.max_file_size_bytes() {
            return Err(AppError::file_too_large(&file.name, self.max_file_size_mb));
        }

        Ok(())
    }
}

// File system security utilities
pub struct FileSystemGuard;

impl FileSystemGuard {
    pub fn secure_temp_dir() -> PathBuf {
        std::env::temp_dir().join("app_icon_uploader_secure")
    }

    pub fn create_secure_temp_file(extension: &str) -> AppResult<PathBuf> {
        let temp_dir = Self::secure_temp_dir();
        std::fs::create_dir_all(&temp_dir)?;

        let random_name = uuid::Uuid::new_v4().to_string();
        let extension = InputValidator::sanitize_filename(extension);
        let extension = if extension.is_empty() {
            "tmp".to_string()
        } else {
            extension
        };

        Ok(temp_dir.join(format!("{}.{}", random_name, extension)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> ImageValidator {
        ImageValidator::from_config(&UploaderConfig::default())
    }

    #[test]
    fn test_validate_app_name() {
        assert!(InputValidator::validate_app_name("My App").is_ok());
        assert!(InputValidator::validate_app_name(&"a".repeat(64)).is_ok());
        assert!(InputValidator::validate_app_name(&"应".repeat(64)).is_ok());

        assert!(InputValidator::validate_app_name("").is_err());
        assert!(InputValidator::validate_app_name("   ").is_err());
        assert!(InputValidator::validate_app_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_encode_attachment_filename_matches_encode_uri() {
        assert_eq!(InputValidator::encode_attachment_filename("photo.jpg"), "photo.jpg");
        assert_eq!(
            InputValidator::encode_attachment_filename("my photo (1).png"),
            "my%20photo%20(1).png"
        );
        assert_eq!(
            InputValidator::encode_attachment_filename("图片.png"),
            "%E5%9B%BE%E7%89%87.png"
        );
        assert_eq!(InputValidator::encode_attachment_filename("100%.gif"), "100%25.gif");
        assert_eq!(InputValidator::encode_attachment_filename("a&b=c#d.jpg"), "a&b=c#d.jpg");
    }

    #[test]
    fn test_image_validator_accepts_allowed_extensions() {
        let validator = validator();
        for name in ["a.jpg", "b.JPEG", "c.png", "d.gif"] {
            let file = SelectedFile::new(name, vec![0u8; 200 * 1024]);
            assert!(validator.check(&file).is_ok(), "{} should be accepted", name);
        }
    }

    #[test]
    fn test_image_validator_rejects_other_files() {
        let validator = validator();

        let pdf = SelectedFile::new("doc.pdf", vec![0u8; 10]);
        assert!(matches!(
            validator.check(&pdf),
            Err(AppError::InvalidFileType { .. })
        ));

        let no_ext = SelectedFile::new("photo", vec![0u8; 10]);
        assert!(validator.check(&no_ext).is_err());

        let webp = SelectedFile::new("photo.webp", vec![0u8; 10]);
        assert!(validator.check(&webp).is_err());

        let empty = SelectedFile::new("photo.png", Vec::new());
        assert!(validator.check(&empty).is_err());

        let traversal = SelectedFile::new("../photo.png", vec![0u8; 10]);
        assert!(validator.check(&traversal).is_err());
    }

    #[test]
    fn test_image_validator_enforces_size_limit() {
        let validator = ImageValidator::new(&[".png".to_string()], 1);

        let ok = SelectedFile::new("a.png", vec![0u8; 1024 * 1024]);
        assert!(validator.check(&ok).is_ok());

        let too_big = SelectedFile::new("a.png", vec![0u8; 1024 * 1024 + 1]);
        assert!(matches!(
            validator.check(&too_big),
            Err(AppError::FileTooLarge { max_mb: 1, .. })
        ));
    }

    #[test]
    fn test_image_validator_huge_limit_does_not_overflow() {
        let validator = ImageValidator::new(&["png".to_string()], u64::MAX / 1024);
        let file = SelectedFile::new("a.png", vec![0u8; 16]);
        assert!(validator.check(&file).is_ok());
    }

    #[test]
    fn test_validate_file_name() {
        assert!(InputValidator::validate_file_name("my..photo.png").is_ok());
        assert!(InputValidator::validate_file_name("photo.png").is_ok());

        assert!(InputValidator::validate_file_name("..").is_err());
        assert!(InputValidator::validate_file_name("../photo.png").is_err());
        assert!(InputValidator::validate_file_name("dir\\photo.png").is_err());
        assert!(InputValidator::validate_file_name("  ").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        let safe = InputValidator::sanitize_filename("icon<script>.png");
        assert!(!safe.contains('<'));
        assert!(!safe.contains('>'));
    }

    #[test]
    fn test_create_secure_temp_file() {
        let path = FileSystemGuard::create_secure_temp_file("png").unwrap();
        assert!(path.to_string_lossy().contains("app_icon_uploader_secure"));
        assert_eq!(path.extension().unwrap(), "png");
    }
}
