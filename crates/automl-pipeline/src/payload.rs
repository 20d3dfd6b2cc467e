//! Local image loading for online prediction.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use automl_client::ImageInstance;
use automl_models::{ImageFormat, MAX_IMAGE_BYTES};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{PipelineError, PipelineResult};

/// An image read from disk together with its pixel dimensions.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    bytes: Vec<u8>,
}

impl ImagePayload {
    /// Read an image, enforcing the supported formats and the size limit.
    pub async fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let format = ImageFormat::from_path(&path.to_string_lossy())
            .ok_or_else(|| PipelineError::UnsupportedImage(path.to_path_buf()))?;

        let size = tokio::fs::metadata(path).await?.len();
        if size > MAX_IMAGE_BYTES {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                size,
                max: MAX_IMAGE_BYTES,
            });
        }

        let bytes = tokio::fs::read(path).await?;
        let (width, height) = image::io::Reader::new(Cursor::new(&bytes))
            .with_guessed_format()?
            .into_dimensions()?;

        Ok(Self {
            path: path.to_path_buf(),
            format,
            width,
            height,
            bytes,
        })
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    /// Base64 payload for a predict request.
    pub fn to_instance(&self) -> ImageInstance {
        ImageInstance {
            content: STANDARD.encode(&self.bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loads_dimensions_and_encodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("salad.png");
        image::RgbImage::new(64, 48).save(&path).unwrap();

        let payload = ImagePayload::from_path(&path).await.unwrap();
        assert_eq!(payload.format, ImageFormat::Png);
        assert_eq!((payload.width, payload.height), (64, 48));

        let decoded = STANDARD.decode(payload.to_instance().content).unwrap();
        assert_eq!(decoded.len(), payload.size_bytes());
    }

    #[tokio::test]
    async fn test_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("salad.tiff");
        std::fs::write(&path, b"not really").unwrap();

        assert!(matches!(
            ImagePayload::from_path(&path).await,
            Err(PipelineError::UnsupportedImage(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_undecodable_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("salad.jpg");
        std::fs::write(&path, b"plain text, not a jpeg").unwrap();

        assert!(ImagePayload::from_path(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file() {
        assert!(matches!(
            ImagePayload::from_path("/nonexistent/salad.png").await,
            Err(PipelineError::Io(_))
        ));
    }
}
