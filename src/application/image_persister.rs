// Image persistence - decode embedded payloads and hand them to blob storage
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;

use crate::application::blob_store::BlobStore;
use crate::domain::image::ImageRecord;
use crate::error::{RelayError, Result};

const JPEG_QUALITY: u8 = 85;

/// Decodes base64 image payloads and writes them through the blob-storage
/// collaborator. Safe to call from racing contexts: each call fully writes
/// its own file before the caller publishes the handle, so the last merge
/// wins and no reader ever sees a partial image.
pub struct ImagePersister {
    store: Arc<dyn BlobStore>,
}

impl ImagePersister {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Decode `encoded` (optionally `data:image/...;base64,`-prefixed) and
    /// persist it. With a filename hint the raster is re-encoded as JPEG at
    /// quality 85; without one the already-compressed bytes are written
    /// unchanged under a generated name.
    pub async fn persist(&self, encoded: &str, hint: Option<&str>) -> Result<ImageRecord> {
        let raw = strip_data_uri(encoded);
        let bytes = BASE64
            .decode(raw.trim())
            .map_err(|e| RelayError::Decode(format!("invalid base64 image payload: {e}")))?;

        let format = image::guess_format(&bytes)
            .map_err(|e| RelayError::Decode(format!("not a decodable image: {e}")))?;

        let stamp = Utc::now().timestamp();
        let (filename, output) = match hint {
            Some(hint) => {
                let raster = image::load_from_memory(&bytes)
                    .map_err(|e| RelayError::Decode(format!("image decode failed: {e}")))?;
                let mut out = Vec::new();
                let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
                encoder
                    .encode_image(&raster.into_rgb8())
                    .map_err(|e| RelayError::Decode(format!("jpeg re-encode failed: {e}")))?;
                (format!("{stamp}_{}.jpg", stem(&sanitize_filename(hint))), out)
            }
            None => {
                let ext = format.extensions_str().first().copied().unwrap_or("jpg");
                (format!("{stamp}_capture.{ext}"), bytes)
            }
        };

        let size = self.store.write(&filename, &output).await?;
        Ok(ImageRecord::new(filename, size))
    }
}

/// Drop a `data:image/...;base64,` prefix. When no separator is present the
/// whole string is treated as raw base64.
fn strip_data_uri(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        encoded
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or(encoded)
    } else {
        encoded
    }
}

/// Reduce a caller-supplied filename to a single safe path component:
/// keep the final segment, allow only `[A-Za-z0-9._-]`, and squash any
/// remaining `..` runs so storage never sees a traversal.
fn sanitize_filename(hint: &str) -> String {
    let base = hint.rsplit(['/', '\\']).next().unwrap_or(hint);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let mut cleaned = cleaned;
    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", "_");
    }
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "capture".to_string()
    } else {
        cleaned
    }
}

fn stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryBlobStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn write(&self, name: &str, bytes: &[u8]) -> Result<u64> {
            self.blobs
                .lock()
                .unwrap()
                .insert(name.to_string(), bytes.to_vec());
            Ok(bytes.len() as u64)
        }

        async fn list(&self) -> Result<Vec<String>> {
            Ok(self.blobs.lock().unwrap().keys().cloned().collect())
        }

        async fn delete_all(&self) -> Result<()> {
            self.blobs.lock().unwrap().clear();
            Ok(())
        }
    }

    fn png_base64() -> String {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        BASE64.encode(out)
    }

    #[tokio::test]
    async fn test_non_base64_input_is_a_decode_error() {
        let persister = ImagePersister::new(Arc::new(MemoryBlobStore::default()));
        let err = persister.persist("%%% not base64 %%%", None).await.unwrap_err();
        assert!(matches!(err, RelayError::Decode(_)));
    }

    #[tokio::test]
    async fn test_non_image_bytes_are_a_decode_error() {
        let persister = ImagePersister::new(Arc::new(MemoryBlobStore::default()));
        let encoded = BASE64.encode(b"definitely not pixels");
        let err = persister.persist(&encoded, None).await.unwrap_err();
        assert!(matches!(err, RelayError::Decode(_)));
    }

    #[tokio::test]
    async fn test_hinted_persist_reencodes_to_jpeg() {
        let store = Arc::new(MemoryBlobStore::default());
        let persister = ImagePersister::new(store.clone());

        let record = persister
            .persist(&png_base64(), Some("shot.png"))
            .await
            .unwrap();

        assert!(record.filename.ends_with("_shot.jpg"));
        assert!(record.size > 0);
        let blobs = store.blobs.lock().unwrap();
        let stored = blobs.get(&record.filename).unwrap();
        assert_eq!(image::guess_format(stored).unwrap(), image::ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn test_unhinted_persist_writes_raw_bytes() {
        let store = Arc::new(MemoryBlobStore::default());
        let persister = ImagePersister::new(store.clone());
        let encoded = png_base64();

        let record = persister.persist(&encoded, None).await.unwrap();

        assert!(record.filename.ends_with("_capture.png"));
        let blobs = store.blobs.lock().unwrap();
        assert_eq!(blobs.get(&record.filename).unwrap(), &BASE64.decode(encoded).unwrap());
    }

    #[tokio::test]
    async fn test_data_uri_prefix_is_stripped() {
        let persister = ImagePersister::new(Arc::new(MemoryBlobStore::default()));
        let encoded = format!("data:image/png;base64,{}", png_base64());
        assert!(persister.persist(&encoded, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_traversal_hints_are_neutralized() {
        let persister = ImagePersister::new(Arc::new(MemoryBlobStore::default()));
        let record = persister
            .persist(&png_base64(), Some("../../etc/passwd"))
            .await
            .unwrap();
        assert!(!record.filename.contains(".."));
        assert!(!record.filename.contains('/'));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("photo 1.png"), "photo_1.png");
        assert_eq!(sanitize_filename("/abs/path/x.jpg"), "x.jpg");
        assert_eq!(sanitize_filename("..\\..\\x.jpg"), "x.jpg");
        assert!(!sanitize_filename("a..b.png").contains(".."));
        assert_eq!(sanitize_filename("///"), "capture");
    }

    #[test]
    fn test_strip_data_uri() {
        assert_eq!(strip_data_uri("data:image/jpeg;base64,QUJD"), "QUJD");
        assert_eq!(strip_data_uri("QUJD"), "QUJD");
        assert_eq!(strip_data_uri("data:no-separator"), "data:no-separator");
    }
}
