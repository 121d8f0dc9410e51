//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the operations the pipeline needs:
//! read the source's dimensions, decode it, resize to a thumbnail, and
//! encode WebP. Reading dimensions is separate from decoding so that a
//! fresh image can plan its thumbnails without decoding any pixels.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), pure Rust on the
//! `image` crate. Tests substitute the recording `MockBackend`.

use image::DynamicImage;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
}

/// Trait for image processing backends.
///
/// Implementations must be `Send + Sync`: thumbnails of one image are
/// encoded in parallel against a shared backend.
pub trait ImageBackend: Send + Sync {
    /// Width and height of the encoded source, from its header alone.
    fn identify(&self, data: &[u8]) -> Result<(u32, u32), BackendError>;

    /// Decode a full source image into pixels.
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Resize to exactly `width` x `height`.
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Encode as WebP into `out`.
    fn encode_webp(&self, image: &DynamicImage, out: &mut dyn Write) -> Result<(), BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock backend that records operations without real codecs.
    /// Uses Mutex (not RefCell) so it is Sync and works with rayon's par_iter.
    pub struct MockBackend {
        /// Size of the image every decode returns.
        pub decoded: (u32, u32),
        /// Fail every decode, as for a corrupt source.
        pub fail_decode: bool,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify,
        Decode { bytes: usize },
        Resize { width: u32, height: u32 },
        Encode { width: u32, height: u32 },
    }

    impl MockBackend {
        pub fn with_dimensions(width: u32, height: u32) -> Self {
            Self {
                decoded: (width, height),
                fail_decode: false,
                operations: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail_decode: true,
                ..Self::with_dimensions(1, 1)
            }
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn encode_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Encode { .. }))
                .count()
        }
    }

    impl ImageBackend for MockBackend {
        fn identify(&self, _data: &[u8]) -> Result<(u32, u32), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Identify);
            if self.fail_decode {
                return Err(BackendError::Decode("mock identify failure".to_string()));
            }
            Ok(self.decoded)
        }

        fn decode(&self, data: &[u8]) -> Result<DynamicImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode { bytes: data.len() });
            if self.fail_decode {
                return Err(BackendError::Decode("mock decode failure".to_string()));
            }
            let (w, h) = self.decoded;
            Ok(DynamicImage::new_rgb8(w, h))
        }

        fn resize(&self, _image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Resize { width, height });
            DynamicImage::new_rgb8(width, height)
        }

        fn encode_webp(
            &self,
            image: &DynamicImage,
            out: &mut dyn Write,
        ) -> Result<(), BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                width: image.width(),
                height: image.height(),
            });
            write!(out, "WEBP {}x{}", image.width(), image.height())?;
            Ok(())
        }
    }

    #[test]
    fn mock_records_decode() {
        let backend = MockBackend::with_dimensions(800, 600);
        let image = backend.decode(b"abc").unwrap();
        assert_eq!((image.width(), image.height()), (800, 600));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode { bytes: 3 }]);
    }

    #[test]
    fn mock_identify_reports_dimensions_without_decoding() {
        let backend = MockBackend::with_dimensions(640, 480);
        assert_eq!(backend.identify(b"abc").unwrap(), (640, 480));
        assert_eq!(backend.get_operations(), vec![RecordedOp::Identify]);
    }

    #[test]
    fn mock_failing_decode() {
        let backend = MockBackend::failing();
        assert!(matches!(backend.decode(b"x"), Err(BackendError::Decode(_))));
    }

    #[test]
    fn mock_records_resize_and_encode() {
        let backend = MockBackend::with_dimensions(8, 8);
        let image = backend.decode(b"").unwrap();
        let thumb = backend.resize(&image, 4, 4);
        let mut out = Vec::new();
        backend.encode_webp(&thumb, &mut out).unwrap();

        assert_eq!(out, b"WEBP 4x4");
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(
            &ops[2],
            RecordedOp::Encode {
                width: 4,
                height: 4
            }
        ));
        assert_eq!(backend.encode_count(), 1);
    }
}
