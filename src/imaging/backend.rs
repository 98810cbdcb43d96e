//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the boundary to the codec: decode container
//! bytes into a bitmap, resample a bitmap, and re-encode it at a given lossy
//! quality. The compression pipeline never touches a codec directly, so the
//! quality search and the orchestrator can be tested against a mock.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::{Quality, ResizeFilter};
use image::DynamicImage;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of a bitmap or a resize target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn of(image: &DynamicImage) -> Self {
        Self::new(image.width(), image.height())
    }

    pub fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Trait for codec backends.
///
/// Implementations must be shareable across the orchestrator's worker threads.
pub trait ImageBackend: Send + Sync {
    /// Decode JPEG/PNG container bytes into a bitmap.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Resample to exactly `target` with an area-aware filter.
    fn resample(
        &self,
        image: &DynamicImage,
        target: Dimensions,
        filter: ResizeFilter,
    ) -> Result<DynamicImage, BackendError>;

    /// Encode to the lossy output format at `quality`.
    fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    type SizeFn = Box<dyn Fn(Quality, Dimensions) -> usize + Send + Sync>;

    /// Mock backend that records operations and fabricates encoded sizes.
    ///
    /// Encoded output is a zero-filled buffer whose length comes from the size
    /// function, so tests control exactly where the budget is crossed.
    /// Uses Mutex (not RefCell) so it is Sync and can run on worker threads.
    pub struct MockBackend {
        pub decoded: Mutex<Vec<Dimensions>>,
        pub operations: Mutex<Vec<RecordedOp>>,
        size_fn: SizeFn,
        fail_encode: bool,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(usize),
        Resample {
            width: u32,
            height: u32,
            filter: ResizeFilter,
        },
        Encode {
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    impl MockBackend {
        /// Sizes proportional to pixel count and quality: `w * h * q / 100`.
        pub fn new() -> Self {
            Self::with_sizes(|q, d| (d.area() * q.value() as u64 / 100) as usize)
        }

        pub fn with_sizes(
            size_fn: impl Fn(Quality, Dimensions) -> usize + Send + Sync + 'static,
        ) -> Self {
            Self {
                decoded: Mutex::new(Vec::new()),
                operations: Mutex::new(Vec::new()),
                size_fn: Box::new(size_fn),
                fail_encode: false,
            }
        }

        /// Sizes looked up by quality; qualities missing from the table encode to `fallback` bytes.
        pub fn with_size_table(table: &[(u32, usize)], fallback: usize) -> Self {
            let table = table.to_vec();
            Self::with_sizes(move |q, _| {
                table
                    .iter()
                    .find(|(quality, _)| *quality == q.value())
                    .map(|(_, size)| *size)
                    .unwrap_or(fallback)
            })
        }

        pub fn with_decoded(mut self, dims: Dimensions) -> Self {
            self.decoded = Mutex::new(vec![dims]);
            self
        }

        pub fn failing_encode(mut self) -> Self {
            self.fail_encode = true;
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Qualities passed to `encode`, in call order.
        pub fn encoded_qualities(&self) -> Vec<u32> {
            self.get_operations()
                .into_iter()
                .filter_map(|op| match op {
                    RecordedOp::Encode { quality, .. } => Some(quality),
                    _ => None,
                })
                .collect()
        }
    }

    impl ImageBackend for MockBackend {
        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(bytes.len()));

            self.decoded
                .lock()
                .unwrap()
                .pop()
                .map(|d| DynamicImage::new_rgb8(d.width, d.height))
                .ok_or_else(|| BackendError::ProcessingFailed("No mock bitmap".to_string()))
        }

        fn resample(
            &self,
            _image: &DynamicImage,
            target: Dimensions,
            filter: ResizeFilter,
        ) -> Result<DynamicImage, BackendError> {
            self.operations.lock().unwrap().push(RecordedOp::Resample {
                width: target.width,
                height: target.height,
                filter,
            });
            Ok(DynamicImage::new_rgb8(target.width, target.height))
        }

        fn encode(&self, image: &DynamicImage, quality: Quality) -> Result<Vec<u8>, BackendError> {
            let dims = Dimensions::of(image);
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                width: dims.width,
                height: dims.height,
                quality: quality.value(),
            });
            if self.fail_encode {
                return Err(BackendError::ProcessingFailed("mock encoder failure".into()));
            }
            Ok(vec![0; (self.size_fn)(quality, dims)])
        }
    }

    #[test]
    fn mock_records_decode() {
        let backend = MockBackend::new().with_decoded(Dimensions::new(800, 600));

        let img = backend.decode(&[1, 2, 3]).unwrap();
        assert_eq!(Dimensions::of(&img), Dimensions::new(800, 600));
        assert!(backend.decode(&[1]).is_err());

        let ops = backend.get_operations();
        assert_eq!(ops, vec![RecordedOp::Decode(3), RecordedOp::Decode(1)]);
    }

    #[test]
    fn mock_sizes_follow_table() {
        let backend = MockBackend::with_size_table(&[(80, 600), (75, 400)], 100);
        let img = DynamicImage::new_rgb8(4, 4);

        assert_eq!(backend.encode(&img, Quality::new(80)).unwrap().len(), 600);
        assert_eq!(backend.encode(&img, Quality::new(75)).unwrap().len(), 400);
        assert_eq!(backend.encode(&img, Quality::new(10)).unwrap().len(), 100);
        assert_eq!(backend.encoded_qualities(), vec![80, 75, 10]);
    }

    #[test]
    fn mock_records_resample() {
        let backend = MockBackend::new();
        let img = DynamicImage::new_rgb8(40, 30);

        let out = backend
            .resample(&img, Dimensions::new(20, 15), ResizeFilter::Lanczos3)
            .unwrap();
        assert_eq!(Dimensions::of(&out), Dimensions::new(20, 15));
        assert!(matches!(
            &backend.get_operations()[0],
            RecordedOp::Resample {
                width: 20,
                height: 15,
                filter: ResizeFilter::Lanczos3
            }
        ));
    }

    #[test]
    fn dimensions_area_does_not_overflow() {
        assert_eq!(Dimensions::new(100_000, 100_000).area(), 10_000_000_000);
    }
}
