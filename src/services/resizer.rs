use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::config::{DecodeFailurePolicy, ResizePolicy};
use crate::error::ResizeError;
use crate::models::{SizeSpec, Variant, VariantSet};

/// Every variant is re-encoded to this format at the encoder's default quality.
pub const OUTPUT_FORMAT: ImageFormat = ImageFormat::Jpeg;

/// Result of resizing one source image against the whole catalog.
#[derive(Debug)]
pub struct ResizeBatch {
    pub variants: VariantSet,
    /// Sizes that could not be produced, with the reason.
    pub failures: Vec<(String, ResizeError)>,
}

#[derive(Debug, Clone, Copy)]
pub struct ImageResizer {
    policy: ResizePolicy,
    filter: FilterType,
}

impl ImageResizer {
    pub fn new(policy: ResizePolicy) -> Self {
        Self {
            policy,
            filter: FilterType::CatmullRom,
        }
    }

    pub fn policy(&self) -> ResizePolicy {
        self.policy
    }

    /// Decode `data`, resize it to `size` when the policy allows, and
    /// re-encode. The resize is exact and does not keep the aspect ratio.
    pub fn resize(&self, data: &[u8], size: &SizeSpec) -> Result<Vec<u8>, ResizeError> {
        let img = image::load_from_memory(data).map_err(ResizeError::Decode)?;
        self.resize_decoded(&img, size)
    }

    fn resize_decoded(&self, img: &DynamicImage, size: &SizeSpec) -> Result<Vec<u8>, ResizeError> {
        if self.policy.should_resize(img.dimensions(), size) {
            let resized = img.resize_exact(size.width, size.height, self.filter);
            Self::encode(&resized, &size.name)
        } else {
            Self::encode(img, &size.name)
        }
    }

    /// Decode `data` once, then resize and encode it for every size in
    /// catalog order.
    ///
    /// Undecodable input is always an error since no size can be produced.
    /// A size that fails afterwards aborts with [`DecodeFailurePolicy::AbortRecord`]
    /// and is collected and skipped otherwise.
    pub fn resize_all(
        &self,
        data: &[u8],
        sizes: &[SizeSpec],
        on_failure: DecodeFailurePolicy,
    ) -> Result<ResizeBatch, ResizeError> {
        if sizes.is_empty() {
            return Ok(ResizeBatch {
                variants: VariantSet::default(),
                failures: Vec::new(),
            });
        }

        let img = image::load_from_memory(data).map_err(ResizeError::Decode)?;
        let mut variants = Vec::with_capacity(sizes.len());
        let mut failures = Vec::new();

        for size in sizes {
            match self.resize_decoded(&img, size) {
                Ok(bytes) => variants.push(Variant {
                    name: size.name.clone(),
                    bytes,
                }),
                Err(e) => match on_failure {
                    DecodeFailurePolicy::AbortRecord => return Err(e),
                    DecodeFailurePolicy::SkipVariant => failures.push((size.name.clone(), e)),
                },
            }
        }

        Ok(ResizeBatch {
            variants: variants.into_iter().collect(),
            failures,
        })
    }

    fn encode(img: &DynamicImage, size_name: &str) -> Result<Vec<u8>, ResizeError> {
        // JPEG has no alpha channel and no 16-bit depth
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

        let mut out_data = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut out_data);
        rgb.write_to(&mut cursor, OUTPUT_FORMAT)
            .map_err(|source| ResizeError::Encode {
                size: size_name.to_string(),
                source,
            })?;
        Ok(out_data)
    }
}

impl Default for ImageResizer {
    fn default() -> Self {
        Self::new(ResizePolicy::default())
    }
}
