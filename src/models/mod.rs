pub mod notification;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageLocator {
    pub bucket: String,
    pub key: String,
}

impl StorageLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// A named target resolution, e.g. `small` at 400x400.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSpec {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl SizeSpec {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }
}

/// Object bytes as read from the store, owned by a single record run.
#[derive(Debug)]
pub struct FetchedObject {
    pub locator: StorageLocator,
    pub bytes: Vec<u8>,
}

/// One resized re-encoding of the source image.
#[derive(Debug, Clone)]
pub struct Variant {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Resized variants keyed by size name, kept in catalog order.
///
/// Built once from the resize results and only read afterwards.
#[derive(Debug, Clone, Default)]
pub struct VariantSet {
    variants: Vec<Variant>,
}

impl VariantSet {
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.variants
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.bytes.as_slice())
    }

    pub fn names(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.name.clone()).collect()
    }
}

impl FromIterator<Variant> for VariantSet {
    /// Later entries with an already-seen name are dropped so names stay unique.
    fn from_iter<T: IntoIterator<Item = Variant>>(iter: T) -> Self {
        let mut variants: Vec<Variant> = Vec::new();
        for variant in iter {
            if !variants.iter().any(|v| v.name == variant.name) {
                variants.push(variant);
            }
        }
        Self { variants }
    }
}
