use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::error::ArchiveError;
use crate::models::VariantSet;

/// Packages a [`VariantSet`] into one in-memory zip archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBuilder {
    leading_separator: bool,
}

impl ArchiveBuilder {
    /// `leading_separator` prefixes every entry name with `/`, which is what
    /// archives produced by the earlier pipeline contained.
    pub fn new(leading_separator: bool) -> Self {
        Self { leading_separator }
    }

    pub fn entry_name(&self, base_name: &str, variant_name: &str) -> String {
        if self.leading_separator {
            format!("/{}_{}", base_name, variant_name)
        } else {
            format!("{}_{}", base_name, variant_name)
        }
    }

    /// One deflated entry per variant, in set order, no directory entries.
    pub fn build(&self, base_name: &str, variants: &VariantSet) -> Result<Vec<u8>, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for variant in variants.iter() {
            let name = self.entry_name(base_name, &variant.name);
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&variant.bytes)
                .map_err(|source| ArchiveError::Entry { name, source })?;
        }

        Ok(zip.finish()?.into_inner())
    }
}
