use crate::error::ConfigError;
use crate::models::SizeSpec;
use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;

/// Prefix for per-size variables, e.g. `IMAGE_SIZE_SMALL=400x400`.
/// Matched case-insensitively so `Image_Size_Small` works too.
pub const SIZE_VAR_PREFIX: &str = "IMAGE_SIZE_";

/// When the image is resized to a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizePolicy {
    /// Resize only if both width and height differ from the target.
    /// An image matching the target on one axis is re-encoded untouched.
    #[default]
    BothDimensionsDiffer,
    /// Resize whenever the image is not exactly the target size.
    AnyDimensionDiffers,
}

impl ResizePolicy {
    pub fn should_resize(self, (width, height): (u32, u32), target: &SizeSpec) -> bool {
        match self {
            ResizePolicy::BothDimensionsDiffer => {
                width != target.width && height != target.height
            }
            ResizePolicy::AnyDimensionDiffers => {
                width != target.width || height != target.height
            }
        }
    }
}

impl FromStr for ResizePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "both-differ" | "both" => Ok(Self::BothDimensionsDiffer),
            "any-differ" | "any" => Ok(Self::AnyDimensionDiffers),
            other => Err(other.to_string()),
        }
    }
}

/// What a size that cannot be produced does to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFailurePolicy {
    /// Drop the variant, keep the others.
    #[default]
    SkipVariant,
    /// Fail the whole record.
    AbortRecord,
}

impl FromStr for DecodeFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip-variant" | "skip" => Ok(Self::SkipVariant),
            "abort-record" | "abort" => Ok(Self::AbortRecord),
            other => Err(other.to_string()),
        }
    }
}

/// Validated pipeline configuration, built once and handed to the processor.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target sizes in archive entry order
    pub sizes: Vec<SizeSpec>,

    /// Resize guard (default: both dimensions must differ)
    pub resize_policy: ResizePolicy,

    /// Per-size failure handling (default: skip the variant)
    pub decode_failure_policy: DecodeFailurePolicy,

    /// Upload a zero-entry archive when the catalog is empty (default: true)
    pub upload_empty_archive: bool,

    /// Prefix archive entry names with `/` (default: false)
    pub archive_leading_separator: bool,

    /// Tags attached to every uploaded archive (default: none)
    pub upload_tags: BTreeMap<String, String>,

    /// Records processed at once within a batch (default: 4)
    pub max_concurrent_records: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sizes: default_sizes(),
            resize_policy: ResizePolicy::default(),
            decode_failure_policy: DecodeFailurePolicy::default(),
            upload_empty_archive: true,
            archive_leading_separator: false,
            upload_tags: BTreeMap::new(),
            max_concurrent_records: 4,
        }
    }
}

pub fn default_sizes() -> Vec<SizeSpec> {
    vec![
        SizeSpec::new("small", 400, 400),
        SizeSpec::new("medium", 1000, 1000),
        SizeSpec::new("large", 1600, 1600),
    ]
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars())
    }

    /// Build configuration from `(name, value)` pairs.
    ///
    /// `IMAGE_SIZES=small:400x400,large:1600x1600` defines the catalog in
    /// order. Otherwise every `IMAGE_SIZE_<NAME>=<W>x<H>` variable adds a size,
    /// sorted by pixel area then name. With neither, the default catalog is used.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let default = Self::default();
        let vars: BTreeMap<String, String> = vars.into_iter().collect();

        let sizes = match vars.get("IMAGE_SIZES") {
            Some(list) => parse_size_list(list)?,
            None => {
                let mut prefixed = Vec::new();
                for (var, value) in &vars {
                    let upper = var.to_uppercase();
                    if let Some(name) = upper.strip_prefix(SIZE_VAR_PREFIX) {
                        if name.is_empty() {
                            continue;
                        }
                        let (width, height) = parse_dimensions(value).ok_or_else(|| {
                            ConfigError::InvalidSize {
                                var: var.clone(),
                                value: value.clone(),
                            }
                        })?;
                        prefixed.push(SizeSpec::new(name.to_lowercase(), width, height));
                    }
                }
                if prefixed.is_empty() {
                    default.sizes
                } else {
                    prefixed.sort_by(|a, b| {
                        let area = |s: &SizeSpec| u64::from(s.width) * u64::from(s.height);
                        area(a).cmp(&area(b)).then_with(|| a.name.cmp(&b.name))
                    });
                    prefixed
                }
            }
        };

        let config = Self {
            sizes,
            resize_policy: parse_var(&vars, "RESIZE_POLICY")?.unwrap_or(default.resize_policy),
            decode_failure_policy: parse_var(&vars, "DECODE_FAILURE_POLICY")?
                .unwrap_or(default.decode_failure_policy),
            upload_empty_archive: parse_bool(&vars, "UPLOAD_EMPTY_ARCHIVE")?
                .unwrap_or(default.upload_empty_archive),
            archive_leading_separator: parse_bool(&vars, "ARCHIVE_LEADING_SEPARATOR")?
                .unwrap_or(default.archive_leading_separator),
            upload_tags: match vars.get("UPLOAD_TAGS") {
                Some(raw) => parse_tags(raw)?,
                None => default.upload_tags,
            },
            max_concurrent_records: parse_var(&vars, "MAX_CONCURRENT_RECORDS")?
                .unwrap_or(default.max_concurrent_records),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, size) in self.sizes.iter().enumerate() {
            if size.width == 0 || size.height == 0 {
                return Err(ConfigError::ZeroDimension(size.name.clone()));
            }
            if self.sizes[..i].iter().any(|s| s.name == size.name) {
                return Err(ConfigError::DuplicateSize(size.name.clone()));
            }
        }
        if self.max_concurrent_records == 0 {
            return Err(ConfigError::InvalidValue {
                var: "MAX_CONCURRENT_RECORDS".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Parse `400x400` (also `400X400`). Zero is accepted here and rejected by
/// [`PipelineConfig::validate`] so the error names the size.
pub fn parse_dimensions(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn parse_size_list(list: &str) -> Result<Vec<SizeSpec>, ConfigError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let invalid = || ConfigError::InvalidSize {
                var: "IMAGE_SIZES".to_string(),
                value: item.to_string(),
            };
            let (name, dims) = item.split_once(':').ok_or_else(invalid)?;
            let (width, height) = parse_dimensions(dims).ok_or_else(invalid)?;
            Ok(SizeSpec::new(name.trim().to_lowercase(), width, height))
        })
        .collect()
}

fn parse_tags(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| ConfigError::InvalidValue {
                    var: "UPLOAD_TAGS".to_string(),
                    value: pair.to_string(),
                })
        })
        .collect()
}

fn parse_var<T: FromStr>(vars: &BTreeMap<String, String>, var: &str) -> Result<Option<T>, ConfigError> {
    vars.get(var)
        .map(|value| {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value: value.clone(),
            })
        })
        .transpose()
}

fn parse_bool(vars: &BTreeMap<String, String>, var: &str) -> Result<Option<bool>, ConfigError> {
    vars.get(var)
        .map(|value| match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var: var.to_string(),
                value: value.clone(),
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        let names: Vec<_> = config.sizes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["small", "medium", "large"]);
        assert_eq!(config.resize_policy, ResizePolicy::BothDimensionsDiffer);
        assert_eq!(config.decode_failure_policy, DecodeFailurePolicy::SkipVariant);
        assert!(config.upload_empty_archive);
        assert!(!config.archive_leading_separator);
        assert!(config.upload_tags.is_empty());
    }

    #[test]
    fn test_no_size_vars_uses_default_catalog() {
        let config = PipelineConfig::from_vars(vars(&[("PATH", "/usr/bin")])).unwrap();
        assert_eq!(config.sizes, default_sizes());
    }

    #[test]
    fn test_prefixed_size_vars_case_insensitive_and_sorted() {
        let config = PipelineConfig::from_vars(vars(&[
            ("Image_Size_Large", "1600x1600"),
            ("IMAGE_SIZE_THUMB", "100X80"),
            ("image_size_medium", "1000x1000"),
        ]))
        .unwrap();

        assert_eq!(
            config.sizes,
            vec![
                SizeSpec::new("thumb", 100, 80),
                SizeSpec::new("medium", 1000, 1000),
                SizeSpec::new("large", 1600, 1600),
            ]
        );
    }

    #[test]
    fn test_ordered_size_list_wins() {
        let config = PipelineConfig::from_vars(vars(&[
            ("IMAGE_SIZES", "large:1600x1600, small:400x400"),
            ("IMAGE_SIZE_MEDIUM", "1000x1000"),
        ]))
        .unwrap();

        let names: Vec<_> = config.sizes.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["large", "small"]);
    }

    #[test]
    fn test_empty_size_list_gives_empty_catalog() {
        let config = PipelineConfig::from_vars(vars(&[("IMAGE_SIZES", "")])).unwrap();
        assert!(config.sizes.is_empty());
    }

    #[test]
    fn test_invalid_sizes_rejected() {
        assert!(matches!(
            PipelineConfig::from_vars(vars(&[("IMAGE_SIZE_SMALL", "400")])),
            Err(ConfigError::InvalidSize { .. })
        ));
        assert_eq!(
            PipelineConfig::from_vars(vars(&[("IMAGE_SIZE_SMALL", "0x400")])).unwrap_err(),
            ConfigError::ZeroDimension("small".to_string())
        );
        assert_eq!(
            PipelineConfig::from_vars(vars(&[("IMAGE_SIZES", "a:1x1,a:2x2")])).unwrap_err(),
            ConfigError::DuplicateSize("a".to_string())
        );
    }

    #[test]
    fn test_policies_and_flags() {
        let config = PipelineConfig::from_vars(vars(&[
            ("RESIZE_POLICY", "any-differ"),
            ("DECODE_FAILURE_POLICY", "abort-record"),
            ("UPLOAD_EMPTY_ARCHIVE", "false"),
            ("ARCHIVE_LEADING_SEPARATOR", "1"),
            ("UPLOAD_TAGS", "source=resizer, tier=hot"),
            ("MAX_CONCURRENT_RECORDS", "8"),
        ]))
        .unwrap();

        assert_eq!(config.resize_policy, ResizePolicy::AnyDimensionDiffers);
        assert_eq!(config.decode_failure_policy, DecodeFailurePolicy::AbortRecord);
        assert!(!config.upload_empty_archive);
        assert!(config.archive_leading_separator);
        assert_eq!(config.upload_tags.get("tier").map(String::as_str), Some("hot"));
        assert_eq!(config.upload_tags.len(), 2);
        assert_eq!(config.max_concurrent_records, 8);
    }

    #[test]
    fn test_invalid_flag_values() {
        assert!(PipelineConfig::from_vars(vars(&[("RESIZE_POLICY", "sometimes")])).is_err());
        assert!(PipelineConfig::from_vars(vars(&[("UPLOAD_EMPTY_ARCHIVE", "maybe")])).is_err());
        assert!(PipelineConfig::from_vars(vars(&[("MAX_CONCURRENT_RECORDS", "0")])).is_err());
        assert!(PipelineConfig::from_vars(vars(&[("UPLOAD_TAGS", "novalue")])).is_err());
    }

    #[test]
    fn test_resize_policy_guard() {
        let target = SizeSpec::new("small", 400, 400);
        let both = ResizePolicy::BothDimensionsDiffer;
        let any = ResizePolicy::AnyDimensionDiffers;

        assert!(both.should_resize((800, 600), &target));
        assert!(!both.should_resize((400, 600), &target));
        assert!(!both.should_resize((800, 400), &target));
        assert!(any.should_resize((400, 600), &target));
        assert!(!any.should_resize((400, 400), &target));
    }
}
