use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::glob::GlobCache;
use crate::loader::ImageLoader;

/// Which built-in URL scheme the loader uses.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    #[default]
    Default,
    Imgix,
    Cloudinary,
    Akamai,
    Custom,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, Hash)]
pub enum ImageFormat {
    #[serde(rename = "image/avif")]
    Avif,
    #[serde(rename = "image/webp")]
    Webp,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Allow-list rule for optimizing external URLs.
///
/// `hostname` is required; it is kept optional here only so that a config
/// missing it can be reported as a [`ConfigError`] instead of failing to
/// deserialize with a less useful message.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize, Hash)]
pub struct RemotePattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Literal port such as `8080`, or empty string meaning no port.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pathname: Option<String>,
}

impl RemotePattern {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            ..Default::default()
        }
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn pathname(mut self, pathname: impl Into<String>) -> Self {
        self.pathname = Some(pathname.into());
        self
    }

    pub(crate) fn describe(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

/// Process-wide image configuration. Loaded once and read-only afterwards.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageConfig {
    pub device_sizes: Vec<u32>,
    pub image_sizes: Vec<u32>,
    pub loader: LoaderKind,
    /// Base path or URL prefix handed to the built-in loaders.
    pub path: String,
    pub domains: Vec<String>,
    pub remote_patterns: Vec<RemotePattern>,
    pub unoptimized: bool,
    #[serde(rename = "dangerouslyAllowSVG")]
    pub dangerously_allow_svg: bool,
    pub content_security_policy: String,
    #[serde(rename = "minimumCacheTTL")]
    pub minimum_cache_ttl: u32,
    pub formats: Vec<ImageFormat>,
    /// Loader function used when `loader` is [`LoaderKind::Custom`].
    #[serde(skip)]
    pub image_loader: Option<ImageLoader>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            device_sizes: vec![640, 750, 828, 1080, 1200, 1920, 2048, 3840],
            image_sizes: vec![16, 32, 48, 64, 96, 128, 256, 384],
            loader: LoaderKind::Default,
            path: "/cache/image".to_string(),
            domains: Vec::new(),
            remote_patterns: Vec::new(),
            unoptimized: false,
            dangerously_allow_svg: false,
            content_security_policy: "script-src 'none'; frame-src 'none'; sandbox;".to_string(),
            minimum_cache_ttl: 60,
            formats: vec![ImageFormat::Webp],
            image_loader: None,
        }
    }
}

impl ImageConfig {
    /// Parses and validates a JSON config. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ImageConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Ascending, duplicate-free union of `image_sizes` and `device_sizes`.
    pub fn all_sizes(&self) -> Vec<u32> {
        let mut sizes: Vec<u32> = self
            .image_sizes
            .iter()
            .chain(self.device_sizes.iter())
            .copied()
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    /// Copy of this config with per-image size tables swapped in.
    pub fn with_sizes(&self, device_sizes: Option<&[u32]>, image_sizes: Option<&[u32]>) -> Self {
        let mut config = self.clone();
        if let Some(sizes) = device_sizes {
            config.device_sizes = sizes.to_vec();
        }
        if let Some(sizes) = image_sizes {
            config.image_sizes = sizes.to_vec();
        }
        config
    }

    /// Startup check: size tables are sorted and every remote pattern has a
    /// hostname and well-formed globs. The compiled globs are cached for
    /// matching.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_sizes()?;

        for pattern in &self.remote_patterns {
            let hostname = pattern
                .hostname
                .as_deref()
                .ok_or_else(|| ConfigError::MissingHostname {
                    pattern: pattern.describe(),
                })?;
            GlobCache::global().hostname(hostname)?;
            if let Some(pathname) = &pattern.pathname {
                GlobCache::global().pathname(pathname)?;
            }
        }

        if self.loader == LoaderKind::Custom && self.image_loader.is_none() {
            return Err(ConfigError::MissingCustomLoader);
        }
        Ok(())
    }

    /// `deviceSizes` is non-empty and both size tables are ascending.
    pub fn validate_sizes(&self) -> Result<(), ConfigError> {
        if self.device_sizes.is_empty() {
            return Err(ConfigError::InvalidSizes {
                field: "deviceSizes",
                reason: "must not be empty".to_string(),
            });
        }
        check_ascending("deviceSizes", &self.device_sizes)?;
        check_ascending("imageSizes", &self.image_sizes)
    }
}

fn check_ascending(field: &'static str, sizes: &[u32]) -> Result<(), ConfigError> {
    match sizes.windows(2).find(|pair| pair[0] > pair[1]) {
        Some(pair) => Err(ConfigError::InvalidSizes {
            field,
            reason: format!("must be sorted ascending ({} comes before {})", pair[0], pair[1]),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn all_sizes_is_sorted_union() {
        let config = ImageConfig::default();
        assert_eq!(
            config.all_sizes(),
            vec![16, 32, 48, 64, 96, 128, 256, 384, 640, 750, 828, 1080, 1200, 1920, 2048, 3840]
        );
    }

    #[test]
    fn all_sizes_drops_duplicates() {
        let config = ImageConfig {
            device_sizes: vec![300, 780, 1280],
            image_sizes: vec![92, 154, 300, 780],
            ..Default::default()
        };
        assert_eq!(config.all_sizes(), vec![92, 154, 300, 780, 1280]);
    }

    #[test]
    fn from_json_uses_defaults_for_missing_keys() {
        let config = ImageConfig::from_json(
            r#"{
                "loader": "imgix",
                "path": "https://example.imgix.net/",
                "domains": ["images.example.com"],
                "remotePatterns": [{ "protocol": "https", "hostname": "**.tmdb.org" }],
                "dangerouslyAllowSVG": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.loader, LoaderKind::Imgix);
        assert_eq!(config.device_sizes, ImageConfig::default().device_sizes);
        assert_eq!(config.remote_patterns[0].protocol, Some(Protocol::Https));
        assert!(config.dangerously_allow_svg);
        assert_eq!(config.minimum_cache_ttl, 60);
    }

    #[test]
    fn missing_hostname_is_a_config_error() {
        let result = ImageConfig::from_json(r#"{ "remotePatterns": [{ "protocol": "https" }] }"#);
        assert!(matches!(result, Err(ConfigError::MissingHostname { .. })));
    }

    #[test]
    fn malformed_glob_is_reported_at_startup() {
        let config = ImageConfig {
            remote_patterns: vec![RemotePattern::new("cdn.**x.com")],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidGlob { .. })));
    }

    #[test]
    fn unsorted_sizes_are_rejected() {
        let config = ImageConfig {
            device_sizes: vec![1080, 640],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSizes { field: "deviceSizes", .. })
        ));
    }

    #[test]
    fn custom_loader_kind_requires_function() {
        let config = ImageConfig {
            loader: LoaderKind::Custom,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::MissingCustomLoader));
    }

    #[test]
    fn per_image_size_override() {
        let config = ImageConfig::default().with_sizes(Some(&[300, 780, 1280]), None);
        assert_eq!(config.device_sizes, vec![300, 780, 1280]);
        assert_eq!(config.image_sizes, ImageConfig::default().image_sizes);
    }
}
