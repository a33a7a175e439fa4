use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::config::{ImageConfig, LoaderKind};
use crate::error::ConfigError;

/// Arguments handed to a loader for one candidate width.
#[derive(Clone, Copy, Debug)]
pub struct ImageLoaderProps<'a> {
    pub config: &'a ImageConfig,
    pub src: &'a str,
    pub width: u32,
    pub quality: Option<u8>,
}

pub type LoaderFn = dyn Fn(&ImageLoaderProps<'_>) -> String + Send + Sync;

/// Maps `(src, width, quality)` to a delivery URL. The engine calls it and
/// never inspects how the URL is built.
#[derive(Clone)]
pub enum ImageLoader {
    Default,
    Imgix,
    Cloudinary,
    Akamai,
    Custom(Arc<LoaderFn>),
}

impl fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageLoader::Default => f.write_str("Default"),
            ImageLoader::Imgix => f.write_str("Imgix"),
            ImageLoader::Cloudinary => f.write_str("Cloudinary"),
            ImageLoader::Akamai => f.write_str("Akamai"),
            ImageLoader::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl ImageLoader {
    pub fn custom<F>(loader: F) -> Self
    where
        F: Fn(&ImageLoaderProps<'_>) -> String + Send + Sync + 'static,
    {
        ImageLoader::Custom(Arc::new(loader))
    }

    /// Picks the loader for one image: a per-image override wins, then the
    /// configured kind.
    pub fn resolve(config: &ImageConfig, overridden: Option<&ImageLoader>) -> Result<Self, ConfigError> {
        if let Some(loader) = overridden {
            return Ok(loader.clone());
        }
        Ok(match config.loader {
            LoaderKind::Default => ImageLoader::Default,
            LoaderKind::Imgix => ImageLoader::Imgix,
            LoaderKind::Cloudinary => ImageLoader::Cloudinary,
            LoaderKind::Akamai => ImageLoader::Akamai,
            LoaderKind::Custom => config
                .image_loader
                .clone()
                .ok_or(ConfigError::MissingCustomLoader)?,
        })
    }

    pub fn is_default(&self) -> bool {
        matches!(self, ImageLoader::Default)
    }

    pub fn load(&self, props: &ImageLoaderProps<'_>) -> String {
        match self {
            ImageLoader::Default => default_loader(props),
            ImageLoader::Imgix => imgix_loader(props),
            ImageLoader::Cloudinary => cloudinary_loader(props),
            ImageLoader::Akamai => akamai_loader(props),
            ImageLoader::Custom(loader) => loader(props),
        }
    }
}

#[derive(Serialize)]
struct DefaultLoaderQuery<'a> {
    url: &'a str,
    w: u32,
    q: u8,
}

fn default_loader(props: &ImageLoaderProps<'_>) -> String {
    let ImageLoaderProps {
        config,
        src,
        width,
        quality,
    } = *props;

    // SVGs are served as-is rather than proxied through the optimizer.
    if src.ends_with(".svg") && !config.dangerously_allow_svg {
        return src.to_string();
    }

    let query = DefaultLoaderQuery {
        url: src,
        w: width,
        q: quality.unwrap_or(75),
    };
    match serde_qs::to_string(&query) {
        Ok(params) => format!("{}?{}", config.path, params),
        Err(err) => {
            log::error!("Failed to encode image url for {src}: {err}");
            src.to_string()
        }
    }
}

fn imgix_loader(props: &ImageLoaderProps<'_>) -> String {
    let mut url = format!(
        "{}{}?auto=format&fit=max&w={}",
        props.config.path,
        normalize_src(props.src),
        props.width
    );
    if let Some(quality) = props.quality {
        url.push_str(&format!("&q={quality}"));
    }
    url
}

fn cloudinary_loader(props: &ImageLoaderProps<'_>) -> String {
    let quality = props
        .quality
        .map(|q| q.to_string())
        .unwrap_or_else(|| "auto".to_string());
    let params = [
        "f_auto".to_string(),
        "c_limit".to_string(),
        format!("w_{}", props.width),
        format!("q_{quality}"),
    ];
    format!(
        "{}{}/{}",
        props.config.path,
        params.join(","),
        normalize_src(props.src)
    )
}

fn akamai_loader(props: &ImageLoaderProps<'_>) -> String {
    format!(
        "{}{}?imwidth={}",
        props.config.path,
        normalize_src(props.src),
        props.width
    )
}

fn normalize_src(src: &str) -> &str {
    src.strip_prefix('/').unwrap_or(src)
}

#[cfg(test)]
mod loader_tests {
    use super::*;

    fn props<'a>(config: &'a ImageConfig, src: &'a str, quality: Option<u8>) -> ImageLoaderProps<'a> {
        ImageLoaderProps {
            config,
            src,
            width: 640,
            quality,
        }
    }

    #[test]
    fn default_loader_encodes_query() {
        let config = ImageConfig::default();
        let url = ImageLoader::Default.load(&props(&config, "/images/cat.png", None));
        assert_eq!(url, "/cache/image?url=%2Fimages%2Fcat.png&w=640&q=75");
    }

    #[test]
    fn default_loader_passes_svg_through() {
        let config = ImageConfig::default();
        assert_eq!(ImageLoader::Default.load(&props(&config, "/logo.svg", Some(90))), "/logo.svg");

        let config = ImageConfig {
            dangerously_allow_svg: true,
            ..Default::default()
        };
        assert!(ImageLoader::Default
            .load(&props(&config, "/logo.svg", Some(90)))
            .ends_with("w=640&q=90"));
    }

    #[test]
    fn imgix_loader() {
        let config = ImageConfig {
            path: "https://example.imgix.net/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            ImageLoader::Imgix.load(&props(&config, "/cat.png", Some(80))),
            "https://example.imgix.net/cat.png?auto=format&fit=max&w=640&q=80"
        );
    }

    #[test]
    fn cloudinary_loader() {
        let config = ImageConfig {
            path: "https://res.cloudinary.com/demo/image/upload/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            ImageLoader::Cloudinary.load(&props(&config, "/cat.png", None)),
            "https://res.cloudinary.com/demo/image/upload/f_auto,c_limit,w_640,q_auto/cat.png"
        );
    }

    #[test]
    fn akamai_loader() {
        let config = ImageConfig {
            path: "https://cdn.example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            ImageLoader::Akamai.load(&props(&config, "/cat.png", None)),
            "https://cdn.example.com/cat.png?imwidth=640"
        );
    }

    #[test]
    fn resolve_prefers_override() {
        let config = ImageConfig {
            loader: LoaderKind::Akamai,
            ..Default::default()
        };
        let custom = ImageLoader::custom(|p| format!("https://img.example.com{}?w={}", p.src, p.width));
        let resolved = ImageLoader::resolve(&config, Some(&custom)).unwrap();
        assert_eq!(
            resolved.load(&props(&config, "/cat.png", None)),
            "https://img.example.com/cat.png?w=640"
        );
        assert!(matches!(ImageLoader::resolve(&config, None), Ok(ImageLoader::Akamai)));
    }

    #[test]
    fn resolve_custom_kind_without_function_fails() {
        let config = ImageConfig {
            loader: LoaderKind::Custom,
            ..Default::default()
        };
        assert!(matches!(
            ImageLoader::resolve(&config, None),
            Err(ConfigError::MissingCustomLoader)
        ));
    }
}
