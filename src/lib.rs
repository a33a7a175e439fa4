pub mod blur;
pub mod config;
#[cfg(feature = "hydrate")]
pub mod dom;
pub mod error;
pub mod glob;
pub mod image;
pub mod lcp;
pub mod loader;
pub mod loading;
pub mod props;
pub mod provider;
pub mod remote;
pub mod srcset;
pub mod validate;
pub mod warn;

pub use config::{ImageConfig, ImageFormat, LoaderKind, Protocol, RemotePattern};
pub use error::{ConfigError, ImageError};
pub use image::*;
pub use lcp::{LcpRegistry, PerformanceObserverHost};
pub use loader::{ImageLoader, ImageLoaderProps};
pub use props::{get_int, Dimension, ImageRequest, ImageStyle, Placeholder};
pub use provider::provide_image_config;
pub use remote::{is_allowed, match_remote_pattern};
pub use srcset::{generate_img_attrs, get_widths, DescriptorKind, GenImgAttrs, ImgAttrs};
pub use validate::{check_image, validate, Violation, ViolationKind};
