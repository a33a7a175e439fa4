use std::fmt;

use thiserror::Error;

use crate::config::ImageConfig;
use crate::error::{ConfigError, ImageError};
use crate::loader::{ImageLoader, ImageLoaderProps};
use crate::props::{ImageRequest, IntProp, Placeholder};
use crate::remote::{has_match, RemoteUrl};
use crate::warn::warn_once;

pub const VALID_LOADING_VALUES: [&str; 2] = ["lazy", "eager"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Rendering must not proceed.
    Fatal,
    /// Logged once per message; rendering proceeds.
    Advisory,
}

/// One broken rule. The message reads after `Image with src "<src>" `.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ViolationKind {
    #[error("is missing required \"src\" property.")]
    MissingSrc,
    #[error("has both \"width\" and \"fill\" properties. Only one should be used.")]
    FillWithWidth,
    #[error("has both \"height\" and \"fill\" properties. Only one should be used.")]
    FillWithHeight,
    #[error("has both \"fill\" and \"style.position\" properties. Images with \"fill\" always use position absolute - it cannot be modified.")]
    FillWithPosition,
    #[error("has both \"fill\" and \"style.width\" properties. Images with \"fill\" always use width 100% - it cannot be modified.")]
    FillWithStyleWidth,
    #[error("has both \"fill\" and \"style.height\" properties. Images with \"fill\" always use height 100% - it cannot be modified.")]
    FillWithStyleHeight,
    #[error("is missing required \"width\" property.")]
    MissingWidth,
    #[error("has invalid \"width\" property. Expected a numeric value in pixels but received \"{0}\".")]
    InvalidWidth(String),
    #[error("is missing required \"height\" property.")]
    MissingHeight,
    #[error("has invalid \"height\" property. Expected a numeric value in pixels but received \"{0}\".")]
    InvalidHeight(String),
    #[error("has invalid \"loading\" property. Provided \"{0}\" should be one of lazy,eager,undefined.")]
    InvalidLoading(String),
    #[error("has both \"priority\" and \"loading='lazy'\" properties. Only one should be used.")]
    PriorityWithLazy,
    #[error("has \"placeholder='blur'\" property but is missing the \"blurDataURL\" property. Add a small data URL to blur, or remove the \"placeholder\" property.")]
    BlurWithoutData,
    #[error("is smaller than 40x40. Consider removing the \"placeholder='blur'\" property to improve performance.")]
    BlurTooSmall,
    #[error("is using unsupported \"ref\" property. Consider using the \"onLoadingComplete\" property instead.")]
    UnsupportedRef,
    #[error("has a \"loader\" property that does not implement width. Please implement it or use the \"unoptimized\" property instead.")]
    LoaderIgnoresWidth,
    #[error("uses a protocol-relative URL (//). Change it to an absolute URL (http:// or https://).")]
    ProtocolRelativeSrc,
    #[error("must start with a leading slash \"/\" or be an absolute URL (http:// or https://).")]
    InvalidSrc,
    #[error("has hostname \"{0}\" which is not configured under images domains or remotePatterns. It will be served unoptimized.")]
    RemoteNotAllowed(String),
    #[error("was detected as the Largest Contentful Paint (LCP). Please add the \"priority\" property if this image is above the fold.")]
    LargestContentfulPaint,
}

impl ViolationKind {
    pub fn severity(&self) -> Severity {
        match self {
            ViolationKind::MissingSrc
            | ViolationKind::BlurTooSmall
            | ViolationKind::UnsupportedRef
            | ViolationKind::LoaderIgnoresWidth
            | ViolationKind::RemoteNotAllowed(_)
            | ViolationKind::LargestContentfulPaint => Severity::Advisory,
            _ => Severity::Fatal,
        }
    }

    /// Names of the props involved in the violation.
    pub fn props(&self) -> &'static [&'static str] {
        match self {
            ViolationKind::MissingSrc | ViolationKind::ProtocolRelativeSrc | ViolationKind::InvalidSrc => &["src"],
            ViolationKind::RemoteNotAllowed(_) => &["src"],
            ViolationKind::FillWithWidth => &["fill", "width"],
            ViolationKind::FillWithHeight => &["fill", "height"],
            ViolationKind::FillWithPosition => &["fill", "style.position"],
            ViolationKind::FillWithStyleWidth => &["fill", "style.width"],
            ViolationKind::FillWithStyleHeight => &["fill", "style.height"],
            ViolationKind::MissingWidth | ViolationKind::InvalidWidth(_) => &["width"],
            ViolationKind::MissingHeight | ViolationKind::InvalidHeight(_) => &["height"],
            ViolationKind::InvalidLoading(_) => &["loading"],
            ViolationKind::PriorityWithLazy => &["priority", "loading"],
            ViolationKind::BlurWithoutData => &["placeholder", "blurDataURL"],
            ViolationKind::BlurTooSmall => &["placeholder", "width", "height"],
            ViolationKind::UnsupportedRef => &["ref"],
            ViolationKind::LoaderIgnoresWidth => &["loader"],
            ViolationKind::LargestContentfulPaint => &["priority"],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub src: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(src: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            src: src.into(),
            kind,
        }
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image with src \"{}\" {}", self.src, self.kind)
    }
}

/// Every violation found, in rule priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub violations: Vec<Violation>,
    /// The image has to be served as-is (no `src`, or a remote host that is
    /// not allowed).
    pub force_unoptimized: bool,
}

impl ValidationOutcome {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn first_fatal(&self) -> Option<&Violation> {
        self.violations.iter().find(|v| v.severity() == Severity::Fatal)
    }

    pub fn advisories(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity() == Severity::Advisory)
    }

    /// Fails on the first fatal violation; otherwise logs each advisory once
    /// and returns whether the image must be rendered unoptimized.
    pub fn into_result(self) -> Result<bool, ImageError> {
        if let Some(fatal) = self.first_fatal() {
            return Err(ImageError::InvalidProps(fatal.clone()));
        }
        for advisory in self.advisories() {
            warn_once(advisory.to_string());
        }
        Ok(self.force_unoptimized)
    }
}

/// Checks one render request. Pure apart from calling `loader` once for the
/// width check; advisories are returned, not logged.
pub fn validate(
    props: &ImageRequest,
    config: &ImageConfig,
    loader: &ImageLoader,
) -> Result<ValidationOutcome, ConfigError> {
    let mut outcome = ValidationOutcome::default();
    let src = props.src.as_str();
    let mut push = |kind: ViolationKind| outcome.violations.push(Violation::new(src, kind));

    let width_int = props.width_int();
    let height_int = props.height_int();
    let mut unoptimized = props.unoptimized || config.unoptimized || props.is_inline_source();
    let mut force_unoptimized = false;

    if src.is_empty() {
        push(ViolationKind::MissingSrc);
        unoptimized = true;
        force_unoptimized = true;
    } else if props.fill {
        if props.width.is_some() {
            push(ViolationKind::FillWithWidth);
        }
        if props.height.is_some() {
            push(ViolationKind::FillWithHeight);
        }
        let style = &props.style;
        if style.position.as_deref().is_some_and(|p| p != "absolute") {
            push(ViolationKind::FillWithPosition);
        }
        if style.width.as_deref().is_some_and(|w| w != "100%") {
            push(ViolationKind::FillWithStyleWidth);
        }
        if style.height.as_deref().is_some_and(|h| h != "100%") {
            push(ViolationKind::FillWithStyleHeight);
        }
    } else {
        match width_int {
            IntProp::Missing => push(ViolationKind::MissingWidth),
            IntProp::Invalid => push(ViolationKind::InvalidWidth(display(&props.width))),
            IntProp::Valid(_) => {}
        }
        match height_int {
            IntProp::Missing => push(ViolationKind::MissingHeight),
            IntProp::Invalid => push(ViolationKind::InvalidHeight(display(&props.height))),
            IntProp::Valid(_) => {}
        }
    }

    if let Some(loading) = props.loading.as_deref() {
        if !VALID_LOADING_VALUES.contains(&loading) {
            push(ViolationKind::InvalidLoading(loading.to_string()));
        }
    }
    if props.priority && props.loading.as_deref() == Some("lazy") {
        push(ViolationKind::PriorityWithLazy);
    }

    if props.placeholder == Placeholder::Blur {
        if props.blur_data_url.is_none() {
            push(ViolationKind::BlurWithoutData);
        }
        if let (Some(w), Some(h)) = (width_int.value(), height_int.value()) {
            if u64::from(w) * u64::from(h) < 1600 {
                push(ViolationKind::BlurTooSmall);
            }
        }
    }

    if props.has_ref {
        push(ViolationKind::UnsupportedRef);
    }

    if !unoptimized && loader.is_default() {
        if src.starts_with("//") {
            push(ViolationKind::ProtocolRelativeSrc);
        } else if !src.starts_with('/') {
            match RemoteUrl::parse(src) {
                None => push(ViolationKind::InvalidSrc),
                Some(url) => {
                    if !has_match(&config.domains, &config.remote_patterns, &url)? {
                        push(ViolationKind::RemoteNotAllowed(url.hostname));
                        force_unoptimized = true;
                    }
                }
            }
        }
    }

    if !unoptimized && !loader.is_default() {
        let sample_url = loader.load(&ImageLoaderProps {
            config,
            src,
            width: width_int.value().unwrap_or(400),
            quality: Some(props.quality_int().unwrap_or(75)),
        });
        let ignores_width = sample_url == src
            || RemoteUrl::parse(&sample_url).is_some_and(|url| url.pathname == src && url.search.is_empty());
        if ignores_width {
            push(ViolationKind::LoaderIgnoresWidth);
        }
    }

    outcome.force_unoptimized = force_unoptimized;
    Ok(outcome)
}

/// Validates, logs advisories, and turns the first fatal violation into an
/// error. Returns whether the image must be rendered unoptimized.
pub fn check_image(
    props: &ImageRequest,
    config: &ImageConfig,
    loader: &ImageLoader,
) -> Result<bool, ImageError> {
    validate(props, config, loader)?.into_result()
}

fn display(value: &Option<crate::props::Dimension>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}
