use lazy_static::lazy_static;
use regex::Regex;

use crate::config::ImageConfig;
use crate::loader::{ImageLoader, ImageLoaderProps};

lazy_static! {
    static ref VIEWPORT_WIDTH: Regex = Regex::new(r"(^|\s)(1?\d?\d)vw").expect("vw regex is valid");
}

/// How `srcset` candidates are tagged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DescriptorKind {
    /// `640w`: the browser picks by layout width.
    Width,
    /// `1x`, `2x`: fixed layout width, picked by pixel density.
    Density,
}

impl DescriptorKind {
    pub fn suffix(&self) -> char {
        match self {
            DescriptorKind::Width => 'w',
            DescriptorKind::Density => 'x',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Widths {
    pub widths: Vec<u32>,
    pub kind: DescriptorKind,
}

/// Candidate widths for one image.
///
/// ```
/// use leptos_responsive_image::{get_widths, DescriptorKind, ImageConfig};
///
/// let widths = get_widths(&ImageConfig::default(), Some(342), None);
/// assert_eq!(widths.widths, vec![384, 750]);
/// assert_eq!(widths.kind, DescriptorKind::Density);
/// ```
pub fn get_widths(config: &ImageConfig, width: Option<u32>, sizes: Option<&str>) -> Widths {
    let all_sizes = config.all_sizes();
    let sizes = sizes.filter(|sizes| !sizes.is_empty());

    if let Some(sizes) = sizes {
        let smallest_percent = VIEWPORT_WIDTH
            .captures_iter(sizes)
            .filter_map(|caps| caps[2].parse::<u32>().ok())
            .min();

        let widths = match smallest_percent {
            Some(percent) => {
                let ratio = f64::from(percent) * 0.01;
                let smallest_device = config.device_sizes.first().copied().unwrap_or(0);
                let floor = f64::from(smallest_device) * ratio;
                all_sizes
                    .into_iter()
                    .filter(|size| f64::from(*size) >= floor)
                    .collect()
            }
            None => all_sizes,
        };
        return Widths {
            widths,
            kind: DescriptorKind::Width,
        };
    }

    let Some(width) = width else {
        return Widths {
            widths: config.device_sizes.clone(),
            kind: DescriptorKind::Width,
        };
    };

    // 3x candidates are left out: on most high-density screens they are
    // indistinguishable from 2x and cost far more bytes.
    let mut widths = Vec::with_capacity(2);
    for target in [width, width.saturating_mul(2)] {
        let snapped = all_sizes
            .iter()
            .copied()
            .find(|size| *size >= target)
            .or_else(|| all_sizes.last().copied());
        if let Some(snapped) = snapped {
            if !widths.contains(&snapped) {
                widths.push(snapped);
            }
        }
    }
    Widths {
        widths,
        kind: DescriptorKind::Density,
    }
}

/// Input to [`generate_img_attrs`].
#[derive(Clone, Copy, Debug)]
pub struct GenImgAttrs<'a> {
    pub config: &'a ImageConfig,
    pub src: &'a str,
    pub unoptimized: bool,
    pub width: Option<u32>,
    pub quality: Option<u8>,
    pub sizes: Option<&'a str>,
    pub loader: &'a ImageLoader,
}

/// Generated `<img>` attributes.
///
/// Fields are declared in emission order: `srcset` and `sizes` have to be
/// set before `src`, otherwise some engines start fetching `src` on
/// assignment and then fetch again once `srcset` arrives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImgAttrs {
    pub src_set: Option<String>,
    pub sizes: Option<String>,
    pub src: String,
}

pub fn generate_img_attrs(input: GenImgAttrs<'_>) -> ImgAttrs {
    let GenImgAttrs {
        config,
        src,
        unoptimized,
        width,
        quality,
        sizes,
        loader,
    } = input;
    let sizes = sizes.filter(|sizes| !sizes.is_empty());

    if unoptimized {
        return ImgAttrs {
            src_set: None,
            sizes: None,
            src: src.to_string(),
        };
    }

    let Widths { widths, kind } = get_widths(config, width, sizes);
    let Some(largest) = widths.last().copied() else {
        log::debug!("No candidate widths for {src}, serving it unoptimized");
        return ImgAttrs {
            src_set: None,
            sizes: None,
            src: src.to_string(),
        };
    };

    let load = |width: u32| {
        loader.load(&ImageLoaderProps {
            config,
            src,
            width,
            quality,
        })
    };

    let src_set = widths
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let descriptor = match kind {
                DescriptorKind::Width => *w,
                DescriptorKind::Density => i as u32 + 1,
            };
            format!("{} {}{}", load(*w), descriptor, kind.suffix())
        })
        .collect::<Vec<_>>()
        .join(", ");

    let sizes = match (sizes, kind) {
        (None, DescriptorKind::Width) => Some("100vw".to_string()),
        (sizes, _) => sizes.map(str::to_string),
    };

    ImgAttrs {
        src_set: Some(src_set),
        sizes,
        src: load(largest),
    }
}
