use std::fmt;

use serde::{Deserialize, Serialize};

use crate::loader::ImageLoader;

/// A pixel dimension given either as a number or as a numeric string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Dimension {
    Pixels(u32),
    Text(String),
}

impl From<u32> for Dimension {
    fn from(value: u32) -> Self {
        Dimension::Pixels(value)
    }
}

impl From<i32> for Dimension {
    fn from(value: i32) -> Self {
        match u32::try_from(value) {
            Ok(value) => Dimension::Pixels(value),
            Err(_) => Dimension::Text(value.to_string()),
        }
    }
}

impl From<&str> for Dimension {
    fn from(value: &str) -> Self {
        Dimension::Text(value.to_string())
    }
}

impl From<String> for Dimension {
    fn from(value: String) -> Self {
        Dimension::Text(value)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Pixels(value) => write!(f, "{value}"),
            Dimension::Text(value) => f.write_str(value),
        }
    }
}

/// Result of coercing an optional [`Dimension`] to an integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntProp {
    Missing,
    Valid(u32),
    Invalid,
}

impl IntProp {
    pub fn value(&self) -> Option<u32> {
        match self {
            IntProp::Valid(value) => Some(*value),
            _ => None,
        }
    }
}

/// Numbers pass through; strings must be all ASCII digits.
pub fn get_int(value: Option<&Dimension>) -> IntProp {
    match value {
        None => IntProp::Missing,
        Some(Dimension::Pixels(value)) => IntProp::Valid(*value),
        Some(Dimension::Text(text)) => {
            if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                text.parse().map(IntProp::Valid).unwrap_or(IntProp::Invalid)
            } else {
                IntProp::Invalid
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placeholder {
    #[default]
    Empty,
    Blur,
}

/// Style properties the layout rules care about, plus free-form CSS.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageStyle {
    pub position: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    /// Extra declarations appended verbatim, e.g. `"object-fit:cover"`.
    pub extra: Option<String>,
}

impl ImageStyle {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.width.is_none() && self.height.is_none() && self.extra.is_none()
    }

    pub fn to_css(&self) -> String {
        let mut css = String::new();
        for (name, value) in [
            ("position", &self.position),
            ("width", &self.width),
            ("height", &self.height),
        ] {
            if let Some(value) = value {
                css.push_str(&format!("{name}:{value};"));
            }
        }
        if let Some(extra) = &self.extra {
            css.push_str(extra.trim_end_matches(';'));
            css.push(';');
        }
        css
    }
}

/// Everything the caller declared for one image render.
#[derive(Clone, Debug, Default)]
pub struct ImageRequest {
    pub src: String,
    pub width: Option<Dimension>,
    pub height: Option<Dimension>,
    pub fill: bool,
    pub quality: Option<Dimension>,
    pub priority: bool,
    /// Raw `loading` attribute; only `lazy` and `eager` are accepted.
    pub loading: Option<String>,
    pub placeholder: Placeholder,
    pub blur_data_url: Option<String>,
    pub blur_width: Option<u32>,
    pub blur_height: Option<u32>,
    pub unoptimized: bool,
    pub sizes: Option<String>,
    pub loader: Option<ImageLoader>,
    pub style: ImageStyle,
    /// Set when the caller passed a raw element handle instead of using the
    /// completion callback.
    pub has_ref: bool,
    pub device_sizes: Option<Vec<u32>>,
    pub image_sizes: Option<Vec<u32>>,
}

impl ImageRequest {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            ..Default::default()
        }
    }

    pub fn width_int(&self) -> IntProp {
        get_int(self.width.as_ref())
    }

    pub fn height_int(&self) -> IntProp {
        get_int(self.height.as_ref())
    }

    /// Quality clamped to 1..=100; unparseable values are ignored.
    pub fn quality_int(&self) -> Option<u8> {
        get_int(self.quality.as_ref())
            .value()
            .map(|q| q.clamp(1, 100) as u8)
    }

    /// `data:` and `blob:` sources are already local bytes.
    pub fn is_inline_source(&self) -> bool {
        self.src.starts_with("data:") || self.src.starts_with("blob:")
    }
}

#[cfg(test)]
mod props_tests {
    use super::*;

    #[test]
    fn get_int_coercion() {
        assert_eq!(get_int(None), IntProp::Missing);
        assert_eq!(get_int(Some(&Dimension::from(342))), IntProp::Valid(342));
        assert_eq!(get_int(Some(&Dimension::from("556"))), IntProp::Valid(556));
        assert_eq!(get_int(Some(&Dimension::from("556px"))), IntProp::Invalid);
        assert_eq!(get_int(Some(&Dimension::from(""))), IntProp::Invalid);
        assert_eq!(get_int(Some(&Dimension::from(-4))), IntProp::Invalid);
        assert_eq!(get_int(Some(&Dimension::from("99999999999"))), IntProp::Invalid);
    }

    #[test]
    fn quality_is_clamped() {
        let props = ImageRequest {
            quality: Some(Dimension::from(250)),
            ..ImageRequest::new("/a.png")
        };
        assert_eq!(props.quality_int(), Some(100));
        let props = ImageRequest {
            quality: Some("abc".into()),
            ..ImageRequest::new("/a.png")
        };
        assert_eq!(props.quality_int(), None);
    }

    #[test]
    fn style_to_css() {
        let style = ImageStyle {
            position: Some("absolute".to_string()),
            extra: Some("object-fit:cover;".to_string()),
            ..Default::default()
        };
        assert_eq!(style.to_css(), "position:absolute;object-fit:cover;");
        assert!(ImageStyle::default().is_empty());
    }

    #[test]
    fn dimension_deserializes_from_number_or_string() {
        let dims: Vec<Dimension> = serde_json::from_str(r#"[640, "480"]"#).unwrap();
        assert_eq!(dims, vec![Dimension::Pixels(640), Dimension::Text("480".to_string())]);
    }
}
