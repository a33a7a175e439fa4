/*!
 * Inline SVG placeholders that blur a tiny preview until the real image loads.
 */

/// Input for [`image_blur_svg`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BlurSvg<'a> {
    pub width_int: Option<u32>,
    pub height_int: Option<u32>,
    /// Dimensions of the preview itself, when it was generated at a known size.
    pub blur_width: Option<u32>,
    pub blur_height: Option<u32>,
    pub blur_data_url: &'a str,
}

/// Builds a percent-encoded SVG document that applies a Gaussian blur to
/// `blur_data_url`. Suitable for `data:image/svg+xml;charset=utf-8,` URLs.
pub fn image_blur_svg(blur: BlurSvg<'_>) -> String {
    let BlurSvg {
        width_int,
        height_int,
        blur_width,
        blur_height,
        blur_data_url,
    } = blur;

    // A preview with known dimensions is already low-noise.
    let std_deviation = if blur_width.is_some() && blur_height.is_some() {
        "1"
    } else {
        "20"
    };

    let svg_width = blur_width.or(width_int);
    let svg_height = blur_height.or(height_int);
    let view_box = match (svg_width, svg_height) {
        (Some(w), Some(h)) => format!(" viewBox='0 0 {w} {h}'"),
        _ => String::new(),
    };

    // JPEG has no alpha; snap the blurred edges back to opaque.
    let alpha_transfer = if blur_data_url.starts_with("data:image/jpeg") {
        "<feComponentTransfer><feFuncA type='discrete' tableValues='1 1'/></feComponentTransfer>"
    } else {
        ""
    };

    let document = format!(
        "<svg xmlns='http://www.w3.org/2000/svg'{view_box}>\
<filter id='b' color-interpolation-filters='sRGB'>\
<feGaussianBlur stdDeviation='{std_deviation}'/>{alpha_transfer}\
</filter>\
<image filter='url(#b)' x='0' y='0' height='100%' width='100%' href='{{href}}'/>\
</svg>"
    );

    encode_svg(&document).replace("{href}", blur_data_url)
}

/// Percent-encodes the characters that break an SVG inside a CSS `url()`.
/// Quotes, spaces and `/` stay literal, which full URL-component encoders
/// such as `urlencoding` would escape.
fn encode_svg(svg: &str) -> String {
    let mut encoded = String::with_capacity(svg.len() + svg.len() / 4);
    for c in svg.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '<' => encoded.push_str("%3C"),
            '>' => encoded.push_str("%3E"),
            '#' => encoded.push_str("%23"),
            ':' => encoded.push_str("%3A"),
            '"' => encoded.push_str("%22"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// Background style showing the blurred placeholder behind the `<img>`.
pub fn blur_style(svg: &str) -> String {
    format!(
        "background-size:cover;background-position:50% 50%;background-repeat:no-repeat;background-image:url(\"data:image/svg+xml;charset=utf-8,{svg}\");"
    )
}

#[cfg(test)]
mod blur_tests {
    use super::*;

    const JPEG: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRgABAQ";
    const WEBP: &str = "data:image/webp;base64,UklGRkAAAABXRUJQ";

    #[test]
    fn jpeg_without_blur_dimensions() {
        let svg = image_blur_svg(BlurSvg {
            width_int: Some(800),
            height_int: Some(600),
            blur_data_url: JPEG,
            ..Default::default()
        });

        assert!(svg.contains("stdDeviation='20'"));
        assert!(svg.contains("viewBox='0 0 800 600'"));
        assert!(svg.contains("%3CfeComponentTransfer%3E%3CfeFuncA type='discrete' tableValues='1 1'/%3E%3C/feComponentTransfer%3E"));
        assert!(svg.contains(&format!("href='{JPEG}'")));
    }

    #[test]
    fn webp_with_blur_dimensions() {
        let svg = image_blur_svg(BlurSvg {
            width_int: Some(800),
            height_int: Some(600),
            blur_width: Some(20),
            blur_height: Some(12),
            blur_data_url: WEBP,
        });

        assert!(svg.contains("stdDeviation='1'"));
        assert!(svg.starts_with("%3Csvg xmlns='http%3A//www.w3.org/2000/svg' viewBox='0 0 20 12'%3E%3Cfilter"));
        assert!(!svg.contains("preserveAspectRatio"));
        assert!(!svg.contains("feComponentTransfer"));
    }

    #[test]
    fn document_is_percent_encoded() {
        let svg = image_blur_svg(BlurSvg {
            blur_data_url: WEBP,
            ..Default::default()
        });

        assert!(svg.starts_with("%3Csvg xmlns='http%3A//www.w3.org/2000/svg'"));
        assert!(svg.contains("filter='url(%23b)'"));
        assert!(svg.contains("height='100%25'"));
        assert!(svg.ends_with("%3C/svg%3E"));
        assert!(!svg.contains("viewBox"));
        assert!(!svg.contains('<'));
    }

    #[test]
    fn style_embeds_svg() {
        let style = blur_style("%3Csvg/%3E");
        assert!(style.contains("background-image:url(\"data:image/svg+xml;charset=utf-8,%3Csvg/%3E\")"));
        assert!(style.starts_with("background-size:cover;"));
    }
}
