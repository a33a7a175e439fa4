use std::rc::Rc;

use leptos::*;
use leptos_meta::Link;

use crate::blur::{blur_style, image_blur_svg, BlurSvg};
use crate::config::ImageConfig;
use crate::error::ImageError;
use crate::loader::ImageLoader;
use crate::loading::{AttachmentFlag, LoadCompletionTracker, LoadTarget, OnLoadingComplete};
use crate::props::{Dimension, ImageRequest, ImageStyle, Placeholder};
use crate::provider::use_image_config;
use crate::srcset::{generate_img_attrs, GenImgAttrs, ImgAttrs};
use crate::validate::check_image;

const FILL_STYLE: &str = "position:absolute;height:100%;width:100%;left:0;top:0;right:0;bottom:0;";

/**
 * Image component rendering a responsive `<img>` with `srcset` and `sizes`
 * generated by the configured loader.
 *
 * Invalid props render as an error, so wrap images in an `<ErrorBoundary/>`
 * when the props are not static.
 */
#[component]
pub fn Image(
    #[prop(into)] src: String,
    #[prop(into, optional)] alt: String,
    #[prop(into, optional)] width: Option<Dimension>,
    #[prop(into, optional)] height: Option<Dimension>,
    // Stretches the image over its positioned parent instead of using width/height.
    #[prop(optional)] fill: bool,
    #[prop(into, optional)] quality: Option<Dimension>,
    // Loads eagerly and adds a preload link to head.
    #[prop(optional)] priority: bool,
    #[prop(into, optional)] loading: Option<String>,
    #[prop(optional)] placeholder: Placeholder,
    #[prop(into, optional)] blur_data_url: Option<String>,
    #[prop(optional)] blur_width: Option<u32>,
    #[prop(optional)] blur_height: Option<u32>,
    #[prop(optional)] unoptimized: bool,
    #[prop(into, optional)] sizes: Option<String>,
    #[prop(optional)] loader: Option<ImageLoader>,
    #[prop(optional)] style: ImageStyle,
    #[prop(into, optional)] class: String,
    #[prop(optional)] on_loading_complete: Option<Callback<()>>,
    #[prop(optional)] device_sizes: Option<Vec<u32>>,
    #[prop(optional)] image_sizes: Option<Vec<u32>>,
) -> impl IntoView {
    let request = ImageRequest {
        src,
        width,
        height,
        fill,
        quality,
        priority,
        loading,
        placeholder,
        blur_data_url,
        blur_width,
        blur_height,
        unoptimized,
        sizes,
        loader,
        style,
        has_ref: false,
        device_sizes,
        image_sizes,
    };

    image_view(request, alt, class, on_loading_complete)
}

fn image_view(
    request: ImageRequest,
    alt: String,
    class: String,
    on_loading_complete: Option<Callback<()>>,
) -> Result<View, ImageError> {
    let config = use_image_config();
    let prepared = prepare_image(&request, &config)?;

    #[cfg(feature = "hydrate")]
    track_largest_contentful_paint(&prepared.attrs.src, &request);

    Ok(render_image(prepared, request, alt, class, on_loading_complete))
}

/// Registers the image for the LCP advisory while it is on the page.
#[cfg(feature = "hydrate")]
fn track_largest_contentful_paint(rendered_src: &str, request: &ImageRequest) {
    use crate::lcp::{LcpCandidate, LcpRegistry};

    let registry = LcpRegistry::global();
    registry.observe(&crate::dom::DomLcpObserver);
    registry.register(
        rendered_src,
        LcpCandidate {
            src: request.src.clone(),
            priority: request.priority,
            placeholder: request.placeholder,
        },
    );

    let rendered_src = rendered_src.to_string();
    on_cleanup(move || registry.unregister(&rendered_src));
}

/// Everything the `<img>` needs, computed before rendering.
#[derive(Clone, Debug)]
pub(crate) struct PreparedImage {
    pub attrs: ImgAttrs,
    pub img_style: String,
    /// Blurred background shown until the image has loaded.
    pub placeholder_style: Option<String>,
    pub loading: &'static str,
    pub data_nimg: &'static str,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

pub(crate) fn prepare_image(request: &ImageRequest, config: &ImageConfig) -> Result<PreparedImage, ImageError> {
    let config = config.with_sizes(request.device_sizes.as_deref(), request.image_sizes.as_deref());
    if request.device_sizes.is_some() || request.image_sizes.is_some() {
        config.validate_sizes()?;
    }
    let loader = ImageLoader::resolve(&config, request.loader.as_ref())?;
    let force_unoptimized = check_image(request, &config, &loader)?;

    let width = request.width_int().value();
    let height = request.height_int().value();
    let unoptimized = request.unoptimized || config.unoptimized || request.is_inline_source() || force_unoptimized;

    let attrs = generate_img_attrs(GenImgAttrs {
        config: &config,
        src: &request.src,
        unoptimized,
        width,
        quality: request.quality_int(),
        sizes: request.sizes.as_deref(),
        loader: &loader,
    });

    let mut img_style = String::new();
    if request.fill {
        img_style.push_str(FILL_STYLE);
    }
    img_style.push_str(&request.style.to_css());
    img_style.push_str("color:transparent;");

    let placeholder_style = match (request.placeholder, request.blur_data_url.as_deref()) {
        (Placeholder::Blur, Some(blur_data_url)) => Some(blur_style(&image_blur_svg(BlurSvg {
            width_int: width,
            height_int: height,
            blur_width: request.blur_width,
            blur_height: request.blur_height,
            blur_data_url,
        }))),
        _ => None,
    };

    let loading = if request.priority {
        "eager"
    } else {
        match request.loading.as_deref() {
            Some("eager") => "eager",
            _ => "lazy",
        }
    };

    Ok(PreparedImage {
        attrs,
        img_style,
        placeholder_style,
        loading,
        data_nimg: if request.fill { "fill" } else { "1" },
        width,
        height,
    })
}

fn completion_callback<E: 'static>(callback: Option<Callback<()>>) -> Option<OnLoadingComplete<E>> {
    callback.map(|callback| Box::new(move |_: &E| callback.call(())) as OnLoadingComplete<E>)
}

fn track_load<E: LoadTarget + 'static>(
    tracker: &LoadCompletionTracker,
    target: Option<E>,
    src: &str,
    placeholder: Placeholder,
    on_loading_complete: Option<Callback<()>>,
    set_blur_complete: WriteSignal<bool>,
) {
    let pending = tracker.on_attach_or_update(
        target,
        src,
        placeholder,
        completion_callback(on_loading_complete),
        move |done| set_blur_complete.set(done),
    );
    if let Some(pending) = pending {
        spawn_local(async move {
            let outcome = pending.await;
            log::trace!("Image load finished: {outcome:?}");
        });
    }
}

fn render_image(
    prepared: PreparedImage,
    request: ImageRequest,
    alt: String,
    class: String,
    on_loading_complete: Option<Callback<()>>,
) -> View {
    let PreparedImage {
        attrs,
        img_style,
        placeholder_style,
        loading,
        data_nimg,
        width,
        height,
    } = prepared;

    let (blur_complete, set_blur_complete) = create_signal(false);
    let style = move || match &placeholder_style {
        Some(placeholder) if !blur_complete.get() => format!("{img_style}{placeholder}"),
        _ => img_style.clone(),
    };

    let attached = AttachmentFlag::attached();
    on_cleanup({
        let attached = attached.clone();
        move || attached.detach()
    });

    let tracker = Rc::new(LoadCompletionTracker::new());
    let placeholder = request.placeholder;
    let img_ref = create_node_ref::<html::Img>();

    // An image that finished loading before hydration never sees `load`.
    #[cfg(feature = "hydrate")]
    {
        let tracker = tracker.clone();
        let attached = attached.clone();
        let loaded_src = attrs.src.clone();
        img_ref.on_load(move |img| {
            let node: &web_sys::HtmlImageElement = &img;
            if node.complete() {
                track_load(
                    &tracker,
                    Some(crate::dom::DomImage::new(node.clone(), attached)),
                    &loaded_src,
                    placeholder,
                    on_loading_complete,
                    set_blur_complete,
                );
            }
        });
    }

    let loaded_src = attrs.src.clone();
    let on_load = move |_ev: ev::Event| {
        #[cfg(feature = "hydrate")]
        let target = crate::dom::DomImage::from_event(&_ev, attached.clone());
        #[cfg(not(feature = "hydrate"))]
        let target = Some(attached.clone());

        track_load(
            &tracker,
            target,
            &loaded_src,
            placeholder,
            on_loading_complete,
            set_blur_complete,
        );
    };

    let ImgAttrs { src_set, sizes, src } = attrs;

    view! {
        {request.priority.then(|| view! { <Link rel="preload" as_="image" href=src.clone()/> })}
        <img
            node_ref=img_ref
            srcset=src_set
            sizes=sizes
            src=src
            alt=alt
            width=width.map(|w| w.to_string())
            height=height.map(|h| h.to_string())
            loading=loading
            decoding="async"
            data-nimg=data_nimg
            class=class
            style=style
            on:load=on_load
        />
    }
    .into_view()
}
