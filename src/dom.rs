use futures::future::LocalBoxFuture;
use futures::FutureExt;
use wasm_bindgen::prelude::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{HtmlImageElement, PerformanceObserver, PerformanceObserverEntryList, PerformanceObserverInit};

use crate::lcp::PerformanceObserverHost;
use crate::loading::{AttachmentFlag, DecodeError, LayoutSnapshot, LoadTarget};

/// A rendered `<img>` in the browser.
#[derive(Clone, Debug)]
pub struct DomImage {
    node: HtmlImageElement,
    attached: AttachmentFlag,
}

impl DomImage {
    pub fn new(node: HtmlImageElement, attached: AttachmentFlag) -> Self {
        Self { node, attached }
    }

    /// The `<img>` a `load` event was dispatched to.
    pub fn from_event(event: &web_sys::Event, attached: AttachmentFlag) -> Option<Self> {
        let node = event.target()?.dyn_into::<HtmlImageElement>().ok()?;
        Some(Self::new(node, attached))
    }

    pub fn node(&self) -> &HtmlImageElement {
        &self.node
    }
}

impl LoadTarget for DomImage {
    fn is_attached(&self) -> bool {
        self.attached.is_attached() && self.node.parent_node().is_some()
    }

    fn decode(&self) -> Option<LocalBoxFuture<'static, Result<(), DecodeError>>> {
        let promise = self.node.decode();
        Some(
            async move {
                wasm_bindgen_futures::JsFuture::from(promise)
                    .await
                    .map(|_| ())
                    .map_err(|err| DecodeError(format!("{err:?}")))
            }
            .boxed_local(),
        )
    }

    fn layout(&self) -> Option<LayoutSnapshot> {
        let window = web_sys::window()?;
        let parent_position = self.node.parent_element().and_then(|parent| {
            window
                .get_computed_style(&parent)
                .ok()
                .flatten()
                .and_then(|style| style.get_property_value("position").ok())
        });

        Some(LayoutSnapshot {
            fill: self.node.get_attribute("data-nimg").as_deref() == Some("fill"),
            sizes: self.node.get_attribute("sizes"),
            rendered_width: self.node.get_bounding_client_rect().width(),
            viewport_width: window.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(0.0),
            parent_position,
            width: self.node.width(),
            height: self.node.height(),
            width_attr: self.node.get_attribute("width"),
            height_attr: self.node.get_attribute("height"),
        })
    }
}

/// `PerformanceObserver` subscription for `largest-contentful-paint`
/// entries. Reports the painted element's `src` attribute, falling back to
/// the entry's resolved `url`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DomLcpObserver;

impl PerformanceObserverHost for DomLcpObserver {
    fn observe_largest_contentful_paint(
        &self,
        on_entry: Box<dyn Fn(&str) + Send + Sync>,
    ) -> Result<(), String> {
        let callback = Closure::<dyn FnMut(PerformanceObserverEntryList)>::new(
            move |list: PerformanceObserverEntryList| {
                for entry in list.get_entries().iter() {
                    if let Some(src) = painted_src(&entry) {
                        on_entry(&src);
                    }
                }
            },
        );

        let observer = PerformanceObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|err| format!("{err:?}"))?;

        let init: PerformanceObserverInit = js_sys::Object::new().unchecked_into();
        set_property(&init, "type", &JsValue::from_str("largest-contentful-paint"))?;
        set_property(&init, "buffered", &JsValue::TRUE)?;
        observer.observe(&init);

        // The observer lives for the whole page.
        callback.forget();
        Ok(())
    }
}

fn set_property(target: &JsValue, key: &str, value: &JsValue) -> Result<(), String> {
    js_sys::Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(|err| format!("{err:?}"))
}

fn painted_src(entry: &JsValue) -> Option<String> {
    let from_element = js_sys::Reflect::get(entry, &JsValue::from_str("element"))
        .ok()
        .and_then(|element| element.dyn_into::<web_sys::Element>().ok())
        .and_then(|element| element.get_attribute("src"));
    from_element.or_else(|| {
        js_sys::Reflect::get(entry, &JsValue::from_str("url"))
            .ok()
            .and_then(|url| url.as_string())
            .filter(|url| !url.is_empty())
    })
}
