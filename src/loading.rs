use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::props::Placeholder;
use crate::warn::warn_once;

/// Decode failures are treated exactly like success; the error only exists
/// so hosts can report what happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError(pub String);

/// Explicit attachment status for one rendered element. The host clears it
/// when the element is removed.
#[derive(Clone, Debug)]
pub struct AttachmentFlag(Rc<Cell<bool>>);

impl Default for AttachmentFlag {
    fn default() -> Self {
        Self::attached()
    }
}

impl AttachmentFlag {
    pub fn attached() -> Self {
        AttachmentFlag(Rc::new(Cell::new(true)))
    }

    pub fn detach(&self) {
        self.0.set(false);
    }

    pub fn is_attached(&self) -> bool {
        self.0.get()
    }
}

/// Rendered measurements used by the development-only heuristics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayoutSnapshot {
    pub fill: bool,
    /// Value of the rendered `sizes` attribute.
    pub sizes: Option<String>,
    pub rendered_width: f64,
    pub viewport_width: f64,
    /// Computed `position` of the parent element.
    pub parent_position: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Declared `width`/`height` attributes.
    pub width_attr: Option<String>,
    pub height_attr: Option<String>,
}

/// The element side of load tracking.
pub trait LoadTarget {
    fn is_attached(&self) -> bool;

    /// Decodes the image bytes. `None` means the host has no decode
    /// capability and the image counts as ready.
    fn decode(&self) -> Option<LocalBoxFuture<'static, Result<(), DecodeError>>> {
        None
    }

    fn layout(&self) -> Option<LayoutSnapshot> {
        None
    }
}

impl LoadTarget for AttachmentFlag {
    fn is_attached(&self) -> bool {
        AttachmentFlag::is_attached(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed,
    /// The element was removed while decoding; nothing fired.
    Detached,
}

pub type OnLoadingComplete<E> = Box<dyn FnOnce(&E)>;

/// Per-element load state. Remembers the last source that completed so that
/// re-renders with the same source never refire side effects.
#[derive(Debug, Default)]
pub struct LoadCompletionTracker {
    last_loaded_src: RefCell<Option<String>>,
}

impl LoadCompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_loaded_src(&self) -> Option<String> {
        self.last_loaded_src.borrow().clone()
    }

    /// Starts completion handling for `src` on `element`.
    ///
    /// Returns `None` when there is nothing to do (no element, or `src`
    /// already handled). Otherwise the source is recorded immediately and
    /// the returned future performs the decode and the side effects; the
    /// host drives it on its event loop.
    pub fn on_attach_or_update<E>(
        &self,
        element: Option<E>,
        src: &str,
        placeholder: Placeholder,
        on_loading_complete: Option<OnLoadingComplete<E>>,
        set_blur_complete: impl FnOnce(bool) + 'static,
    ) -> Option<LocalBoxFuture<'static, LoadOutcome>>
    where
        E: LoadTarget + 'static,
    {
        let element = element?;
        if self.last_loaded_src.borrow().as_deref() == Some(src) {
            return None;
        }
        *self.last_loaded_src.borrow_mut() = Some(src.to_string());

        let src = src.to_string();
        let decode = element.decode();

        Some(
            async move {
                if let Some(decode) = decode {
                    if let Err(err) = decode.await {
                        log::debug!("Decode failed for {src}: {err:?}");
                    }
                }

                if !element.is_attached() {
                    return LoadOutcome::Detached;
                }

                if placeholder == Placeholder::Blur {
                    set_blur_complete(true);
                }
                if let Some(callback) = on_loading_complete {
                    callback(&element);
                }

                if cfg!(debug_assertions) {
                    if let Some(layout) = element.layout() {
                        for warning in layout_warnings(&src, &layout) {
                            warn_once(warning);
                        }
                    }
                }

                LoadOutcome::Completed
            }
            .boxed_local(),
        )
    }
}

/// Development heuristics about how the image ended up laid out.
pub fn layout_warnings(src: &str, layout: &LayoutSnapshot) -> Vec<String> {
    let mut warnings = Vec::new();

    if layout.fill {
        let missing_sizes = matches!(layout.sizes.as_deref(), None | Some("") | Some("100vw"));
        if missing_sizes && layout.viewport_width > 0.0 {
            let ratio = layout.rendered_width / layout.viewport_width;
            if ratio < 0.6 {
                warnings.push(format!(
                    "Image with src \"{src}\" has \"fill\" but is missing \"sizes\" prop. Please add it to improve page performance."
                ));
            }
        }

        if let Some(position) = layout.parent_position.as_deref() {
            const VALID: [&str; 3] = ["absolute", "fixed", "relative"];
            if !VALID.contains(&position) {
                warnings.push(format!(
                    "Image with src \"{src}\" has \"fill\" and parent element with invalid \"position\". Provided \"{position}\" should be one of {}.",
                    VALID.join(",")
                ));
            }
        }

        if layout.height == 0 {
            warnings.push(format!(
                "Image with src \"{src}\" has \"fill\" and a height value of 0. This is likely because the parent element of the image has not been styled to have a set height."
            ));
        }
    }

    let height_modified = layout.height_attr.as_deref() != Some(layout.height.to_string().as_str());
    let width_modified = layout.width_attr.as_deref() != Some(layout.width.to_string().as_str());
    if height_modified != width_modified {
        warnings.push(format!(
            "Image with src \"{src}\" has either width or height modified, but not the other. If you use CSS to change the size of your image, also include the styles 'width: \"auto\"' or 'height: \"auto\"' to maintain the aspect ratio."
        ));
    }

    warnings
}
