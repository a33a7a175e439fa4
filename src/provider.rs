use std::rc::Rc;

use leptos::*;

use crate::config::ImageConfig;
use crate::error::ConfigError;

/// Image config shared through Leptos context.
#[derive(Clone, Debug)]
pub struct ImageConfigContext(pub(crate) Rc<ImageConfig>);

impl ImageConfigContext {
    pub fn config(&self) -> &ImageConfig {
        &self.0
    }
}

/// Validates `config` and provides it to every `<Image/>` below.
///
/// This should go in the base of your Leptos <App/>. Without it images use
/// [`ImageConfig::default`].
///
/// Example
///
/// ```ignore
/// use leptos::*;
/// use leptos_responsive_image::*;
///
/// #[component]
/// pub fn App() -> impl IntoView {
///     let config = ImageConfig {
///         remote_patterns: vec![RemotePattern::new("**.tmdb.org")],
///         ..Default::default()
///     };
///     provide_image_config(config).expect("invalid image config");
///
///     view! {
///       <Image src="/cute_ferris.png" width=342 height=556 alt="Ferris"/>
///     }
/// }
/// ```
pub fn provide_image_config(config: ImageConfig) -> Result<(), ConfigError> {
    config.validate()?;
    provide_context(ImageConfigContext(Rc::new(config)));
    Ok(())
}

pub(crate) fn use_image_config() -> Rc<ImageConfig> {
    use_context::<ImageConfigContext>()
        .map(|context| context.0)
        .unwrap_or_else(|| Rc::new(ImageConfig::default()))
}
