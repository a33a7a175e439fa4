use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;

use crate::props::Placeholder;
use crate::validate::{Violation, ViolationKind};
use crate::warn::warn_once;

lazy_static! {
    static ref GLOBAL_REGISTRY: LcpRegistry = LcpRegistry::default();
}

/// What the registry remembers about a rendered image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LcpCandidate {
    /// The `src` the caller declared.
    pub src: String,
    pub priority: bool,
    pub placeholder: Placeholder,
}

/// Rendered images keyed by their final `src` URL, so that a
/// largest-contentful-paint entry can be traced back to the declaring props.
#[derive(Clone, Debug, Default)]
pub struct LcpRegistry {
    images: Arc<Mutex<HashMap<String, LcpCandidate>>>,
    observing: Arc<AtomicBool>,
}

/// Host capability for subscribing to largest-contentful-paint entries.
/// The callback receives the `src` of the painted element.
pub trait PerformanceObserverHost {
    fn observe_largest_contentful_paint(
        &self,
        on_entry: Box<dyn Fn(&str) + Send + Sync>,
    ) -> Result<(), String>;
}

impl LcpRegistry {
    pub fn global() -> &'static LcpRegistry {
        &GLOBAL_REGISTRY
    }

    pub fn register(&self, rendered_src: impl Into<String>, candidate: LcpCandidate) {
        self.images
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(rendered_src.into(), candidate);
    }

    /// Forgets an image once it leaves the page.
    pub fn unregister(&self, rendered_src: &str) {
        self.images
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(rendered_src);
    }

    pub fn len(&self) -> usize {
        self.images
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handles one LCP entry. Returns the advisory when the painted image
    /// should have been marked `priority`.
    pub fn on_largest_contentful_paint(&self, element_src: &str) -> Option<Violation> {
        let candidate = self
            .images
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(element_src)
            .cloned()?;

        let inline = candidate.src.starts_with("data:") || candidate.src.starts_with("blob:");
        if candidate.priority || candidate.placeholder == Placeholder::Blur || inline {
            return None;
        }

        let violation = Violation::new(candidate.src, ViolationKind::LargestContentfulPaint);
        warn_once(violation.to_string());
        Some(violation)
    }

    /// Subscribes this registry to the host's LCP entries, once. Observation
    /// is best-effort: a host that cannot observe is logged and ignored, and
    /// the next call tries again.
    pub fn observe(&self, host: &dyn PerformanceObserverHost) {
        if self.observing.swap(true, Ordering::SeqCst) {
            return;
        }
        let registry = self.clone();
        let result = host.observe_largest_contentful_paint(Box::new(move |src| {
            registry.on_largest_contentful_paint(src);
        }));
        if let Err(err) = result {
            self.observing.store(false, Ordering::SeqCst);
            log::error!("Failed to observe largest-contentful-paint: {err}");
        }
    }
}

#[cfg(test)]
mod lcp_tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn candidate(src: &str, priority: bool, placeholder: Placeholder) -> LcpCandidate {
        LcpCandidate {
            src: src.to_string(),
            priority,
            placeholder,
        }
    }

    #[test]
    fn warns_for_non_priority_lcp() {
        let registry = LcpRegistry::default();
        registry.register(
            "/cache/image?url=%2Fhero.jpg&w=3840&q=75",
            candidate("/hero.jpg", false, Placeholder::Empty),
        );

        let violation = registry
            .on_largest_contentful_paint("/cache/image?url=%2Fhero.jpg&w=3840&q=75")
            .unwrap();
        assert_eq!(violation.kind, ViolationKind::LargestContentfulPaint);
        assert_eq!(violation.src, "/hero.jpg");
    }

    #[test]
    fn skips_priority_blur_inline_and_unknown() {
        let registry = LcpRegistry::default();
        registry.register("/a", candidate("/a.jpg", true, Placeholder::Empty));
        registry.register("/b", candidate("/b.jpg", false, Placeholder::Blur));
        registry.register("data:image/png;base64,AAAA", candidate("data:image/png;base64,AAAA", false, Placeholder::Empty));

        assert!(registry.on_largest_contentful_paint("/a").is_none());
        assert!(registry.on_largest_contentful_paint("/b").is_none());
        assert!(registry.on_largest_contentful_paint("data:image/png;base64,AAAA").is_none());
        assert!(registry.on_largest_contentful_paint("/unknown").is_none());
    }

    struct FailingHost;

    impl PerformanceObserverHost for FailingHost {
        fn observe_largest_contentful_paint(
            &self,
            _on_entry: Box<dyn Fn(&str) + Send + Sync>,
        ) -> Result<(), String> {
            Err("largest-contentful-paint is not supported".to_string())
        }
    }

    struct ImmediateHost(&'static str);

    impl PerformanceObserverHost for ImmediateHost {
        fn observe_largest_contentful_paint(
            &self,
            on_entry: Box<dyn Fn(&str) + Send + Sync>,
        ) -> Result<(), String> {
            on_entry(self.0);
            Ok(())
        }
    }

    #[test]
    fn observer_failures_are_swallowed() {
        LcpRegistry::default().observe(&FailingHost);
    }

    #[test]
    fn observer_entries_reach_registry() {
        let registry = LcpRegistry::default();
        registry.register("/lcp_tests/hero", candidate("/lcp_tests/hero.jpg", false, Placeholder::Empty));
        registry.observe(&ImmediateHost("/lcp_tests/hero"));
        assert!(crate::warn::WarningLedger::global().contains(
            "Image with src \"/lcp_tests/hero.jpg\" was detected as the Largest Contentful Paint (LCP). Please add the \"priority\" property if this image is above the fold."
        ));
    }

    struct CountingHost(AtomicUsize);

    impl PerformanceObserverHost for CountingHost {
        fn observe_largest_contentful_paint(
            &self,
            _on_entry: Box<dyn Fn(&str) + Send + Sync>,
        ) -> Result<(), String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn observer_is_registered_once() {
        let registry = LcpRegistry::default();
        let host = CountingHost(AtomicUsize::new(0));
        registry.observe(&host);
        registry.observe(&host);
        assert_eq!(host.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_observer_can_be_retried() {
        let registry = LcpRegistry::default();
        registry.observe(&FailingHost);
        let host = CountingHost(AtomicUsize::new(0));
        registry.observe(&host);
        assert_eq!(host.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_drops_entry() {
        let registry = LcpRegistry::default();
        registry.register("/gone", candidate("/gone.jpg", false, Placeholder::Empty));
        assert_eq!(registry.len(), 1);
        registry.unregister("/gone");
        assert!(registry.is_empty());
        assert!(registry.on_largest_contentful_paint("/gone").is_none());
    }
}
