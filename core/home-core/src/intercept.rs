//! Middleware around the host's "open resource in tab" handler.
//!
//! Hosts route every user-initiated open through [`OpenInterceptor::dispatch`]
//! before performing it. Layers run newest first; each may pass the request
//! on (possibly rewritten) or claim it. Installing a layer returns an
//! [`InterceptGuard`] that removes it again on drop or [`InterceptGuard::restore`],
//! so teardown can never leave a stale layer behind.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::layout::TabHandle;
use crate::paths::resources_match;
use crate::reconciler::TabReconciler;
use crate::settings::HomeSettings;
use crate::types::FormFactor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub resource: String,
    /// Tab the host is about to navigate; `None` opens a new tab.
    pub target_tab: Option<TabHandle>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenDecision {
    /// Perform this (possibly rewritten) request.
    Proceed(OpenRequest),
    /// A layer took care of the request; the host does nothing.
    Handled,
}

pub trait OpenLayer {
    fn name(&self) -> &str;

    fn intercept(&self, request: OpenRequest) -> OpenDecision;
}

type LayerList = RefCell<Vec<(u64, Rc<dyn OpenLayer>)>>;

#[derive(Default)]
pub struct OpenInterceptor {
    layers: Rc<LayerList>,
    next_id: Cell<u64>,
}

impl OpenInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "dropping the guard removes the layer immediately"]
    pub fn install(&self, layer: Rc<dyn OpenLayer>) -> InterceptGuard {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        debug!(layer = %layer.name(), "Installing open layer");
        self.layers.borrow_mut().push((id, layer));
        InterceptGuard {
            layers: Rc::downgrade(&self.layers),
            id,
        }
    }

    /// Runs the request through every layer, newest first.
    pub fn dispatch(&self, request: OpenRequest) -> OpenDecision {
        // Snapshot so layers may install or remove layers while running.
        let layers: Vec<Rc<dyn OpenLayer>> = self
            .layers
            .borrow()
            .iter()
            .rev()
            .map(|(_, layer)| layer.clone())
            .collect();

        let mut request = request;
        for layer in layers {
            match layer.intercept(request) {
                OpenDecision::Proceed(next) => request = next,
                OpenDecision::Handled => {
                    debug!(layer = %layer.name(), "Open handled by layer");
                    return OpenDecision::Handled;
                }
            }
        }
        OpenDecision::Proceed(request)
    }

    pub fn layer_count(&self) -> usize {
        self.layers.borrow().len()
    }
}

/// Keeps a layer installed while alive.
pub struct InterceptGuard {
    layers: Weak<LayerList>,
    id: u64,
}

impl InterceptGuard {
    pub fn restore(self) {
        drop(self);
    }
}

impl Drop for InterceptGuard {
    fn drop(&mut self) {
        if let Some(layers) = self.layers.upgrade() {
            layers.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Ghost Tab Guard
// ═══════════════════════════════════════════════════════════════════════════════

/// Redirects opens aimed at the ghost tab into a new tab, so the pinned home
/// tab keeps showing home.
pub struct GhostTabGuard {
    reconciler: Rc<TabReconciler>,
    settings: Rc<RefCell<HomeSettings>>,
    form_factor: FormFactor,
}

impl GhostTabGuard {
    pub fn new(
        reconciler: Rc<TabReconciler>,
        settings: Rc<RefCell<HomeSettings>>,
        form_factor: FormFactor,
    ) -> Self {
        Self {
            reconciler,
            settings,
            form_factor,
        }
    }
}

impl OpenLayer for GhostTabGuard {
    fn name(&self) -> &str {
        "ghost-tab-guard"
    }

    fn intercept(&self, request: OpenRequest) -> OpenDecision {
        let Some(target) = request.target_tab else {
            return OpenDecision::Proceed(request);
        };
        let descriptor = {
            let settings = self.settings.borrow();
            let descriptor = settings.active_descriptor(self.form_factor);
            if !settings.ghost_tabs_enabled(descriptor) {
                return OpenDecision::Proceed(request);
            }
            descriptor.clone()
        };
        let Some(home) = self.reconciler.home_resource(&descriptor) else {
            return OpenDecision::Proceed(request);
        };

        let is_ghost = self
            .reconciler
            .workspace()
            .tab(target)
            .is_some_and(|tab| tab.pinned && tab.is_bound_to(&home));
        if !is_ghost || resources_match(&request.resource, &home) {
            return OpenDecision::Proceed(request);
        }

        debug!(resource = %request.resource, "Redirecting open away from ghost tab");
        OpenDecision::Proceed(OpenRequest {
            target_tab: None,
            ..request
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{MemoryTab, MemoryWorkspace, Workspace};
    use crate::resolver::{FixedClock, HomeTargetResolver, Providers};
    use crate::store::MemoryStore;
    use crate::types::HomeDescriptor;
    use crate::view::ViewConfigurer;
    use chrono::NaiveDate;

    struct Recording {
        seen: RefCell<Vec<String>>,
        claim: bool,
    }

    impl OpenLayer for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        fn intercept(&self, request: OpenRequest) -> OpenDecision {
            self.seen.borrow_mut().push(request.resource.clone());
            if self.claim {
                OpenDecision::Handled
            } else {
                OpenDecision::Proceed(request)
            }
        }
    }

    fn recording(claim: bool) -> Rc<Recording> {
        Rc::new(Recording {
            seen: RefCell::new(Vec::new()),
            claim,
        })
    }

    fn request(resource: &str, target_tab: Option<TabHandle>) -> OpenRequest {
        OpenRequest {
            resource: resource.to_string(),
            target_tab,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Interceptor
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_guard_drop_removes_layer() {
        let interceptor = OpenInterceptor::new();
        let guard = interceptor.install(recording(false));
        assert_eq!(interceptor.layer_count(), 1);
        drop(guard);
        assert_eq!(interceptor.layer_count(), 0);
    }

    #[test]
    fn test_restore_removes_only_its_layer() {
        let interceptor = OpenInterceptor::new();
        let first = interceptor.install(recording(false));
        let _second = interceptor.install(recording(false));
        first.restore();
        assert_eq!(interceptor.layer_count(), 1);
    }

    #[test]
    fn test_newest_layer_runs_first_and_can_claim() {
        let interceptor = OpenInterceptor::new();
        let older = recording(false);
        let newer = recording(true);
        let _a = interceptor.install(older.clone());
        let _b = interceptor.install(newer.clone());

        assert_eq!(interceptor.dispatch(request("a.md", None)), OpenDecision::Handled);
        assert_eq!(newer.seen.borrow().len(), 1);
        assert!(older.seen.borrow().is_empty());
    }

    #[test]
    fn test_guard_outliving_interceptor_is_harmless() {
        let interceptor = OpenInterceptor::new();
        let guard = interceptor.install(recording(false));
        drop(interceptor);
        drop(guard);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Ghost Tab Guard
    // ─────────────────────────────────────────────────────────────────────────────

    fn ghost_setup(sticky: bool) -> (Rc<MemoryWorkspace>, OpenInterceptor, InterceptGuard) {
        let ws = Rc::new(MemoryWorkspace::from_tabs(&[
            MemoryTab {
                resource: Some("notes/home.md".into()),
                pinned: true,
                ..Default::default()
            },
            MemoryTab {
                resource: Some("notes/other.md".into()),
                ..Default::default()
            },
        ]));
        let settings = Rc::new(RefCell::new(HomeSettings {
            primary: HomeDescriptor::ExplicitResource("notes/home.md".into()),
            ..Default::default()
        }));
        settings.borrow_mut().sticky.enabled = sticky;
        let resolver = Rc::new(HomeTargetResolver::new(
            Rc::new(MemoryStore::new(["notes/home.md", "notes/other.md"])),
            Providers::default(),
            Rc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 5, 16).unwrap())),
        ));
        let reconciler = Rc::new(TabReconciler::new(
            ws.clone(),
            resolver,
            settings.clone(),
            Rc::new(ViewConfigurer::new()),
        ));
        let interceptor = OpenInterceptor::new();
        let guard = interceptor.install(Rc::new(GhostTabGuard::new(
            reconciler,
            settings,
            FormFactor::Desktop,
        )));
        (ws, interceptor, guard)
    }

    #[test]
    fn test_open_into_ghost_is_redirected() {
        let (ws, interceptor, _guard) = ghost_setup(true);
        let ghost = ws.tabs()[0].handle;
        assert_eq!(
            interceptor.dispatch(request("notes/other.md", Some(ghost))),
            OpenDecision::Proceed(request("notes/other.md", None))
        );
    }

    #[test]
    fn test_reopening_home_in_ghost_passes() {
        let (ws, interceptor, _guard) = ghost_setup(true);
        let ghost = ws.tabs()[0].handle;
        assert_eq!(
            interceptor.dispatch(request("notes/home.md", Some(ghost))),
            OpenDecision::Proceed(request("notes/home.md", Some(ghost)))
        );
    }

    #[test]
    fn test_other_tabs_and_disabled_sticky_pass() {
        let (ws, interceptor, _guard) = ghost_setup(true);
        let other = ws.tabs()[1].handle;
        assert_eq!(
            interceptor.dispatch(request("x.md", Some(other))),
            OpenDecision::Proceed(request("x.md", Some(other)))
        );

        let (ws, interceptor, _guard) = ghost_setup(false);
        let ghost = ws.tabs()[0].handle;
        assert_eq!(
            interceptor.dispatch(request("x.md", Some(ghost))),
            OpenDecision::Proceed(request("x.md", Some(ghost)))
        );
    }
}
