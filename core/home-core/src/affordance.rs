//! Sticky home affordance: a persistent tab-bar button bound to home.
//!
//! The host's chrome rebuilds itself at will (layout changes, window
//! resizes, theme reloads) and can drop the affordance at any moment. One
//! recurring ensure task re-asserts it; structural-change notifications only
//! pull that task forward. Ensuring is idempotent: an affordance that is
//! already present is never re-created.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::TabError;
use crate::layout::{ensure_floor, TabHandle, Workspace};
use crate::reconciler::{ReconcileRequest, TabReconciler};
use crate::settings::HomeSettings;
use crate::types::{FormFactor, HomeDescriptor, OpeningMode, Outcome};

/// Debounce for recomputing the active flag during focus bursts.
pub const ACTIVE_STATE_DEBOUNCE: Duration = Duration::from_millis(100);

/// Period of the recurring ensure-present task.
pub const ENSURE_POLL: Duration = Duration::from_secs(2);

/// The host's window chrome, as far as the affordance is concerned.
pub trait ChromeSurface {
    /// Whether this form factor has somewhere to put the affordance.
    fn supports_affordance(&self) -> bool;

    fn affordance_present(&self) -> bool;

    fn mount_affordance(&self);

    fn unmount_affordance(&self);

    fn set_affordance_active(&self, active: bool);

    /// Marks a tab header so the host can hide it.
    fn set_header_tagged(&self, tab: TabHandle, tagged: bool);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Headless Chrome
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct ChromeState {
    present: bool,
    mounts: usize,
    active: bool,
    tagged: HashSet<TabHandle>,
}

/// Chrome without a UI. Used by the CLI simulator and tests; records what
/// the controller asked for.
#[derive(Debug)]
pub struct HeadlessChrome {
    supported: bool,
    state: RefCell<ChromeState>,
}

impl HeadlessChrome {
    pub fn new(supported: bool) -> Self {
        Self {
            supported,
            state: RefCell::new(ChromeState::default()),
        }
    }

    /// Drops the affordance the way a host UI rebuild would.
    pub fn simulate_host_rebuild(&self) {
        self.state.borrow_mut().present = false;
    }

    pub fn mount_count(&self) -> usize {
        self.state.borrow().mounts
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().active
    }

    pub fn tagged_headers(&self) -> Vec<TabHandle> {
        let mut tagged: Vec<TabHandle> = self.state.borrow().tagged.iter().copied().collect();
        tagged.sort();
        tagged
    }
}

impl ChromeSurface for HeadlessChrome {
    fn supports_affordance(&self) -> bool {
        self.supported
    }

    fn affordance_present(&self) -> bool {
        self.state.borrow().present
    }

    fn mount_affordance(&self) {
        let mut state = self.state.borrow_mut();
        state.present = true;
        state.mounts += 1;
    }

    fn unmount_affordance(&self) {
        let mut state = self.state.borrow_mut();
        state.present = false;
        state.active = false;
    }

    fn set_affordance_active(&self, active: bool) {
        self.state.borrow_mut().active = active;
    }

    fn set_header_tagged(&self, tab: TabHandle, tagged: bool) {
        let mut state = self.state.borrow_mut();
        if tagged {
            state.tagged.insert(tab);
        } else {
            state.tagged.remove(&tab);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Controller
// ═══════════════════════════════════════════════════════════════════════════════

pub struct StickyAffordanceController {
    reconciler: Rc<TabReconciler>,
    chrome: Rc<dyn ChromeSurface>,
    settings: Rc<RefCell<HomeSettings>>,
    form_factor: FormFactor,
    next_ensure: Cell<Option<Instant>>,
    active_due: Cell<Option<Instant>>,
    disposed: Cell<bool>,
}

impl StickyAffordanceController {
    pub fn new(
        reconciler: Rc<TabReconciler>,
        chrome: Rc<dyn ChromeSurface>,
        settings: Rc<RefCell<HomeSettings>>,
        form_factor: FormFactor,
    ) -> Self {
        Self {
            reconciler,
            chrome,
            settings,
            form_factor,
            next_ensure: Cell::new(None),
            active_due: Cell::new(None),
            disposed: Cell::new(false),
        }
    }

    fn workspace(&self) -> &dyn Workspace {
        self.reconciler.workspace()
    }

    fn descriptor(&self) -> HomeDescriptor {
        self.settings
            .borrow()
            .active_descriptor(self.form_factor)
            .clone()
    }

    /// Whether the affordance should be on screen right now.
    pub fn is_shown(&self) -> bool {
        !self.disposed.get() && self.settings.borrow().sticky.enabled && self.chrome.supports_affordance()
    }

    /// Mounts the affordance if it should be shown and is missing; unmounts
    /// it otherwise.
    pub fn sync_visibility(&self) {
        let present = self.chrome.affordance_present();
        if self.is_shown() {
            if !present {
                debug!("Mounting home affordance");
                self.chrome.mount_affordance();
                self.update_active_state();
            }
        } else if present {
            debug!("Unmounting home affordance");
            self.chrome.unmount_affordance();
        }
    }

    /// Recomputes whether the focused tab is home. Returns the new flag.
    pub fn update_active_state(&self) -> bool {
        self.active_due.set(None);
        if !self.is_shown() {
            return false;
        }
        let descriptor = self.descriptor();
        let active = self
            .workspace()
            .active_tab()
            .is_some_and(|tab| self.reconciler.is_home_tab(&descriptor, &tab));
        self.chrome.set_affordance_active(active);
        active
    }

    /// Tags the ghost tab's header when headers are hidden, untags every
    /// other tab. An unpinned home tab keeps its header.
    pub fn update_tab_header_tagging(&self) {
        let descriptor = self.descriptor();
        let hide = {
            let settings = self.settings.borrow();
            settings.sticky.hide_header && settings.ghost_tabs_enabled(&descriptor)
        };
        let home = if hide && self.is_shown() {
            self.reconciler
                .find_home_tab(&descriptor)
                .filter(|tab| tab.pinned)
                .map(|tab| tab.handle)
        } else {
            None
        };
        for tab in self.workspace().tabs() {
            self.chrome
                .set_header_tagged(tab.handle, Some(tab.handle) == home);
        }
    }

    /// Closes the tab showing home, unpinning it first. Returns whether a tab
    /// was closed.
    pub fn close_home_tab(&self) -> Result<bool, TabError> {
        let Some(tab) = self.reconciler.find_home_tab(&self.descriptor()) else {
            return Ok(false);
        };
        let ws = self.workspace();
        if tab.pinned {
            ws.set_pinned(tab.handle, false)?;
        }
        ws.detach(tab.handle)?;
        ensure_floor(ws);
        self.update_tab_header_tagging();
        self.update_active_state();
        Ok(true)
    }

    /// Opens home from the affordance.
    pub fn click(&self) -> Outcome {
        let settings = self.settings.borrow().clone();
        let descriptor = settings.active_descriptor(self.form_factor);
        let mode = if settings.sticky.replace_active_on_click {
            OpeningMode::ReplaceLast
        } else {
            OpeningMode::Retain
        };

        let outcome = if settings.ghost_tabs_enabled(descriptor) {
            self.reconciler.reconcile_ghost(descriptor, mode, true)
        } else {
            self.reconciler
                .reconcile(ReconcileRequest::new(descriptor, mode).with_side_effect(true))
        };
        self.update_tab_header_tagging();
        self.update_active_state();
        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Scheduling
    // ─────────────────────────────────────────────────────────────────────────────

    /// Pulls the ensure task forward to `now`. Never pushes it back.
    pub fn request_ensure(&self, now: Instant) {
        if self.disposed.get() {
            return;
        }
        let next = match self.next_ensure.get() {
            Some(scheduled) if scheduled <= now => scheduled,
            _ => now,
        };
        self.next_ensure.set(Some(next));
    }

    /// Debounces the active-state recomputation after a focus change.
    pub fn note_focus_change(&self, now: Instant) {
        if self.disposed.get() {
            return;
        }
        self.active_due.set(Some(now + ACTIVE_STATE_DEBOUNCE));
    }

    /// Runs whatever is due.
    pub fn tick(&self, now: Instant) {
        if self.disposed.get() {
            return;
        }
        if self.next_ensure.get().is_some_and(|due| due <= now) {
            self.sync_visibility();
            self.next_ensure.set(Some(now + ENSURE_POLL));
        }
        if self.active_due.get().is_some_and(|due| due <= now) {
            self.update_active_state();
        }
    }

    pub fn next_ensure(&self) -> Option<Instant> {
        self.next_ensure.get()
    }

    /// Removes everything the controller put on screen and stops scheduling.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.next_ensure.set(None);
        self.active_due.set(None);
        if self.chrome.affordance_present() {
            self.chrome.unmount_affordance();
        }
        for tab in self.workspace().tabs() {
            self.chrome.set_header_tagged(tab.handle, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{MemoryTab, MemoryWorkspace, SplitId};
    use crate::resolver::{FixedClock, HomeTargetResolver, Providers};
    use crate::store::MemoryStore;
    use crate::view::ViewConfigurer;
    use chrono::NaiveDate;

    struct Fixture {
        ws: Rc<MemoryWorkspace>,
        chrome: Rc<HeadlessChrome>,
        settings: Rc<RefCell<HomeSettings>>,
        controller: StickyAffordanceController,
    }

    fn fixture(tabs: &[MemoryTab]) -> Fixture {
        let ws = Rc::new(MemoryWorkspace::from_tabs(tabs));
        let clock = Rc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 5, 16).unwrap()));
        let resolver = Rc::new(HomeTargetResolver::new(
            Rc::new(MemoryStore::new(["notes/home.md", "notes/other.md"])),
            Providers::default(),
            clock,
        ));
        let settings = Rc::new(RefCell::new(HomeSettings {
            primary: HomeDescriptor::ExplicitResource("notes/home.md".into()),
            ..Default::default()
        }));
        settings.borrow_mut().sticky.enabled = true;
        let reconciler = Rc::new(TabReconciler::new(
            ws.clone(),
            resolver,
            settings.clone(),
            Rc::new(ViewConfigurer::new()),
        ));
        let chrome = Rc::new(HeadlessChrome::new(true));
        let controller =
            StickyAffordanceController::new(reconciler, chrome.clone(), settings.clone(), FormFactor::Desktop);
        Fixture {
            ws,
            chrome,
            settings,
            controller,
        }
    }

    fn doc(resource: &str) -> MemoryTab {
        MemoryTab {
            resource: Some(resource.to_string()),
            ..Default::default()
        }
    }

    fn ghost(resource: &str) -> MemoryTab {
        MemoryTab {
            pinned: true,
            ..doc(resource)
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Visibility
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_sync_mounts_once() {
        let f = fixture(&[]);
        f.controller.sync_visibility();
        f.controller.sync_visibility();
        assert!(f.chrome.affordance_present());
        assert_eq!(f.chrome.mount_count(), 1);
    }

    #[test]
    fn test_sync_unmounts_when_disabled() {
        let f = fixture(&[]);
        f.controller.sync_visibility();
        f.settings.borrow_mut().sticky.enabled = false;
        f.controller.sync_visibility();
        assert!(!f.chrome.affordance_present());
    }

    #[test]
    fn test_unsupported_form_factor_never_mounts() {
        let f = fixture(&[]);
        let chrome = Rc::new(HeadlessChrome::new(false));
        let controller = StickyAffordanceController::new(
            f.controller.reconciler.clone(),
            chrome.clone(),
            f.settings.clone(),
            FormFactor::Mobile,
        );
        controller.sync_visibility();
        assert_eq!(chrome.mount_count(), 0);
    }

    #[test]
    fn test_ensure_task_remounts_after_host_rebuild() {
        let f = fixture(&[]);
        let start = Instant::now();
        f.controller.request_ensure(start);
        f.controller.tick(start);
        assert_eq!(f.chrome.mount_count(), 1);

        f.chrome.simulate_host_rebuild();
        f.controller.tick(start + Duration::from_millis(500));
        assert!(!f.chrome.affordance_present());

        f.controller.tick(start + ENSURE_POLL);
        assert!(f.chrome.affordance_present());
        assert_eq!(f.chrome.mount_count(), 2);
    }

    #[test]
    fn test_request_ensure_only_pulls_forward() {
        let f = fixture(&[]);
        let start = Instant::now();
        f.controller.request_ensure(start);
        f.controller.request_ensure(start + Duration::from_secs(5));
        assert_eq!(f.controller.next_ensure(), Some(start));
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Active State & Header Tagging
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_active_state_follows_focus_after_debounce() {
        let f = fixture(&[doc("notes/other.md"), doc("notes/home.md")]);
        f.controller.sync_visibility();
        assert!(f.chrome.is_active());

        let other = f.ws.tabs()[0].handle;
        f.ws.focus(other).unwrap();
        let now = Instant::now();
        f.controller.note_focus_change(now);
        f.controller.tick(now);
        assert!(f.chrome.is_active());

        f.controller.tick(now + ACTIVE_STATE_DEBOUNCE);
        assert!(!f.chrome.is_active());
    }

    #[test]
    fn test_header_tagging_marks_only_home() {
        let f = fixture(&[ghost("notes/home.md"), doc("notes/other.md")]);
        f.settings.borrow_mut().sticky.hide_header = true;
        let home = f.ws.tabs()[0].handle;

        f.controller.update_tab_header_tagging();
        assert_eq!(f.chrome.tagged_headers(), vec![home]);

        f.settings.borrow_mut().sticky.hide_header = false;
        f.controller.update_tab_header_tagging();
        assert!(f.chrome.tagged_headers().is_empty());
    }

    #[test]
    fn test_header_tagging_skips_unpinned_home() {
        let f = fixture(&[doc("notes/home.md"), doc("notes/other.md")]);
        f.settings.borrow_mut().sticky.hide_header = true;

        f.controller.update_tab_header_tagging();
        assert!(f.chrome.tagged_headers().is_empty());
    }

    #[test]
    fn test_header_tagging_off_without_pinning() {
        let f = fixture(&[ghost("notes/home.md")]);
        {
            let mut settings = f.settings.borrow_mut();
            settings.sticky.hide_header = true;
            settings.sticky.pin = false;
        }

        f.controller.update_tab_header_tagging();
        assert!(f.chrome.tagged_headers().is_empty());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_click_opens_pinned_ghost() {
        let f = fixture(&[doc("notes/other.md")]);
        assert_eq!(f.controller.click(), Outcome::Opened);
        let ghost = f.ws.active_tab().unwrap();
        assert!(ghost.pinned);
        assert_eq!(f.ws.tabs().len(), 2);

        assert_eq!(f.controller.click(), Outcome::AlreadyOpen);
        assert_eq!(f.ws.tabs().len(), 2);
    }

    #[test]
    fn test_click_replaces_active_when_configured() {
        let f = fixture(&[doc("notes/other.md")]);
        f.settings.borrow_mut().sticky.replace_active_on_click = true;
        f.controller.click();
        assert_eq!(f.ws.bindings(), vec![Some("notes/home.md".to_string())]);
    }

    #[test]
    fn test_close_home_tab_closes_pinned_ghost() {
        let f = fixture(&[
            doc("notes/other.md"),
            MemoryTab {
                resource: Some("notes/home.md".into()),
                pinned: true,
                ..Default::default()
            },
        ]);
        assert!(f.controller.close_home_tab().unwrap());
        assert_eq!(f.ws.bindings(), vec![Some("notes/other.md".to_string())]);
        assert!(!f.controller.close_home_tab().unwrap());
    }

    #[test]
    fn test_close_last_tab_keeps_floor() {
        let f = fixture(&[doc("notes/home.md")]);
        f.controller.close_home_tab().unwrap();
        assert_eq!(f.ws.tabs().len(), 1);
        assert!(f.ws.tabs()[0].is_genuinely_empty());
    }

    #[test]
    fn test_dispose_cleans_up_and_stops() {
        let f = fixture(&[ghost("notes/home.md")]);
        f.settings.borrow_mut().sticky.hide_header = true;
        f.controller.sync_visibility();
        f.controller.update_tab_header_tagging();

        f.controller.dispose();
        assert!(!f.chrome.affordance_present());
        assert!(f.chrome.tagged_headers().is_empty());

        let now = Instant::now();
        f.controller.request_ensure(now);
        f.controller.tick(now);
        assert!(!f.chrome.affordance_present());

        f.ws.user_opens_tab(SplitId(0), None);
        f.controller.sync_visibility();
        assert_eq!(f.chrome.mount_count(), 1);
    }
}
