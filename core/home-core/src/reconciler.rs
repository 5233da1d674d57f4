//! Tab reconciliation: make the layout show home under an opening mode.
//!
//! ## Attempt flow
//!
//! ```text
//! resolve (once) ──► NonResource ──► layout / graph / nothing
//!       │
//!       ▼
//! store lookup (+ default extension) ──► ResourceMissing
//!       │
//!       ▼
//! locate existing tab ──► focus (+ pin, dedupe) ──► AlreadyOpen
//!       │
//!       ▼
//! apply opening mode ──► settle ──► re-locate ──► place ──► configure view
//! ```
//!
//! ## Concurrency
//!
//! The layout is shared with the user and other extensions and nothing locks
//! it. Each step re-reads the tab it is about to touch, so an attempt that
//! was overtaken during `settle` finds its precondition gone and backs off.
//! Tabs opened speculatively are tracked by [`Attempt`] and detached again if
//! the attempt fails, without ever leaving the layout empty.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TabError;
use crate::layout::{ensure_floor, tabs_bound_to, ContentKind, TabHandle, TabSnapshot, Workspace};
use crate::resolver::HomeTargetResolver;
use crate::settings::HomeSettings;
use crate::store::lookup_with_fallback;
use crate::types::{HomeDescriptor, OpeningMode, Outcome, ResolvedTarget};
use crate::view::ViewConfigurer;

/// Delay before the post-open command, so the new view can finish mounting.
pub const COMMAND_DELAY: Duration = Duration::from_millis(350);

/// Delay after bulk layout changes before state is re-validated.
pub const LAYOUT_SETTLE: Duration = Duration::from_millis(100);

/// Which part of the layout an attempt may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileScope {
    /// The whole layout, according to the opening mode.
    Layout,
    /// Only this tab, and only while it is still empty.
    IntoTab(TabHandle),
}

#[derive(Debug, Clone)]
pub struct ReconcileRequest<'a> {
    pub descriptor: &'a HomeDescriptor,
    pub mode: OpeningMode,
    pub run_side_effect: bool,
    pub scope: ReconcileScope,
}

impl<'a> ReconcileRequest<'a> {
    pub fn new(descriptor: &'a HomeDescriptor, mode: OpeningMode) -> Self {
        Self {
            descriptor,
            mode,
            run_side_effect: false,
            scope: ReconcileScope::Layout,
        }
    }

    pub fn with_side_effect(mut self, run: bool) -> Self {
        self.run_side_effect = run;
        self
    }

    pub fn into_tab(mut self, tab: TabHandle) -> Self {
        self.scope = ReconcileScope::IntoTab(tab);
        self
    }
}

/// Speculative tabs opened by one attempt.
struct Attempt<'w> {
    workspace: &'w dyn Workspace,
    speculative: Vec<TabHandle>,
}

impl<'w> Attempt<'w> {
    fn new(workspace: &'w dyn Workspace) -> Self {
        Self {
            workspace,
            speculative: Vec::new(),
        }
    }

    fn open_tab(&mut self) -> Result<TabHandle, TabError> {
        let tab = self.workspace.open_tab()?;
        self.speculative.push(tab);
        Ok(tab)
    }

    fn replace_layout(&mut self, keep: Option<TabHandle>) -> Result<TabHandle, TabError> {
        let tab = self.workspace.replace_layout(keep)?;
        self.speculative.push(tab);
        Ok(tab)
    }

    /// Drops speculative tabs that are still empty, keeping one as the floor.
    fn discard_unused(&mut self) {
        for tab in self.speculative.drain(..) {
            let still_empty = self
                .workspace
                .tab(tab)
                .is_some_and(|snapshot| snapshot.is_genuinely_empty());
            if still_empty && self.workspace.tabs().len() > 1 {
                if let Err(err) = self.workspace.detach(tab) {
                    debug!(error = %err, "Failed to discard unused tab");
                }
            }
        }
    }

    fn fail(self, err: TabError) -> Outcome {
        self.roll_back(err, None)
    }

    /// Like [`Attempt::fail`], but also reclaims a speculative tab that got
    /// bound to `resource` before the failure.
    fn fail_placing(self, err: TabError, resource: &str) -> Outcome {
        self.roll_back(err, Some(resource))
    }

    /// Tabs the user took over while the attempt was suspended are left alone.
    fn roll_back(mut self, err: TabError, placed: Option<&str>) -> Outcome {
        warn!(error = %err, "Tab operation failed, rolling back attempt");
        for tab in self.speculative.drain(..) {
            let ours = self.workspace.tab(tab).is_some_and(|snapshot| {
                snapshot.is_genuinely_empty()
                    || placed.is_some_and(|resource| snapshot.is_bound_to(resource))
            });
            if ours && self.workspace.tabs().len() > 1 {
                if let Err(err) = self.workspace.detach(tab) {
                    debug!(error = %err, "Failed to detach speculative tab");
                }
            }
        }
        ensure_floor(self.workspace);
        Outcome::Failed(err)
    }

    fn commit(mut self) {
        self.speculative.clear();
    }
}

/// Tab prepared by the opening mode, plus the tab ReplaceLast closes once
/// home is in place.
struct Prepared {
    tab: TabHandle,
    close_after: Option<TabHandle>,
}

pub struct TabReconciler {
    workspace: Rc<dyn Workspace>,
    resolver: Rc<HomeTargetResolver>,
    settings: Rc<RefCell<HomeSettings>>,
    view: Rc<ViewConfigurer>,
    last_home_tab: Cell<Option<TabHandle>>,
}

impl TabReconciler {
    pub fn new(
        workspace: Rc<dyn Workspace>,
        resolver: Rc<HomeTargetResolver>,
        settings: Rc<RefCell<HomeSettings>>,
        view: Rc<ViewConfigurer>,
    ) -> Self {
        Self {
            workspace,
            resolver,
            settings,
            view,
            last_home_tab: Cell::new(None),
        }
    }

    pub fn workspace(&self) -> &dyn Workspace {
        self.workspace.as_ref()
    }

    pub fn resolver(&self) -> &HomeTargetResolver {
        &self.resolver
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Entry points
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn reconcile(&self, request: ReconcileRequest<'_>) -> Outcome {
        let settings = self.settings.borrow().clone();
        let target = self.resolver.resolve(request.descriptor);

        let outcome = match &target {
            ResolvedTarget::Unresolvable(reason) => Outcome::from(*reason),
            ResolvedTarget::NonResource => self.reconcile_non_resource(&request, &settings),
            ResolvedTarget::Resource(path) => self.reconcile_resource(&request, &settings, path),
        };

        debug!(
            descriptor = %request.descriptor.label(),
            mode = ?request.mode,
            scope = ?request.scope,
            outcome = ?outcome,
            "Reconciliation finished"
        );

        if request.run_side_effect && placed_something(request.descriptor, &outcome) {
            self.run_post_open_command(&settings);
        }
        outcome
    }

    /// Reuses an existing ghost tab when there is one; otherwise behaves like
    /// [`TabReconciler::reconcile`].
    pub fn reconcile_ghost(
        &self,
        descriptor: &HomeDescriptor,
        mode: OpeningMode,
        run_side_effect: bool,
    ) -> Outcome {
        let plain = ReconcileRequest::new(descriptor, mode).with_side_effect(run_side_effect);
        let settings = self.settings.borrow().clone();
        if !settings.ghost_tabs_enabled(descriptor) {
            return self.reconcile(plain);
        }

        // Pin-eligible kinds are deterministic, so resolving here and again in
        // a fallback reconcile yields the same target.
        let ResolvedTarget::Resource(path) = self.resolver.resolve(descriptor) else {
            return self.reconcile(plain);
        };
        let Some(resource) = lookup_with_fallback(self.resolver.store(), &path) else {
            return self.reconcile(plain);
        };
        let Some(ghost) = self.find_ghost(&resource) else {
            debug!(resource = %resource, "No ghost tab to reuse");
            return self.reconcile(plain);
        };

        let ws = self.workspace();
        self.dedupe(ghost.handle, &resource);
        if mode == OpeningMode::ReplaceAll {
            self.close_all_except(ghost.handle, &settings);
        }
        let result = ws
            .focus(ghost.handle)
            .and_then(|_| self.configure_view(ghost.handle, &resource, &settings));
        let outcome = match result {
            Ok(()) => {
                self.last_home_tab.set(Some(ghost.handle));
                Outcome::AlreadyOpen
            }
            Err(err) => {
                ensure_floor(ws);
                Outcome::Failed(err)
            }
        };

        if run_side_effect && outcome.is_success() {
            self.run_post_open_command(&settings);
        }
        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// The tab currently showing home, if any.
    ///
    /// Deterministic kinds are located by binding; random and recurring kinds
    /// use the tab the last attempt placed, provided it was not recycled since.
    pub fn find_home_tab(&self, descriptor: &HomeDescriptor) -> Option<TabSnapshot> {
        if descriptor.is_pin_eligible() {
            return self.locate_existing(&self.home_resource(descriptor)?);
        }
        self.last_home_tab()
    }

    /// Resource a deterministic resource descriptor points to, in the store's
    /// spelling when it exists.
    pub fn home_resource(&self, descriptor: &HomeDescriptor) -> Option<String> {
        if !descriptor.is_pin_eligible() {
            return None;
        }
        let path = self.resolver.resolve(descriptor).resource()?.to_string();
        Some(lookup_with_fallback(self.resolver.store(), &path).unwrap_or(path))
    }

    /// Whether `tab` shows home. Non-deterministic kinds only recognise the
    /// tab the last attempt placed, so checking never re-resolves them.
    pub fn is_home_tab(&self, descriptor: &HomeDescriptor, tab: &TabSnapshot) -> bool {
        match descriptor {
            HomeDescriptor::GraphView => tab.content_kind == ContentKind::Graph,
            d if d.is_pin_eligible() => self
                .home_resource(d)
                .is_some_and(|resource| tab.is_bound_to(&resource)),
            _ => self.last_home_tab.get() == Some(tab.handle),
        }
    }

    /// Last tab an attempt placed home into, validated against its generation.
    pub fn last_home_tab(&self) -> Option<TabSnapshot> {
        let handle = self.last_home_tab.get()?;
        let snapshot = self.workspace.tab(handle);
        if snapshot.is_none() {
            self.last_home_tab.set(None);
        }
        snapshot
    }

    /// The pinned tab bound to `resource`, preferring the active one.
    pub fn find_ghost(&self, resource: &str) -> Option<TabSnapshot> {
        let pinned: Vec<TabSnapshot> = tabs_bound_to(self.workspace(), resource)
            .into_iter()
            .filter(|t| t.pinned)
            .collect();
        pinned
            .iter()
            .find(|t| t.is_active)
            .or_else(|| pinned.first())
            .cloned()
    }

    fn locate_existing(&self, resource: &str) -> Option<TabSnapshot> {
        let bound = tabs_bound_to(self.workspace(), resource);
        bound
            .iter()
            .find(|t| t.pinned)
            .or_else(|| bound.iter().find(|t| t.is_active))
            .or_else(|| bound.first())
            .cloned()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Resource targets
    // ─────────────────────────────────────────────────────────────────────────────

    fn reconcile_resource(
        &self,
        request: &ReconcileRequest<'_>,
        settings: &HomeSettings,
        path: &str,
    ) -> Outcome {
        let Some(resource) = lookup_with_fallback(self.resolver.store(), path) else {
            debug!(path = %path, "Home resource not found in store");
            return Outcome::ResourceMissing;
        };

        if let ReconcileScope::IntoTab(tab) = request.scope {
            return self.place_into_empty_tab(tab, &resource, settings);
        }

        let ghost = settings.ghost_tabs_enabled(request.descriptor);
        if let Some(existing) = self.locate_existing(&resource) {
            let keep_existing = request.mode != OpeningMode::ReplaceAll || (ghost && existing.pinned);
            if keep_existing {
                return self.focus_existing(&existing, &resource, request.mode, ghost, settings);
            }
        }

        let ws = self.workspace();
        let mut attempt = Attempt::new(ws);
        let prepared = match self.prepare_tab(&mut attempt, request.mode, settings) {
            Ok(prepared) => prepared,
            Err(err) => return attempt.fail(err),
        };

        ws.settle(LAYOUT_SETTLE);

        // Another trigger may have placed home while this attempt was suspended.
        if let Some(existing) = self.locate_existing(&resource) {
            debug!(tab = %existing.handle.id, "Home placed concurrently, backing off");
            attempt.discard_unused();
            return self.focus_existing(&existing, &resource, OpeningMode::Retain, ghost, settings);
        }

        let tab = match ws.tab(prepared.tab) {
            Some(snapshot) if snapshot.is_genuinely_empty() => prepared.tab,
            _ => match attempt.open_tab() {
                Ok(tab) => tab,
                Err(err) => return attempt.fail(err),
            },
        };

        if let Err(err) = self.place(tab, &resource, ghost, settings) {
            return attempt.fail_placing(err, &resource);
        }
        attempt.commit();

        if let Some(previous) = prepared.close_after {
            self.close_replaced(previous, tab);
        }
        self.last_home_tab.set(Some(tab));
        Outcome::Opened
    }

    fn focus_existing(
        &self,
        existing: &TabSnapshot,
        resource: &str,
        mode: OpeningMode,
        ghost: bool,
        settings: &HomeSettings,
    ) -> Outcome {
        let ws = self.workspace();
        let result = (|| {
            if ghost {
                if !existing.pinned {
                    ws.set_pinned(existing.handle, true)?;
                }
                self.dedupe(existing.handle, resource);
            }
            if mode == OpeningMode::ReplaceAll {
                self.close_all_except(existing.handle, settings);
            }
            ws.focus(existing.handle)?;
            self.configure_view(existing.handle, resource, settings)
        })();

        match result {
            Ok(()) => {
                self.last_home_tab.set(Some(existing.handle));
                Outcome::AlreadyOpen
            }
            Err(err) => {
                warn!(error = %err, "Failed to focus existing home tab");
                ensure_floor(ws);
                Outcome::Failed(err)
            }
        }
    }

    fn place(
        &self,
        tab: TabHandle,
        resource: &str,
        ghost: bool,
        settings: &HomeSettings,
    ) -> Result<(), TabError> {
        let ws = self.workspace();
        ws.open_resource(tab, resource)?;
        ws.focus(tab)?;
        if ghost {
            ws.set_pinned(tab, true)?;
            self.dedupe(tab, resource);
        }
        self.configure_view(tab, resource, settings)
    }

    fn place_into_empty_tab(&self, tab: TabHandle, resource: &str, settings: &HomeSettings) -> Outcome {
        let ws = self.workspace();
        match ws.tab(tab) {
            Some(snapshot) if snapshot.is_genuinely_empty() => {}
            _ => {
                debug!(tab = %tab.id, "Tab no longer empty, leaving it alone");
                return Outcome::NoOp;
            }
        }

        let result = ws
            .open_resource(tab, resource)
            .and_then(|_| self.configure_view(tab, resource, settings));
        match result {
            Ok(()) => {
                self.last_home_tab.set(Some(tab));
                Outcome::Opened
            }
            Err(err) => Outcome::Failed(err),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Non-resource targets
    // ─────────────────────────────────────────────────────────────────────────────

    fn reconcile_non_resource(&self, request: &ReconcileRequest<'_>, settings: &HomeSettings) -> Outcome {
        if let ReconcileScope::IntoTab(tab) = request.scope {
            let still_empty = self
                .workspace
                .tab(tab)
                .is_some_and(|t| t.is_genuinely_empty());
            if !still_empty {
                return Outcome::NoOp;
            }
        }

        match request.descriptor {
            HomeDescriptor::NamedLayout(name) => self.load_named_layout(name),
            HomeDescriptor::GraphView => self.open_graph_view(request, settings),
            _ => Outcome::NoOp,
        }
    }

    fn load_named_layout(&self, name: &str) -> Outcome {
        if name.trim().is_empty() {
            return Outcome::NotConfigured;
        }
        let Some(layouts) = self.resolver.layouts() else {
            return Outcome::ProviderUnavailable;
        };
        if !layouts.has_layout(name) {
            debug!(layout = %name, "Named layout not found");
            return Outcome::ProviderUnavailable;
        }
        match layouts.load_layout(name) {
            Ok(()) => Outcome::Opened,
            Err(err) => {
                warn!(layout = %name, error = %err, "Failed to load named layout");
                Outcome::ProviderUnavailable
            }
        }
    }

    fn open_graph_view(&self, request: &ReconcileRequest<'_>, settings: &HomeSettings) -> Outcome {
        let ws = self.workspace();

        if let ReconcileScope::IntoTab(tab) = request.scope {
            return match ws.open_graph(tab) {
                Ok(()) => Outcome::Opened,
                Err(err) => Outcome::Failed(err),
            };
        }

        if request.mode != OpeningMode::ReplaceAll {
            let graph = ws
                .tabs()
                .into_iter()
                .find(|t| t.content_kind == ContentKind::Graph);
            if let Some(graph) = graph {
                return match ws.focus(graph.handle) {
                    Ok(()) => Outcome::AlreadyOpen,
                    Err(err) => Outcome::Failed(err),
                };
            }
        }

        let mut attempt = Attempt::new(ws);
        let prepared = match self.prepare_tab(&mut attempt, request.mode, settings) {
            Ok(prepared) => prepared,
            Err(err) => return attempt.fail(err),
        };
        if let Err(err) = ws.open_graph(prepared.tab).and_then(|_| ws.focus(prepared.tab)) {
            return attempt.fail(err);
        }
        attempt.commit();
        if let Some(previous) = prepared.close_after {
            self.close_replaced(previous, prepared.tab);
        }
        Outcome::Opened
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Opening modes
    // ─────────────────────────────────────────────────────────────────────────────

    fn prepare_tab(
        &self,
        attempt: &mut Attempt<'_>,
        mode: OpeningMode,
        settings: &HomeSettings,
    ) -> Result<Prepared, TabError> {
        let ws = self.workspace();
        match mode {
            OpeningMode::ReplaceAll => {
                let keep = self.release_notes_to_keep(settings);
                let tab = attempt.replace_layout(keep)?;
                Ok(Prepared {
                    tab,
                    close_after: None,
                })
            }
            OpeningMode::ReplaceLast => match ws.active_tab() {
                Some(active) if active.is_genuinely_empty() => Ok(Prepared {
                    tab: active.handle,
                    close_after: None,
                }),
                Some(active) => {
                    let tab = attempt.open_tab()?;
                    Ok(Prepared {
                        tab,
                        close_after: (!active.pinned).then_some(active.handle),
                    })
                }
                None => Ok(Prepared {
                    tab: attempt.open_tab()?,
                    close_after: None,
                }),
            },
            OpeningMode::Retain => {
                let tabs = ws.tabs();
                let empty = tabs
                    .iter()
                    .filter(|t| t.is_genuinely_empty())
                    .min_by_key(|t| !t.is_active)
                    .map(|t| t.handle);
                let tab = match empty {
                    Some(tab) => tab,
                    None => attempt.open_tab()?,
                };
                Ok(Prepared {
                    tab,
                    close_after: None,
                })
            }
        }
    }

    /// Release-notes detection is best-effort: it relies on the content kind
    /// the host reports.
    fn release_notes_to_keep(&self, settings: &HomeSettings) -> Option<TabHandle> {
        if settings.always_hide_release_notes {
            return None;
        }
        self.workspace
            .tabs()
            .into_iter()
            .find(|t| t.content_kind == ContentKind::ReleaseNotes)
            .map(|t| t.handle)
    }

    fn close_all_except(&self, keep: TabHandle, settings: &HomeSettings) {
        let release_notes = self.release_notes_to_keep(settings);
        for tab in self.workspace.tabs() {
            if tab.handle == keep || Some(tab.handle) == release_notes {
                continue;
            }
            if let Err(err) = self.workspace.detach(tab.handle) {
                debug!(error = %err, "Tab vanished while clearing layout");
            }
        }
    }

    /// ReplaceLast: closes the previously active tab once home is placed,
    /// provided it is still there, still unpinned and not home itself.
    fn close_replaced(&self, previous: TabHandle, placed: TabHandle) {
        if previous == placed {
            return;
        }
        let Some(snapshot) = self.workspace.tab(previous) else {
            return;
        };
        if snapshot.pinned {
            return;
        }
        if let Err(err) = self.workspace.detach(previous) {
            debug!(error = %err, "Failed to close replaced tab");
        }
    }

    /// Detaches every tab other than `keep` that is bound to `resource`.
    fn dedupe(&self, keep: TabHandle, resource: &str) {
        for tab in tabs_bound_to(self.workspace(), resource) {
            if tab.handle == keep {
                continue;
            }
            debug!(tab = %tab.handle.id, "Closing duplicate home tab");
            if let Err(err) = self.workspace.detach(tab.handle) {
                debug!(error = %err, "Duplicate tab vanished before detach");
            }
        }
    }

    fn configure_view(&self, tab: TabHandle, resource: &str, settings: &HomeSettings) -> Result<(), TabError> {
        self.view
            .configure(self.workspace(), tab, resource, &settings.view)
    }

    fn run_post_open_command(&self, settings: &HomeSettings) {
        let Some(command) = settings.post_open_command() else {
            return;
        };
        self.workspace.settle(COMMAND_DELAY);
        if let Err(err) = self.workspace.execute_command(command) {
            warn!(command = %command, error = %err, "Post-open command failed");
        }
    }
}

fn placed_something(descriptor: &HomeDescriptor, outcome: &Outcome) -> bool {
    match outcome {
        Outcome::Opened | Outcome::AlreadyOpen => true,
        Outcome::NoOp => *descriptor == HomeDescriptor::Nothing,
        _ => false,
    }
}
