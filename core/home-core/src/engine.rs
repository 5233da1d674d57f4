//! HomeEngine - the entry point hosts integrate with.
//!
//! The engine owns every component and routes host events to them. It is:
//! - **Synchronous**: no async runtime; timed work runs from [`HomeEngine::tick`]
//! - **Single-threaded**: shared state lives in `Rc`/`RefCell`/`Cell`
//! - **Host-agnostic**: the host plugs in through [`EngineHost`]
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use home_core::{EngineHost, HomeEngine, LaunchContext, MemoryStore, MemoryWorkspace};
//!
//! let workspace = Rc::new(MemoryWorkspace::new());
//! let host = EngineHost::new(workspace.clone(), Rc::new(MemoryStore::new(["Home.md"])));
//! let engine = HomeEngine::new(host, HomeSettings::default(), LaunchContext::default());
//! engine.on_layout_ready(Instant::now());
//! ```

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::affordance::{ChromeSurface, HeadlessChrome, StickyAffordanceController};
use crate::commands::{current_as_home, HomeCommand, LogNotifier, Notifier};
use crate::error::Result;
use crate::intercept::{GhostTabGuard, InterceptGuard, OpenDecision, OpenInterceptor, OpenRequest};
use crate::layout::{TabHandle, Workspace};
use crate::reconciler::{ReconcileRequest, TabReconciler};
use crate::resolver::{Clock, HomeTargetResolver, Providers, SystemClock};
use crate::settings::{load_settings, save_settings, HomeSettings};
use crate::startup::{LaunchContext, StartupCoordinator, StartupReport};
use crate::store::ResourceStore;
use crate::types::{FormFactor, HomeDescriptor, Outcome};
use crate::view::ViewConfigurer;

/// Everything the host provides.
pub struct EngineHost {
    pub workspace: Rc<dyn Workspace>,
    pub store: Rc<dyn ResourceStore>,
    pub providers: Providers,
    pub clock: Rc<dyn Clock>,
    pub chrome: Rc<dyn ChromeSurface>,
    pub notifier: Rc<dyn Notifier>,
    pub form_factor: FormFactor,
    /// Fixed seed for random picks; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl EngineHost {
    /// A desktop host with no providers, no affordance surface and log notices.
    pub fn new(workspace: Rc<dyn Workspace>, store: Rc<dyn ResourceStore>) -> Self {
        Self {
            workspace,
            store,
            providers: Providers::default(),
            clock: Rc::new(SystemClock),
            chrome: Rc::new(HeadlessChrome::new(false)),
            notifier: Rc::new(LogNotifier),
            form_factor: FormFactor::Desktop,
            seed: None,
        }
    }
}

/// What a command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Opened(Outcome),
    HomeSet(HomeDescriptor),
    StickyToggled(bool),
    Closed(bool),
    /// The command could not run; the user was shown why.
    Rejected(String),
}

pub struct HomeEngine {
    workspace: Rc<dyn Workspace>,
    settings: Rc<RefCell<HomeSettings>>,
    settings_file: Option<PathBuf>,
    form_factor: FormFactor,
    notifier: Rc<dyn Notifier>,
    view: Rc<ViewConfigurer>,
    reconciler: Rc<TabReconciler>,
    startup: StartupCoordinator,
    affordance: StickyAffordanceController,
    interceptor: OpenInterceptor,
    ghost_guard: RefCell<Option<InterceptGuard>>,
    disposed: Cell<bool>,
}

impl HomeEngine {
    pub fn new(host: EngineHost, settings: HomeSettings, launch: LaunchContext) -> Self {
        let settings = Rc::new(RefCell::new(settings));
        let mut resolver = HomeTargetResolver::new(host.store, host.providers, host.clock);
        if let Some(seed) = host.seed {
            resolver = resolver.with_seed(seed);
        }
        let view = Rc::new(ViewConfigurer::new());
        let reconciler = Rc::new(TabReconciler::new(
            host.workspace.clone(),
            Rc::new(resolver),
            settings.clone(),
            view.clone(),
        ));
        let startup = StartupCoordinator::new(
            reconciler.clone(),
            settings.clone(),
            host.form_factor,
            launch,
        );
        let affordance = StickyAffordanceController::new(
            reconciler.clone(),
            host.chrome,
            settings.clone(),
            host.form_factor,
        );

        Self {
            workspace: host.workspace,
            settings,
            settings_file: None,
            form_factor: host.form_factor,
            notifier: host.notifier,
            view,
            reconciler,
            startup,
            affordance,
            interceptor: OpenInterceptor::new(),
            ghost_guard: RefCell::new(None),
            disposed: Cell::new(false),
        }
    }

    /// Loads settings from `path` and writes changes made by commands back
    /// to it.
    pub fn with_settings_file(host: EngineHost, path: PathBuf, launch: LaunchContext) -> Result<Self> {
        let settings = load_settings(&path)?;
        let mut engine = Self::new(host, settings, launch);
        engine.settings_file = Some(path);
        Ok(engine)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn settings(&self) -> HomeSettings {
        self.settings.borrow().clone()
    }

    pub fn reconciler(&self) -> &TabReconciler {
        &self.reconciler
    }

    pub fn startup(&self) -> &StartupCoordinator {
        &self.startup
    }

    pub fn affordance(&self) -> &StickyAffordanceController {
        &self.affordance
    }

    pub fn interceptor(&self) -> &OpenInterceptor {
        &self.interceptor
    }

    /// Applies `edit` to the settings, persists them when a settings file is
    /// configured and re-syncs the affordance.
    pub fn update_settings(&self, edit: impl FnOnce(&mut HomeSettings)) -> Result<()> {
        let snapshot = {
            let mut settings = self.settings.borrow_mut();
            edit(&mut settings);
            settings.clone()
        };
        self.affordance.sync_visibility();
        self.affordance.update_tab_header_tagging();
        match &self.settings_file {
            Some(path) => save_settings(path, &snapshot),
            None => Ok(()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Host Events
    // ─────────────────────────────────────────────────────────────────────────────

    /// Call once the host layout has been restored.
    pub fn on_layout_ready(&self, now: Instant) -> StartupReport {
        if self.disposed.get() {
            return StartupReport::AlreadySettled;
        }
        self.install_ghost_guard();
        let report = self.startup.initialize();
        self.affordance.request_ensure(now);
        self.affordance.tick(now);
        self.affordance.update_tab_header_tagging();
        info!(report = ?report, "Home engine ready");
        report
    }

    /// Returns whether the tab was scheduled for replacement.
    pub fn on_tab_created(&self, tab: TabHandle, now: Instant) -> bool {
        if self.disposed.get() {
            return false;
        }
        self.affordance.request_ensure(now);
        self.startup.handle_ambient_tab_created(tab, now)
    }

    pub fn on_layout_change(&self, now: Instant) {
        if self.disposed.get() {
            return;
        }
        self.view.handle_layout_change(self.workspace.as_ref());
        self.affordance.update_tab_header_tagging();
        self.affordance.request_ensure(now);
        self.affordance.note_focus_change(now);
    }

    pub fn on_focus_change(&self, now: Instant) {
        if self.disposed.get() {
            return;
        }
        self.affordance.note_focus_change(now);
    }

    /// Runs due replacements and the affordance schedule.
    pub fn tick(&self, now: Instant) -> Vec<(TabHandle, Outcome)> {
        if self.disposed.get() {
            return Vec::new();
        }
        let replaced = self.startup.run_due(now);
        if !replaced.is_empty() {
            self.affordance.update_tab_header_tagging();
            self.affordance.note_focus_change(now);
        }
        self.affordance.tick(now);
        replaced
    }

    /// Runs a host open request through the interception layers.
    pub fn intercept_open(&self, request: OpenRequest) -> OpenDecision {
        self.interceptor.dispatch(request)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn execute(&self, command: HomeCommand) -> CommandResult {
        debug!(command = %command.id(), "Executing command");
        match command {
            HomeCommand::Open => CommandResult::Opened(self.open_home()),
            HomeCommand::SetCurrentAsHome => self.set_current_as_home(),
            HomeCommand::ToggleStickyAffordance => self.toggle_sticky(),
            HomeCommand::CloseHomeTab => match self.affordance.close_home_tab() {
                Ok(closed) => CommandResult::Closed(closed),
                Err(err) => self.reject(format!("Failed to close home: {}", err)),
            },
        }
    }

    fn open_home(&self) -> Outcome {
        let settings = self.settings();
        let descriptor = settings.active_descriptor(self.form_factor);
        let outcome = if settings.sticky.enabled {
            self.reconciler
                .reconcile_ghost(descriptor, settings.manual_mode, true)
        } else {
            self.reconciler.reconcile(
                ReconcileRequest::new(descriptor, settings.manual_mode).with_side_effect(true),
            )
        };
        if let Some(message) = outcome.notice() {
            self.notifier.notice(&message);
        }
        self.affordance.update_tab_header_tagging();
        self.affordance.update_active_state();
        outcome
    }

    fn set_current_as_home(&self) -> CommandResult {
        let descriptor = match current_as_home(self.workspace.as_ref()) {
            Ok(descriptor) => descriptor,
            Err(err) => return self.reject(err.to_string()),
        };
        let persisted = self.update_settings(|settings| settings.primary = descriptor.clone());
        if let Err(err) = persisted {
            warn!(error = %err, "Failed to persist home setting");
            self.notifier
                .notice(&format!("Home changed but could not be saved: {}", err));
        } else {
            self.notifier
                .notice(&format!("Home set to {}", descriptor.label()));
        }
        CommandResult::HomeSet(descriptor)
    }

    fn toggle_sticky(&self) -> CommandResult {
        let mut enabled = false;
        let persisted = self.update_settings(|settings| {
            settings.sticky.enabled = !settings.sticky.enabled;
            enabled = settings.sticky.enabled;
        });
        if let Err(err) = persisted {
            warn!(error = %err, "Failed to persist sticky setting");
        }
        CommandResult::StickyToggled(enabled)
    }

    fn reject(&self, message: String) -> CommandResult {
        self.notifier.notice(&message);
        CommandResult::Rejected(message)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    fn install_ghost_guard(&self) {
        let mut slot = self.ghost_guard.borrow_mut();
        if slot.is_some() {
            return;
        }
        let layer = GhostTabGuard::new(self.reconciler.clone(), self.settings.clone(), self.form_factor);
        *slot = Some(self.interceptor.install(Rc::new(layer)));
    }

    /// Tears down everything the engine put on screen or scheduled.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.affordance.dispose();
        self.startup.cancel_pending();
        self.view.forget();
        if let Some(guard) = self.ghost_guard.borrow_mut().take() {
            guard.restore();
        }
        debug!("Home engine disposed");
    }
}
