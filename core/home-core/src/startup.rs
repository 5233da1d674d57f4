//! Startup coordination: the one automatic "open home on launch" attempt,
//! followed by the new-tab replacement policy.
//!
//! ## Phases
//!
//! ```text
//! NotStarted ──initialize──► Resolving ──(attempt or skip)──► Settled
//!                                                               │
//!                    ambient tab created ──► debounce ──► run_due
//! ```
//!
//! `Settled` is reached exactly once per coordinator, whatever the attempt
//! reported. Tabs present at that moment are remembered as seen; only tabs
//! created afterwards are candidates for replacement.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::layout::{TabHandle, Workspace};
use crate::reconciler::{ReconcileRequest, TabReconciler};
use crate::settings::HomeSettings;
use crate::types::{FormFactor, NewTabMode, Outcome};

/// Delay between an ambient empty tab appearing and home replacing it.
pub const AMBIENT_DEBOUNCE: Duration = Duration::from_millis(400);

static DEEP_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^([a-z][a-z0-9+.\-]*)://([a-z][a-z0-9\-]*)/?(?:\?(.*))?$").unwrap()
});

// ═══════════════════════════════════════════════════════════════════════════════
// Launch Context
// ═══════════════════════════════════════════════════════════════════════════════

/// What the app was asked to do by the deep link it was launched with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchIntent {
    OpenResource(String),
    OpenLayout(String),
    /// Any other action, e.g. opening settings or searching.
    Other(String),
}

impl LaunchIntent {
    /// Parses `scheme://action?params`. Returns `None` for anything that is
    /// not a deep link.
    pub fn parse(link: &str) -> Option<Self> {
        let caps = DEEP_LINK.captures(link.trim())?;
        let action = caps.get(2)?.as_str().to_ascii_lowercase();
        let query = caps.get(3).map_or("", |m| m.as_str());

        let mut resource = None;
        let mut layout = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "workspace" if !value.is_empty() => layout = Some(value.into_owned()),
                "file" | "path" | "filepath" if !value.is_empty() => {
                    resource = Some(value.into_owned())
                }
                _ => {}
            }
        }

        Some(match (layout, resource) {
            (Some(layout), _) => LaunchIntent::OpenLayout(layout),
            (None, Some(resource)) => LaunchIntent::OpenResource(resource),
            (None, None) => LaunchIntent::Other(action),
        })
    }

    /// Launch intents that name something to show win over home.
    pub fn suppresses_home(&self) -> bool {
        matches!(self, LaunchIntent::OpenResource(_) | LaunchIntent::OpenLayout(_))
    }
}

/// Facts about the launch, captured once before the startup attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchContext {
    pub deep_link: Option<LaunchIntent>,
    /// The layout came back with tabs: treated as a reload.
    pub restored_tabs: bool,
}

impl LaunchContext {
    /// Reload detection is a heuristic. A cold start has no document, graph
    /// or empty tabs yet; a reload restores them before plugins initialize.
    pub fn capture<S: AsRef<str>>(workspace: &dyn Workspace, args: &[S]) -> Self {
        Self {
            deep_link: args.iter().find_map(|arg| LaunchIntent::parse(arg.as_ref())),
            restored_tabs: workspace.tabs().iter().any(|tab| tab.counts_as_restored()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Coordinator
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupPhase {
    NotStarted,
    Resolving,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupReport {
    Ran(Outcome),
    SkippedReload,
    SkippedDeepLink,
    /// Opening on startup is turned off.
    Disabled,
    AlreadyRunning,
    AlreadySettled,
}

#[derive(Debug, Clone, Copy)]
struct PendingReplacement {
    tab: TabHandle,
    due: Instant,
}

pub struct StartupCoordinator {
    reconciler: Rc<TabReconciler>,
    settings: Rc<RefCell<HomeSettings>>,
    form_factor: FormFactor,
    launch: LaunchContext,
    phase: Cell<StartupPhase>,
    seen_tabs: RefCell<HashSet<TabHandle>>,
    pending: RefCell<Vec<PendingReplacement>>,
}

impl StartupCoordinator {
    pub fn new(
        reconciler: Rc<TabReconciler>,
        settings: Rc<RefCell<HomeSettings>>,
        form_factor: FormFactor,
        launch: LaunchContext,
    ) -> Self {
        Self {
            reconciler,
            settings,
            form_factor,
            launch,
            phase: Cell::new(StartupPhase::NotStarted),
            seen_tabs: RefCell::new(HashSet::new()),
            pending: RefCell::new(Vec::new()),
        }
    }

    pub fn phase(&self) -> StartupPhase {
        self.phase.get()
    }

    /// Runs the automatic startup attempt at most once.
    pub fn initialize(&self) -> StartupReport {
        match self.phase.get() {
            StartupPhase::Resolving => return StartupReport::AlreadyRunning,
            StartupPhase::Settled => return StartupReport::AlreadySettled,
            StartupPhase::NotStarted => {}
        }
        self.phase.set(StartupPhase::Resolving);

        let settings = self.settings.borrow().clone();
        let report = if self.launch.restored_tabs {
            StartupReport::SkippedReload
        } else if self
            .launch
            .deep_link
            .as_ref()
            .is_some_and(LaunchIntent::suppresses_home)
        {
            StartupReport::SkippedDeepLink
        } else if !settings.open_on_startup {
            StartupReport::Disabled
        } else {
            let descriptor = settings.active_descriptor(self.form_factor);
            let outcome = if settings.sticky.enabled {
                self.reconciler
                    .reconcile_ghost(descriptor, settings.startup_mode, true)
            } else {
                self.reconciler.reconcile(
                    ReconcileRequest::new(descriptor, settings.startup_mode).with_side_effect(true),
                )
            };
            if !outcome.is_success() {
                debug!(outcome = ?outcome, "Startup attempt did not open home");
            }
            StartupReport::Ran(outcome)
        };

        let current = self.reconciler.workspace().tabs();
        self.seen_tabs
            .borrow_mut()
            .extend(current.into_iter().map(|tab| tab.handle));
        self.phase.set(StartupPhase::Settled);

        debug!(report = ?report, "Startup settled");
        report
    }

    /// Schedules a replacement for a newly created tab when the new-tab mode
    /// asks for one. Returns whether a replacement was scheduled.
    pub fn handle_ambient_tab_created(&self, tab: TabHandle, now: Instant) -> bool {
        if self.phase.get() != StartupPhase::Settled {
            return false;
        }
        let ws = self.reconciler.workspace();
        {
            let mut seen = self.seen_tabs.borrow_mut();
            seen.retain(|handle| ws.tab(*handle).is_some());
            if !seen.insert(tab) {
                return false;
            }
        }

        let mode = self.settings.borrow().new_tab_mode;
        if mode == NewTabMode::Never {
            return false;
        }

        let Some(snapshot) = ws.tab(tab) else {
            return false;
        };
        if !snapshot.is_genuinely_empty() {
            return false;
        }
        if mode == NewTabMode::OnlyWhenSoleTab {
            let in_split = ws
                .tabs()
                .iter()
                .filter(|t| t.split == snapshot.split)
                .count();
            if in_split != 1 {
                debug!(tab = %tab.id, in_split, "New tab has siblings, leaving it alone");
                return false;
            }
        }

        let mut pending = self.pending.borrow_mut();
        if !pending.iter().any(|p| p.tab == tab) {
            pending.push(PendingReplacement {
                tab,
                due: now + AMBIENT_DEBOUNCE,
            });
        }
        true
    }

    /// Replaces every scheduled tab whose debounce elapsed, if it is still
    /// empty.
    pub fn run_due(&self, now: Instant) -> Vec<(TabHandle, Outcome)> {
        let due: Vec<PendingReplacement> = {
            let mut pending = self.pending.borrow_mut();
            let (due, waiting): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|p| p.due <= now);
            *pending = waiting;
            due
        };

        let mut results = Vec::with_capacity(due.len());
        for item in due {
            let still_empty = self
                .reconciler
                .workspace()
                .tab(item.tab)
                .is_some_and(|t| t.is_genuinely_empty());
            if !still_empty {
                debug!(tab = %item.tab.id, "Scheduled tab no longer empty");
                continue;
            }

            let settings = self.settings.borrow().clone();
            let descriptor = settings.active_descriptor(self.form_factor);
            let outcome = self.reconciler.reconcile(
                ReconcileRequest::new(descriptor, settings.manual_mode).into_tab(item.tab),
            );
            if !outcome.is_success() {
                debug!(tab = %item.tab.id, outcome = ?outcome, "New-tab replacement failed");
            }
            results.push((item.tab, outcome));
        }
        results
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    pub fn cancel_pending(&self) {
        self.pending.borrow_mut().clear();
    }
}
