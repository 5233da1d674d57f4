//! # home-core
//!
//! Home resolution and tab reconciliation engine for document workspaces.
//! A user designates one "home" (a document, a random pick, today's note, a
//! saved layout, the graph view) and the engine keeps it reachable: opened on
//! startup, on demand and in new tabs, without duplicate tabs and with at
//! most one pinned ghost tab.
//!
//! ## Design Principles
//!
//! - **Synchronous**: no async runtime. Hosts drive timers through `tick(now)`.
//! - **Not thread-safe**: everything runs on the host's UI thread.
//! - **Optimistic**: the tab layout is shared and unlocked; every mutation
//!   re-validates the tab it touches and backs off when overtaken.
//! - **Outcomes, not errors**: reconciliation reports an [`Outcome`]; hosts
//!   decide whether to show it.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use home_core::{EngineHost, HomeEngine, HomeCommand, LaunchContext};
//!
//! let engine = HomeEngine::with_settings_file(host, settings_path, launch)?;
//! engine.on_layout_ready(Instant::now());
//! engine.execute(HomeCommand::Open);
//! ```

// Public modules
pub mod affordance;
pub mod commands;
pub mod engine;
pub mod error;
pub mod intercept;
pub mod layout;
pub mod paths;
pub mod providers;
pub mod reconciler;
pub mod resolver;
pub mod settings;
pub mod startup;
pub mod store;
pub mod types;
pub mod view;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

// Re-export commonly used items at crate root
pub use affordance::{ChromeSurface, HeadlessChrome, StickyAffordanceController};
pub use commands::{HomeCommand, LogNotifier, Notifier};
pub use engine::{CommandResult, EngineHost, HomeEngine};
pub use error::{HomeError, ProviderError, Result, TabError};
pub use intercept::{OpenDecision, OpenInterceptor, OpenLayer, OpenRequest};
pub use layout::{ContentKind, MemoryTab, MemoryWorkspace, SplitId, TabHandle, TabId, TabSnapshot, Workspace};
pub use providers::*;
pub use reconciler::{ReconcileRequest, ReconcileScope, TabReconciler};
pub use resolver::{Clock, FixedClock, HomeTargetResolver, Providers, SystemClock};
pub use settings::*;
pub use startup::{LaunchContext, LaunchIntent, StartupCoordinator, StartupPhase, StartupReport};
pub use store::{lookup_with_fallback, MemoryStore, ResourceStore, VaultStore};
pub use types::*;
pub use view::ViewConfigurer;
