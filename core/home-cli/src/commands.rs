//! Subcommand implementations. Each writes its result as JSON to `out`.

use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::time::Instant;

use clap::ValueEnum;
use fs_err as fs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use home_core::paths::normalize_separators;
use home_core::{
    load_settings, save_settings, ContentKind, EngineHost, FolderJournalProvider,
    FolderPeriodicProvider, FormFactor, HeadlessChrome, HomeCommand, HomeDescriptor, HomeEngine,
    HomeTargetResolver, LaunchContext, MemoryStore, MemoryTab, MemoryWorkspace, Notifier, Period,
    PeriodFormat, PeriodicNoteProvider, Providers, ResolvedTarget, SystemClock, TabSnapshot,
    UnresolvedReason, VaultStore, Workspace,
};

use crate::error::{CliError, Result};

const DAILY_FORMAT: &str = "%Y-%m-%d";

fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(out, "{}", json)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// resolve
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct ResolveReport {
    descriptor: HomeDescriptor,
    label: String,
    target: TargetReport,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum TargetReport {
    Resource { path: String },
    NonResource,
    Unresolvable { reason: &'static str },
}

impl From<ResolvedTarget> for TargetReport {
    fn from(target: ResolvedTarget) -> Self {
        match target {
            ResolvedTarget::Resource(path) => TargetReport::Resource { path },
            ResolvedTarget::NonResource => TargetReport::NonResource,
            ResolvedTarget::Unresolvable(reason) => TargetReport::Unresolvable {
                reason: match reason {
                    UnresolvedReason::NotConfigured => "not_configured",
                    UnresolvedReason::NoCandidates => "no_candidates",
                    UnresolvedReason::ProviderUnavailable => "provider_unavailable",
                },
            },
        }
    }
}

/// Folder-backed providers laid out the way a default vault keeps them:
/// daily notes at the root, other periods through the general provider.
pub fn vault_providers(vault: &Path) -> Providers {
    let daily: Rc<dyn PeriodicNoteProvider> = Rc::new(FolderPeriodicProvider::daily_notes(
        vault,
        PeriodFormat::new("", DAILY_FORMAT),
    ));
    let general: Rc<dyn PeriodicNoteProvider> = Rc::new(
        FolderPeriodicProvider::periodic_notes(vault)
            .with_period(Period::Week, PeriodFormat::new("", "%G-W%V"))
            .with_period(Period::Month, PeriodFormat::new("", "%Y-%m"))
            .with_period(Period::Year, PeriodFormat::new("", "%Y")),
    );
    Providers {
        periodic: vec![daily, general],
        journal: Some(Rc::new(FolderJournalProvider::new(vault))),
        layouts: None,
    }
}

pub fn resolve(
    settings_path: &Path,
    vault: &Path,
    form_factor: FormFactor,
    out: &mut impl Write,
) -> Result<()> {
    if !vault.is_dir() {
        return Err(CliError::VaultNotFound(vault.to_path_buf()));
    }
    let settings = load_settings(settings_path)?;
    let descriptor = settings.active_descriptor(form_factor).clone();

    let resolver = HomeTargetResolver::new(
        Rc::new(VaultStore::new(vault)),
        vault_providers(vault),
        Rc::new(SystemClock),
    );
    let target = resolver.resolve(&descriptor);
    debug!(descriptor = %descriptor.label(), target = ?target, "Resolved home");

    write_json(
        out,
        &ResolveReport {
            label: descriptor.label(),
            descriptor,
            target: target.into(),
        },
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// set-home / show-config
// ═══════════════════════════════════════════════════════════════════════════════

pub fn set_home(settings_path: &Path, path: &str, out: &mut impl Write) -> Result<()> {
    let resource = normalize_separators(path.trim());
    if resource.is_empty() {
        return Err(CliError::EmptyHome);
    }

    let mut settings = load_settings(settings_path)?;
    settings.primary = HomeDescriptor::ExplicitResource(resource);
    save_settings(settings_path, &settings)?;
    info!(
        home = %settings.primary.label(),
        settings = %settings_path.display(),
        "Home updated"
    );

    write_json(out, &settings.primary)
}

pub fn show_config(settings_path: &Path, out: &mut impl Write) -> Result<()> {
    write_json(out, &load_settings(settings_path)?)
}

// ═══════════════════════════════════════════════════════════════════════════════
// simulate
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Layout-ready startup attempt
    Startup,
    /// The open-home command
    Open,
    /// The close-home command
    Close,
}

/// Layout file contents. Resources bound to `tabs` exist implicitly.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SimulationLayout {
    pub resources: Vec<String>,
    pub tabs: Vec<MemoryTab>,
}

impl SimulationLayout {
    fn store(&self) -> MemoryStore {
        let bound = self.tabs.iter().filter_map(|tab| tab.resource.as_deref());
        MemoryStore::new(self.resources.iter().map(String::as_str).chain(bound))
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    trigger: Trigger,
    result: String,
    notices: Vec<String>,
    tabs: Vec<TabRow>,
}

#[derive(Debug, Serialize)]
struct TabRow {
    id: u64,
    content: ContentKind,
    resource: Option<String>,
    pinned: bool,
    active: bool,
}

impl From<TabSnapshot> for TabRow {
    fn from(tab: TabSnapshot) -> Self {
        Self {
            id: tab.handle.id.0,
            content: tab.content_kind,
            resource: tab.bound_resource,
            pinned: tab.pinned,
            active: tab.is_active,
        }
    }
}

/// Keeps notices for the report instead of showing them.
#[derive(Debug, Default)]
struct CollectingNotifier {
    notices: RefCell<Vec<String>>,
}

impl Notifier for CollectingNotifier {
    fn notice(&self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }
}

fn read_layout(path: &Path) -> Result<SimulationLayout> {
    let content = fs::read_to_string(path).map_err(|source| CliError::LayoutRead { source })?;
    serde_json::from_str(&content).map_err(|source| CliError::LayoutMalformed {
        path: path.to_path_buf(),
        source,
    })
}

pub fn simulate(
    settings_path: &Path,
    layout_path: &Path,
    trigger: Trigger,
    out: &mut impl Write,
) -> Result<()> {
    let layout = read_layout(layout_path)?;
    let settings = load_settings(settings_path)?;

    let ws = Rc::new(MemoryWorkspace::from_tabs(&layout.tabs));
    let notifier = Rc::new(CollectingNotifier::default());
    let host = EngineHost {
        chrome: Rc::new(HeadlessChrome::new(true)),
        notifier: notifier.clone(),
        ..EngineHost::new(ws.clone(), Rc::new(layout.store()))
    };
    let launch = LaunchContext::capture(ws.as_ref(), &[] as &[&str]);
    let engine = HomeEngine::new(host, settings, launch);

    let result = match trigger {
        Trigger::Startup => format!("{:?}", engine.on_layout_ready(Instant::now())),
        Trigger::Open => format!("{:?}", engine.execute(HomeCommand::Open)),
        Trigger::Close => format!("{:?}", engine.execute(HomeCommand::CloseHomeTab)),
    };
    let tabs = ws.tabs().into_iter().map(TabRow::from).collect();
    engine.dispose();
    debug!(trigger = ?trigger, result = %result, "Simulation finished");

    let notices = notifier.notices.borrow().clone();
    write_json(
        out,
        &SimulationReport {
            trigger,
            result,
            notices,
            tabs,
        },
    )
}
