//! Core types shared by the resolver, reconciler and host integrations.
//!
//! Everything here is plain data: descriptors and modes come from the
//! settings surface, `ResolvedTarget` lives for a single reconciliation
//! attempt, and `Outcome` is what every attempt reports back.

use serde::{Deserialize, Serialize};

use crate::error::TabError;

// ═══════════════════════════════════════════════════════════════════════════════
// Descriptors
// ═══════════════════════════════════════════════════════════════════════════════

/// What "home" is, as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum HomeDescriptor {
    /// A fixed resource path inside the store.
    ExplicitResource(String),
    /// Any supported resource, picked uniformly at random.
    RandomAny,
    /// A random resource under a folder, or named like the scope anywhere.
    RandomInScope(String),
    /// A saved workspace layout loaded through the layout provider.
    NamedLayout(String),
    /// The global graph view.
    GraphView,
    /// Open nothing; only the post-open command runs.
    Nothing,
    /// Today's periodic note for the given period.
    RecurringPeriodic(Period),
    /// Today's entry in the named journal.
    RecurringJournal(String),
}

impl Default for HomeDescriptor {
    fn default() -> Self {
        HomeDescriptor::ExplicitResource("Home".to_string())
    }
}

impl HomeDescriptor {
    /// Kinds whose target is a concrete resource in the store.
    pub fn is_resource_kind(&self) -> bool {
        !matches!(
            self,
            HomeDescriptor::NamedLayout(_) | HomeDescriptor::GraphView | HomeDescriptor::Nothing
        )
    }

    /// Kinds that resolve to the same target on every call.
    pub fn is_deterministic(&self) -> bool {
        matches!(
            self,
            HomeDescriptor::ExplicitResource(_)
                | HomeDescriptor::NamedLayout(_)
                | HomeDescriptor::GraphView
                | HomeDescriptor::Nothing
        )
    }

    /// Kinds that may own a pinned ghost tab.
    ///
    /// Random, periodic and journal targets change between resolutions, so
    /// pinning one of them would leave a stale tab behind.
    pub fn is_pin_eligible(&self) -> bool {
        self.is_resource_kind() && self.is_deterministic()
    }

    pub fn label(&self) -> String {
        match self {
            HomeDescriptor::ExplicitResource(path) => path.clone(),
            HomeDescriptor::RandomAny => "random resource".to_string(),
            HomeDescriptor::RandomInScope(scope) => format!("random resource in {}", scope),
            HomeDescriptor::NamedLayout(name) => format!("layout {}", name),
            HomeDescriptor::GraphView => "graph view".to_string(),
            HomeDescriptor::Nothing => "nothing".to_string(),
            HomeDescriptor::RecurringPeriodic(period) => format!("{} note", period.as_str()),
            HomeDescriptor::RecurringJournal(name) => format!("journal {}", name),
        }
    }
}

/// Period of a recurring note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "daily",
            Period::Week => "weekly",
            Period::Month => "monthly",
            Period::Year => "yearly",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Modes
// ═══════════════════════════════════════════════════════════════════════════════

/// How existing tabs are treated when placing the home resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningMode {
    /// Replace the whole layout with the home tab.
    ReplaceAll,
    /// Close the active tab (unless pinned) and open home in its place.
    ReplaceLast,
    /// Keep every tab; reuse an empty one or open a new one.
    Retain,
}

/// When a freshly created empty tab is replaced by home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewTabMode {
    #[default]
    Never,
    OnlyWhenSoleTab,
    Always,
}

/// Form factor of the running host; selects the active descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    #[default]
    Desktop,
    Mobile,
}

// ═══════════════════════════════════════════════════════════════════════════════
// View Configuration
// ═══════════════════════════════════════════════════════════════════════════════

/// Presentation mode of a document tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationMode {
    /// Whatever the host would use anyway.
    #[default]
    Default,
    Reading,
    Source,
    LiveEdit,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfiguration {
    pub presentation_mode: PresentationMode,
    pub auto_scroll: bool,
    pub revert_on_leave: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Kinds
// ═══════════════════════════════════════════════════════════════════════════════

/// Resource classes the engine can open, each rendered by exactly one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Document,
    ExtendedDocument,
    Canvas,
    Base,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Document,
        ResourceKind::ExtendedDocument,
        ResourceKind::Canvas,
        ResourceKind::Base,
    ];

    /// Extension appended when a configured path names no resource.
    pub const DEFAULT_EXTENSION: &'static str = "md";

    pub fn extension(&self) -> &'static str {
        match self {
            ResourceKind::Document => "md",
            ResourceKind::ExtendedDocument => "mdx",
            ResourceKind::Canvas => "canvas",
            ResourceKind::Base => "base",
        }
    }

    /// Name of the renderer the host uses for this kind.
    pub fn view_type(&self) -> &'static str {
        match self {
            ResourceKind::Document => "markdown",
            ResourceKind::ExtendedDocument => "mdx",
            ResourceKind::Canvas => "canvas",
            ResourceKind::Base => "bases",
        }
    }

    /// Text-editable kinds accept a `ViewConfiguration`.
    pub fn is_document_like(&self) -> bool {
        matches!(self, ResourceKind::Document | ResourceKind::ExtendedDocument)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.extension().eq_ignore_ascii_case(ext))
    }

    /// Classifies a resource path by its extension.
    pub fn of_path(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resolution & Outcomes
// ═══════════════════════════════════════════════════════════════════════════════

/// Why a descriptor produced no target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    NotConfigured,
    NoCandidates,
    ProviderUnavailable,
}

/// What a descriptor currently points to. Created fresh per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    Resource(String),
    NonResource,
    Unresolvable(UnresolvedReason),
}

impl ResolvedTarget {
    pub fn resource(&self) -> Option<&str> {
        match self {
            ResolvedTarget::Resource(path) => Some(path),
            _ => None,
        }
    }
}

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A tab was prepared and now hosts the target.
    Opened,
    /// The target was already open and got focused.
    AlreadyOpen,
    /// The descriptor asks for nothing to be opened.
    NoOp,
    NotConfigured,
    ResourceMissing,
    ProviderUnavailable,
    /// A tab operation failed; speculative tabs were cleaned up.
    Failed(TabError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Opened | Outcome::AlreadyOpen | Outcome::NoOp)
    }

    /// Message shown to the user when a manual trigger fails.
    pub fn notice(&self) -> Option<String> {
        match self {
            Outcome::NotConfigured => Some("Home is not configured".to_string()),
            Outcome::ResourceMissing => Some("Home resource does not exist".to_string()),
            Outcome::ProviderUnavailable => {
                Some("The provider needed to open home is not available".to_string())
            }
            Outcome::Failed(err) => Some(format!("Failed to open home: {}", err)),
            _ => None,
        }
    }
}

impl From<UnresolvedReason> for Outcome {
    fn from(reason: UnresolvedReason) -> Self {
        match reason {
            UnresolvedReason::NotConfigured => Outcome::NotConfigured,
            UnresolvedReason::NoCandidates => Outcome::ResourceMissing,
            UnresolvedReason::ProviderUnavailable => Outcome::ProviderUnavailable,
        }
    }
}
