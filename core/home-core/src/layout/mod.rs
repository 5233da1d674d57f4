//! Host tab layout interface.
//!
//! The engine never owns tabs. It reads snapshots of the host's layout and
//! asks the host to mutate it through [`Workspace`]. Snapshots are only valid
//! for the moment they were taken: every mutation re-validates the handle it
//! acts on, because the user and other extensions change the layout too.
//!
//! # Handles and generations
//!
//! Hosts recycle pane ids. A [`TabHandle`] pairs the id with the generation
//! the host assigned when the pane was (re)created, so a handle held across a
//! settle delay can be checked with [`Workspace::tab`] before use.

mod memory;

pub use memory::{MemoryTab, MemoryWorkspace};

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TabError;
use crate::paths::resources_match;
use crate::types::{PresentationMode, ResourceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Split (tab group) a tab lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct SplitId(pub u64);

/// Opaque reference to a pane, valid while the host reports the same generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabHandle {
    pub id: TabId,
    pub generation: u32,
}

/// What a tab is currently rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "kind", rename_all = "snake_case")]
pub enum ContentKind {
    Document(ResourceKind),
    Graph,
    Empty,
    ReleaseNotes,
    Other(String),
}

impl ContentKind {
    pub fn is_document_capable(&self) -> bool {
        matches!(self, ContentKind::Document(_))
    }
}

/// Point-in-time view of one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabSnapshot {
    pub handle: TabHandle,
    pub split: SplitId,
    pub content_kind: ContentKind,
    pub bound_resource: Option<String>,
    pub pinned: bool,
    pub is_active: bool,
}

impl TabSnapshot {
    /// Empty by content *and* binding. A tab can report an empty view for a
    /// moment while the host is still attaching a resource to it.
    pub fn is_genuinely_empty(&self) -> bool {
        self.content_kind == ContentKind::Empty && self.bound_resource.is_none()
    }

    pub fn is_bound_to(&self, resource: &str) -> bool {
        self.content_kind.is_document_capable()
            && self
                .bound_resource
                .as_deref()
                .is_some_and(|bound| resources_match(bound, resource))
    }

    /// Tabs that count toward "the app is already showing something".
    pub fn counts_as_restored(&self) -> bool {
        matches!(
            self.content_kind,
            ContentKind::Document(_) | ContentKind::Graph | ContentKind::Empty
        )
    }
}

/// The host's window layout, as seen by the engine.
///
/// Methods take `&self`: hosts keep their own interior mutability and may
/// re-enter the engine from inside [`Workspace::settle`].
pub trait Workspace {
    /// All tabs in the main area, in layout order.
    fn tabs(&self) -> Vec<TabSnapshot>;

    /// Current state of the tab, or `None` if it was closed or recycled.
    fn tab(&self, handle: TabHandle) -> Option<TabSnapshot> {
        self.tabs().into_iter().find(|tab| tab.handle == handle)
    }

    fn active_tab(&self) -> Option<TabSnapshot> {
        self.tabs().into_iter().find(|tab| tab.is_active)
    }

    /// Opens a new empty tab next to the active one and focuses it.
    fn open_tab(&self) -> Result<TabHandle, TabError>;

    /// Closes every tab except `keep` and returns a single new empty tab.
    fn replace_layout(&self, keep: Option<TabHandle>) -> Result<TabHandle, TabError>;

    /// Binds `resource` to the tab, replacing whatever it showed.
    fn open_resource(&self, tab: TabHandle, resource: &str) -> Result<(), TabError>;

    fn open_graph(&self, tab: TabHandle) -> Result<(), TabError>;

    fn focus(&self, tab: TabHandle) -> Result<(), TabError>;

    fn set_pinned(&self, tab: TabHandle, pinned: bool) -> Result<(), TabError>;

    fn detach(&self, tab: TabHandle) -> Result<(), TabError>;

    fn set_presentation(&self, tab: TabHandle, mode: PresentationMode) -> Result<(), TabError>;

    fn scroll_to_end(&self, tab: TabHandle) -> Result<(), TabError>;

    fn execute_command(&self, command_id: &str) -> Result<(), TabError>;

    /// Lets pending host transitions finish. Hosts with an event loop pump it
    /// here; the default returns immediately.
    fn settle(&self, _delay: Duration) {}
}

/// Tabs bound to `resource`, in layout order.
pub fn tabs_bound_to(workspace: &dyn Workspace, resource: &str) -> Vec<TabSnapshot> {
    workspace
        .tabs()
        .into_iter()
        .filter(|tab| tab.is_bound_to(resource))
        .collect()
}

/// Opens an empty tab when the layout has none left.
pub fn ensure_floor(workspace: &dyn Workspace) {
    if workspace.tabs().is_empty() {
        if let Err(err) = workspace.open_tab() {
            tracing::warn!(error = %err, "Failed to restore empty tab floor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(content_kind: ContentKind, bound: Option<&str>) -> TabSnapshot {
        TabSnapshot {
            handle: TabHandle {
                id: TabId(1),
                generation: 0,
            },
            split: SplitId(0),
            content_kind,
            bound_resource: bound.map(str::to_string),
            pinned: false,
            is_active: false,
        }
    }

    #[test]
    fn test_empty_view_with_binding_is_not_genuinely_empty() {
        assert!(snapshot(ContentKind::Empty, None).is_genuinely_empty());
        assert!(!snapshot(ContentKind::Empty, Some("a.md")).is_genuinely_empty());
    }

    #[test]
    fn test_is_bound_to_uses_normalized_match() {
        let tab = snapshot(ContentKind::Document(ResourceKind::Document), Some("Notes/Home.md"));
        assert!(tab.is_bound_to("notes/home"));
        assert!(!snapshot(ContentKind::Graph, Some("notes/home.md")).is_bound_to("notes/home"));
    }
}
