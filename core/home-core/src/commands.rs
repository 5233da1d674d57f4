//! User-facing command surface and transient notices.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{HomeError, Result};
use crate::layout::{ContentKind, Workspace};
use crate::types::{HomeDescriptor, ResourceKind};

/// Shows short-lived messages to the user.
pub trait Notifier {
    fn notice(&self, message: &str);
}

/// Notifier for hosts without a notice surface; writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notice(&self, message: &str) {
        info!(notice = %message, "Notice");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeCommand {
    /// Reconcile home with the manual opening mode.
    Open,
    /// Make the focused resource the primary home.
    SetCurrentAsHome,
    ToggleStickyAffordance,
    /// Close the tab showing home, pinned or not.
    CloseHomeTab,
}

impl HomeCommand {
    pub const ALL: [HomeCommand; 4] = [
        HomeCommand::Open,
        HomeCommand::SetCurrentAsHome,
        HomeCommand::ToggleStickyAffordance,
        HomeCommand::CloseHomeTab,
    ];

    /// Stable id hosts register the command under.
    pub fn id(&self) -> &'static str {
        match self {
            HomeCommand::Open => "open-home",
            HomeCommand::SetCurrentAsHome => "set-current-as-home",
            HomeCommand::ToggleStickyAffordance => "toggle-sticky-home",
            HomeCommand::CloseHomeTab => "close-home",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            HomeCommand::Open => "Open home",
            HomeCommand::SetCurrentAsHome => "Set current file as home",
            HomeCommand::ToggleStickyAffordance => "Toggle sticky home button",
            HomeCommand::CloseHomeTab => "Close home tab",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.id() == id)
    }
}

/// Descriptor for the resource in the focused tab.
///
/// Only the supported resource kinds qualify.
pub fn current_as_home(workspace: &dyn Workspace) -> Result<HomeDescriptor> {
    let active = workspace.active_tab().ok_or(HomeError::NoFocusedResource)?;
    let resource = match (&active.content_kind, active.bound_resource) {
        (ContentKind::Document(_), Some(resource)) => resource,
        (_, Some(resource)) => return Err(HomeError::UnsupportedResource(resource)),
        (_, None) => return Err(HomeError::NoFocusedResource),
    };
    if ResourceKind::of_path(&resource).is_none() {
        return Err(HomeError::UnsupportedResource(resource));
    }
    Ok(HomeDescriptor::ExplicitResource(resource))
}
