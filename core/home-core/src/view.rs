//! Presentation settings for the tab that ends up hosting home.

use std::cell::RefCell;

use tracing::{debug, warn};

use crate::error::TabError;
use crate::layout::{TabHandle, Workspace};
use crate::types::{PresentationMode, ResourceKind, ViewConfiguration};

/// Tab whose presentation mode should revert once it stops showing home.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RevertRecord {
    handle: TabHandle,
    resource: String,
}

#[derive(Debug, Default)]
pub struct ViewConfigurer {
    revert: RefCell<Option<RevertRecord>>,
}

impl ViewConfigurer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `config` to the tab if `resource` is document-like.
    /// Canvas and base resources are left alone.
    pub fn configure(
        &self,
        workspace: &dyn Workspace,
        tab: TabHandle,
        resource: &str,
        config: &ViewConfiguration,
    ) -> Result<(), TabError> {
        let document_like = ResourceKind::of_path(resource).is_some_and(|k| k.is_document_like());
        if !document_like {
            return Ok(());
        }

        if config.presentation_mode != PresentationMode::Default {
            workspace.set_presentation(tab, config.presentation_mode)?;
        }
        if config.auto_scroll {
            workspace.scroll_to_end(tab)?;
        }

        *self.revert.borrow_mut() = (config.revert_on_leave
            && config.presentation_mode != PresentationMode::Default)
            .then(|| RevertRecord {
                handle: tab,
                resource: resource.to_string(),
            });
        Ok(())
    }

    /// Call after layout changes. Reverts the remembered tab to the default
    /// presentation once it navigated away from home.
    pub fn handle_layout_change(&self, workspace: &dyn Workspace) {
        let Some(record) = self.revert.borrow().clone() else {
            return;
        };

        let Some(tab) = workspace.tab(record.handle) else {
            debug!(tab = %record.handle.id, "Revert target closed or recycled");
            self.revert.borrow_mut().take();
            return;
        };

        if tab.is_bound_to(&record.resource) {
            return;
        }

        self.revert.borrow_mut().take();
        if let Err(err) = workspace.set_presentation(record.handle, PresentationMode::Default) {
            warn!(error = %err, "Failed to revert presentation mode");
        }
    }

    pub fn tracked_tab(&self) -> Option<TabHandle> {
        self.revert.borrow().as_ref().map(|r| r.handle)
    }

    pub fn forget(&self) {
        self.revert.borrow_mut().take();
    }
}
