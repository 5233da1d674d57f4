//! In-memory [`Workspace`] used by tests and the CLI simulator.
//!
//! Behaves like a real host where it matters to the engine: pane ids are
//! recycled with a bumped generation, closing the active tab moves focus to a
//! neighbour, and any operation can be made to fail on demand.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ContentKind, SplitId, TabHandle, TabId, TabSnapshot, Workspace};
use crate::error::TabError;
use crate::types::{PresentationMode, ResourceKind};

/// Serializable description of one tab, used to seed a layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryTab {
    pub resource: Option<String>,
    /// Overrides the content kind derived from `resource`.
    pub content: Option<ContentKind>,
    pub pinned: bool,
    pub split: SplitId,
    pub active: bool,
}

#[derive(Debug, Clone)]
struct Pane {
    id: TabId,
    generation: u32,
    split: SplitId,
    content: ContentKind,
    resource: Option<String>,
    pinned: bool,
    presentation: PresentationMode,
    scrolled_to_end: bool,
}

#[derive(Debug, Default)]
struct LayoutState {
    panes: Vec<Pane>,
    active: Option<TabId>,
    generations: HashMap<TabId, u32>,
    free_ids: Vec<TabId>,
    next_id: u64,
    commands_run: Vec<String>,
    failing: HashSet<String>,
}

impl LayoutState {
    fn allocate(&mut self) -> (TabId, u32) {
        if let Some(id) = self.free_ids.pop() {
            let generation = self.generations.get(&id).map_or(0, |g| g + 1);
            self.generations.insert(id, generation);
            return (id, generation);
        }
        let id = TabId(self.next_id);
        self.next_id += 1;
        self.generations.insert(id, 0);
        (id, 0)
    }

    fn new_pane(&mut self, split: SplitId) -> Pane {
        let (id, generation) = self.allocate();
        Pane {
            id,
            generation,
            split,
            content: ContentKind::Empty,
            resource: None,
            pinned: false,
            presentation: PresentationMode::Default,
            scrolled_to_end: false,
        }
    }

    fn position(&self, handle: TabHandle) -> Result<usize, TabError> {
        self.panes
            .iter()
            .position(|p| p.id == handle.id && p.generation == handle.generation)
            .ok_or(TabError::TabGone(handle.id))
    }

    fn check(&self, operation: &str) -> Result<(), TabError> {
        if self.failing.contains(operation) {
            return Err(TabError::rejected(operation, "injected failure"));
        }
        Ok(())
    }

    fn remove_at(&mut self, index: usize) {
        let pane = self.panes.remove(index);
        self.free_ids.push(pane.id);
        if self.active == Some(pane.id) {
            let neighbour = index.min(self.panes.len().saturating_sub(1));
            self.active = self.panes.get(neighbour).map(|p| p.id);
        }
    }

    fn snapshot(&self, pane: &Pane) -> TabSnapshot {
        TabSnapshot {
            handle: TabHandle {
                id: pane.id,
                generation: pane.generation,
            },
            split: pane.split,
            content_kind: pane.content.clone(),
            bound_resource: pane.resource.clone(),
            pinned: pane.pinned,
            is_active: self.active == Some(pane.id),
        }
    }
}

type SettleHook = Box<dyn FnMut(&MemoryWorkspace)>;

#[derive(Default)]
pub struct MemoryWorkspace {
    state: RefCell<LayoutState>,
    settle_hook: RefCell<Option<SettleHook>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a layout from tab descriptions. The first tab marked active wins;
    /// otherwise the last tab is active.
    pub fn from_tabs(tabs: &[MemoryTab]) -> Self {
        let workspace = Self::new();
        {
            let mut state = workspace.state.borrow_mut();
            for tab in tabs {
                let mut pane = state.new_pane(tab.split);
                pane.resource = tab.resource.clone();
                pane.content = match (&tab.content, &tab.resource) {
                    (Some(content), _) => content.clone(),
                    (None, Some(resource)) => ContentKind::Document(
                        ResourceKind::of_path(resource).unwrap_or(ResourceKind::Document),
                    ),
                    (None, None) => ContentKind::Empty,
                };
                pane.pinned = tab.pinned;
                if tab.active && state.active.is_none() {
                    state.active = Some(pane.id);
                }
                state.panes.push(pane);
            }
            if state.active.is_none() {
                state.active = state.panes.last().map(|p| p.id);
            }
        }
        workspace
    }

    /// Adds a tab the way a user would (e.g. "new tab" button) and returns it.
    pub fn user_opens_tab(&self, split: SplitId, resource: Option<&str>) -> TabHandle {
        let mut state = self.state.borrow_mut();
        let mut pane = state.new_pane(split);
        if let Some(resource) = resource {
            pane.content = ContentKind::Document(
                ResourceKind::of_path(resource).unwrap_or(ResourceKind::Document),
            );
            pane.resource = Some(resource.to_string());
        }
        let handle = TabHandle {
            id: pane.id,
            generation: pane.generation,
        };
        state.active = Some(pane.id);
        state.panes.push(pane);
        handle
    }

    /// Makes every later call of `operation` fail until cleared.
    pub fn fail_on(&self, operation: &str) {
        self.state.borrow_mut().failing.insert(operation.to_string());
    }

    pub fn clear_failures(&self) {
        self.state.borrow_mut().failing.clear();
    }

    /// Runs `hook` inside every `settle` call, simulating host events that
    /// arrive while an attempt is suspended.
    pub fn on_settle(&self, hook: impl FnMut(&MemoryWorkspace) + 'static) {
        *self.settle_hook.borrow_mut() = Some(Box::new(hook));
    }

    pub fn presentation(&self, handle: TabHandle) -> Option<PresentationMode> {
        let state = self.state.borrow();
        let index = state.position(handle).ok()?;
        Some(state.panes[index].presentation)
    }

    pub fn scrolled_to_end(&self, handle: TabHandle) -> bool {
        let state = self.state.borrow();
        state
            .position(handle)
            .map(|i| state.panes[i].scrolled_to_end)
            .unwrap_or(false)
    }

    pub fn commands_run(&self) -> Vec<String> {
        self.state.borrow().commands_run.clone()
    }

    /// Bound resources in layout order (`None` for unbound tabs).
    pub fn bindings(&self) -> Vec<Option<String>> {
        self.state
            .borrow()
            .panes
            .iter()
            .map(|p| p.resource.clone())
            .collect()
    }
}

impl Workspace for MemoryWorkspace {
    fn tabs(&self) -> Vec<TabSnapshot> {
        let state = self.state.borrow();
        state.panes.iter().map(|p| state.snapshot(p)).collect()
    }

    fn open_tab(&self) -> Result<TabHandle, TabError> {
        let mut state = self.state.borrow_mut();
        state.check("open_tab")?;
        let active_index = state
            .active
            .and_then(|id| state.panes.iter().position(|p| p.id == id));
        let split = active_index.map(|i| state.panes[i].split).unwrap_or_default();
        let pane = state.new_pane(split);
        let handle = TabHandle {
            id: pane.id,
            generation: pane.generation,
        };
        state.active = Some(pane.id);
        match active_index {
            Some(i) => state.panes.insert(i + 1, pane),
            None => state.panes.push(pane),
        }
        Ok(handle)
    }

    fn replace_layout(&self, keep: Option<TabHandle>) -> Result<TabHandle, TabError> {
        let mut state = self.state.borrow_mut();
        state.check("replace_layout")?;
        let kept = keep.and_then(|handle| state.position(handle).ok());
        let survivors: Vec<Pane> = kept.map(|i| state.panes[i].clone()).into_iter().collect();
        let removed: Vec<TabId> = state
            .panes
            .iter()
            .filter(|p| !survivors.iter().any(|s| s.id == p.id))
            .map(|p| p.id)
            .collect();
        state.free_ids.extend(removed);
        state.panes = survivors;
        let split = state.panes.first().map(|p| p.split).unwrap_or_default();
        let pane = state.new_pane(split);
        let handle = TabHandle {
            id: pane.id,
            generation: pane.generation,
        };
        state.active = Some(pane.id);
        state.panes.push(pane);
        Ok(handle)
    }

    fn open_resource(&self, tab: TabHandle, resource: &str) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("open_resource")?;
        let kind = ResourceKind::of_path(resource)
            .ok_or_else(|| TabError::rejected("open_resource", format!("no view for {}", resource)))?;
        let index = state.position(tab)?;
        let pane = &mut state.panes[index];
        pane.content = ContentKind::Document(kind);
        pane.resource = Some(resource.to_string());
        pane.presentation = PresentationMode::Default;
        pane.scrolled_to_end = false;
        Ok(())
    }

    fn open_graph(&self, tab: TabHandle) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("open_graph")?;
        let index = state.position(tab)?;
        let pane = &mut state.panes[index];
        pane.content = ContentKind::Graph;
        pane.resource = None;
        Ok(())
    }

    fn focus(&self, tab: TabHandle) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("focus")?;
        state.position(tab)?;
        state.active = Some(tab.id);
        Ok(())
    }

    fn set_pinned(&self, tab: TabHandle, pinned: bool) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("set_pinned")?;
        let index = state.position(tab)?;
        state.panes[index].pinned = pinned;
        Ok(())
    }

    fn detach(&self, tab: TabHandle) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("detach")?;
        let index = state.position(tab)?;
        state.remove_at(index);
        Ok(())
    }

    fn set_presentation(&self, tab: TabHandle, mode: PresentationMode) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("set_presentation")?;
        let index = state.position(tab)?;
        state.panes[index].presentation = mode;
        Ok(())
    }

    fn scroll_to_end(&self, tab: TabHandle) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("scroll_to_end")?;
        let index = state.position(tab)?;
        state.panes[index].scrolled_to_end = true;
        Ok(())
    }

    fn execute_command(&self, command_id: &str) -> Result<(), TabError> {
        let mut state = self.state.borrow_mut();
        state.check("execute_command")?;
        state.commands_run.push(command_id.to_string());
        Ok(())
    }

    fn settle(&self, _delay: Duration) {
        let hook = self.settle_hook.borrow_mut().take();
        if let Some(mut hook) = hook {
            hook(self);
            let mut slot = self.settle_hook.borrow_mut();
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
    }
}
