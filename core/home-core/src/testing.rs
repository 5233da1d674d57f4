//! Fake providers and recorders for exercising the engine without a host.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use chrono::NaiveDate;

use crate::commands::Notifier;
use crate::error::ProviderError;
use crate::providers::{JournalProvider, LayoutProvider, PeriodicNoteProvider, ProviderPriority};
use crate::types::Period;

/// Periodic provider that "creates" notes in memory as `<id>/<date>.md`.
pub struct FakePeriodic {
    id: String,
    priority: ProviderPriority,
    periods: Vec<Period>,
    notes: RefCell<HashSet<(Period, NaiveDate)>>,
    created: Cell<usize>,
}

impl FakePeriodic {
    pub fn new(id: &str, priority: ProviderPriority, periods: &[Period]) -> Self {
        Self {
            id: id.to_string(),
            priority,
            periods: periods.to_vec(),
            notes: RefCell::new(HashSet::new()),
            created: Cell::new(0),
        }
    }

    pub fn created(&self) -> usize {
        self.created.get()
    }

    fn path(&self, start: NaiveDate) -> String {
        format!("{}/{}.md", self.id, start.format("%Y-%m-%d"))
    }
}

impl PeriodicNoteProvider for FakePeriodic {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> ProviderPriority {
        self.priority
    }

    fn is_enabled(&self, period: Period) -> bool {
        self.periods.contains(&period)
    }

    fn find_note(&self, period: Period, start: NaiveDate) -> Option<String> {
        self.notes
            .borrow()
            .contains(&(period, start))
            .then(|| self.path(start))
    }

    fn create_note(&self, period: Period, start: NaiveDate) -> Result<String, ProviderError> {
        self.notes.borrow_mut().insert((period, start));
        self.created.set(self.created.get() + 1);
        Ok(self.path(start))
    }
}

/// Journal provider that records the auto-create flag seen by `entry_for`.
pub struct FakeJournal {
    journals: Vec<String>,
    auto_create: Cell<bool>,
    flag_during_call: Cell<Option<bool>>,
    fail: bool,
}

impl FakeJournal {
    pub fn new(journals: &[&str]) -> Self {
        Self {
            journals: journals.iter().map(|j| j.to_string()).collect(),
            auto_create: Cell::new(false),
            flag_during_call: Cell::new(None),
            fail: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn flag_during_last_call(&self) -> Option<bool> {
        self.flag_during_call.get()
    }
}

impl JournalProvider for FakeJournal {
    fn has_journal(&self, name: &str) -> bool {
        self.journals.iter().any(|j| j == name)
    }

    fn auto_create(&self) -> bool {
        self.auto_create.get()
    }

    fn set_auto_create(&self, enabled: bool) {
        self.auto_create.set(enabled);
    }

    fn entry_for(&self, journal: &str, day: NaiveDate) -> Result<Option<String>, ProviderError> {
        self.flag_during_call.set(Some(self.auto_create.get()));
        if self.fail {
            return Err(ProviderError::Disabled(journal.to_string()));
        }
        if !self.auto_create.get() {
            return Ok(None);
        }
        Ok(Some(format!("{}/{}.md", journal, day.format("%Y-%m-%d"))))
    }
}

/// Layout provider that records which layouts were loaded.
#[derive(Default)]
pub struct FakeLayouts {
    names: Vec<String>,
    loaded: RefCell<Vec<String>>,
}

impl FakeLayouts {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            loaded: RefCell::new(Vec::new()),
        }
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.borrow().clone()
    }
}

impl LayoutProvider for FakeLayouts {
    fn has_layout(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    fn load_layout(&self, name: &str) -> Result<(), ProviderError> {
        if !self.has_layout(name) {
            return Err(ProviderError::NotFound {
                kind: "layout",
                name: name.to_string(),
            });
        }
        self.loaded.borrow_mut().push(name.to_string());
        Ok(())
    }
}

/// Notifier that keeps every notice for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: RefCell<Vec<String>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<String> {
        self.notices.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notice(&self, message: &str) {
        self.notices.borrow_mut().push(message.to_string());
    }
}
