//! Turns a [`HomeDescriptor`] into a [`ResolvedTarget`].
//!
//! Resolution never fails loudly: missing configuration, empty candidate
//! sets and absent providers all come back as
//! `ResolvedTarget::Unresolvable(reason)` so callers can map them to outcomes.
//!
//! Random, periodic and journal kinds are not idempotent. A reconciliation
//! attempt resolves once and carries the value through every later step.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, warn};

use crate::paths::{file_name, file_stem, is_within_folder, normalize_separators};
use crate::providers::{period_start, JournalProvider, LayoutProvider, PeriodicNoteProvider};
use crate::store::ResourceStore;
use crate::types::{HomeDescriptor, Period, ResolvedTarget, ResourceKind, UnresolvedReason};

/// Source of "today" for recurring kinds.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// External collaborators a descriptor may delegate to.
#[derive(Default, Clone)]
pub struct Providers {
    pub periodic: Vec<Rc<dyn PeriodicNoteProvider>>,
    pub journal: Option<Rc<dyn JournalProvider>>,
    pub layouts: Option<Rc<dyn LayoutProvider>>,
}

pub struct HomeTargetResolver {
    store: Rc<dyn ResourceStore>,
    providers: Providers,
    clock: Rc<dyn Clock>,
    rng: RefCell<StdRng>,
}

impl HomeTargetResolver {
    pub fn new(store: Rc<dyn ResourceStore>, providers: Providers, clock: Rc<dyn Clock>) -> Self {
        Self {
            store,
            providers,
            clock,
            rng: RefCell::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic random picks, for tests and reproducible simulations.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = RefCell::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn store(&self) -> &dyn ResourceStore {
        self.store.as_ref()
    }

    pub fn layouts(&self) -> Option<&dyn LayoutProvider> {
        self.providers.layouts.as_deref()
    }

    pub fn resolve(&self, descriptor: &HomeDescriptor) -> ResolvedTarget {
        let target = match descriptor {
            HomeDescriptor::ExplicitResource(value) => {
                let value = normalize_separators(value.trim());
                if value.is_empty() {
                    ResolvedTarget::Unresolvable(UnresolvedReason::NotConfigured)
                } else {
                    ResolvedTarget::Resource(value)
                }
            }
            HomeDescriptor::RandomAny => self.pick_random(None),
            HomeDescriptor::RandomInScope(scope) => self.pick_random(Some(scope)),
            HomeDescriptor::RecurringPeriodic(period) => self.resolve_periodic(*period),
            HomeDescriptor::RecurringJournal(name) => self.resolve_journal(name),
            HomeDescriptor::NamedLayout(_) | HomeDescriptor::GraphView | HomeDescriptor::Nothing => {
                ResolvedTarget::NonResource
            }
        };
        debug!(descriptor = %descriptor.label(), target = ?target, "Resolved home target");
        target
    }

    /// Supported resources, restricted to `scope` when given. A scope that is
    /// not a folder filters by exact file name (or stem) anywhere instead.
    pub fn candidates(&self, scope: Option<&str>) -> Vec<String> {
        let supported = self
            .store
            .resources()
            .into_iter()
            .filter(|r| ResourceKind::of_path(r).is_some());

        match scope.map(normalize_separators) {
            None => supported.collect(),
            Some(scope) if self.store.is_folder(&scope) => supported
                .filter(|r| is_within_folder(&scope, r))
                .collect(),
            Some(scope) => supported
                .filter(|r| file_name(r) == scope || file_stem(r) == scope)
                .collect(),
        }
    }

    fn pick_random(&self, scope: Option<&str>) -> ResolvedTarget {
        let candidates = self.candidates(scope);
        let mut rng = self.rng.borrow_mut();
        match candidates.choose(&mut *rng) {
            Some(choice) => ResolvedTarget::Resource(choice.clone()),
            None => ResolvedTarget::Unresolvable(UnresolvedReason::NoCandidates),
        }
    }

    fn resolve_periodic(&self, period: Period) -> ResolvedTarget {
        let provider = self
            .providers
            .periodic
            .iter()
            .filter(|p| p.is_enabled(period))
            .max_by_key(|p| p.priority());

        let Some(provider) = provider else {
            debug!(period = period.as_str(), "No periodic note provider configured");
            return ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable);
        };

        let start = period_start(period, self.clock.today());
        if let Some(existing) = provider.find_note(period, start) {
            return ResolvedTarget::Resource(existing);
        }

        match provider.create_note(period, start) {
            Ok(created) => ResolvedTarget::Resource(created),
            Err(err) => {
                warn!(provider = provider.id(), error = %err, "Failed to create periodic note");
                ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable)
            }
        }
    }

    fn resolve_journal(&self, name: &str) -> ResolvedTarget {
        let Some(journal) = self.providers.journal.as_ref() else {
            return ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable);
        };
        if name.trim().is_empty() {
            return ResolvedTarget::Unresolvable(UnresolvedReason::NotConfigured);
        }
        if !journal.has_journal(name) {
            debug!(journal = name, "Journal not found");
            return ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable);
        }

        // Not reentrant: a concurrent change to the flag during the call is
        // overwritten by the restore below.
        let previous = journal.auto_create();
        journal.set_auto_create(true);
        let entry = journal.entry_for(name, self.clock.today());
        journal.set_auto_create(previous);

        match entry {
            Ok(Some(path)) => ResolvedTarget::Resource(path),
            Ok(None) => ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable),
            Err(err) => {
                warn!(journal = name, error = %err, "Journal provider failed");
                ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{FakeJournal, FakePeriodic};
    use crate::providers::ProviderPriority;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 16).unwrap()
    }

    fn resolver(store: MemoryStore, providers: Providers) -> HomeTargetResolver {
        HomeTargetResolver::new(Rc::new(store), providers, Rc::new(FixedClock(today()))).with_seed(7)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Explicit & non-resource kinds
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_explicit_resource_is_literal() {
        let r = resolver(MemoryStore::default(), Providers::default());
        assert_eq!(
            r.resolve(&HomeDescriptor::ExplicitResource("notes/missing.md".into())),
            ResolvedTarget::Resource("notes/missing.md".into())
        );
    }

    #[test]
    fn test_empty_explicit_resource_is_not_configured() {
        let r = resolver(MemoryStore::default(), Providers::default());
        assert_eq!(
            r.resolve(&HomeDescriptor::ExplicitResource(String::new())),
            ResolvedTarget::Unresolvable(UnresolvedReason::NotConfigured)
        );
        assert_eq!(
            r.resolve(&HomeDescriptor::ExplicitResource("  ".into())),
            ResolvedTarget::Unresolvable(UnresolvedReason::NotConfigured)
        );
    }

    #[test]
    fn test_non_resource_kinds() {
        let r = resolver(MemoryStore::default(), Providers::default());
        for descriptor in [
            HomeDescriptor::GraphView,
            HomeDescriptor::Nothing,
            HomeDescriptor::NamedLayout("focus".into()),
        ] {
            assert_eq!(r.resolve(&descriptor), ResolvedTarget::NonResource);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Random kinds
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_random_any_over_empty_store() {
        let r = resolver(MemoryStore::default(), Providers::default());
        assert_eq!(
            r.resolve(&HomeDescriptor::RandomAny),
            ResolvedTarget::Unresolvable(UnresolvedReason::NoCandidates)
        );
    }

    #[test]
    fn test_random_any_skips_unsupported_kinds() {
        let store = MemoryStore::new(["a.md", "photo.png", "b.canvas"]);
        let r = resolver(store, Providers::default());
        assert_eq!(r.candidates(None), vec!["a.md".to_string(), "b.canvas".to_string()]);
        for _ in 0..20 {
            let target = r.resolve(&HomeDescriptor::RandomAny);
            assert!(matches!(target.resource(), Some("a.md") | Some("b.canvas")));
        }
    }

    #[test]
    fn test_random_in_folder_scope() {
        let store = MemoryStore::new(["ideas/one.md", "ideas/deep/two.md", "other/three.md"]);
        let r = resolver(store, Providers::default());
        assert_eq!(
            r.candidates(Some("ideas")),
            vec!["ideas/deep/two.md".to_string(), "ideas/one.md".to_string()]
        );
    }

    #[test]
    fn test_random_scope_falls_back_to_name_filter() {
        let store = MemoryStore::new(["a/index.md", "b/c/index.md", "b/other.md"]);
        let r = resolver(store, Providers::default());
        assert_eq!(
            r.candidates(Some("index")),
            vec!["a/index.md".to_string(), "b/c/index.md".to_string()]
        );
        assert_eq!(r.candidates(Some("index.md")).len(), 2);
        assert_eq!(
            r.resolve(&HomeDescriptor::RandomInScope("nowhere".into())),
            ResolvedTarget::Unresolvable(UnresolvedReason::NoCandidates)
        );
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Periodic & journal kinds
    // ─────────────────────────────────────────────────────────────────────────────

    #[test]
    fn test_periodic_without_provider_is_unavailable() {
        let r = resolver(MemoryStore::default(), Providers::default());
        assert_eq!(
            r.resolve(&HomeDescriptor::RecurringPeriodic(Period::Day)),
            ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable)
        );
    }

    #[test]
    fn test_builtin_provider_wins_over_general() {
        let general = Rc::new(FakePeriodic::new("general", ProviderPriority::General, &[Period::Day]));
        let builtin = Rc::new(FakePeriodic::new("builtin", ProviderPriority::BuiltIn, &[Period::Day]));
        let providers = Providers {
            periodic: vec![general.clone(), builtin.clone()],
            ..Default::default()
        };
        let r = resolver(MemoryStore::default(), providers);

        let target = r.resolve(&HomeDescriptor::RecurringPeriodic(Period::Day));
        assert_eq!(target, ResolvedTarget::Resource("builtin/2024-05-16.md".into()));
        assert_eq!(general.created(), 0);
        assert_eq!(builtin.created(), 1);
    }

    #[test]
    fn test_general_provider_handles_week() {
        let general = Rc::new(FakePeriodic::new(
            "general",
            ProviderPriority::General,
            &[Period::Week],
        ));
        let builtin = Rc::new(FakePeriodic::new("builtin", ProviderPriority::BuiltIn, &[Period::Day]));
        let providers = Providers {
            periodic: vec![builtin, general],
            ..Default::default()
        };
        let r = resolver(MemoryStore::default(), providers);

        assert_eq!(
            r.resolve(&HomeDescriptor::RecurringPeriodic(Period::Week)),
            ResolvedTarget::Resource("general/2024-05-13.md".into())
        );
    }

    #[test]
    fn test_existing_periodic_note_is_not_recreated() {
        let provider = Rc::new(FakePeriodic::new("builtin", ProviderPriority::BuiltIn, &[Period::Day]));
        let providers = Providers {
            periodic: vec![provider.clone()],
            ..Default::default()
        };
        let r = resolver(MemoryStore::default(), providers);

        r.resolve(&HomeDescriptor::RecurringPeriodic(Period::Day));
        r.resolve(&HomeDescriptor::RecurringPeriodic(Period::Day));
        assert_eq!(provider.created(), 1);
    }

    #[test]
    fn test_journal_restores_auto_create_flag() {
        let journal = Rc::new(FakeJournal::new(&["work"]));
        let providers = Providers {
            journal: Some(journal.clone()),
            ..Default::default()
        };
        let r = resolver(MemoryStore::default(), providers);

        let target = r.resolve(&HomeDescriptor::RecurringJournal("work".into()));
        assert_eq!(target, ResolvedTarget::Resource("work/2024-05-16.md".into()));
        assert!(!journal.auto_create());
        assert_eq!(journal.flag_during_last_call(), Some(true));
    }

    #[test]
    fn test_journal_restores_flag_after_failure() {
        let journal = Rc::new(FakeJournal::new(&["work"]).failing());
        journal.set_auto_create(true);
        let providers = Providers {
            journal: Some(journal.clone()),
            ..Default::default()
        };
        let r = resolver(MemoryStore::default(), providers);

        assert_eq!(
            r.resolve(&HomeDescriptor::RecurringJournal("work".into())),
            ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable)
        );
        assert!(journal.auto_create());
    }

    #[test]
    fn test_unknown_journal_is_unavailable() {
        let providers = Providers {
            journal: Some(Rc::new(FakeJournal::new(&["work"]))),
            ..Default::default()
        };
        let r = resolver(MemoryStore::default(), providers);
        assert_eq!(
            r.resolve(&HomeDescriptor::RecurringJournal("personal".into())),
            ResolvedTarget::Unresolvable(UnresolvedReason::ProviderUnavailable)
        );
    }
}
