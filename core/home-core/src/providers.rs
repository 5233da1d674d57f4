//! External providers the resolver delegates to.
//!
//! Implementors should:
//! - Report "not set up" through `is_enabled`/`has_journal` rather than errors
//! - Never panic; the resolver treats every failure as "provider unavailable"
//! - Keep calls cheap, since they run on the UI thread

use std::cell::Cell;
use std::path::PathBuf;

use chrono::{Datelike, Duration, NaiveDate};
use fs_err as fs;

use crate::error::ProviderError;
use crate::paths::normalize_separators;
use crate::types::Period;

/// Provider preference when several handle the same period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProviderPriority {
    /// General-purpose periodic-notes integrations.
    General = 0,
    /// The host's own daily-notes feature.
    BuiltIn = 1,
}

pub trait PeriodicNoteProvider {
    /// Unique identifier for logs (e.g. "daily-notes").
    fn id(&self) -> &str;

    fn priority(&self) -> ProviderPriority;

    /// Whether this provider is configured for `period`.
    fn is_enabled(&self, period: Period) -> bool;

    /// The existing note for the period starting on `start`, if any.
    fn find_note(&self, period: Period, start: NaiveDate) -> Option<String>;

    /// Creates the note for the period starting on `start` and returns its path.
    fn create_note(&self, period: Period, start: NaiveDate) -> Result<String, ProviderError>;
}

pub trait JournalProvider {
    fn has_journal(&self, name: &str) -> bool;

    fn auto_create(&self) -> bool;

    fn set_auto_create(&self, enabled: bool);

    /// Today's entry of the journal, created when auto-create is on.
    fn entry_for(&self, journal: &str, day: NaiveDate) -> Result<Option<String>, ProviderError>;
}

pub trait LayoutProvider {
    fn has_layout(&self, name: &str) -> bool;

    fn load_layout(&self, name: &str) -> Result<(), ProviderError>;
}

/// Start of the period containing `day`. Weeks start on Monday.
pub fn period_start(period: Period, day: NaiveDate) -> NaiveDate {
    match period {
        Period::Day => day,
        Period::Week => day - Duration::days(i64::from(day.weekday().num_days_from_monday())),
        Period::Month => day.with_day(1).unwrap_or(day),
        Period::Year => day.with_ordinal(1).unwrap_or(day),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Folder-Backed Periodic Notes
// ═══════════════════════════════════════════════════════════════════════════════

/// Periodic notes stored as `<folder>/<date formatted>.md` under a vault root.
#[derive(Debug, Clone)]
pub struct FolderPeriodicProvider {
    id: String,
    priority: ProviderPriority,
    vault_root: PathBuf,
    periods: Vec<(Period, PeriodFormat)>,
}

#[derive(Debug, Clone)]
pub struct PeriodFormat {
    pub folder: String,
    /// `chrono` strftime format of the file stem.
    pub format: String,
    pub template: Option<String>,
}

impl PeriodFormat {
    pub fn new(folder: &str, format: &str) -> Self {
        Self {
            folder: normalize_separators(folder),
            format: format.to_string(),
            template: None,
        }
    }

    fn path_for(&self, start: NaiveDate) -> String {
        let stem = start.format(&self.format).to_string();
        if self.folder.is_empty() {
            format!("{}.md", stem)
        } else {
            format!("{}/{}.md", self.folder, stem)
        }
    }
}

impl FolderPeriodicProvider {
    /// The host's daily-notes feature: day period only, built-in priority.
    pub fn daily_notes(vault_root: impl Into<PathBuf>, format: PeriodFormat) -> Self {
        Self {
            id: "daily-notes".to_string(),
            priority: ProviderPriority::BuiltIn,
            vault_root: vault_root.into(),
            periods: vec![(Period::Day, format)],
        }
    }

    /// A general periodic-notes integration covering any set of periods.
    pub fn periodic_notes(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            id: "periodic-notes".to_string(),
            priority: ProviderPriority::General,
            vault_root: vault_root.into(),
            periods: Vec::new(),
        }
    }

    pub fn with_period(mut self, period: Period, format: PeriodFormat) -> Self {
        self.periods.retain(|(p, _)| *p != period);
        self.periods.push((period, format));
        self
    }

    fn format_for(&self, period: Period) -> Option<&PeriodFormat> {
        self.periods
            .iter()
            .find(|(p, _)| *p == period)
            .map(|(_, f)| f)
    }
}

impl PeriodicNoteProvider for FolderPeriodicProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> ProviderPriority {
        self.priority
    }

    fn is_enabled(&self, period: Period) -> bool {
        self.format_for(period).is_some()
    }

    fn find_note(&self, period: Period, start: NaiveDate) -> Option<String> {
        let path = self.format_for(period)?.path_for(start);
        self.vault_root.join(&path).is_file().then_some(path)
    }

    fn create_note(&self, period: Period, start: NaiveDate) -> Result<String, ProviderError> {
        let format = self
            .format_for(period)
            .ok_or_else(|| ProviderError::Disabled(format!("{} {}", self.id, period.as_str())))?;
        let path = format.path_for(start);
        let absolute = self.vault_root.join(&path);
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).map_err(|source| ProviderError::Io {
                context: format!("creating folder for {}", path),
                source,
            })?;
        }
        let body = format.template.clone().unwrap_or_default();
        fs::write(&absolute, body).map_err(|source| ProviderError::Io {
            context: format!("creating {}", path),
            source,
        })?;
        tracing::debug!(provider = %self.id, path = %path, "Created periodic note");
        Ok(path)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Folder-Backed Journals
// ═══════════════════════════════════════════════════════════════════════════════

/// Journals as `<journal>/<YYYY-MM-DD>.md` folders under a vault root.
#[derive(Debug)]
pub struct FolderJournalProvider {
    vault_root: PathBuf,
    auto_create: Cell<bool>,
}

impl FolderJournalProvider {
    pub fn new(vault_root: impl Into<PathBuf>) -> Self {
        Self {
            vault_root: vault_root.into(),
            auto_create: Cell::new(false),
        }
    }
}

impl JournalProvider for FolderJournalProvider {
    fn has_journal(&self, name: &str) -> bool {
        let name = normalize_separators(name);
        !name.is_empty() && self.vault_root.join(name).is_dir()
    }

    fn auto_create(&self) -> bool {
        self.auto_create.get()
    }

    fn set_auto_create(&self, enabled: bool) {
        self.auto_create.set(enabled);
    }

    fn entry_for(&self, journal: &str, day: NaiveDate) -> Result<Option<String>, ProviderError> {
        if !self.has_journal(journal) {
            return Err(ProviderError::NotFound {
                kind: "journal",
                name: journal.to_string(),
            });
        }
        let path = format!("{}/{}.md", normalize_separators(journal), day.format("%Y-%m-%d"));
        let absolute = self.vault_root.join(&path);
        if absolute.is_file() {
            return Ok(Some(path));
        }
        if !self.auto_create.get() {
            return Ok(None);
        }
        fs::write(&absolute, "").map_err(|source| ProviderError::Io {
            context: format!("creating {}", path),
            source,
        })?;
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_period_start() {
        // 2024-05-16 is a Thursday
        let day = date(2024, 5, 16);
        assert_eq!(period_start(Period::Day, day), day);
        assert_eq!(period_start(Period::Week, day), date(2024, 5, 13));
        assert_eq!(period_start(Period::Month, day), date(2024, 5, 1));
        assert_eq!(period_start(Period::Year, day), date(2024, 1, 1));
    }

    #[test]
    fn test_week_start_on_monday_is_itself() {
        let monday = date(2024, 5, 13);
        assert_eq!(period_start(Period::Week, monday), monday);
    }

    #[test]
    fn test_folder_provider_creates_then_finds() {
        let temp = tempfile::tempdir().unwrap();
        let provider =
            FolderPeriodicProvider::daily_notes(temp.path(), PeriodFormat::new("daily", "%Y-%m-%d"));
        let day = date(2024, 5, 16);

        assert!(provider.is_enabled(Period::Day));
        assert!(!provider.is_enabled(Period::Week));
        assert!(provider.find_note(Period::Day, day).is_none());

        let created = provider.create_note(Period::Day, day).unwrap();
        assert_eq!(created, "daily/2024-05-16.md");
        assert_eq!(provider.find_note(Period::Day, day).as_deref(), Some("daily/2024-05-16.md"));
    }

    #[test]
    fn test_journal_respects_auto_create_flag() {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("work")).unwrap();
        let provider = FolderJournalProvider::new(temp.path());
        let day = date(2024, 5, 16);

        assert_eq!(provider.entry_for("work", day).unwrap(), None);
        provider.set_auto_create(true);
        assert_eq!(
            provider.entry_for("work", day).unwrap().as_deref(),
            Some("work/2024-05-16.md")
        );
        assert!(provider.entry_for("missing", day).is_err());
    }
}
