//! Integration tests against an on-disk vault and settings file.

use std::rc::Rc;
use std::time::Instant;

use chrono::NaiveDate;
use fs_err as fs;
use home_core::{
    load_settings, CommandResult, EngineHost, FixedClock, FolderJournalProvider,
    FolderPeriodicProvider, HomeCommand, HomeDescriptor, HomeEngine, HomeSettings, JournalProvider,
    LaunchContext, MemoryTab, MemoryWorkspace, Outcome, Period, PeriodFormat, PeriodicNoteProvider,
    Providers, ResourceStore,
    SettingsPaths, StartupReport, VaultStore, Workspace,
};

fn vault() -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path();
    fs::create_dir_all(root.join("notes")).unwrap();
    fs::create_dir_all(root.join("journals/work")).unwrap();
    fs::create_dir_all(root.join(".app")).unwrap();
    fs::write(root.join("notes/home.md"), "# Home").unwrap();
    fs::write(root.join("notes/todo.md"), "- [ ] write").unwrap();
    fs::write(root.join(".app/workspace.json"), "{}").unwrap();
    temp
}

fn host(ws: &Rc<MemoryWorkspace>, root: &std::path::Path, providers: Providers) -> EngineHost {
    EngineHost {
        providers,
        clock: Rc::new(FixedClock(NaiveDate::from_ymd_opt(2024, 5, 16).unwrap())),
        ..EngineHost::new(ws.clone(), Rc::new(VaultStore::new(root)))
    }
}

#[test]
fn test_explicit_home_without_extension_opens_from_vault() {
    let temp = vault();
    let ws = Rc::new(MemoryWorkspace::new());
    let settings = HomeSettings {
        primary: HomeDescriptor::ExplicitResource("notes/home".into()),
        ..Default::default()
    };
    let engine = HomeEngine::new(host(&ws, temp.path(), Providers::default()), settings, LaunchContext::default());

    assert_eq!(engine.on_layout_ready(Instant::now()), StartupReport::Ran(Outcome::Opened));
    assert_eq!(ws.bindings(), vec![Some("notes/home.md".to_string())]);
}

#[test]
fn test_daily_note_is_created_and_opened() {
    let temp = vault();
    let ws = Rc::new(MemoryWorkspace::new());
    let daily: Rc<dyn PeriodicNoteProvider> = Rc::new(FolderPeriodicProvider::daily_notes(
        temp.path(),
        PeriodFormat::new("daily", "%Y-%m-%d"),
    ));
    let providers = Providers {
        periodic: vec![daily],
        ..Default::default()
    };
    let settings = HomeSettings {
        primary: HomeDescriptor::RecurringPeriodic(Period::Day),
        ..Default::default()
    };
    let engine = HomeEngine::new(host(&ws, temp.path(), providers), settings, LaunchContext::default());

    assert_eq!(engine.execute(HomeCommand::Open), CommandResult::Opened(Outcome::Opened));
    assert!(temp.path().join("daily/2024-05-16.md").is_file());
    assert_eq!(ws.bindings(), vec![Some("daily/2024-05-16.md".to_string())]);

    // Second invocation finds the existing note instead of creating another.
    assert_eq!(engine.execute(HomeCommand::Open), CommandResult::Opened(Outcome::AlreadyOpen));
}

#[test]
fn test_general_provider_loses_to_builtin() {
    let temp = vault();
    let ws = Rc::new(MemoryWorkspace::new());
    let general: Rc<dyn PeriodicNoteProvider> = Rc::new(
        FolderPeriodicProvider::periodic_notes(temp.path())
            .with_period(Period::Day, PeriodFormat::new("periodic", "%Y%m%d")),
    );
    let builtin: Rc<dyn PeriodicNoteProvider> = Rc::new(FolderPeriodicProvider::daily_notes(
        temp.path(),
        PeriodFormat::new("daily", "%Y-%m-%d"),
    ));
    let providers = Providers {
        periodic: vec![general, builtin],
        ..Default::default()
    };
    let settings = HomeSettings {
        primary: HomeDescriptor::RecurringPeriodic(Period::Day),
        ..Default::default()
    };
    let engine = HomeEngine::new(host(&ws, temp.path(), providers), settings, LaunchContext::default());

    engine.execute(HomeCommand::Open);

    assert!(temp.path().join("daily/2024-05-16.md").is_file());
    assert!(!temp.path().join("periodic/20240516.md").exists());
}

#[test]
fn test_journal_entry_is_created_and_flag_restored() {
    let temp = vault();
    let ws = Rc::new(MemoryWorkspace::new());
    let journal = Rc::new(FolderJournalProvider::new(temp.path()));
    let providers = Providers {
        journal: Some(journal.clone()),
        ..Default::default()
    };
    let settings = HomeSettings {
        primary: HomeDescriptor::RecurringJournal("journals/work".into()),
        ..Default::default()
    };
    let engine = HomeEngine::new(host(&ws, temp.path(), providers), settings, LaunchContext::default());

    assert_eq!(engine.execute(HomeCommand::Open), CommandResult::Opened(Outcome::Opened));
    assert!(temp.path().join("journals/work/2024-05-16.md").is_file());
    assert!(!journal.auto_create());
}

#[test]
fn test_random_in_scope_stays_in_folder() {
    let temp = vault();
    fs::write(temp.path().join("elsewhere.md"), "").unwrap();
    let ws = Rc::new(MemoryWorkspace::new());
    let settings = HomeSettings {
        primary: HomeDescriptor::RandomInScope("notes".into()),
        ..Default::default()
    };
    let engine = HomeEngine::new(host(&ws, temp.path(), Providers::default()), settings, LaunchContext::default());

    for _ in 0..5 {
        engine.execute(HomeCommand::Open);
    }
    for binding in ws.bindings().into_iter().flatten() {
        assert!(binding.starts_with("notes/"), "picked {}", binding);
    }
}

#[test]
fn test_vault_hides_dot_folders() {
    let temp = vault();
    let store = VaultStore::new(temp.path());
    assert!(store.resources().iter().all(|r| !r.starts_with(".app")));
}

#[test]
fn test_set_current_as_home_persists_to_settings_file() {
    let temp = vault();
    let paths = SettingsPaths::with_root(temp.path().join("config"));
    let ws = Rc::new(MemoryWorkspace::from_tabs(&[MemoryTab {
        resource: Some("notes/todo.md".into()),
        ..Default::default()
    }]));
    let engine = HomeEngine::with_settings_file(
        host(&ws, temp.path(), Providers::default()),
        paths.settings_file(),
        LaunchContext::default(),
    )
    .unwrap();

    engine.execute(HomeCommand::SetCurrentAsHome);
    let saved = load_settings(&paths.settings_file()).unwrap();
    assert_eq!(saved.primary, HomeDescriptor::ExplicitResource("notes/todo.md".into()));

    // A fresh engine reading the same file opens the new home.
    let ws = Rc::new(MemoryWorkspace::new());
    let engine = HomeEngine::with_settings_file(
        host(&ws, temp.path(), Providers::default()),
        paths.settings_file(),
        LaunchContext::default(),
    )
    .unwrap();
    engine.on_layout_ready(Instant::now());
    assert!(ws.tabs()[0].is_bound_to("notes/todo.md"));
}
