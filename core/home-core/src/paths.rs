//! Resource path normalization for consistent comparison.
//!
//! Tabs, settings and stores do not agree on how a resource is spelled:
//! - separators (`\` from Windows hosts, doubled `/`)
//! - leading `./` or `/`
//! - letter case (stores on case-insensitive filesystems)
//! - extension (`Home` in settings vs `Home.md` on disk)
//!
//! Matching goes through [`normalize_for_matching`] so all of those compare
//! equal. Lookups that must hit an exact store entry use
//! [`normalize_separators`] only.

use crate::types::ResourceKind;

/// Canonical separator form: forward slashes, no leading `./` or `/`, no
/// doubled or trailing separators.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Comparison key: separators normalized, lowercased, supported extension
/// stripped.
pub fn normalize_for_matching(path: &str) -> String {
    let normalized = normalize_separators(path).to_lowercase();
    strip_supported_extension(&normalized).to_string()
}

/// Case-insensitive, extension-insensitive equality of two resource paths.
pub fn resources_match(a: &str, b: &str) -> bool {
    normalize_for_matching(a) == normalize_for_matching(b)
}

/// Removes a trailing `.md`/`.mdx`/`.canvas`/`.base` if present.
pub fn strip_supported_extension(path: &str) -> &str {
    match path.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.contains('/')
                && ResourceKind::from_extension(ext).is_some() =>
        {
            stem
        }
        _ => path,
    }
}

/// Final path segment, e.g. `home.md` for `notes/home.md`.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File name without its extension, whatever the extension is.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Whether `path` sits inside `folder` (at any depth).
pub fn is_within_folder(folder: &str, path: &str) -> bool {
    let folder = normalize_separators(folder);
    if folder.is_empty() {
        return true;
    }
    normalize_separators(path)
        .strip_prefix(&folder)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Appends the default extension, used for the single fallback lookup.
pub fn with_default_extension(path: &str) -> String {
    format!("{}.{}", normalize_separators(path), ResourceKind::DEFAULT_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_separators() {
        assert_eq!(normalize_separators("./notes//home.md"), "notes/home.md");
        assert_eq!(normalize_separators("/notes/home.md/"), "notes/home.md");
        assert_eq!(normalize_separators("notes\\daily\\a.md"), "notes/daily/a.md");
    }

    #[test]
    fn test_matching_ignores_case_and_extension() {
        assert!(resources_match("Notes/Home.md", "notes/home"));
        assert!(resources_match("notes/home.canvas", "NOTES/HOME.md"));
        assert!(!resources_match("notes/home.md", "notes/homes.md"));
    }

    #[test]
    fn test_unsupported_extension_is_kept() {
        assert_eq!(normalize_for_matching("a/photo.png"), "a/photo.png");
        assert_eq!(normalize_for_matching("v1.2/readme"), "v1.2/readme");
    }

    #[test]
    fn test_dotfile_is_not_stripped_to_empty() {
        assert_eq!(strip_supported_extension(".md"), ".md");
    }

    #[test]
    fn test_is_within_folder() {
        assert!(is_within_folder("journal", "journal/2024/a.md"));
        assert!(is_within_folder("journal/", "journal/a.md"));
        assert!(!is_within_folder("journal", "journals/a.md"));
        assert!(is_within_folder("", "anything.md"));
    }

    #[test]
    fn test_file_name_and_stem() {
        assert_eq!(file_name("a/b/c.md"), "c.md");
        assert_eq!(file_stem("a/b/c.md"), "c");
        assert_eq!(file_stem("README"), "README");
    }

    #[test]
    fn test_with_default_extension() {
        assert_eq!(with_default_extension("/notes/home"), "notes/home.md");
    }
}
