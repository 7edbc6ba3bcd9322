use crate::config::ARCHIVE_FILE_NAME;
use crate::error::{Error, Result};
use crate::models::DatabaseRecord;
use crate::stats::RunStats;
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Field captured from an archive path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutField {
    Owner,
    Project,
    Language,
}

impl FromStr for LayoutField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "owner" => Ok(LayoutField::Owner),
            "project" | "name" => Ok(LayoutField::Project),
            "language" => Ok(LayoutField::Language),
            other => Err(format!("unknown layout field '{other}'")),
        }
    }
}

/// Where owner, project and language sit in an archive path.
///
/// Offsets count path segments below the root from the end, `1` being the
/// archive file itself. The default matches
/// `<owner>/<project>/<x>/<y>/<z>/<language>/db.zip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    captures: Vec<(LayoutField, usize)>,
}

impl Default for PathLayout {
    fn default() -> Self {
        Self {
            captures: vec![
                (LayoutField::Owner, 7),
                (LayoutField::Project, 6),
                (LayoutField::Language, 2),
            ],
        }
    }
}

impl PathLayout {
    /// Minimum number of segments a path needs for every capture to resolve.
    pub fn required_segments(&self) -> usize {
        self.captures.iter().map(|(_, off)| *off).max().unwrap_or(1)
    }

    fn offset(&self, field: LayoutField) -> usize {
        self.captures
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, off)| *off)
            .unwrap_or(1)
    }

    /// Returns `(owner, project, language)` for a path relative to the root.
    pub fn parse(&self, relative: &Path, full: &Path) -> Result<(String, String, String)> {
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let required = self.required_segments();
        if segments.len() < required {
            return Err(Error::PathLayout {
                path: full.to_path_buf(),
                segments: segments.len(),
                required,
            });
        }
        let pick = |field| segments[segments.len() - self.offset(field)].clone();
        Ok((
            pick(LayoutField::Owner),
            pick(LayoutField::Project),
            pick(LayoutField::Language),
        ))
    }
}

impl FromStr for PathLayout {
    type Err = String;

    /// Parses `owner=7,project=6,language=2`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut captures = Vec::new();
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            let (field, offset) = part
                .split_once('=')
                .ok_or_else(|| format!("expected field=offset, got '{part}'"))?;
            let field: LayoutField = field.parse()?;
            let offset: usize = offset
                .trim()
                .parse()
                .map_err(|e| format!("bad offset in '{part}': {e}"))?;
            if offset < 1 {
                return Err(format!("offset for {field:?} must be at least 1"));
            }
            if captures.iter().any(|(f, _)| *f == field) {
                return Err(format!("{field:?} given twice"));
            }
            captures.push((field, offset));
        }
        for field in [LayoutField::Owner, LayoutField::Project, LayoutField::Language] {
            if !captures.iter().any(|(f, _)| *f == field) {
                return Err(format!("layout is missing {field:?}"));
            }
        }
        Ok(Self { captures })
    }
}

impl fmt::Display for PathLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .captures
            .iter()
            .map(|(field, off)| {
                let name = match field {
                    LayoutField::Owner => "owner",
                    LayoutField::Project => "project",
                    LayoutField::Language => "language",
                };
                format!("{name}={off}")
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

/// Walks a root directory for database archives. Each call to
/// [`ArchiveLocator::records`] starts a fresh walk.
pub struct ArchiveLocator {
    root: PathBuf,
    layout: PathLayout,
}

impl ArchiveLocator {
    pub fn new(root: impl Into<PathBuf>, layout: PathLayout) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::InvalidRoot { path: root });
        }
        Ok(Self { root, layout })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Yields one result per archive file. Archive symlinks are followed;
    /// directory symlinks are not.
    pub fn records(&self) -> impl Iterator<Item = Result<DatabaseRecord>> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) => {
                    if entry.file_name() == ARCHIVE_FILE_NAME && is_archive_file(&entry) {
                        Some(self.record_for(entry.path()))
                    } else {
                        None
                    }
                }
                Err(source) => Some(Err(Error::Walk {
                    path: source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone()),
                    source,
                })),
            })
    }

    fn record_for(&self, path: &Path) -> Result<DatabaseRecord> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let (owner, project, language) = self.layout.parse(relative, path)?;
        let meta = std::fs::metadata(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let creation_timestamp = DateTime::<Local>::from(created)
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string();

        debug!(path = %path.display(), %owner, %project, %language, "Found archive");

        Ok(DatabaseRecord {
            owner,
            project,
            language,
            path: path.to_string_lossy().into_owned(),
            size: meta.len(),
            creation_timestamp,
        })
    }
}

fn is_archive_file(entry: &walkdir::DirEntry) -> bool {
    if entry.path_is_symlink() {
        entry.path().is_file()
    } else {
        entry.file_type().is_file()
    }
}

/// Collects every record, stopping at the first fatal error. Unreadable
/// subtrees and unreadable archives are logged, counted and skipped.
pub fn collect_records(locator: &ArchiveLocator, stats: &RunStats) -> Result<Vec<DatabaseRecord>> {
    gather(locator.records(), stats)
}

fn gather(
    results: impl Iterator<Item = Result<DatabaseRecord>>,
    stats: &RunStats,
) -> Result<Vec<DatabaseRecord>> {
    let mut records = Vec::new();
    for result in results {
        match result {
            Ok(record) => records.push(record),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    path = %e.path().display(),
                    stage = %e.stage(),
                    kind = e.kind().label(),
                    error = %e,
                    "Skipping during locate"
                );
                stats.record_skip(e.kind());
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"PK").unwrap();
        path
    }

    #[test]
    fn default_layout_parses_segments() {
        let layout = PathLayout::default();
        let rel = Path::new("wjakob/nanobind/code-scanning/codeql/databases/cpp/db.zip");
        let (owner, project, language) = layout.parse(rel, rel).unwrap();
        assert_eq!(owner, "wjakob");
        assert_eq!(project, "nanobind");
        assert_eq!(language, "cpp");
    }

    #[test]
    fn short_path_is_layout_error() {
        let layout = PathLayout::default();
        let rel = Path::new("acme/cpp/db.zip");
        let err = layout.parse(rel, rel).unwrap_err();
        match err {
            Error::PathLayout {
                segments, required, ..
            } => {
                assert_eq!(segments, 3);
                assert_eq!(required, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn layout_from_str() {
        let layout: PathLayout = "owner=3,project=2,language=1".parse().unwrap();
        let rel = Path::new("acme/widget/java");
        let (owner, project, language) = layout.parse(rel, rel).unwrap();
        assert_eq!((owner.as_str(), project.as_str(), language.as_str()), ("acme", "widget", "java"));
        assert_eq!(layout.to_string(), "owner=3,project=2,language=1");
    }

    #[test]
    fn layout_from_str_rejects_bad_input() {
        assert!("owner=3,project=2".parse::<PathLayout>().is_err());
        assert!("owner=0,project=2,language=1".parse::<PathLayout>().is_err());
        assert!("owner=3,owner=2,language=1".parse::<PathLayout>().is_err());
        assert!("colour=3".parse::<PathLayout>().is_err());
        assert!("owner:3".parse::<PathLayout>().is_err());
    }

    #[test]
    fn invalid_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(matches!(
            ArchiveLocator::new(&missing, PathLayout::default()),
            Err(Error::InvalidRoot { .. })
        ));

        let file = touch(dir.path(), "plain.txt");
        assert!(matches!(
            ArchiveLocator::new(&file, PathLayout::default()),
            Err(Error::InvalidRoot { .. })
        ));
    }

    #[test]
    fn finds_only_archives_and_restarts() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "acme/widget/cs/codeql/db/cpp/db.zip");
        touch(dir.path(), "acme/gadget/cs/codeql/db/java/db.zip");
        touch(dir.path(), "acme/gadget/cs/codeql/db/java/other.zip");

        let locator = ArchiveLocator::new(dir.path(), PathLayout::default()).unwrap();
        let first = collect_records(&locator, &RunStats::new()).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].project, "gadget");
        assert_eq!(first[0].language, "java");
        assert_eq!(first[1].project, "widget");
        assert_eq!(first[1].size, 2);
        assert!(!first[1].creation_timestamp.is_empty());

        let second = collect_records(&locator, &RunStats::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn misplaced_archive_aborts_collection() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "acme/db.zip");
        let locator = ArchiveLocator::new(dir.path(), PathLayout::default()).unwrap();
        let err = collect_records(&locator, &RunStats::new()).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.kind(), crate::error::FailureKind::PathLayout);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_archive_is_located() {
        let dir = TempDir::new().unwrap();
        let store = touch(dir.path(), "store/nanobind.zip");
        let link = dir.path().join("repos/acme/widget/cs/codeql/databases/go/db.zip");
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(&store, &link).unwrap();

        let layout: PathLayout = "owner=7,project=6,language=2".parse().unwrap();
        let locator = ArchiveLocator::new(dir.path().join("repos"), layout).unwrap();
        let records = collect_records(&locator, &RunStats::new()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, "acme");
        assert_eq!(records[0].language, "go");
        assert_eq!(records[0].size, 2);
        assert!(records[0].path.ends_with("go/db.zip"));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_archive_link_is_ignored() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("acme/widget/cs/codeql/db/cpp/db.zip");
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.zip"), &link).unwrap();

        let locator = ArchiveLocator::new(dir.path(), PathLayout::default()).unwrap();
        assert!(collect_records(&locator, &RunStats::new()).unwrap().is_empty());
    }

    #[test]
    fn recoverable_errors_are_counted_not_returned() {
        let good = DatabaseRecord {
            owner: "acme".to_string(),
            project: "widget".to_string(),
            language: "cpp".to_string(),
            path: "/dbs/db.zip".to_string(),
            size: 1,
            creation_timestamp: String::new(),
        };
        let vanished = Error::Io {
            path: PathBuf::from("/dbs/gone/db.zip"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let stats = RunStats::new();
        let records = gather(vec![Err(vanished), Ok(good.clone())].into_iter(), &stats).unwrap();
        assert_eq!(records, vec![good]);
        assert_eq!(stats.skipped(crate::error::FailureKind::Io), 1);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subtree_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        touch(dir.path(), "acme/widget/cs/codeql/db/cpp/db.zip");
        let secret = dir.path().join("globex");
        touch(dir.path(), "globex/gadget/cs/codeql/db/cpp/db.zip");
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&secret).is_ok() {
            // Permissions are not enforced for this user.
            fs::set_permissions(&secret, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let locator = ArchiveLocator::new(dir.path(), PathLayout::default()).unwrap();
        let stats = RunStats::new();
        let result = collect_records(&locator, &stats);
        fs::set_permissions(&secret, fs::Permissions::from_mode(0o755)).unwrap();

        let records = result.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner, "acme");
        assert_eq!(stats.skipped(crate::error::FailureKind::Walk), 1);
    }
}
