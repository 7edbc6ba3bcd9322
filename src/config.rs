/// File name every database archive carries on disk
pub const ARCHIVE_FILE_NAME: &str = "db.zip";

/// Creation-metadata document inside an archive (mandatory)
pub const CREATION_METADATA_FILE: &str = "codeql-database.yml";

/// Per-language statistics document inside an archive (optional)
pub const BASELINE_INFO_FILE: &str = "baseline-info.json";

/// Generic parent directory some tool versions use inside the archive
pub const GENERIC_DB_DIR: &str = "codeql_db";

/// Placeholder commit hash for databases that never recorded one
pub const DEFAULT_SHA: &str = "abcde0123";

/// Language key of the synthetic stats entry for archives without baseline info
pub const NO_LANGUAGE: &str = "no-language";

/// CID digest width in bytes (hex string is twice as long)
pub const CID_DIGEST_BYTES: usize = 3;

/// Token placed between project name and CID in request names and storage keys
pub const CID_SEPARATOR: &str = "ctsj";

/// Repository list name used when none is given
pub const DEFAULT_LIST_NAME: &str = "mirva-list";

/// Largest metadata document read from an archive (zip-bomb protection)
pub const MAX_DOCUMENT_BYTES: u64 = 16 * 1024 * 1024;

/// Progress update interval (tick every N archives)
pub const PROGRESS_INTERVAL: u64 = 16;

/// Write buffer for CSV tables
pub const CSV_BUFFER_BYTES: usize = 128 * 1024;
