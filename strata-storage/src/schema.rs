//! Catalog schema definitions

/// SQL to create the files table
pub const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    file_id TEXT PRIMARY KEY NOT NULL,
    path TEXT NOT NULL,
    extension TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    modified_at INTEGER NOT NULL,
    status TEXT NOT NULL,
    last_error TEXT,
    discovered_at INTEGER NOT NULL,
    indexed_at INTEGER
)
"#;

/// SQL to create the chunks table
pub const CREATE_CHUNKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY NOT NULL,
    file_id TEXT NOT NULL REFERENCES files(file_id),
    ordinal INTEGER NOT NULL,
    text TEXT NOT NULL,
    token_count INTEGER NOT NULL,
    start_byte INTEGER NOT NULL,
    end_byte INTEGER NOT NULL,
    kind TEXT NOT NULL
)
"#;

/// SQL to create the entity occurrences table
pub const CREATE_OCCURRENCES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entity_occurrences (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    surface TEXT NOT NULL,
    normalized TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    chunk_id TEXT NOT NULL REFERENCES chunks(chunk_id),
    file_id TEXT NOT NULL,
    confidence REAL NOT NULL
)
"#;

/// SQL to create the consolidated entities table
pub const CREATE_CONSOLIDATED_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS consolidated_entities (
    consolidated_id TEXT PRIMARY KEY NOT NULL,
    canonical TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    aliases TEXT NOT NULL,
    occurrence_count INTEGER NOT NULL,
    file_count INTEGER NOT NULL,
    first_seen INTEGER NOT NULL,
    last_seen INTEGER NOT NULL
)
"#;

/// SQL to create the patterns table
pub const CREATE_PATTERNS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS patterns (
    pattern_id TEXT PRIMARY KEY NOT NULL,
    kind TEXT NOT NULL,
    pattern_data TEXT NOT NULL,
    confidence REAL NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

/// SQL to create the discoveries table
pub const CREATE_DISCOVERIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS discoveries (
    discovery_id TEXT PRIMARY KEY NOT NULL,
    pattern_id TEXT NOT NULL,
    pattern_key TEXT NOT NULL,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    confidence REAL NOT NULL,
    status TEXT NOT NULL,
    notes TEXT,
    source_files TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

/// SQL to create the image side-metadata table
pub const CREATE_IMAGE_SIDECARS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS image_sidecars (
    file_id TEXT PRIMARY KEY NOT NULL REFERENCES files(file_id),
    width INTEGER NOT NULL,
    height INTEGER NOT NULL,
    camera TEXT,
    latitude REAL,
    longitude REAL,
    taken_at INTEGER
)
"#;

/// SQL to create the audio side-metadata table
pub const CREATE_AUDIO_SIDECARS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS audio_sidecars (
    file_id TEXT PRIMARY KEY NOT NULL REFERENCES files(file_id),
    duration_secs REAL NOT NULL,
    codec TEXT,
    sample_rate INTEGER
)
"#;

/// Index on files path for watcher lookups
pub const CREATE_FILES_PATH_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_files_path
ON files(path)
"#;

/// Index on files status for extraction scans
pub const CREATE_FILES_STATUS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_files_status
ON files(status)
"#;

/// Index on chunks by parent file
pub const CREATE_CHUNKS_FILE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_chunks_file
ON chunks(file_id, ordinal)
"#;

/// Index on occurrences by normalized form
pub const CREATE_OCCURRENCES_NORMALIZED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_occurrences_normalized
ON entity_occurrences(normalized, entity_type)
"#;

/// Index on occurrences by parent file
pub const CREATE_OCCURRENCES_FILE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_occurrences_file
ON entity_occurrences(file_id)
"#;

/// Index on discoveries by confidence for ranked listings
pub const CREATE_DISCOVERIES_CONFIDENCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_discoveries_confidence
ON discoveries(confidence DESC)
"#;

/// Every statement needed for a fresh catalog
pub const ALL_STATEMENTS: &[&str] = &[
    CREATE_FILES_TABLE,
    CREATE_CHUNKS_TABLE,
    CREATE_OCCURRENCES_TABLE,
    CREATE_CONSOLIDATED_TABLE,
    CREATE_PATTERNS_TABLE,
    CREATE_DISCOVERIES_TABLE,
    CREATE_IMAGE_SIDECARS_TABLE,
    CREATE_AUDIO_SIDECARS_TABLE,
    CREATE_FILES_PATH_INDEX,
    CREATE_FILES_STATUS_INDEX,
    CREATE_CHUNKS_FILE_INDEX,
    CREATE_OCCURRENCES_NORMALIZED_INDEX,
    CREATE_OCCURRENCES_FILE_INDEX,
    CREATE_DISCOVERIES_CONFIDENCE_INDEX,
];
