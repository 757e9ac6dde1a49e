//! SQL schema for the Multa SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS articles (
    id          TEXT PRIMARY KEY,   -- hierarchical code, e.g. '13.3.A'
    group_code  INTEGER NOT NULL,
    title       TEXT NOT NULL,
    text        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS description_judgments (
    description_key TEXT PRIMARY KEY,   -- normalized description
    description     TEXT NOT NULL,
    article_ids     TEXT NOT NULL,      -- JSON array; '[]' means no article
    group_codes     TEXT NOT NULL,      -- JSON array, parallel to article_ids
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS location_judgments (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    jurisdiction_id    INTEGER NOT NULL,
    location           TEXT NOT NULL,
    location_key       TEXT NOT NULL,   -- normalized location
    canonical_location TEXT,
    lat                REAL,
    lng                REAL,
    is_electronic      INTEGER NOT NULL DEFAULT 0,
    method             TEXT NOT NULL,   -- 'gazetteer' | 'geocoder' | 'manual' | 'pending'
    confidence         TEXT,            -- 'exact' | 'interpolated' | 'approximate'
    notes              TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL,
    UNIQUE (jurisdiction_id, location_key),
    CHECK  ((lat IS NULL) = (lng IS NULL))
);

-- One cell per configured resolution for every resolved location.
CREATE TABLE IF NOT EXISTS location_cells (
    location_id INTEGER NOT NULL REFERENCES location_judgments(id) ON DELETE CASCADE,
    resolution  INTEGER NOT NULL,
    cell        TEXT NOT NULL,
    PRIMARY KEY (location_id, resolution)
);

-- Offense records are written by the acquisition collaborator; the core only
-- fills the enrichment columns (article_ids .. lng).
CREATE TABLE IF NOT EXISTS offenses (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    jurisdiction_id INTEGER NOT NULL,
    description     TEXT NOT NULL,
    description_key TEXT NOT NULL,
    location        TEXT NOT NULL,
    location_key    TEXT NOT NULL,
    occurred_at     TEXT NOT NULL,
    amount          REAL NOT NULL,
    article_ids     TEXT,
    article_codes   TEXT,
    location_id     INTEGER,
    lat             REAL,
    lng             REAL
);

CREATE INDEX IF NOT EXISTS location_cells_cell_idx    ON location_cells(resolution, cell);
CREATE INDEX IF NOT EXISTS offenses_description_idx   ON offenses(description_key);
CREATE INDEX IF NOT EXISTS offenses_location_idx      ON offenses(jurisdiction_id, location_key);
CREATE INDEX IF NOT EXISTS offenses_location_id_idx   ON offenses(location_id);
CREATE INDEX IF NOT EXISTS offenses_occurred_idx      ON offenses(occurred_at);

PRAGMA user_version = 1;
";
