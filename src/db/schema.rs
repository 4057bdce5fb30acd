//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// Key of the single global status row.
pub const LAST_REFRESHED_AT_KEY: &str = "last_refreshed_at";

/// SQLite schema includes:
/// - `countries` table (one row per country, `name` unique as stored)
/// - `status` table (keyed singletons; only `last_refreshed_at` today)
pub const SQLITE_INIT: &str = r#"
-- ---------------------------------------------------------------------------
-- Countries (merged directory + exchange-rate records)
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS countries (
    id INTEGER PRIMARY KEY NOT NULL,
    name TEXT NOT NULL UNIQUE,
    capital TEXT NULL,
    region TEXT NULL,
    population INTEGER NOT NULL CHECK (population >= 0),
    currency_code TEXT NULL,
    exchange_rate REAL NULL,
    estimated_gdp REAL NULL,
    flag_url TEXT NULL,
    last_refreshed_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_countries_estimated_gdp ON countries(estimated_gdp);

-- ---------------------------------------------------------------------------
-- Global status
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS status (
    id INTEGER PRIMARY KEY NOT NULL,
    key TEXT NOT NULL UNIQUE,
    value TEXT NOT NULL -- RFC3339
);
"#;
