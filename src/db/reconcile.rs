//! The refresh apply: one transaction that updates matched rows in place, bulk-inserts new
//! ones and upserts the global status timestamp.

use ahash::{AHashMap, AHashSet};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::db::models::{CountryCandidate, ReconcileSummary, RefreshBatch, name_key};
use crate::db::schema::LAST_REFRESHED_AT_KEY;
use crate::error::MeridianError;

/// Rows per INSERT statement; 9 binds each keeps us under SQLite's variable limit.
const INSERT_CHUNK_ROWS: usize = 100;

pub(crate) async fn apply_refresh(
    pool: &SqlitePool,
    batch: &RefreshBatch,
) -> Result<ReconcileSummary, MeridianError> {
    // Dropped without commit on any early return => rollback.
    let mut tx = pool.begin().await?;

    let lookup = name_lookup(existing_names(&mut *tx).await?);
    let Partition {
        updates,
        inserts,
        duplicates,
    } = partition(&batch.candidates, &lookup);

    for candidate in &duplicates {
        warn!(
            name = %candidate.name,
            "Skipping country: name differs only in case from an earlier one in this batch"
        );
    }
    for (id, candidate) in &updates {
        update_in_place(&mut *tx, *id, candidate).await?;
    }
    bulk_insert(&mut *tx, &inserts).await?;
    upsert_status(&mut *tx, batch.refreshed_at).await?;

    tx.commit().await?;

    let summary = ReconcileSummary {
        inserted: inserts.len(),
        updated: updates.len(),
        skipped: duplicates.len(),
    };
    debug!(
        inserted = summary.inserted,
        updated = summary.updated,
        skipped = summary.skipped,
        refreshed_at = %batch.refreshed_at,
        "refresh batch committed"
    );
    Ok(summary)
}

/// All `(id, name)` pairs, oldest first.
pub(crate) async fn existing_names(
    conn: &mut SqliteConnection,
) -> Result<Vec<(i64, String)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String)>("SELECT id, name FROM countries ORDER BY id")
        .fetch_all(conn)
        .await
}

/// Case-folded name -> id. If stored names collide after folding, the oldest row wins.
pub(crate) fn name_lookup(rows: Vec<(i64, String)>) -> AHashMap<String, i64> {
    let mut lookup = AHashMap::with_capacity(rows.len());
    for (id, name) in rows {
        lookup.entry(name_key(&name)).or_insert(id);
    }
    lookup
}

/// How one batch maps onto the stored rows.
#[derive(Debug, Default)]
pub(crate) struct Partition<'a> {
    /// In-place updates, with the matched row id.
    pub updates: Vec<(i64, &'a CountryCandidate)>,
    pub inserts: Vec<&'a CountryCandidate>,
    /// Later case variants of a name already routed in this batch.
    pub duplicates: Vec<&'a CountryCandidate>,
}

/// Splits candidates into in-place updates and inserts. Each folded name is routed once;
/// the first occurrence in the batch wins.
pub(crate) fn partition<'a>(
    candidates: &'a [CountryCandidate],
    lookup: &AHashMap<String, i64>,
) -> Partition<'a> {
    let mut routed: AHashSet<String> = AHashSet::with_capacity(candidates.len());
    let mut out = Partition::default();
    for candidate in candidates {
        let key = name_key(&candidate.name);
        if !routed.insert(key.clone()) {
            out.duplicates.push(candidate);
            continue;
        }
        match lookup.get(&key) {
            Some(id) => out.updates.push((*id, candidate)),
            None => out.inserts.push(candidate),
        }
    }
    out
}

async fn update_in_place(
    conn: &mut SqliteConnection,
    id: i64,
    c: &CountryCandidate,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE countries
        SET
            name = ?,
            capital = ?,
            region = ?,
            population = ?,
            currency_code = ?,
            exchange_rate = ?,
            estimated_gdp = ?,
            flag_url = ?,
            last_refreshed_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&c.name)
    .bind(&c.capital)
    .bind(&c.region)
    .bind(c.population)
    .bind(&c.currency_code)
    .bind(c.exchange_rate)
    .bind(c.estimated_gdp)
    .bind(&c.flag_url)
    .bind(c.last_refreshed_at)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn bulk_insert(
    conn: &mut SqliteConnection,
    inserts: &[&CountryCandidate],
) -> Result<(), sqlx::Error> {
    for chunk in inserts.chunks(INSERT_CHUNK_ROWS) {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO countries (name, capital, region, population, currency_code, \
             exchange_rate, estimated_gdp, flag_url, last_refreshed_at) ",
        );
        qb.push_values(chunk, |mut row, c| {
            row.push_bind(c.name.clone())
                .push_bind(c.capital.clone())
                .push_bind(c.region.clone())
                .push_bind(c.population)
                .push_bind(c.currency_code.clone())
                .push_bind(c.exchange_rate)
                .push_bind(c.estimated_gdp)
                .push_bind(c.flag_url.clone())
                .push_bind(c.last_refreshed_at);
        });
        qb.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn upsert_status(
    conn: &mut SqliteConnection,
    refreshed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO status (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(LAST_REFRESHED_AT_KEY)
    .bind(refreshed_at)
    .execute(conn)
    .await?;
    Ok(())
}
