use crate::db::models::{DbCountry, ReconcileSummary, RefreshBatch, StatusSnapshot, name_key};
use crate::db::query::CountryQuery;
use crate::db::reconcile::{self, existing_names};
use crate::db::schema::{LAST_REFRESHED_AT_KEY, SQLITE_INIT};
use crate::error::MeridianError;
use chrono::{DateTime, Utc};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub enum DbActorMessage {
    /// Reconcile one refresh batch atomically.
    ApplyRefresh(
        RefreshBatch,
        RpcReplyPort<Result<ReconcileSummary, MeridianError>>,
    ),

    /// Filtered/sorted listing.
    ListCountries(CountryQuery, RpcReplyPort<Result<Vec<DbCountry>, MeridianError>>),

    /// Case-insensitive lookup by name.
    GetCountry(String, RpcReplyPort<Result<DbCountry, MeridianError>>),

    /// Case-insensitive delete by name.
    DeleteCountry(String, RpcReplyPort<Result<(), MeridianError>>),

    /// Highest estimated GDP first; rows without a GDP are skipped.
    TopByGdp(usize, RpcReplyPort<Result<Vec<DbCountry>, MeridianError>>),

    /// Row count plus the global refresh timestamp.
    Status(RpcReplyPort<Result<StatusSnapshot, MeridianError>>),
}

/// Cloneable persistence client; every call is serialized through the actor.
#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn apply_refresh(
        &self,
        batch: RefreshBatch,
    ) -> Result<ReconcileSummary, MeridianError> {
        ractor::call!(self.actor, DbActorMessage::ApplyRefresh, batch).map_err(|e| {
            MeridianError::RactorError(format!("DbActor ApplyRefresh RPC failed: {e}"))
        })?
    }

    pub async fn list_countries(
        &self,
        query: CountryQuery,
    ) -> Result<Vec<DbCountry>, MeridianError> {
        ractor::call!(self.actor, DbActorMessage::ListCountries, query).map_err(|e| {
            MeridianError::RactorError(format!("DbActor ListCountries RPC failed: {e}"))
        })?
    }

    pub async fn get_country(&self, name: &str) -> Result<DbCountry, MeridianError> {
        ractor::call!(self.actor, DbActorMessage::GetCountry, name.to_string()).map_err(|e| {
            MeridianError::RactorError(format!("DbActor GetCountry RPC failed: {e}"))
        })?
    }

    pub async fn delete_country(&self, name: &str) -> Result<(), MeridianError> {
        ractor::call!(self.actor, DbActorMessage::DeleteCountry, name.to_string()).map_err(
            |e| MeridianError::RactorError(format!("DbActor DeleteCountry RPC failed: {e}")),
        )?
    }

    pub async fn top_by_gdp(&self, limit: usize) -> Result<Vec<DbCountry>, MeridianError> {
        ractor::call!(self.actor, DbActorMessage::TopByGdp, limit).map_err(|e| {
            MeridianError::RactorError(format!("DbActor TopByGdp RPC failed: {e}"))
        })?
    }

    pub async fn status(&self) -> Result<StatusSnapshot, MeridianError> {
        ractor::call!(self.actor, DbActorMessage::Status)
            .map_err(|e| MeridianError::RactorError(format!("DbActor Status RPC failed: {e}")))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbActorMessage::ApplyRefresh(batch, reply) => {
                let res = reconcile::apply_refresh(&state.pool, &batch).await;
                let _ = reply.send(res);
            }
            DbActorMessage::ListCountries(query, reply) => {
                let res = self.list_countries(&state.pool, &query).await;
                let _ = reply.send(res);
            }
            DbActorMessage::GetCountry(name, reply) => {
                let res = self.get_country(&state.pool, &name).await;
                let _ = reply.send(res);
            }
            DbActorMessage::DeleteCountry(name, reply) => {
                let res = self.delete_country(&state.pool, &name).await;
                let _ = reply.send(res);
            }
            DbActorMessage::TopByGdp(limit, reply) => {
                let res = self.top_by_gdp(&state.pool, limit).await;
                let _ = reply.send(res);
            }
            DbActorMessage::Status(reply) => {
                let res = self.status(&state.pool).await;
                let _ = reply.send(res);
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn list_countries(
        &self,
        pool: &SqlitePool,
        query: &CountryQuery,
    ) -> Result<Vec<DbCountry>, MeridianError> {
        // ORDER BY is built from closed enums only; user text is always bound.
        let sql = format!(
            r#"
        SELECT id, name, capital, region, population, currency_code, exchange_rate, estimated_gdp, flag_url, last_refreshed_at
        FROM countries
        WHERE (?1 IS NULL OR instr(lower(region), lower(?1)) > 0)
          AND (?2 IS NULL OR upper(currency_code) = upper(?2))
        ORDER BY {}
        "#,
            query.sort.order_by_sql()
        );

        let rows = sqlx::query_as::<_, DbCountry>(&sql)
            .bind(query.region.as_deref())
            .bind(query.currency.as_deref())
            .fetch_all(pool)
            .await?;

        Ok(rows)
    }

    async fn get_country(&self, pool: &SqlitePool, name: &str) -> Result<DbCountry, MeridianError> {
        let Some(id) = find_id_by_name(pool, name).await? else {
            return Err(not_found(name));
        };

        let row = sqlx::query_as::<_, DbCountry>(
            r#"
        SELECT id, name, capital, region, population, currency_code, exchange_rate, estimated_gdp, flag_url, last_refreshed_at
        FROM countries
        WHERE id = ?
        "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.ok_or_else(|| not_found(name))
    }

    async fn delete_country(&self, pool: &SqlitePool, name: &str) -> Result<(), MeridianError> {
        let Some(id) = find_id_by_name(pool, name).await? else {
            return Err(not_found(name));
        };

        let affected = sqlx::query("DELETE FROM countries WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected();

        debug!(id, affected, name, "country delete applied");

        if affected == 0 {
            return Err(not_found(name));
        }
        Ok(())
    }

    async fn top_by_gdp(
        &self,
        pool: &SqlitePool,
        limit: usize,
    ) -> Result<Vec<DbCountry>, MeridianError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, DbCountry>(
            r#"
        SELECT id, name, capital, region, population, currency_code, exchange_rate, estimated_gdp, flag_url, last_refreshed_at
        FROM countries
        WHERE estimated_gdp IS NOT NULL
        ORDER BY estimated_gdp DESC, name ASC
        LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn status(&self, pool: &SqlitePool) -> Result<StatusSnapshot, MeridianError> {
        let total_countries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM countries")
            .fetch_one(pool)
            .await?;

        let last_refreshed_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT value FROM status WHERE key = ?")
                .bind(LAST_REFRESHED_AT_KEY)
                .fetch_optional(pool)
                .await?;

        Ok(StatusSnapshot {
            total_countries,
            last_refreshed_at,
        })
    }
}

/// Resolves a name with the same case folding the refresh reconciliation uses.
async fn find_id_by_name(pool: &SqlitePool, name: &str) -> Result<Option<i64>, MeridianError> {
    let mut conn = pool.acquire().await?;
    let key = name_key(name);
    let id = existing_names(&mut *conn)
        .await?
        .into_iter()
        .find(|(_, stored)| name_key(stored) == key)
        .map(|(id, _)| id);
    Ok(id)
}

fn not_found(name: &str) -> MeridianError {
    MeridianError::NotFound(format!("Country '{name}' not found"))
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, MeridianError> {
    // Unnamed: several stores may live in one process (tests, tools).
    let (actor, _jh) = Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| MeridianError::RactorError(format!("DbActor spawn failed: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), MeridianError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
