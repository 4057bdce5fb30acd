use async_trait::async_trait;

use crate::db::actor::DbActorHandle;
use crate::db::models::{DbCountry, ReconcileSummary, RefreshBatch, StatusSnapshot};
use crate::error::MeridianError;

/// The persistence operations the refresh pipeline and summary renderer rely on.
#[async_trait]
pub trait CountryStore: Send + Sync {
    async fn apply_refresh(&self, batch: RefreshBatch)
    -> Result<ReconcileSummary, MeridianError>;

    async fn top_by_gdp(&self, limit: usize) -> Result<Vec<DbCountry>, MeridianError>;

    async fn status(&self) -> Result<StatusSnapshot, MeridianError>;
}

#[async_trait]
impl CountryStore for DbActorHandle {
    async fn apply_refresh(
        &self,
        batch: RefreshBatch,
    ) -> Result<ReconcileSummary, MeridianError> {
        DbActorHandle::apply_refresh(self, batch).await
    }

    async fn top_by_gdp(&self, limit: usize) -> Result<Vec<DbCountry>, MeridianError> {
        DbActorHandle::top_by_gdp(self, limit).await
    }

    async fn status(&self) -> Result<StatusSnapshot, MeridianError> {
        DbActorHandle::status(self).await
    }
}
