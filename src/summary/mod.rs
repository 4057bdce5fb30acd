//! Summary artifact: an SVG card of the top countries by estimated GDP, cached on disk.
//!
//! Each artifact is named after the refresh it was rendered for
//! (`summary-<refreshed_at millis>.svg`). Only the file matching the store's current
//! `last_refreshed_at` is ever served, so a refresh whose render failed or never ran can
//! not leave an older image in place.

mod svg;

use chrono::{DateTime, Utc};
use std::{io, path::PathBuf};
use tracing::{debug, error, info};

use crate::config::SummaryConfig;
use crate::db::{CountryStore, DbCountry, StatusSnapshot};
use crate::error::MeridianError;

const ARTIFACT_PREFIX: &str = "summary-";
const ARTIFACT_EXT: &str = ".svg";
pub const CONTENT_TYPE: &str = "image/svg+xml";

fn artifact_file_name(refreshed_at: DateTime<Utc>) -> String {
    format!(
        "{ARTIFACT_PREFIX}{}{ARTIFACT_EXT}",
        refreshed_at.timestamp_millis()
    )
}

/// Refresh stamp of an artifact file name, `None` for anything else in the directory.
fn artifact_stamp(file_name: &str) -> Option<i64> {
    file_name
        .strip_prefix(ARTIFACT_PREFIX)?
        .strip_suffix(ARTIFACT_EXT)?
        .parse()
        .ok()
}

#[derive(Debug, Clone)]
pub struct SummaryRenderer {
    cache_dir: PathBuf,
    top_n: usize,
}

impl SummaryRenderer {
    pub fn new(cfg: &SummaryConfig) -> Self {
        Self {
            cache_dir: cfg.cache_dir.clone(),
            top_n: cfg.top_n.max(1),
        }
    }

    /// Where the artifact for the refresh stamped `refreshed_at` lives.
    pub fn artifact_path(&self, refreshed_at: DateTime<Utc>) -> PathBuf {
        self.cache_dir.join(artifact_file_name(refreshed_at))
    }

    /// Renders and atomically writes the artifact for `refreshed_at`; returns its bytes.
    /// Artifacts of older refreshes are pruned afterwards.
    pub async fn render(
        &self,
        top: &[DbCountry],
        total_countries: i64,
        refreshed_at: DateTime<Utc>,
    ) -> Result<Vec<u8>, MeridianError> {
        let path = self.artifact_path(refreshed_at);
        let bytes = svg::render_summary_svg(top, total_countries, refreshed_at).into_bytes();
        self.write_artifact(refreshed_at, &bytes).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "Error writing summary image");
            MeridianError::RenderFailed(e.to_string())
        })?;

        info!(path = %path.display(), ranked = top.len(), "Summary image saved");

        if let Err(e) = self.prune_older_than(refreshed_at).await {
            debug!(error = %e, "Failed to prune old summary images");
        }
        Ok(bytes)
    }

    /// Renders from the store's current state.
    pub async fn render_from_store(
        &self,
        store: &dyn CountryStore,
    ) -> Result<Vec<u8>, MeridianError> {
        let status = store.status().await?;
        self.render_snapshot(store, status).await
    }

    /// Artifact bytes for the refresh stamped `refreshed_at`, or `None` if it was never
    /// rendered.
    pub async fn load(&self, refreshed_at: DateTime<Utc>) -> Result<Option<Vec<u8>>, MeridianError> {
        match tokio::fs::read(self.artifact_path(refreshed_at)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MeridianError::RenderFailed(format!(
                "failed to read summary artifact: {e}"
            ))),
        }
    }

    /// Serves the artifact of the latest committed refresh; when it is missing, rebuilds it
    /// once from the store.
    pub async fn load_or_rebuild(
        &self,
        store: &dyn CountryStore,
    ) -> Result<Vec<u8>, MeridianError> {
        let status = store.status().await?;
        if let Some(refreshed_at) = status.last_refreshed_at {
            if let Some(bytes) = self.load(refreshed_at).await? {
                return Ok(bytes);
            }
        }
        info!("Summary image missing; rebuilding from stored countries");
        self.render_snapshot(store, status).await
    }

    async fn render_snapshot(
        &self,
        store: &dyn CountryStore,
        status: StatusSnapshot,
    ) -> Result<Vec<u8>, MeridianError> {
        let Some(refreshed_at) = status.last_refreshed_at else {
            return Err(MeridianError::NotFound("Summary image not found".to_string()));
        };
        let top = store.top_by_gdp(self.top_n).await?;
        self.render(&top, status.total_countries, refreshed_at).await
    }

    async fn write_artifact(&self, refreshed_at: DateTime<Utc>, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        // Unique temp name: a refresh and an on-demand rebuild may write concurrently.
        let tmp = self.cache_dir.join(format!(
            "{}.{:016x}.tmp",
            artifact_file_name(refreshed_at),
            rand::random::<u64>()
        ));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, self.artifact_path(refreshed_at)).await
    }

    async fn prune_older_than(&self, refreshed_at: DateTime<Utc>) -> io::Result<()> {
        let current = refreshed_at.timestamp_millis();
        let mut entries = tokio::fs::read_dir(&self.cache_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stamp) = name.to_str().and_then(artifact_stamp) else {
                continue;
            };
            if stamp < current {
                tokio::fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}
