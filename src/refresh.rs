//! Refresh cycle: fetch both sources, estimate, reconcile, then re-render the summary.

use chrono::{DateTime, SubsecRound, Utc};
use meridian_schema::RefreshReportBody;
use serde::Serialize;
use std::{sync::Arc, time::Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::db::{CountryStore, RefreshBatch};
use crate::error::MeridianError;
use crate::estimator::GdpEstimator;
use crate::sources::CountrySource;
use crate::summary::SummaryRenderer;
use crate::utils::logging::with_pretty_json_debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    /// Records returned by the countries source.
    pub fetched: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub inserted: usize,
    pub updated: usize,
    pub refreshed_at: DateTime<Utc>,
    pub summary_rendered: bool,
}

impl From<RefreshReport> for RefreshReportBody {
    fn from(r: RefreshReport) -> Self {
        let message = if r.summary_rendered {
            "Country cache successfully refreshed and summary image generated."
        } else {
            "Country cache successfully refreshed; summary image will be rebuilt on demand."
        };
        RefreshReportBody {
            message: message.to_string(),
            fetched: r.fetched,
            accepted: r.accepted,
            rejected: r.rejected,
            inserted: r.inserted,
            updated: r.updated,
            summary_rendered: r.summary_rendered,
            last_refreshed_at: r.refreshed_at,
        }
    }
}

/// Runs refresh cycles, at most one at a time.
pub struct RefreshService {
    source: Arc<dyn CountrySource>,
    store: Arc<dyn CountryStore>,
    estimator: GdpEstimator,
    renderer: SummaryRenderer,
    in_flight: Mutex<()>,
}

impl RefreshService {
    pub fn new(
        source: Arc<dyn CountrySource>,
        store: Arc<dyn CountryStore>,
        estimator: GdpEstimator,
        renderer: SummaryRenderer,
    ) -> Self {
        Self {
            source,
            store,
            estimator,
            renderer,
            in_flight: Mutex::new(()),
        }
    }

    /// One full refresh cycle.
    ///
    /// A source failure returns before the store is touched. A store failure leaves the
    /// previous state intact. A failed summary render is reported, not raised: the data is
    /// already committed, no artifact exists for the new refresh stamp, and the image route
    /// rebuilds it on demand.
    pub async fn refresh(&self) -> Result<RefreshReport, MeridianError> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            warn!("Refresh rejected: another refresh is in flight");
            return Err(MeridianError::RefreshInProgress);
        };

        let start = Instant::now();
        let refreshed_at = Utc::now().trunc_subsecs(3);

        let countries = self.source.fetch_countries().await?;
        let rates = self.source.fetch_exchange_rates().await?;

        let estimated = self
            .estimator
            .estimate_batch(&countries, &rates, refreshed_at);
        let accepted = estimated.candidates.len();

        let applied = self
            .store
            .apply_refresh(RefreshBatch {
                refreshed_at,
                candidates: estimated.candidates,
            })
            .await
            .inspect_err(|e| error!(error = %e, "Refresh apply failed; transaction rolled back"))?;

        let summary_rendered = match self.renderer.render_from_store(self.store.as_ref()).await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "Error generating summary image");
                false
            }
        };

        let report = RefreshReport {
            fetched: countries.len(),
            accepted: accepted.saturating_sub(applied.skipped),
            rejected: estimated.rejected + applied.skipped,
            inserted: applied.inserted,
            updated: applied.updated,
            refreshed_at,
            summary_rendered,
        };

        info!(
            fetched = report.fetched,
            accepted = report.accepted,
            rejected = report.rejected,
            inserted = report.inserted,
            updated = report.updated,
            summary_rendered,
            took_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Refresh completed"
        );
        with_pretty_json_debug(&report, |pretty| debug!(report = %pretty, "Refresh report"));

        Ok(report)
    }
}
