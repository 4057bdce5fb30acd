use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use meridian::config::{SourcesConfig, SummaryConfig};
use meridian::db::{
    CountryStore, DbActorHandle, DbCountry, ReconcileSummary, RefreshBatch, StatusSnapshot,
};
use meridian::error::{ErrorKind, MeridianError};
use meridian::estimator::{FixedMultiplier, GdpEstimator};
use meridian::sources::{COUNTRIES_SOURCE, CountrySource, EXCHANGE_RATES_SOURCE, HttpCountrySource};
use meridian::summary::SummaryRenderer;
use meridian::RefreshService;
use meridian_schema::{RawCountry, RawRateTable, RefreshReportBody};
use serde_json::{Value, json};
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

fn unique_temp_path(prefix: &str, ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();

    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "meridian-{prefix}-{}-{}{ext}",
        std::process::id(),
        nanos
    ));
    temp_path
}

async fn spawn_db(prefix: &str) -> (DbActorHandle, PathBuf) {
    let db_path = unique_temp_path(prefix, ".sqlite");
    let database_url = format!("sqlite:{}", db_path.display());
    let db = meridian::db::spawn(&database_url).await.unwrap();
    (db, db_path)
}

/// Canned upstream: `None` bodies answer 500.
#[derive(Clone)]
struct StubUpstream {
    countries: Option<Value>,
    rates: Option<Value>,
    delay: Duration,
}

async fn stub_countries(State(stub): State<Arc<StubUpstream>>) -> Response {
    tokio::time::sleep(stub.delay).await;
    match &stub.countries {
        Some(body) => Json(body.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "directory down").into_response(),
    }
}

async fn stub_rates(State(stub): State<Arc<StubUpstream>>) -> Response {
    match &stub.rates {
        Some(body) => Json(body.clone()).into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "rates down").into_response(),
    }
}

async fn spawn_upstream(stub: StubUpstream) -> SocketAddr {
    let app = Router::new()
        .route("/countries", get(stub_countries))
        .route("/rates", get(stub_rates))
        .with_state(Arc::new(stub));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

fn sources_for(countries: SocketAddr, rates: SocketAddr) -> SourcesConfig {
    SourcesConfig {
        countries_url: format!("http://{countries}/countries").parse().unwrap(),
        rates_url: format!("http://{rates}/rates").parse().unwrap(),
        timeout_secs: 5,
        connect_timeout_secs: 2,
        ..Default::default()
    }
}

fn renderer(prefix: &str) -> SummaryRenderer {
    SummaryRenderer::new(&SummaryConfig {
        cache_dir: unique_temp_path(prefix, "-cache"),
        ..Default::default()
    })
}

fn service(
    source: Arc<dyn CountrySource>,
    db: &DbActorHandle,
    estimator: GdpEstimator,
    summary: SummaryRenderer,
) -> RefreshService {
    RefreshService::new(source, Arc::new(db.clone()), estimator, summary)
}

fn testland_countries() -> Value {
    json!([
        {
            "name": "Testland",
            "capital": "Test City",
            "region": "Testregion",
            "population": 1000,
            "flag": "https://flags.test/tst.svg",
            "currencies": [{ "code": "TST", "name": "Test dollar", "symbol": "T$" }]
        },
        {
            "name": "Nocoin",
            "region": "Testregion",
            "population": 50,
            "currencies": []
        },
        {
            "name": "Ghost",
            "population": 0
        }
    ])
}

fn testland_rates() -> Value {
    json!({ "result": "success", "base_code": "USD", "rates": { "USD": 1.0, "TST": 10.0 } })
}

#[tokio::test]
async fn refresh_persists_estimates_and_renders_summary() {
    let (db, db_path) = spawn_db("pipeline-ok").await;
    let addr = spawn_upstream(StubUpstream {
        countries: Some(testland_countries()),
        rates: Some(testland_rates()),
        delay: Duration::ZERO,
    })
    .await;
    let summary = renderer("pipeline-ok");
    let source = Arc::new(HttpCountrySource::new(&sources_for(addr, addr)).unwrap());
    let svc = service(source, &db, GdpEstimator::default(), summary.clone());

    let report = svc.refresh().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.updated, 0);
    assert!(report.summary_rendered);

    let testland = db.get_country("testland").await.unwrap();
    assert_eq!(testland.currency_code.as_deref(), Some("TST"));
    assert_eq!(testland.exchange_rate, Some(10.0));
    let gdp = testland.estimated_gdp.unwrap();
    assert!((100_000.0..=200_000.0).contains(&gdp), "gdp {gdp} out of band");
    assert_eq!(testland.last_refreshed_at, report.refreshed_at);

    let nocoin = db.get_country("Nocoin").await.unwrap();
    assert_eq!(nocoin.currency_code, None);
    assert_eq!(nocoin.exchange_rate, None);
    assert_eq!(nocoin.estimated_gdp, None);

    let status = db.status().await.unwrap();
    assert_eq!(status.total_countries, 2);
    assert_eq!(status.last_refreshed_at, Some(report.refreshed_at));

    let svg = String::from_utf8(
        summary
            .load(report.refreshed_at)
            .await
            .unwrap()
            .expect("artifact written"),
    )
    .unwrap();
    assert!(svg.contains("Total Countries: <tspan font-weight=\"600\">2</tspan>"));
    assert!(svg.contains("Testland"));

    let _ = std::fs::remove_file(&db_path);
    let _ = std::fs::remove_file(summary.artifact_path(report.refreshed_at));
}

#[tokio::test]
async fn repeated_refresh_keeps_identity() {
    let (db, db_path) = spawn_db("pipeline-repeat").await;
    let addr = spawn_upstream(StubUpstream {
        countries: Some(testland_countries()),
        rates: Some(testland_rates()),
        delay: Duration::ZERO,
    })
    .await;
    let source = Arc::new(HttpCountrySource::new(&sources_for(addr, addr)).unwrap());
    let svc = service(
        source,
        &db,
        GdpEstimator::new(FixedMultiplier(1500)),
        renderer("pipeline-repeat"),
    );

    svc.refresh().await.unwrap();
    let first = db.get_country("Testland").await.unwrap();
    assert_eq!(first.estimated_gdp, Some(150_000.0));

    let report = svc.refresh().await.unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 2);

    let second = db.get_country("Testland").await.unwrap();
    assert_eq!(second.id, first.id);
    assert!(second.last_refreshed_at >= first.last_refreshed_at);
    assert_eq!(db.status().await.unwrap().total_countries, 2);

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn unreachable_countries_source_leaves_store_untouched() {
    let (db, db_path) = spawn_db("pipeline-down").await;
    let rates = spawn_upstream(StubUpstream {
        countries: None,
        rates: Some(testland_rates()),
        delay: Duration::ZERO,
    })
    .await;
    let source = Arc::new(HttpCountrySource::new(&sources_for(dead_addr().await, rates)).unwrap());
    let summary = renderer("pipeline-down");
    let svc = service(source, &db, GdpEstimator::default(), summary.clone());

    let err = svc.refresh().await.unwrap_err();
    assert!(matches!(
        err,
        MeridianError::SourceUnavailable { source_name } if source_name == COUNTRIES_SOURCE
    ));
    assert_eq!(err.kind().status().as_u16(), 503);

    let status = db.status().await.unwrap();
    assert_eq!(status.total_countries, 0);
    assert_eq!(status.last_refreshed_at, None);
    assert_eq!(
        summary.load_or_rebuild(&db).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn failing_rates_source_names_exchange_rates() {
    let (db, db_path) = spawn_db("pipeline-rates").await;
    let addr = spawn_upstream(StubUpstream {
        countries: Some(testland_countries()),
        rates: None,
        delay: Duration::ZERO,
    })
    .await;
    let source = Arc::new(HttpCountrySource::new(&sources_for(addr, addr)).unwrap());
    let svc = service(source, &db, GdpEstimator::default(), renderer("pipeline-rates"));

    let err = svc.refresh().await.unwrap_err();
    assert!(matches!(
        err,
        MeridianError::SourceUnavailable { source_name } if source_name == EXCHANGE_RATES_SOURCE
    ));
    let body = serde_json::to_value(err.to_body()).unwrap();
    assert_eq!(body["error"]["code"], "SOURCE_UNAVAILABLE");
    assert_eq!(
        body["error"]["details"],
        "Could not fetch data from exchange_rates"
    );

    assert_eq!(db.status().await.unwrap().total_countries, 0);

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn malformed_or_empty_directory_is_unavailable() {
    let (db, db_path) = spawn_db("pipeline-shape").await;

    for countries in [json!({ "not": "a list" }), json!([])] {
        let addr = spawn_upstream(StubUpstream {
            countries: Some(countries),
            rates: Some(testland_rates()),
            delay: Duration::ZERO,
        })
        .await;
        let source = Arc::new(HttpCountrySource::new(&sources_for(addr, addr)).unwrap());
        let svc = service(source, &db, GdpEstimator::default(), renderer("pipeline-shape"));

        let err = svc.refresh().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    }

    assert_eq!(db.status().await.unwrap().last_refreshed_at, None);

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn overlapping_refresh_is_rejected() {
    let (db, db_path) = spawn_db("pipeline-overlap").await;
    let addr = spawn_upstream(StubUpstream {
        countries: Some(testland_countries()),
        rates: Some(testland_rates()),
        delay: Duration::from_millis(500),
    })
    .await;
    let source = Arc::new(HttpCountrySource::new(&sources_for(addr, addr)).unwrap());
    let svc = service(source, &db, GdpEstimator::default(), renderer("pipeline-overlap"));

    let (first, second) = tokio::join!(svc.refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        svc.refresh().await
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err().kind(), ErrorKind::RefreshInProgress);

    // Once the first one finishes the lock is free again.
    svc.refresh().await.unwrap();

    let _ = std::fs::remove_file(&db_path);
}

/// Counts calls; countries always fail.
#[derive(Default)]
struct ScriptedSource {
    countries_calls: AtomicUsize,
    rates_calls: AtomicUsize,
}

#[async_trait]
impl CountrySource for ScriptedSource {
    async fn fetch_countries(&self) -> Result<Vec<RawCountry>, MeridianError> {
        self.countries_calls.fetch_add(1, Ordering::SeqCst);
        Err(MeridianError::SourceUnavailable {
            source_name: COUNTRIES_SOURCE,
        })
    }

    async fn fetch_exchange_rates(&self) -> Result<RawRateTable, MeridianError> {
        self.rates_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawRateTable::default())
    }
}

#[tokio::test]
async fn rates_are_not_fetched_after_countries_fail() {
    let (db, db_path) = spawn_db("pipeline-scripted").await;
    let source = Arc::new(ScriptedSource::default());
    let svc = service(
        source.clone(),
        &db,
        GdpEstimator::default(),
        renderer("pipeline-scripted"),
    );

    let err = svc.refresh().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
    assert_eq!(source.countries_calls.load(Ordering::SeqCst), 1);
    assert_eq!(source.rates_calls.load(Ordering::SeqCst), 0);

    let store: &dyn CountryStore = &db;
    assert_eq!(store.status().await.unwrap().last_refreshed_at, None);

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn hung_countries_source_times_out_as_unavailable() {
    let (db, db_path) = spawn_db("pipeline-hung").await;
    let addr = spawn_upstream(StubUpstream {
        countries: Some(testland_countries()),
        rates: Some(testland_rates()),
        delay: Duration::from_secs(4),
    })
    .await;
    let cfg = SourcesConfig {
        timeout_secs: 1,
        ..sources_for(addr, addr)
    };
    let source = Arc::new(HttpCountrySource::new(&cfg).unwrap());
    let svc = service(source, &db, GdpEstimator::default(), renderer("pipeline-hung"));

    let started = std::time::Instant::now();
    let err = svc.refresh().await.unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(3), "client timeout not applied");
    assert!(matches!(
        err,
        MeridianError::SourceUnavailable { source_name } if source_name == COUNTRIES_SOURCE
    ));

    let status = db.status().await.unwrap();
    assert_eq!(status.total_countries, 0);
    assert_eq!(status.last_refreshed_at, None);

    let _ = std::fs::remove_file(&db_path);
}

/// Delegates to the real store; the GDP ranking fails while `fail_ranking` is set.
struct FlakyRankingStore {
    inner: DbActorHandle,
    fail_ranking: AtomicBool,
}

#[async_trait]
impl CountryStore for FlakyRankingStore {
    async fn apply_refresh(
        &self,
        batch: RefreshBatch,
    ) -> Result<ReconcileSummary, MeridianError> {
        self.inner.apply_refresh(batch).await
    }

    async fn top_by_gdp(&self, limit: usize) -> Result<Vec<DbCountry>, MeridianError> {
        if self.fail_ranking.load(Ordering::SeqCst) {
            return Err(MeridianError::UnexpectedError("ranking unavailable".to_string()));
        }
        self.inner.top_by_gdp(limit).await
    }

    async fn status(&self) -> Result<StatusSnapshot, MeridianError> {
        self.inner.status().await
    }
}

fn country_json(name: &str) -> Value {
    json!({
        "name": name,
        "population": 1000,
        "currencies": [{ "code": "TST" }]
    })
}

#[tokio::test]
async fn failed_render_never_serves_previous_refresh_image() {
    let (db, db_path) = spawn_db("pipeline-stale").await;
    let store = Arc::new(FlakyRankingStore {
        inner: db.clone(),
        fail_ranking: AtomicBool::new(false),
    });
    let summary = renderer("pipeline-stale");

    let one = spawn_upstream(StubUpstream {
        countries: Some(json!([country_json("Alpha")])),
        rates: Some(testland_rates()),
        delay: Duration::ZERO,
    })
    .await;
    let two = spawn_upstream(StubUpstream {
        countries: Some(json!([country_json("Alpha"), country_json("Bravo")])),
        rates: Some(testland_rates()),
        delay: Duration::ZERO,
    })
    .await;

    let first = RefreshService::new(
        Arc::new(HttpCountrySource::new(&sources_for(one, one)).unwrap()),
        store.clone(),
        GdpEstimator::default(),
        summary.clone(),
    )
    .refresh()
    .await
    .unwrap();
    assert!(first.summary_rendered);

    store.fail_ranking.store(true, Ordering::SeqCst);
    let second = RefreshService::new(
        Arc::new(HttpCountrySource::new(&sources_for(two, two)).unwrap()),
        store.clone(),
        GdpEstimator::default(),
        summary.clone(),
    )
    .refresh()
    .await
    .unwrap();
    assert!(!second.summary_rendered);
    assert!(second.refreshed_at > first.refreshed_at);
    assert!(
        RefreshReportBody::from(second)
            .message
            .contains("rebuilt on demand")
    );
    assert_eq!(db.status().await.unwrap().total_countries, 2);

    store.fail_ranking.store(false, Ordering::SeqCst);
    let svg = String::from_utf8(summary.load_or_rebuild(store.as_ref()).await.unwrap()).unwrap();
    assert!(svg.contains("Bravo"));
    assert!(svg.contains("Total Countries: <tspan font-weight=\"600\">2</tspan>"));

    // The rebuild replaced the older artifact.
    assert!(summary.artifact_path(second.refreshed_at).is_file());
    assert!(!summary.artifact_path(first.refreshed_at).exists());

    let _ = std::fs::remove_file(&db_path);
    let _ = std::fs::remove_file(summary.artifact_path(second.refreshed_at));
}
