use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryStore, LoggingEventPublisher};
use crate::routes::router;
use commitments::config::AppConfig;
use commitments::error::AppError;
use commitments::telemetry;
use commitments::workflows::commitments::CommitmentAgreementService;
use commitments::workflows::datalock::DataLockTriageService;
use commitments::workflows::updates::ApprenticeshipUpdateService;
use commitments::workflows::{Clock, SystemClock};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));

    let store = Arc::new(InMemoryStore::default());
    let events = Arc::new(LoggingEventPublisher);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let agreements = Arc::new(CommitmentAgreementService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        events.clone(),
        clock.clone(),
    ));
    let updates = Arc::new(ApprenticeshipUpdateService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        events.clone(),
        clock,
    ));
    let triage = Arc::new(DataLockTriageService::new(
        store.clone(),
        store.clone(),
        store,
        events,
    ));

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        agreements,
        updates,
        triage,
    };

    let app = router(app_state).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "commitments workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
