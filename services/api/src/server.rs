use crate::cli::ServeArgs;
use crate::infra::{default_rule_catalog, AppState, InMemoryDocumentRepository, InMemoryRuleCatalog};
use crate::routes::with_completeness_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use formcheck::config::AppConfig;
use formcheck::error::AppError;
use formcheck::telemetry;
use formcheck::workflows::completeness::CompletenessService;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = match &config.checks.rules_path {
        Some(path) => {
            let catalog = InMemoryRuleCatalog::load(path)?;
            info!(path = %path.display(), rule_sets = catalog.len(), "loaded rule catalog");
            catalog
        }
        None => default_rule_catalog(),
    };

    let documents = Arc::new(InMemoryDocumentRepository::default());
    let service = Arc::new(CompletenessService::new(
        documents,
        Arc::new(catalog),
        config.checks.engine_settings(),
    ));

    let app = with_completeness_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        tolerance = %config.checks.tolerance,
        "form completeness service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
