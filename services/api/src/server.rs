use crate::cli::ServeArgs;
use crate::infra::{build_adapters, AppState};
use crate::routes::with_intake_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use pa_intake::config::AppConfig;
use pa_intake::error::AppError;
use pa_intake::telemetry;
use pa_intake::workflows::access::SessionResolver;
use pa_intake::workflows::accounts::{AccountService, AccountSettings, InMemoryAccountRepository};
use pa_intake::workflows::intake::{InMemorySubmissionRepository, IntakeService, IntakeState};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

const PRODUCT_NAME: &str = "PA Intake";

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let adapters = build_adapters(&config)?;

    let accounts = Arc::new(AccountService::new(
        Arc::new(InMemoryAccountRepository::new()),
        adapters.mailer,
        adapters.tokens,
        AccountSettings {
            confirm_url: config.intake.confirm_url.clone(),
            product_name: PRODUCT_NAME.to_string(),
            upstream_timeout: config.intake.upstream_timeout,
        },
    ));
    if let Some(seed) = &config.intake.admin {
        accounts.seed_admin(seed)?;
    }

    let intake = Arc::new(IntakeService::new(
        Arc::new(InMemorySubmissionRepository::new()),
        adapters.eligibility,
        config.intake.upstream_timeout,
    ));
    let sessions: Arc<dyn SessionResolver> = accounts.clone();
    let intake_state = IntakeState::new(intake, sessions, config.intake.require_session);

    let app = with_intake_routes(intake_state, accounts)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        mail = ?config.mail.transport,
        require_session = config.intake.require_session,
        "prior authorization intake ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
