use metrics_exporter_prometheus::PrometheusHandle;
use pa_intake::config::{AppConfig, ConfigError, MailTransport};
use pa_intake::error::AppError;
use pa_intake::integrations::{
    http_client, AvailityCoverageClient, AvailityTokenClient, BrevoMailer,
};
use pa_intake::workflows::accounts::{LogMailer, Mailer, StaticTokenProvider, TokenProvider};
use pa_intake::workflows::intake::EligibilityGateway;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Outbound adapters wired from configuration.
pub(crate) struct Adapters {
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) tokens: Arc<dyn TokenProvider>,
    pub(crate) eligibility: Arc<dyn EligibilityGateway>,
}

pub(crate) fn build_adapters(config: &AppConfig) -> Result<Adapters, AppError> {
    let http = http_client(config.intake.upstream_timeout)?;

    let mailer: Arc<dyn Mailer> = match config.mail.transport {
        MailTransport::Brevo => {
            let api_key = config
                .mail
                .api_key
                .clone()
                .ok_or(ConfigError::MissingSetting("BREVO_API_KEY"))?;
            Arc::new(BrevoMailer::new(http.clone(), api_key, &config.mail))
        }
        MailTransport::Log => Arc::new(LogMailer),
    };

    let tokens: Arc<dyn TokenProvider> = match &config.availity.static_token {
        Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        None => Arc::new(AvailityTokenClient::new(http.clone(), &config.availity)),
    };

    let eligibility = Arc::new(AvailityCoverageClient::new(http, &config.availity));

    Ok(Adapters {
        mailer,
        tokens,
        eligibility,
    })
}
