use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use telemq::clock::{self, ClockSource, SntpClient};
use telemq::config::load_config;
use telemq::credentials::{self, CA_CERTIFICATE_TAG, CredentialStore};
use telemq::transport::TlsConnector;
use telemq::utils::logging;
use telemq::{Client, Result};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    logging::init(&settings.log.level);

    match run(settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "client stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: telemq::config::Settings) -> Result<()> {
    settings.validate()?;

    let clock = Arc::new(ClockSource::new());
    let sntp = SntpClient::new(
        settings.time.server.clone(),
        Duration::from_secs(settings.time.timeout_secs),
    );
    clock::synchronize(&sntp, &clock).await?;

    let mut store = CredentialStore::new();
    credentials::load_broker_ca(&mut store, &settings.tls)?;
    let connector = TlsConnector::new(&settings.tls, &store, &[CA_CERTIFICATE_TAG], clock)?;

    let mut client = Client::from_settings(&settings, connector)?;
    info!(
        host = %settings.broker.hostname,
        port = settings.broker.port,
        username = %settings.username(),
        "starting telemetry client"
    );

    let result = tokio::select! {
        result = client.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };
    client.shutdown().await;
    result
}
