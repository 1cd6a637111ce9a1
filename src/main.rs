use domain::credentials::CredentialFile;
use domain::error::{DomainErrorKind, Error, InternalErrorKind};
use domain::topic::{self, Publisher, TopicHandle};
use log::*;
use service::config::Config;
use service::logging::Logger;
use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;
use web::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::new();

    Logger::init_logger(&config);

    info!("Starting pubsub-publisher {}", env!("CARGO_PKG_VERSION"));

    // Every resource lives inside `run`, so the credential file is gone by the
    // time the exit code is returned, whichever way startup or serving ended.
    match run(config, web::shutdown_signal()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

/// Starts the publisher and serves requests until `shutdown` completes.
///
/// `shutdown` is watched from the very beginning, so a signal received while
/// startup is still in progress abandons startup and releases what it acquired.
async fn run<F>(config: Config, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut shutdown = Box::pin(shutdown);

    let (credential_file, topic) = tokio::select! {
        started = start(&config) => started?,
        _ = &mut shutdown => {
            warn!("Shutdown requested before the server started");
            return Err(Error::internal(
                InternalErrorKind::Other("startup interrupted".to_string()),
                "shutdown requested before the server started",
            ));
        }
    };
    let topic = Arc::new(topic);

    let served = web::init_server(AppState::new(config, topic.clone()), shutdown)
        .await
        .map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                "HTTP server failed".to_string(),
            )),
        });

    // The router and its state are dropped once the server stops.
    match Arc::try_unwrap(topic) {
        Ok(topic) => topic.stop().await,
        Err(topic) => warn!("{} still referenced at shutdown", topic.topic_name()),
    }
    drop(credential_file);

    served
}

/// Performs every fallible startup step before the HTTP port is bound: settings
/// resolution, credential staging and the topic existence check. On failure all
/// resources acquired so far, including the credential file, are released.
async fn start(config: &Config) -> Result<(CredentialFile, TopicHandle), Error> {
    let settings = config.publisher_settings()?;
    info!(
        "Publishing to topic {} in project {}",
        settings.topic_id, settings.project_id
    );

    let credential_file = CredentialFile::create(&settings.private_key_data)?;
    let topic = topic::resolve(&settings).await?;

    Ok((credential_file, topic))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use domain::credentials::CREDENTIALS_ENV;
    use domain::error::ExternalErrorKind;
    use mockito::{Server, ServerGuard};
    use serial_test::serial;
    use std::path::Path;
    use std::time::Duration;

    const TEST_PRIVATE_KEY: &str = include_str!("../testdata/service_account_key.pem");

    fn key_json() -> String {
        serde_json::json!({
            "type": "service_account",
            "project_id": "demo",
            "private_key_id": "test-key",
            "private_key": TEST_PRIVATE_KEY,
            "client_email": "publisher@demo.iam.gserviceaccount.com",
        })
        .to_string()
    }

    fn config(base_url: &str, key: &str) -> Config {
        Config::try_parse_from([
            "pubsub-publisher",
            "--project-id",
            "demo",
            "--topic-id",
            "greetings",
            "--private-key-data",
            key,
            "--pubsub-base-url",
            base_url,
        ])
        .unwrap()
    }

    async fn mock_topic(server: &mut ServerGuard, status: usize) -> mockito::Mock {
        server
            .mock("GET", "/v1/projects/demo/topics/greetings")
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(r#"{"name":"projects/demo/topics/greetings"}"#)
            .create_async()
            .await
    }

    #[tokio::test]
    #[serial]
    async fn test_start_resolves_topic_and_keeps_credentials_until_dropped() {
        let mut server = Server::new_async().await;
        let _topic = mock_topic(&mut server, 200).await;

        let (credential_file, topic) = start(&config(&server.url(), &key_json()))
            .await
            .unwrap();
        let path = credential_file.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(topic.topic_name(), "projects/demo/topics/greetings");

        topic.stop().await;
        drop(credential_file);
        assert!(!path.exists());
    }

    #[tokio::test]
    #[serial]
    async fn test_start_fails_when_topic_is_missing() {
        let mut server = Server::new_async().await;
        let _topic = mock_topic(&mut server, 404).await;

        let err = start(&config(&server.url(), &key_json()))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::TopicNotFound)
        );
        // The credential file guard was dropped on the way out.
        assert!(std::env::var_os(CREDENTIALS_ENV).is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_start_fails_on_malformed_credentials() {
        let server = Server::new_async().await;

        let err = start(&config(&server.url(), "definitely not a key"))
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Credential)
        );
        assert!(!err.to_string().contains("definitely not a key"));
        assert!(std::env::var_os(CREDENTIALS_ENV).is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_run_fails_before_serving_when_backend_fails() {
        let mut server = Server::new_async().await;
        let _topic = mock_topic(&mut server, 500).await;

        let err = run(config(&server.url(), &key_json()), std::future::pending())
            .await
            .unwrap_err();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::BackendUnavailable)
        );
        assert!(std::env::var_os(CREDENTIALS_ENV).is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_shutdown_during_startup_removes_credential_file() {
        // Accepts connections into the backlog but never answers, so the topic
        // existence check stays in flight.
        let unresponsive = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", unresponsive.local_addr().unwrap());

        let (staged_tx, staged_rx) = tokio::sync::oneshot::channel();
        let shutdown = async move {
            let staged = loop {
                if let Some(path) = std::env::var_os(CREDENTIALS_ENV) {
                    break path;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            };
            let _ = staged_tx.send(staged);
        };

        let err = tokio::time::timeout(
            Duration::from_secs(10),
            run(config(&base_url, &key_json()), shutdown),
        )
        .await
        .expect("startup should be interrupted by the shutdown signal")
        .unwrap_err();

        assert_eq!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Other(
                "startup interrupted".to_string()
            ))
        );
        let staged = staged_rx.await.unwrap();
        assert!(!Path::new(&staged).exists());
        assert!(std::env::var_os(CREDENTIALS_ENV).is_none());
    }
}
