//! Topic handle resolution and the publishing seam used by the web layer.
//!
//! A [`TopicHandle`] can only be obtained through [`resolve`], which confirms the
//! topic exists before returning. The handle is then shared read-only for the
//! lifetime of the process and released with [`TopicHandle::stop`] at shutdown.

use crate::credentials::CREDENTIALS_ENV;
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use crate::gateway::pubsub;
use async_trait::async_trait;
use google_cloud_pubsub::client::TopicAdmin;
use log::*;
use service::config::PublisherSettings;

/// Something that publishes single messages to one topic.
///
/// Each call is exactly one publish attempt: implementations either return the
/// server-assigned message id or an error.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `data` as one message and waits for the acknowledgment.
    async fn publish(&self, data: Vec<u8>) -> Result<String, Error>;

    /// Fully qualified name of the destination topic.
    fn topic_name(&self) -> String;
}

/// A validated handle to one existing topic.
pub struct TopicHandle {
    publisher: google_cloud_pubsub::client::Publisher,
    topic_path: String,
}

impl std::fmt::Debug for TopicHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("TopicHandle")
            .field("topic", &self.topic_path)
            .finish()
    }
}

impl TopicHandle {
    /// Waits for any in-flight messages to be sent, then releases the handle.
    pub async fn stop(self) {
        self.publisher.flush().await;
        info!("Stopped publishing to {}", self.topic_path);
    }
}

#[async_trait]
impl Publisher for TopicHandle {
    async fn publish(&self, data: Vec<u8>) -> Result<String, Error> {
        pubsub::publish(&self.publisher, data).await
    }

    fn topic_name(&self) -> String {
        self.topic_path.clone()
    }
}

/// Resolves the configured topic.
///
/// The clients read the key file named by `GOOGLE_APPLICATION_CREDENTIALS`.
///
/// Errors:
/// * `Connection` if the variable is unset, the key file is unreadable or
///   invalid, or a client can't be built,
/// * `BackendUnavailable` if the existence check can't be completed,
/// * `TopicNotFound` if the topic is absent or not visible.
pub async fn resolve(settings: &PublisherSettings) -> Result<TopicHandle, Error> {
    if std::env::var_os(CREDENTIALS_ENV).is_none() {
        warn!("{CREDENTIALS_ENV} is not set");
        return Err(Error::external(
            ExternalErrorKind::Connection,
            format!("{CREDENTIALS_ENV} is not set"),
        ));
    }

    let topic_path = pubsub::topic_path(&settings.project_id, &settings.topic_id);
    let admin = pubsub::topic_admin(&settings.base_url).await?;
    let publisher = pubsub::publisher(&settings.base_url, &topic_path).await?;
    info!("Created client for project {}", settings.project_id);

    resolve_with(&admin, publisher, topic_path).await
}

/// Checks that `topic_path` exists through `admin` and, if so, wraps `publisher`
/// in a [`TopicHandle`].
pub async fn resolve_with(
    admin: &TopicAdmin,
    publisher: google_cloud_pubsub::client::Publisher,
    topic_path: String,
) -> Result<TopicHandle, Error> {
    // The existence check requires the service account to hold a viewer role
    // on the topic.
    if !pubsub::topic_exists(admin, &topic_path).await? {
        error!("Couldn't find topic {topic_path}");
        return Err(Error {
            source: Some(format!("{topic_path} does not exist").into()),
            error_kind: DomainErrorKind::External(ExternalErrorKind::TopicNotFound),
        });
    }
    info!("Found topic {topic_path}");

    Ok(TopicHandle {
        publisher,
        topic_path,
    })
}
