//! Google Cloud Pub/Sub clients.
//!
//! Both clients authenticate with Application Default Credentials, which read the
//! service account key file named by `GOOGLE_APPLICATION_CREDENTIALS` when the
//! client is built. A missing or invalid key file therefore fails construction.

use crate::error::{DomainErrorKind, Error, ExternalErrorKind};
use google_cloud_gax::error::rpc::Code;
use google_cloud_pubsub::client::{Publisher, TopicAdmin};
use google_cloud_pubsub::model::Message;
use log::*;

/// Fully qualified name of `topic_id` inside `project_id`.
pub fn topic_path(project_id: &str, topic_id: &str) -> String {
    format!("projects/{project_id}/topics/{topic_id}")
}

/// Builds the administrative client used for the topic existence check.
pub async fn topic_admin(endpoint: &str) -> Result<TopicAdmin, Error> {
    TopicAdmin::builder()
        .with_endpoint(endpoint)
        .build()
        .await
        .map_err(|err| {
            warn!("Failed to create Pub/Sub admin client: {err}");
            connection_error(err)
        })
}

/// Builds the publisher bound to `topic_path`.
///
/// Messages are sent as soon as they are submitted, one request per message,
/// instead of waiting to fill a batch.
pub async fn publisher(endpoint: &str, topic_path: &str) -> Result<Publisher, Error> {
    Publisher::builder(topic_path)
        .with_endpoint(endpoint)
        .set_message_count_threshold(1)
        .build()
        .await
        .map_err(|err| {
            warn!("Failed to create Pub/Sub publisher: {err}");
            connection_error(err)
        })
}

/// Checks whether `topic_path` exists.
///
/// Returns `Ok(false)` when the backend reports the topic as not found. A
/// permission failure means the topic isn't visible to these credentials and is
/// reported as `TopicNotFound`. Any other failure is `BackendUnavailable`.
pub async fn topic_exists(admin: &TopicAdmin, topic_path: &str) -> Result<bool, Error> {
    let err = match admin.get_topic().set_topic(topic_path).send().await {
        Ok(_) => return Ok(true),
        Err(err) => err,
    };

    let code = err.status().map(|status| status.code);
    let http_status = err.http_status_code();
    if code == Some(Code::NotFound) || http_status == Some(404) {
        return Ok(false);
    }

    warn!("Failed to look up topic {topic_path}: {err}");
    let error_kind = if code == Some(Code::PermissionDenied) || http_status == Some(403) {
        ExternalErrorKind::TopicNotFound
    } else {
        ExternalErrorKind::BackendUnavailable
    };
    Err(Error {
        source: Some(Box::new(err)),
        error_kind: DomainErrorKind::External(error_kind),
    })
}

/// Publishes `data` as a single message and waits for the server-assigned id.
pub async fn publish(publisher: &Publisher, data: Vec<u8>) -> Result<String, Error> {
    let message_id = publisher
        .publish(Message::new().set_data(data))
        .await
        .map_err(|err| {
            warn!("Failed to publish message: {err}");
            Error::from(err)
        })?;
    Ok(message_id)
}

fn connection_error(err: google_cloud_gax::client_builder::Error) -> Error {
    Error {
        source: Some(Box::new(err)),
        error_kind: DomainErrorKind::External(ExternalErrorKind::Connection),
    }
}
