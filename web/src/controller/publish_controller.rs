use crate::error::Result as WebResult;
use crate::params::publish::PublishParams;
use crate::AppState;
use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Form;
use log::*;

/// POST publishes the submitted `message` as a single Pub/Sub message.
///
/// Waits for the backend to acknowledge, then redirects (302) back to the form.
/// A failed publish returns 500 with the cause and does not redirect. A body that
/// isn't a form, or lacks the field, is published as an empty message.
///
/// If the client disconnects, this future is dropped and the in-flight publish
/// request is cancelled with it.
pub async fn create(
    State(app_state): State<AppState>,
    form: Result<Form<PublishParams>, FormRejection>,
) -> WebResult<impl IntoResponse> {
    let params = match form {
        Ok(Form(params)) => params,
        Err(rejection) => {
            warn!("Unreadable publish form, publishing an empty message: {rejection}");
            PublishParams::default()
        }
    };

    debug!(
        "Publishing {} byte message to {}",
        params.message.len(),
        app_state.publisher.topic_name()
    );

    let message_id = app_state
        .publisher
        .publish(params.message.into_bytes())
        .await?;

    info!("Published message ID={message_id}");

    Ok((StatusCode::FOUND, [(header::LOCATION, "/")]))
}
