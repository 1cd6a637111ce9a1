use axum::response::{Html, IntoResponse};

/// Submission form: one required text field named `message` posted to `/publish`.
pub(crate) const FORM_HTML: &str = "<!doctype html><form method='POST' action='/publish'>\
<input required name='message' placeholder='Message'>\
<input type='submit' value='Publish'>\
</form>";

/// GET renders the message submission form.
pub async fn index() -> impl IntoResponse {
    Html(FORM_HTML)
}
