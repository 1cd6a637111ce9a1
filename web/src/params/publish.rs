use serde::Deserialize;

/// Form fields submitted to `POST /publish`.
///
/// # Fields
///
/// * `message` - The text to publish. A missing field deserializes to an empty string,
///   which is still published.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PublishParams {
    #[serde(default)]
    pub(crate) message: String,
}
