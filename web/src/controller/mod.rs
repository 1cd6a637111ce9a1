pub(crate) mod form_controller;
pub(crate) mod publish_controller;
