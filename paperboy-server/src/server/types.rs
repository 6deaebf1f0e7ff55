use serde::Serialize;

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PushResponse {
    pub(crate) topic: String,
    pub(crate) delivered: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubscribeResponse {
    pub(crate) topic: String,
    pub(crate) subscribed: bool,
}
