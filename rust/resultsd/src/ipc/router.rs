use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLER_FAMILIES: [TryHandle; 12] = [
    handlers::core::try_handle,
    handlers::classes::try_handle,
    handlers::students::try_handle,
    handlers::subjects::try_handle,
    handlers::scores::try_handle,
    handlers::psychomotor::try_handle,
    handlers::attendance::try_handle,
    handlers::comments::try_handle,
    handlers::grading::try_handle,
    handlers::ranking::try_handle,
    handlers::reports::try_handle,
    handlers::promotion::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    for try_handle in HANDLER_FAMILIES {
        if let Some(resp) = try_handle(state, &req) {
            return resp;
        }
    }

    tracing::warn!(method = %req.method, "unknown method");
    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
