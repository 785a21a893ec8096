use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

type Handler = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: [Handler; 8] = [
    handlers::core::try_handle,
    handlers::catalog::try_handle,
    handlers::setup::try_handle,
    handlers::pricing::try_handle,
    handlers::quotes::try_handle,
    handlers::records::try_handle,
    handlers::cashflow::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    let span = tracing::debug_span!("request", id = %req.id, method = %req.method);
    let _enter = span.enter();

    for handler in HANDLERS {
        if let Some(resp) = handler(state, &req) {
            if resp.get("ok").and_then(|v| v.as_bool()) == Some(false) {
                let code = resp
                    .pointer("/error/code")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                tracing::debug!(code, "request failed");
            }
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
