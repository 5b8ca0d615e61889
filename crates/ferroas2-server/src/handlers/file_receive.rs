use axum::extract::{Request, State};
use axum::response::Response;

use super::{into_response, to_inbound};
use crate::state::AppState;

/// Accepts an AS2 file transmission. Any method is routed here so the receive
/// pipeline can reject it with a proper message.
pub async fn receive_file(State(state): State<AppState>, request: Request) -> Response {
    let inbound = match to_inbound(request, state.max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(response) => return response,
    };
    into_response(state.file_receiver.receive(inbound).await)
}
