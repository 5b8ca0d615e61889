use axum::extract::{Request, State};
use axum::response::Response;

use super::{into_response, to_inbound};
use crate::state::AppState;

/// Accepts an asynchronous MDN for a message sent earlier.
pub async fn receive_mdn(State(state): State<AppState>, request: Request) -> Response {
    let inbound = match to_inbound(request, state.max_body_bytes).await {
        Ok(inbound) => inbound,
        Err(response) => return response,
    };
    into_response(state.mdn_receiver.receive(inbound).await)
}
