//! HTTP middleware shared by the AS2 listeners.

mod request_id;

pub use request_id::{get_request_id, request_id_middleware, RequestId, REQUEST_ID_HEADER};
