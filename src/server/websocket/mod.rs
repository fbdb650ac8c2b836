//! WebSocket delivery of incremental appraisals.

mod handler;
mod messages;

pub use handler::appraisal_ws_handler;
pub use messages::{ClientMessage, ControlMessage};
