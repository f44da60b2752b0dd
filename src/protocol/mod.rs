//! LCDd text protocol
//!
//! Outbound commands and inbound responses are single newline terminated
//! lines. See the LCDproc developer guide for the full grammar; only the
//! client, menu and event parts are used here.

mod command;
mod response;
mod widget;

use log::warn;

pub use command::{Command, ItemAttribute};
pub use response::{MenuEvent, MenuEventKind, Response, ServerInfo};
pub use widget::{MenuResult, WidgetSpec};

const ACK: &str = "success";

/// Longest unterminated line kept between reads
pub const MAX_PENDING_LINE: usize = 8 * 1024;

/// Decode a buffer of complete lines
///
/// Empty fragments and bare `success` acknowledgements are dropped.
pub fn decode(buffer: &str) -> Vec<Response> {
    buffer
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty() && *line != ACK)
        .map(Response::parse)
        .collect()
}

/// Decode every complete line of `pending` and keep the unterminated rest
///
/// Socket reads may end in the middle of a line or of a UTF-8 sequence.
/// A rest longer than [`MAX_PENDING_LINE`] is discarded.
pub fn take_complete_lines(pending: &mut Vec<u8>) -> Vec<Response> {
    let responses = match pending.iter().rposition(|byte| *byte == b'\n') {
        Some(end) => {
            let complete: Vec<u8> = pending.drain(..=end).collect();
            decode(&String::from_utf8_lossy(&complete))
        }
        None => Vec::new(),
    };

    if pending.len() > MAX_PENDING_LINE {
        warn!("dropping {} bytes of unterminated input", pending.len());
        pending.clear();
    }

    responses
}
