//! Wire address → variable key translation.
//!
//! `/ggo/state/mixbus/channel/fader` with args `[value, 3]` becomes
//! `mixbus_fader_ch3`: the `/ggo/state` prefix and `channel` segments are
//! dropped, the rest is joined with `_`, and channel-scoped addresses get the
//! channel index from argument 1.

use ggo_protocol::Arg;
use thiserror::Error;

/// Argument position holding the channel index on channel-scoped addresses.
pub const CHANNEL_ARG_INDEX: usize = 1;

const CHANNEL_SEGMENT: &str = "channel";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("{address}: channel address without a channel index argument")]
    MissingChannelIndex { address: String },
}

/// Translate a state address and its arguments into a variable key.
pub fn variable_key(address: &str, args: &[Arg]) -> Result<String, TranslateError> {
    let mut segments = address.split('/').peekable();

    // Absolute addresses carry the fixed /ggo/state prefix.
    if segments.next_if_eq(&"").is_some() {
        segments.next_if_eq(&"ggo");
        segments.next_if_eq(&"state");
    }

    let mut parts: Vec<&str> = Vec::new();
    while let Some(segment) = segments.next() {
        if segment == CHANNEL_SEGMENT {
            // An inline index after `channel` duplicates argument 1.
            segments.next_if(|next| is_index(next));
            continue;
        }
        parts.push(segment);
    }

    let mut key = parts.join("_");

    if address.contains("/channel/") {
        let channel = args
            .get(CHANNEL_ARG_INDEX)
            .and_then(Arg::value)
            .ok_or_else(|| TranslateError::MissingChannelIndex {
                address: address.to_string(),
            })?;
        key.push_str("_ch");
        key.push_str(&channel.to_string());
    }

    Ok(key)
}

/// Whether updates on this address arrive as continuous telemetry.
///
/// Matched on the raw address, not the translated key.
pub fn is_flooding(address: &str) -> bool {
    address.contains("level") || address.contains("gain")
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}
