//! OSC message model and datagram codec.
//!
//! Encoding is delegated to `rosc`; this module only narrows its packet model
//! to what the device speaks (flat messages with typed arguments).

use rosc::{OscMessage, OscPacket, OscType};
use thiserror::Error;

use crate::Value;
use crate::address::COMMAND_PREFIX;

/// Errors from encoding or decoding datagrams.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("failed to decode OSC datagram: {0}")]
    Decode(String),

    #[error("failed to encode OSC message for {address}: {reason}")]
    Encode { address: String, reason: String },
}

/// A typed OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bool(bool),
    Blob(Vec<u8>),
    Nil,
    /// An argument type the bridge does not interpret, by OSC type tag.
    Unsupported(char),
}

impl Arg {
    /// The argument as a variable value, if it carries a scalar.
    pub fn value(&self) -> Option<Value> {
        match self {
            Arg::Int(i) => Some(Value::from(*i)),
            Arg::Long(l) => Some(Value::Int(*l)),
            Arg::Float(f) => Some(Value::from(*f)),
            Arg::Double(d) => Some(Value::Float(*d)),
            Arg::String(s) => Some(Value::Text(s.clone())),
            Arg::Bool(b) => Some(Value::Bool(*b)),
            Arg::Blob(_) | Arg::Nil | Arg::Unsupported(_) => None,
        }
    }
}

impl From<OscType> for Arg {
    fn from(arg: OscType) -> Self {
        match arg {
            OscType::Int(i) => Arg::Int(i),
            OscType::Long(l) => Arg::Long(l),
            OscType::Float(f) => Arg::Float(f),
            OscType::Double(d) => Arg::Double(d),
            OscType::String(s) => Arg::String(s),
            OscType::Char(c) => Arg::String(c.to_string()),
            OscType::Bool(b) => Arg::Bool(b),
            OscType::Blob(b) => Arg::Blob(b),
            OscType::Nil => Arg::Nil,
            OscType::Inf => Arg::Unsupported('I'),
            OscType::Time(_) => Arg::Unsupported('t'),
            OscType::Color(_) => Arg::Unsupported('r'),
            OscType::Midi(_) => Arg::Unsupported('m'),
            OscType::Array(_) => Arg::Unsupported('['),
        }
    }
}

impl Arg {
    fn into_osc(self) -> Option<OscType> {
        match self {
            Arg::Int(i) => Some(OscType::Int(i)),
            Arg::Long(l) => Some(OscType::Long(l)),
            Arg::Float(f) => Some(OscType::Float(f)),
            Arg::Double(d) => Some(OscType::Double(d)),
            Arg::String(s) => Some(OscType::String(s)),
            Arg::Bool(b) => Some(OscType::Bool(b)),
            Arg::Blob(b) => Some(OscType::Blob(b)),
            Arg::Nil => Some(OscType::Nil),
            Arg::Unsupported(_) => None,
        }
    }
}

/// A single OSC message: an address and its ordered arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub address: String,
    pub args: Vec<Arg>,
}

impl Message {
    pub fn new(address: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Build a `/ggo/cmd/<name>` message with integer arguments.
    pub fn command(name: &str, values: &[i32]) -> Self {
        Self {
            address: format!("{COMMAND_PREFIX}{name}"),
            args: values.iter().copied().map(Arg::Int).collect(),
        }
    }

    /// Scalar value of the argument at `index`.
    pub fn arg_value(&self, index: usize) -> Option<Value> {
        self.args.get(index).and_then(Arg::value)
    }
}

/// Decode one UDP datagram into its messages.
///
/// Bundles are flattened depth-first, preserving element order.
pub fn decode(datagram: &[u8]) -> Result<Vec<Message>, ProtocolError> {
    let (_, packet) =
        rosc::decoder::decode_udp(datagram).map_err(|e| ProtocolError::Decode(format!("{e:?}")))?;

    let mut messages = Vec::new();
    flatten(packet, &mut messages);
    Ok(messages)
}

fn flatten(packet: OscPacket, out: &mut Vec<Message>) {
    match packet {
        OscPacket::Message(msg) => out.push(Message {
            address: msg.addr,
            args: msg.args.into_iter().map(Arg::from).collect(),
        }),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                flatten(inner, out);
            }
        }
    }
}

/// Encode a message as a single UDP datagram.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    let mut args = Vec::with_capacity(message.args.len());
    for arg in &message.args {
        match arg.clone().into_osc() {
            Some(osc) => args.push(osc),
            None => {
                return Err(ProtocolError::Encode {
                    address: message.address.clone(),
                    reason: format!("unsupported argument {arg:?}"),
                });
            }
        }
    }

    let packet = OscPacket::Message(OscMessage {
        addr: message.address.clone(),
        args,
    });
    rosc::encoder::encode(&packet).map_err(|e| ProtocolError::Encode {
        address: message.address.clone(),
        reason: format!("{e:?}"),
    })
}

#[cfg(test)]
mod tests {
    use rosc::{OscBundle, OscTime};

    use super::*;

    #[test]
    fn command_wraps_values_as_int_args() {
        let msg = Message::command("update", &[1]);
        assert_eq!(msg.address, "/ggo/cmd/update");
        assert_eq!(msg.args, vec![Arg::Int(1)]);
    }

    #[test]
    fn encoded_command_decodes_to_same_message() {
        let msg = Message::command("mute", &[1, 3]);
        let bytes = encode(&msg).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn bundle_is_flattened_in_order() {
        let first = OscMessage {
            addr: "/ggo/state/input/mute".to_string(),
            args: vec![OscType::Int(1)],
        };
        let second = OscMessage {
            addr: "/ggo/state/input/level".to_string(),
            args: vec![OscType::Float(0.5)],
        };
        let bundle = OscPacket::Bundle(OscBundle {
            timetag: OscTime {
                seconds: 0,
                fractional: 1,
            },
            content: vec![OscPacket::Message(first), OscPacket::Message(second)],
        });
        let bytes = rosc::encoder::encode(&bundle).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].address, "/ggo/state/input/mute");
        assert_eq!(decoded[1].address, "/ggo/state/input/level");
        assert_eq!(decoded[1].arg_value(0), Some(Value::Float(0.5)));
    }

    #[test]
    fn garbage_datagram_is_a_decode_error() {
        let result = decode(b"not osc");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn unsupported_arg_cannot_be_encoded() {
        let msg = Message::new("/ggo/cmd/x", vec![Arg::Unsupported('t')]);
        assert!(matches!(encode(&msg), Err(ProtocolError::Encode { .. })));
    }

    #[test]
    fn non_scalar_args_have_no_value() {
        assert_eq!(Arg::Nil.value(), None);
        assert_eq!(Arg::Blob(vec![1, 2]).value(), None);
        assert_eq!(Arg::Long(9).value(), Some(Value::Int(9)));
    }
}
