//! Structured wire messages.
//!
//! Every message is a self-describing JSON envelope: a type discriminator
//! plus a typed payload. A decoder that meets a tag it does not know, or a
//! payload that lacks a required field, rejects the whole message instead
//! of guessing.
//!
//! # Format
//!
//! ```json
//! { "type": "webTap", "payload": { "normalizedX": 0.25, "normalizedY": 0.75 } }
//! ```
//!
//! # Variants
//!
//! | Tag | Direction | Purpose |
//! |-----|-----------|---------|
//! | `hello` | initiator → peer | Role, protocol version, capabilities |
//! | `ping` / `pong` | both | Round-trip latency probe |
//! | `modeSet` | both | Active interaction mode |
//! | `webTap` | phone → headset | Tap at a normalized viewport point |
//! | `webScroll` | phone → headset | Relative scroll delta in points |
//! | `webHoverTap` | phone → headset | Activate the gaze-hovered element |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Version of the structured protocol announced in [`WireMessage::Hello`].
pub const PROTOCOL_VERSION: u32 = 2;

// ============================================================================
// DeviceRole
// ============================================================================

/// Which side of the pairing a device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeviceRole {
    /// The headset running the experiment.
    VisionHeadset,
    /// The phone acting as remote controller.
    Phone,
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VisionHeadset => write!(f, "visionHeadset"),
            Self::Phone => write!(f, "phone"),
        }
    }
}

// ============================================================================
// InteractionMode
// ============================================================================

/// Interaction technique under study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionMode {
    /// Touch the panel directly.
    #[default]
    DirectTouch,
    /// Gaze plus pinch.
    Pinch,
    /// Gaze plus the phone as remote controller.
    #[serde(alias = "phonaze")]
    RemotePhone,
}

impl InteractionMode {
    /// Returns the label used in logs and exports.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DirectTouch => "directTouch",
            Self::Pinch => "pinch",
            Self::RemotePhone => "remotePhone",
        }
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// WireMessage
// ============================================================================

/// Structured message exchanged between the paired devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", deny_unknown_fields)]
pub enum WireMessage {
    /// Sent once per new connection to announce role and feature flags.
    #[serde(rename = "hello")]
    Hello {
        /// Role of the sending device.
        role: DeviceRole,
        /// Structured protocol version of the sender.
        #[serde(rename = "protocolVersion")]
        protocol_version: u32,
        /// Feature flags understood by the sender.
        capabilities: Vec<String>,
    },

    /// Latency probe. Answered with a [`WireMessage::Pong`] echoing `timestamp`.
    #[serde(rename = "ping")]
    Ping {
        /// Sender clock in milliseconds since the Unix epoch.
        timestamp: u64,
    },

    /// Reply to [`WireMessage::Ping`].
    #[serde(rename = "pong")]
    Pong {
        /// Timestamp echoed from the ping.
        timestamp: u64,
    },

    /// Announces the active interaction mode.
    #[serde(rename = "modeSet")]
    ModeSet {
        /// The mode now in effect.
        mode: InteractionMode,
    },

    /// Tap at a point relative to the remote viewport.
    #[serde(rename = "webTap")]
    WebTap {
        /// Horizontal position in `[0, 1]`.
        #[serde(rename = "normalizedX")]
        normalized_x: f64,
        /// Vertical position in `[0, 1]`.
        #[serde(rename = "normalizedY")]
        normalized_y: f64,
    },

    /// Relative scroll in points.
    #[serde(rename = "webScroll")]
    WebScroll {
        /// Horizontal delta.
        #[serde(rename = "deltaX")]
        delta_x: f64,
        /// Vertical delta.
        #[serde(rename = "deltaY")]
        delta_y: f64,
    },

    /// Activate whatever is currently gaze-hovered. Carries no coordinates.
    #[serde(rename = "webHoverTap")]
    HoverTap {},
}

impl WireMessage {
    /// Creates a hello for the current protocol version.
    #[must_use]
    pub fn hello<I, S>(role: DeviceRole, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Hello {
            role,
            protocol_version: PROTOCOL_VERSION,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a tap, clamping both coordinates into `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn web_tap(x: f64, y: f64) -> Self {
        Self::WebTap {
            normalized_x: x.clamp(0.0, 1.0),
            normalized_y: y.clamp(0.0, 1.0),
        }
    }

    /// Returns the envelope tag of this variant.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::ModeSet { .. } => "modeSet",
            Self::WebTap { .. } => "webTap",
            Self::WebScroll { .. } => "webScroll",
            Self::HoverTap {} => "webHoverTap",
        }
    }

    /// Checks value ranges that the schema alone cannot express.
    fn validate(&self) -> Result<()> {
        match *self {
            Self::WebTap {
                normalized_x,
                normalized_y,
            } => {
                let in_unit = |v: f64| (0.0..=1.0).contains(&v);
                if !in_unit(normalized_x) || !in_unit(normalized_y) {
                    return Err(Error::decode(format!(
                        "webTap point ({normalized_x}, {normalized_y}) outside [0,1]"
                    )));
                }
                Ok(())
            }
            Self::WebScroll { delta_x, delta_y } => {
                if !delta_x.is_finite() || !delta_y.is_finite() {
                    return Err(Error::decode("webScroll delta is not finite"));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

// ============================================================================
// Codec
// ============================================================================

/// Encodes a message into its JSON envelope.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails (non-finite floats).
pub fn encode(message: &WireMessage) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Decodes a JSON envelope into exactly one message variant.
///
/// # Errors
///
/// Returns [`Error::Decode`] for anything that is not a complete, valid
/// envelope. Never returns a partially populated message.
pub fn decode(bytes: &[u8]) -> Result<WireMessage> {
    let message: WireMessage =
        serde_json::from_slice(bytes).map_err(|e| Error::decode(e.to_string()))?;
    message.validate()?;
    Ok(message)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_envelope_format() {
        let json = String::from_utf8(encode(&WireMessage::web_tap(0.25, 0.75)).expect("encode"))
            .expect("utf8");
        assert_eq!(
            json,
            r#"{"type":"webTap","payload":{"normalizedX":0.25,"normalizedY":0.75}}"#
        );
    }

    #[test]
    fn test_hover_tap_has_empty_payload() {
        let json =
            String::from_utf8(encode(&WireMessage::HoverTap {}).expect("encode")).expect("utf8");
        assert_eq!(json, r#"{"type":"webHoverTap","payload":{}}"#);
        assert_eq!(decode(json.as_bytes()).expect("decode"), WireMessage::HoverTap {});
    }

    #[test]
    fn test_hello_fields() {
        let json = r#"{"type":"hello","payload":{"role":"phone","protocolVersion":2,"capabilities":["hoverTap"]}}"#;
        match decode(json.as_bytes()).expect("decode") {
            WireMessage::Hello {
                role,
                protocol_version,
                capabilities,
            } => {
                assert_eq!(role, DeviceRole::Phone);
                assert_eq!(protocol_version, 2);
                assert_eq!(capabilities, vec!["hoverTap".to_string()]);
            }
            other => panic!("expected hello, got {other:?}"),
        }
    }

    #[test]
    fn test_legacy_mode_alias() {
        let json = r#"{"type":"modeSet","payload":{"mode":"phonaze"}}"#;
        assert_eq!(
            decode(json.as_bytes()).expect("decode"),
            WireMessage::ModeSet {
                mode: InteractionMode::RemotePhone
            }
        );
    }

    #[test]
    fn test_not_json_is_decode_error() {
        let err = decode(b"not json").unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = decode(br#"{"type":"teleport","payload":{}}"#).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_missing_field_is_rejected() {
        let err = decode(br#"{"type":"webScroll","payload":{"deltaX":1.0}}"#).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let err = decode(br#"{"type":"ping","payload":{"timestamp":"soon"}}"#).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_extra_envelope_key_is_rejected() {
        let err =
            decode(br#"{"type":"ping","payload":{"timestamp":1},"version":9}"#).unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_tap_outside_unit_square_is_rejected() {
        let err = decode(br#"{"type":"webTap","payload":{"normalizedX":1.5,"normalizedY":0.5}}"#)
            .unwrap_err();
        assert!(err.is_decode_error());
    }

    #[test]
    fn test_web_tap_constructor_clamps() {
        assert_eq!(
            WireMessage::web_tap(-0.2, 3.0),
            WireMessage::WebTap {
                normalized_x: 0.0,
                normalized_y: 1.0
            }
        );
    }

    #[test]
    fn test_tag_matches_serialized_type() {
        let messages = [
            WireMessage::hello(DeviceRole::VisionHeadset, ["hoverTap"]),
            WireMessage::Ping { timestamp: 1 },
            WireMessage::Pong { timestamp: 1 },
            WireMessage::ModeSet {
                mode: InteractionMode::Pinch,
            },
            WireMessage::web_tap(0.5, 0.5),
            WireMessage::WebScroll {
                delta_x: 0.0,
                delta_y: -3.0,
            },
            WireMessage::HoverTap {},
        ];
        for message in messages {
            let value: serde_json::Value =
                serde_json::from_slice(&encode(&message).expect("encode")).expect("json");
            assert_eq!(value["type"], message.tag());
        }
    }

    fn arb_mode() -> impl Strategy<Value = InteractionMode> {
        prop_oneof![
            Just(InteractionMode::DirectTouch),
            Just(InteractionMode::Pinch),
            Just(InteractionMode::RemotePhone),
        ]
    }

    fn arb_role() -> impl Strategy<Value = DeviceRole> {
        prop_oneof![Just(DeviceRole::VisionHeadset), Just(DeviceRole::Phone)]
    }

    fn arb_message() -> impl Strategy<Value = WireMessage> {
        prop_oneof![
            (arb_role(), any::<u32>(), prop::collection::vec("[a-zA-Z]{1,12}", 0..4)).prop_map(
                |(role, protocol_version, capabilities)| WireMessage::Hello {
                    role,
                    protocol_version,
                    capabilities,
                }
            ),
            any::<u64>().prop_map(|timestamp| WireMessage::Ping { timestamp }),
            any::<u64>().prop_map(|timestamp| WireMessage::Pong { timestamp }),
            arb_mode().prop_map(|mode| WireMessage::ModeSet { mode }),
            (0.0f64..=1.0, 0.0f64..=1.0).prop_map(|(normalized_x, normalized_y)| {
                WireMessage::WebTap {
                    normalized_x,
                    normalized_y,
                }
            }),
            (-1.0e6f64..1.0e6, -1.0e6f64..1.0e6)
                .prop_map(|(delta_x, delta_y)| WireMessage::WebScroll { delta_x, delta_y }),
            Just(WireMessage::HoverTap {}),
        ]
    }

    proptest! {
        #[test]
        fn prop_round_trip(message in arb_message()) {
            let bytes = encode(&message).expect("encode");
            prop_assert_eq!(decode(&bytes).expect("decode"), message);
        }

        #[test]
        fn prop_garbage_is_rejected(
            bytes in prop::collection::vec(any::<u8>().prop_filter("no object", |b| *b != b'{'), 0..256),
        ) {
            // No envelope can be formed without an opening brace
            prop_assert!(decode(&bytes).unwrap_err().is_decode_error());
        }

        #[test]
        fn prop_truncated_envelope_is_rejected(cut in 0usize..64) {
            let bytes = encode(&WireMessage::web_tap(0.5, 0.25)).expect("encode");
            let cut = cut.min(bytes.len() - 1);
            prop_assert!(decode(&bytes[..cut]).unwrap_err().is_decode_error());
        }

        #[test]
        fn prop_text_without_envelope_is_rejected(text in "[^{]*") {
            prop_assert!(decode(text.as_bytes()).unwrap_err().is_decode_error());
        }
    }
}
