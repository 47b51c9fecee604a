//! Pixels Notification Decoder
//!
//! Turns the raw bytes of a characteristic-value-changed notification into a
//! [`RollEvent`].
//!
//! # Roll State Message
//!
//! ```text
//! [0] : Message type (3 = roll state)
//! [1] : Roll state
//!       1     = face settled ("on face")
//!       other = rolling / handling / crooked
//! [2] : Face index, 0-based (only meaningful when settled)
//! ```
//!
//! Anything else decodes to [`RollEvent::Unknown`]. Decoding never fails.

use crate::domain::models::RollEvent;
use tracing::trace;

/// Message type of the roll state message
pub const MESSAGE_TYPE_ROLL_STATE: u8 = 3;

/// Roll state value reported once the die has come to rest
pub const ROLL_STATE_ON_FACE: u8 = 1;

/// Decode a notification payload
pub fn decode(bytes: &[u8]) -> RollEvent {
    let event = match bytes {
        [MESSAGE_TYPE_ROLL_STATE, ROLL_STATE_ON_FACE, face, ..] => RollEvent::FaceUp { face: *face },
        [MESSAGE_TYPE_ROLL_STATE, ROLL_STATE_ON_FACE] => RollEvent::Unknown,
        [MESSAGE_TYPE_ROLL_STATE, _, ..] => RollEvent::Movement,
        _ => RollEvent::Unknown,
    };

    trace!("Decoded {:02X?} as {:?}", bytes, event);
    event
}
