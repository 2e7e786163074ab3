//! JSON bodies for HTTP register transports.
//!
//! | Request | Body | Reply |
//! |---------|------|-------|
//! | read `name` | | `{"field":"name","value":N}` |
//! | write `name` | `{"value":N}` | `{"field":"name","ok":true}` |
//! | rejected write | | `{"field":"name","error":"out_of_range"}` |
//!
//! Every value travels as an unsigned scalar; `led_rgb` packs as
//! `0xRRGGBB` and booleans as 0 or 1.
//!
//! ```rust
//! use bilateral_haptic::wireless::codec::{decode_write, encode_reply};
//! use bilateral_haptic::wireless::{Field, RegisterValue};
//! use bilateral_haptic::traits::RegisterReply;
//!
//! let value = decode_write(Field::CustomDuty, br#"{"value":40}"#).unwrap();
//! assert_eq!(value, RegisterValue::U8(40));
//!
//! let mut buf = [0u8; 64];
//! let len = encode_reply(&RegisterReply::Value(Field::CustomDuty, value), &mut buf).unwrap();
//! assert_eq!(&buf[..len], br#"{"field":"custom_duty","value":40}"#);
//! ```

use super::{Field, RegisterError, RegisterValue, ValueKind};
use crate::traits::{RegisterReply, Rgb};
use serde::{Deserialize, Serialize};

/// Largest encoded reply.
pub const REPLY_CAPACITY: usize = 64;

#[derive(Deserialize)]
struct WriteBody {
    value: u32,
}

#[derive(Serialize)]
struct ValueBody<'a> {
    field: &'a str,
    value: u32,
}

#[derive(Serialize)]
struct AcceptedBody<'a> {
    field: &'a str,
    ok: bool,
}

#[derive(Serialize)]
struct RejectedBody<'a> {
    field: &'a str,
    error: &'a str,
}

/// Machine-readable name of a rejection.
pub const fn error_code(err: RegisterError) -> &'static str {
    match err {
        RegisterError::ReadOnly => "read_only",
        RegisterError::TypeMismatch => "type_mismatch",
        RegisterError::OutOfRange => "out_of_range",
    }
}

/// Builds a value for `field` from its wire scalar.
pub fn value_from_wire(field: Field, raw: u32) -> Option<RegisterValue> {
    match field.kind() {
        ValueKind::Rgb if raw <= 0x00FF_FFFF => Some(RegisterValue::Rgb(Rgb::new(
            (raw >> 16) as u8,
            (raw >> 8) as u8,
            raw as u8,
        ))),
        ValueKind::Rgb => None,
        kind => RegisterValue::from_scalar(kind, raw),
    }
}

/// Decodes a write body. A malformed body or a scalar that does not fit the
/// field's type is a type mismatch; range checks are left to the table.
pub fn decode_write(field: Field, body: &[u8]) -> Result<RegisterValue, RegisterError> {
    let (body, _) =
        serde_json_core::from_slice::<WriteBody>(body).map_err(|_| RegisterError::TypeMismatch)?;
    value_from_wire(field, body.value).ok_or(RegisterError::TypeMismatch)
}

/// HTTP status for a reply.
pub const fn status_code(reply: &RegisterReply) -> u16 {
    match reply {
        RegisterReply::Value(..) | RegisterReply::Accepted(_) => 200,
        RegisterReply::Rejected(_, RegisterError::ReadOnly) => 403,
        RegisterReply::Rejected(..) => 400,
    }
}

/// Encodes a reply into `buf`, returning the length.
pub fn encode_reply(reply: &RegisterReply, buf: &mut [u8]) -> Option<usize> {
    let result = match *reply {
        RegisterReply::Value(field, value) => serde_json_core::to_slice(
            &ValueBody {
                field: field.name(),
                value: value.as_scalar(),
            },
            buf,
        ),
        RegisterReply::Accepted(field) => serde_json_core::to_slice(
            &AcceptedBody {
                field: field.name(),
                ok: true,
            },
            buf,
        ),
        RegisterReply::Rejected(field, err) => serde_json_core::to_slice(
            &RejectedBody {
                field: field.name(),
                error: error_code(err),
            },
            buf,
        ),
    };
    result.ok()
}
