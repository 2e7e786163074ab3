//! Persisted configuration and the Config Store interface.
//!
//! The custom profile and presentation fields survive power cycles. They are
//! loaded once at boot and saved only at shutdown, and only when a field was
//! written during the session.
//!
//! Every record carries the [`SCHEMA_SIGNATURE`], a CRC-32 of the persisted
//! field layout. A record written by a firmware with a different layout fails
//! the signature check and is treated exactly like a missing record.
//!
//! # Record Format
//!
//! With the `serde-json-core` feature, records are encoded as compact JSON
//! through [`encode_record`] / [`decode_record`]:
//!
//! ```rust
//! use bilateral_haptic::store::{decode_record, encode_record, PersistedConfig, SCHEMA_SIGNATURE};
//!
//! let config = PersistedConfig::default();
//! let mut buf = [0u8; 384];
//! let len = encode_record(&config, SCHEMA_SIGNATURE, &mut buf).unwrap();
//!
//! assert_eq!(decode_record(&buf[..len], SCHEMA_SIGNATURE), Some(config));
//! assert_eq!(decode_record(&buf[..len], SCHEMA_SIGNATURE ^ 1), None);
//! ```

use core::fmt;

/// Persisted fields: `(field id, encoded width in bytes)`, in record order.
///
/// Changing this table changes [`SCHEMA_SIGNATURE`] and invalidates records
/// written by earlier firmware.
pub const FIELD_LAYOUT: [(u8, u8); 11] = [
    (1, 2),  // frequency_chz
    (2, 1),  // duty_percent
    (3, 1),  // intensity_percent
    (4, 1),  // led_enable
    (5, 1),  // led_color_mode
    (6, 1),  // led_palette_index
    (7, 1),  // led_r
    (8, 1),  // led_g
    (9, 1),  // led_b
    (10, 1), // led_brightness
    (11, 4), // session_duration_s
];

/// Structural signature of the current record layout.
pub const SCHEMA_SIGNATURE: u32 = layout_signature(&FIELD_LAYOUT);

/// Buffer size that fits any encoded record.
pub const RECORD_CAPACITY: usize = 384;

/// CRC-32 (IEEE, reflected) over the flattened layout pairs.
pub const fn layout_signature(layout: &[(u8, u8)]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    let mut i = 0;
    while i < layout.len() {
        crc = crc32_byte(crc, layout[i].0);
        crc = crc32_byte(crc, layout[i].1);
        i += 1;
    }
    !crc
}

const fn crc32_byte(crc: u32, byte: u8) -> u32 {
    let mut crc = crc ^ byte as u32;
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 1 != 0 {
            (crc >> 1) ^ 0xEDB8_8320
        } else {
            crc >> 1
        };
        bit += 1;
    }
    crc
}

/// The persisted subset of the register table.
///
/// Values are stored raw; range checks happen when the record is applied to
/// a [`ConfigRegisters`](crate::wireless::ConfigRegisters).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PersistedConfig {
    /// Custom frequency in centihertz.
    pub frequency_chz: u16,
    /// Custom duty cycle in percent.
    pub duty_percent: u8,
    /// Custom drive intensity in percent.
    pub intensity_percent: u8,
    /// Indicator shown for the whole custom session.
    pub led_enable: bool,
    /// 0 = palette, 1 = custom RGB.
    pub led_color_mode: u8,
    /// Palette entry.
    pub led_palette_index: u8,
    /// Custom red.
    pub led_r: u8,
    /// Custom green.
    pub led_g: u8,
    /// Custom blue.
    pub led_b: u8,
    /// Indicator brightness in percent.
    pub led_brightness: u8,
    /// Session length in seconds.
    pub session_duration_s: u32,
}

impl Default for PersistedConfig {
    fn default() -> Self {
        Self {
            frequency_chz: 100,
            duty_percent: 50,
            intensity_percent: 75,
            led_enable: true,
            led_color_mode: 1,
            led_palette_index: 0,
            led_r: 255,
            led_g: 0,
            led_b: 0,
            led_brightness: 20,
            session_duration_s: 1200,
        }
    }
}

/// Config Store failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// The record did not fit the encode buffer.
    Encode,
    /// The storage backend refused the operation (backend error code).
    Backend(i32),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Encode => write!(f, "failed to encode configuration record"),
            StoreError::Backend(code) => write!(f, "storage backend error {code}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for StoreError {}

/// Key/value persistence for [`PersistedConfig`].
///
/// # Contract
///
/// - `load` returns `None` for a missing, undecodable or signature-mismatched
///   record. It never returns a partially applied record.
/// - `save` is idempotent: saving the same values twice leaves the store in
///   the same state as saving once.
pub trait ConfigStore {
    /// Loads the record written with `signature`.
    fn load(&mut self, signature: u32) -> Option<PersistedConfig>;

    /// Replaces the record, tagging it with `signature`.
    fn save(&mut self, config: &PersistedConfig, signature: u32) -> Result<(), StoreError>;
}

#[cfg(feature = "serde-json-core")]
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredRecord {
    signature: u32,
    config: PersistedConfig,
}

/// Encodes a record into `buf`, returning the encoded length.
#[cfg(feature = "serde-json-core")]
pub fn encode_record(
    config: &PersistedConfig,
    signature: u32,
    buf: &mut [u8],
) -> Result<usize, StoreError> {
    let record = StoredRecord {
        signature,
        config: *config,
    };
    serde_json_core::to_slice(&record, buf).map_err(|_| StoreError::Encode)
}

/// Decodes a record, returning `None` for malformed or foreign records.
#[cfg(feature = "serde-json-core")]
pub fn decode_record(bytes: &[u8], signature: u32) -> Option<PersistedConfig> {
    match serde_json_core::from_slice::<StoredRecord>(bytes) {
        Ok((record, _)) if record.signature == signature => Some(record.config),
        Ok((record, _)) => {
            log::warn!(
                "Stored config signature {:#010x} does not match {:#010x}, using defaults",
                record.signature,
                signature
            );
            None
        }
        Err(_) => {
            log::warn!("Stored config is malformed, using defaults");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_for_a_layout() {
        assert_eq!(layout_signature(&FIELD_LAYOUT), SCHEMA_SIGNATURE);
        assert_ne!(SCHEMA_SIGNATURE, 0);
    }

    #[test]
    fn signature_changes_with_layout() {
        let mut widened = FIELD_LAYOUT;
        widened[0] = (1, 4);
        assert_ne!(layout_signature(&widened), SCHEMA_SIGNATURE);

        let reordered = [FIELD_LAYOUT[1], FIELD_LAYOUT[0]];
        let original = [FIELD_LAYOUT[0], FIELD_LAYOUT[1]];
        assert_ne!(layout_signature(&reordered), layout_signature(&original));
    }

    #[test]
    fn crc_matches_reference_vector() {
        // CRC-32 of ASCII "123456789" is 0xCBF43926
        let pairs = [(b'1', b'2'), (b'3', b'4'), (b'5', b'6'), (b'7', b'8')];
        let mut crc = 0xFFFF_FFFFu32;
        for (a, b) in pairs {
            crc = crc32_byte(crc32_byte(crc, a), b);
        }
        crc = crc32_byte(crc, b'9');
        assert_eq!(!crc, 0xCBF4_3926);
    }

    #[cfg(feature = "serde-json-core")]
    #[test]
    fn largest_record_fits_capacity() {
        let config = PersistedConfig {
            frequency_chz: u16::MAX,
            duty_percent: u8::MAX,
            intensity_percent: u8::MAX,
            led_enable: false,
            led_color_mode: u8::MAX,
            led_palette_index: u8::MAX,
            led_r: u8::MAX,
            led_g: u8::MAX,
            led_b: u8::MAX,
            led_brightness: u8::MAX,
            session_duration_s: u32::MAX,
        };
        let mut buf = [0u8; RECORD_CAPACITY];
        let len = encode_record(&config, u32::MAX, &mut buf).unwrap();
        assert_eq!(decode_record(&buf[..len], u32::MAX), Some(config));
    }

    #[cfg(feature = "serde-json-core")]
    #[test]
    fn malformed_bytes_decode_to_none() {
        assert_eq!(decode_record(b"", SCHEMA_SIGNATURE), None);
        assert_eq!(decode_record(b"{\"signature\":1", SCHEMA_SIGNATURE), None);
        assert_eq!(decode_record(&[0xFF; 16], SCHEMA_SIGNATURE), None);
    }

    #[cfg(feature = "serde-json-core")]
    #[test]
    fn encode_fails_cleanly_on_small_buffer() {
        let mut buf = [0u8; 16];
        assert_eq!(
            encode_record(&PersistedConfig::default(), SCHEMA_SIGNATURE, &mut buf),
            Err(StoreError::Encode)
        );
    }
}
