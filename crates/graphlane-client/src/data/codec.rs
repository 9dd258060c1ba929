//! Big-endian value codec.
//!
//! Numeric types use fixed-width big-endian bytes, strings their raw UTF-8
//! bytes. Datetimes pack into a single `u64`:
//!
//! ```text
//! (year * 13 + month) << 46 | day << 41 | hour << 36 | minute << 30 | second << 24 | micros
//! ```
//!
//! Timestamps are whole seconds since the Unix epoch in a `u32`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use graphlane_interfaces::PropertyType;
use thiserror::Error;

use super::values::PropertyValue;

/// Failure to turn a value into wire bytes
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    #[error("cannot encode a {found} value as {expected:?}")]
    TypeMismatch {
        expected: PropertyType,
        found: &'static str,
    },

    #[error("value {value} is out of range for {expected:?}")]
    OutOfRange { expected: PropertyType, value: String },

    #[error("cannot parse '{input}' as {expected:?}: {reason}")]
    Parse {
        expected: PropertyType,
        input: String,
        reason: String,
    },

    #[error("null value for a {0:?} property")]
    NullValue(PropertyType),

    #[error("property type {0:?} cannot be encoded")]
    UnsupportedType(PropertyType),
}

/// Failure to read a value back from wire bytes
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} bytes for {ty:?}, got {actual}")]
    Length {
        ty: PropertyType,
        expected: usize,
        actual: usize,
    },

    #[error("invalid utf-8 in string value")]
    Utf8,

    #[error("packed datetime {0:#x} does not name a valid date")]
    InvalidDatetime(u64),

    #[error("property type {0:?} cannot be decoded")]
    UnsupportedType(PropertyType),
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Encodes `value` as the bytes of a `ty` property.
///
/// Integer values may widen or narrow across integer types as long as the
/// number fits. String values given for non-string properties go through
/// [`parse_value`] first. `Null` is rejected rather than replaced by a default.
pub fn encode(value: &PropertyValue, ty: PropertyType) -> Result<Vec<u8>, EncodeError> {
    if value.is_null() {
        return Err(EncodeError::NullValue(ty));
    }
    if let (PropertyValue::String(text), false) = (value, ty == PropertyType::String) {
        let parsed = parse_value(text, ty)?;
        return encode(&parsed, ty);
    }

    let mismatch = || EncodeError::TypeMismatch {
        expected: ty,
        found: value.kind(),
    };

    match ty {
        PropertyType::Int32 => Ok(narrow::<i32>(value, ty, mismatch)?.to_be_bytes().to_vec()),
        PropertyType::Int64 => Ok(narrow::<i64>(value, ty, mismatch)?.to_be_bytes().to_vec()),
        PropertyType::UInt32 => Ok(narrow::<u32>(value, ty, mismatch)?.to_be_bytes().to_vec()),
        PropertyType::UInt64 => Ok(narrow::<u64>(value, ty, mismatch)?.to_be_bytes().to_vec()),
        PropertyType::Float => match value {
            PropertyValue::Float(v) => Ok(v.to_be_bytes().to_vec()),
            _ => Err(mismatch()),
        },
        PropertyType::Double => match value {
            PropertyValue::Double(v) => Ok(v.to_be_bytes().to_vec()),
            PropertyValue::Float(v) => Ok(f64::from(*v).to_be_bytes().to_vec()),
            _ => Err(mismatch()),
        },
        PropertyType::String => match value {
            PropertyValue::String(v) => Ok(v.as_bytes().to_vec()),
            _ => Err(mismatch()),
        },
        PropertyType::Datetime => {
            let dt = match value {
                PropertyValue::Datetime(v) => *v,
                PropertyValue::Timestamp(v) => v.naive_utc(),
                _ => return Err(mismatch()),
            };
            Ok(pack_datetime(&dt)?.to_be_bytes().to_vec())
        }
        PropertyType::Timestamp => {
            let secs = match value {
                PropertyValue::Timestamp(v) => v.timestamp(),
                PropertyValue::Datetime(v) => v.and_utc().timestamp(),
                PropertyValue::UInt32(v) => i64::from(*v),
                _ => return Err(mismatch()),
            };
            let secs = u32::try_from(secs).map_err(|_| EncodeError::OutOfRange {
                expected: ty,
                value: value.to_string(),
            })?;
            Ok(secs.to_be_bytes().to_vec())
        }
        PropertyType::Unset => Err(EncodeError::UnsupportedType(ty)),
    }
}

fn narrow<T>(
    value: &PropertyValue,
    ty: PropertyType,
    mismatch: impl FnOnce() -> EncodeError,
) -> Result<T, EncodeError>
where
    T: TryFrom<i32> + TryFrom<i64> + TryFrom<u32> + TryFrom<u64>,
{
    let converted = match value {
        PropertyValue::Int32(v) => <T as TryFrom<i32>>::try_from(*v).ok(),
        PropertyValue::Int64(v) => <T as TryFrom<i64>>::try_from(*v).ok(),
        PropertyValue::UInt32(v) => <T as TryFrom<u32>>::try_from(*v).ok(),
        PropertyValue::UInt64(v) => <T as TryFrom<u64>>::try_from(*v).ok(),
        _ => return Err(mismatch()),
    };
    converted.ok_or_else(|| EncodeError::OutOfRange {
        expected: ty,
        value: value.to_string(),
    })
}

/// Decodes the bytes of a `ty` property.
///
/// An empty timestamp decodes to the epoch.
pub fn decode(bytes: &[u8], ty: PropertyType) -> Result<PropertyValue, DecodeError> {
    match ty {
        PropertyType::Int32 => Ok(PropertyValue::Int32(i32::from_be_bytes(fixed(bytes, ty)?))),
        PropertyType::Int64 => Ok(PropertyValue::Int64(i64::from_be_bytes(fixed(bytes, ty)?))),
        PropertyType::UInt32 => Ok(PropertyValue::UInt32(u32::from_be_bytes(fixed(bytes, ty)?))),
        PropertyType::UInt64 => Ok(PropertyValue::UInt64(u64::from_be_bytes(fixed(bytes, ty)?))),
        PropertyType::Float => Ok(PropertyValue::Float(f32::from_be_bytes(fixed(bytes, ty)?))),
        PropertyType::Double => Ok(PropertyValue::Double(f64::from_be_bytes(fixed(bytes, ty)?))),
        PropertyType::String => String::from_utf8(bytes.to_vec())
            .map(PropertyValue::String)
            .map_err(|_| DecodeError::Utf8),
        PropertyType::Datetime => {
            let packed = u64::from_be_bytes(fixed(bytes, ty)?);
            unpack_datetime(packed).map(PropertyValue::Datetime)
        }
        PropertyType::Timestamp => {
            let secs = if bytes.is_empty() {
                0
            } else {
                u32::from_be_bytes(fixed(bytes, ty)?)
            };
            Ok(PropertyValue::Timestamp(epoch_seconds(i64::from(secs))))
        }
        PropertyType::Unset => Err(DecodeError::UnsupportedType(ty)),
    }
}

fn fixed<const N: usize>(bytes: &[u8], ty: PropertyType) -> Result<[u8; N], DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::Length {
        ty,
        expected: N,
        actual: bytes.len(),
    })
}

/// Parses text into a value of the declared type.
///
/// Surrounding spaces are trimmed. Empty text yields the type's zero value:
/// `0` for numbers, the epoch for datetimes and timestamps, and the empty
/// string for strings.
pub fn parse_value(text: &str, ty: PropertyType) -> Result<PropertyValue, EncodeError> {
    let trimmed = text.trim_matches(' ');
    let input = if trimmed.is_empty() {
        default_text(ty)
    } else {
        trimmed
    };
    let parse_err = |reason: String| EncodeError::Parse {
        expected: ty,
        input: text.to_string(),
        reason,
    };

    match ty {
        PropertyType::Int32 => input.parse().map(PropertyValue::Int32).map_err(|e| parse_err(e.to_string())),
        PropertyType::Int64 => input.parse().map(PropertyValue::Int64).map_err(|e| parse_err(e.to_string())),
        PropertyType::UInt32 => input.parse().map(PropertyValue::UInt32).map_err(|e| parse_err(e.to_string())),
        PropertyType::UInt64 => input.parse().map(PropertyValue::UInt64).map_err(|e| parse_err(e.to_string())),
        PropertyType::Float => input.parse().map(PropertyValue::Float).map_err(|e| parse_err(e.to_string())),
        PropertyType::Double => input.parse().map(PropertyValue::Double).map_err(|e| parse_err(e.to_string())),
        PropertyType::Datetime => parse_datetime(input).map(PropertyValue::Datetime).map_err(parse_err),
        PropertyType::Timestamp => parse_datetime(input)
            .map(|dt| PropertyValue::Timestamp(dt.and_utc()))
            .map_err(parse_err),
        PropertyType::String => Ok(PropertyValue::String(trimmed.to_string())),
        PropertyType::Unset => Err(EncodeError::UnsupportedType(ty)),
    }
}

/// Parses a decimal uuid
pub fn parse_uuid(text: &str) -> Result<u64, EncodeError> {
    let trimmed = text.trim_matches(' ');
    trimmed.parse().map_err(|e: std::num::ParseIntError| EncodeError::Parse {
        expected: PropertyType::UInt64,
        input: text.to_string(),
        reason: e.to_string(),
    })
}

/// Reads a boolean flag: a big-endian `u16` equal to 1 is true, anything else false
pub fn decode_bool(bytes: &[u8]) -> bool {
    matches!(bytes, [0, 1, ..])
}

fn default_text(ty: PropertyType) -> &'static str {
    match ty {
        PropertyType::Int32
        | PropertyType::Int64
        | PropertyType::UInt32
        | PropertyType::UInt64
        | PropertyType::Float
        | PropertyType::Double => "0",
        PropertyType::Datetime | PropertyType::Timestamp => "1970-01-01",
        PropertyType::String | PropertyType::Unset => "",
    }
}

fn parse_datetime(input: &str) -> Result<NaiveDateTime, String> {
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| e.to_string())?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| "invalid time of day".to_string())
}

fn pack_datetime(dt: &NaiveDateTime) -> Result<u64, EncodeError> {
    let year = u64::try_from(dt.year()).map_err(|_| EncodeError::OutOfRange {
        expected: PropertyType::Datetime,
        value: dt.to_string(),
    })?;
    let year_month = year * 13 + u64::from(dt.month());
    // year and month share the top 18 bits
    if year_month >= 1 << 18 {
        return Err(EncodeError::OutOfRange {
            expected: PropertyType::Datetime,
            value: dt.to_string(),
        });
    }
    // leap second representation in chrono spills into nanoseconds
    let micros = u64::from(dt.nanosecond() / 1_000).min(999_999);
    debug_assert!(micros < 1 << 24);

    Ok(year_month << 46
        | u64::from(dt.day()) << 41
        | u64::from(dt.hour()) << 36
        | u64::from(dt.minute()) << 30
        | u64::from(dt.second()) << 24
        | micros)
}

fn unpack_datetime(packed: u64) -> Result<NaiveDateTime, DecodeError> {
    let year_month = packed >> 46;
    let year = i32::try_from(year_month / 13).map_err(|_| DecodeError::InvalidDatetime(packed))?;
    let month = (year_month % 13) as u32;
    let day = ((packed >> 41) & 0x1f) as u32;
    let hour = ((packed >> 36) & 0x1f) as u32;
    let minute = ((packed >> 30) & 0x3f) as u32;
    let second = ((packed >> 24) & 0x3f) as u32;
    let micros = (packed & 0xff_ffff) as u32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_micro_opt(hour, minute, second, micros))
        .ok_or(DecodeError::InvalidDatetime(packed))
}

fn epoch_seconds(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, us: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_micro_opt(h, min, s, us))
            .unwrap()
    }

    #[test]
    fn test_round_trip_every_type() {
        let cases = vec![
            (PropertyValue::Int32(0), PropertyType::Int32),
            (PropertyValue::Int32(-42), PropertyType::Int32),
            (PropertyValue::Int32(i32::MIN), PropertyType::Int32),
            (PropertyValue::Int32(i32::MAX), PropertyType::Int32),
            (PropertyValue::Int64(0), PropertyType::Int64),
            (PropertyValue::Int64(-7), PropertyType::Int64),
            (PropertyValue::Int64(i64::MIN), PropertyType::Int64),
            (PropertyValue::Int64(i64::MAX), PropertyType::Int64),
            (PropertyValue::UInt32(0), PropertyType::UInt32),
            (PropertyValue::UInt32(u32::MAX), PropertyType::UInt32),
            (PropertyValue::UInt64(0), PropertyType::UInt64),
            (PropertyValue::UInt64(u64::MAX), PropertyType::UInt64),
            (PropertyValue::Float(0.0), PropertyType::Float),
            (PropertyValue::Float(-1.5), PropertyType::Float),
            (PropertyValue::Float(f32::MAX), PropertyType::Float),
            (PropertyValue::Float(f32::MIN), PropertyType::Float),
            (PropertyValue::Double(0.0), PropertyType::Double),
            (PropertyValue::Double(-3.25), PropertyType::Double),
            (PropertyValue::Double(f64::MAX), PropertyType::Double),
            (PropertyValue::Double(f64::MIN), PropertyType::Double),
            (PropertyValue::String(String::new()), PropertyType::String),
            (PropertyValue::String("héllo".into()), PropertyType::String),
            (
                PropertyValue::Datetime(datetime(1, 1, 1, 0, 0, 0, 0)),
                PropertyType::Datetime,
            ),
            (
                PropertyValue::Datetime(datetime(2022, 12, 31, 23, 59, 58, 123_456)),
                PropertyType::Datetime,
            ),
            (
                PropertyValue::Datetime(datetime(20164, 11, 30, 23, 59, 59, 999_999)),
                PropertyType::Datetime,
            ),
            (PropertyValue::Timestamp(epoch_seconds(0)), PropertyType::Timestamp),
            (
                PropertyValue::Timestamp(epoch_seconds(1_650_000_000)),
                PropertyType::Timestamp,
            ),
            (
                PropertyValue::Timestamp(epoch_seconds(i64::from(u32::MAX))),
                PropertyType::Timestamp,
            ),
        ];

        for (value, ty) in cases {
            let bytes = encode(&value, ty).unwrap();
            assert_eq!(decode(&bytes, ty).unwrap(), value, "round trip of {value:?}");
        }
    }

    #[test]
    fn test_datetime_beyond_packed_range() {
        for dt in [datetime(20164, 12, 1, 0, 0, 0, 0), datetime(30000, 1, 1, 0, 0, 0, 0)] {
            let err = encode(&PropertyValue::Datetime(dt), PropertyType::Datetime).unwrap_err();
            assert!(
                matches!(err, EncodeError::OutOfRange { expected: PropertyType::Datetime, .. }),
                "{dt} should not fit"
            );
        }
    }

    #[test]
    fn test_fixed_width_big_endian() {
        assert_eq!(encode(&PropertyValue::Int32(1), PropertyType::Int32).unwrap(), vec![0, 0, 0, 1]);
        assert_eq!(
            encode(&PropertyValue::Int64(-1), PropertyType::Int64).unwrap(),
            vec![0xff; 8]
        );
        assert_eq!(
            encode(&PropertyValue::Float(1.0), PropertyType::Float).unwrap(),
            vec![0x3f, 0x80, 0, 0]
        );
    }

    #[test]
    fn test_datetime_bit_layout() {
        let packed = pack_datetime(&datetime(2000, 1, 2, 3, 4, 5, 6)).unwrap();
        let expected = (2000u64 * 13 + 1) << 46 | 2 << 41 | 3 << 36 | 4 << 30 | 5 << 24 | 6;
        assert_eq!(packed, expected);
    }

    #[test]
    fn test_integer_widening_and_range() {
        let bytes = encode(&PropertyValue::Int32(7), PropertyType::Int64).unwrap();
        assert_eq!(decode(&bytes, PropertyType::Int64).unwrap(), PropertyValue::Int64(7));

        let err = encode(&PropertyValue::Int64(i64::MAX), PropertyType::Int32).unwrap_err();
        assert!(matches!(err, EncodeError::OutOfRange { .. }));

        let err = encode(&PropertyValue::Int32(-1), PropertyType::UInt32).unwrap_err();
        assert!(matches!(err, EncodeError::OutOfRange { .. }));
    }

    #[test]
    fn test_mismatch_and_null_are_errors() {
        let err = encode(&PropertyValue::Double(1.0), PropertyType::Int32).unwrap_err();
        assert_eq!(
            err,
            EncodeError::TypeMismatch {
                expected: PropertyType::Int32,
                found: "double"
            }
        );
        assert_eq!(
            encode(&PropertyValue::Null, PropertyType::String).unwrap_err(),
            EncodeError::NullValue(PropertyType::String)
        );
        assert!(matches!(
            encode(&PropertyValue::Int32(1), PropertyType::Unset),
            Err(EncodeError::UnsupportedType(PropertyType::Unset))
        ));
    }

    #[test]
    fn test_string_coercion() {
        let bytes = encode(&PropertyValue::from(" 12 "), PropertyType::UInt32).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 12]);

        let err = encode(&PropertyValue::from("twelve"), PropertyType::Int32).unwrap_err();
        assert!(matches!(err, EncodeError::Parse { .. }));
    }

    #[test]
    fn test_parse_empty_gives_zero_values() {
        assert_eq!(parse_value("  ", PropertyType::Int64).unwrap(), PropertyValue::Int64(0));
        assert_eq!(parse_value("", PropertyType::Double).unwrap(), PropertyValue::Double(0.0));
        assert_eq!(
            parse_value("", PropertyType::Datetime).unwrap(),
            PropertyValue::Datetime(datetime(1970, 1, 1, 0, 0, 0, 0))
        );
        assert_eq!(
            parse_value("", PropertyType::Timestamp).unwrap(),
            PropertyValue::Timestamp(epoch_seconds(0))
        );
        assert_eq!(parse_value("", PropertyType::String).unwrap(), PropertyValue::from(""));
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert_eq!(
            parse_value("2021-06-01 10:20:30.5", PropertyType::Datetime).unwrap(),
            PropertyValue::Datetime(datetime(2021, 6, 1, 10, 20, 30, 500_000))
        );
        assert_eq!(
            parse_value("2021-06-01", PropertyType::Datetime).unwrap(),
            PropertyValue::Datetime(datetime(2021, 6, 1, 0, 0, 0, 0))
        );
        assert!(parse_value("06/01/2021", PropertyType::Datetime).is_err());
    }

    #[test]
    fn test_timestamp_edges() {
        assert_eq!(
            decode(&[], PropertyType::Timestamp).unwrap(),
            PropertyValue::Timestamp(epoch_seconds(0))
        );
        let before_epoch = PropertyValue::Timestamp(epoch_seconds(-5));
        assert!(matches!(
            encode(&before_epoch, PropertyType::Timestamp),
            Err(EncodeError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_decode_wrong_length() {
        assert_eq!(
            decode(&[1, 2], PropertyType::Int32).unwrap_err(),
            DecodeError::Length {
                ty: PropertyType::Int32,
                expected: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn test_uuid_and_bool() {
        assert_eq!(parse_uuid(" 42 ").unwrap(), 42);
        assert!(parse_uuid("-1").is_err());
        assert!(decode_bool(&[0, 1]));
        assert!(!decode_bool(&[0, 2]));
        assert!(!decode_bool(&[]));
    }
}
