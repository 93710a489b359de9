//! Series array decoding.
//!
//! A plotted series can reach us in several shapes: a plain JSON array, a
//! wrapper object around an inner array, a base64 typed payload, or an object
//! keyed by decimal indices. [`EncodedArray::classify`] resolves which one a
//! value is and [`EncodedArray::decode`] flattens it into `f64` elements.
//! Elements that are not numbers decode to `NaN` so positions stay aligned
//! between the x and y sequences of a series.

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field holding the inner array of a wrapped array.
pub const WRAPPED_FIELD: &str = "_inputArray";

const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not valid base64")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("unknown dtype tag {0:?}")]
    UnknownDtype(String),

    #[error("payload of {len} bytes is not a multiple of the {size}-byte {dtype} element")]
    MisalignedPayload {
        dtype: &'static str,
        len: usize,
        size: usize,
    },

    #[error("wrapped array length {length} exceeds its {entries} index entries")]
    LengthExceedsEntries { length: u64, entries: usize },

    #[error("index key {0:?} is out of range")]
    InvalidIndex(String),

    #[error("value is not a recognized array encoding")]
    Unrecognized,
}

/// Binary element format of a typed payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    F8,
    F4,
    I4,
    I2,
    I1,
    U4,
    U2,
    U1,
}

impl Dtype {
    pub const ALL: [Dtype; 8] = [
        Dtype::F8,
        Dtype::F4,
        Dtype::I4,
        Dtype::I2,
        Dtype::I1,
        Dtype::U4,
        Dtype::U2,
        Dtype::U1,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dtype| dtype.tag() == tag)
    }

    pub fn tag(self) -> &'static str {
        match self {
            Dtype::F8 => "f8",
            Dtype::F4 => "f4",
            Dtype::I4 => "i4",
            Dtype::I2 => "i2",
            Dtype::I1 => "i1",
            Dtype::U4 => "u4",
            Dtype::U2 => "u2",
            Dtype::U1 => "u1",
        }
    }

    /// Element width in bytes.
    pub fn size(self) -> usize {
        match self {
            Dtype::F8 => 8,
            Dtype::F4 | Dtype::I4 | Dtype::U4 => 4,
            Dtype::I2 | Dtype::U2 => 2,
            Dtype::I1 | Dtype::U1 => 1,
        }
    }

    /// Reinterpret one little-endian element. `chunk` must be exactly [`Dtype::size`] bytes.
    fn read_le(self, chunk: &[u8]) -> f64 {
        match self {
            Dtype::F8 => f64::from_le_bytes(le_bytes(chunk)),
            Dtype::F4 => f32::from_le_bytes(le_bytes(chunk)) as f64,
            Dtype::I4 => i32::from_le_bytes(le_bytes(chunk)) as f64,
            Dtype::I2 => i16::from_le_bytes(le_bytes(chunk)) as f64,
            Dtype::I1 => i8::from_le_bytes(le_bytes(chunk)) as f64,
            Dtype::U4 => u32::from_le_bytes(le_bytes(chunk)) as f64,
            Dtype::U2 => u16::from_le_bytes(le_bytes(chunk)) as f64,
            Dtype::U1 => chunk[0] as f64,
        }
    }
}

fn le_bytes<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(chunk);
    buf
}

/// The encodings a series array can arrive in.
#[derive(Debug, Clone, Copy)]
pub enum EncodedArray<'a> {
    Raw(&'a [Value]),
    Wrapped(&'a Value),
    Typed { dtype: &'a str, payload: &'a str },
    Indexed(&'a Map<String, Value>),
    Unrecognized,
}

impl<'a> EncodedArray<'a> {
    /// Resolve the encoding of `value`, first match wins:
    /// plain array, wrapped array, typed payload, index-keyed object.
    pub fn classify(value: &'a Value) -> Self {
        let obj = match value {
            Value::Array(elems) => return Self::Raw(elems),
            Value::Object(obj) => obj,
            _ => return Self::Unrecognized,
        };

        if let Some(inner @ (Value::Array(_) | Value::Object(_))) = obj.get(WRAPPED_FIELD) {
            return Self::Wrapped(inner);
        }

        let dtype = obj.get("dtype").and_then(Value::as_str);
        let payload = obj
            .get("bdata")
            .or_else(|| obj.get("payload"))
            .and_then(Value::as_str);
        if let (Some(dtype), Some(payload)) = (dtype, payload) {
            return Self::Typed { dtype, payload };
        }

        if !obj.is_empty() && obj.keys().all(|key| is_decimal(key)) {
            return Self::Indexed(obj);
        }

        Self::Unrecognized
    }

    pub fn decode(self) -> Result<Vec<f64>, DecodeError> {
        match self {
            Self::Raw(elems) => Ok(elems.iter().map(number).collect()),
            Self::Wrapped(inner) => decode_array_like(inner),
            Self::Typed { dtype, payload } => decode_typed(dtype, payload),
            Self::Indexed(obj) => decode_indexed(obj),
            Self::Unrecognized => Err(DecodeError::Unrecognized),
        }
    }
}

/// Decode any supported encoding, reporting why a value could not be decoded.
pub fn decode(value: &Value) -> Result<Vec<f64>, DecodeError> {
    EncodedArray::classify(value).decode()
}

/// Total variant of [`decode`]: malformed input yields an empty sequence.
pub fn decode_or_empty(value: &Value) -> Vec<f64> {
    decode(value).unwrap_or_default()
}

fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

fn is_decimal(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

fn decode_array_like(inner: &Value) -> Result<Vec<f64>, DecodeError> {
    // Array-likes carry an explicit length, bounded by the entries present.
    if let Value::Object(obj) = inner {
        if let Some(len) = obj.get("length").and_then(Value::as_u64) {
            let entries = obj.keys().filter(|key| is_decimal(key)).count();
            if len > entries as u64 {
                return Err(DecodeError::LengthExceedsEntries {
                    length: len,
                    entries,
                });
            }
            let vals = (0..len)
                .map(|idx| obj.get(&idx.to_string()).map_or(f64::NAN, number))
                .collect();
            return Ok(vals);
        }
    }
    decode(inner)
}

fn decode_typed(tag: &str, payload: &str) -> Result<Vec<f64>, DecodeError> {
    let dtype = Dtype::from_tag(tag).ok_or_else(|| DecodeError::UnknownDtype(tag.to_owned()))?;

    let payload: String = payload.split_ascii_whitespace().collect();
    let bytes = PAYLOAD_ENGINE.decode(payload)?;

    let size = dtype.size();
    if bytes.len() % size != 0 {
        return Err(DecodeError::MisalignedPayload {
            dtype: dtype.tag(),
            len: bytes.len(),
            size,
        });
    }

    Ok(bytes
        .chunks_exact(size)
        .map(|chunk| dtype.read_le(chunk))
        .collect())
}

fn decode_indexed(obj: &Map<String, Value>) -> Result<Vec<f64>, DecodeError> {
    let mut entries = obj
        .iter()
        .map(|(key, val)| {
            key.parse::<u64>()
                .map(|idx| (idx, val))
                .map_err(|_| DecodeError::InvalidIndex(key.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|&(idx, _)| idx);
    Ok(entries.into_iter().map(|(_, val)| number(val)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;

    fn encode(dtype: Dtype, vals: &[f64]) -> Value {
        let mut bytes = Vec::new();
        for &val in vals {
            match dtype {
                Dtype::F8 => bytes.extend_from_slice(&val.to_le_bytes()),
                Dtype::F4 => bytes.extend_from_slice(&(val as f32).to_le_bytes()),
                Dtype::I4 => bytes.extend_from_slice(&(val as i32).to_le_bytes()),
                Dtype::I2 => bytes.extend_from_slice(&(val as i16).to_le_bytes()),
                Dtype::I1 => bytes.extend_from_slice(&(val as i8).to_le_bytes()),
                Dtype::U4 => bytes.extend_from_slice(&(val as u32).to_le_bytes()),
                Dtype::U2 => bytes.extend_from_slice(&(val as u16).to_le_bytes()),
                Dtype::U1 => bytes.push(val as u8),
            }
        }
        json!({ "dtype": dtype.tag(), "bdata": STANDARD.encode(bytes) })
    }

    #[test]
    fn typed_payloads_reproduce_their_values() {
        for dtype in Dtype::ALL {
            let vals: Vec<f64> = match dtype {
                Dtype::F8 => vec![0.1, -2.5, 1e300, 42.0],
                Dtype::F4 => vec![0.5, -2.25, 1024.0, 3.0],
                Dtype::I4 => vec![-2_000_000_000.0, -1.0, 0.0, 7.0],
                Dtype::I2 => vec![-32768.0, -1.0, 0.0, 32767.0],
                Dtype::I1 => vec![-128.0, -1.0, 0.0, 127.0],
                Dtype::U4 => vec![0.0, 1.0, 4_000_000_000.0, 9.0],
                Dtype::U2 => vec![0.0, 1.0, 65535.0, 9.0],
                Dtype::U1 => vec![0.0, 1.0, 255.0, 9.0],
            };
            let decoded = decode(&encode(dtype, &vals)).expect("failed to decode payload");
            assert_eq!(decoded, vals, "dtype {}", dtype.tag());
        }
    }

    #[test]
    fn f4_payload_keeps_single_precision() {
        let decoded = decode(&encode(Dtype::F4, &[0.1])).expect("failed to decode payload");
        assert_eq!(decoded, vec![0.1f32 as f64]);
    }

    #[test]
    fn unknown_dtype_is_a_decode_failure() {
        let value = json!({ "dtype": "f16", "bdata": "AAAAAAAA" });
        assert!(matches!(decode(&value), Err(DecodeError::UnknownDtype(tag)) if tag == "f16"));
        assert!(decode_or_empty(&value).is_empty());
    }

    #[test]
    fn invalid_base64_is_a_decode_failure() {
        for payload in ["AAAAA", "not base64!", "AA=A"] {
            let value = json!({ "dtype": "u1", "bdata": payload });
            assert!(matches!(decode(&value), Err(DecodeError::InvalidBase64(_))));
            assert!(decode_or_empty(&value).is_empty());
        }
    }

    #[test]
    fn truncated_payload_is_a_decode_failure() {
        let full = encode(Dtype::F8, &[1.0, 2.0]);
        let bdata = full["bdata"].as_str().expect("bdata is a string");
        let value = json!({ "dtype": "f8", "bdata": &bdata[..bdata.len() - 4] });
        assert!(matches!(
            decode(&value),
            Err(DecodeError::MisalignedPayload { size: 8, .. })
        ));
        assert!(decode_or_empty(&value).is_empty());
    }

    #[test]
    fn unpadded_payload_is_accepted() {
        let value = json!({ "dtype": "u1", "bdata": "AQI" });
        assert_eq!(decode_or_empty(&value), vec![1.0, 2.0]);
    }

    #[test]
    fn raw_arrays_keep_positions_of_non_numbers() {
        let decoded = decode_or_empty(&json!([1, null, 2.5, "x"]));
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[0], 1.0);
        assert!(decoded[1].is_nan());
        assert_eq!(decoded[2], 2.5);
        assert!(decoded[3].is_nan());
    }

    #[test]
    fn wrapped_arrays_expose_their_inner_field() {
        assert_eq!(
            decode_or_empty(&json!({ "_inputArray": [3, 4, 5] })),
            vec![3.0, 4.0, 5.0]
        );
        assert_eq!(
            decode_or_empty(&json!({ "_inputArray": { "0": 7, "1": 8, "length": 2 } })),
            vec![7.0, 8.0]
        );
        assert_eq!(
            decode_or_empty(&json!({ "_inputArray": { "0": 7, "5": 8, "length": 1 } })),
            vec![7.0]
        );
    }

    #[test]
    fn oversized_wrapped_length_is_a_decode_failure() {
        for length in [3u64, 1_000_000_000, 4_611_686_018_427_387_904, u64::MAX] {
            let value = json!({ "_inputArray": { "0": 7, "1": 8, "length": length } });
            assert!(matches!(
                decode(&value),
                Err(DecodeError::LengthExceedsEntries { entries: 2, .. })
            ));
            assert!(decode_or_empty(&value).is_empty());
        }
        let value = json!({ "_inputArray": { "length": 4_611_686_018_427_387_904u64 } });
        assert!(decode_or_empty(&value).is_empty());
    }

    #[test]
    fn wrapped_array_wins_over_typed_payload() {
        let value = json!({ "_inputArray": [1], "dtype": "u1", "bdata": "AQI=" });
        assert!(matches!(EncodedArray::classify(&value), EncodedArray::Wrapped(_)));
    }

    #[test]
    fn indexed_maps_sort_numerically() {
        let value = json!({ "10": 3, "2": 2, "0": 1 });
        assert!(matches!(EncodedArray::classify(&value), EncodedArray::Indexed(_)));
        assert_eq!(decode_or_empty(&value), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn index_overflow_is_a_decode_failure() {
        let value = json!({ "0": 1, "99999999999999999999999": 2 });
        assert!(matches!(decode(&value), Err(DecodeError::InvalidIndex(_))));
    }

    #[test]
    fn unrecognized_values_decode_to_nothing() {
        for value in [
            json!(null),
            json!(3),
            json!("1,2,3"),
            json!({}),
            json!({ "0": 1, "name": "a" }),
            json!({ "dtype": "f8" }),
        ] {
            assert!(matches!(decode(&value), Err(DecodeError::Unrecognized)));
            assert!(decode_or_empty(&value).is_empty());
        }
    }
}
