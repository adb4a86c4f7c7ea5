use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use thiserror::Error;

/// Element type tag of an encoded array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dtype {
    I2,
    I4,
    F8,
}

impl Dtype {
    pub fn parse(tag: &str) -> Result<Self, DecodeError> {
        match tag {
            "i2" => Ok(Self::I2),
            "i4" => Ok(Self::I4),
            "f8" => Ok(Self::F8),
            other => Err(DecodeError::UnsupportedDtype(other.to_string())),
        }
    }

    /// Width of one element in bytes.
    pub fn width(self) -> usize {
        match self {
            Self::I2 => 2,
            Self::I4 => 4,
            Self::F8 => 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(String),
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("buffer of {len} bytes is not a multiple of element width {width}")]
    Misaligned { len: usize, width: usize },
    #[error("encoded array is malformed: {0}")]
    MalformedField(String),
}

/// Wire shape `{ "bdata": "...", "dtype": "..." }`.
#[derive(Debug, Deserialize)]
pub struct EncodedArray<'a> {
    pub bdata: &'a str,
    pub dtype: &'a str,
}

impl<'a> EncodedArray<'a> {
    /// True when `value` is a mapping carrying both `bdata` and `dtype`,
    /// whatever their types.
    pub fn is_placeholder(value: &Value) -> bool {
        value
            .as_object()
            .map(|map| map.contains_key("bdata") && map.contains_key("dtype"))
            .unwrap_or(false)
    }

    pub fn from_value(value: &'a Value) -> Result<Self, DecodeError> {
        Self::deserialize(value).map_err(|err| DecodeError::MalformedField(err.to_string()))
    }

    pub fn decode(&self) -> Result<NumericArray, DecodeError> {
        decode_bdata(self.bdata, self.dtype)
    }
}

/// Decoded elements, keeping the element type of the source buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    I16(Vec<i16>),
    I32(Vec<i32>),
    F64(Vec<f64>),
}

impl NumericArray {
    pub fn len(&self) -> usize {
        match self {
            Self::I16(values) => values.len(),
            Self::I32(values) => values.len(),
            Self::F64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON array of the elements. NaN and infinities become `null`.
    pub fn into_value(self) -> Value {
        let items = match self {
            Self::I16(values) => values.into_iter().map(Value::from).collect(),
            Self::I32(values) => values.into_iter().map(Value::from).collect(),
            Self::F64(values) => values
                .into_iter()
                .map(|value| Number::from_f64(value).map_or(Value::Null, Value::Number))
                .collect(),
        };
        Value::Array(items)
    }
}

/// Decodes a base64 typed buffer.
///
/// Elements are read little-endian, which is what the chart producer (NumPy on
/// x86/ARM hosts) writes when it serializes native arrays.
pub fn decode_bdata(bdata: &str, dtype: &str) -> Result<NumericArray, DecodeError> {
    let dtype = Dtype::parse(dtype)?;
    let bytes = BASE64.decode(bdata.trim().as_bytes())?;
    let width = dtype.width();
    if bytes.len() % width != 0 {
        return Err(DecodeError::Misaligned {
            len: bytes.len(),
            width,
        });
    }

    let chunks = bytes.chunks_exact(width);
    let decoded = match dtype {
        Dtype::I2 => NumericArray::I16(
            chunks
                .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
                .collect(),
        ),
        Dtype::I4 => NumericArray::I32(
            chunks
                .map(|chunk| i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        ),
        Dtype::F8 => NumericArray::F64(
            chunks
                .map(|chunk| {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(chunk);
                    f64::from_le_bytes(raw)
                })
                .collect(),
        ),
    };
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use serde_json::json;

    use super::{decode_bdata, DecodeError, Dtype, EncodedArray, NumericArray, BASE64};

    #[test]
    fn decodes_little_endian_i16() -> anyhow::Result<()> {
        let decoded = decode_bdata("AQACAAMA", "i2")?;
        assert_eq!(decoded, NumericArray::I16(vec![1, 2, 3]));
        assert_eq!(decoded.into_value(), json!([1, 2, 3]));
        Ok(())
    }

    #[test]
    fn decodes_i16_extremes() -> anyhow::Result<()> {
        let bytes: Vec<u8> = [i16::MIN, -1, 0, i16::MAX]
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        let decoded = decode_bdata(&BASE64.encode(bytes), "i2")?;
        assert_eq!(decoded, NumericArray::I16(vec![-32768, -1, 0, 32767]));
        Ok(())
    }

    #[test]
    fn decodes_full_i32_range() -> anyhow::Result<()> {
        let values = [i32::MIN, -70_000, 0, 70_000, i32::MAX];
        let bytes: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        let decoded = decode_bdata(&BASE64.encode(&bytes), "i4")?;
        assert_eq!(decoded.len(), bytes.len() / 4);
        assert_eq!(decoded, NumericArray::I32(values.to_vec()));
        Ok(())
    }

    #[test]
    fn decodes_f64_exactly() -> anyhow::Result<()> {
        let values = [0.1, -2.5, 1e300, f64::MIN_POSITIVE];
        let bytes: Vec<u8> = values.iter().flat_map(|value| value.to_le_bytes()).collect();
        let decoded = decode_bdata(&BASE64.encode(bytes), "f8")?;
        assert_eq!(decoded, NumericArray::F64(values.to_vec()));
        Ok(())
    }

    #[test]
    fn non_finite_floats_become_null() -> anyhow::Result<()> {
        let bytes: Vec<u8> = [1.5, f64::NAN, f64::INFINITY]
            .iter()
            .flat_map(|value: &f64| value.to_le_bytes())
            .collect();
        let decoded = decode_bdata(&BASE64.encode(bytes), "f8")?;
        assert_eq!(decoded.into_value(), json!([1.5, null, null]));
        Ok(())
    }

    #[test]
    fn empty_buffer_decodes_to_empty_sequence() -> anyhow::Result<()> {
        let decoded = decode_bdata("", "i4")?;
        assert!(decoded.is_empty());
        assert_eq!(decoded.into_value(), json!([]));
        Ok(())
    }

    #[test]
    fn unsupported_dtype_is_rejected() {
        let err = decode_bdata("AQACAAMA", "i8").err();
        match err {
            Some(DecodeError::UnsupportedDtype(tag)) => assert_eq!(tag, "i8"),
            other => panic!("expected UnsupportedDtype, got {other:?}"),
        }
        assert!(matches!(
            decode_bdata("AQACAAMA", "u1"),
            Err(DecodeError::UnsupportedDtype(_))
        ));
    }

    #[test]
    fn misaligned_buffer_is_an_error() {
        // 6 bytes cannot hold whole 4-byte elements.
        let err = decode_bdata("AQACAAMA", "i4").err();
        assert!(matches!(
            err,
            Some(DecodeError::Misaligned { len: 6, width: 4 })
        ));
    }

    #[test]
    fn malformed_base64_is_an_error() {
        assert!(matches!(
            decode_bdata("not*base64!", "f8"),
            Err(DecodeError::InvalidBase64(_))
        ));
    }

    #[test]
    fn encoded_array_requires_string_fields() {
        let value = json!({"bdata": 12, "dtype": "i2"});
        assert!(EncodedArray::is_placeholder(&value));
        assert!(matches!(
            EncodedArray::from_value(&value),
            Err(DecodeError::MalformedField(_))
        ));
        assert!(!EncodedArray::is_placeholder(&json!({"bdata": "AQA="})));
        assert!(!EncodedArray::is_placeholder(&json!([1, 2])));
    }

    #[test]
    fn dtype_tags_round_trip_through_serde() -> anyhow::Result<()> {
        let parsed: Dtype = serde_json::from_value(json!("f8"))?;
        assert_eq!(parsed, Dtype::F8);
        assert_eq!(serde_json::to_value(Dtype::I2)?, json!("i2"));
        assert_eq!(Dtype::parse("i4")?, Dtype::I4);
        Ok(())
    }
}
