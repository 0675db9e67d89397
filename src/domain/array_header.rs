//! Header announcing the binary frame that follows it.
//!
//! A client streams an array as two frames: a JSON `array_header` text
//! frame, then one binary frame with the raw element bytes. The header is
//! validated here so the binary frame only has to be checked for length.

use serde::Serialize;
use serde_json::{Map, Value};

use super::DType;
use crate::error::ProtocolError;

/// Keys an `array_header` must carry, in the order they are reported when
/// missing.
pub const REQUIRED_HEADER_KEYS: [&str; 4] = ["name", "trial", "dtype", "shape"];

/// Memory layout of the streamed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ArrayOrder {
    /// Row-major.
    #[default]
    C,
    /// Column-major.
    F,
}

impl ArrayOrder {
    /// Whether the layout is column-major.
    #[must_use]
    pub const fn is_fortran(self) -> bool {
        matches!(self, Self::F)
    }
}

/// A validated `array_header`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayHeader {
    /// Array name; also the subdirectory the arrays are saved into.
    pub name: String,
    /// Trial the array belongs to.
    pub trial: i64,
    /// Element type.
    pub dtype: DType,
    /// Dimensions; empty for a scalar.
    pub shape: Vec<usize>,
    /// Memory layout of the bytes.
    pub order: ArrayOrder,
    /// Protocol version announced by the client.
    pub proto: String,
    /// Free-form metadata (sampling rate, label, ...).
    pub meta: Option<Value>,
    /// The dtype string exactly as the client sent it.
    pub dtype_label: String,
}

impl ArrayHeader {
    /// Validates a decoded `array_header` object.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MissingKeys`] when required keys are
    /// absent, or [`ProtocolError::InvalidHeader`] naming the first field
    /// whose value is unusable.
    pub fn from_object(obj: &Map<String, Value>) -> Result<Self, ProtocolError> {
        let missing: Vec<&'static str> = REQUIRED_HEADER_KEYS
            .iter()
            .copied()
            .filter(|k| !obj.contains_key(*k))
            .collect();
        if !missing.is_empty() {
            return Err(ProtocolError::MissingKeys(missing));
        }

        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| is_safe_name(n))
            .ok_or(ProtocolError::InvalidHeader("name"))?
            .to_string();

        let trial = obj
            .get("trial")
            .and_then(coerce_trial)
            .ok_or(ProtocolError::InvalidHeader("trial"))?;

        let dtype_label = obj
            .get("dtype")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::InvalidHeader("dtype"))?
            .to_string();
        let dtype: DType = dtype_label
            .parse()
            .map_err(|_| ProtocolError::InvalidHeader("dtype"))?;

        let shape = obj
            .get("shape")
            .and_then(Value::as_array)
            .and_then(|dims| {
                dims.iter()
                    .map(|d| d.as_u64().and_then(|n| usize::try_from(n).ok()))
                    .collect::<Option<Vec<usize>>>()
            })
            .ok_or(ProtocolError::InvalidHeader("shape"))?;

        let order = match obj.get("order") {
            None | Some(Value::Null) => ArrayOrder::C,
            Some(Value::String(s)) if s == "C" => ArrayOrder::C,
            Some(Value::String(s)) if s == "F" => ArrayOrder::F,
            Some(_) => return Err(ProtocolError::InvalidHeader("order")),
        };

        let proto = obj
            .get("proto")
            .and_then(Value::as_str)
            .unwrap_or(super::DEFAULT_PROTO)
            .to_string();

        Ok(Self {
            name,
            trial,
            dtype,
            shape,
            order,
            proto,
            meta: obj.get("meta").cloned(),
            dtype_label,
        })
    }

    /// Number of elements, or `None` on overflow.
    #[must_use]
    pub fn element_count(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Byte length the binary frame must have, or `None` on overflow.
    #[must_use]
    pub fn expected_len(&self) -> Option<usize> {
        self.element_count()?.checked_mul(self.dtype.item_size())
    }

    /// Checks a binary frame against the header.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ReshapeFailed`] when the length does not
    /// match `product(shape) * itemsize`.
    pub fn check_payload(&self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let expected = self.expected_len();
        if expected == Some(bytes.len()) {
            Ok(())
        } else {
            Err(ProtocolError::ReshapeFailed {
                expected,
                actual: bytes.len(),
            })
        }
    }
}

/// Accepts JSON integers, integral floats and integer strings.
#[must_use]
pub fn coerce_trial(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Array names become directory and file names.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name.len() <= 128
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':' | '\0') || c.is_control())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        let Value::Object(map) = value else {
            panic!("expected object");
        };
        map
    }

    fn valid() -> Map<String, Value> {
        object(json!({
            "event": "array_header",
            "name": "cursor_trace",
            "trial": 3,
            "dtype": "float32",
            "shape": [10, 2],
            "meta": {"fs": 50.0, "label": "Ypos"},
        }))
    }

    #[test]
    fn parses_valid_header() {
        let Ok(header) = ArrayHeader::from_object(&valid()) else {
            panic!("header should parse");
        };
        assert_eq!(header.name, "cursor_trace");
        assert_eq!(header.trial, 3);
        assert_eq!(header.shape, vec![10, 2]);
        assert_eq!(header.order, ArrayOrder::C);
        assert_eq!(header.proto, "v1");
        assert_eq!(header.expected_len(), Some(80));
        assert!(header.meta.is_some());
    }

    #[test]
    fn reports_missing_keys_in_order() {
        let obj = object(json!({"event": "array_header", "trial": 1}));
        let err = ArrayHeader::from_object(&obj);
        assert_eq!(
            err,
            Err(ProtocolError::MissingKeys(vec!["name", "dtype", "shape"]))
        );
    }

    #[test]
    fn rejects_unsafe_names() {
        for bad in ["", "..", "a/b", "a\\b"] {
            let mut obj = valid();
            obj.insert("name".to_string(), json!(bad));
            assert_eq!(
                ArrayHeader::from_object(&obj),
                Err(ProtocolError::InvalidHeader("name"))
            );
        }
    }

    #[test]
    fn trial_coercion() {
        assert_eq!(coerce_trial(&json!(4)), Some(4));
        assert_eq!(coerce_trial(&json!(4.0)), Some(4));
        assert_eq!(coerce_trial(&json!("12")), Some(12));
        assert_eq!(coerce_trial(&json!(4.5)), None);
        assert_eq!(coerce_trial(&json!(null)), None);
    }

    #[test]
    fn rejects_bad_dtype_shape_order() {
        let mut obj = valid();
        obj.insert("dtype".to_string(), json!("object"));
        assert_eq!(
            ArrayHeader::from_object(&obj),
            Err(ProtocolError::InvalidHeader("dtype"))
        );

        let mut obj = valid();
        obj.insert("shape".to_string(), json!([10, -1]));
        assert_eq!(
            ArrayHeader::from_object(&obj),
            Err(ProtocolError::InvalidHeader("shape"))
        );

        let mut obj = valid();
        obj.insert("order".to_string(), json!("K"));
        assert_eq!(
            ArrayHeader::from_object(&obj),
            Err(ProtocolError::InvalidHeader("order"))
        );
    }

    #[test]
    fn payload_length_check() {
        let Ok(header) = ArrayHeader::from_object(&valid()) else {
            panic!("header should parse");
        };
        assert!(header.check_payload(&[0u8; 80]).is_ok());
        assert_eq!(
            header.check_payload(&[0u8; 79]),
            Err(ProtocolError::ReshapeFailed {
                expected: Some(80),
                actual: 79
            })
        );
    }

    #[test]
    fn scalar_shape_has_one_element() {
        let mut obj = valid();
        obj.insert("shape".to_string(), json!([]));
        let Ok(header) = ArrayHeader::from_object(&obj) else {
            panic!("header should parse");
        };
        assert_eq!(header.element_count(), Some(1));
        assert_eq!(header.expected_len(), Some(4));
    }
}
