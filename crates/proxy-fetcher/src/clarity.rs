//! The Clarity value model and recursive decoder (§4.9.1).
//!
//! A [`ClarityValue`] is a tagged-variant tree as produced by a read-only
//! contract call. [`decode`] walks it into plain JSON; [`from_simplified`]
//! builds one back up from the `{type, value}` shorthand accepted as
//! contract-call function arguments (§4.9 step 4).

use num_bigint::BigInt;
use proxy_core::ApiError;
use serde_json::{json, Map, Value};

use crate::address::{is_valid_stacks_address, split_contract_id};

#[derive(Debug, Clone, PartialEq)]
pub enum ClarityValue {
    Tuple(Vec<(String, ClarityValue)>),
    List(Vec<ClarityValue>),
    OptionalSome(Box<ClarityValue>),
    OptionalNone,
    ResponseOk(Box<ClarityValue>),
    ResponseErr(Box<ClarityValue>),
    UInt(BigInt),
    Int(BigInt),
    Bool(bool),
    Principal(String),
    Buffer(Vec<u8>),
    StringAscii(String),
    StringUtf8(String),
}

/// Decoding flags (§4.9.1).
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    pub strict_json_compat: bool,
    pub preserve_containers: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            strict_json_compat: true,
            preserve_containers: false,
        }
    }
}

/// Recursively renders a [`ClarityValue`] tree as plain JSON per `opts`.
pub fn decode(value: &ClarityValue, opts: DecodeOptions) -> Value {
    match value {
        ClarityValue::Tuple(fields) => {
            let mut map = Map::new();
            for (key, v) in fields {
                map.insert(key.clone(), decode(v, opts));
            }
            Value::Object(map)
        }
        ClarityValue::List(items) => {
            Value::Array(items.iter().map(|v| decode(v, opts)).collect())
        }
        ClarityValue::OptionalSome(inner) => {
            let decoded = decode(inner, opts);
            if opts.preserve_containers {
                json!({"type": "some", "value": decoded})
            } else {
                decoded
            }
        }
        ClarityValue::OptionalNone => {
            if opts.preserve_containers {
                json!({"type": "none"})
            } else {
                Value::Null
            }
        }
        ClarityValue::ResponseOk(inner) => {
            let decoded = decode(inner, opts);
            if opts.preserve_containers {
                json!({"type": "ok", "value": decoded})
            } else {
                decoded
            }
        }
        ClarityValue::ResponseErr(inner) => {
            let decoded = decode(inner, opts);
            if opts.preserve_containers {
                json!({"type": "err", "value": decoded})
            } else {
                decoded
            }
        }
        ClarityValue::UInt(n) | ClarityValue::Int(n) => {
            if opts.strict_json_compat {
                Value::String(n.to_string())
            } else {
                non_strict_number(n)
            }
        }
        ClarityValue::Bool(b) => Value::Bool(*b),
        ClarityValue::Principal(p) => Value::String(p.clone()),
        ClarityValue::Buffer(bytes) => {
            json!({"type": "Buffer", "data": bytes})
        }
        ClarityValue::StringAscii(s) | ClarityValue::StringUtf8(s) => Value::String(s.clone()),
    }
}

/// The non-strict integer rendering: a native JSON number when it fits in
/// an `i64`, otherwise falling back to the same decimal string
/// `strict_json_compat` would have produced (a plain JSON number can't
/// represent a Clarity `uint128` exactly anyway).
fn non_strict_number(n: &BigInt) -> Value {
    match n.to_string().parse::<i64>() {
        Ok(i) => Value::Number(i.into()),
        Err(_) => Value::String(n.to_string()),
    }
}

/// Converts the simplified `{type, value}` function-argument form (§4.9
/// step 4) into a [`ClarityValue`] tree. Type names are matched
/// case-insensitively.
pub fn from_simplified(value: &Value) -> Result<ClarityValue, ApiError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ApiError::validation("function argument must be an object"))?;
    let ty = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::validation("function argument missing 'type'"))?
        .to_ascii_lowercase();
    let v = obj.get("value");

    match ty.as_str() {
        "uint" => Ok(ClarityValue::UInt(parse_bigint(v)?)),
        "int" => Ok(ClarityValue::Int(parse_bigint(v)?)),
        "bool" => Ok(ClarityValue::Bool(
            v.and_then(Value::as_bool)
                .ok_or_else(|| ApiError::validation("bool argument requires a boolean value"))?,
        )),
        "principal" => Ok(ClarityValue::Principal(parse_principal(v)?)),
        "buffer" => Ok(ClarityValue::Buffer(parse_buffer(v)?)),
        "string" | "stringascii" => Ok(ClarityValue::StringAscii(expect_string(v, "string")?)),
        "stringutf8" => Ok(ClarityValue::StringUtf8(expect_string(v, "string-utf8")?)),
        "none" => Ok(ClarityValue::OptionalNone),
        "optional" | "some" => {
            let inner = v.ok_or_else(|| ApiError::validation("optional argument missing 'value'"))?;
            Ok(ClarityValue::OptionalSome(Box::new(from_simplified(inner)?)))
        }
        "ok" | "responseok" => {
            let inner = v.ok_or_else(|| ApiError::validation("ok argument missing 'value'"))?;
            Ok(ClarityValue::ResponseOk(Box::new(from_simplified(inner)?)))
        }
        "err" | "responseerr" => {
            let inner = v.ok_or_else(|| ApiError::validation("err argument missing 'value'"))?;
            Ok(ClarityValue::ResponseErr(Box::new(from_simplified(inner)?)))
        }
        "list" => {
            let items = v
                .and_then(Value::as_array)
                .ok_or_else(|| ApiError::validation("list argument requires an array value"))?;
            let converted = items
                .iter()
                .map(from_simplified)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ClarityValue::List(converted))
        }
        "tuple" => {
            let fields = v
                .and_then(Value::as_object)
                .ok_or_else(|| ApiError::validation("tuple argument requires an object value"))?;
            let mut converted = Vec::with_capacity(fields.len());
            for (k, v) in fields {
                converted.push((k.clone(), from_simplified(v)?));
            }
            Ok(ClarityValue::Tuple(converted))
        }
        other => Err(ApiError::validation(format!(
            "unrecognized Clarity argument type: {other}"
        ))),
    }
}

/// A principal argument is either a standalone address or a contract
/// principal (`addr.contract-name`). For the latter, [`split_contract_id`]
/// separates the two parts so each can be validated on its own terms: the
/// address against [`is_valid_stacks_address`], the contract name against
/// the bare-identifier shape (non-empty, no further `.`).
fn parse_principal(v: Option<&Value>) -> Result<String, ApiError> {
    let principal = expect_string(v, "principal")?;
    match split_contract_id(&principal) {
        Some((address, contract_name)) => {
            if !is_valid_stacks_address(address) {
                return Err(ApiError::invalid_contract_address(address));
            }
            if contract_name.is_empty() || contract_name.contains('.') {
                return Err(ApiError::validation(format!(
                    "invalid contract name in principal: {principal}"
                )));
            }
        }
        None => {
            if !is_valid_stacks_address(&principal) {
                return Err(ApiError::invalid_contract_address(&principal));
            }
        }
    }
    Ok(principal)
}

fn expect_string(v: Option<&Value>, kind: &str) -> Result<String, ApiError> {
    v.and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation(format!("{kind} argument requires a string value")))
}

fn parse_bigint(v: Option<&Value>) -> Result<BigInt, ApiError> {
    match v {
        Some(Value::String(s)) => s
            .parse::<BigInt>()
            .map_err(|_| ApiError::validation(format!("not a valid integer: {s}"))),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(BigInt::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(BigInt::from(u))
            } else {
                Err(ApiError::validation("integer argument out of range"))
            }
        }
        _ => Err(ApiError::validation("integer argument requires a number or numeric string")),
    }
}

fn parse_buffer(v: Option<&Value>) -> Result<Vec<u8>, ApiError> {
    match v {
        Some(Value::String(hex)) => {
            let hex = hex.strip_prefix("0x").unwrap_or(hex);
            if hex.len() % 2 != 0 {
                return Err(ApiError::validation("buffer hex string has odd length"));
            }
            (0..hex.len())
                .step_by(2)
                .map(|i| {
                    u8::from_str_radix(&hex[i..i + 2], 16)
                        .map_err(|_| ApiError::validation("invalid buffer hex digit"))
                })
                .collect()
        }
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_u64()
                    .filter(|b| *b <= 255)
                    .map(|b| b as u8)
                    .ok_or_else(|| ApiError::validation("buffer array element out of byte range"))
            })
            .collect(),
        _ => Err(ApiError::validation("buffer argument requires a hex string or byte array")),
    }
}
