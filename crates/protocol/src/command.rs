//! Command envelopes and JSON normalisation of command arguments.
//!
//! Every domain operation crosses the wire as one flat JSON object:
//! `{"command": <name>, <arg>: <value>, ...}`. Arguments are an open map so
//! the server can grow its command catalogue without client changes.
//!
//! Values enter the map through [`to_json_value`], which is the single place
//! where non-JSON-native containers (notably [`NumericArray`]) are flattened
//! into plain nested JSON arrays.

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::{ClientError, CommandName};

/// Envelope key that carries the command name.
pub const COMMAND_KEY: &str = "command";

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Converts any serialisable value into a plain JSON tree.
///
/// Numeric arrays become nested sequences of numbers that preserve the array
/// shape. Non-finite floats have no JSON representation and become `null`.
///
/// # Errors
///
/// [`ClientError::Parameter`] when the value cannot be represented as JSON
/// (e.g. a map with non-string keys).
pub fn to_json_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value)
        .map_err(|e| ClientError::parameter(format!("argument is not JSON-serialisable: {e}")))
}

// ---------------------------------------------------------------------------
// Numeric arrays
// ---------------------------------------------------------------------------

/// A dense n-dimensional array of `f64` in row-major order.
///
/// Serialises as nested JSON arrays whose nesting depth equals the number of
/// dimensions; a zero-dimensional array serialises as a bare number.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NumericArray {
    /// Creates an array from a shape and row-major data.
    ///
    /// # Errors
    ///
    /// [`ClientError::Parameter`] if `data.len()` is not the product of `shape`
    /// or that product overflows `usize`.
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, ClientError> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| ClientError::parameter(format!("array shape {shape:?} overflows usize")))?;
        if expected != data.len() {
            return Err(ClientError::parameter(format!(
                "array shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Creates a zero-dimensional array holding one value.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Creates a two-dimensional array from equal-length rows.
    ///
    /// # Errors
    ///
    /// [`ClientError::Parameter`] if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, ClientError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
            return Err(ClientError::parameter(format!(
                "ragged rows: row {bad} has {} columns, expected {cols}",
                rows[bad].len()
            )));
        }
        let shape = vec![rows.len(), cols];
        Ok(Self {
            shape,
            data: rows.into_iter().flatten().collect(),
        })
    }

    /// Extent of each dimension.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major element data.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Converts the array into nested JSON arrays.
    pub fn to_json(&self) -> Value {
        if self.data.iter().any(|x| !x.is_finite()) {
            tracing::warn!(
                shape = ?self.shape,
                "numeric array contains non-finite values; they will be sent as null"
            );
        }
        nest(&self.shape, &self.data)
    }
}

impl From<Vec<f64>> for NumericArray {
    fn from(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }
}

impl Serialize for NumericArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

fn nest(shape: &[usize], data: &[f64]) -> Value {
    match shape.split_first() {
        None => float(data[0]),
        Some((&len, rest)) => {
            let stride: usize = rest.iter().product();
            Value::Array(
                (0..len)
                    .map(|i| nest(rest, &data[i * stride..(i + 1) * stride]))
                    .collect(),
            )
        }
    }
}

fn float(x: f64) -> Value {
    Number::from_f64(x).map_or(Value::Null, Value::Number)
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Open mapping of argument names to JSON values for one command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandArgs(Map<String, Value>);

impl CommandArgs {
    /// Creates an empty argument map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`CommandArgs::insert`].
    ///
    /// # Errors
    ///
    /// [`ClientError::Parameter`] if `value` is not JSON-serialisable.
    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self, ClientError> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Normalises `value` and stores it under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// [`ClientError::Parameter`] if `value` is not JSON-serialisable.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Serialize) -> Result<(), ClientError> {
        let value = to_json_value(&value)?;
        self.0.insert(key.into(), value);
        Ok(())
    }

    /// Stores an already-built JSON value under `key`.
    pub fn insert_value(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Copies every entry of `other` into `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: CommandArgs) {
        self.0.extend(other.0);
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when no arguments are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the arguments in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Unwraps into the underlying JSON map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for CommandArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for CommandArgs {
    type Error = ClientError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(ClientError::parameter(format!(
                "command arguments must be a JSON object, got {other}"
            ))),
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for CommandArgs {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// One domain command and its arguments, serialised flat.
///
/// The `command` key always carries [`CommandEnvelope::command`]; an argument
/// that happens to be named `command` is overwritten.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub command: CommandName,
    pub args: CommandArgs,
}

impl CommandEnvelope {
    /// Pairs a command name with its arguments.
    pub fn new(command: CommandName, args: CommandArgs) -> Self {
        Self { command, args }
    }

    /// Builds the JSON request body.
    pub fn into_body(self) -> Value {
        let mut map = self.args.into_map();
        map.insert(
            COMMAND_KEY.to_string(),
            Value::String(self.command.as_str().to_string()),
        );
        Value::Object(map)
    }
}

impl Serialize for CommandEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = self.args.iter().filter(|(k, _)| k.as_str() != COMMAND_KEY);
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry(COMMAND_KEY, self.command.as_str())?;
        for (key, value) in extra {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
