//! Typed setting values and their raw string form

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt;

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
	Str,
	Int,
	Float,
	Bool,
	/// Newline separated list, one item per line
	Lines,
	/// UTC timestamp, stored with whole-second precision
	Timestamp,
}

impl fmt::Display for FieldType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			FieldType::Str => "string",
			FieldType::Int => "int",
			FieldType::Float => "float",
			FieldType::Bool => "bool",
			FieldType::Lines => "lines",
			FieldType::Timestamp => "timestamp",
		};
		f.write_str(name)
	}
}

/// Setting value types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
	Bool(bool),
	Int(i64),
	Float(f64),
	Str(String),
	Lines(Vec<String>),
	Timestamp(DateTime<Utc>),
}

impl Value {
	pub fn field_type(&self) -> FieldType {
		match self {
			Value::Bool(_) => FieldType::Bool,
			Value::Int(_) => FieldType::Int,
			Value::Float(_) => FieldType::Float,
			Value::Str(_) => FieldType::Str,
			Value::Lines(_) => FieldType::Lines,
			Value::Timestamp(_) => FieldType::Timestamp,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Str(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Value::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_float(&self) -> Option<f64> {
		match self {
			Value::Float(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_lines(&self) -> Option<&[String]> {
		match self {
			Value::Lines(lines) => Some(lines),
			_ => None,
		}
	}

	pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
		match self {
			Value::Timestamp(ts) => Some(*ts),
			_ => None,
		}
	}

	/// Raw (file) representation
	pub fn to_raw(&self) -> String {
		match self {
			Value::Bool(b) => b.to_string(),
			Value::Int(i) => i.to_string(),
			Value::Float(v) => v.to_string(),
			Value::Str(s) => s.clone(),
			Value::Lines(lines) => lines.join("\n"),
			Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
		}
	}
}

impl FieldType {
	/// Coerces a raw string into a value of this type
	///
	/// Returns `Ok(None)` for an empty raw string on non-string types, the
	/// caller substitutes the field default.
	pub fn coerce(self, raw: &str) -> Result<Option<Value>, String> {
		if self != FieldType::Str && self != FieldType::Lines && raw.trim().is_empty() {
			return Ok(None);
		}

		let value = match self {
			FieldType::Str => Value::Str(raw.to_string()),
			FieldType::Int => Value::Int(
				raw.trim().parse::<i64>().map_err(|_| format!("\"{}\" is not a number", raw))?,
			),
			FieldType::Float => Value::Float(
				raw.trim().parse::<f64>().map_err(|_| format!("\"{}\" is not a number", raw))?,
			),
			FieldType::Bool => Value::Bool(parse_bool(raw)?),
			FieldType::Lines => Value::Lines(
				raw.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect(),
			),
			FieldType::Timestamp => Value::Timestamp(parse_timestamp(raw)?),
		};
		Ok(Some(value))
	}
}

fn parse_bool(raw: &str) -> Result<bool, String> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"true" | "yes" | "on" | "1" => Ok(true),
		"false" | "no" | "off" | "0" => Ok(false),
		_ => Err(format!("\"{}\" is not a boolean", raw)),
	}
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
	let raw = raw.trim();
	if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
		return Ok(ts.with_timezone(&Utc));
	}
	if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
		return Ok(ts.and_utc());
	}
	NaiveDate::parse_from_str(raw, "%Y-%m-%d")
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
		.map(|ts| ts.and_utc())
		.ok_or_else(|| format!("\"{}\" is not a timestamp", raw))
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Str(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Str(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Int(v)
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Float(v)
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<Vec<String>> for Value {
	fn from(v: Vec<String>) -> Self {
		Value::Lines(v)
	}
}

impl From<DateTime<Utc>> for Value {
	fn from(v: DateTime<Utc>) -> Self {
		Value::Timestamp(v)
	}
}

/// Rust types a field can be read back as
pub trait SettingType: Sized {
	const FIELD_TYPE: FieldType;

	fn from_value(value: &Value) -> Option<Self>;

	fn into_value(self) -> Value;
}

impl SettingType for String {
	const FIELD_TYPE: FieldType = FieldType::Str;

	fn from_value(value: &Value) -> Option<Self> {
		value.as_str().map(String::from)
	}

	fn into_value(self) -> Value {
		Value::Str(self)
	}
}

impl SettingType for i64 {
	const FIELD_TYPE: FieldType = FieldType::Int;

	fn from_value(value: &Value) -> Option<Self> {
		value.as_int()
	}

	fn into_value(self) -> Value {
		Value::Int(self)
	}
}

impl SettingType for f64 {
	const FIELD_TYPE: FieldType = FieldType::Float;

	fn from_value(value: &Value) -> Option<Self> {
		value.as_float()
	}

	fn into_value(self) -> Value {
		Value::Float(self)
	}
}

impl SettingType for bool {
	const FIELD_TYPE: FieldType = FieldType::Bool;

	fn from_value(value: &Value) -> Option<Self> {
		value.as_bool()
	}

	fn into_value(self) -> Value {
		Value::Bool(self)
	}
}

impl SettingType for Vec<String> {
	const FIELD_TYPE: FieldType = FieldType::Lines;

	fn from_value(value: &Value) -> Option<Self> {
		value.as_lines().map(<[String]>::to_vec)
	}

	fn into_value(self) -> Value {
		Value::Lines(self)
	}
}

impl SettingType for DateTime<Utc> {
	const FIELD_TYPE: FieldType = FieldType::Timestamp;

	fn from_value(value: &Value) -> Option<Self> {
		value.as_timestamp()
	}

	fn into_value(self) -> Value {
		Value::Timestamp(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{TimeZone, Timelike};

	#[test]
	fn test_coerce_scalars() {
		assert_eq!(FieldType::Int.coerce(" 42 "), Ok(Some(Value::Int(42))));
		assert_eq!(FieldType::Float.coerce("1.5"), Ok(Some(Value::Float(1.5))));
		assert_eq!(FieldType::Bool.coerce("Yes"), Ok(Some(Value::Bool(true))));
		assert_eq!(FieldType::Bool.coerce("off"), Ok(Some(Value::Bool(false))));
		assert_eq!(FieldType::Str.coerce(" keep "), Ok(Some(Value::Str(" keep ".into()))));
	}

	#[test]
	fn test_coerce_failures() {
		assert_eq!(FieldType::Int.coerce("abc"), Err("\"abc\" is not a number".to_string()));
		assert_eq!(FieldType::Bool.coerce("maybe"), Err("\"maybe\" is not a boolean".to_string()));
		assert!(FieldType::Timestamp.coerce("yesterday").is_err());
	}

	#[test]
	fn test_empty_raw_means_default() {
		assert_eq!(FieldType::Int.coerce(""), Ok(None));
		assert_eq!(FieldType::Bool.coerce("  "), Ok(None));
		assert_eq!(FieldType::Str.coerce(""), Ok(Some(Value::Str(String::new()))));
	}

	#[test]
	fn test_lines() {
		let value = FieldType::Lines.coerce("one\n  two \n\nthree").expect("lines always coerce");
		assert_eq!(value, Some(Value::Lines(vec!["one".into(), "two".into(), "three".into()])));
		assert_eq!(value.map(|v| v.to_raw()), Some("one\ntwo\nthree".to_string()));
	}

	#[test]
	fn test_timestamp_formats() {
		let expected = Utc.with_ymd_and_hms(2011, 5, 17, 10, 30, 0).single();
		assert_eq!(
			FieldType::Timestamp.coerce("2011-05-17T10:30:00Z").ok().flatten().and_then(|v| v.as_timestamp()),
			expected
		);
		assert_eq!(
			FieldType::Timestamp.coerce("2011-05-17 10:30:00").ok().flatten().and_then(|v| v.as_timestamp()),
			expected
		);
	}

	#[test]
	fn test_timestamp_round_trip_truncates_subseconds() {
		// Sub-second precision is not representable in the raw form
		let ts = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).single().expect("valid timestamp");
		let precise = ts.with_nanosecond(123_456_789).expect("valid nanoseconds");
		let raw = Value::Timestamp(precise).to_raw();
		assert_eq!(raw, "2020-01-02T03:04:05Z");

		let back = FieldType::Timestamp.coerce(&raw).ok().flatten();
		assert_eq!(back, Some(Value::Timestamp(ts)));
		assert_ne!(back, Some(Value::Timestamp(precise)));
	}

	#[test]
	fn test_setting_type_round_trip() {
		assert_eq!(i64::from_value(&5i64.into_value()), Some(5));
		assert_eq!(String::from_value(&Value::Int(5)), None);
		assert_eq!(<Vec<String>>::FIELD_TYPE, FieldType::Lines);
	}
}

// vim: ts=4
