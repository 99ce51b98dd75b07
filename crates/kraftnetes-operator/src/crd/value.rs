//! Scalar union types used by the custom resources.
//!
//! Several fields of a [`GameDefinition`](super::GameDefinition) may either hold a literal value or
//! a placeholder string (such as `"&{enable_storage}"`) which is only turned into its final value
//! once the inputs of a [`GameServer`](super::GameServer) are known. The types in this module keep
//! track of the JSON kind they were decoded from, so that encoding reproduces the scalar as it
//! was received.

use std::{borrow::Cow, fmt};

use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Visitor},
};
use snafu::Snafu;

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("cannot parse {value:?} as a boolean"))]
pub struct ParseBoolError {
    pub value: String,
}

/// Parses the boolean spellings accepted for string-typed flags.
pub fn parse_bool(value: &str) -> Result<bool, ParseBoolError> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => ParseBoolSnafu { value }.fail(),
    }
}

/// A value that is either a JSON boolean or a JSON string.
///
/// ```
/// use kraftnetes_operator::crd::value::BoolOrString;
///
/// let flag: BoolOrString = serde_json::from_str("true").unwrap();
/// assert_eq!(flag, BoolOrString::Bool(true));
///
/// let flag: BoolOrString = serde_json::from_str(r#""&{storage}""#).unwrap();
/// assert!(flag.is_string());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BoolOrString {
    Bool(bool),
    String(String),
}

impl Default for BoolOrString {
    fn default() -> Self {
        Self::Bool(false)
    }
}

impl BoolOrString {
    /// Coerces the value into a boolean, parsing string values.
    pub fn as_bool(&self) -> Result<bool, ParseBoolError> {
        match self {
            Self::Bool(value) => Ok(*value),
            Self::String(value) => parse_bool(value),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }
}

impl From<bool> for BoolOrString {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for BoolOrString {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl fmt::Display for BoolOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl Serialize for BoolOrString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::String(value) => serializer.serialize_str(value),
        }
    }
}

impl<'de> Deserialize<'de> for BoolOrString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BoolOrStringVisitor;

        impl Visitor<'_> for BoolOrStringVisitor {
            type Value = BoolOrString;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a boolean or a string")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
                Ok(BoolOrString::Bool(value))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(BoolOrString::String(value.to_owned()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
                Ok(BoolOrString::String(value))
            }
        }

        deserializer.deserialize_any(BoolOrStringVisitor)
    }
}

impl JsonSchema for BoolOrString {
    fn schema_name() -> Cow<'static, str> {
        "BoolOrString".into()
    }

    fn inline_schema() -> bool {
        true
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "description": "A boolean or a string which resolves to a boolean.",
            "x-kubernetes-preserve-unknown-fields": true,
        })
    }
}

/// A value that is either a JSON boolean, a JSON number or a JSON string.
///
/// Numbers are stored as [`serde_json::Number`], so integers stay integers when encoded again.
/// Floats are re-encoded in their shortest form, `1e3` comes back as `1000.0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnyValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

impl AnyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// Renders the value the way it is substituted into placeholders.
impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Number(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl Serialize for AnyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(value) => serializer.serialize_bool(*value),
            Self::Number(value) => value.serialize(serializer),
            Self::String(value) => serializer.serialize_str(value),
        }
    }
}

impl<'de> Deserialize<'de> for AnyValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AnyValueVisitor;

        impl Visitor<'_> for AnyValueVisitor {
            type Value = AnyValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a boolean, a number or a string")
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<Self::Value, E> {
                Ok(AnyValue::Bool(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
                Ok(AnyValue::Number(value.into()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
                Ok(AnyValue::Number(value.into()))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
                serde_json::Number::from_f64(value)
                    .map(AnyValue::Number)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Float(value), &self))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                Ok(AnyValue::String(value.to_owned()))
            }

            fn visit_string<E: de::Error>(self, value: String) -> Result<Self::Value, E> {
                Ok(AnyValue::String(value))
            }
        }

        deserializer.deserialize_any(AnyValueVisitor)
    }
}

impl JsonSchema for AnyValue {
    fn schema_name() -> Cow<'static, str> {
        "AnyValue".into()
    }

    fn inline_schema() -> bool {
        true
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "description": "A boolean, a number or a string.",
            "x-kubernetes-preserve-unknown-fields": true,
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("true", BoolOrString::Bool(true))]
    #[case("false", BoolOrString::Bool(false))]
    #[case(r#""true""#, BoolOrString::String("true".to_owned()))]
    #[case(r#""&{filebrowser}""#, BoolOrString::String("&{filebrowser}".to_owned()))]
    fn bool_or_string_keeps_its_kind(#[case] input: &str, #[case] expected: BoolOrString) {
        let value: BoolOrString = serde_json::from_str(input).unwrap();
        assert_eq!(value, expected);
        assert_eq!(serde_json::to_string(&value).unwrap(), input);
    }

    #[rstest]
    #[case("null")]
    #[case("42")]
    #[case("[true]")]
    #[case(r#"{"enabled": true}"#)]
    fn bool_or_string_rejects_other_kinds(#[case] input: &str) {
        assert!(serde_json::from_str::<BoolOrString>(input).is_err());
    }

    #[rstest]
    #[case(BoolOrString::Bool(true), true)]
    #[case(BoolOrString::from("true"), true)]
    #[case(BoolOrString::from("1"), true)]
    #[case(BoolOrString::from("false"), false)]
    #[case(BoolOrString::from("0"), false)]
    fn bool_or_string_as_bool(#[case] value: BoolOrString, #[case] expected: bool) {
        assert_eq!(value.as_bool(), Ok(expected));
    }

    #[test]
    fn bool_or_string_as_bool_fails_on_garbage() {
        let err = BoolOrString::from("&{storage}").as_bool().unwrap_err();
        assert_eq!(err.value, "&{storage}");
    }

    #[test]
    fn bool_or_string_missing_field_defaults_to_false() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default)]
            flag: BoolOrString,
        }

        let holder: Holder = serde_json::from_str("{}").unwrap();
        assert_eq!(holder.flag, BoolOrString::Bool(false));
    }

    #[rstest]
    #[case("true")]
    #[case("false")]
    #[case("42")]
    #[case("-7")]
    #[case("1.5")]
    #[case(r#""1.20""#)]
    #[case(r#""hello world""#)]
    fn any_value_reproduces_json_scalar(#[case] input: &str) {
        let value: AnyValue = serde_json::from_str(input).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), input);
    }

    /// Numbers keep their value and kind but not their spelling.
    #[rstest]
    #[case("1e3", "1000.0")]
    #[case("2.50", "2.5")]
    fn any_value_normalizes_number_spelling(#[case] input: &str, #[case] encoded: &str) {
        let value: AnyValue = serde_json::from_str(input).unwrap();
        assert!(matches!(value, AnyValue::Number(_)));
        assert_eq!(serde_json::to_string(&value).unwrap(), encoded);
    }

    #[rstest]
    #[case("null")]
    #[case("[1, 2]")]
    #[case(r#"{"a": 1}"#)]
    fn any_value_rejects_other_kinds(#[case] input: &str) {
        assert!(serde_json::from_str::<AnyValue>(input).is_err());
    }

    #[rstest]
    #[case("true", "true")]
    #[case("25565", "25565")]
    #[case("0.5", "0.5")]
    #[case(r#""1.20""#, "1.20")]
    fn any_value_renders_as_substitution_text(#[case] input: &str, #[case] expected: &str) {
        let value: AnyValue = serde_json::from_str(input).unwrap();
        assert_eq!(value.to_string(), expected);
    }

    #[test]
    fn any_value_decodes_from_yaml() {
        let values: Vec<AnyValue> = serde_yaml::from_str("[true, 3, \"3\", vanilla]").unwrap();
        assert_eq!(
            values,
            vec![
                AnyValue::Bool(true),
                AnyValue::from(3),
                AnyValue::from("3"),
                AnyValue::from("vanilla"),
            ]
        );
    }
}
