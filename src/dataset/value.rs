// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Field value literals.
//!
//! Remote stores keep field values as plain strings. Arrays are written as a
//! bracketed, comma-joined literal, and strings are double quoted, so the type
//! can be recovered when the value is read back.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

/// Scalar type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    Str,
}

impl Display for FieldType {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
        })
    }
}

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "str" | "string" => Ok(Self::Str),
            _ => Err(UnknownFieldType(name.to_string())),
        }
    }
}

/// Field type name not recognized.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown field type {0:?}, expected one of bool, int, float, str")]
pub struct UnknownFieldType(pub String);

/// Typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StrArray(Vec<String>),
}

impl FieldValue {
    /// Scalar type of value or its elements.
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) | Self::BoolArray(_) => FieldType::Bool,
            Self::Int(_) | Self::IntArray(_) => FieldType::Int,
            Self::Float(_) | Self::FloatArray(_) => FieldType::Float,
            Self::Str(_) | Self::StrArray(_) => FieldType::Str,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::BoolArray(_) | Self::IntArray(_) | Self::FloatArray(_) | Self::StrArray(_)
        )
    }

    /// Parse value literal permissively.
    ///
    /// Never fails. Anything that is not recognizably a bool, number, quoted
    /// string, or list thereof is taken as a bare string. Lists mixing ints
    /// and floats widen to floats; any other mix falls back to strings.
    pub fn parse(literal: &str) -> Self {
        let literal = literal.trim();
        let Some(inner) = literal
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        else {
            return match parse_scalar(literal) {
                Scalar::Bool(value) => Self::Bool(value),
                Scalar::Int(value) => Self::Int(value),
                Scalar::Float(value) => Self::Float(value),
                Scalar::Str(value) => Self::Str(value),
            };
        };

        let elements: Vec<&str> = split_elements(inner);
        let scalars: Vec<Scalar> = elements.iter().map(|element| parse_scalar(element)).collect();

        if scalars.is_empty() {
            return Self::StrArray(Vec::new());
        }

        if let Some(values) = collect(&scalars, |scalar| match scalar {
            Scalar::Bool(value) => Some(*value),
            _ => None,
        }) {
            return Self::BoolArray(values);
        }

        if let Some(values) = collect(&scalars, |scalar| match scalar {
            Scalar::Int(value) => Some(*value),
            _ => None,
        }) {
            return Self::IntArray(values);
        }

        if let Some(values) = collect(&scalars, |scalar| match scalar {
            Scalar::Int(value) => Some(*value as f64),
            Scalar::Float(value) => Some(*value),
            _ => None,
        }) {
            return Self::FloatArray(values);
        }

        Self::StrArray(
            scalars
                .into_iter()
                .zip(elements)
                .map(|(scalar, element)| match scalar {
                    Scalar::Str(value) => value,
                    _ => element.trim().to_string(),
                })
                .collect(),
        )
    }

    /// Convert value to scalar type without losing information.
    ///
    /// Ints widen to floats, and anything converts to strings. Empty string
    /// arrays convert to empty arrays of any type. Return [`None`] otherwise.
    pub fn coerce(self, datatype: FieldType) -> Option<Self> {
        match (self, datatype) {
            (value, datatype) if value.field_type() == datatype => Some(value),
            (Self::Int(value), FieldType::Float) => Some(Self::Float(value as f64)),
            (Self::IntArray(values), FieldType::Float) => {
                Some(Self::FloatArray(values.into_iter().map(|value| value as f64).collect()))
            }
            (Self::BoolArray(values), FieldType::Str) => {
                Some(Self::StrArray(values.iter().map(ToString::to_string).collect()))
            }
            (Self::IntArray(values), FieldType::Str) => {
                Some(Self::StrArray(values.iter().map(ToString::to_string).collect()))
            }
            (Self::FloatArray(values), FieldType::Str) => {
                Some(Self::StrArray(values.iter().map(|value| format!("{value:?}")).collect()))
            }
            (value, FieldType::Str) => Some(Self::Str(value.to_literal())),
            (Self::StrArray(values), datatype) if values.is_empty() => Some(match datatype {
                FieldType::Bool => Self::BoolArray(Vec::new()),
                FieldType::Int => Self::IntArray(Vec::new()),
                FieldType::Float => Self::FloatArray(Vec::new()),
                FieldType::Str => Self::StrArray(Vec::new()),
            }),
            _ => None,
        }
    }

    /// Render value as a literal that [`FieldValue::parse`] reads back.
    pub fn to_literal(&self) -> String {
        self.to_string()
    }
}

impl Display for FieldValue {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Bool(value) => write!(fmt, "{value}"),
            Self::Int(value) => write!(fmt, "{value}"),
            Self::Float(value) => write!(fmt, "{value:?}"),
            Self::Str(value) => write!(fmt, "\"{value}\""),
            Self::BoolArray(values) => write_array(fmt, values.iter().map(ToString::to_string)),
            Self::IntArray(values) => write_array(fmt, values.iter().map(ToString::to_string)),
            Self::FloatArray(values) => write_array(fmt, values.iter().map(|value| format!("{value:?}"))),
            Self::StrArray(values) => write_array(fmt, values.iter().map(|value| format!("\"{value}\""))),
        }
    }
}

fn write_array(fmt: &mut Formatter<'_>, elements: impl Iterator<Item = String>) -> FmtResult {
    write!(fmt, "[{}]", elements.collect::<Vec<_>>().join(","))
}

enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

fn parse_scalar(literal: &str) -> Scalar {
    let literal = literal.trim();
    match literal {
        "true" | "True" => return Scalar::Bool(true),
        "false" | "False" => return Scalar::Bool(false),
        _ => {}
    }

    if let Ok(value) = literal.parse::<i64>() {
        return Scalar::Int(value);
    }

    // INVARIANT: Words like "inf" or "NaN" stay strings.
    if literal.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(value) = literal.parse::<f64>() {
            return Scalar::Float(value);
        }
    }

    for quote in ['"', '\''] {
        if literal.len() >= 2 && literal.starts_with(quote) && literal.ends_with(quote) {
            return Scalar::Str(literal[1..literal.len() - 1].to_string());
        }
    }

    Scalar::Str(literal.to_string())
}

// INVARIANT: Commas inside quoted elements do not split.
fn split_elements(inner: &str) -> Vec<&str> {
    if inner.trim().is_empty() {
        return Vec::new();
    }

    let mut elements = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, c) in inner.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(open), _) if open == c => quote = None,
            (None, ',') => {
                elements.push(&inner[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    elements.push(&inner[start..]);

    elements
}

fn collect<T>(scalars: &[Scalar], pick: impl Fn(&Scalar) -> Option<T>) -> Option<Vec<T>> {
    scalars.iter().map(pick).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    #[test_case("true", FieldValue::Bool(true); "bool")]
    #[test_case("False", FieldValue::Bool(false); "capitalised bool")]
    #[test_case("42", FieldValue::Int(42); "int")]
    #[test_case("-1.5", FieldValue::Float(-1.5); "float")]
    #[test_case("\"hello, world\"", FieldValue::Str("hello, world".into()); "quoted string")]
    #[test_case("bare", FieldValue::Str("bare".into()); "bare string")]
    #[test_case("inf", FieldValue::Str("inf".into()); "word not float")]
    #[test_case("[1,2,3]", FieldValue::IntArray(vec![1, 2, 3]); "int array")]
    #[test_case("[1, 2.5]", FieldValue::FloatArray(vec![1.0, 2.5]); "widened array")]
    #[test_case("[\"a\",\"b\"]", FieldValue::StrArray(vec!["a".into(), "b".into()]); "string array")]
    #[test_case("[\"a,b\", 'c']", FieldValue::StrArray(vec!["a,b".into(), "c".into()]); "quoted commas")]
    #[test_case("[1, x]", FieldValue::StrArray(vec!["1".into(), "x".into()]); "mixed array")]
    #[test_case("[]", FieldValue::StrArray(vec![]); "empty array")]
    #[test]
    fn parse_literals(literal: &str, expect: FieldValue) {
        use pretty_assertions::assert_eq;
        assert_eq!(FieldValue::parse(literal), expect);
    }

    #[test]
    fn literals_read_back() {
        let values = [
            FieldValue::Bool(true),
            FieldValue::Int(-7),
            FieldValue::Float(1.0),
            FieldValue::Str("scan".into()),
            FieldValue::StrArray(vec!["a".into(), "b".into()]),
            FieldValue::FloatArray(vec![0.5, 2.0]),
            FieldValue::BoolArray(vec![false, true]),
        ];
        for value in values {
            assert_eq!(FieldValue::parse(&value.to_literal()), value);
        }
    }

    #[test_case(FieldValue::Int(2), FieldType::Float, Some(FieldValue::Float(2.0)); "widen int")]
    #[test_case(FieldValue::Int(2), FieldType::Str, Some(FieldValue::Str("2".into())); "int to string")]
    #[test_case(FieldValue::IntArray(vec![1]), FieldType::Str, Some(FieldValue::StrArray(vec!["1".into()])); "array to strings")]
    #[test_case(FieldValue::StrArray(vec![]), FieldType::Int, Some(FieldValue::IntArray(vec![])); "empty array")]
    #[test_case(FieldValue::Float(2.5), FieldType::Int, None; "no narrowing")]
    #[test_case(FieldValue::Str("x".into()), FieldType::Bool, None; "no parsing")]
    #[test]
    fn coerce_values(value: FieldValue, datatype: FieldType, expect: Option<FieldValue>) {
        use pretty_assertions::assert_eq;
        assert_eq!(value.coerce(datatype), expect);
    }

    #[test]
    fn literal_layout() {
        assert_eq!(
            FieldValue::StrArray(vec!["a".into(), "b".into()]).to_literal(),
            "[\"a\",\"b\"]"
        );
        assert_eq!(FieldValue::Float(3.0).to_literal(), "3.0");
        assert_eq!(FieldValue::Str("x".into()).to_literal(), "\"x\"");
    }
}
