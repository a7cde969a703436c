// respira-core/src/tools/args.rs

//! Coercion of model-supplied JSON arguments into typed values.
//!
//! Models are loose with types: counts arrive as `3`, `"3"` or `3.0`.
//! Booleans are never accepted as numbers.

use crate::errors::ToolError;
use crate::models::tools::ToolInput;
use serde_json::Value;

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(raw) => {
            let raw = raw.trim();
            raw.parse::<i64>().ok().or_else(|| {
                raw.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// A count parameter such as `n`; must be at least 1.
pub fn positive_count(input: &ToolInput, key: &str, default: Option<usize>) -> Result<usize, ToolError> {
    let Some(value) = input.get(key) else {
        return default.ok_or_else(|| ToolError::invalid(format!("Parameter '{}' is required.", key)));
    };
    let number = as_integer(value).ok_or_else(|| {
        ToolError::invalid(format!(
            "Parameter '{}' must be an integer or numeric string, got {}.",
            key, value
        ))
    })?;
    if number < 1 {
        return Err(ToolError::invalid(format!("Parameter '{}' must be >= 1.", key)));
    }
    usize::try_from(number).map_err(|_| ToolError::invalid(format!("Parameter '{}' is too large.", key)))
}

/// A calendar year.
pub fn year(input: &ToolInput, key: &str) -> Result<i32, ToolError> {
    let value = input
        .get(key)
        .ok_or_else(|| ToolError::invalid(format!("Parameter '{}' is required.", key)))?;
    as_integer(value)
        .and_then(|y| i32::try_from(y).ok())
        .ok_or_else(|| {
            ToolError::invalid(format!(
                "Parameter '{}' must be an integer year, got {}.",
                key, value
            ))
        })
}

/// A required, non-blank string.
pub fn text<'a>(input: &'a ToolInput, key: &str) -> Result<&'a str, ToolError> {
    match input.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.as_str()),
        Some(other) => Err(ToolError::invalid(format!(
            "Parameter '{}' must be a non-empty string, got {}.",
            key, other
        ))),
        None => Err(ToolError::invalid(format!("Parameter '{}' is required.", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: Value) -> ToolInput {
        match value {
            Value::Object(map) => ToolInput::from_map(map),
            _ => panic!("test input must be an object"),
        }
    }

    #[test]
    fn counts_accept_integers_numeric_strings_and_floats() {
        assert_eq!(positive_count(&input(json!({ "n": 3 })), "n", None).unwrap(), 3);
        assert_eq!(positive_count(&input(json!({ "n": " 4 " })), "n", None).unwrap(), 4);
        assert_eq!(positive_count(&input(json!({ "n": 2.9 })), "n", None).unwrap(), 2);
        assert_eq!(positive_count(&input(json!({ "n": "5.0" })), "n", None).unwrap(), 5);
    }

    #[test]
    fn counts_reject_garbage() {
        for bad in [json!("abc"), json!(true), json!(0), json!(-2), json!([1]), json!(0.5)] {
            let result = positive_count(&input(json!({ "n": bad.clone() })), "n", None);
            assert!(
                matches!(result, Err(ToolError::InvalidArgument(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn missing_count_uses_default_or_fails() {
        let empty = ToolInput::default();
        assert_eq!(positive_count(&empty, "n", Some(5)).unwrap(), 5);
        assert!(positive_count(&empty, "n", None).is_err());
        let null = input(json!({ "n": null }));
        assert_eq!(positive_count(&null, "n", Some(7)).unwrap(), 7);
    }

    #[test]
    fn years_and_text() {
        let args = input(json!({ "year": "2020", "city": "Santa Maria", "blank": "  " }));
        assert_eq!(year(&args, "year").unwrap(), 2020);
        assert_eq!(text(&args, "city").unwrap(), "Santa Maria");
        assert!(text(&args, "blank").is_err());
        assert!(text(&args, "missing").is_err());
        assert!(year(&input(json!({ "year": "next" })), "year").is_err());
    }
}
