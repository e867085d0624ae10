use serde_json::{json, Map, Value};

use crate::payload::{ErrorValue, Payload};
use crate::record::to_iso8601;

use super::exclude_circular;

/// Convert a de-cycled payload into plain JSON.
///
/// - big integers become decimal strings,
/// - dates become ISO-8601 strings,
/// - errors become `{name, message, cause, stack}`.
///
/// The input is expected to come out of [`exclude_circular`], which has
/// already replaced custom values by their conversion. A custom value
/// found here anyway is resolved through [`exclude_circular`] first.
pub fn stringify(payload: Payload) -> Value {
    match payload {
        Payload::Null => Value::Null,
        Payload::Bool(b) => Value::Bool(b),
        Payload::Number(n) => Value::Number(n),
        Payload::String(s) => Value::String(s),
        Payload::BigInt(n) => Value::String(n.to_string()),
        Payload::Date(date) => Value::String(to_iso8601(&date)),
        Payload::Error(error) => convert_error(error),
        Payload::Array(array) => Value::Array(array.snapshot().into_iter().map(stringify).collect()),
        Payload::Object(object) => Value::Object(
            object
                .snapshot()
                .into_iter()
                .map(|(key, value)| (key, stringify(value)))
                .collect::<Map<_, _>>(),
        ),
        custom @ Payload::Custom(_) => stringify(exclude_circular(&custom)),
    }
}

fn convert_error(error: ErrorValue) -> Value {
    let cause = error.cause.map(|cause| stringify(*cause)).unwrap_or(Value::Null);
    json!({
        "name": error.name,
        "message": error.message,
        "cause": cause,
        "stack": error.stack,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use crate::payload::{Fields, ToPayload};
    use chrono::{TimeZone, Utc};

    #[test]
    fn bigint_becomes_decimal_string() {
        assert_eq!(stringify(Payload::BigInt(9007199254740991)), json!("9007199254740991"));
        let nested = Payload::object([("n", Payload::BigInt(-12345678901234567890123))]);
        assert_eq!(stringify(nested), json!({"n": "-12345678901234567890123"}));
    }

    #[test]
    fn date_becomes_iso_string() {
        let when = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(stringify(Payload::Date(when)), json!("2023-12-31T23:59:59.000Z"));
    }

    #[test]
    fn error_becomes_plain_object() {
        let error = ErrorValue::new("TypeError", "bad input")
            .with_stack("TypeError: bad input\n    at main")
            .with_cause(ErrorValue::new("Error", "root cause"));
        assert_eq!(
            stringify(Payload::Error(error)),
            json!({
                "name": "TypeError",
                "message": "bad input",
                "cause": {"name": "Error", "message": "root cause", "cause": null, "stack": null},
                "stack": "TypeError: bad input\n    at main",
            })
        );
    }

    #[test]
    fn arrays_and_objects_are_walked() {
        let payload = Payload::from(vec![
            Payload::object([("at", Payload::Date(Utc.timestamp_opt(0, 0).unwrap()))]),
            Payload::from("plain"),
            Payload::Null,
        ]);
        assert_eq!(
            stringify(payload),
            json!([{"at": "1970-01-01T00:00:00.000Z"}, "plain", null])
        );
    }

    #[derive(Debug)]
    struct Money {
        cents: i64,
    }

    impl ToPayload for Money {
        fn to_payload(&self) -> Result<Payload, AdapterError> {
            Ok(Payload::from(format!("{}.{:02}", self.cents / 100, self.cents % 100)))
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl ToPayload for Broken {
        fn to_payload(&self) -> Result<Payload, AdapterError> {
            Err("cannot convert".into())
        }

        fn fields(&self) -> Fields {
            Fields::from([("kind".to_string(), Payload::from("broken"))])
        }
    }

    #[derive(Debug)]
    struct Panics;

    impl ToPayload for Panics {
        fn to_payload(&self) -> Result<Payload, AdapterError> {
            panic!("conversion exploded")
        }
    }

    #[test]
    fn custom_uses_its_conversion() {
        let payload = Payload::object([("price", Payload::custom(Money { cents: 1999 }))]);
        assert_eq!(stringify(payload), json!({"price": "19.99"}));
    }

    #[test]
    fn failed_conversion_falls_back_to_fields() {
        assert_eq!(stringify(Payload::custom(Broken)), json!({"kind": "broken"}));
        assert_eq!(stringify(Payload::custom(Panics)), json!({}));
    }

    #[derive(Debug)]
    struct Nesting;

    impl ToPayload for Nesting {
        fn to_payload(&self) -> Result<Payload, AdapterError> {
            Ok(Payload::custom(Nesting))
        }
    }

    #[test]
    fn endless_conversion_is_bounded() {
        assert_eq!(stringify(Payload::custom(Nesting)), json!("[Circular]"));
    }
}
