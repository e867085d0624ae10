use std::collections::HashSet;
use std::sync::Arc;

use crate::payload::{ArrayRef, ErrorValue, ObjectRef, Payload, ToPayload};

use super::convert_custom;

/// Replacement for a reference that was already visited.
pub const CIRCULAR: &str = "[Circular]";

/// Custom values may convert into further custom values; stop unwrapping
/// after this many levels.
const MAX_CONVERSION_DEPTH: usize = 16;

/// Copy `payload` into a tree, replacing repeated references with
/// [`CIRCULAR`].
///
/// Identity is tracked across the whole walk of this payload, so a shared
/// (not only cyclic) object is written out once and referenced as
/// [`CIRCULAR`] afterwards. Dates and big integers pass through untouched.
///
/// Custom values are converted here, once each, and their conversion is
/// walked with the same identity set: a conversion that leads back to an
/// enclosing object, or to the custom value itself, yields [`CIRCULAR`].
/// A failed conversion falls back to the value's own fields. The result
/// holds no custom values.
pub fn exclude_circular(payload: &Payload) -> Payload {
    Decycler::default().walk(payload)
}

#[derive(Default)]
struct Decycler {
    seen: HashSet<usize>,
    depth: usize,
}

impl Decycler {
    fn walk(&mut self, payload: &Payload) -> Payload {
        match payload {
            Payload::Object(object) => {
                if !self.seen.insert(object.identity()) {
                    return Payload::String(CIRCULAR.to_string());
                }
                let fields = object
                    .snapshot()
                    .iter()
                    .map(|(key, value)| (key.clone(), self.walk(value)))
                    .collect();
                Payload::Object(ObjectRef::from_fields(fields))
            }
            Payload::Array(array) => {
                if !self.seen.insert(array.identity()) {
                    return Payload::String(CIRCULAR.to_string());
                }
                let items = array.snapshot().iter().map(|item| self.walk(item)).collect();
                Payload::Array(ArrayRef::from_vec(items))
            }
            Payload::Error(error) => Payload::Error(ErrorValue {
                cause: error.cause.as_ref().map(|cause| Box::new(self.walk(cause))),
                ..error.clone()
            }),
            Payload::Custom(custom) => self.resolve(custom),
            other => other.clone(),
        }
    }

    fn resolve(&mut self, custom: &Arc<dyn ToPayload>) -> Payload {
        let identity = Arc::as_ptr(custom) as *const () as usize;
        if self.depth >= MAX_CONVERSION_DEPTH || !self.seen.insert(identity) {
            return Payload::String(CIRCULAR.to_string());
        }

        let converted = match convert_custom(custom.as_ref()) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::debug!(%error, value = ?custom, "payload conversion failed; using its fields");
                Payload::Object(ObjectRef::from_fields(custom.fields()))
            }
        };

        self.depth += 1;
        let resolved = self.walk(&converted);
        self.depth -= 1;
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterError;
    use crate::sanitize::stringify;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Weak;

    fn plain(payload: &Payload) -> serde_json::Value {
        stringify(exclude_circular(payload))
    }

    #[test]
    fn self_reference_becomes_sentinel() {
        let a = ObjectRef::new();
        a.insert("self", a.clone());

        let cleaned = plain(&Payload::Object(a.clone()));
        assert_eq!(cleaned, json!({"self": "[Circular]"}));
        assert!(serde_json::to_string(&cleaned).is_ok());
        a.remove("self");
    }

    #[test]
    fn nested_cycle_through_array() {
        let root = ObjectRef::new();
        let children = ArrayRef::new();
        let child = ObjectRef::new();
        child.insert("parent", root.clone());
        children.push(child.clone());
        children.push(children.clone());
        root.insert("children", children.clone());

        assert_eq!(
            plain(&Payload::Object(root.clone())),
            json!({"children": [{"parent": "[Circular]"}, "[Circular]"]})
        );
        children.clear();
    }

    #[test]
    fn shared_reference_is_written_once() {
        let shared = ObjectRef::new();
        shared.insert("v", 1);
        let root = Payload::object([("a", shared.clone()), ("b", shared.clone())]);
        assert_eq!(plain(&root), json!({"a": {"v": 1}, "b": "[Circular]"}));
    }

    #[test]
    fn acyclic_payload_is_unchanged() {
        let payload = Payload::from(json!({"a": [1, 2, {"b": null}], "c": "d"}));
        assert_eq!(plain(&payload), json!({"a": [1, 2, {"b": null}], "c": "d"}));
    }

    #[test]
    fn dates_and_bigints_pass_through() {
        let when = Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap();
        let payload = Payload::object([
            ("when", Payload::Date(when)),
            ("big", Payload::BigInt(9007199254740993)),
        ]);
        match exclude_circular(&payload) {
            Payload::Object(obj) => {
                assert!(matches!(obj.get("when"), Some(Payload::Date(d)) if d == when));
                assert!(matches!(obj.get("big"), Some(Payload::BigInt(9007199254740993))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[derive(Debug)]
    struct ReturnsSelf {
        me: Weak<ReturnsSelf>,
    }

    impl ToPayload for ReturnsSelf {
        fn to_payload(&self) -> Result<Payload, AdapterError> {
            let me = self.me.upgrade().ok_or("gone")?;
            Ok(Payload::Custom(me))
        }
    }

    #[test]
    fn custom_returning_itself_becomes_sentinel() {
        let value: Arc<ReturnsSelf> = Arc::new_cyclic(|me| ReturnsSelf { me: me.clone() });
        let payload = Payload::object([("data", Payload::Custom(value))]);
        assert_eq!(plain(&payload), json!({"data": "[Circular]"}));
    }

    /// Converts back into the object that holds it.
    #[derive(Debug)]
    struct Parent {
        parent: ObjectRef,
        calls: AtomicUsize,
    }

    impl ToPayload for Parent {
        fn to_payload(&self) -> Result<Payload, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Payload::Object(self.parent.clone()))
        }
    }

    fn parent_of(root: &ObjectRef) -> Arc<Parent> {
        Arc::new(Parent { parent: root.clone(), calls: AtomicUsize::new(0) })
    }

    #[test]
    fn custom_converting_to_its_parent_becomes_sentinel() {
        let root = ObjectRef::new();
        let child = parent_of(&root);
        root.insert("child", Payload::Custom(child.clone()));

        assert_eq!(plain(&Payload::Object(root.clone())), json!({"child": "[Circular]"}));
        assert_eq!(child.calls.load(Ordering::SeqCst), 1);
        root.remove("child");
    }

    #[test]
    fn many_customs_converting_to_their_parent_stay_flat() {
        let root = ObjectRef::new();
        let children: Vec<_> = ["a", "b", "c", "d", "e"]
            .into_iter()
            .map(|key| {
                let child = parent_of(&root);
                root.insert(key, Payload::Custom(child.clone()));
                child
            })
            .collect();

        assert_eq!(
            plain(&Payload::Object(root.clone())),
            json!({
                "a": "[Circular]",
                "b": "[Circular]",
                "c": "[Circular]",
                "d": "[Circular]",
                "e": "[Circular]",
            })
        );
        for child in &children {
            assert_eq!(child.calls.load(Ordering::SeqCst), 1);
        }
        for key in ["a", "b", "c", "d", "e"] {
            root.remove(key);
        }
    }

    #[test]
    fn decycled_payload_holds_no_custom_values() {
        let root = ObjectRef::new();
        root.insert("child", Payload::Custom(parent_of(&root)));

        match exclude_circular(&Payload::Object(root.clone())) {
            Payload::Object(obj) => {
                assert!(matches!(obj.get("child"), Some(Payload::String(s)) if s == CIRCULAR));
            }
            other => panic!("unexpected {other:?}"),
        }
        root.remove("child");
    }
}
