//! Immutable message records
//!
//! ## Design principles
//!
//! 1. **Immutability**: a record never changes. Every `set` allocates a new
//!    record sharing the schema; the old record stays valid until dropped.
//! 2. **Value identity**: two records of the same type with field-wise equal
//!    values are equal and hash-equal. Listener state never participates.
//! 3. **Equal-value short-circuit**: setting a field to a value equal to the
//!    current one returns the same record and fires no listeners.
//! 4. **Listener slots**: one replaceable update listener per subscription
//!    key per instance. Registering under a key replaces the previous
//!    listener for that key, so memory is bounded per node per key. When a
//!    record produces a successor, each registered listener is invoked with
//!    the new record. The table is cloned out before invocation, so
//!    listeners may re-register re-entrantly.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Result, ValidationError};
use crate::schema::Schema;
use crate::token::TypeToken;
use crate::value::Value;

/// Update listener invoked with the newly constructed record when the
/// instance it is registered on is replaced.
pub type Listener = Rc<dyn Fn(&Record)>;

/// One field entry of a sparse override map.
///
/// `Skip` is the reserved "leave unchanged" marker; it is distinct from
/// `Set(Value::Undefined)`, which explicitly clears an optional field.
#[derive(Clone)]
pub enum FieldUpdate {
    /// Leave the field unchanged
    Skip,
    /// Replace the field with this value
    Set(Value),
}

struct Inner {
    schema: Arc<Schema>,
    values: Vec<Value>,
    listeners: RefCell<HashMap<String, Listener>>,
}

/// An immutable instance of a message type.
///
/// Cheap to clone (`Arc`-shared). Compares and hashes by type token plus
/// field values.
#[derive(Clone)]
pub struct Record {
    inner: Arc<Inner>,
}

impl Record {
    /// Construct a record from a complete field-value map.
    ///
    /// Every required field must be present and every value must pass its
    /// descriptor's shape check; the first failure is reported by field
    /// name. Optional fields left out default to `Undefined`.
    pub fn new<I, K>(schema: &Arc<Schema>, entries: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut provided: HashMap<String, Value> = HashMap::new();
        for (name, value) in entries {
            let name = name.into();
            if schema.field(&name).is_none() {
                return Err(ValidationError::new(
                    schema.type_name(),
                    name,
                    "no such field",
                )
                .into());
            }
            provided.insert(name, value);
        }

        let mut values = Vec::with_capacity(schema.fields().len());
        for field in schema.fields() {
            let value = provided.remove(field.name()).unwrap_or(Value::Undefined);
            field.validate(&value).map_err(|reason| {
                ValidationError::new(schema.type_name(), field.name(), reason)
            })?;
            values.push(value);
        }

        Ok(Record::from_parts(schema.clone(), values))
    }

    /// The canonical all-defaults record for a type, constructed at most
    /// once per schema and shared thereafter.
    pub fn empty(schema: &Arc<Schema>) -> Record {
        schema
            .empty
            .get_or_init(|| {
                let values = schema
                    .fields()
                    .iter()
                    .map(|f| {
                        if f.is_optional() {
                            Value::Undefined
                        } else {
                            f.shape().default_value()
                        }
                    })
                    .collect();
                Record::from_parts(schema.clone(), values)
            })
            .clone()
    }

    fn from_parts(schema: Arc<Schema>, values: Vec<Value>) -> Record {
        Record {
            inner: Arc::new(Inner {
                schema,
                values,
                listeners: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Descriptor table this record was built from.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    /// Declared type name.
    pub fn type_name(&self) -> &str {
        self.inner.schema.type_name()
    }

    /// Process-wide identity token of the record's type.
    pub fn token(&self) -> TypeToken {
        self.inner.schema.token()
    }

    /// Field values in descriptor order.
    pub fn values(&self) -> &[Value] {
        &self.inner.values
    }

    /// Get a field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        let (i, _) = self.inner.schema.field(name)?;
        Some(&self.inner.values[i])
    }

    /// True when both handles point at the same allocation (not merely
    /// value-equal).
    pub fn same_instance(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Return a new record with exactly one field replaced.
    ///
    /// If the new value is value-equal to the old one, the same record is
    /// returned and no listeners fire.
    pub fn set(&self, name: &str, value: Value) -> Result<Record> {
        self.update([(name.to_string(), FieldUpdate::Set(value))])
    }

    /// Return a new record with a sparse set of fields replaced.
    ///
    /// `FieldUpdate::Skip` leaves a field unchanged. If no field actually
    /// changes value, the same record is returned and no listeners fire.
    pub fn update<I>(&self, overrides: I) -> Result<Record>
    where
        I: IntoIterator<Item = (String, FieldUpdate)>,
    {
        let schema = &self.inner.schema;
        let mut values = self.inner.values.clone();
        let mut changed = false;

        for (name, update) in overrides {
            let (i, field) = schema.field(&name).ok_or_else(|| {
                ValidationError::new(schema.type_name(), &name, "no such field")
            })?;
            let value = match update {
                FieldUpdate::Skip => continue,
                FieldUpdate::Set(value) => value,
            };
            field.validate(&value).map_err(|reason| {
                ValidationError::new(schema.type_name(), field.name(), reason)
            })?;
            if values[i] != value {
                values[i] = value;
                changed = true;
            }
        }

        if !changed {
            return Ok(self.clone());
        }

        let next = Record::from_parts(schema.clone(), values);
        self.notify_replaced(&next);
        Ok(next)
    }

    /// Replace one structural child (nested record, list, map, or set),
    /// leaving every other field unchanged. Part of the mechanical
    /// child-replacement contract consumed by the update propagator.
    pub fn replace_child(&self, name: &str, value: Value) -> Result<Record> {
        let schema = &self.inner.schema;
        let (i, _) = schema
            .field(name)
            .ok_or_else(|| ValidationError::new(schema.type_name(), name, "no such field"))?;
        if !self.inner.values[i].is_structural() {
            return Err(ValidationError::new(
                schema.type_name(),
                name,
                "not a structural field",
            )
            .into());
        }
        self.set(name, value)
    }

    /// Enumerate the structural children of this record as (field name,
    /// value) pairs, for attaching and re-attaching listeners.
    pub fn children(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inner
            .schema
            .fields()
            .iter()
            .zip(self.inner.values.iter())
            .filter(|(_, v)| v.is_structural())
            .map(|(f, v)| (f.name(), v))
    }

    /// Register the update listener for a subscription key on this
    /// instance, replacing any previous listener under the same key.
    pub fn set_listener(&self, key: impl Into<String>, listener: Listener) {
        self.inner.listeners.borrow_mut().insert(key.into(), listener);
    }

    /// Cancel the subscription key on this instance.
    pub fn clear_listener(&self, key: &str) {
        self.inner.listeners.borrow_mut().remove(key);
    }

    /// Whether a listener is currently registered under the key.
    pub fn has_listener(&self, key: &str) -> bool {
        self.inner.listeners.borrow().contains_key(key)
    }

    fn notify_replaced(&self, next: &Record) {
        // Clone the table out so listeners can re-register re-entrantly
        let listeners: Vec<Listener> =
            self.inner.listeners.borrow().values().cloned().collect();
        if !listeners.is_empty() {
            tracing::trace!(
                target: "cereal::record",
                type_name = self.type_name(),
                listeners = listeners.len(),
                "record replaced"
            );
        }
        for listener in listeners {
            listener(next);
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.token() == other.token() && self.inner.values == other.inner.values
    }
}

impl Eq for Record {}

impl PartialOrd for Record {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Record {
    fn cmp(&self, other: &Self) -> Ordering {
        self.token()
            .cmp(&other.token())
            .then_with(|| self.inner.values.cmp(&other.inner.values))
    }
}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.token().hash(state);
        self.inner.values.hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.type_name());
        for (field, value) in self.inner.schema.fields().iter().zip(&self.inner.values) {
            s.field(field.name(), value);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldShape};
    use std::cell::Cell;

    fn point_schema() -> Arc<Schema> {
        Schema::builder("record_test_Point")
            .field(FieldDescriptor::new("x", FieldShape::Int).tag(1))
            .field(FieldDescriptor::new("y", FieldShape::Int).tag(2))
            .build()
            .unwrap()
    }

    fn point(x: i64, y: i64) -> Record {
        let schema = point_schema();
        Record::new(&schema, [("x", Value::Int(x)), ("y", Value::Int(y))]).unwrap()
    }

    #[test]
    fn construction_validates_shapes() {
        let schema = point_schema();
        let err = Record::new(&schema, [("x", Value::Str("no".into())), ("y", Value::Int(0))])
            .unwrap_err();
        assert!(err.to_string().contains("`x`"));
    }

    #[test]
    fn missing_required_field_named() {
        let schema = point_schema();
        let err = Record::new(&schema, [("x", Value::Int(1))]).unwrap_err();
        assert!(err.to_string().contains("`y`"));
    }

    #[test]
    fn unknown_field_rejected() {
        let schema = point_schema();
        let err = Record::new(&schema, [("z", Value::Int(1))]).unwrap_err();
        assert!(err.to_string().contains("no such field"));
    }

    #[test]
    fn value_equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;
        let a = point(1, 2);
        let b = point(1, 2);
        assert_eq!(a, b);
        assert!(!a.same_instance(&b));

        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn set_replaces_exactly_one_field() {
        let a = point(1, 2);
        let b = a.set("x", Value::Int(9)).unwrap();
        assert_eq!(b.get("x"), Some(&Value::Int(9)));
        assert_eq!(b.get("y"), Some(&Value::Int(2)));
        // The original never mutates
        assert_eq!(a.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn set_equal_value_returns_same_instance() {
        let a = point(1, 2);
        let b = a.set("x", Value::Int(1)).unwrap();
        assert!(a.same_instance(&b));
    }

    #[test]
    fn update_skip_marker_leaves_field_unchanged() {
        let a = point(1, 2);
        let b = a
            .update([
                ("x".to_string(), FieldUpdate::Skip),
                ("y".to_string(), FieldUpdate::Set(Value::Int(7))),
            ])
            .unwrap();
        assert_eq!(b.get("x"), Some(&Value::Int(1)));
        assert_eq!(b.get("y"), Some(&Value::Int(7)));
    }

    #[test]
    fn clearing_optional_field_with_undefined() {
        let schema = Schema::builder("record_test_Opt")
            .field(FieldDescriptor::new("a", FieldShape::Int))
            .field(FieldDescriptor::new("b", FieldShape::Str).optional())
            .build()
            .unwrap();
        let r = Record::new(
            &schema,
            [("a", Value::Int(1)), ("b", Value::Str("x".into()))],
        )
        .unwrap();
        let cleared = r.set("b", Value::Undefined).unwrap();
        assert!(cleared.get("b").unwrap().is_undefined());
        // Clearing a required field is a validation error
        assert!(r.set("a", Value::Undefined).is_err());
    }

    #[test]
    fn empty_singleton_is_cached() {
        let schema = point_schema();
        let a = Record::empty(&schema);
        let b = Record::empty(&schema);
        assert!(a.same_instance(&b));
        assert_eq!(a.get("x"), Some(&Value::Int(0)));
    }

    #[test]
    fn listener_fires_with_successor() {
        let a = point(1, 2);
        let fired: Rc<Cell<i64>> = Rc::new(Cell::new(-1));
        let seen = fired.clone();
        a.set_listener(
            "ui",
            Rc::new(move |next| {
                seen.set(next.get("x").unwrap().as_int().unwrap());
            }),
        );
        a.set("x", Value::Int(42)).unwrap();
        assert_eq!(fired.get(), 42);
    }

    #[test]
    fn listener_not_fired_on_equal_value_set() {
        let a = point(1, 2);
        let fired = Rc::new(Cell::new(false));
        let seen = fired.clone();
        a.set_listener("ui", Rc::new(move |_| seen.set(true)));
        a.set("x", Value::Int(1)).unwrap();
        assert!(!fired.get());
    }

    #[test]
    fn registering_under_same_key_replaces() {
        let a = point(1, 2);
        let first = Rc::new(Cell::new(false));
        let second = Rc::new(Cell::new(false));
        let f = first.clone();
        let s = second.clone();
        a.set_listener("ui", Rc::new(move |_| f.set(true)));
        a.set_listener("ui", Rc::new(move |_| s.set(true)));
        a.set("x", Value::Int(3)).unwrap();
        assert!(!first.get());
        assert!(second.get());
    }

    #[test]
    fn listener_may_reregister_reentrantly() {
        let a = point(1, 2);
        let count = Rc::new(Cell::new(0u32));
        let c = count.clone();
        a.set_listener(
            "ui",
            Rc::new(move |next| {
                c.set(c.get() + 1);
                // Re-subscribing to the successor must not panic
                next.set_listener("ui", Rc::new(|_| {}));
            }),
        );
        let b = a.set("x", Value::Int(5)).unwrap();
        assert_eq!(count.get(), 1);
        assert!(b.has_listener("ui"));
    }

    #[test]
    fn replace_child_requires_structural_field() {
        let schema = Schema::builder("record_test_Holder")
            .field(FieldDescriptor::new("n", FieldShape::Int))
            .field(
                FieldDescriptor::new("items", FieldShape::List(Box::new(FieldShape::Int))),
            )
            .build()
            .unwrap();
        let r = Record::new(
            &schema,
            [("n", Value::Int(1)), ("items", Value::List(vec![]))],
        )
        .unwrap();
        assert!(r.replace_child("n", Value::Int(2)).is_err());
        let r2 = r
            .replace_child("items", Value::List(vec![Value::Int(3)]))
            .unwrap();
        assert_eq!(r2.get("items").unwrap().as_list().unwrap().len(), 1);
    }

    #[test]
    fn children_enumerates_structural_fields_only() {
        let inner_schema = point_schema();
        let schema = Schema::builder("record_test_Outer")
            .field(FieldDescriptor::new("counter", FieldShape::Int))
            .field(
                FieldDescriptor::new("inner", FieldShape::Message(inner_schema.clone())),
            )
            .build()
            .unwrap();
        let r = Record::new(
            &schema,
            [
                ("counter", Value::Int(0)),
                ("inner", Value::Record(point(1, 2))),
            ],
        )
        .unwrap();
        let names: Vec<&str> = r.children().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["inner"]);
    }
}
