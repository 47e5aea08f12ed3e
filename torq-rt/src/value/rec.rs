// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::kernel::{Value, ValueOrVar};
use super::lit::{Feature, Lit};

/// A labeled record.
///
/// Fields map literal features to [`ValueOrVar`] slots and are kept sorted by
/// feature so lookup is a binary search. The record allocation is immutable;
/// a field slot holding an unbound variable binds later through the store
/// without the record changing identity.
///
/// # Example
/// ```rust
/// use torq_rt::value::{Lit, Rec, Value};
///
/// let rec = Rec::new(
///     Lit::str("point"),
///     vec![
///         (Lit::str("x"), Value::Int(1).into()),
///         (Lit::str("y"), Value::Int(2).into()),
///     ],
/// )
/// .unwrap();
/// assert_eq!(rec.len(), 2);
/// assert!(rec.find(&Lit::str("x")).is_some());
/// ```
#[derive(Clone)]
pub struct Rec(Arc<RecInner>);

struct RecInner {
    label: Lit,
    fields: Vec<(Feature, ValueOrVar)>,
}

impl Rec {
    /// Build a record, sorting fields by feature.
    ///
    /// Returns the offending feature when the same feature appears twice.
    pub fn new(label: Lit, mut fields: Vec<(Feature, ValueOrVar)>) -> Result<Self, Feature> {
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in fields.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(pair[0].0.clone());
            }
        }
        Ok(Self(Arc::new(RecInner { label, fields })))
    }

    /// The record label.
    pub fn label(&self) -> &Lit {
        &self.0.label
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.fields.len()
    }

    /// True when the record carries no fields.
    pub fn is_empty(&self) -> bool {
        self.0.fields.is_empty()
    }

    /// Look up a field slot by feature.
    pub fn find(&self, feature: &Feature) -> Option<&ValueOrVar> {
        self.0
            .fields
            .binary_search_by(|(f, _)| f.cmp(feature))
            .ok()
            .map(|i| &self.0.fields[i].1)
    }

    /// Iterate fields in feature order.
    pub fn fields(&self) -> impl Iterator<Item = &(Feature, ValueOrVar)> {
        self.0.fields.iter()
    }

    /// Identity comparison (same allocation).
    pub fn same_identity(&self, other: &Rec) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Structural comparison over resolved slots.
    ///
    /// Unbound slots compare equal only when they are the same variable.
    pub fn structurally_equal(&self, other: &Rec) -> bool {
        if self.same_identity(other) {
            return true;
        }
        if self.0.label != other.0.label || self.len() != other.len() {
            return false;
        }
        self.fields()
            .zip(other.fields())
            .all(|((fa, va), (fb, vb))| fa == fb && slots_equal(va, vb))
    }
}

impl Display for Rec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.label != Lit::Nothing {
            write!(f, "{}#", self.0.label)?;
        }
        write!(f, "{{")?;
        for (i, (feature, slot)) in self.fields().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{feature}: {slot}")?;
        }
        write!(f, "}}")
    }
}

/// A labeled tuple: a record whose features are `0..n-1` in insertion order.
#[derive(Clone)]
pub struct TupleVal(Arc<TupleInner>);

struct TupleInner {
    label: Lit,
    items: Vec<ValueOrVar>,
}

impl TupleVal {
    /// Build a tuple.
    pub fn new(label: Lit, items: Vec<ValueOrVar>) -> Self {
        Self(Arc::new(TupleInner { label, items }))
    }

    /// The tuple label.
    pub fn label(&self) -> &Lit {
        &self.0.label
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.0.items.len()
    }

    /// True when the tuple carries no items.
    pub fn is_empty(&self) -> bool {
        self.0.items.is_empty()
    }

    /// The slot at a position.
    pub fn item(&self, index: usize) -> Option<&ValueOrVar> {
        self.0.items.get(index)
    }

    /// Iterate items in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &ValueOrVar> {
        self.0.items.iter()
    }

    /// Identity comparison (same allocation).
    pub fn same_identity(&self, other: &TupleVal) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Structural comparison over resolved slots.
    pub fn structurally_equal(&self, other: &TupleVal) -> bool {
        if self.same_identity(other) {
            return true;
        }
        self.0.label == other.0.label
            && self.len() == other.len()
            && self.items().zip(other.items()).all(|(a, b)| slots_equal(a, b))
    }
}

impl Display for TupleVal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.label != Lit::Nothing {
            write!(f, "{}#", self.0.label)?;
        }
        write!(f, "[")?;
        for (i, slot) in self.items().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{slot}")?;
        }
        write!(f, "]")
    }
}

fn slots_equal(a: &ValueOrVar, b: &ValueOrVar) -> bool {
    match (a.resolved(), b.resolved()) {
        (ValueOrVar::Value(x), ValueOrVar::Value(y)) => x == y,
        (ValueOrVar::Var(x), ValueOrVar::Var(y)) => x.same(&y),
        _ => false,
    }
}

/// Build an `error#{name: ..., message: ...}` record.
///
/// This is the shape every kernel-visible fault takes: unification mismatch,
/// feature-not-found, invalid argument count, and native exceptions are all
/// thrown as error records through the normal throw path.
pub fn error_rec(name: &str, message: impl AsRef<str>) -> Value {
    let fields = vec![
        (Lit::str("name"), ValueOrVar::Value(Value::str(name))),
        (
            Lit::str("message"),
            ValueOrVar::Value(Value::str(message.as_ref())),
        ),
    ];
    match Rec::new(Lit::str("error"), fields) {
        Ok(rec) => Value::Rec(rec),
        // Unreachable: the two features above are distinct.
        Err(_) => Value::str(name),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_sorted_and_looked_up_by_feature() {
        let rec = Rec::new(
            Lit::Nothing,
            vec![
                (Lit::str("b"), ValueOrVar::Value(Value::Int(2))),
                (Lit::str("a"), ValueOrVar::Value(Value::Int(1))),
            ],
        )
        .unwrap();
        let a = rec.find(&Lit::str("a")).unwrap();
        match a.resolved() {
            ValueOrVar::Value(Value::Int(1)) => {}
            other => panic!("unexpected slot: {other}"),
        }
        assert!(rec.find(&Lit::str("c")).is_none());
    }

    #[test]
    fn duplicate_features_are_rejected() {
        let dup = Rec::new(
            Lit::Nothing,
            vec![
                (Lit::Int(0), ValueOrVar::Value(Value::Nothing)),
                (Lit::Int(0), ValueOrVar::Value(Value::Nothing)),
            ],
        );
        assert_eq!(dup.err(), Some(Lit::Int(0)));
    }

    #[test]
    fn display_includes_label_unless_nothing() {
        let rec = Rec::new(
            Lit::str("point"),
            vec![(Lit::str("x"), ValueOrVar::Value(Value::Int(1)))],
        )
        .unwrap();
        assert_eq!(rec.to_string(), "'point'#{'x': 1}");

        let tup = TupleVal::new(
            Lit::Nothing,
            vec![
                ValueOrVar::Value(Value::Int(1)),
                ValueOrVar::Value(Value::Int(2)),
            ],
        );
        assert_eq!(tup.to_string(), "[1, 2]");
    }

    #[test]
    fn error_rec_shape() {
        let err = error_rec("TypeError", "expected int");
        match err {
            Value::Rec(rec) => {
                assert_eq!(rec.label(), &Lit::str("error"));
                assert!(rec.find(&Lit::str("name")).is_some());
                assert!(rec.find(&Lit::str("message")).is_some());
            }
            other => panic!("not a record: {other}"),
        }
    }
}
