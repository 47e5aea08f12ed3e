// Layer 1: Standard library imports
use std::fmt::Write as _;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
use super::kernel::Value;
use crate::util::ActorAddress;

/// The error value a halted actor answers with.
///
/// A failed value records where the halt happened (actor address plus the
/// instruction that was executing), what went wrong (the uncaught error
/// value, optionally a native cause string), and — when the halt came from
/// touching another actor's failed value — the chained `cause`, preserving
/// the full failure path across actor boundaries.
///
/// Failed values travel silently: binding one into a response target does not
/// disturb the receiver. Only *touching* it (resolving it for computation)
/// halts the toucher, which then wraps this value as the `cause` of its own.
#[derive(Debug)]
pub struct FailedValue {
    /// Address of the actor that halted.
    pub actor_address: ActorAddress,
    /// The uncaught error value.
    pub error: Value,
    /// Summary of the instruction that was executing at the halt.
    pub current: String,
    /// The failed value this halt propagated from, if any.
    pub cause: Option<Arc<FailedValue>>,
    /// Host-level exception detail, if any.
    pub native_cause: Option<String>,
    /// When the halt occurred.
    pub created_at: DateTime<Utc>,
}

impl FailedValue {
    /// Build a failed value for a halt in `actor_address`.
    pub fn new(
        actor_address: ActorAddress,
        error: Value,
        current: String,
        cause: Option<Arc<FailedValue>>,
        native_cause: Option<String>,
    ) -> Self {
        Self {
            actor_address,
            error,
            current,
            cause,
            native_cause,
            created_at: Utc::now(),
        }
    }

    /// Render the full failure chain for diagnostic output.
    ///
    /// ```text
    /// FailedValue
    ///   actor: a
    ///   error: error#{'message': 'divide by zero', 'name': 'ArithmeticError'}
    ///   current: apply at 0..0
    ///   caused by:
    ///     FailedValue
    ///       actor: b
    ///       ...
    /// ```
    pub fn to_details_string(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out
    }

    fn render(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        let _ = writeln!(out, "{pad}FailedValue");
        let _ = writeln!(out, "{pad}  actor: {}", self.actor_address);
        let _ = writeln!(out, "{pad}  error: {}", self.error);
        let _ = writeln!(out, "{pad}  current: {}", self.current);
        if let Some(native) = &self.native_cause {
            let _ = writeln!(out, "{pad}  native cause: {native}");
        }
        if let Some(cause) = &self.cause {
            let _ = writeln!(out, "{pad}  caused by:");
            cause.render(out, depth + 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_string_renders_the_chain() {
        let inner = FailedValue::new(
            ActorAddress::named("b"),
            Value::str("boom"),
            "apply at 0..0".to_string(),
            None,
            Some("stack overflow".to_string()),
        );
        let outer = FailedValue::new(
            ActorAddress::named("a"),
            Value::str("boom"),
            "apply at 4..9".to_string(),
            Some(Arc::new(inner)),
            None,
        );
        let details = outer.to_details_string();
        assert!(details.contains("actor: a"));
        assert!(details.contains("caused by:"));
        assert!(details.contains("actor: b"));
        assert!(details.contains("native cause: stack overflow"));
    }
}
