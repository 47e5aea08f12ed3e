// Layer 1: Standard library imports
use std::sync::OnceLock;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::value::{Lit, NativeProc, Proc, Rec, Value, ValueOrVar};

static SYSTEM_MODULE: OnceLock<Value> = OnceLock::new();

/// The built-in `system` module: streaming primitives and the actor cfg
/// constructor the lowering pass targets.
///
/// ```text
/// system#{ActorCfg: ActorCfg#{new: ..}, Iter: Iter#{new: ..}, Stream: Stream#{new: ..}}
/// ```
pub(crate) fn system_module() -> Value {
    SYSTEM_MODULE.get_or_init(build).clone()
}

fn build() -> Value {
    let stream = singleton_rec("Stream", NativeProc::StreamNew);
    let iter = singleton_rec("Iter", NativeProc::IterNew);
    let cfg = singleton_rec("ActorCfg", NativeProc::CfgNew);
    rec_value(
        "system",
        vec![
            (Lit::str("Stream"), ValueOrVar::Value(stream)),
            (Lit::str("Iter"), ValueOrVar::Value(iter)),
            (Lit::str("ActorCfg"), ValueOrVar::Value(cfg)),
        ],
    )
}

fn singleton_rec(label: &str, ctor: NativeProc) -> Value {
    rec_value(
        label,
        vec![(
            Lit::str("new"),
            ValueOrVar::Value(Value::Proc(Proc::Native(ctor))),
        )],
    )
}

fn rec_value(label: &str, fields: Vec<(Lit, ValueOrVar)>) -> Value {
    match Rec::new(Lit::str(label), fields) {
        Ok(rec) => Value::Rec(rec),
        // Unreachable: the features above are distinct literals.
        Err(_) => Value::Nothing,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn system_module_exposes_stream_and_iter() {
        let Value::Rec(module) = system_module() else {
            panic!("system module is not a record");
        };
        for name in ["Stream", "Iter", "ActorCfg"] {
            let slot = module
                .find(&Lit::str(name))
                .unwrap_or_else(|| panic!("missing {name}"));
            match slot.resolved() {
                ValueOrVar::Value(Value::Rec(rec)) => {
                    assert!(rec.find(&Lit::str("new")).is_some());
                }
                other => panic!("{name} is not a record: {other}"),
            }
        }
    }
}
