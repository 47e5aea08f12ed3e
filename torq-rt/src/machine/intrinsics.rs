// Layer 1: Standard library imports
use std::sync::OnceLock;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::store::env::{ident, Env};
use crate::store::var::VarRef;
use crate::value::{NativeProc, Proc, Value};

static ROOT_ENV: OnceLock<Env> = OnceLock::new();

/// The process-wide root environment.
///
/// Built once, never mutated. It is the base frame of every call environment
/// and carries the intrinsic procedures `act`, `import`, `respond`, `self`,
/// and `spawn`.
pub(crate) fn root_env() -> &'static Env {
    ROOT_ENV.get_or_init(|| {
        let entry = |name: &str, native: NativeProc| {
            (
                ident(name),
                VarRef::bound(Value::Proc(Proc::Native(native))),
            )
        };
        Env::new(vec![
            entry("act", NativeProc::Act),
            entry("import", NativeProc::Import),
            entry("respond", NativeProc::Respond),
            entry("self", NativeProc::SelfRef),
            entry("spawn", NativeProc::Spawn),
        ])
    })
}

/// True when `var` is the root environment's binding for `name`.
///
/// `spawn` uses this to exclude static root references from its captured-
/// environment completeness walk.
pub(crate) fn is_root_binding(name: &str, var: &VarRef) -> bool {
    root_env().binds_same(name, var)
}
