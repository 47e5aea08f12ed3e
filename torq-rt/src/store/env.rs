// Layer 1: Standard library imports
use std::fmt::{self, Debug};
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::var::VarRef;

/// A kernel identifier.
pub type Ident = Arc<str>;

/// Intern an identifier from a string slice.
pub fn ident(s: impl AsRef<str>) -> Ident {
    Arc::from(s.as_ref())
}

/// An immutable environment frame chained to a parent.
///
/// Lookup walks leaf-to-root, so inner frames shadow outer ones. Frames are
/// `Arc`-shared: extending an environment allocates one node and leaves every
/// existing chain untouched.
///
/// # Example
/// ```rust
/// use torq_rt::store::{ident, Env, VarRef};
///
/// let outer = Env::new(vec![(ident("x"), VarRef::new())]);
/// let shadow = VarRef::new();
/// let inner = outer.extend(vec![(ident("x"), shadow.clone())]);
/// assert!(inner.get("x").unwrap().same(&shadow));
/// assert!(!outer.get("x").unwrap().same(&shadow));
/// ```
#[derive(Clone)]
pub struct Env(Arc<EnvNode>);

struct EnvNode {
    entries: Vec<(Ident, VarRef)>,
    parent: Option<Env>,
}

impl Env {
    /// A root frame with no parent.
    pub fn new(entries: Vec<(Ident, VarRef)>) -> Self {
        Self(Arc::new(EnvNode {
            entries,
            parent: None,
        }))
    }

    /// A child frame chained to `self`.
    pub fn extend(&self, entries: Vec<(Ident, VarRef)>) -> Self {
        Self(Arc::new(EnvNode {
            entries,
            parent: Some(self.clone()),
        }))
    }

    /// Look up an identifier, leaf-to-root.
    pub fn get(&self, name: &str) -> Option<VarRef> {
        let mut frame = Some(self);
        while let Some(env) = frame {
            for (ident, var) in &env.0.entries {
                if &**ident == name {
                    return Some(var.clone());
                }
            }
            frame = env.0.parent.as_ref();
        }
        None
    }

    /// True when this environment binds `name` to exactly `var`.
    pub fn binds_same(&self, name: &str, var: &VarRef) -> bool {
        self.get(name).is_some_and(|bound| bound.same(var))
    }
}

impl Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut frames = 0;
        let mut names = 0;
        let mut frame = Some(self);
        while let Some(env) = frame {
            frames += 1;
            names += env.0.entries.len();
            frame = env.0.parent.as_ref();
        }
        write!(f, "Env({names} names in {frames} frames)")
    }
}
