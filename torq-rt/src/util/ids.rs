// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
// (none)

/// Unique identifier for actors in the system.
///
/// Uses UUID v4 for globally unique identifiers with excellent collision
/// resistance. Implements cheap cloning via the Copy trait.
///
/// # Example
/// ```rust
/// use torq_rt::util::ActorId;
///
/// let id1 = ActorId::new();
/// let id2 = ActorId::new();
/// assert_ne!(id1, id2); // Globally unique
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generate a new random ActorId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an ActorId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActorId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for messages.
///
/// External clients stamp their requests with a MessageId so the matching
/// response can be correlated without sharing any dataflow state.
///
/// # Example
/// ```rust
/// use torq_rt::util::MessageId;
///
/// let id = MessageId::new();
/// println!("Message ID: {id}");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generate a new random MessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a MessageId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hierarchical actor address.
///
/// An address pairs a globally unique [`ActorId`] with a human-readable path.
/// Children spawned by an actor extend the parent path with the child ordinal
/// (`parent/0`, `parent/1`, ...), which keeps failure diagnostics and trace
/// output self-describing.
///
/// Address equality is identity equality: two addresses are equal when their
/// ids are equal, regardless of path.
///
/// # Example
/// ```rust
/// use torq_rt::util::ActorAddress;
///
/// let parent = ActorAddress::named("factorial");
/// let child = parent.child(0);
/// assert_eq!(child.path(), "factorial/0");
/// assert_ne!(parent, child);
/// ```
#[derive(Debug, Clone)]
pub struct ActorAddress {
    id: ActorId,
    path: Arc<str>,
}

impl ActorAddress {
    /// Create an address with the given path.
    pub fn named(path: impl AsRef<str>) -> Self {
        Self {
            id: ActorId::new(),
            path: Arc::from(path.as_ref()),
        }
    }

    /// Create an anonymous address (path derived from the id).
    pub fn anonymous() -> Self {
        let id = ActorId::new();
        let path = Arc::from(format!("anon-{id}").as_str());
        Self { id, path }
    }

    /// Derive the address of the n-th child of this actor.
    pub fn child(&self, ordinal: u64) -> Self {
        Self {
            id: ActorId::new(),
            path: Arc::from(format!("{}/{ordinal}", self.path).as_str()),
        }
    }

    /// The unique actor id.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// The human-readable path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl PartialEq for ActorAddress {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ActorAddress {}

impl Display for ActorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actor_ids_are_unique() {
        let a = ActorId::new();
        let b = ActorId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn child_addresses_extend_the_parent_path() {
        let parent = ActorAddress::named("root");
        let c0 = parent.child(0);
        let c1 = parent.child(1);
        assert_eq!(c0.path(), "root/0");
        assert_eq!(c1.path(), "root/1");
        assert_eq!(c0.child(3).path(), "root/0/3");
    }

    #[test]
    fn address_equality_is_by_id() {
        let a = ActorAddress::named("same");
        let b = ActorAddress::named("same");
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }
}
