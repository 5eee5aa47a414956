use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event-sourced aggregate instance.
///
/// Wraps a UUID to provide type safety and prevent mixing up
/// aggregate IDs with other UUID-based identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a deterministic aggregate ID from a name.
    ///
    /// The same name always yields the same ID (UUIDv5). This is how the
    /// checkout pipeline keeps its idempotency keys stable across a
    /// crash-and-replay: ids derived from the session id come out
    /// identical on every execution.
    pub fn derived(name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// Browser session identifier, as issued by the web front end.
///
/// A session is the unit of checkout: one session owns one cart and at
/// most one purchase. All aggregate ids related to a session (cart,
/// checkout record, order, reservation) are derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing session string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the session ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The aggregate ID of this session's cart.
    pub fn cart_id(&self) -> AggregateId {
        AggregateId::derived(&format!("cart:{}", self.0))
    }

    /// The aggregate ID of this session's checkout pipeline record.
    pub fn checkout_id(&self) -> AggregateId {
        AggregateId::derived(&format!("checkout:{}", self.0))
    }

    /// The identifier of the shipping sub-saga spawned for this session.
    pub fn shipping_workflow_id(&self) -> String {
        format!("shipping:{}", self.0)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_id_new_creates_unique_ids() {
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn aggregate_id_derived_is_deterministic() {
        let a = AggregateId::derived("order:session-1");
        let b = AggregateId::derived("order:session-1");
        let c = AggregateId::derived("order:session-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn aggregate_id_serialization_roundtrip() {
        let id = AggregateId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: AggregateId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn session_id_derives_stable_aggregate_ids() {
        let session = SessionId::from_string("s-123");
        assert_eq!(session.cart_id(), session.cart_id());
        assert_ne!(session.cart_id(), session.checkout_id());
        assert_eq!(session.shipping_workflow_id(), "shipping:s-123");
    }

    #[test]
    fn session_id_distinct_sessions_distinct_carts() {
        let a = SessionId::from_string("a");
        let b = SessionId::from_string("b");
        assert_ne!(a.cart_id(), b.cart_id());
    }
}
