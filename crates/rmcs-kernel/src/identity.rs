//! Connection identities and the population they form.
//!
//! Identities are handed out once, in creation order, starting at 1. The
//! operator connection is always created first and therefore always holds
//! identity 1; controllers follow in discovery order and occupy the
//! contiguous suffix `[N-G+1 ..= N]` of the identity space.

use rmcs_types::ConnectionId;

// ────────────────────────────────────────────────────────────────────────────
// Allocation
// ────────────────────────────────────────────────────────────────────────────

/// Monotonic identity counter owned by the startup path.
///
/// # Example
///
/// ```
/// use rmcs_kernel::identity::IdAllocator;
///
/// let mut ids = IdAllocator::new();
/// assert_eq!(ids.allocate().get(), 1);
/// assert_eq!(ids.allocate().get(), 2);
/// assert_eq!(ids.issued(), 2);
/// ```
#[derive(Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next identity. Identities are never reused.
    pub fn allocate(&mut self) -> ConnectionId {
        let raw = self.next;
        self.next = self.next.saturating_add(1);
        // `next` starts at 1 and only grows, so the conversion cannot fail.
        ConnectionId::new(i64::from(raw)).unwrap_or(ConnectionId::OPERATOR)
    }

    /// Number of identities handed out so far.
    pub fn issued(&self) -> u32 {
        self.next - 1
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Population
// ────────────────────────────────────────────────────────────────────────────

/// Shape of the connection set: `total` connections, the last `controllers`
/// of which are game controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Population {
    total: u32,
    controllers: u32,
}

impl Population {
    /// `controllers` is capped at `total - 1`: the operator is always present.
    pub fn new(total: u32, controllers: u32) -> Self {
        let total = total.max(1);
        Self {
            total,
            controllers: controllers.min(total - 1),
        }
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn controllers(&self) -> u32 {
        self.controllers
    }

    /// `true` when exactly one controller is present.
    pub fn is_solo(&self) -> bool {
        self.controllers == 1
    }

    /// Lowest controller identity, `N - G + 1`, if any controller exists.
    pub fn first_controller(&self) -> Option<ConnectionId> {
        if self.controllers == 0 {
            return None;
        }
        ConnectionId::new(i64::from(self.total - self.controllers + 1))
    }

    /// Owner used for the sentinel and for out-of-range requests.
    pub fn fallback(&self) -> ConnectionId {
        self.first_controller().unwrap_or(ConnectionId::OPERATOR)
    }

    /// Whether `id` names an existing connection.
    pub fn contains(&self, id: ConnectionId) -> bool {
        id.get() <= self.total
    }

    /// Identity the startup path requests every channel for: the first
    /// controller when controllers are prioritized, otherwise the operator.
    /// With no controllers the prioritized target is `N + 1`, left for the
    /// arbiter to resolve.
    pub fn initial_owner(&self, prioritize_controllers: bool) -> ConnectionId {
        if !prioritize_controllers {
            return ConnectionId::OPERATOR;
        }
        ConnectionId::new(i64::from(self.total - self.controllers + 1))
            .unwrap_or(ConnectionId::OPERATOR)
    }
}
