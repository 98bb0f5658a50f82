//! `rmcs-kernel` – ownership arbitration.
//!
//! The kernel decides which connection may drive each [`Channel`]. It does
//! not read hardware and does not talk to the network; it only enforces who
//! is allowed to publish what.
//!
//! # Modules
//!
//! - [`identity`] – [`IdAllocator`][identity::IdAllocator] hands out
//!   connection identities in creation order, and
//!   [`Population`][identity::Population] answers "who is the fallback
//!   owner?" for a given set of connections.
//! - [`ownership`] – [`OwnershipCache`][ownership::OwnershipCache]: the
//!   per-connection, lock-free replica of the ownership table.
//! - [`connection`] – [`Connection`][connection::Connection] and the
//!   [`Participant`][connection::Participant] seam the arbiter broadcasts
//!   through.
//! - [`arbiter`] – [`Arbiter`][arbiter::Arbiter]: the single thread that
//!   resolves handoff requests in submission order and applies each result
//!   to every participant before taking the next one.
//!
//! [`Channel`]: rmcs_types::Channel

pub mod arbiter;
pub mod connection;
pub mod identity;
pub mod ownership;

pub use arbiter::{Arbiter, OwnershipHandle};
pub use connection::{Connection, Participant, Role};
pub use identity::{IdAllocator, Population};
pub use ownership::OwnershipCache;
