//! Conflict network data model.
//!
//! A conflict network is a graph over the characters of a story. Relationships
//! are ordinary edges between two characters; conflicts are hyperedges that can
//! span any number of characters. Snapshots freeze the whole network at a point
//! in time and are the only record of its history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      ConflictNetwork                         │
//! │                                                              │
//! │  ┌──────────────┐  ┌───────────────────┐  ┌───────────────┐  │
//! │  │ characters   │  │ relationships     │  │ conflicts     │  │
//! │  │ (id→Char)    │  │ (char ↔ char)     │  │ (char set)    │  │
//! │  └──────────────┘  └───────────────────┘  └───────────────┘  │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ snapshots (append-only deep copies, oldest first)      │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod character;
mod conflict;
mod label;
mod relationship;
mod snapshot;
mod store;
mod table;

pub use character::{Character, CharacterId, CharacterProfile};
pub use conflict::{Conflict, ConflictId, ConflictPhase, ConflictScope, ConflictSubject};
pub use label::{deserialize_lenient, normalize_label, Label};
pub use relationship::{
    Relationship, RelationshipDirection, RelationshipId, RelationshipNature, RelationshipType,
};
pub use snapshot::{NetworkSnapshot, NetworkState};
pub use store::ConflictNetwork;
pub use table::{Keyed, Table};

/// Open key/value bag attached to entities.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
