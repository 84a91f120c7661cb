//! Typed handles into the topology arena and the entity kind tags.

use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

/// The closed set of topological entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Vertex,
    Edge,
    Loop,
    Face,
    Shell,
    Body,
}

impl EntityKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Edge => "edge",
            Self::Loop => "loop",
            Self::Face => "face",
            Self::Shell => "shell",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Common behaviour of every arena handle.
pub trait EntityId: Copy + Eq + Ord + Hash + fmt::Debug {
    const KIND: EntityKind;

    fn from_index(index: usize) -> Self;

    fn index(self) -> usize;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            #[must_use]
            pub const fn new(id: usize) -> Self {
                Self(id)
            }
        }

        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self::new(value)
            }
        }

        impl EntityId for $name {
            const KIND: EntityKind = EntityKind::$kind;

            fn from_index(index: usize) -> Self {
                Self(index)
            }

            fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", EntityKind::$kind.label(), self.0)
            }
        }
    };
}

entity_id!(VertexId => Vertex);
entity_id!(EdgeId => Edge);
entity_id!(LoopId => Loop);
entity_id!(FaceId => Face);
entity_id!(ShellId => Shell);
entity_id!(BodyId => Body);

/// Handle of an entity mesh registered in a mesh model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeshId(pub usize);

impl MeshId {
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }
}

impl From<usize> for MeshId {
    fn from(value: usize) -> Self {
        Self::new(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status flags
// ─────────────────────────────────────────────────────────────────────────────

/// Small bitset of per-entity state markers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const NONE: Self = Self(0);
    pub const DELETED: Self = Self(1);
    pub const DEGENERATE: Self = Self(1 << 1);
    pub const MESHED: Self = Self(1 << 2);
    pub const THIN_ZONE: Self = Self(1 << 3);
    pub const THIN_PEAK: Self = Self(1 << 4);
    /// Meshing was attempted and cancelled.
    pub const MESH_FAILED: Self = Self(1 << 5);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_kind() {
        assert_eq!(VertexId::new(3).to_string(), "vertex#3");
        assert_eq!(FaceId::from(7).to_string(), "face#7");
        assert_eq!(EdgeId::KIND, EntityKind::Edge);
    }

    #[test]
    fn status_flags_insert_and_remove() {
        let mut s = StatusFlags::NONE;
        assert!(s.is_empty());
        s.insert(StatusFlags::DEGENERATE);
        s.insert(StatusFlags::THIN_ZONE);
        assert!(s.contains(StatusFlags::DEGENERATE));
        assert!(!s.contains(StatusFlags::DELETED));
        s.remove(StatusFlags::DEGENERATE);
        assert!(!s.contains(StatusFlags::DEGENERATE));
        assert!(s.contains(StatusFlags::THIN_ZONE));
    }
}
