// ABOUTME: Object metadata (revisions) and mutation preconditions.
// ABOUTME: Converts between the public types and their wire messages.

use atomix_proto as pb;

/// Monotonic version stamp assigned by the server. Zero means "none".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(pub u64);

/// Metadata attached to a stored object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub revision: Revision,
}

impl ObjectMeta {
    pub fn new(revision: u64) -> Self {
        Self {
            revision: Revision(revision),
        }
    }

    pub(crate) fn from_proto(meta: Option<pb::ObjectMeta>) -> Self {
        meta.map(|m| Self::new(m.revision)).unwrap_or_default()
    }

    pub(crate) fn to_proto(self) -> pb::ObjectMeta {
        pb::ObjectMeta {
            revision: self.revision.0,
        }
    }
}

/// A condition the server must verify before applying a mutation.
///
/// A failed precondition comes back as `ErrorKind::Conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Apply only if the stored revision equals this one.
    IfMatch(ObjectMeta),
    /// Apply only if nothing is stored yet.
    IfNotSet,
}

impl Precondition {
    pub(crate) fn to_proto(self) -> pb::Precondition {
        match self {
            Precondition::IfMatch(meta) => pb::Precondition {
                metadata: Some(meta.to_proto()),
                not_set: false,
            },
            Precondition::IfNotSet => pb::Precondition {
                metadata: None,
                not_set: true,
            },
        }
    }
}

pub(crate) fn preconditions_to_proto(preconditions: &[Precondition]) -> Vec<pb::Precondition> {
    preconditions.iter().map(|p| p.to_proto()).collect()
}
