//! # Error Types
//!
//! Every fatal condition of the resolver, the arena and the document loader is a
//! variant of [`TimelineError`]. A failed `resolve()` leaves the cache of the
//! walked subtree in an indeterminate state; fix the tree and resolve again.
//!
//! ## Usage
//! ```rust
//! use musictime::{resolve_document, TimelineError};
//!
//! let source = "song: { type: Song, position: 1 wn }";
//! match resolve_document(source) {
//!     Err(TimelineError::RootPosition) => {}
//!     other => panic!("unexpected: {:?}", other.map(|_| ())),
//! }
//! ```

use crate::node::NodeKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimelineError {
    /// A parentless node carries a nonzero position.
    ///
    /// # Example
    /// ```
    /// # use musictime::TimelineError;
    /// let err = TimelineError::RootPosition;
    /// assert_eq!(err.to_string(), "Top object cannot have a non-zero position");
    /// ```
    #[error("Top object cannot have a non-zero position")]
    RootPosition,

    /// A meta in an absolute-mode meta list is positioned in beats or measures.
    #[error("Absolute meta lists must only have fixed duration units, found '{unit}'")]
    NonFixedMetaUnit { unit: String },

    /// A meta in a relative-mode meta list has a negative position.
    #[error("Negative time values not allowed in relative meta list")]
    NegativeRelativeMeta,

    /// The stepper cannot convert this unit to seconds or whole notes.
    #[error("Bad duration unit: {unit}")]
    UnsupportedUnit { unit: String },

    /// Stepping was attempted while no tempo was in effect.
    #[error("Cannot step without a tempo")]
    NoTempo,

    /// A duration string did not match `<rational> <unit>`.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// A node violates the schema of its kind or of the slot it is placed in.
    ///
    /// # Example
    /// ```
    /// # use musictime::{NodeKind, TimelineError};
    /// let err = TimelineError::Schema {
    ///     kind: NodeKind::Tempo,
    ///     message: "metas cannot have a duration".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Invalid Tempo: metas cannot have a duration");
    /// ```
    #[error("Invalid {kind}: {message}")]
    Schema { kind: NodeKind, message: String },

    /// A layer split/merge or note (un)wrapping was asked of a container whose
    /// children are positioned relative to each other.
    ///
    /// # Example
    /// ```
    /// # use musictime::TimelineError;
    /// let err = TimelineError::RelativeContainer { operation: "split_by_layers" };
    /// assert_eq!(
    ///     err.to_string(),
    ///     "split_by_layers can only be used with absolute-time containers"
    /// );
    /// ```
    #[error("{operation} can only be used with absolute-time containers")]
    RelativeContainer { operation: &'static str },

    #[error("No containers to merge")]
    NothingToMerge,

    /// A node id does not belong to this timeline.
    #[error("Unknown node")]
    UnknownNode,

    /// Invalid `settings` header in a document.
    #[error("Invalid settings: {0}")]
    Metadata(String),

    #[error("Invalid document: {0}")]
    Document(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TimelineError {
    pub(crate) fn schema(kind: NodeKind, message: impl Into<String>) -> Self {
        TimelineError::Schema {
            kind,
            message: message.into(),
        }
    }
}
