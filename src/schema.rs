//! Per-kind schema table and construction-time checks.
//!
//! Every [`NodeKind`] maps to a [`KindSchema`] holding the defaults of that kind
//! (time modes, `step_duration`) and the flags the resolver branches on. The
//! `Timeline` runs [`validate_node`] plus the slot checks whenever a node is
//! inserted, so the resolver never sees a structurally invalid tree.
//!
//! | kind              | container | events   | metas    | step | inherits duration |
//! |-------------------|-----------|----------|----------|------|-------------------|
//! | Song              | yes       | absolute | relative | yes  | yes               |
//! | Part              | yes       | absolute | relative | no   | yes               |
//! | Voice             | yes       | relative | relative | no   | yes               |
//! | VerticalContainer | yes       | absolute | relative | yes  | yes               |
//! | NoteChord         | yes       | absolute | relative | yes  | yes               |
//! | Tuplet            | yes       | relative | relative | yes  | no                |
//! | leaves and metas  | no        | -        | -        | yes  | yes               |

use crate::error::TimelineError;
use crate::node::{Node, NodeKind, TimeMode};
use num_traits::Signed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSchema {
    pub container: bool,
    pub meta: bool,
    pub event_time_mode: TimeMode,
    pub meta_time_mode: TimeMode,
    pub step_duration: bool,
    /// Use the parent's effective duration when no own duration is given
    pub inherits_duration: bool,
    /// Disable instead of partially rendering when the trim window cuts the start
    pub suppress_when_trimmed: bool,
    /// Kind used by the document loader for children without a `type`
    pub default_child: Option<NodeKind>,
}

const LEAF: KindSchema = KindSchema {
    container: false,
    meta: false,
    event_time_mode: TimeMode::Relative,
    meta_time_mode: TimeMode::Relative,
    step_duration: true,
    inherits_duration: true,
    suppress_when_trimmed: false,
    default_child: None,
};

const CONTAINER: KindSchema = KindSchema {
    container: true,
    default_child: Some(NodeKind::Note),
    ..LEAF
};

const VERTICAL: KindSchema = KindSchema {
    event_time_mode: TimeMode::Absolute,
    ..CONTAINER
};

impl NodeKind {
    pub fn schema(self) -> KindSchema {
        match self {
            NodeKind::Song => VERTICAL,
            NodeKind::Part => KindSchema {
                step_duration: false,
                default_child: Some(NodeKind::Voice),
                ..VERTICAL
            },
            NodeKind::VerticalContainer => VERTICAL,
            NodeKind::NoteChord => KindSchema {
                suppress_when_trimmed: true,
                ..VERTICAL
            },
            NodeKind::Voice => KindSchema {
                step_duration: false,
                ..CONTAINER
            },
            NodeKind::Tuplet => KindSchema {
                inherits_duration: false,
                ..CONTAINER
            },
            NodeKind::Note => KindSchema {
                suppress_when_trimmed: true,
                ..LEAF
            },
            NodeKind::Rest | NodeKind::Chord | NodeKind::Audio => LEAF,
            NodeKind::Tempo | NodeKind::Time | NodeKind::Key | NodeKind::Clef => {
                KindSchema { meta: true, ..LEAF }
            }
        }
    }
}

/// Field constraints of a node, independent of where it is placed.
pub fn validate_node(node: &Node) -> Result<(), TimelineError> {
    let kind = node.kind();
    let event = &node.event;

    if !event.amp.is_finite() || event.amp < 0.0 {
        let message = format!("amp must be >= 0, got {}", event.amp);
        return Err(TimelineError::schema(kind, message));
    }
    if let Some(scale) = event.scale.as_ref().filter(|scale| !scale.is_positive()) {
        let message = format!("scale must be positive, got {}", scale);
        return Err(TimelineError::schema(kind, message));
    }
    if let Some(duration) = event.duration.as_ref().filter(|d| d.is_negative()) {
        let message = format!("duration must not be negative, got {}", duration);
        return Err(TimelineError::schema(kind, message));
    }
    if kind.schema().meta != node.meta_payload().is_some() {
        return Err(TimelineError::schema(kind, "meta payload does not match node kind"));
    }
    if let Some(meta) = node.meta_payload() {
        meta.validate()?;
    }
    Ok(())
}

/// A node going into a container's `events` list.
pub fn validate_event_slot(parent: &Node, node: &Node) -> Result<(), TimelineError> {
    if !parent.is_container() {
        return Err(TimelineError::schema(parent.kind(), "only containers can hold events"));
    }
    if node.kind().schema().meta {
        return Err(TimelineError::schema(node.kind(), "metas belong in the metas list"));
    }
    Ok(())
}

/// A node going into a container's `metas` list.
pub fn validate_meta_slot(parent: &Node, node: &Node) -> Result<(), TimelineError> {
    let kind = node.kind();
    if !parent.is_container() {
        return Err(TimelineError::schema(parent.kind(), "only containers can hold metas"));
    }
    if !kind.schema().meta {
        return Err(TimelineError::schema(kind, "only metas can be placed in a meta list"));
    }
    if node.event.duration.as_ref().is_some_and(|d| !d.is_zero()) {
        return Err(TimelineError::schema(kind, "metas cannot have a duration"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{ratio, Duration};
    use crate::meta::Tempo;

    #[test]
    fn test_kind_defaults() {
        assert_eq!(NodeKind::Voice.schema().event_time_mode, TimeMode::Relative);
        assert_eq!(NodeKind::NoteChord.schema().event_time_mode, TimeMode::Absolute);
        assert!(!NodeKind::Tuplet.schema().inherits_duration);
        assert!(!NodeKind::Part.schema().step_duration);
        assert!(NodeKind::Note.schema().step_duration);
        assert!(NodeKind::Note.schema().suppress_when_trimmed);
        assert!(!NodeKind::Rest.schema().suppress_when_trimmed);
        assert_eq!(NodeKind::Part.schema().default_child, Some(NodeKind::Voice));
    }

    #[test]
    fn test_validate_node() {
        assert!(validate_node(&Node::note(Duration::wn(1, 4))).is_ok());
        assert!(validate_node(&Node::new(NodeKind::Note).with_amp(-0.5)).is_err());
        assert!(validate_node(&Node::new(NodeKind::Tuplet).with_scale(ratio(0, 1))).is_err());
        assert!(validate_node(&Node::meta(Tempo::bpm(0))).is_err());
    }

    #[test]
    fn test_slots() {
        let voice = Node::new(NodeKind::Voice);
        let note = Node::note(Duration::wn(1, 4));
        let tempo = Node::meta(Tempo::bpm(90));

        assert!(validate_event_slot(&voice, &note).is_ok());
        assert!(validate_event_slot(&voice, &tempo).is_err());
        assert!(validate_event_slot(&note, &note).is_err());

        assert!(validate_meta_slot(&voice, &tempo).is_ok());
        assert!(validate_meta_slot(&voice, &note).is_err());
        let long_tempo = Node::meta(Tempo::bpm(90)).with_duration(Duration::wn(1, 1));
        assert!(validate_meta_slot(&voice, &long_tempo).is_err());
    }
}
