//! # Nodes
//!
//! A [`Node`] is one entry of the event tree: a note, rest, chord or audio clip,
//! a container (song, part, voice, chord stack, tuplet), or a meta event.
//!
//! ## Structural vs computed fields
//! The structural fields in [`Event`] are what authors write. Everything in
//! [`Cache`] is produced by `Timeline::resolve` and is recomputed from scratch on
//! every resolution.
//!
//! ## Containers
//! Containers own two lists: `events` (children, which may nest) and `metas`
//! (tempo/time/key/clef changes, which never nest). Each list has its own
//! [`TimeMode`]:
//! - **absolute**: positions are relative to the container's start
//! - **relative**: positions are relative to the previous entry's end

use crate::cache::Cache;
use crate::duration::{Duration, Rational};
use crate::meta::Meta;
use crate::timeline::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // Containers
    Song,
    Part,
    Voice,
    VerticalContainer,
    NoteChord,
    Tuplet,
    // Leaves
    Note,
    Rest,
    Chord,
    Audio,
    // Metas
    Tempo,
    Time,
    Key,
    Clef,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Addressing mode of a container's `events` or `metas` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    Absolute,
    Relative,
}

/// Structural timing fields shared by every node kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub position: Option<Duration>,
    pub duration: Option<Duration>,
    pub trim_left: Option<Duration>,
    pub trim_right: Option<Duration>,
    /// Carried for consumers; not used by the resolver.
    pub anchor: Option<Duration>,
    pub playback_timing: Option<Duration>,
    /// Multiplicative, 1.0 by default
    pub amp: f64,
    pub repeat: u32,
    /// Whether the next sibling in a relative container starts at this node's end
    pub step_duration: bool,
    pub scale: Option<Rational>,
    pub layer: Option<u32>,
    pub enabled: bool,
    /// Opaque payload such as a pitch or chord symbol
    pub label: Option<String>,
}

impl Event {
    pub fn for_kind(kind: NodeKind) -> Self {
        Self {
            position: None,
            duration: None,
            trim_left: None,
            trim_right: None,
            anchor: None,
            playback_timing: None,
            amp: 1.0,
            repeat: 1,
            step_duration: kind.schema().step_duration,
            scale: None,
            layer: None,
            enabled: true,
            label: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) parent: Option<NodeId>,
    kind: NodeKind,
    meta: Option<Meta>,
    pub event: Event,
    pub event_time_mode: TimeMode,
    pub meta_time_mode: TimeMode,
    pub(crate) events: Vec<NodeId>,
    pub(crate) metas: Vec<NodeId>,
    pub(crate) cache: Cache,
}

impl Node {
    /// A node with the defaults of its kind. Meta kinds get a default payload.
    pub fn new(kind: NodeKind) -> Self {
        let schema = kind.schema();
        Self {
            parent: None,
            kind,
            meta: Meta::default_for(kind),
            event: Event::for_kind(kind),
            event_time_mode: schema.event_time_mode,
            meta_time_mode: schema.meta_time_mode,
            events: Vec::new(),
            metas: Vec::new(),
            cache: Cache::default(),
        }
    }

    pub fn meta(meta: impl Into<Meta>) -> Self {
        let meta = meta.into();
        let mut node = Self::new(meta.kind());
        node.meta = Some(meta);
        node
    }

    pub fn note(duration: Duration) -> Self {
        Self::new(NodeKind::Note).with_duration(duration)
    }

    pub fn rest(duration: Duration) -> Self {
        Self::new(NodeKind::Rest).with_duration(duration)
    }

    pub fn with_position(mut self, position: Duration) -> Self {
        self.event.position = Some(position);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.event.duration = Some(duration);
        self
    }

    pub fn with_trim(mut self, left: Option<Duration>, right: Option<Duration>) -> Self {
        self.event.trim_left = left;
        self.event.trim_right = right;
        self
    }

    pub fn with_repeat(mut self, repeat: u32) -> Self {
        self.event.repeat = repeat;
        self
    }

    pub fn with_scale(mut self, scale: Rational) -> Self {
        self.event.scale = Some(scale);
        self
    }

    pub fn with_amp(mut self, amp: f64) -> Self {
        self.event.amp = amp;
        self
    }

    pub fn with_step_duration(mut self, step: bool) -> Self {
        self.event.step_duration = step;
        self
    }

    pub fn with_event_time_mode(mut self, mode: TimeMode) -> Self {
        self.event_time_mode = mode;
        self
    }

    pub fn with_meta_time_mode(mut self, mode: TimeMode) -> Self {
        self.meta_time_mode = mode;
        self
    }

    pub fn with_playback_timing(mut self, timing: Duration) -> Self {
        self.event.playback_timing = Some(timing);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.event.label = Some(label.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.event.enabled = false;
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.meta.as_ref().map_or(self.kind, Meta::kind)
    }

    pub fn meta_payload(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    pub fn meta_payload_mut(&mut self) -> Option<&mut Meta> {
        self.meta.as_mut()
    }

    pub fn is_container(&self) -> bool {
        self.kind().schema().container
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn events(&self) -> &[NodeId] {
        &self.events
    }

    pub fn metas(&self) -> &[NodeId] {
        &self.metas
    }

    /// Resolved values. Only meaningful after `Timeline::resolve`.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }
}
