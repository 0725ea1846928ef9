//! Structural rearrangement of absolute-time containers.
//!
//! - [`Timeline::split_by_layers`] copies a container once per `layer` value
//! - [`Timeline::merge_into_layers`] copies several containers into one, one
//!   layer per source
//! - [`Timeline::wrap_notes`] / [`Timeline::unwrap_notes`] move notes into and
//!   out of `NoteChord`s
//!
//! All of them reorder children without touching positions, which is only sound
//! when the children are positioned absolutely. Relative containers are
//! rejected with [`TimelineError::RelativeContainer`].

use crate::cache::Cache;
use crate::duration::Duration;
use crate::error::TimelineError;
use crate::node::{Node, NodeKind, TimeMode};
use crate::timeline::{NodeId, Timeline};
use std::collections::BTreeMap;

impl Timeline {
    /// Copy `container` once per layer of its children, each copy holding deep
    /// copies of that layer's children and of the container's metas. Children
    /// without a layer go to layer 0. Copies are placed right after the
    /// container and returned in layer order; the container itself is left
    /// as is.
    pub fn split_by_layers(
        &mut self,
        container: NodeId,
        reset_layer: bool,
    ) -> Result<Vec<NodeId>, TimelineError> {
        self.require_absolute(container, "split_by_layers")?;

        let mut layers: BTreeMap<u32, Vec<NodeId>> = BTreeMap::new();
        for &child in self.get(container)?.events() {
            let layer = self.nodes[child].event.layer.unwrap_or(0);
            layers.entry(layer).or_default().push(child);
        }

        let mut split = Vec::with_capacity(layers.len());
        for children in layers.into_values() {
            let copy = self.copy_shell_after(container, split.len())?;
            for child in children {
                let child_copy = self.copy_into(child, copy, false)?;
                if reset_layer {
                    self.nodes[child_copy].event.layer = None;
                }
            }
            split.push(copy);
        }
        log::debug!("split {} into {} layers", self.nodes[container].kind(), split.len());
        Ok(split)
    }

    /// Copy the children of every container in `containers` into one new
    /// container, setting each child's layer to the index of its source. The
    /// new container copies the first source (kind, fields, metas) and is placed
    /// right after it.
    pub fn merge_into_layers(&mut self, containers: &[NodeId]) -> Result<NodeId, TimelineError> {
        let Some(&first) = containers.first() else {
            return Err(TimelineError::NothingToMerge);
        };
        for &container in containers {
            self.require_absolute(container, "merge_into_layers")?;
        }
        let kind = self.nodes[first].kind();
        if containers.iter().any(|&id| self.nodes[id].kind() != kind) {
            log::warn!("merging containers of mixed kinds into a {}", kind);
        }

        let merged = self.copy_shell_after(first, 0)?;
        for (layer, &source) in containers.iter().enumerate() {
            for child in self.nodes[source].events.clone() {
                let copy = self.copy_into(child, merged, false)?;
                self.nodes[copy].event.layer = Some(layer as u32);
            }
        }
        Ok(merged)
    }

    /// Group the direct Note children of `container` by position and duration
    /// into `NoteChord`s appended to the container. The notes hand both fields
    /// over to their chord. Returns the new chords.
    pub fn wrap_notes(&mut self, container: NodeId) -> Result<Vec<NodeId>, TimelineError> {
        self.require_absolute(container, "wrap_notes")?;

        let mut kept = Vec::new();
        let mut groups: Vec<(Option<Duration>, Option<Duration>, Vec<NodeId>)> = Vec::new();
        for &child in self.get(container)?.events() {
            let event = &self.nodes[child].event;
            if self.nodes[child].kind() != NodeKind::Note {
                kept.push(child);
                continue;
            }
            let found = groups.iter_mut().find(|(position, duration, _)| {
                *position == event.position && *duration == event.duration
            });
            match found {
                Some((_, _, notes)) => notes.push(child),
                None => groups.push((event.position.clone(), event.duration.clone(), vec![child])),
            }
        }
        self.nodes[container].events = kept;

        let mut chords = Vec::with_capacity(groups.len());
        for (position, duration, notes) in groups {
            let mut chord = Node::new(NodeKind::NoteChord);
            chord.event.position = position;
            chord.event.duration = duration;
            let chord = self.add_event(container, chord)?;
            for note in notes {
                let node = &mut self.nodes[note];
                node.parent = Some(chord);
                node.event.position = None;
                node.event.duration = None;
                self.nodes[chord].events.push(note);
            }
            chords.push(chord);
        }
        self.dirty = true;
        Ok(chords)
    }

    /// Move the Note children of every direct child container up into
    /// `container`, appended at the end. Each note takes its wrapper's position,
    /// and its duration when it has none. Wrappers left without children are
    /// removed. Notes with their own nonzero position cannot be moved.
    pub fn unwrap_notes(&mut self, container: NodeId) -> Result<(), TimelineError> {
        self.require_absolute(container, "unwrap_notes")?;

        let wrappers = self.get(container)?.events().to_vec();
        for &wrapper in &wrappers {
            for &child in &self.nodes[wrapper].events {
                let node = &self.nodes[child];
                let positioned = node.event.position.as_ref();
                if node.kind() == NodeKind::Note && positioned.is_some_and(|p| !p.is_zero()) {
                    let message = "cannot unwrap a note with its own position";
                    return Err(TimelineError::schema(NodeKind::Note, message));
                }
            }
        }

        let mut moved = Vec::new();
        let mut emptied = Vec::new();
        for wrapper in wrappers {
            let children = self.nodes[wrapper].events.clone();
            if children.is_empty() {
                continue;
            }
            let (notes, rest): (Vec<_>, Vec<_>) = children
                .into_iter()
                .partition(|&child| self.nodes[child].kind() == NodeKind::Note);
            if notes.is_empty() {
                continue;
            }
            let outer = self.nodes[wrapper].event.clone();
            for &note in &notes {
                let node = &mut self.nodes[note];
                node.parent = Some(container);
                node.event.position = outer.position.clone();
                if node.event.duration.is_none() {
                    node.event.duration = outer.duration.clone();
                }
            }
            if rest.is_empty() {
                emptied.push(wrapper);
            }
            self.nodes[wrapper].events = rest;
            moved.extend(notes);
        }

        self.nodes[container].events.extend(moved);
        for wrapper in emptied {
            self.remove(wrapper)?;
        }
        self.dirty = true;
        Ok(())
    }

    fn require_absolute(
        &self,
        container: NodeId,
        operation: &'static str,
    ) -> Result<(), TimelineError> {
        match self.get(container)?.event_time_mode {
            TimeMode::Absolute => Ok(()),
            TimeMode::Relative => Err(TimelineError::RelativeContainer { operation }),
        }
    }

    /// Copy of `source` with its metas but no events, inserted after `source`
    /// and `offset` earlier copies (or as a root when `source` has no parent).
    fn copy_shell_after(&mut self, source: NodeId, offset: usize) -> Result<NodeId, TimelineError> {
        let shell = self.shell(source)?;
        let copy = match self.get(source)?.parent {
            Some(parent) => {
                let siblings = &self.nodes[parent].events;
                let index = siblings
                    .iter()
                    .position(|&sibling| sibling == source)
                    .map_or(siblings.len(), |index| index + 1 + offset);
                self.insert_event(parent, index, shell)?
            }
            None => self.add_root(shell)?,
        };
        for meta in self.nodes[source].metas.clone() {
            self.copy_into(meta, copy, true)?;
        }
        Ok(copy)
    }

    /// Deep copy of `id` appended to the events (or metas) of `parent`.
    fn copy_into(
        &mut self,
        id: NodeId,
        parent: NodeId,
        meta: bool,
    ) -> Result<NodeId, TimelineError> {
        let shell = self.shell(id)?;
        let copy = if meta {
            self.add_meta(parent, shell)?
        } else {
            self.add_event(parent, shell)?
        };
        let source = &self.nodes[id];
        let (metas, events) = (source.metas.clone(), source.events.clone());
        for meta in metas {
            self.copy_into(meta, copy, true)?;
        }
        for event in events {
            self.copy_into(event, copy, false)?;
        }
        Ok(copy)
    }

    fn shell(&self, id: NodeId) -> Result<Node, TimelineError> {
        let mut node = self.get(id)?.clone();
        node.parent = None;
        node.events.clear();
        node.metas.clear();
        node.cache = Cache::default();
        Ok(node)
    }
}
