//! # Timeline Arena
//!
//! A [`Timeline`] owns every node of one or more event trees. Nodes refer to
//! each other by [`NodeId`]: a node stores its parent id and its `events` /
//! `metas` ids, so the tree is acyclic by construction and "parent" access is a
//! lookup.
//!
//! ## Mutation and resolution
//! Structural mutation goes through the arena and marks it dirty. Resolution is
//! requested explicitly with `Timeline::resolve` once a batch of edits is done;
//! there is no implicit re-resolution.
//!
//! ```rust
//! use musictime::{ratio, Duration, Node, NodeKind, Tempo, Timeline};
//!
//! let mut timeline = Timeline::new();
//! let song = timeline.add_root(Node::new(NodeKind::Song)).unwrap();
//! timeline.add_meta(song, Node::meta(Tempo::bpm(120))).unwrap();
//! let voice = timeline.add_event(song, Node::new(NodeKind::Voice)).unwrap();
//! let note = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
//!
//! timeline.resolve(false).unwrap();
//! assert_eq!(timeline[note].cache().end_time(), ratio(1, 2));
//! ```

use crate::error::TimelineError;
use crate::meta::Meta;
use crate::node::Node;
use crate::schema::{validate_event_slot, validate_meta_slot, validate_node};
use slotmap::{new_key_type, SlotMap};
use std::ops::Index;

new_key_type! {
    pub struct NodeId;
}

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    roots: Vec<NodeId>,
    pub(crate) dirty: bool,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parentless node.
    pub fn add_root(&mut self, node: Node) -> Result<NodeId, TimelineError> {
        validate_node(&node)?;
        let id = self.nodes.insert(node);
        self.roots.push(id);
        self.dirty = true;
        Ok(id)
    }

    /// Append a child to a container's `events` list.
    pub fn add_event(&mut self, parent: NodeId, node: Node) -> Result<NodeId, TimelineError> {
        let index = self.get(parent)?.events.len();
        self.insert_event(parent, index, node)
    }

    pub fn insert_event(
        &mut self,
        parent: NodeId,
        index: usize,
        mut node: Node,
    ) -> Result<NodeId, TimelineError> {
        validate_node(&node)?;
        validate_event_slot(self.get(parent)?, &node)?;
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        let events = &mut self.nodes[parent].events;
        events.insert(index.min(events.len()), id);
        self.dirty = true;
        Ok(id)
    }

    /// Append a meta to a container's `metas` list.
    pub fn add_meta(&mut self, parent: NodeId, node: Node) -> Result<NodeId, TimelineError> {
        let index = self.get(parent)?.metas.len();
        self.insert_meta(parent, index, node)
    }

    pub fn insert_meta(
        &mut self,
        parent: NodeId,
        index: usize,
        mut node: Node,
    ) -> Result<NodeId, TimelineError> {
        validate_node(&node)?;
        validate_meta_slot(self.get(parent)?, &node)?;
        node.parent = Some(parent);
        let id = self.nodes.insert(node);
        let metas = &mut self.nodes[parent].metas;
        metas.insert(index.min(metas.len()), id);
        self.dirty = true;
        Ok(id)
    }

    /// Remove a node and its whole subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(), TimelineError> {
        let parent = self.get(id)?.parent;
        match parent {
            Some(parent) => {
                let container = &mut self.nodes[parent];
                container.events.retain(|&child| child != id);
                container.metas.retain(|&child| child != id);
            }
            None => self.roots.retain(|&root| root != id),
        }

        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                pending.extend(node.events);
                pending.extend(node.metas);
            }
        }
        self.dirty = true;
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Result<&Node, TimelineError> {
        self.nodes.get(id).ok_or(TimelineError::UnknownNode)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's structural fields. Marks the timeline dirty.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let node = self.nodes.get_mut(id)?;
        self.dirty = true;
        Some(node)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a structural change happened since the last full resolution.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn meta_of(&self, id: NodeId) -> Option<&Meta> {
        self.nodes.get(id).and_then(Node::meta_payload)
    }

    /// Every node of the subtree rooted at `id`, metas included, depth-first.
    pub fn descendants(&self, id: NodeId) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        let mut pending = vec![(id, 0usize)];
        while let Some((next, depth)) = pending.pop() {
            let Some(node) = self.nodes.get(next) else {
                continue;
            };
            out.push((next, depth));
            for &child in node.events.iter().rev() {
                pending.push((child, depth + 1));
            }
            for &meta in node.metas.iter().rev() {
                pending.push((meta, depth + 1));
            }
        }
        out
    }
}

impl Index<NodeId> for Timeline {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::Duration;
    use crate::meta::Tempo;
    use crate::node::NodeKind;

    fn song_with_voice() -> (Timeline, NodeId, NodeId) {
        let mut timeline = Timeline::new();
        let song = timeline.add_root(Node::new(NodeKind::Song)).unwrap();
        let voice = timeline.add_event(song, Node::new(NodeKind::Voice)).unwrap();
        (timeline, song, voice)
    }

    #[test]
    fn test_parent_links() {
        let (mut timeline, song, voice) = song_with_voice();
        let note = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
        assert_eq!(timeline.parent(note), Some(voice));
        assert_eq!(timeline.parent(voice), Some(song));
        assert_eq!(timeline.parent(song), None);
        assert_eq!(timeline[voice].events(), &[note]);
        assert_eq!(timeline.roots(), &[song]);
    }

    #[test]
    fn test_insert_positions() {
        let (mut timeline, _, voice) = song_with_voice();
        let a = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
        let c = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
        let b = timeline.insert_event(voice, 1, Node::rest(Duration::wn(1, 4))).unwrap();
        assert_eq!(timeline[voice].events(), &[a, b, c]);
    }

    #[test]
    fn test_rejects_invalid_slots() {
        let (mut timeline, song, voice) = song_with_voice();
        let note = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();

        assert!(timeline.add_event(note, Node::note(Duration::wn(1, 4))).is_err());
        assert!(timeline.add_event(song, Node::meta(Tempo::bpm(60))).is_err());
        assert!(timeline.add_meta(song, Node::new(NodeKind::Voice)).is_err());
        assert_eq!(timeline[voice].events().len(), 1);
    }

    #[test]
    fn test_remove_subtree() {
        let (mut timeline, song, voice) = song_with_voice();
        timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
        timeline.add_meta(voice, Node::meta(Tempo::bpm(90))).unwrap();
        assert_eq!(timeline.len(), 4);

        timeline.remove(voice).unwrap();
        assert_eq!(timeline.len(), 1);
        assert!(timeline[song].events().is_empty());
        assert!(matches!(timeline.get(voice), Err(TimelineError::UnknownNode)));
    }

    #[test]
    fn test_dirty_flag() {
        let (mut timeline, _, voice) = song_with_voice();
        assert!(timeline.is_dirty());
        timeline.dirty = false;
        timeline.node_mut(voice).unwrap().event.amp = 0.5;
        assert!(timeline.is_dirty());
    }

    #[test]
    fn test_descendants_order() {
        let (mut timeline, song, voice) = song_with_voice();
        let tempo = timeline.add_meta(song, Node::meta(Tempo::bpm(90))).unwrap();
        let note = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
        let ids: Vec<_> = timeline.descendants(song).into_iter().collect();
        assert_eq!(ids, vec![(song, 0), (tempo, 1), (voice, 1), (note, 2)]);
    }
}
