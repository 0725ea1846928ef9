//! Read-side helpers over a container's children.
//!
//! Selectors are plain predicates over [`Node`]; [`of_kind`] builds the common
//! "every node of this kind" selector.

use crate::duration::Rational;
use crate::error::TimelineError;
use crate::node::{Node, NodeKind};
use crate::timeline::{NodeId, Timeline};

/// Selector matching nodes of one kind.
pub fn of_kind(kind: NodeKind) -> impl Fn(&Node) -> bool {
    move |node| node.kind() == kind
}

impl Timeline {
    /// Direct children of `container` matching `select`.
    pub fn child_events(&self, container: NodeId, select: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        self.select(self.node(container).map(Node::events).unwrap_or_default(), &select)
    }

    /// Every descendant of `container` matching `select`, in document order.
    pub fn find_events(&self, container: NodeId, select: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk_events(container, &mut |id, node| {
            if select(node) {
                found.push(id);
            }
        });
        found
    }

    pub fn find_event(&self, container: NodeId, select: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.find_events(container, select).into_iter().next()
    }

    /// Metas of `container` itself matching `select`.
    pub fn child_metas(&self, container: NodeId, select: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        self.select(self.node(container).map(Node::metas).unwrap_or_default(), &select)
    }

    /// Metas of `container` and of every container below it, in document order.
    pub fn find_metas(&self, container: NodeId, select: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        let mut found = self.child_metas(container, &select);
        self.walk_events(container, &mut |id, _| {
            found.extend(self.child_metas(id, &select));
        });
        found
    }

    pub fn find_meta(&self, container: NodeId, select: impl Fn(&Node) -> bool) -> Option<NodeId> {
        self.find_metas(container, select).into_iter().next()
    }

    fn select(&self, ids: &[NodeId], select: &impl Fn(&Node) -> bool) -> Vec<NodeId> {
        ids.iter()
            .copied()
            .filter(|&id| self.node(id).is_some_and(select))
            .collect()
    }

    fn walk_events(&self, container: NodeId, visit: &mut impl FnMut(NodeId, &Node)) {
        let Some(node) = self.node(container) else {
            return;
        };
        for &child in node.events() {
            if let Some(child_node) = self.node(child) {
                visit(child, child_node);
                self.walk_events(child, visit);
            }
        }
    }

    /// Groups of direct children whose resolved `[start, end)` spans overlap.
    ///
    /// Children are taken in order of start time; children that overlap nothing
    /// are left out. Resolves the timeline first if needed.
    pub fn find_overlapping_events(
        &mut self,
        container: NodeId,
    ) -> Result<Vec<Vec<NodeId>>, TimelineError> {
        self.resolve(false)?;
        let mut events = self.get(container)?.events().to_vec();
        let nodes = &self.nodes;
        events.sort_by(|&a, &b| nodes[a].cache.start.time.cmp(&nodes[b].cache.start.time));

        let mut clusters = Vec::new();
        let mut overlapping: Vec<NodeId> = Vec::new();
        let mut last: Option<NodeId> = None;
        let mut max_end: Option<Rational> = None;

        for id in events {
            let cache = &self.nodes[id].cache;
            match (last, max_end.take()) {
                (Some(prev), Some(end)) if end > cache.start.time => {
                    max_end = Some(end.max(cache.end.time.clone()));
                    if overlapping.last() != Some(&prev) {
                        overlapping.push(prev);
                    }
                    overlapping.push(id);
                }
                _ => {
                    max_end = Some(cache.end.time.clone());
                    if !overlapping.is_empty() {
                        clusters.push(std::mem::take(&mut overlapping));
                    }
                }
            }
            last = Some(id);
        }
        if !overlapping.is_empty() {
            clusters.push(overlapping);
        }
        Ok(clusters)
    }

    /// Give each overlapping child of `container` the lowest layer that is free
    /// at its start. Children that overlap nothing get no layer.
    pub fn assign_overlaps_to_layers(&mut self, container: NodeId) -> Result<(), TimelineError> {
        for child in self.get(container)?.events().to_vec() {
            self.nodes[child].event.layer = None;
        }

        for cluster in self.find_overlapping_events(container)? {
            let mut layer_ends: Vec<Rational> = Vec::new();
            for id in cluster {
                let cache = &self.nodes[id].cache;
                let (start, end) = (&cache.start.time, cache.end.time.clone());
                let layer = match layer_ends.iter().position(|layer_end| start >= layer_end) {
                    Some(free) => {
                        layer_ends[free] = end;
                        free
                    }
                    None => {
                        layer_ends.push(end);
                        layer_ends.len() - 1
                    }
                };
                self.nodes[id].event.layer = Some(layer as u32);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::Duration;
    use crate::meta::{Tempo, TimeSignature};

    fn positioned(tl: &mut Timeline, parent: NodeId, position: &str, duration: &str) -> NodeId {
        let node = Node::note(duration.parse().unwrap()).with_position(position.parse().unwrap());
        tl.add_event(parent, node).unwrap()
    }

    /// Song at 120 bpm with an absolute-time container.
    fn stack() -> (Timeline, NodeId, NodeId) {
        let mut tl = Timeline::new();
        let song = tl.add_root(Node::new(NodeKind::Song)).unwrap();
        tl.add_meta(song, Node::meta(Tempo::bpm(120))).unwrap();
        let stack = tl
            .add_event(song, Node::new(NodeKind::VerticalContainer))
            .unwrap();
        (tl, song, stack)
    }

    #[test]
    fn test_child_and_find_events() {
        let (mut tl, song, stack) = stack();
        let voice = tl.add_event(stack, Node::new(NodeKind::Voice)).unwrap();
        let note = tl.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
        let rest = tl.add_event(stack, Node::rest(Duration::wn(1, 4))).unwrap();

        assert_eq!(tl.child_events(stack, |_| true), vec![voice, rest]);
        assert_eq!(tl.child_events(song, of_kind(NodeKind::Note)), vec![]);
        assert_eq!(tl.find_events(song, |_| true), vec![stack, voice, note, rest]);
        assert_eq!(tl.find_events(song, of_kind(NodeKind::Note)), vec![note]);
        assert_eq!(tl.find_event(song, of_kind(NodeKind::Rest)), Some(rest));
        assert_eq!(tl.find_event(song, of_kind(NodeKind::Audio)), None);
    }

    #[test]
    fn test_find_metas() {
        let (mut tl, song, stack) = stack();
        let time = tl.add_meta(song, Node::meta(TimeSignature::new(3, 4))).unwrap();
        let tempo = tl.add_meta(stack, Node::meta(Tempo::bpm(90))).unwrap();

        assert_eq!(tl.child_metas(song, of_kind(NodeKind::Time)), vec![time]);
        let tempos = tl.find_metas(song, of_kind(NodeKind::Tempo));
        assert_eq!(tempos.len(), 2);
        assert_eq!(tempos[1], tempo);
        assert_eq!(tl.find_meta(stack, |_| true), Some(tempo));
    }

    #[test]
    fn test_overlap_clusters_and_layers() {
        let (mut tl, _, stack) = stack();
        let c = positioned(&mut tl, stack, "1 wn", "1/4 wn");
        let a = positioned(&mut tl, stack, "0 wn", "1/2 wn");
        let b = positioned(&mut tl, stack, "1/4 wn", "1/2 wn");
        let d = positioned(&mut tl, stack, "1 wn", "1/2 wn");
        let lone = positioned(&mut tl, stack, "2 wn", "1/4 wn");

        let clusters = tl.find_overlapping_events(stack).unwrap();
        assert_eq!(clusters, vec![vec![a, b], vec![c, d]]);

        tl.node_mut(lone).unwrap().event.layer = Some(4);
        tl.assign_overlaps_to_layers(stack).unwrap();
        let layer = |id: NodeId| tl[id].event.layer;
        assert_eq!(layer(a), Some(0));
        assert_eq!(layer(b), Some(1));
        assert_eq!(layer(c), Some(0));
        assert_eq!(layer(d), Some(1));
        assert_eq!(layer(lone), None);
    }

    #[test]
    fn test_layers_reuse_freed_slots() {
        let (mut tl, _, stack) = stack();
        let long = positioned(&mut tl, stack, "0 wn", "1 wn");
        let first = positioned(&mut tl, stack, "0 wn", "1/4 wn");
        let second = positioned(&mut tl, stack, "1/4 wn", "1/4 wn");

        tl.assign_overlaps_to_layers(stack).unwrap();
        assert_eq!(tl[long].event.layer, Some(0));
        assert_eq!(tl[first].event.layer, Some(1));
        assert_eq!(tl[second].event.layer, Some(1));
    }
}
