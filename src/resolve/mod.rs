//! # Resolve Module
//!
//! Compute absolute timing for every node of a [`Timeline`].
//!
//! ## Passes
//! Resolution of a root runs three top-down passes:
//! 1. **events** - positions, durations, inherited `enabled`/`amp`/`scale`, and
//!    the meta lists of each container (which grow the `globals` in scope)
//! 2. **trim** - the playback window of each node, clipped by its ancestors
//! 3. **repeats** - the stack of replay multipliers inherited down the tree
//!
//! Trim and repeats walk the child snapshot (`cache.children`) taken by the
//! events pass.
//!
//! ## Sub-modules
//! - `events` - positioning and duration inheritance
//! - `metas` - meta list placement and globals
//! - `trim` - trim windows, `skip`, suppression of trimmed notes
//! - `repeats` - repeat stacks
//!
//! ## Entry Point
//! [`Timeline::resolve`] recomputes every root from a cleared cache. Two calls on
//! an unchanged tree produce identical caches.
//!
//! ## Example
//! ```rust
//! use musictime::{ratio, Duration, Node, NodeKind, Tempo, Timeline};
//!
//! let mut timeline = Timeline::new();
//! let song = timeline.add_root(Node::new(NodeKind::Song)).unwrap();
//! timeline.add_meta(song, Node::meta(Tempo::bpm(120))).unwrap();
//! let voice = timeline.add_event(song, Node::new(NodeKind::Voice)).unwrap();
//! let first = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
//! let second = timeline.add_event(voice, Node::note(Duration::wn(1, 4))).unwrap();
//!
//! timeline.resolve(false).unwrap();
//!
//! let cache = timeline[first].cache();
//! assert_eq!(cache.end_wn(), ratio(1, 4));
//! assert_eq!(cache.end_time(), ratio(1, 2));
//! assert_eq!(timeline[second].cache().abs_time(), ratio(1, 2));
//! ```

mod events;
mod metas;
mod repeats;
mod trim;


use crate::cache::SiblingLinks;
use crate::duration::Unit;
use crate::error::TimelineError;
use crate::meta::Meta;
use crate::timeline::{NodeId, Timeline};

impl Timeline {
    /// Resolve every root.
    ///
    /// Without `force`, a timeline that is already resolved and has not been
    /// mutated since is left untouched. Returns whether the start or end of any
    /// root changed.
    pub fn resolve(&mut self, force: bool) -> Result<bool, TimelineError> {
        let resolved = self
            .roots()
            .iter()
            .all(|&root| self.nodes.get(root).is_some_and(|node| node.cache.resolved));
        if !force && !self.dirty && resolved {
            return Ok(false);
        }

        let mut changed = false;
        for root in self.roots().to_vec() {
            changed |= self.resolve_subtree(root)?;
        }
        self.dirty = false;
        Ok(changed)
    }

    /// Resolve one subtree against the already resolved cache of its parent.
    pub fn resolve_subtree(&mut self, id: NodeId) -> Result<bool, TimelineError> {
        let links = self.get(id)?.cache.links;
        log::debug!("resolving {} subtree", self.nodes[id].kind());

        let changed = self.resolve_events(id, links)?;
        self.local_resolve(id);
        self.resolve_trim(id)?;
        self.resolve_repeats(id);
        Ok(changed)
    }

    /// Per-node finishing step, run once the node's own timing is known.
    pub(crate) fn local_resolve(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };

        if matches!(node.meta_payload(), Some(Meta::Key(_))) {
            node.cache.key = Some(id);
        }

        node.cache.playback_timing_time = match &node.event.playback_timing {
            None => None,
            Some(timing) => match (timing.to_seconds(), timing.unit) {
                (Some(seconds), _) => Some(seconds),
                (None, Unit::WholeNotes) if node.cache.s_per_wn.is_some() => {
                    node.cache.s_per_wn.as_ref().map(|rate| &timing.value * rate)
                }
                _ => {
                    log::warn!("cannot convert playback timing {} of {}", timing, node.kind());
                    None
                }
            },
        };
    }

    pub(crate) fn sibling_links(children: &[NodeId], no: usize) -> SiblingLinks {
        SiblingLinks {
            no: Some(no),
            prev: no.checked_sub(1).map(|prev| children[prev]),
            next: children.get(no + 1).copied(),
        }
    }
}
