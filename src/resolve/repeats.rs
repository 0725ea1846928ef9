use crate::cache::{Repeat, SharedList};
use crate::timeline::{NodeId, Timeline};

impl Timeline {
    /// Inherit the parent's repeat stack, adding one level when `repeat != 1`.
    /// The period is the node's own trim window, before clipping by ancestors.
    pub(crate) fn resolve_repeats(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        let mut repeats = node
            .parent
            .and_then(|parent| self.node(parent))
            .map_or_else(SharedList::new, |parent| parent.cache.repeats.clone());

        let cache = &node.cache;
        if node.event.repeat != 1 {
            repeats.push(Repeat {
                count: node.event.repeat,
                period_time: &cache.own_trim_end.time - &cache.own_trim_start.time,
                period_wn: &cache.own_trim_end.wn - &cache.own_trim_start.wn,
            });
        }
        let children = cache.children.clone();

        self.nodes[id].cache.repeats = repeats;
        for child in children {
            self.resolve_repeats(child);
        }
    }
}
