//! Positioning pass.
//!
//! Walks the tree parent first. Each node inherits `enabled`, `amp` and `scale`,
//! finds its start (the parent's start, or the previous sibling's end in a
//! relative container, then offset by `position`), places its own metas, then
//! its children, and finally its end: the start stepped by the effective
//! duration, or the latest child end when there is none.

use crate::cache::{Cache, Moment, SiblingLinks};
use crate::error::TimelineError;
use crate::node::TimeMode;
use crate::state::{create_state, step_state};
use crate::timeline::{NodeId, Timeline};

impl Timeline {
    /// Returns whether the node's start or end differs from the previous resolution.
    pub(crate) fn resolve_events(
        &mut self,
        id: NodeId,
        links: SiblingLinks,
    ) -> Result<bool, TimelineError> {
        let node = self.get(id)?;
        let parent = node.parent;
        let kind = node.kind();
        let event = node.event.clone();
        let children = node.events.clone();
        let previous = (node.cache.resolved, node.cache.start.clone(), node.cache.end.clone());

        let mut cache = Cache::with_links(links);
        match parent {
            Some(parent_id) => {
                let parent_node = self.get(parent_id)?;
                let inherited = &parent_node.cache;
                cache.enabled = inherited.enabled && event.enabled;
                cache.amp = event.amp * inherited.amp;
                cache.scale = inherited.scale.clone();
                cache.start = inherited.start.clone();

                if parent_node.event_time_mode == TimeMode::Relative {
                    if let Some(prev) = links.prev.and_then(|prev| self.node(prev)) {
                        if prev.event.step_duration {
                            cache.start = prev.cache.end.clone();
                        }
                    }
                }
            }
            None => {
                if event.position.as_ref().is_some_and(|position| !position.is_zero()) {
                    return Err(TimelineError::RootPosition);
                }
                cache.enabled = event.enabled;
                cache.amp = event.amp;
            }
        }
        if let Some(scale) = &event.scale {
            cache.scale *= scale;
        }
        self.nodes[id].cache = cache;

        if let Some(parent_id) = parent {
            let globals = self.nodes[parent_id].cache.globals.clone();
            let mut state = create_state(self, id, &globals);
            let position = event.position.as_ref().filter(|position| !position.is_zero());
            if let Some(position) = position {
                step_state(self, &mut state, position, &globals)?;
            }
            let cache = &mut self.nodes[id].cache;
            cache.start = state.at;
            cache.tempo = state.tempo;
            cache.time = state.time;
            cache.key = state.key;
            cache.s_per_wn = state.s_per_wn;
        }

        self.resolve_metas(id)?;

        let inherited = match parent {
            Some(parent_id) if kind.schema().inherits_duration => {
                self.nodes[parent_id].cache.duration.clone()
            }
            _ => None,
        };
        let duration = event.duration.or(inherited);
        self.nodes[id].cache.duration = duration.clone();
        self.nodes[id].cache.children = children.clone();

        let mut max_end: Moment = self.nodes[id].cache.start.clone();
        for (no, &child) in children.iter().enumerate() {
            if self.get(child)?.parent != Some(id) {
                let kind = self.nodes[child].kind();
                log::warn!("{} is walked by a container that is not its parent", kind);
            }
            self.resolve_events(child, Self::sibling_links(&children, no))?;
            self.local_resolve(child);

            let end = &self.nodes[child].cache.end;
            if end.time > max_end.time {
                max_end.time = end.time.clone();
            }
            if end.wn > max_end.wn {
                max_end.wn = end.wn.clone();
            }
        }

        let end = match duration.filter(|duration| !duration.is_zero()) {
            Some(duration) => {
                let globals = self.nodes[id].cache.globals.clone();
                let mut state = create_state(self, id, &globals);
                step_state(self, &mut state, &duration, &globals)?;
                state.at
            }
            None => max_end,
        };

        let (was_resolved, old_start, old_end) = previous;
        let cache = &mut self.nodes[id].cache;
        let changed = !was_resolved || old_start != cache.start || old_end != end;
        cache.end = end;
        cache.resolved = true;
        log::trace!("{} at {}..{} s", kind, cache.start.time, cache.end.time);
        Ok(changed)
    }
}
