//! Meta list placement.
//!
//! A container's `globals` start as its parent's list. Every Tempo, Time or Key
//! meta it places is inserted into its own copy, ordered by start time, so
//! sibling subtrees never see each other's changes.

use crate::cache::{Cache, SharedList};
use crate::error::TimelineError;
use crate::node::TimeMode;
use crate::state::{create_state, maybe_update_state, step_state, update_state, State};
use crate::timeline::{NodeId, Timeline};

impl Timeline {
    pub(crate) fn resolve_metas(&mut self, id: NodeId) -> Result<(), TimelineError> {
        let node = self.get(id)?;
        let metas = node.metas.clone();
        let absolute = node.meta_time_mode == TimeMode::Absolute;
        let mut globals = node
            .parent
            .and_then(|parent| self.node(parent))
            .map(|parent| parent.cache.globals.clone())
            .unwrap_or_else(SharedList::new);

        if metas.is_empty() {
            self.nodes[id].cache.globals = globals;
            return Ok(());
        }

        let mut running: Option<State> = None;
        for &meta in &metas {
            let position = self.get(meta)?.event.position.clone();
            let mut state = match running.take() {
                Some(state) => state,
                None => {
                    let mut fresh = create_state(self, id, &globals);
                    maybe_update_state(self, &mut fresh, &globals);
                    fresh
                }
            };

            if let Some(position) = position {
                if absolute && !position.is_fixed() {
                    return Err(TimelineError::NonFixedMetaUnit {
                        unit: position.unit.to_string(),
                    });
                }
                if !absolute && position.is_negative() {
                    return Err(TimelineError::NegativeRelativeMeta);
                }
                step_state(self, &mut state, &position, &globals)?;
            }

            self.stamp_meta(id, meta, &state);
            if self.meta_of(meta).and_then(|m| m.global_kind()).is_some() {
                let time = &state.at.time;
                let index = globals
                    .iter()
                    .position(|&g| self.nodes[g].cache.start.time > *time)
                    .unwrap_or(globals.len());
                globals.insert(index, meta);
                update_state(self, &mut state, meta);
            }
            self.local_resolve(meta);

            if !absolute {
                running = Some(state);
            }
        }

        // Metas at the container's own start also rule the container itself.
        let cache = &self.nodes[id].cache;
        let mut own = State {
            tempo: cache.tempo,
            time: cache.time,
            key: cache.key,
            scale: cache.scale.clone(),
            at: cache.start.clone(),
            s_per_wn: cache.s_per_wn.clone(),
        };
        for &meta in &metas {
            if self.nodes[meta].cache.start.time == own.at.time {
                update_state(self, &mut own, meta);
            }
        }
        let cache = &mut self.nodes[id].cache;
        cache.tempo = own.tempo;
        cache.time = own.time;
        cache.key = own.key;
        cache.s_per_wn = own.s_per_wn;
        cache.globals = globals;
        Ok(())
    }

    fn stamp_meta(&mut self, container: NodeId, meta: NodeId, state: &State) {
        let owner = &self.nodes[container].cache;
        let (enabled, amp, scale) = (owner.enabled, owner.amp, state.scale.clone());

        let node = &mut self.nodes[meta];
        node.cache = Cache {
            resolved: true,
            enabled: enabled && node.event.enabled,
            amp: amp * node.event.amp,
            scale,
            start: state.at.clone(),
            end: state.at.clone(),
            trim_start: state.at.clone(),
            trim_end: state.at.clone(),
            own_trim_start: state.at.clone(),
            own_trim_end: state.at.clone(),
            tempo: state.tempo,
            time: state.time,
            key: state.key,
            s_per_wn: state.s_per_wn.clone(),
            ..Cache::default()
        };
    }
}
