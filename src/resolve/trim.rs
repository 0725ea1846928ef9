//! Trim pass.
//!
//! The playback window of a node starts as its structural span, is narrowed by
//! its own `trim_left`/`trim_right`, and is then clipped by the parent's window.
//! The unclipped window is kept as `own_trim_*` for repeat periods.

use crate::duration::{Duration, Rational, Unit};
use crate::error::TimelineError;
use crate::state::{create_state, step_state};
use crate::timeline::{NodeId, Timeline};
use num_traits::{One, Signed, Zero};

impl Timeline {
    pub(crate) fn resolve_trim(&mut self, id: NodeId) -> Result<(), TimelineError> {
        let node = self.get(id)?;
        let (start, end) = (node.cache.start.clone(), node.cache.end.clone());
        let trim_left = node.event.trim_left.clone();
        let trim_right = node.event.trim_right.clone();
        let suppress = node.kind().schema().suppress_when_trimmed;
        let globals = node.cache.globals.clone();
        let children = node.cache.children.clone();
        let parent_window = node
            .parent
            .and_then(|parent| self.node(parent))
            .map(|parent| (parent.cache.trim_start.clone(), parent.cache.trim_end.clone()));

        let mut trim_start = start.clone();
        let mut trim_end = end.clone();

        if let Some(left) = trim_left.filter(Duration::is_positive) {
            let mut state = create_state(self, id, &globals);
            step_state(self, &mut state, &left, &globals)?;
            trim_start = state.at;
        }
        if let Some(right) = trim_right.filter(Duration::is_positive) {
            let mut state = create_state(self, id, &globals);
            let scale = std::mem::replace(&mut state.scale, Rational::one());
            let span = Duration::new(&end.wn - &start.wn, Unit::WholeNotes);
            step_state(self, &mut state, &span, &globals)?;
            state.scale = scale;
            step_state(self, &mut state, &right.inverse(), &globals)?;
            trim_end = state.at;
        }

        let (own_trim_start, own_trim_end) = (trim_start.clone(), trim_end.clone());
        if let Some((parent_start, parent_end)) = parent_window {
            if trim_start.time < parent_start.time {
                trim_start = parent_start;
            }
            if trim_end.time > parent_end.time {
                trim_end = parent_end;
            }
        }

        let cache = &mut self.nodes[id].cache;
        cache.skip = Rational::zero();
        cache.trimmed_start = false;
        cache.trimmed_end = false;

        if start.time < trim_start.time {
            cache.trimmed_start = true;
            cache.skip = &trim_start.time - &start.time;
            if suppress && cache.skip.is_positive() {
                cache.enabled = false;
            }
        }
        if start.time > trim_end.time {
            cache.trimmed_end = true;
            if suppress {
                cache.enabled = false;
            }
        }
        cache.trim_start = trim_start;
        cache.trim_end = trim_end;
        cache.own_trim_start = own_trim_start;
        cache.own_trim_end = own_trim_end;

        for child in children {
            self.resolve_trim(child)?;
        }
        Ok(())
    }
}
