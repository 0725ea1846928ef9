//! # Timeline State
//!
//! A [`State`] is the transient "where are we" record used while stepping
//! through a span: the tempo/time/key in effect, the current [`Moment`] and the
//! effective scale.
//!
//! ## Stepping
//! [`step_state`] advances a state by a [`Duration`], forward or backward. Spans
//! that cross a global (a resolved Tempo, Time or Key meta) are split at the
//! boundary, so no part of a span is computed under a stale rate:
//!
//! - time units (`s`, `ms`) advance the time axis and split on Tempo globals only
//! - `wn`, `beats` and `measures` are converted to whole notes with the time
//!   signature in effect, then advance the wn axis, splitting on any global
//!
//! The parallel axis always follows through `s_per_wn`.
//!
//! ## Backward steps
//! Stepping backward from a point uses the globals in effect strictly *before*
//! that point. When the state sits exactly on a global, it is rewound first;
//! after crossing each boundary it is rewound again. Landing exactly on a
//! boundary leaves the state as a forward step landing there would.

use crate::cache::Moment;
use crate::duration::{Duration, Rational, Unit};
use crate::error::TimelineError;
use crate::meta::{GlobalKind, Meta, TimeSignature};
use crate::timeline::{NodeId, Timeline};
use num_traits::{One, Signed, Zero};

#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub tempo: Option<NodeId>,
    pub time: Option<NodeId>,
    pub key: Option<NodeId>,
    pub scale: Rational,
    pub at: Moment,
    pub s_per_wn: Option<Rational>,
}

impl State {
    /// A state at `at`, seeded from the globals in effect there (inclusive).
    pub fn at_moment(tl: &Timeline, at: Moment, scale: Rational, globals: &[NodeId]) -> Self {
        let mut state = State {
            tempo: prev_global(tl, globals, &at.time, Some(GlobalKind::Tempo), true),
            time: prev_global(tl, globals, &at.time, Some(GlobalKind::Time), true),
            key: prev_global(tl, globals, &at.time, Some(GlobalKind::Key), true),
            scale,
            at,
            s_per_wn: None,
        };
        state.s_per_wn = tempo_rate(tl, state.tempo);
        state
    }

    pub fn time_signature<'a>(&self, tl: &'a Timeline) -> Option<&'a TimeSignature> {
        match tl.meta_of(self.time?) {
            Some(Meta::Time(time)) => Some(time),
            _ => None,
        }
    }
}

fn tempo_rate(tl: &Timeline, tempo: Option<NodeId>) -> Option<Rational> {
    match tl.meta_of(tempo?) {
        Some(Meta::Tempo(tempo)) => Some(tempo.s_per_wn()),
        _ => None,
    }
}

fn global_kind(tl: &Timeline, id: NodeId) -> Option<GlobalKind> {
    tl.meta_of(id).and_then(Meta::global_kind)
}

fn start_of(tl: &Timeline, id: NodeId) -> Option<&Moment> {
    tl.node(id).map(|node| &node.cache.start)
}

/// Whether global `id` starts exactly at `time`.
fn starts_at(tl: &Timeline, id: NodeId, time: &Rational) -> bool {
    start_of(tl, id).is_some_and(|start| start.time == *time)
}

/// State at a node's resolved start. Cached tempo/time/key win over the globals
/// lookup; the scale is the parent's effective scale.
pub fn create_state(tl: &Timeline, id: NodeId, globals: &[NodeId]) -> State {
    let Some(node) = tl.node(id) else {
        return State::at_moment(tl, Moment::zero(), Rational::one(), globals);
    };
    let cache = &node.cache;
    let at = cache.start.clone();
    let lookup = |kind| prev_global(tl, globals, &at.time, Some(kind), true);

    let tempo = cache.tempo.or_else(|| lookup(GlobalKind::Tempo));
    let scale = node
        .parent
        .and_then(|parent| tl.node(parent))
        .map_or_else(Rational::one, |parent| parent.cache.scale.clone());

    if tempo.is_none() && node.parent.is_some() {
        log::warn!("no tempo in effect for {} at {}s", node.kind(), at.time);
    }

    State {
        tempo,
        time: cache.time.or_else(|| lookup(GlobalKind::Time)),
        key: cache.key.or_else(|| lookup(GlobalKind::Key)),
        scale,
        at,
        s_per_wn: tempo_rate(tl, tempo),
    }
}

/// First global at or after (`inclusive`) / strictly after `time`.
pub fn next_global(
    tl: &Timeline,
    globals: &[NodeId],
    time: &Rational,
    kind: Option<GlobalKind>,
    inclusive: bool,
) -> Option<NodeId> {
    globals.iter().copied().find(|&id| {
        let Some(at) = start_of(tl, id).map(|start| &start.time) else {
            return false;
        };
        let in_range = if inclusive { at >= time } else { at > time };
        in_range && kind.map_or(true, |kind| global_kind(tl, id) == Some(kind))
    })
}

/// Last global at or before (`inclusive`) / strictly before `time`.
pub fn prev_global(
    tl: &Timeline,
    globals: &[NodeId],
    time: &Rational,
    kind: Option<GlobalKind>,
    inclusive: bool,
) -> Option<NodeId> {
    globals.iter().rev().copied().find(|&id| {
        let Some(at) = start_of(tl, id).map(|start| &start.time) else {
            return false;
        };
        let in_range = if inclusive { at <= time } else { at < time };
        in_range && kind.map_or(true, |kind| global_kind(tl, id) == Some(kind))
    })
}

/// Take over the tempo, time or key of `meta`.
pub fn update_state(tl: &Timeline, state: &mut State, meta: NodeId) {
    match tl.meta_of(meta) {
        Some(Meta::Tempo(tempo)) => {
            state.tempo = Some(meta);
            state.s_per_wn = Some(tempo.s_per_wn());
        }
        Some(Meta::Time(_)) => state.time = Some(meta),
        Some(Meta::Key(_)) => state.key = Some(meta),
        Some(Meta::Clef(_)) | None => {}
    }
}

/// Apply every global sitting exactly at the state's current time.
pub fn maybe_update_state(tl: &Timeline, state: &mut State, globals: &[NodeId]) {
    for &id in globals {
        if starts_at(tl, id, &state.at.time) {
            update_state(tl, state, id);
        }
    }
}

/// Replace the slots set by globals at the current point with what was in
/// effect just before it.
fn rewind_state(tl: &Timeline, state: &mut State, globals: &[NodeId]) {
    for kind in [GlobalKind::Tempo, GlobalKind::Time, GlobalKind::Key] {
        let on_point = globals
            .iter()
            .any(|&id| global_kind(tl, id) == Some(kind) && starts_at(tl, id, &state.at.time));
        if !on_point {
            continue;
        }
        if let Some(prev) = prev_global(tl, globals, &state.at.time, Some(kind), false) {
            update_state(tl, state, prev);
        }
    }
}

/// Re-read time signature and key at the landing point of a time-unit step.
fn settle_state(tl: &Timeline, state: &mut State, globals: &[NodeId]) {
    let time = &state.at.time;
    if let Some(id) = prev_global(tl, globals, time, Some(GlobalKind::Time), true) {
        state.time = Some(id);
    }
    if let Some(id) = prev_global(tl, globals, time, Some(GlobalKind::Key), true) {
        state.key = Some(id);
    }
}

fn rate(state: &State) -> Result<Rational, TimelineError> {
    state.s_per_wn.clone().ok_or(TimelineError::NoTempo)
}

/// Whole notes for a `wn`, `beats` or `measures` duration under the current time signature.
fn to_wn(tl: &Timeline, state: &State, duration: &Duration) -> Result<Rational, TimelineError> {
    let signature = || match state.time_signature(tl) {
        Some(time) => time.clone(),
        None => {
            log::warn!("stepping {} without a time signature, assuming 4/4", duration);
            TimeSignature::default()
        }
    };
    match duration.unit {
        Unit::WholeNotes => Ok(duration.value.clone()),
        Unit::Beats => Ok(signature().beat_wn() * &duration.value),
        Unit::Measures => Ok(signature().measure_wn() * &duration.value),
        unit => Err(TimelineError::UnsupportedUnit {
            unit: unit.to_string(),
        }),
    }
}

/// Advance `state` by `duration`, splitting at every global boundary crossed.
pub fn step_state(
    tl: &Timeline,
    state: &mut State,
    duration: &Duration,
    globals: &[NodeId],
) -> Result<(), TimelineError> {
    if duration.is_zero() {
        return Ok(());
    }
    if state.tempo.is_none() {
        return Err(TimelineError::NoTempo);
    }

    match duration.to_seconds() {
        Some(seconds) => {
            let span = &state.scale * seconds;
            if span.is_positive() {
                step_time_fw(tl, state, span, globals)?;
            } else {
                step_time_bw(tl, state, span, globals)?;
            }
            settle_state(tl, state, globals);
        }
        None => {
            let span = &state.scale * to_wn(tl, state, duration)?;
            if span.is_positive() {
                step_wn_fw(tl, state, span, globals)?;
            } else {
                step_wn_bw(tl, state, span, globals)?;
            }
        }
    }
    Ok(())
}

/// Start of the global after (`forward`) or before the state's time, if it lies
/// within `target`.
fn boundary_within(
    tl: &Timeline,
    state: &State,
    globals: &[NodeId],
    kind: Option<GlobalKind>,
    target: &Rational,
    forward: bool,
) -> Option<Moment> {
    let id = if forward {
        next_global(tl, globals, &state.at.time, kind, false)
    } else {
        prev_global(tl, globals, &state.at.time, kind, false)
    };
    let start = start_of(tl, id?)?;
    let within = if forward { start.time <= *target } else { start.time >= *target };
    within.then(|| start.clone())
}

fn step_time_fw(
    tl: &Timeline,
    state: &mut State,
    mut rest: Rational,
    globals: &[NodeId],
) -> Result<(), TimelineError> {
    while rest.is_positive() {
        let s_per_wn = rate(state)?;
        let target = &state.at.time + &rest;
        let tempo = Some(GlobalKind::Tempo);
        let Some(boundary) = boundary_within(tl, state, globals, tempo, &target, true) else {
            state.at.wn += rest / s_per_wn;
            state.at.time = target;
            break;
        };
        let step = &boundary.time - &state.at.time;
        log::debug!("time step split at {}s", boundary.time);
        state.at.wn += &step / s_per_wn;
        state.at.time = boundary.time;
        maybe_update_state(tl, state, globals);
        rest -= step;
    }
    Ok(())
}

fn step_time_bw(
    tl: &Timeline,
    state: &mut State,
    mut rest: Rational,
    globals: &[NodeId],
) -> Result<(), TimelineError> {
    rewind_state(tl, state, globals);
    while rest.is_negative() {
        let s_per_wn = rate(state)?;
        let target = &state.at.time + &rest;
        let tempo = Some(GlobalKind::Tempo);
        let Some(boundary) = boundary_within(tl, state, globals, tempo, &target, false) else {
            state.at.wn += rest / s_per_wn;
            state.at.time = target;
            break;
        };
        let step = &boundary.time - &state.at.time;
        log::debug!("backward time step split at {}s", boundary.time);
        state.at.wn += &step / s_per_wn;
        state.at.time = boundary.time;
        rest -= step;
        if rest.is_zero() {
            maybe_update_state(tl, state, globals);
        } else {
            rewind_state(tl, state, globals);
        }
    }
    Ok(())
}

fn step_wn_fw(
    tl: &Timeline,
    state: &mut State,
    mut rest: Rational,
    globals: &[NodeId],
) -> Result<(), TimelineError> {
    while rest.is_positive() {
        let s_per_wn = rate(state)?;
        let target = &state.at.time + &rest * s_per_wn;
        let Some(boundary) = boundary_within(tl, state, globals, None, &target, true) else {
            state.at.time = target;
            state.at.wn += rest;
            break;
        };
        log::debug!("wn step split at {} wn", boundary.wn);
        rest -= &boundary.wn - &state.at.wn;
        state.at = boundary;
        maybe_update_state(tl, state, globals);
    }
    Ok(())
}

fn step_wn_bw(
    tl: &Timeline,
    state: &mut State,
    mut rest: Rational,
    globals: &[NodeId],
) -> Result<(), TimelineError> {
    rewind_state(tl, state, globals);
    while rest.is_negative() {
        let s_per_wn = rate(state)?;
        let target = &state.at.time + &rest * s_per_wn;
        let Some(boundary) = boundary_within(tl, state, globals, None, &target, false) else {
            state.at.time = target;
            state.at.wn += rest;
            break;
        };
        log::debug!("backward wn step split at {} wn", boundary.wn);
        rest -= &boundary.wn - &state.at.wn;
        state.at = boundary;
        if rest.is_zero() {
            maybe_update_state(tl, state, globals);
        } else {
            rewind_state(tl, state, globals);
        }
    }
    Ok(())
}
