//! Flat, serializable view of a resolved timeline.
//!
//! Rationals are written twice: exactly, as `"n/d"` strings, and as floats for
//! consumers that only need approximate positions.

use crate::cache::Moment;
use crate::duration::Rational;
use crate::error::TimelineError;
use crate::node::NodeKind;
use crate::timeline::{NodeId, Timeline};
use num_traits::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
    pub time: String,
    pub wn: String,
    pub seconds: f64,
    pub whole_notes: f64,
}

impl From<&Moment> for TimePoint {
    fn from(moment: &Moment) -> Self {
        Self {
            time: moment.time.to_string(),
            wn: moment.wn.to_string(),
            seconds: float(&moment.time),
            whole_notes: float(&moment.wn),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatRow {
    pub count: u32,
    pub period_time: String,
    pub period_wn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingRow {
    pub kind: NodeKind,
    pub depth: usize,
    /// Row index of the parent
    pub parent: Option<usize>,
    pub meta: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub start: TimePoint,
    pub end: TimePoint,
    pub trim_start: TimePoint,
    pub trim_end: TimePoint,
    pub enabled: bool,
    pub amp: f64,
    pub skip: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repeats: Vec<RepeatRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<u32>,
}

/// Every node of a timeline in document order, metas before events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingReport {
    pub rows: Vec<TimingRow>,
}

impl TimingReport {
    /// Resolves the timeline if needed, then flattens it.
    pub fn from_timeline(tl: &mut Timeline) -> Result<Self, TimelineError> {
        tl.resolve(false)?;

        let mut index: HashMap<NodeId, usize> = HashMap::new();
        let mut rows = Vec::with_capacity(tl.len());
        for &root in tl.roots() {
            for (id, depth) in tl.descendants(root) {
                let node = &tl[id];
                let cache = node.cache();
                index.insert(id, rows.len());
                rows.push(TimingRow {
                    kind: node.kind(),
                    depth,
                    parent: node.parent().and_then(|parent| index.get(&parent).copied()),
                    meta: node.meta_payload().is_some(),
                    label: node.event.label.clone(),
                    start: (&cache.start).into(),
                    end: (&cache.end).into(),
                    trim_start: (&cache.trim_start).into(),
                    trim_end: (&cache.trim_end).into(),
                    enabled: cache.enabled,
                    amp: cache.amp,
                    skip: cache.skip.to_string(),
                    repeats: cache
                        .repeats
                        .iter()
                        .map(|repeat| RepeatRow {
                            count: repeat.count,
                            period_time: repeat.period_time.to_string(),
                            period_wn: repeat.period_wn.to_string(),
                        })
                        .collect(),
                    layer: node.event.layer,
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn to_yaml(&self) -> Result<String, TimelineError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Rows of one kind
    pub fn rows_of(&self, kind: NodeKind) -> impl Iterator<Item = &TimingRow> {
        self.rows.iter().filter(move |row| row.kind == kind)
    }
}

fn float(value: &Rational) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
