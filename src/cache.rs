//! Resolved per-node values.
//!
//! `globals` and `repeats` are [`SharedList`] handles: a child starts with the
//! same list as its parent and only gets its own copy when it appends to it, so
//! sibling subtrees never observe each other's insertions.

use crate::duration::{Duration, Rational};
use crate::timeline::NodeId;
use num_traits::{One, Zero};
use std::ops::Deref;
use std::rc::Rc;

/// A point on both axes: seconds and whole notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Moment {
    pub time: Rational,
    pub wn: Rational,
}

impl Moment {
    pub fn new(time: Rational, wn: Rational) -> Self {
        Self { time, wn }
    }

    pub fn zero() -> Self {
        Self::new(Rational::zero(), Rational::zero())
    }
}

impl Default for Moment {
    fn default() -> Self {
        Self::zero()
    }
}

/// One level of replay: `count` passes over a period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repeat {
    pub count: u32,
    pub period_time: Rational,
    pub period_wn: Rational,
}

/// Persistent list handle with copy-on-first-write.
#[derive(Debug)]
pub struct SharedList<T>(Rc<Vec<T>>);

impl<T> SharedList<T> {
    pub fn new() -> Self {
        Self(Rc::new(Vec::new()))
    }

    /// Whether both handles point at the same storage.
    pub fn shares_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> SharedList<T> {
    /// Appends, copying the storage first if it is shared.
    pub fn push(&mut self, item: T) {
        Rc::make_mut(&mut self.0).push(item);
    }

    pub fn insert(&mut self, index: usize, item: T) {
        Rc::make_mut(&mut self.0).insert(index, item);
    }
}

impl<T> Clone for SharedList<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Default for SharedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for SharedList<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T: PartialEq> PartialEq for SharedList<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

/// Sibling position recorded by the parent while it walks its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiblingLinks {
    pub no: Option<usize>,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cache {
    pub resolved: bool,
    pub start: Moment,
    pub end: Moment,
    pub enabled: bool,
    pub amp: f64,
    pub scale: Rational,
    pub tempo: Option<NodeId>,
    pub time: Option<NodeId>,
    pub key: Option<NodeId>,
    pub s_per_wn: Option<Rational>,
    /// Effective duration, own or inherited
    pub duration: Option<Duration>,
    pub globals: SharedList<NodeId>,
    pub trim_start: Moment,
    pub trim_end: Moment,
    /// Trim window before clipping against the parent
    pub own_trim_start: Moment,
    pub own_trim_end: Moment,
    pub skip: Rational,
    pub trimmed_start: bool,
    pub trimmed_end: bool,
    pub repeats: SharedList<Repeat>,
    pub children: Vec<NodeId>,
    pub links: SiblingLinks,
    pub playback_timing_time: Option<Rational>,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            resolved: false,
            start: Moment::zero(),
            end: Moment::zero(),
            enabled: true,
            amp: 1.0,
            scale: Rational::one(),
            tempo: None,
            time: None,
            key: None,
            s_per_wn: None,
            duration: None,
            globals: SharedList::new(),
            trim_start: Moment::zero(),
            trim_end: Moment::zero(),
            own_trim_start: Moment::zero(),
            own_trim_end: Moment::zero(),
            skip: Rational::zero(),
            trimmed_start: false,
            trimmed_end: false,
            repeats: SharedList::new(),
            children: Vec::new(),
            links: SiblingLinks::default(),
            playback_timing_time: None,
        }
    }
}

impl Cache {
    pub(crate) fn with_links(links: SiblingLinks) -> Self {
        Self {
            links,
            ..Self::default()
        }
    }

    pub fn abs_time(&self) -> Rational {
        self.start.time.clone()
    }

    pub fn abs_wn(&self) -> Rational {
        self.start.wn.clone()
    }

    pub fn end_time(&self) -> Rational {
        self.end.time.clone()
    }

    pub fn end_wn(&self) -> Rational {
        self.end.wn.clone()
    }

    pub fn trimmed_start_time(&self) -> Rational {
        self.trim_start.time.clone()
    }

    pub fn trimmed_start_wn(&self) -> Rational {
        self.trim_start.wn.clone()
    }

    pub fn trimmed_end_time(&self) -> Rational {
        self.trim_end.time.clone()
    }

    pub fn trimmed_end_wn(&self) -> Rational {
        self.trim_end.wn.clone()
    }

    pub fn no(&self) -> Option<usize> {
        self.links.no
    }

    pub fn prev_sibling(&self) -> Option<NodeId> {
        self.links.prev
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.links.next
    }
}
