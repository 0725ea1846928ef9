//! Meta payloads: tempo, time signature, key and clef changes.
//!
//! Metas live in a container's `metas` list. Tempo, Time and Key metas become
//! *globals* once resolved, and are consulted by the stepper; a Clef is carried
//! along but never affects timing.

use crate::duration::{ratio, Rational};
use crate::error::TimelineError;
use crate::node::NodeKind;
use num_traits::Signed;
use std::fmt;

/// Tempo change, `bpm` beats of length `beat` (a whole-note fraction) per minute.
#[derive(Debug, Clone, PartialEq)]
pub struct Tempo {
    pub bpm: Rational,
    pub beat: Rational,
}

impl Default for Tempo {
    fn default() -> Self {
        Self {
            bpm: ratio(120, 1),
            beat: ratio(1, 4),
        }
    }
}

impl Tempo {
    pub fn new(bpm: Rational, beat: Rational) -> Self {
        Self { bpm, beat }
    }

    /// Quarter-note beat at `bpm`
    pub fn bpm(bpm: i64) -> Self {
        Self::new(ratio(bpm, 1), ratio(1, 4))
    }

    /// Seconds per whole note: `60 / (beat * bpm)`
    pub fn s_per_wn(&self) -> Rational {
        ratio(60, 1) / (&self.beat * &self.bpm)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}bpm>", self.bpm)
    }
}

/// Time signature as a beat grouping over a denominator, e.g. `[3, 3] / 8` for 6/8.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSignature {
    pub beats: Vec<u32>,
    pub denom: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: vec![1, 1, 1, 1],
            denom: 4,
        }
    }
}

impl TimeSignature {
    /// `num/denom` with the default beat grouping.
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            beats: Self::default_beat_pattern(num, denom),
            denom,
        }
    }

    /// Default grouping: compound meters (6/8, 9/8, 12/16 ...) group in threes.
    ///
    /// ```
    /// # use musictime::TimeSignature;
    /// assert_eq!(TimeSignature::default_beat_pattern(4, 4), vec![1, 1, 1, 1]);
    /// assert_eq!(TimeSignature::default_beat_pattern(6, 8), vec![3, 3]);
    /// ```
    pub fn default_beat_pattern(num: u32, denom: u32) -> Vec<u32> {
        if denom >= 8 && num >= 6 && num % 3 == 0 {
            vec![3; (num / 3) as usize]
        } else {
            vec![1; num as usize]
        }
    }

    pub fn numerator(&self) -> u32 {
        self.beats.iter().sum()
    }

    /// Length of the first beat in whole notes
    pub fn beat_wn(&self) -> Rational {
        let first = self.beats.first().copied().unwrap_or(1);
        ratio(first as i64, self.denom as i64)
    }

    /// Length of a measure in whole notes
    pub fn measure_wn(&self) -> Rational {
        ratio(self.numerator() as i64, self.denom as i64)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.beats.is_empty() || self.beats.contains(&0) {
            return Err(format!("invalid beat grouping {:?}", self.beats));
        }
        if !self.denom.is_power_of_two() || self.denom > 256 {
            return Err(format!("invalid denominator {}", self.denom));
        }
        Ok(())
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}/{}>", self.numerator(), self.denom)
    }
}

/// Key identity. The resolver never looks inside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    pub root: String,
    pub mode: String,
}

impl Default for Key {
    fn default() -> Self {
        Self {
            root: "C".to_string(),
            mode: "major".to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.root, self.mode)
    }
}

/// Kinds of meta that participate in stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalKind {
    Tempo,
    Time,
    Key,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Meta {
    Tempo(Tempo),
    Time(TimeSignature),
    Key(Key),
    Clef(String),
}

impl Meta {
    pub fn kind(&self) -> NodeKind {
        match self {
            Meta::Tempo(_) => NodeKind::Tempo,
            Meta::Time(_) => NodeKind::Time,
            Meta::Key(_) => NodeKind::Key,
            Meta::Clef(_) => NodeKind::Clef,
        }
    }

    /// `None` for metas that never become globals.
    pub fn global_kind(&self) -> Option<GlobalKind> {
        match self {
            Meta::Tempo(_) => Some(GlobalKind::Tempo),
            Meta::Time(_) => Some(GlobalKind::Time),
            Meta::Key(_) => Some(GlobalKind::Key),
            Meta::Clef(_) => None,
        }
    }

    pub(crate) fn default_for(kind: NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Tempo => Some(Meta::Tempo(Tempo::default())),
            NodeKind::Time => Some(Meta::Time(TimeSignature::default())),
            NodeKind::Key => Some(Meta::Key(Key::default())),
            NodeKind::Clef => Some(Meta::Clef("treble".to_string())),
            _ => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), TimelineError> {
        let message = match self {
            Meta::Tempo(tempo) if !tempo.bpm.is_positive() => {
                Some(format!("bpm must be positive, got {}", tempo.bpm))
            }
            Meta::Tempo(tempo) if !tempo.beat.is_positive() => {
                Some(format!("beat must be positive, got {}", tempo.beat))
            }
            Meta::Time(time) => time.validate().err(),
            _ => None,
        };
        match message {
            Some(message) => Err(TimelineError::schema(self.kind(), message)),
            None => Ok(()),
        }
    }
}

impl From<Tempo> for Meta {
    fn from(tempo: Tempo) -> Self {
        Meta::Tempo(tempo)
    }
}

impl From<TimeSignature> for Meta {
    fn from(time: TimeSignature) -> Self {
        Meta::Time(time)
    }
}

impl From<Key> for Meta {
    fn from(key: Key) -> Self {
        Meta::Key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s_per_wn() {
        // 120 quarter notes per minute: a whole note lasts two seconds
        assert_eq!(Tempo::bpm(120).s_per_wn(), ratio(2, 1));
        assert_eq!(Tempo::bpm(60).s_per_wn(), ratio(4, 1));
        let dotted = Tempo::new(ratio(60, 1), ratio(3, 8));
        assert_eq!(dotted.s_per_wn(), ratio(8, 3));
    }

    #[test]
    fn test_time_signature_lengths() {
        let six_eight = TimeSignature::new(6, 8);
        assert_eq!(six_eight.beats, vec![3, 3]);
        assert_eq!(six_eight.beat_wn(), ratio(3, 8));
        assert_eq!(six_eight.measure_wn(), ratio(3, 4));

        let common = TimeSignature::default();
        assert_eq!(common.beat_wn(), ratio(1, 4));
        assert_eq!(common.measure_wn(), ratio(1, 1));
    }

    #[test]
    fn test_time_signature_validation() {
        assert!(TimeSignature::new(3, 4).validate().is_ok());
        assert!(TimeSignature::new(3, 6).validate().is_err());
        assert!(TimeSignature { beats: vec![], denom: 4 }.validate().is_err());
    }

    #[test]
    fn test_meta_validation() {
        let bad = Meta::Tempo(Tempo::bpm(0));
        assert!(matches!(
            bad.validate(),
            Err(TimelineError::Schema { kind: NodeKind::Tempo, .. })
        ));
        assert!(Meta::Clef("bass".into()).validate().is_ok());
        assert_eq!(Meta::Clef("bass".into()).global_kind(), None);
    }
}
