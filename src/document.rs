//! # Document Loading
//!
//! Build a [`Timeline`] from a YAML document with an optional `settings` header
//! and one `song` tree.
//!
//! ```yaml
//! settings: { tempo: 120, beat: 1/4, time-signature: 4/4 }
//! song:
//!   type: Song
//!   metas:
//!     - { type: Tempo, bpm: 90, position: 2 wn }
//!   events:
//!     - type: Voice
//!       events:
//!         - { type: Note, duration: 1/4 wn, pitch: C4 }
//! ```
//!
//! ## Settings
//! | key              | default | meaning                                   |
//! |------------------|---------|-------------------------------------------|
//! | `tempo`          | `120`   | bpm of the fallback tempo                 |
//! | `beat`           | `1/4`   | beat of the fallback tempo                |
//! | `time-signature` | `4/4`   | fallback time signature                   |
//! | `inject-defaults`| `true`  | prepend the fallbacks to the song's metas |
//!
//! Fallbacks are only injected when the song has no Tempo (resp. Time) meta at
//! its start.
//!
//! ## Children without a `type`
//! Events default to the child kind of their container (`Voice` inside a `Part`,
//! `Note` elsewhere). Metas always need a `type`.

use crate::duration::{parse_rational, Duration, Rational};
use crate::error::TimelineError;
use crate::meta::{Key, Meta, Tempo, TimeSignature};
use crate::node::{Node, NodeKind, TimeMode};
use crate::timeline::{NodeId, Timeline};
use num_traits::Signed;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Raw settings header for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case")]
pub struct RawSettings {
    pub tempo: Option<String>,
    pub beat: Option<String>,
    pub time_signature: Option<String>,
    pub inject_defaults: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tempo: Tempo,
    pub time_signature: TimeSignature,
    pub inject_defaults: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tempo: Tempo::default(),
            time_signature: TimeSignature::default(),
            inject_defaults: true,
        }
    }
}

impl RawSettings {
    pub fn into_settings(self) -> Result<Settings, TimelineError> {
        let defaults = Settings::default();

        let bpm = match &self.tempo {
            Some(text) => positive(text, "tempo")?,
            None => defaults.tempo.bpm,
        };
        let beat = match &self.beat {
            Some(text) => positive(text, "beat")?,
            None => defaults.tempo.beat,
        };
        let time_signature = match &self.time_signature {
            Some(text) => parse_time_signature(text)?,
            None => defaults.time_signature,
        };

        Ok(Settings {
            tempo: Tempo::new(bpm, beat),
            time_signature,
            inject_defaults: self.inject_defaults.unwrap_or(defaults.inject_defaults),
        })
    }
}

fn positive(text: &str, what: &str) -> Result<Rational, TimelineError> {
    match parse_rational(text.trim()) {
        Some(value) if value.is_positive() => Ok(value),
        _ => Err(TimelineError::Metadata(format!("Invalid {}: {}", what, text))),
    }
}

fn parse_time_signature(text: &str) -> Result<TimeSignature, TimelineError> {
    let invalid = || TimelineError::Metadata(format!("Invalid time signature: {}", text));
    let (num, denom) = text.split_once('/').ok_or_else(invalid)?;
    let num: u32 = num.trim().parse().map_err(|_| invalid())?;
    let denom: u32 = denom.trim().parse().map_err(|_| invalid())?;
    let time = TimeSignature::new(num, denom);
    time.validate().map_err(|_| invalid())?;
    Ok(time)
}

#[derive(Deserialize, Debug)]
struct RawDocument {
    #[serde(default)]
    settings: RawSettings,
    song: RawNode,
}

/// `beats: 6` or `beats: [3, 3]`
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum RawBeats {
    Count(u32),
    Groups(Vec<u32>),
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawNode {
    #[serde(rename = "type")]
    kind: Option<NodeKind>,
    position: Option<Duration>,
    duration: Option<Duration>,
    trim_left: Option<Duration>,
    trim_right: Option<Duration>,
    anchor: Option<Duration>,
    playback_timing: Option<Duration>,
    amp: Option<f64>,
    repeat: Option<u32>,
    step_duration: Option<bool>,
    scale: Option<String>,
    layer: Option<u32>,
    enabled: Option<bool>,
    event_time_mode: Option<TimeMode>,
    meta_time_mode: Option<TimeMode>,
    #[serde(default)]
    events: Vec<RawNode>,
    #[serde(default)]
    metas: Vec<RawNode>,
    // Meta payloads
    bpm: Option<String>,
    beat: Option<String>,
    beats: Option<RawBeats>,
    denom: Option<u32>,
    root: Option<String>,
    mode: Option<String>,
    clef: Option<String>,
    pitch: Option<String>,
}

impl RawNode {
    fn has_meta_payload(&self) -> bool {
        self.bpm.is_some()
            || self.beat.is_some()
            || self.beats.is_some()
            || self.denom.is_some()
            || self.root.is_some()
            || self.mode.is_some()
            || self.clef.is_some()
    }

    fn meta(&self, kind: NodeKind) -> Result<Option<Meta>, TimelineError> {
        let rational = |field: &Option<String>, name: &str| {
            field
                .as_deref()
                .map(|text| {
                    parse_rational(text.trim()).ok_or_else(|| {
                        TimelineError::schema(kind, format!("invalid {}: {}", name, text))
                    })
                })
                .transpose()
        };

        let meta = match kind {
            NodeKind::Tempo => {
                let defaults = Tempo::default();
                Meta::Tempo(Tempo::new(
                    rational(&self.bpm, "bpm")?.unwrap_or(defaults.bpm),
                    rational(&self.beat, "beat")?.unwrap_or(defaults.beat),
                ))
            }
            NodeKind::Time => {
                let defaults = TimeSignature::default();
                let denom = self.denom.unwrap_or(defaults.denom);
                let beats = match &self.beats {
                    Some(RawBeats::Count(num)) => TimeSignature::default_beat_pattern(*num, denom),
                    Some(RawBeats::Groups(groups)) => groups.clone(),
                    None => defaults.beats,
                };
                Meta::Time(TimeSignature { beats, denom })
            }
            NodeKind::Key => {
                let defaults = Key::default();
                Meta::Key(Key {
                    root: self.root.clone().unwrap_or(defaults.root),
                    mode: self.mode.clone().unwrap_or(defaults.mode),
                })
            }
            NodeKind::Clef => Meta::Clef(self.clef.clone().unwrap_or_else(|| "treble".to_string())),
            _ if self.has_meta_payload() => {
                let message = "tempo, time, key and clef fields only apply to metas";
                return Err(TimelineError::schema(kind, message));
            }
            _ => return Ok(None),
        };
        Ok(Some(meta))
    }

    fn to_node(&self, kind: NodeKind) -> Result<Node, TimelineError> {
        let mut node = match self.meta(kind)? {
            Some(meta) => Node::meta(meta),
            None => Node::new(kind),
        };

        let event = &mut node.event;
        event.position = self.position.clone();
        event.duration = self.duration.clone();
        event.trim_left = self.trim_left.clone();
        event.trim_right = self.trim_right.clone();
        event.anchor = self.anchor.clone();
        event.playback_timing = self.playback_timing.clone();
        event.layer = self.layer;
        event.label = self.pitch.clone();
        if let Some(amp) = self.amp {
            event.amp = amp;
        }
        if let Some(repeat) = self.repeat {
            event.repeat = repeat;
        }
        if let Some(step) = self.step_duration {
            event.step_duration = step;
        }
        if let Some(enabled) = self.enabled {
            event.enabled = enabled;
        }
        if let Some(scale) = &self.scale {
            let value = parse_rational(scale.trim())
                .ok_or_else(|| TimelineError::schema(kind, format!("invalid scale: {}", scale)))?;
            event.scale = Some(value);
        }
        if let Some(mode) = self.event_time_mode {
            node.event_time_mode = mode;
        }
        if let Some(mode) = self.meta_time_mode {
            node.meta_time_mode = mode;
        }
        Ok(node)
    }
}

enum Slot {
    Root,
    Event(NodeId),
    Meta(NodeId),
}

fn build(
    tl: &mut Timeline,
    raw: &RawNode,
    slot: Slot,
    default_kind: Option<NodeKind>,
) -> Result<NodeId, TimelineError> {
    let kind = match raw.kind.or(default_kind) {
        Some(kind) => kind,
        None => return Err(TimelineError::Metadata("every meta needs a type".to_string())),
    };
    let node = raw.to_node(kind)?;
    let id = match slot {
        Slot::Root => tl.add_root(node)?,
        Slot::Event(parent) => tl.add_event(parent, node)?,
        Slot::Meta(parent) => tl.add_meta(parent, node)?,
    };

    for meta in &raw.metas {
        build(tl, meta, Slot::Meta(id), None)?;
    }
    let child_kind = kind.schema().default_child.or(Some(NodeKind::Note));
    for event in &raw.events {
        build(tl, event, Slot::Event(id), child_kind)?;
    }
    Ok(id)
}

/// Prepend fallback Tempo and Time metas the root does not set at its start.
fn inject_defaults(
    tl: &mut Timeline,
    root: NodeId,
    settings: &Settings,
) -> Result<(), TimelineError> {
    let at_start = |kind: NodeKind| {
        move |node: &Node| {
            node.kind() == kind && node.event.position.as_ref().map_or(true, Duration::is_zero)
        }
    };
    if tl.child_metas(root, at_start(NodeKind::Time)).is_empty() {
        log::debug!("injecting default time signature {}", settings.time_signature);
        tl.insert_meta(root, 0, Node::meta(settings.time_signature.clone()))?;
    }
    if tl.child_metas(root, at_start(NodeKind::Tempo)).is_empty() {
        log::debug!("injecting default tempo {}", settings.tempo);
        tl.insert_meta(root, 0, Node::meta(settings.tempo.clone()))?;
    }
    Ok(())
}

/// Load a document from YAML text. The timeline is not resolved yet.
pub fn load_str(source: &str) -> Result<Timeline, TimelineError> {
    let raw: RawDocument = serde_yaml::from_str(source)?;
    let settings = raw.settings.into_settings()?;

    let mut tl = Timeline::new();
    let root = build(&mut tl, &raw.song, Slot::Root, Some(NodeKind::Song))?;
    if settings.inject_defaults {
        inject_defaults(&mut tl, root, &settings)?;
    }
    Ok(tl)
}

pub fn load_file(path: impl AsRef<Path>) -> Result<Timeline, TimelineError> {
    let source = fs::read_to_string(path)?;
    load_str(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::ratio;
    use crate::query::of_kind;
    use std::io::Write;

    fn r(numer: i64, denom: i64) -> Rational {
        ratio(numer, denom)
    }

    fn resolved(source: &str) -> (Timeline, NodeId) {
        let mut tl = load_str(source).unwrap();
        tl.resolve(false).unwrap();
        let root = tl.roots()[0];
        (tl, root)
    }

    #[test]
    fn test_load_and_resolve() {
        let source = r#"
settings: { tempo: 120, beat: 1/4, time-signature: 4/4 }
song:
  type: Song
  metas:
    - { type: Tempo, bpm: 60, position: 1/2 wn }
  events:
    - type: Voice
      events:
        - { type: Note, duration: 1/4 wn, pitch: C4 }
        - { duration: 1/2 wn, pitch: D4 }
"#;
        let (tl, song) = resolved(source);
        let notes = tl.find_events(song, of_kind(NodeKind::Note));
        assert_eq!(notes.len(), 2);
        assert_eq!(tl[notes[1]].event.label.as_deref(), Some("D4"));
        // 1/4 wn at 2 s/wn, then 1/4 wn at 2 s/wn and 1/4 wn at 4 s/wn
        assert_eq!(tl[notes[1]].cache().abs_time(), r(1, 2));
        assert_eq!(tl[notes[1]].cache().end_time(), r(2, 1));
    }

    #[test]
    fn test_settings_defaults_are_injected() {
        let source = r#"
settings: { tempo: 60 }
song:
  events:
    - type: Voice
      events:
        - duration: 1/4 wn
"#;
        let (tl, song) = resolved(source);
        assert_eq!(tl[song].kind(), NodeKind::Song);
        let metas = tl[song].metas();
        assert_eq!(tl[metas[0]].kind(), NodeKind::Tempo);
        assert_eq!(tl[metas[1]].kind(), NodeKind::Time);

        let note = tl.find_event(song, of_kind(NodeKind::Note)).unwrap();
        assert_eq!(tl[note].cache().end_time(), r(1, 1));
    }

    #[test]
    fn test_explicit_tempo_is_not_overridden() {
        let source = r#"
song:
  metas:
    - { type: Tempo, bpm: 30 }
  events:
    - type: Voice
      events: [{ duration: 1/4 wn }]
"#;
        let (tl, song) = resolved(source);
        assert_eq!(tl.child_metas(song, of_kind(NodeKind::Tempo)).len(), 1);
        let note = tl.find_event(song, of_kind(NodeKind::Note)).unwrap();
        assert_eq!(tl[note].cache().end_time(), r(2, 1));
    }

    #[test]
    fn test_injection_can_be_disabled() {
        let source = r#"
settings: { inject-defaults: false }
song:
  events:
    - type: Voice
      events: [{ duration: 1/4 wn }]
"#;
        let mut tl = load_str(source).unwrap();
        assert!(matches!(tl.resolve(false), Err(TimelineError::NoTempo)));
    }

    #[test]
    fn test_invalid_settings() {
        let bad_tempo = "settings: { tempo: fast }\nsong: {}";
        assert!(matches!(load_str(bad_tempo), Err(TimelineError::Metadata(_))));

        let bad_time = "settings: { time-signature: 3/5 }\nsong: {}";
        assert!(matches!(load_str(bad_time), Err(TimelineError::Metadata(_))));
    }

    #[test]
    fn test_default_child_kinds() {
        let source = r#"
song:
  events:
    - type: Part
      events:
        - events: [{ duration: 1/4 wn }]
"#;
        let (tl, song) = resolved(source);
        let part = tl[song].events()[0];
        let voice = tl[part].events()[0];
        assert_eq!(tl[part].kind(), NodeKind::Part);
        assert_eq!(tl[voice].kind(), NodeKind::Voice);
        assert_eq!(tl[tl[voice].events()[0]].kind(), NodeKind::Note);
    }

    #[test]
    fn test_meta_payloads() {
        let source = r#"
song:
  metas:
    - { type: Time, beats: 6, denom: 8 }
    - { type: Tempo, bpm: 60, beat: 3/8 }
    - { type: Key, root: D, mode: minor }
    - { type: Clef, clef: bass }
"#;
        let tl = load_str(source).unwrap();
        let song = tl.roots()[0];
        let payloads: Vec<_> = tl[song]
            .metas()
            .iter()
            .filter_map(|&id| tl[id].meta_payload().cloned())
            .collect();

        assert_eq!(payloads[0], Meta::Time(TimeSignature::new(6, 8)));
        assert_eq!(payloads[1], Meta::Tempo(Tempo::new(r(60, 1), r(3, 8))));
        assert!(matches!(&payloads[2], Meta::Key(key) if key.root == "D" && key.mode == "minor"));
        assert_eq!(payloads[3], Meta::Clef("bass".to_string()));
    }

    #[test]
    fn test_duration_forms_and_fields() {
        let source = r#"
song:
  events:
    - type: VerticalContainer
      event-time-mode: relative
      events:
        - { type: Audio, duration: [1, 4, wn], trim-left: 250, repeat: 2, amp: 0.5 }
        - { type: Rest, duration: [1, s], step-duration: false, layer: 1 }
        - { type: Tuplet, scale: 2/3, enabled: false }
"#;
        let tl = load_str(source).unwrap();
        let song = tl.roots()[0];
        let stack = tl[song].events()[0];
        let children = tl[stack].events();
        assert_eq!(tl[stack].event_time_mode, TimeMode::Relative);

        let audio = &tl[children[0]].event;
        assert_eq!(audio.duration, Some(Duration::wn(1, 4)));
        assert_eq!(audio.trim_left, Some("250 ms".parse().unwrap()));
        assert_eq!((audio.repeat, audio.amp), (2, 0.5));

        let rest = &tl[children[1]].event;
        assert_eq!(rest.duration, Some(Duration::seconds(r(1, 1))));
        assert!(!rest.step_duration);
        assert_eq!(rest.layer, Some(1));

        let tuplet = &tl[children[2]].event;
        assert_eq!(tuplet.scale, Some(r(2, 3)));
        assert!(!tuplet.enabled);
    }

    #[test]
    fn test_structural_errors() {
        let unknown_field = "song: { events: [{ duration: 1/4 wn, volume: 3 }] }";
        assert!(matches!(load_str(unknown_field), Err(TimelineError::Document(_))));

        let untyped_meta = "song: { metas: [{ bpm: 90 }] }";
        assert!(matches!(load_str(untyped_meta), Err(TimelineError::Metadata(_))));

        let payload_on_note = "song: { events: [{ type: Note, bpm: 90 }] }";
        assert!(matches!(
            load_str(payload_on_note),
            Err(TimelineError::Schema { kind: NodeKind::Note, .. })
        ));

        let nested_leaf = "song: { events: [{ type: Rest, events: [{}] }] }";
        assert!(matches!(load_str(nested_leaf), Err(TimelineError::Schema { .. })));

        let bad_duration = "song: { events: [{ duration: 1/4 furlongs }] }";
        assert!(matches!(load_str(bad_duration), Err(TimelineError::Document(_))));
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let source = "song:\n  events:\n    - { type: Voice, events: [{ duration: 1 wn }] }";
        writeln!(file, "{}", source).unwrap();

        let mut tl = load_file(file.path()).unwrap();
        tl.resolve(false).unwrap();
        let song = tl.roots()[0];
        assert_eq!(tl[song].cache().end_time(), r(2, 1));

        let missing = file.path().with_extension("missing");
        assert!(matches!(load_file(missing), Err(TimelineError::Io(_))));
    }
}
