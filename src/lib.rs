pub mod arrange;
pub mod cache;
pub mod document;
pub mod duration;
pub mod error;
pub mod meta;
pub mod node;
pub mod query;
pub mod report;
pub mod resolve;
pub mod schema;
pub mod state;
pub mod timeline;

pub use cache::{Cache, Moment, Repeat, SharedList};
pub use document::{load_file, load_str, Settings};
pub use duration::{ratio, Duration, Rational, Unit};
pub use error::*;
pub use meta::{GlobalKind, Key, Meta, Tempo, TimeSignature};
pub use node::{Event, Node, NodeKind, TimeMode};
pub use query::of_kind;
pub use report::{TimingReport, TimingRow};
pub use state::State;
pub use timeline::{NodeId, Timeline};

/// Load a YAML document and resolve it.
/// This is the main entry point for the library.
pub fn resolve_document(source: &str) -> Result<Timeline, TimelineError> {
    let mut timeline = load_str(source)?;
    timeline.resolve(true)?;
    Ok(timeline)
}

/// Load, resolve and render the timing report of a document as YAML.
pub fn timing_report(source: &str) -> Result<String, TimelineError> {
    let mut timeline = resolve_document(source)?;
    TimingReport::from_timeline(&mut timeline)?.to_yaml()
}
