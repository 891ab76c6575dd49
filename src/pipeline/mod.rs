//! Pipeline orchestration: branch fan-out, ordered emission, sinks

mod reorder;
mod runner;
mod sink;

pub use reorder::{ClipOutcome, ReorderBuffer};
pub use runner::{Pipeline, Stages};
pub use sink::{ConsoleSink, MultiSink, ResultSink, WebhookSink};
