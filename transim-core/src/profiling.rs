//! Tracy hooks for the tick loop. Everything here compiles to nothing
//! without the `tracy` feature.
//!
//! Spans come from `#[instrument]` on the hot entry points; which of them
//! reach Tracy depends on the [`TraceLevel`] passed to [`init_tracy`]. Each
//! tick ends with [`end_tick`], which closes a Tracy frame and plots the
//! command counters of the tick.

use crate::step::StepReport;

/// Which simulation spans get recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraceLevel {
    /// `step_world` only.
    #[default]
    Info,
    /// Adds command execution, track choice and signal updates.
    Debug,
    /// Adds every train tick and pathfinder search.
    Trace,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trace level {0:?}, expected info, debug or trace")]
pub struct UnknownTraceLevel(String);

impl std::str::FromStr for TraceLevel {
    type Err = UnknownTraceLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(TraceLevel::Info),
            "debug" => Ok(TraceLevel::Debug),
            "trace" => Ok(TraceLevel::Trace),
            _ => Err(UnknownTraceLevel(s.to_string())),
        }
    }
}

/// Install the Tracy subscriber. Call once, before the first tick.
#[cfg(feature = "tracy")]
pub fn init_tracy(level: TraceLevel) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::prelude::*;

    let filter = match level {
        TraceLevel::Info => LevelFilter::INFO,
        TraceLevel::Debug => LevelFilter::DEBUG,
        TraceLevel::Trace => LevelFilter::TRACE,
    };
    tracing_subscriber::registry()
        .with(tracing_tracy::TracyLayer::default())
        .with(filter)
        .init();
}

#[cfg(not(feature = "tracy"))]
pub fn init_tracy(_level: TraceLevel) {}

/// Close the Tracy frame of the tick `report` describes.
#[cfg(feature = "tracy")]
#[inline]
pub fn end_tick(report: &StepReport) {
    tracy_client::plot!("commands run", report.commands_run as f64);
    tracy_client::plot!("commands failed", report.commands_failed as f64);
    tracy_client::secondary_frame_mark!("tick");
}

#[cfg(not(feature = "tracy"))]
#[inline]
pub fn end_tick(_report: &StepReport) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_level_parse() {
        assert_eq!("TRACE".parse::<TraceLevel>(), Ok(TraceLevel::Trace));
        assert_eq!("debug".parse::<TraceLevel>(), Ok(TraceLevel::Debug));
        let err = "loud".parse::<TraceLevel>().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn test_end_tick_without_client() {
        end_tick(&StepReport::default());
    }
}
