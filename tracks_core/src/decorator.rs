//! Decorators - supplementary traces derived from a tracker list
//!
//! A decorator wraps a pure function from trackers to plot arguments. The
//! function runs at most once per decorator; later plots reuse its output.
//! Only marker-compatible trackers are passed to it.

use crate::error::{Result, TrackError};
use crate::trace::{PlotArgs, Trace, TraceKind};
use crate::tracker::Tracker;
use std::fmt;
use tracing::{debug, warn};

/// Output of a decoration function.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoration {
    /// Same arguments at every snapshot
    Static(PlotArgs),
    /// One set of arguments per snapshot
    PerSnapshot(Vec<PlotArgs>),
}

impl Decoration {
    fn is_empty(&self) -> bool {
        match self {
            Decoration::Static(args) => args.is_empty(),
            Decoration::PerSnapshot(frames) => frames.is_empty(),
        }
    }
}

/// Decoration function over the marker-compatible trackers.
pub type DecorateFn = Box<dyn Fn(&[&Tracker]) -> Result<Decoration>>;

pub struct Decorator {
    func: DecorateFn,
    plot_args: PlotArgs,
    trace_kind: TraceKind,
    data: Option<Decoration>,
}

impl Decorator {
    pub fn new(
        func: impl Fn(&[&Tracker]) -> Result<Decoration> + 'static,
        plot_args: PlotArgs,
    ) -> Self {
        Self {
            func: Box::new(func),
            plot_args,
            trace_kind: TraceKind::Scatter3d,
            data: None,
        }
    }

    /// Merge arguments into the static plot configuration.
    pub fn set_plot_args(&mut self, args: PlotArgs) {
        self.plot_args.extend(args);
    }

    pub fn set_trace_kind(&mut self, kind: TraceKind) {
        self.trace_kind = kind;
    }

    pub fn is_decorated(&self) -> bool {
        self.data.is_some()
    }

    pub fn data(&self) -> Option<&Decoration> {
        self.data.as_ref()
    }

    /// Run the decoration function over the marker-compatible trackers.
    ///
    /// When none qualify the decorator stays undecorated and plots empty.
    pub fn decorate<'a>(&mut self, trackers: impl IntoIterator<Item = &'a Tracker>) -> Result<()> {
        let compatible: Vec<&Tracker> = trackers
            .into_iter()
            .filter(|t| t.marker_compatible())
            .collect();
        if compatible.is_empty() {
            warn!("No marker-compatible trackers to decorate");
            return Ok(());
        }
        debug!("Decorating {} trackers", compatible.len());
        self.data = Some((self.func)(&compatible)?);
        Ok(())
    }

    pub fn empty_trace(&self) -> Trace {
        Trace::empty(self.trace_kind)
    }

    /// Trace for `snap`; `None` picks the last snapshot of per-snapshot data.
    pub fn plot(&self, snap: Option<usize>) -> Result<Trace> {
        let data = match &self.data {
            Some(data) if !data.is_empty() => data,
            _ => return Ok(self.empty_trace()),
        };
        let patch = match data {
            Decoration::Static(args) => args,
            Decoration::PerSnapshot(frames) => {
                let index = snap.unwrap_or(frames.len() - 1);
                frames.get(index).ok_or(TrackError::IndexOutOfRange {
                    index,
                    len: frames.len(),
                })?
            }
        };
        let mut trace = self.empty_trace();
        trace.update(&self.plot_args);
        trace.update(patch);
        Ok(trace)
    }

    /// Decorate on first use, then plot.
    pub fn decorate_plot<'a>(
        &mut self,
        trackers: impl IntoIterator<Item = &'a Tracker>,
        snap: Option<usize>,
    ) -> Result<Trace> {
        if !self.is_decorated() {
            self.decorate(trackers)?;
        }
        self.plot(snap)
    }
}

impl fmt::Debug for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decorator")
            .field("plot_args", &self.plot_args)
            .field("trace_kind", &self.trace_kind)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
