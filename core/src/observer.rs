//! Observer trait — everything that consumes engine events.
//!
//! The engine delivers each event to every observer, in the order the
//! observers were passed in, before producing the next event.

use std::any::Any;

use crate::{error::SimResult, event::SimEvent};

pub trait SimObserver {
    /// Stable name, used in log lines.
    fn name(&self) -> &'static str;

    /// Called once per event. An error aborts the run.
    fn observe(&mut self, event: &SimEvent) -> SimResult<()>;

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;
}

/// Keeps every event in memory. Used by replay checks and tests.
#[derive(Debug, Default)]
pub struct EventRecorder {
    pub events: Vec<SimEvent>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, type_name: &str) -> usize {
        self.events.iter().filter(|e| e.type_name() == type_name).count()
    }
}

impl SimObserver for EventRecorder {
    fn name(&self) -> &'static str {
        "event_recorder"
    }

    fn observe(&mut self, event: &SimEvent) -> SimResult<()> {
        self.events.push(event.clone());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub(crate) fn notify(observers: &mut [&mut dyn SimObserver], event: &SimEvent) -> SimResult<()> {
    for observer in observers.iter_mut() {
        observer.observe(event).inspect_err(|e| {
            log::error!("observer '{}' rejected {}: {e}", observer.name(), event.type_name());
        })?;
    }
    Ok(())
}
