use super::*;
use crate::scheduler::{Scheduler, TimerTask};

pub const SPINNER_PREFIX: &str = "Searching… ";
pub const SPINNER_FRAMES: [char; 4] = ['\\', '|', '/', '-'];
pub const SPINNER_INTERVAL_MS: i64 = 100;

/// Label shown by the submit control on tick `tick` (zero-based).
pub fn spinner_label(tick: usize) -> String {
    let frame = SPINNER_FRAMES[tick % SPINNER_FRAMES.len()];
    format!("{SPINNER_PREFIX}{frame}")
}

/// State carried by the repeating spinner timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpinnerTick {
    pub(crate) target: NodeId,
    pub(crate) ticks: usize,
}

impl SpinnerTick {
    pub(crate) fn new(target: NodeId) -> Self {
        Self { target, ticks: 0 }
    }

    /// Writes the current frame into the control and moves to the next one.
    pub(crate) fn advance(&mut self, dom: &mut Dom) -> Result<String> {
        let label = spinner_label(self.ticks);
        dom.set_value(self.target, &label)?;
        self.ticks = self.ticks.wrapping_add(1);
        Ok(label)
    }
}

/// Disables `control` and starts its label animation. The interval is never
/// cleared here; it lives until the page goes away.
///
/// Returns `(timer_id, first_due_at)`.
pub(crate) fn start(
    dom: &mut Dom,
    scheduler: &mut Scheduler,
    control: NodeId,
) -> Result<(i64, i64)> {
    dom.set_disabled(control, true)?;
    let task = TimerTask::Spinner(SpinnerTick::new(control));
    Ok(scheduler.schedule_interval(task, SPINNER_INTERVAL_MS))
}
