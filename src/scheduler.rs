use crate::spinner::SpinnerTick;

/// Work a timer performs when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerTask {
    Spinner(SpinnerTick),
}

impl TimerTask {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Spinner(_) => "spinner",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) interval_ms: Option<i64>,
    pub(crate) task: TimerTask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
    pub interval_ms: Option<i64>,
}

/// Fake clock plus the queue of timers waiting on it.
#[derive(Debug, Clone)]
pub(crate) struct Scheduler {
    pub(crate) now_ms: i64,
    task_queue: Vec<ScheduledTask>,
    next_timer_id: i64,
    next_task_order: i64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            now_ms: 0,
            task_queue: Vec::new(),
            next_timer_id: 1,
            next_task_order: 0,
        }
    }
}

impl Scheduler {
    /// Returns `(id, due_at)`.
    pub(crate) fn schedule_interval(&mut self, task: TimerTask, interval_ms: i64) -> (i64, i64) {
        let interval_ms = interval_ms.max(0);
        let due_at = self.now_ms.saturating_add(interval_ms);
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        let order = self.next_order();
        self.task_queue.push(ScheduledTask {
            id,
            due_at,
            order,
            interval_ms: Some(interval_ms),
            task,
        });
        (id, due_at)
    }

    fn next_order(&mut self) -> i64 {
        let order = self.next_task_order;
        self.next_task_order += 1;
        order
    }

    /// Puts a fired interval back on the queue one period after its last due
    /// time. Returns the new due time.
    pub(crate) fn requeue(&mut self, task: ScheduledTask) -> Option<i64> {
        let interval_ms = task.interval_ms?;
        let due_at = task.due_at.saturating_add(interval_ms);
        let order = self.next_order();
        self.task_queue.push(ScheduledTask {
            due_at,
            order,
            ..task
        });
        Some(due_at)
    }

    pub(crate) fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        self.task_queue
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.is_none_or(|limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(idx, _)| idx)
    }

    pub(crate) fn take(&mut self, idx: usize) -> ScheduledTask {
        self.task_queue.remove(idx)
    }

    pub(crate) fn peek(&self, idx: usize) -> Option<&ScheduledTask> {
        self.task_queue.get(idx)
    }

    pub(crate) fn clear(&mut self, id: i64) -> usize {
        let before = self.task_queue.len();
        self.task_queue.retain(|task| task.id != id);
        before.saturating_sub(self.task_queue.len())
    }

    pub(crate) fn clear_all(&mut self) -> usize {
        let cleared = self.task_queue.len();
        self.task_queue.clear();
        cleared
    }

    pub(crate) fn len(&self) -> usize {
        self.task_queue.len()
    }

    pub(crate) fn pending(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
                interval_ms: task.interval_ms,
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeId;

    fn tick() -> TimerTask {
        TimerTask::Spinner(SpinnerTick::new(NodeId(1)))
    }

    #[test]
    fn next_task_orders_by_due_time_then_insertion() {
        let mut scheduler = Scheduler::default();
        let (late, _) = scheduler.schedule_interval(tick(), 100);
        let (early, _) = scheduler.schedule_interval(tick(), 50);
        let (tie, _) = scheduler.schedule_interval(tick(), 100);

        let order = scheduler
            .pending()
            .into_iter()
            .map(|timer| timer.id)
            .collect::<Vec<_>>();
        assert_eq!(order, vec![early, late, tie]);

        assert_eq!(scheduler.next_task_index(Some(49)), None);
        let idx = scheduler.next_task_index(Some(50));
        assert_eq!(idx.and_then(|idx| scheduler.peek(idx)).map(|t| t.id), Some(early));
    }

    #[test]
    fn requeue_moves_interval_one_period_forward() {
        let mut scheduler = Scheduler::default();
        let (id, due_at) = scheduler.schedule_interval(tick(), 100);
        assert_eq!(due_at, 100);

        let idx = scheduler.next_task_index(None).unwrap_or_default();
        let task = scheduler.take(idx);
        assert_eq!(scheduler.len(), 0);
        assert_eq!(scheduler.requeue(task), Some(200));

        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].interval_ms, Some(100));
    }

    #[test]
    fn negative_delays_clamp_to_now() {
        let mut scheduler = Scheduler::default();
        scheduler.now_ms = 40;
        let (_, due_at) = scheduler.schedule_interval(tick(), -5);
        assert_eq!(due_at, 40);
        assert_eq!(scheduler.pending()[0].interval_ms, Some(0));
    }

    #[test]
    fn clear_removes_by_id() {
        let mut scheduler = Scheduler::default();
        let (a, _) = scheduler.schedule_interval(tick(), 10);
        scheduler.schedule_interval(tick(), 20);
        assert_eq!(scheduler.clear(a), 1);
        assert_eq!(scheduler.clear(a), 0);
        assert_eq!(scheduler.clear_all(), 1);
        assert!(scheduler.pending().is_empty());
    }
}
