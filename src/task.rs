//! Task table
//!
//! The coordinator's authoritative record of all subtasks. Tasks are
//! created once, at partition time, and persist until the run finishes;
//! only their state and stored result change.

/// Completion state of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not yet handed to any worker
    Pending,
    /// Sent to at least one worker, result not yet recorded
    InFlight,
    /// Result recorded; contributes to the aggregate exactly once
    Done,
}

/// One indivisible unit of the partitioned workload
#[derive(Debug, Clone)]
pub struct Task {
    pub id: usize,
    /// Half-open interval [left, right), immutable once created
    pub left: f64,
    pub right: f64,
    pub state: TaskState,
    /// Valid only when state is Done
    pub result: Option<f64>,
}

/// Authoritative table of all subtasks and their completion state
#[derive(Debug)]
pub struct TaskTable {
    tasks: Vec<Task>,
    remaining: usize,
}

impl TaskTable {
    /// Partition `[start, end)` into `count` equal-width contiguous tasks.
    ///
    /// Deterministic given (range, count): the left edge of task `i` is
    /// always `start + i * step`, so the final aggregation is reproducible
    /// regardless of assignment order.
    pub fn partition(start: f64, end: f64, count: usize) -> Self {
        let step = (end - start) / count as f64;

        let tasks = (0..count)
            .map(|id| {
                let left = start + id as f64 * step;
                // The last right edge is pinned to `end` so rounding never
                // leaves a gap at the top of the range.
                let right = if id == count - 1 { end } else { left + step };
                Task {
                    id,
                    left,
                    right,
                    state: TaskState::Pending,
                    result: None,
                }
            })
            .collect();

        Self {
            tasks,
            remaining: count,
        }
    }

    /// Number of tasks still missing a result
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// Pick the next task to hand to an idle worker.
    ///
    /// Lowest-id Pending task first (FIFO by id, not load-aware). If no
    /// task is Pending, falls back to the lowest-id InFlight task: a task
    /// orphaned by a disconnect keeps its state as-is and is simply
    /// re-dispatched to whichever worker next goes idle. The fallback may
    /// double-send a slow-but-connected worker's task; duplicates are
    /// absorbed by `record_result`.
    pub fn next_assignable(&self) -> Option<usize> {
        self.tasks
            .iter()
            .find(|t| t.state == TaskState::Pending)
            .or_else(|| self.tasks.iter().find(|t| t.state == TaskState::InFlight))
            .map(|t| t.id)
    }

    /// Mark a task as sent to a worker
    pub fn mark_in_flight(&mut self, id: usize) {
        if let Some(task) = self.tasks.get_mut(id) {
            if task.state != TaskState::Done {
                task.state = TaskState::InFlight;
            }
        }
    }

    /// Record a result for a task.
    ///
    /// Returns true if this delivery completed the task; duplicate
    /// deliveries for an already-Done task are ignored so a re-sent task
    /// contributes to the final sum at most once.
    pub fn record_result(&mut self, id: usize, value: f64) -> bool {
        match self.tasks.get_mut(id) {
            Some(task) if task.state != TaskState::Done => {
                task.result = Some(value);
                task.state = TaskState::Done;
                self.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Sum all stored results in ascending task-id order.
    ///
    /// Ascending order keeps floating-point summation reproducible across
    /// runs with different completion orders.
    pub fn aggregate(&self) -> f64 {
        self.tasks.iter().filter_map(|t| t.result).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_completeness() {
        for &(start, end, count) in &[(0.0, 1.0, 4), (0.0, 1.0, 100), (-2.5, 7.0, 13)] {
            let table = TaskTable::partition(start, end, count);
            assert_eq!(table.len(), count);

            // Contiguous, non-overlapping, union equals [start, end)
            let mut edge = start;
            for task in table.iter() {
                assert_eq!(task.left, edge, "gap or overlap before task {}", task.id);
                assert!(task.left < task.right);
                edge = task.right;
            }
            assert_eq!(edge, end);
        }
    }

    #[test]
    fn test_partition_is_deterministic() {
        let a = TaskTable::partition(0.0, 3.0, 7);
        let b = TaskTable::partition(0.0, 3.0, 7);
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.left, y.left);
            assert_eq!(x.right, y.right);
        }
    }

    #[test]
    fn test_next_assignable_prefers_lowest_pending() {
        let mut table = TaskTable::partition(0.0, 1.0, 4);
        assert_eq!(table.next_assignable(), Some(0));

        table.mark_in_flight(0);
        assert_eq!(table.next_assignable(), Some(1));

        table.record_result(1, 0.1);
        assert_eq!(table.next_assignable(), Some(2));
    }

    #[test]
    fn test_next_assignable_falls_back_to_in_flight() {
        let mut table = TaskTable::partition(0.0, 1.0, 3);
        table.mark_in_flight(0);
        table.record_result(1, 0.1);
        table.record_result(2, 0.2);

        // No Pending task left; the orphaned in-flight task is re-offered
        assert_eq!(table.next_assignable(), Some(0));

        table.record_result(0, 0.0);
        assert_eq!(table.next_assignable(), None);
    }

    #[test]
    fn test_at_most_one_credit() {
        let mut table = TaskTable::partition(0.0, 1.0, 2);
        assert!(table.record_result(0, 0.25));
        assert_eq!(table.remaining(), 1);

        // Duplicate delivery from a second worker: ignored
        assert!(!table.record_result(0, 0.99));
        assert_eq!(table.remaining(), 1);
        assert_eq!(table.get(0).unwrap().result, Some(0.25));
    }

    #[test]
    fn test_aggregate_order_independent_of_completion_order() {
        let values = [0.03125, 0.09375, 0.15625, 0.21875];

        let mut forward = TaskTable::partition(0.0, 1.0, 4);
        for (id, &v) in values.iter().enumerate() {
            forward.record_result(id, v);
        }

        let mut reverse = TaskTable::partition(0.0, 1.0, 4);
        for (id, &v) in values.iter().enumerate().rev() {
            reverse.record_result(id, v);
        }

        assert_eq!(forward.aggregate(), reverse.aggregate());
        assert!((forward.aggregate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_mark_in_flight_never_demotes_done() {
        let mut table = TaskTable::partition(0.0, 1.0, 1);
        table.record_result(0, 0.5);
        table.mark_in_flight(0);
        assert_eq!(table.get(0).unwrap().state, TaskState::Done);
        assert_eq!(table.remaining(), 0);
    }
}
