// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Operation dispatcher.
//!
//! The [`Dispatcher`] turns every submitted [`Operation`] into its own OS
//! thread, then joins all of them at a barrier.
//!
//! # Task Lifecycle
//!
//! ```text
//! Created ──spawn──► Running ──report──► Completed ──join──► Joined
//! ```
//!
//! - **Created**: recorded by [`Dispatcher::submit`] before the thread starts.
//! - **Running**: the thread is applying the operation to the ledger.
//! - **Completed**: the result has been handed to the sink.
//! - **Joined**: the thread has been joined, either by [`Dispatcher::shutdown`]
//!   or by a later [`Dispatcher::submit`] that found it already exited.
//!
//! Tasks run in no particular order relative to each other. None is ever
//! cancelled and there is no timeout.

use crate::base::TaskId;
use crate::ledger::Ledger;
use crate::operation::{Operation, Report};
use crate::sink::ReportSink;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

/// Lifecycle state of a dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Running,
    Completed,
    Joined,
}

/// Counts collected by one [`Dispatcher::shutdown`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// Tasks joined since the previous barrier, including those that panicked.
    pub joined: usize,
    /// Tasks whose thread panicked before completing.
    pub panicked: usize,
}

impl ShutdownSummary {
    fn record(&mut self, task: TaskId, panicked: bool) {
        if panicked {
            log::error!("task {task} panicked before completing");
            self.panicked += 1;
        }
        self.joined += 1;
    }
}

/// Unjoined handles plus the tally of tasks already joined by `submit`.
#[derive(Default)]
struct Pending {
    handles: Vec<(TaskId, JoinHandle<()>)>,
    reaped: ShutdownSummary,
}

/// Fire-and-join executor for ledger operations.
///
/// The dispatcher never touches account state itself; tasks reach accounts
/// only through the [`Ledger`].
///
/// # Example
///
/// ```
/// use concurrent_ledger::{AccountId, ChannelSink, Dispatcher, Ledger, Operation};
/// use rust_decimal_macros::dec;
/// use std::sync::Arc;
///
/// let ledger = Arc::new(Ledger::new());
/// ledger.create_account(AccountId(1), dec!(0.0));
///
/// let (sink, reports) = ChannelSink::unbounded();
/// let dispatcher = Dispatcher::new(Arc::clone(&ledger), Arc::new(sink));
/// for _ in 0..10 {
///     dispatcher.submit(Operation::Deposit { account_id: AccountId(1), amount: dec!(1.0) });
/// }
/// let summary = dispatcher.shutdown();
///
/// assert_eq!(summary.joined, 10);
/// assert_eq!(reports.try_iter().count(), 10);
/// assert_eq!(ledger.get_account(AccountId(1)).unwrap().balance(), dec!(10.0));
/// ```
pub struct Dispatcher {
    ledger: Arc<Ledger>,
    sink: Arc<dyn ReportSink>,
    pending: Mutex<Pending>,
    /// State of tasks not yet joined. Joined tasks are removed.
    tasks: Arc<DashMap<TaskId, TaskState>>,
    next_task: AtomicU64,
}

impl Dispatcher {
    pub fn new(ledger: Arc<Ledger>, sink: Arc<dyn ReportSink>) -> Self {
        Self {
            ledger,
            sink,
            pending: Mutex::new(Pending::default()),
            tasks: Arc::new(DashMap::new()),
            next_task: AtomicU64::new(1),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Launches `operation` on a new thread and returns immediately.
    ///
    /// The result is delivered to the sink from the worker thread. Threads
    /// that already finished are joined first, so a long session without a
    /// barrier does not pile up exited threads. If the OS refuses a new
    /// thread the operation runs on the caller's thread instead.
    pub fn submit(&self, operation: Operation) -> TaskId {
        self.reap_finished();

        let task = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
        self.tasks.insert(task, TaskState::Created);

        let ledger = Arc::clone(&self.ledger);
        let sink = Arc::clone(&self.sink);
        let tasks = Arc::clone(&self.tasks);

        let spawned = thread::Builder::new()
            .name(format!("ledger-task-{}", task.0))
            .spawn(move || run_task(&ledger, sink.as_ref(), &tasks, task, operation));

        match spawned {
            Ok(handle) => {
                log::debug!("task {task} submitted: {operation:?}");
                self.pending.lock().handles.push((task, handle));
            }
            Err(e) => {
                log::error!("failed to spawn thread for task {task}: {e}; running inline");
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_task(&self.ledger, self.sink.as_ref(), &self.tasks, task, operation)
                }));
                self.tasks.remove(&task);
                self.pending.lock().reaped.record(task, outcome.is_err());
            }
        }
        task
    }

    /// Blocks until every task submitted so far has been joined.
    ///
    /// Tasks submitted while the barrier is draining are joined too. The
    /// dispatcher stays usable afterwards, so this also serves as a
    /// mid-session barrier.
    pub fn shutdown(&self) -> ShutdownSummary {
        let mut summary = ShutdownSummary::default();

        loop {
            // Release the lock before joining so submits never wait on a running task.
            let handles = {
                let mut pending = self.pending.lock();
                if pending.handles.is_empty() {
                    let reaped = mem::take(&mut pending.reaped);
                    summary.joined += reaped.joined;
                    summary.panicked += reaped.panicked;
                    break;
                }
                mem::take(&mut pending.handles)
            };

            for (task, handle) in handles {
                summary.record(task, handle.join().is_err());
                self.tasks.remove(&task);
            }
        }

        if summary.joined > 0 {
            log::info!(
                "barrier joined {} task(s), {} panicked",
                summary.joined,
                summary.panicked
            );
        }
        summary
    }

    /// Number of tasks whose threads have not been joined yet.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().handles.len()
    }

    /// Returns the lifecycle state of `task`, or `None` if it was never submitted here.
    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        if let Some(state) = self.tasks.get(&task) {
            return Some(*state);
        }
        let submitted = task.0 >= 1 && task.0 < self.next_task.load(Ordering::Relaxed);
        submitted.then_some(TaskState::Joined)
    }

    /// Joins threads that have already exited.
    ///
    /// Runs under the pending lock; joining an exited thread does not block,
    /// and a concurrent barrier never returns while a reap is half done.
    fn reap_finished(&self) {
        let mut pending = self.pending.lock();
        let (finished, running): (Vec<_>, Vec<_>) = mem::take(&mut pending.handles)
            .into_iter()
            .partition(|(_, handle)| handle.is_finished());
        pending.handles = running;

        for (task, handle) in finished {
            pending.reaped.record(task, handle.join().is_err());
            self.tasks.remove(&task);
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_task(
    ledger: &Ledger,
    sink: &dyn ReportSink,
    tasks: &DashMap<TaskId, TaskState>,
    task: TaskId,
    operation: Operation,
) {
    set_state(tasks, task, TaskState::Running);

    let result = operation.apply(ledger);
    match &result {
        Ok(outcome) => log::debug!("task {task} completed: {outcome}"),
        Err(e) => log::debug!("task {task} failed: {e}"),
    }

    sink.report(Report {
        task,
        thread: format!("{:?}", thread::current().id()),
        operation,
        result,
    });
    set_state(tasks, task, TaskState::Completed);
}

fn set_state(tasks: &DashMap<TaskId, TaskState>, task: TaskId, state: TaskState) {
    if let Some(mut entry) = tasks.get_mut(&task) {
        *entry = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::AccountId;
    use crate::operation::Outcome;
    use crate::sink::ChannelSink;
    use rust_decimal_macros::dec;

    struct PanickingSink;

    impl ReportSink for PanickingSink {
        fn report(&self, _report: Report) {
            panic!("sink failure");
        }
    }

    #[test]
    fn task_ids_are_sequential() {
        let (sink, _rx) = ChannelSink::unbounded();
        let dispatcher = Dispatcher::new(Arc::new(Ledger::new()), Arc::new(sink));

        let first = dispatcher.submit(Operation::CheckBalance {
            account_id: AccountId(1),
        });
        let second = dispatcher.submit(Operation::CheckBalance {
            account_id: AccountId(1),
        });

        assert_eq!(first, TaskId(1));
        assert_eq!(second, TaskId(2));
        dispatcher.shutdown();
    }

    #[test]
    fn every_task_is_joined_after_shutdown() {
        let (sink, rx) = ChannelSink::unbounded();
        let dispatcher = Dispatcher::new(Arc::new(Ledger::new()), Arc::new(sink));

        let tasks: Vec<TaskId> = (0..20)
            .map(|i| {
                dispatcher.submit(Operation::CreateAccount {
                    customer_id: AccountId(i),
                    initial_balance: dec!(1.0),
                })
            })
            .collect();

        let summary = dispatcher.shutdown();
        assert_eq!(summary.joined, 20);
        assert_eq!(summary.panicked, 0);
        assert_eq!(dispatcher.in_flight(), 0);
        for task in tasks {
            assert_eq!(dispatcher.task_state(task), Some(TaskState::Joined));
        }
        assert_eq!(rx.try_iter().count(), 20);
        assert_eq!(dispatcher.ledger().len(), 20);
    }

    #[test]
    fn shutdown_is_reusable_as_barrier() {
        let (sink, rx) = ChannelSink::unbounded();
        let dispatcher = Dispatcher::new(Arc::new(Ledger::new()), Arc::new(sink));

        dispatcher.submit(Operation::CreateAccount {
            customer_id: AccountId(1),
            initial_balance: dec!(10.0),
        });
        assert_eq!(dispatcher.shutdown().joined, 1);

        dispatcher.submit(Operation::CheckBalance {
            account_id: AccountId(1),
        });
        assert_eq!(dispatcher.shutdown().joined, 1);
        assert_eq!(dispatcher.shutdown(), ShutdownSummary::default());

        let results: Vec<_> = rx.try_iter().map(|r| r.result).collect();
        assert_eq!(
            results[1],
            Ok(Outcome::Balance {
                account_id: AccountId(1),
                balance: dec!(10.0),
            })
        );
    }

    #[test]
    fn panicking_task_is_counted_not_propagated() {
        let dispatcher = Dispatcher::new(Arc::new(Ledger::new()), Arc::new(PanickingSink));
        let task = dispatcher.submit(Operation::CreateAccount {
            customer_id: AccountId(1),
            initial_balance: dec!(1.0),
        });

        let summary = dispatcher.shutdown();
        assert_eq!(summary.joined, 1);
        assert_eq!(summary.panicked, 1);
        assert_eq!(dispatcher.task_state(task), Some(TaskState::Joined));
        // The operation itself ran before the sink panicked.
        assert_eq!(dispatcher.ledger().len(), 1);
    }

    #[test]
    fn unknown_task_has_no_state() {
        let (sink, _rx) = ChannelSink::unbounded();
        let dispatcher = Dispatcher::new(Arc::new(Ledger::new()), Arc::new(sink));
        assert_eq!(dispatcher.task_state(TaskId(42)), None);
    }

    #[test]
    fn exited_tasks_are_joined_by_later_submits() {
        let (sink, _rx) = ChannelSink::unbounded();
        let dispatcher = Dispatcher::new(Arc::new(Ledger::new()), Arc::new(sink));

        let first = dispatcher.submit(Operation::CheckBalance {
            account_id: AccountId(1),
        });
        let mut attempts = 0;
        while dispatcher.task_state(first) != Some(TaskState::Joined) {
            assert!(attempts < 10_000, "exited task was never joined by submit");
            thread::sleep(std::time::Duration::from_millis(1));
            dispatcher.submit(Operation::CheckBalance {
                account_id: AccountId(1),
            });
            attempts += 1;
        }

        assert!(dispatcher.in_flight() <= attempts);
        let summary = dispatcher.shutdown();
        assert_eq!(summary.joined, attempts + 1);
    }

    #[test]
    fn joined_tasks_leave_the_state_map() {
        let (sink, _rx) = ChannelSink::unbounded();
        let dispatcher = Dispatcher::new(Arc::new(Ledger::new()), Arc::new(sink));

        let tasks: Vec<TaskId> = (0..50)
            .map(|i| {
                dispatcher.submit(Operation::CreateAccount {
                    customer_id: AccountId(i),
                    initial_balance: dec!(1.0),
                })
            })
            .collect();
        dispatcher.shutdown();

        assert!(dispatcher.tasks.is_empty());
        for task in tasks {
            assert_eq!(dispatcher.task_state(task), Some(TaskState::Joined));
        }
    }
}
