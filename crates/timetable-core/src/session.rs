use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use types::Timetable;

/// Cooperative cancellation flag, checked by the engine at move boundaries.
/// Cancelling is not an error: the engine exits with its best solution.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Single-slot mailbox the engine publishes best-solution snapshots into.
/// Each publish atomically replaces the previous snapshot; the job manager
/// owns the reading side. This replaces a caller-supplied mutation callback.
#[derive(Debug, Default)]
pub struct SolutionMailbox {
    slot: Mutex<Option<Timetable>>,
}

impl SolutionMailbox {
    pub fn publish(&self, solution: Timetable) {
        *self.slot.lock() = Some(solution);
    }

    pub fn peek(&self) -> Option<Timetable> {
        self.slot.lock().clone()
    }

    pub fn take(&self) -> Option<Timetable> {
        self.slot.lock().take()
    }
}

/// Everything a solve session shares between the job manager and its single
/// engine worker. The facts and working state stay owned by the worker.
#[derive(Clone)]
pub struct SolveSession {
    pub cancel: CancelToken,
    pub mailbox: Arc<SolutionMailbox>,
}

impl SolveSession {
    pub fn new() -> Self {
        Self {
            cancel: CancelToken::new(),
            mailbox: Arc::new(SolutionMailbox::default()),
        }
    }
}

impl Default for SolveSession {
    fn default() -> Self {
        Self::new()
    }
}
