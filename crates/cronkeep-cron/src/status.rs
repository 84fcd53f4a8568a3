//! Coarse lifecycle flag shared by the registry and its entries.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Activated and waiting.
    Ready,
    /// Active; for an entry, its job is executing right now.
    Running,
    Stopped,
    /// Terminal.
    Closed,
}

impl Status {
    fn as_u8(self) -> u8 {
        match self {
            Status::Ready => 0,
            Status::Running => 1,
            Status::Stopped => 2,
            Status::Closed => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => Status::Ready,
            1 => Status::Running,
            2 => Status::Stopped,
            _ => Status::Closed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ready => "ready",
            Status::Running => "running",
            Status::Stopped => "stopped",
            Status::Closed => "closed",
        };
        f.pad(s)
    }
}

/// Lock-free status cell.
///
/// Any state may move to any other, except that `Closed` is never left.
#[derive(Debug)]
pub struct LifecycleState {
    state: AtomicU8,
}

impl LifecycleState {
    pub fn new(initial: Status) -> Self {
        Self {
            state: AtomicU8::new(initial.as_u8()),
        }
    }

    pub fn get(&self) -> Status {
        Status::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next`. Returns the previous status, or `None` if already closed.
    pub fn set(&self, next: Status) -> Option<Status> {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                (cur != Status::Closed.as_u8()).then_some(next.as_u8())
            })
            .ok()
            .map(Status::from_u8)
    }

    /// Move from `from` to `to` only if the current status is `from`.
    pub fn transition(&self, from: Status, to: Status) -> bool {
        if from == Status::Closed {
            return false;
        }
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.get() == Status::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_transitions() {
        let state = LifecycleState::new(Status::Running);
        assert_eq!(state.set(Status::Stopped), Some(Status::Running));
        assert_eq!(state.set(Status::Ready), Some(Status::Stopped));
        assert_eq!(state.set(Status::Running), Some(Status::Ready));
        assert_eq!(state.get(), Status::Running);
    }

    #[test]
    fn test_closed_is_terminal() {
        let state = LifecycleState::new(Status::Ready);
        assert_eq!(state.set(Status::Closed), Some(Status::Ready));
        assert_eq!(state.set(Status::Ready), None);
        assert!(!state.transition(Status::Closed, Status::Ready));
        assert!(state.is_closed());
    }

    #[test]
    fn test_transition_requires_expected_state() {
        let state = LifecycleState::new(Status::Ready);
        assert!(!state.transition(Status::Running, Status::Ready));
        assert!(state.transition(Status::Ready, Status::Running));
        assert_eq!(state.get(), Status::Running);
    }
}
