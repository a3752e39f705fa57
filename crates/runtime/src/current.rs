// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-thread runtime state.
//!
//! Every thread that runs a message keeps a stack of the invocations it is
//! executing, innermost last. Nesting happens when a message body waits on a
//! result and the waiting thread runs the awaited message itself. Worker
//! threads additionally carry a [`WorkerStatus`] that their controller counts
//! to size the pool; those transitions are made under the controller's lock.

use std::{cell::RefCell, sync::Arc};

use crate::invocation::Invocation;

/// What a worker thread is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerStatus {
	/// Running a CPU-bound message body, or looking for work.
	Running,
	/// Parked or about to park, waiting for demand.
	Idle,
	/// Running a message body declared as blocking IO.
	RunningIo,
	/// Blocked on a result that another thread in the pool will produce.
	WaitingInternal,
	/// Blocked on a result that depends on an event outside the pool.
	WaitingExternal,
}

impl WorkerStatus {
	pub(crate) const COUNT: usize = 5;

	#[inline]
	pub(crate) fn index(self) -> usize {
		self as usize
	}

	/// Statuses in which the thread does not consume CPU for the pool.
	#[inline]
	pub(crate) fn is_blocking(self) -> bool {
		matches!(self, WorkerStatus::RunningIo | WorkerStatus::WaitingInternal | WorkerStatus::WaitingExternal)
	}
}

struct ThreadState {
	stack: Vec<Arc<Invocation>>,
	status: WorkerStatus,
	worker_of: Option<usize>,
}

thread_local! {
	static STATE: RefCell<ThreadState> = const {
		RefCell::new(ThreadState {
			stack: Vec::new(),
			status: WorkerStatus::Running,
			worker_of: None,
		})
	};
}

/// Number of invocations executing on this thread, nested ones included.
pub fn depth() -> usize {
	STATE.with(|state| state.borrow().stack.len())
}

/// Status of this thread if it is a pool worker.
pub fn status() -> Option<WorkerStatus> {
	STATE.with(|state| {
		let state = state.borrow();
		state.worker_of.map(|_| state.status)
	})
}

/// Name of the message executing on this thread.
pub fn message() -> Option<&'static str> {
	STATE.with(|state| state.borrow().stack.last().map(|invocation| invocation.name()))
}

pub(crate) fn invocation() -> Option<Arc<Invocation>> {
	STATE.with(|state| state.borrow().stack.last().cloned())
}

#[inline]
pub(crate) fn is_executing() -> bool {
	STATE.with(|state| !state.borrow().stack.is_empty())
}

pub(crate) fn push(invocation: Arc<Invocation>) {
	STATE.with(|state| state.borrow_mut().stack.push(invocation));
}

pub(crate) fn pop() -> Option<Arc<Invocation>> {
	STATE.with(|state| state.borrow_mut().stack.pop())
}

/// Whether an invocation of `controller` with sequence number `sequence` is
/// executing somewhere on this thread's stack.
pub(crate) fn holds(controller: usize, sequence: u64) -> bool {
	STATE.with(|state| {
		state.borrow()
			.stack
			.iter()
			.any(|invocation| invocation.controller() == controller && invocation.sequence() == sequence)
	})
}

pub(crate) fn register_worker(controller: usize) {
	STATE.with(|state| {
		let mut state = state.borrow_mut();
		state.worker_of = Some(controller);
		state.status = WorkerStatus::Idle;
	});
}

pub(crate) fn worker_of() -> Option<usize> {
	STATE.with(|state| state.borrow().worker_of)
}

/// Sets the worker status and returns the previous one.
pub(crate) fn replace_status(status: WorkerStatus) -> WorkerStatus {
	STATE.with(|state| std::mem::replace(&mut state.borrow_mut().status, status))
}

#[cfg(test)]
mod tests {
	use std::thread;

	use super::*;

	#[test]
	fn test_fresh_thread_is_not_a_worker() {
		thread::spawn(|| {
			assert_eq!(depth(), 0);
			assert_eq!(status(), None);
			assert!(message().is_none());
			assert!(!is_executing());
			assert!(worker_of().is_none());
		})
		.join()
		.unwrap();
	}

	#[test]
	fn test_worker_registration_and_status() {
		thread::spawn(|| {
			register_worker(42);
			assert_eq!(worker_of(), Some(42));
			assert_eq!(status(), Some(WorkerStatus::Idle));

			assert_eq!(replace_status(WorkerStatus::RunningIo), WorkerStatus::Idle);
			assert_eq!(status(), Some(WorkerStatus::RunningIo));
		})
		.join()
		.unwrap();
	}

	#[test]
	fn test_blocking_statuses() {
		assert!(!WorkerStatus::Running.is_blocking());
		assert!(!WorkerStatus::Idle.is_blocking());
		assert!(WorkerStatus::RunningIo.is_blocking());
		assert!(WorkerStatus::WaitingInternal.is_blocking());
		assert!(WorkerStatus::WaitingExternal.is_blocking());
	}
}
