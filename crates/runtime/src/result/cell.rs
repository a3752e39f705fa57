// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Shared state behind a pending [`AsyncResult`](super::AsyncResult).

use std::{
	mem,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::error::{ActorError, Result};

/// Identifies a notifier registered on a result handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotifierId(pub(crate) u64);

type Notifier<T> = Box<dyn FnOnce(&Result<T>) + Send>;

struct CellState<T> {
	outcome: Option<Arc<Result<T>>>,
	notifiers: Vec<(NotifierId, Notifier<T>)>,
	next_id: u64,
}

/// Single-assignment slot with blocking waiters and callbacks.
///
/// Notifiers always run with no lock held, on the thread that registers them
/// (when already resolved) or on the thread that resolves the cell.
pub(crate) struct ResultCell<T> {
	state: Mutex<CellState<T>>,
	ready: Condvar,
	resolved: AtomicBool,
}

impl<T> ResultCell<T> {
	pub(crate) fn new() -> Self {
		Self {
			state: Mutex::new(CellState {
				outcome: None,
				notifiers: Vec::new(),
				next_id: 1,
			}),
			ready: Condvar::new(),
			resolved: AtomicBool::new(false),
		}
	}

	#[inline]
	pub(crate) fn is_resolved(&self) -> bool {
		self.resolved.load(Ordering::Acquire)
	}

	/// Resolves the cell. Returns `false` if it was already resolved, in
	/// which case `result` is discarded.
	pub(crate) fn resolve(&self, result: Result<T>) -> bool {
		let (outcome, notifiers) = {
			let mut state = self.state.lock();
			if state.outcome.is_some() {
				return false;
			}
			let outcome = Arc::new(result);
			state.outcome = Some(outcome.clone());
			self.resolved.store(true, Ordering::Release);
			self.ready.notify_all();
			(outcome, mem::take(&mut state.notifiers))
		};

		for (_, notifier) in notifiers {
			notifier(&outcome);
		}
		true
	}

	pub(crate) fn outcome(&self) -> Option<Arc<Result<T>>> {
		self.state.lock().outcome.clone()
	}

	/// Blocks until resolved.
	pub(crate) fn wait(&self) -> Arc<Result<T>> {
		let mut state = self.state.lock();
		loop {
			if let Some(outcome) = &state.outcome {
				return outcome.clone();
			}
			self.ready.wait(&mut state);
		}
	}

	/// Blocks until resolved or until `timeout` elapses.
	pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut state = self.state.lock();
		while state.outcome.is_none() {
			if self.ready.wait_until(&mut state, deadline).timed_out() {
				return state.outcome.is_some();
			}
		}
		true
	}

	pub(crate) fn add_notifier(&self, notifier: Notifier<T>) -> NotifierId {
		let mut state = self.state.lock();
		let id = NotifierId(state.next_id);
		state.next_id += 1;

		match state.outcome.clone() {
			Some(outcome) => {
				drop(state);
				notifier(&outcome);
			}
			None => state.notifiers.push((id, notifier)),
		}
		id
	}

	pub(crate) fn remove_notifier(&self, id: NotifierId) -> bool {
		let removed = {
			let mut state = self.state.lock();
			state.notifiers.iter().position(|(registered, _)| *registered == id).map(|at| state.notifiers.remove(at))
		};
		// dropped outside the lock; the closure may own actor handles
		removed.is_some()
	}
}

/// Type-erased view of a result cell, held by the invocation that resolves it.
pub(crate) trait Completion: Send + Sync {
	fn fail(&self, error: ActorError);

	fn is_resolved(&self) -> bool;

	fn block(&self);
}

impl<T: Send + Sync + 'static> Completion for ResultCell<T> {
	fn fail(&self, error: ActorError) {
		self.resolve(Err(error));
	}

	fn is_resolved(&self) -> bool {
		ResultCell::is_resolved(self)
	}

	fn block(&self) {
		self.wait();
	}
}
