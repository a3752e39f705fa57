// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Result handles returned by every send.
//!
//! An [`AsyncResult`] is either already resolved (a value or an error known at
//! send time) or pending on an invocation queued in some actor's mailbox.
//! Waiting on a pending handle first tries to run the awaited invocation on the
//! calling thread; only when another thread owns it does the caller block.

mod cell;
mod wait;

use std::{fmt, sync::Arc, time::Duration};

pub(crate) use cell::{Completion, ResultCell};
pub use cell::NotifierId;
pub use wait::{Awaitable, await_all, await_all_until_error, await_any};

use crate::{
	current,
	error::{ActorError, Result},
	invocation::Invocation,
	system::Controller,
};

/// Future-like handle to the outcome of a message.
pub struct AsyncResult<T> {
	inner: Inner<T>,
}

enum Inner<T> {
	Ready(Arc<Result<T>>),
	Pending(Pending<T>),
}

struct Pending<T> {
	cell: Arc<ResultCell<T>>,
	invocation: Arc<Invocation>,
	controller: Arc<Controller>,
}

impl<T> AsyncResult<T> {
	/// A handle already resolved to `value`.
	pub fn ready(value: T) -> Self {
		Self {
			inner: Inner::Ready(Arc::new(Ok(value))),
		}
	}

	/// A handle already resolved to `error`.
	pub fn failed<E>(error: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		Self {
			inner: Inner::Ready(Arc::new(Err(ActorError::wrap(error)))),
		}
	}

	pub fn from_result<E>(result: std::result::Result<T, E>) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		match result {
			Ok(value) => Self::ready(value),
			Err(error) => Self::failed(error),
		}
	}

	pub(crate) fn pending(cell: Arc<ResultCell<T>>, invocation: Arc<Invocation>, controller: Arc<Controller>) -> Self {
		Self {
			inner: Inner::Pending(Pending {
				cell,
				invocation,
				controller,
			}),
		}
	}

	/// Non-blocking poll.
	pub fn is_ready(&self) -> bool {
		match &self.inner {
			Inner::Ready(_) => true,
			Inner::Pending(pending) => pending.cell.is_resolved(),
		}
	}

	/// Blocks until the result is ready.
	///
	/// If the awaited message has not started yet the calling thread runs it
	/// (and any messages an exclusive actor must process first) itself. Fails
	/// only with [`ActorError::Deadlock`] when the wait could never finish.
	pub fn wait(&self) -> Result<()> {
		match &self.inner {
			Inner::Ready(_) => Ok(()),
			Inner::Pending(pending) => pending.controller.await_invocation(&pending.invocation),
		}
	}

	/// Plain timed wait. Never runs the awaited message on this thread.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		match &self.inner {
			Inner::Ready(_) => true,
			Inner::Pending(pending) => pending.cell.wait_timeout(timeout),
		}
	}

	/// The error, if the result is ready and failed.
	pub fn error(&self) -> Option<ActorError> {
		let outcome = self.outcome()?;
		match &*outcome {
			Ok(_) => None,
			Err(error) => Some(error.clone()),
		}
	}

	/// Registers `notifier`, or runs it right away if the result is ready.
	///
	/// The notifier runs exactly once, on this thread if the result is ready
	/// and otherwise on the thread that resolves it.
	pub fn add_notifier<F>(&self, notifier: F) -> NotifierId
	where
		F: FnOnce(&Result<T>) + Send + 'static,
	{
		match &self.inner {
			Inner::Ready(outcome) => {
				notifier(outcome);
				NotifierId(0)
			}
			Inner::Pending(pending) => pending.cell.add_notifier(Box::new(notifier)),
		}
	}

	/// Best effort: a notifier that is already running still completes.
	pub fn remove_notifier(&self, id: NotifierId) -> bool {
		match &self.inner {
			Inner::Ready(_) => false,
			Inner::Pending(pending) => pending.cell.remove_notifier(id),
		}
	}

	/// Runs the awaited message on this thread if nobody has claimed it.
	fn help(&self) -> Result<()> {
		match &self.inner {
			Inner::Ready(_) => Ok(()),
			Inner::Pending(pending) => pending.controller.help_invocation(&pending.invocation),
		}
	}

	/// Runs `wait` with this thread reported as blocked to the handle's pool.
	fn block_while(&self, wait: &mut dyn FnMut()) {
		match &self.inner {
			Inner::Ready(_) => wait(),
			Inner::Pending(pending) => pending.controller.block_while(wait),
		}
	}

	fn outcome(&self) -> Option<Arc<Result<T>>> {
		match &self.inner {
			Inner::Ready(outcome) => Some(outcome.clone()),
			Inner::Pending(pending) => pending.cell.outcome(),
		}
	}
}

impl<T: Clone> AsyncResult<T> {
	/// Waits for the result and returns a copy of the value, or the error.
	pub fn get(&self) -> Result<T> {
		self.wait()?;
		match self.outcome() {
			Some(outcome) => (*outcome).clone(),
			None => Err(ActorError::Contract {
				message: "result not resolved after wait".to_string(),
			}),
		}
	}
}

impl<T: Clone + Send + Sync + 'static> AsyncResult<T> {
	/// Resolves `target` with this handle's outcome, passed through `check`.
	/// A pending handle resolves `target` when it resolves itself.
	pub(crate) fn forward_to<F>(self, target: &Arc<ResultCell<T>>, check: F)
	where
		F: FnOnce(Result<T>) -> Result<T> + Send + 'static,
	{
		match self.inner {
			Inner::Ready(outcome) => {
				let outcome = Arc::try_unwrap(outcome).unwrap_or_else(|shared| (*shared).clone());
				target.resolve(check(outcome));
			}
			Inner::Pending(pending) => {
				// waiters on the running invocation help the one it hands back
				if let Some(running) = current::invocation() {
					running.forward(pending.invocation.clone());
				}
				let target = target.clone();
				pending.cell.add_notifier(Box::new(move |outcome: &Result<T>| {
					target.resolve(check(outcome.clone()));
				}));
			}
		}
	}
}

impl AsyncResult<()> {
	/// The result of a message that produces nothing.
	pub fn empty() -> Self {
		Self::ready(())
	}
}

impl<T> Clone for AsyncResult<T> {
	fn clone(&self) -> Self {
		let inner = match &self.inner {
			Inner::Ready(outcome) => Inner::Ready(outcome.clone()),
			Inner::Pending(pending) => Inner::Pending(Pending {
				cell: pending.cell.clone(),
				invocation: pending.invocation.clone(),
				controller: pending.controller.clone(),
			}),
		};
		Self {
			inner,
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for AsyncResult<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.inner {
			Inner::Ready(outcome) => f.debug_tuple("AsyncResult::Ready").field(outcome).finish(),
			Inner::Pending(pending) => match pending.cell.outcome() {
				Some(outcome) => f.debug_tuple("AsyncResult::Ready").field(&outcome).finish(),
				None => f
					.debug_struct("AsyncResult::Pending")
					.field("invocation", &pending.invocation.sequence())
					.finish(),
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use std::{
		io,
		sync::atomic::{AtomicUsize, Ordering},
	};

	use super::*;

	#[test]
	fn test_ready_value() {
		let result = AsyncResult::ready(5);
		assert!(result.is_ready());
		assert_eq!(result.get().unwrap(), 5);
		assert_eq!(result.get().unwrap(), 5);
		assert!(result.error().is_none());
		assert!(result.wait().is_ok());
		assert!(result.wait_timeout(Duration::ZERO));
	}

	#[test]
	fn test_failed_reraises() {
		let result: AsyncResult<u32> = AsyncResult::failed(io::Error::new(io::ErrorKind::NotFound, "gone"));
		assert!(result.is_ready());

		let err = result.get().unwrap_err();
		assert!(matches!(err, ActorError::Message { ref message, .. } if message == "gone"));
		assert!(matches!(result.error(), Some(ActorError::Message { .. })));
	}

	#[test]
	fn test_from_result_keeps_actor_errors() {
		let result: AsyncResult<u32> = AsyncResult::from_result(Err(ActorError::ShutDown));
		assert!(matches!(result.error(), Some(ActorError::ShutDown)));

		let result = AsyncResult::from_result::<ActorError>(Ok(1));
		assert_eq!(result.get().unwrap(), 1);
	}

	#[test]
	fn test_immediate_notifier_runs_inline() {
		let calls = Arc::new(AtomicUsize::new(0));
		let result = AsyncResult::empty();

		let counter = calls.clone();
		let id = result.add_notifier(move |outcome| {
			assert!(outcome.is_ok());
			counter.fetch_add(1, Ordering::SeqCst);
		});

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(!result.remove_notifier(id));
	}

	#[test]
	fn test_forward_ready_applies_check() {
		let target = Arc::new(ResultCell::new());
		AsyncResult::ready(2).forward_to(&target, |outcome| outcome.map(|v| v * 10));
		assert!(matches!(*target.wait(), Ok(20)));
	}

	#[test]
	fn test_forward_failure() {
		let target: Arc<ResultCell<u8>> = Arc::new(ResultCell::new());
		AsyncResult::failed(ActorError::msg("broken")).forward_to(&target, |outcome| outcome);
		assert!(matches!(*target.wait(), Err(ActorError::Message { .. })));
	}
}
