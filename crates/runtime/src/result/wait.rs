// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Waiting on several result handles at once.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::{AsyncResult, NotifierId};
use crate::error::{ActorError, Result};

/// Object-safe view of a result handle, so handles of different value types
/// can be awaited together.
pub trait Awaitable {
	fn wait(&self) -> Result<()>;

	fn is_ready(&self) -> bool;

	fn error(&self) -> Option<ActorError>;

	#[doc(hidden)]
	fn on_ready(&self, signal: Box<dyn FnOnce() + Send>) -> NotifierId;

	#[doc(hidden)]
	fn cancel(&self, id: NotifierId);

	/// Runs the awaited message on the calling thread if nobody has claimed it
	/// yet. Fails if waiting could never finish.
	#[doc(hidden)]
	fn help(&self) -> Result<()> {
		Ok(())
	}

	/// Runs `wait` with the calling thread reported as blocked.
	#[doc(hidden)]
	fn block_while(&self, wait: &mut dyn FnMut()) {
		wait()
	}
}

impl<T: 'static> Awaitable for AsyncResult<T> {
	fn wait(&self) -> Result<()> {
		AsyncResult::wait(self)
	}

	fn is_ready(&self) -> bool {
		AsyncResult::is_ready(self)
	}

	fn error(&self) -> Option<ActorError> {
		AsyncResult::error(self)
	}

	fn on_ready(&self, signal: Box<dyn FnOnce() + Send>) -> NotifierId {
		self.add_notifier(move |_| signal())
	}

	fn cancel(&self, id: NotifierId) {
		self.remove_notifier(id);
	}

	fn help(&self) -> Result<()> {
		AsyncResult::help(self)
	}

	fn block_while(&self, wait: &mut dyn FnMut()) {
		AsyncResult::block_while(self, wait)
	}
}

/// Waits for every handle. Individual failures are left on the handles.
pub fn await_all(handles: &[&dyn Awaitable]) -> Result<()> {
	for handle in handles {
		handle.wait()?;
	}
	Ok(())
}

/// Waits until at least one handle is ready and returns the lowest index of
/// a ready handle.
pub fn await_any(handles: &[&dyn Awaitable]) -> Result<usize> {
	if handles.is_empty() {
		return Err(ActorError::Contract {
			message: "await_any called without handles".to_string(),
		});
	}
	block_until(handles, GiveUp::WhenAllStuck, |handles| handles.iter().position(|handle| handle.is_ready()))
}

/// Waits until every handle is ready, or returns the first error observed.
///
/// A handle that could never become ready counts as an error.
pub fn await_all_until_error(handles: &[&dyn Awaitable]) -> Result<()> {
	block_until(handles, GiveUp::WhenAnyStuck, |handles| {
		let mut all_ready = true;
		for handle in handles {
			if !handle.is_ready() {
				all_ready = false;
			} else if let Some(error) = handle.error() {
				return Some(Err(error));
			}
		}
		all_ready.then_some(Ok(()))
	})?
}

#[derive(Default)]
struct Signal {
	fired: Mutex<u64>,
	changed: Condvar,
}

impl Signal {
	fn notify(&self) {
		*self.fired.lock() += 1;
		self.changed.notify_all();
	}
}

/// When a handle whose wait could never finish ends a bulk wait.
#[derive(Clone, Copy, PartialEq, Eq)]
enum GiveUp {
	WhenAnyStuck,
	WhenAllStuck,
}

/// Helps every handle, then blocks until `check` is satisfied. The thread is
/// reported as blocked to the pool of the first handle still pending.
fn block_until<R, F>(handles: &[&dyn Awaitable], give_up: GiveUp, mut check: F) -> Result<R>
where
	F: FnMut(&[&dyn Awaitable]) -> Option<R>,
{
	if let Some(done) = check(handles) {
		return Ok(done);
	}

	let mut stuck = 0;
	let mut first_stuck = None;
	for handle in handles {
		if let Err(error) = handle.help() {
			stuck += 1;
			first_stuck.get_or_insert(error);
		}
	}
	if let Some(done) = check(handles) {
		return Ok(done);
	}
	if let Some(error) = first_stuck {
		let pending = handles.iter().filter(|handle| !handle.is_ready()).count();
		if give_up == GiveUp::WhenAnyStuck || stuck >= pending {
			return Err(error);
		}
	}

	let signal = Arc::new(Signal::default());
	let registered: Vec<NotifierId> = handles
		.iter()
		.map(|handle| {
			let signal = signal.clone();
			handle.on_ready(Box::new(move || signal.notify()))
		})
		.collect();

	let mut done = None;
	let mut wait = || {
		let mut fired = signal.fired.lock();
		loop {
			if let Some(ready) = check(handles) {
				done = Some(ready);
				break;
			}
			signal.changed.wait(&mut fired);
		}
	};
	match handles.iter().find(|handle| !handle.is_ready()) {
		Some(handle) => handle.block_while(&mut wait),
		None => wait(),
	}

	for (handle, id) in handles.iter().zip(registered) {
		handle.cancel(id);
	}
	done.ok_or_else(|| ActorError::Contract {
		message: "bulk wait returned before its condition held".to_string(),
	})
}

#[cfg(test)]
mod tests {
	use std::{thread, time::Duration};

	use super::*;
	use crate::result::ResultCell;

	#[test]
	fn test_await_all_ready_handles() {
		let a = AsyncResult::ready(1u8);
		let b = AsyncResult::ready("two");
		let c: AsyncResult<()> = AsyncResult::failed(ActorError::msg("three"));
		assert!(await_all(&[&a, &b, &c]).is_ok());
	}

	#[test]
	fn test_await_any_picks_lowest_ready_index() {
		let a = AsyncResult::ready(1);
		let b = AsyncResult::ready(2);
		assert_eq!(await_any(&[&a, &b]).unwrap(), 0);
		assert!(matches!(await_any(&[]), Err(ActorError::Contract { .. })));
	}

	#[test]
	fn test_await_all_until_error_stops_on_failure() {
		let ok = AsyncResult::ready(1);
		let bad: AsyncResult<u32> = AsyncResult::failed(ActorError::msg("bad"));
		let err = await_all_until_error(&[&ok, &bad]).unwrap_err();
		assert!(matches!(err, ActorError::Message { ref message, .. } if message == "bad"));

		assert!(await_all_until_error(&[&ok]).is_ok());
	}

	struct CellHandle(Arc<ResultCell<u32>>);

	impl Awaitable for CellHandle {
		fn wait(&self) -> Result<()> {
			self.0.wait();
			Ok(())
		}

		fn is_ready(&self) -> bool {
			self.0.is_resolved()
		}

		fn error(&self) -> Option<ActorError> {
			self.0.outcome().and_then(|outcome| (*outcome).clone().err())
		}

		fn on_ready(&self, signal: Box<dyn FnOnce() + Send>) -> NotifierId {
			self.0.add_notifier(Box::new(move |_| signal()))
		}

		fn cancel(&self, id: NotifierId) {
			self.0.remove_notifier(id);
		}
	}

	#[test]
	fn test_await_any_wakes_on_late_resolution() {
		let slow = CellHandle(Arc::new(ResultCell::new()));
		let fast = CellHandle(Arc::new(ResultCell::new()));

		let resolver = {
			let cell = fast.0.clone();
			thread::spawn(move || {
				thread::sleep(Duration::from_millis(20));
				cell.resolve(Ok(9));
			})
		};

		assert_eq!(await_any(&[&slow, &fast]).unwrap(), 1);
		resolver.join().unwrap();
		assert!(!slow.is_ready());
	}

	#[test]
	fn test_await_all_until_error_wakes_on_late_failure() {
		let never = CellHandle(Arc::new(ResultCell::new()));
		let failing = CellHandle(Arc::new(ResultCell::new()));

		let resolver = {
			let cell = failing.0.clone();
			thread::spawn(move || {
				thread::sleep(Duration::from_millis(20));
				cell.resolve(Err(ActorError::msg("late")));
			})
		};

		assert!(await_all_until_error(&[&never, &failing]).is_err());
		resolver.join().unwrap();
	}

	/// Never ready, and says so when asked for help.
	struct Stuck;

	impl Awaitable for Stuck {
		fn wait(&self) -> Result<()> {
			self.help()
		}

		fn is_ready(&self) -> bool {
			false
		}

		fn error(&self) -> Option<ActorError> {
			None
		}

		fn on_ready(&self, _signal: Box<dyn FnOnce() + Send>) -> NotifierId {
			NotifierId(0)
		}

		fn cancel(&self, _id: NotifierId) {}

		fn help(&self) -> Result<()> {
			Err(ActorError::Deadlock {
				message: "stuck".to_string(),
			})
		}
	}

	#[test]
	fn test_stuck_handle_ends_bulk_waits() {
		let late = CellHandle(Arc::new(ResultCell::new()));
		let err = await_all_until_error(&[&late, &Stuck]).unwrap_err();
		assert!(matches!(err, ActorError::Deadlock { .. }));
		assert!(matches!(await_any(&[&Stuck, &Stuck]), Err(ActorError::Deadlock { .. })));
	}

	#[test]
	fn test_await_any_outlives_a_stuck_handle() {
		let late = CellHandle(Arc::new(ResultCell::new()));

		let resolver = {
			let cell = late.0.clone();
			thread::spawn(move || {
				thread::sleep(Duration::from_millis(20));
				cell.resolve(Ok(1));
			})
		};

		assert_eq!(await_any(&[&Stuck, &late]).unwrap(), 1);
		resolver.join().unwrap();
	}
}
