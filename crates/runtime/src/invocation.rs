// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! One message sent to one actor.

use std::{
	fmt,
	panic::{self, AssertUnwindSafe},
	sync::{
		Arc, OnceLock, Weak,
		atomic::{AtomicU8, Ordering},
	},
};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
	actor::{MessageSpec, ThreadUsage, state::ActorKey},
	current,
	error::ActorError,
	queue::QueueKey,
	result::Completion,
	system::SystemInner,
};

/// Type-erased message body. Resolves its own result cell.
pub(crate) type Task = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Lifecycle {
	NotStarted = 0,
	Executing = 1,
	Done = 2,
}

pub(crate) struct Invocation {
	sequence: u64,
	controller: usize,
	actor: ActorKey,
	spec: MessageSpec,
	initializer: bool,
	parent: Option<Weak<Invocation>>,
	depth: usize,
	system: Weak<SystemInner>,
	result: Arc<dyn Completion>,
	queued: OnceLock<QueueKey>,
	/// Invocation whose pending result this one's body returned.
	forwarded: OnceLock<Arc<Invocation>>,
	lifecycle: AtomicU8,
	task: Mutex<Option<Task>>,
	log_actions: bool,
}

/// Identity and routing of a new invocation.
pub(crate) struct Envelope {
	pub sequence: u64,
	pub controller: usize,
	pub actor: ActorKey,
	pub spec: MessageSpec,
	pub initializer: bool,
	pub log_actions: bool,
}

impl Invocation {
	/// The causal parent is whatever invocation the calling thread is running.
	pub(crate) fn new(
		envelope: Envelope,
		system: Weak<SystemInner>,
		result: Arc<dyn Completion>,
		task: Task,
	) -> Arc<Self> {
		let parent = current::invocation();
		let depth = parent.as_ref().map_or(0, |parent| parent.depth + 1);

		Arc::new(Self {
			sequence: envelope.sequence,
			controller: envelope.controller,
			actor: envelope.actor,
			spec: envelope.spec,
			initializer: envelope.initializer,
			parent: parent.as_ref().map(Arc::downgrade),
			depth,
			system,
			result,
			queued: OnceLock::new(),
			forwarded: OnceLock::new(),
			lifecycle: AtomicU8::new(Lifecycle::NotStarted as u8),
			task: Mutex::new(Some(task)),
			log_actions: envelope.log_actions,
		})
	}

	#[inline]
	pub(crate) fn sequence(&self) -> u64 {
		self.sequence
	}

	#[inline]
	pub(crate) fn controller(&self) -> usize {
		self.controller
	}

	#[inline]
	pub(crate) fn actor(&self) -> ActorKey {
		self.actor
	}

	#[inline]
	pub(crate) fn name(&self) -> &'static str {
		self.spec.name
	}

	#[inline]
	pub(crate) fn usage(&self) -> ThreadUsage {
		self.spec.usage
	}

	pub(crate) fn system(&self) -> &Weak<SystemInner> {
		&self.system
	}

	pub(crate) fn queue_key(&self) -> Option<QueueKey> {
		self.queued.get().copied()
	}

	/// Records the mailbox entry. Set once, under the scheduling lock.
	pub(crate) fn set_queue_key(&self, key: QueueKey) {
		let _ = self.queued.set(key);
	}

	/// Records that this invocation's result is the result of `next`. Only the
	/// first call counts: a body returns one handle.
	pub(crate) fn forward(&self, next: Arc<Invocation>) {
		let _ = self.forwarded.set(next);
	}

	pub(crate) fn forwarded(&self) -> Option<&Arc<Invocation>> {
		self.forwarded.get()
	}

	pub(crate) fn lifecycle(&self) -> Lifecycle {
		match self.lifecycle.load(Ordering::Acquire) {
			0 => Lifecycle::NotStarted,
			1 => Lifecycle::Executing,
			_ => Lifecycle::Done,
		}
	}

	pub(crate) fn begin(&self) {
		let started = self.transition(Lifecycle::NotStarted, Lifecycle::Executing);
		debug_assert!(started, "invocation #{} started twice", self.sequence);
	}

	pub(crate) fn finish(&self) {
		let finished = self.transition(Lifecycle::Executing, Lifecycle::Done);
		debug_assert!(finished, "invocation #{} finished twice", self.sequence);
	}

	fn transition(&self, from: Lifecycle, to: Lifecycle) -> bool {
		self.lifecycle.compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire).is_ok()
	}

	#[inline]
	pub(crate) fn is_resolved(&self) -> bool {
		self.result.is_resolved()
	}

	/// Blocks until the result is resolved.
	pub(crate) fn block(&self) {
		self.result.block();
	}

	/// Runs the message body on the calling thread.
	///
	/// Never unwinds: a panicking body fails the result instead. Worker status
	/// bookkeeping is the caller's job; this only maintains the thread's
	/// invocation stack.
	pub(crate) fn run_now(self: &Arc<Self>) {
		let Some(task) = self.task.lock().take() else {
			return;
		};

		current::push(self.clone());
		if self.log_actions {
			debug!(
				sequence = self.sequence,
				message = self.spec.name,
				depth = self.depth,
				parent = ?self.parent_sequence(),
				initializer = self.initializer,
				"invocation started"
			);
		}

		if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
			self.result.fail(ActorError::from_panic(payload));
		}

		if self.log_actions {
			debug!(
				sequence = self.sequence,
				message = self.spec.name,
				resolved = self.result.is_resolved(),
				"invocation finished"
			);
		}
		current::pop();
	}

	fn parent_sequence(&self) -> Option<u64> {
		self.parent.as_ref().and_then(Weak::upgrade).map(|parent| parent.sequence)
	}
}

impl fmt::Debug for Invocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Invocation")
			.field("sequence", &self.sequence)
			.field("message", &self.spec.name)
			.field("usage", &self.spec.usage)
			.field("depth", &self.depth)
			.field("initializer", &self.initializer)
			.field("lifecycle", &self.lifecycle())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::AtomicUsize;

	use super::*;
	use crate::{error::Result, result::ResultCell};

	fn envelope(sequence: u64) -> Envelope {
		Envelope {
			sequence,
			controller: 1,
			actor: ActorKey::dangling(),
			spec: MessageSpec::new("noop"),
			initializer: false,
			log_actions: true,
		}
	}

	#[test]
	fn test_run_now_executes_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let cell = Arc::new(ResultCell::<u32>::new());

		let counter = calls.clone();
		let resolve = cell.clone();
		let invocation = Invocation::new(
			envelope(1),
			Weak::new(),
			cell.clone(),
			Box::new(move || {
				counter.fetch_add(1, Ordering::SeqCst);
				resolve.resolve(Ok(current::depth() as u32));
			}),
		);

		invocation.begin();
		invocation.run_now();
		invocation.run_now();
		invocation.finish();

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(matches!(*cell.wait(), Ok(1)));
		assert_eq!(invocation.lifecycle(), Lifecycle::Done);
		assert_eq!(current::depth(), 0);
	}

	#[test]
	fn test_panic_fails_result() {
		let cell = Arc::new(ResultCell::<()>::new());
		let invocation = Invocation::new(envelope(2), Weak::new(), cell.clone(), Box::new(|| panic!("kaboom")));

		invocation.run_now();

		let outcome: Arc<Result<()>> = cell.wait();
		assert!(matches!(&*outcome, Err(ActorError::Panicked { message }) if message == "kaboom"));
		assert_eq!(current::depth(), 0);
	}

	#[test]
	fn test_parent_and_depth_follow_the_running_invocation() {
		let child_depth = Arc::new(AtomicUsize::new(usize::MAX));
		let cell = Arc::new(ResultCell::<()>::new());

		let observed = child_depth.clone();
		let resolve = cell.clone();
		let outer = Invocation::new(
			envelope(3),
			Weak::new(),
			cell.clone(),
			Box::new(move || {
				let inner = Invocation::new(
					envelope(4),
					Weak::new(),
					Arc::new(ResultCell::<()>::new()),
					Box::new(|| {}),
				);
				observed.store(inner.depth, Ordering::SeqCst);
				assert_eq!(inner.parent_sequence(), Some(3));
				resolve.resolve(Ok(()));
			}),
		);

		outer.run_now();
		assert!(cell.is_resolved());
		assert_eq!(child_depth.load(Ordering::SeqCst), 1);
	}
}
