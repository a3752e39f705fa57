// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Pool controller: scheduling table, worker accounting and admission.
//!
//! One mutex guards every piece of scheduling metadata: mailboxes, holders,
//! demand, the ready index, worker counts and admission tickets. Message
//! bodies always run with it released.
//!
//! Elastic sizing works from worker statuses. A worker that starts a body
//! declared as IO or long waiting, or that blocks on a result, stops counting
//! as a CPU consumer, which lets the controller wake or spawn another worker
//! while demand is outstanding. Idle workers park on a condition variable and
//! retire after `idle_timeout` down to `min_workers`.

use std::{
	mem,
	sync::{
		Arc,
		atomic::{AtomicU64, AtomicUsize, Ordering},
	},
	thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use super::{PoolStats, worker};
use crate::{
	actor::{
		ConcurrencyModel, MessageSpec, ThreadUsage,
		state::{ActorKey, ActorState, ActorTable},
	},
	config::SystemConfig,
	current::{self, WorkerStatus},
	error::{ActorError, Result},
	invocation::{Envelope, Invocation, Lifecycle},
	queue::IntrusiveQueue,
};

pub(super) type Guard<'a> = MutexGuard<'a, Scheduling>;

pub(crate) struct Scheduling {
	pub(super) actors: ActorTable,
	/// Actors with nonzero demand, visited round-robin by workers.
	pub(super) ready: IntrusiveQueue<ActorKey>,
	pub(super) demand: usize,
	pub(super) workers: usize,
	pub(super) starting: usize,
	pub(super) peak_workers: usize,
	pub(super) statuses: [usize; WorkerStatus::COUNT],
	pub(super) sleeping: usize,
	/// Sleepers signalled but not yet awake.
	pub(super) wakeups: usize,
	pub(super) usage: [usize; ThreadUsage::COUNT],
	pub(super) in_flight: usize,
	pub(super) next_ticket: u64,
	pub(super) serving: u64,
	pub(super) shutdown: bool,
}

impl Scheduling {
	fn new() -> Self {
		Self {
			actors: ActorTable::default(),
			ready: IntrusiveQueue::new(),
			demand: 0,
			workers: 0,
			starting: 0,
			peak_workers: 0,
			statuses: [0; WorkerStatus::COUNT],
			sleeping: 0,
			wakeups: 0,
			usage: [0; ThreadUsage::COUNT],
			in_flight: 0,
			next_ticket: 0,
			serving: 0,
			shutdown: false,
		}
	}

	/// Recomputes the demand of one actor and keeps the ready index and the
	/// total in step. Returns `true` if the actor's demand grew.
	pub(super) fn refresh(&mut self, key: ActorKey) -> bool {
		let Some(actor) = self.actors.get_mut(key) else {
			return false;
		};

		let demand = actor.demand();
		let previous = mem::replace(&mut actor.reported, demand);
		match (demand > 0, actor.ready) {
			(true, None) => actor.ready = Some(self.ready.push(key)),
			(false, Some(entry)) => {
				self.ready.remove(entry);
				actor.ready = None;
			}
			_ => {}
		}

		self.demand = self.demand + demand - previous;
		demand > previous
	}

	pub(super) fn transition(&mut self, from: WorkerStatus, to: WorkerStatus) {
		self.statuses[from.index()] -= 1;
		self.statuses[to.index()] += 1;
	}

	/// Workers consuming CPU now or about to.
	fn cpu_active(&self) -> usize {
		self.statuses[WorkerStatus::Running.index()] + self.starting + self.wakeups
	}

	fn has_sleeper(&self) -> bool {
		self.sleeping > self.wakeups
	}
}

pub(crate) struct Controller {
	pub(super) config: SystemConfig,
	sequence: AtomicU64,
	pub(super) state: Mutex<Scheduling>,
	pub(super) work_available: Condvar,
	admission: Condvar,
	pub(super) handles: Mutex<Vec<JoinHandle<()>>>,
	pub(super) spawned: AtomicUsize,
}

impl Controller {
	pub(crate) fn new(config: SystemConfig) -> Arc<Self> {
		Arc::new(Self {
			config: config.normalized(),
			sequence: AtomicU64::new(1),
			state: Mutex::new(Scheduling::new()),
			work_available: Condvar::new(),
			admission: Condvar::new(),
			handles: Mutex::new(Vec::new()),
			spawned: AtomicUsize::new(0),
		})
	}

	/// Identity of this controller on thread stacks.
	#[inline]
	pub(crate) fn id(&self) -> usize {
		self as *const Self as usize
	}

	pub(crate) fn config(&self) -> &SystemConfig {
		&self.config
	}

	pub(crate) fn envelope(&self, actor: ActorKey, spec: MessageSpec, initializer: bool) -> Envelope {
		Envelope {
			sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
			controller: self.id(),
			actor,
			spec,
			initializer,
			log_actions: self.config.log_actions,
		}
	}

	pub(crate) fn register(&self, name: &'static str, model: ConcurrencyModel) -> Result<ActorKey> {
		let mut s = self.state.lock();
		if s.shutdown {
			return Err(ActorError::ShutDown);
		}
		let key = s.actors.insert(ActorState::new(name, model));
		trace!(actor = name, model = ?model, actors = s.actors.len(), "actor registered");
		Ok(key)
	}

	/// Drops the state of an actor whose last reference is gone.
	pub(crate) fn deregister(&self, key: ActorKey) {
		let mut s = self.state.lock();
		let Some(actor) = s.actors.remove(key) else {
			return;
		};
		debug_assert_eq!(actor.queued(), 0);
		if let Some(entry) = actor.ready {
			s.ready.remove(entry);
		}
		s.demand -= actor.reported;
		trace!(actor = actor.name(), actors = s.actors.len(), "actor removed");
	}

	/// Admits and enqueues `invocation`, then makes sure a worker will see it.
	pub(crate) fn submit(self: &Arc<Self>, invocation: &Arc<Invocation>) -> Result<()> {
		let mut s = self.state.lock();
		if s.shutdown {
			return Err(ActorError::ShutDown);
		}
		self.admit(&mut s)?;

		let key = invocation.actor();
		let Some(actor) = s.actors.get_mut(key) else {
			self.return_capacity(&mut s);
			return Err(ActorError::ShutDown);
		};
		let entry = actor.enqueue(invocation.clone());
		invocation.set_queue_key(entry);
		trace!(
			sequence = invocation.sequence(),
			message = invocation.name(),
			actor = actor.name(),
			queued = actor.queued(),
			"message queued"
		);

		if s.refresh(key) {
			if let Err(err) = self.balance(&mut s) {
				if s.workers == 0 {
					// nothing could ever run it
					let withdrawn = s.actors.get_mut(key).and_then(|actor| actor.withdraw(invocation));
					s.refresh(key);
					self.return_capacity(&mut s);
					drop(s);
					drop(withdrawn);
					return Err(err);
				}
			}
		}
		Ok(())
	}

	/// Blocks until `target` is resolved, running it on this thread if it has
	/// not been claimed yet.
	pub(crate) fn await_invocation(self: &Arc<Self>, target: &Arc<Invocation>) -> Result<()> {
		if target.is_resolved() {
			return Ok(());
		}

		let mut s = self.state.lock();
		let Some(awaited) = self.advance(&mut s, target)? else {
			return Ok(());
		};

		let status = match awaited.usage() {
			ThreadUsage::Waiting => WorkerStatus::WaitingExternal,
			ThreadUsage::CpuBound | ThreadUsage::Io => WorkerStatus::WaitingInternal,
		};
		let previous = self.enter_status(&mut s, status);
		trace!(
			sequence = target.sequence(),
			message = target.name(),
			awaited = awaited.sequence(),
			"blocking on result"
		);
		MutexGuard::unlocked(&mut s, || target.block());
		self.restore_status(&mut s, previous);
		Ok(())
	}

	/// Runs what `target` still depends on as far as this thread can, without
	/// blocking. Fails if waiting on it could never finish.
	pub(crate) fn help_invocation(self: &Arc<Self>, target: &Arc<Invocation>) -> Result<()> {
		if target.is_resolved() {
			return Ok(());
		}
		let mut s = self.state.lock();
		self.advance(&mut s, target).map(drop)
	}

	/// Runs `wait` as a thread blocked on results of this pool.
	pub(crate) fn block_while(self: &Arc<Self>, wait: &mut dyn FnMut()) {
		let mut s = self.state.lock();
		let previous = self.enter_status(&mut s, WorkerStatus::WaitingInternal);
		MutexGuard::unlocked(&mut s, wait);
		self.restore_status(&mut s, previous);
	}

	/// Helps `target` and then, while its body has handed back the pending
	/// result of another message of this pool, that message. Returns the
	/// invocation left to block on, or `None` once `target` is resolved.
	fn advance(self: &Arc<Self>, s: &mut Guard<'_>, target: &Arc<Invocation>) -> Result<Option<Arc<Invocation>>> {
		let mut awaited = target.clone();
		loop {
			if awaited.lifecycle() == Lifecycle::NotStarted {
				self.help(s, &awaited);
			}
			if target.is_resolved() {
				return Ok(None);
			}

			if let Some(message) = self.deadlock(s, &awaited) {
				return Err(ActorError::Deadlock {
					message,
				});
			}

			let next = match awaited.forwarded() {
				Some(next) if next.controller() == self.id() => next.clone(),
				_ => return Ok(Some(awaited)),
			};
			awaited = next;
		}
	}

	pub(crate) fn stats(&self) -> PoolStats {
		let s = self.state.lock();
		PoolStats {
			workers: s.workers,
			peak_workers: s.peak_workers,
			starting: s.starting,
			running: s.statuses[WorkerStatus::Running.index()],
			idle: s.statuses[WorkerStatus::Idle.index()],
			running_io: s.statuses[WorkerStatus::RunningIo.index()],
			waiting_internal: s.statuses[WorkerStatus::WaitingInternal.index()],
			waiting_external: s.statuses[WorkerStatus::WaitingExternal.index()],
			sleeping: s.sleeping,
			actors: s.actors.len(),
			demand: s.demand,
			in_flight: s.in_flight,
			admission_queue: (s.next_ticket - s.serving) as usize,
			cpu_bound: s.usage[ThreadUsage::CpuBound.index()],
			io: s.usage[ThreadUsage::Io.index()],
			waiting: s.usage[ThreadUsage::Waiting.index()],
		}
	}

	pub(crate) fn is_shutdown(&self) -> bool {
		self.state.lock().shutdown
	}

	/// Refuses further sends and lets workers exit once the ready index is
	/// empty. Does not wait for them.
	pub(crate) fn begin_shutdown(self: &Arc<Self>) {
		let mut s = self.state.lock();
		if s.shutdown {
			return;
		}
		s.shutdown = true;
		debug!(workers = s.workers, demand = s.demand, in_flight = s.in_flight, "shutting down actor system");

		if s.demand > 0 && s.workers == 0 {
			let _ = worker::spawn(self, &mut s);
		}
		self.work_available.notify_all();
		self.admission.notify_all();
	}

	/// Like [`begin_shutdown`](Self::begin_shutdown), then joins every worker
	/// other than the calling thread.
	pub(crate) fn shutdown(self: &Arc<Self>) {
		self.begin_shutdown();

		// workers still draining may spawn more
		let me = thread::current().id();
		loop {
			let handles = mem::take(&mut *self.handles.lock());
			if handles.is_empty() {
				break;
			}
			for handle in handles {
				if handle.thread().id() == me {
					continue;
				}
				if handle.join().is_err() {
					warn!("worker thread panicked");
				}
			}
		}
	}

	/// Runs up to `drain_budget` messages of one actor.
	pub(super) fn drain(self: &Arc<Self>, s: &mut Guard<'_>, key: ActorKey) {
		for _ in 0..self.config.drain_budget {
			let Some(invocation) = s.actors.get_mut(key).and_then(ActorState::claim_next) else {
				break;
			};
			s.refresh(key);
			self.execute(s, &invocation);
			if let Some(actor) = s.actors.get_mut(key) {
				actor.release(&invocation);
			}
			s.refresh(key);
			discard(s, invocation);
		}
	}

	/// Runs `target` on this thread if it is still queued and its actor lets
	/// it start. An exclusive actor first runs the messages queued before it.
	fn help(self: &Arc<Self>, s: &mut Guard<'_>, target: &Arc<Invocation>) -> bool {
		let key = target.actor();
		loop {
			let Some(invocation) = s.actors.get_mut(key).and_then(|actor| actor.claim_toward(target)) else {
				return false;
			};
			s.refresh(key);
			self.execute(s, &invocation);
			if let Some(actor) = s.actors.get_mut(key) {
				actor.release(&invocation);
			}
			let grew = s.refresh(key);

			let reached = Arc::ptr_eq(&invocation, target);
			discard(s, invocation);
			if reached {
				if grew {
					let _ = self.balance(s);
				}
				return true;
			}
		}
	}

	fn execute(self: &Arc<Self>, s: &mut Guard<'_>, invocation: &Arc<Invocation>) {
		invocation.begin();
		let usage = invocation.usage();
		s.usage[usage.index()] += 1;
		let status = match usage {
			ThreadUsage::CpuBound => WorkerStatus::Running,
			ThreadUsage::Io => WorkerStatus::RunningIo,
			ThreadUsage::Waiting => WorkerStatus::WaitingExternal,
		};
		let previous = self.enter_status(s, status);

		MutexGuard::unlocked(s, || invocation.run_now());

		s.usage[usage.index()] -= 1;
		self.restore_status(s, previous);
		invocation.finish();
		self.return_capacity(s);
	}

	fn return_capacity(&self, s: &mut Scheduling) {
		s.in_flight -= 1;
		if s.serving != s.next_ticket {
			self.admission.notify_all();
		}
	}

	/// Waiting on `target` can never finish if `target` runs on this very
	/// stack, or if it is queued behind the holder of an exclusive actor and
	/// that holder is on this stack.
	fn deadlock(&self, s: &Scheduling, target: &Invocation) -> Option<String> {
		if current::holds(self.id(), target.sequence()) {
			return Some(format!("message `{}` (#{}) waits on its own result", target.name(), target.sequence()));
		}
		if target.lifecycle() != Lifecycle::NotStarted {
			return None;
		}

		let actor = s.actors.get(target.actor())?;
		let holder = actor.holder()?;
		current::holds(self.id(), holder).then(|| {
			format!(
				"message `{}` (#{}) is queued on actor `{}`, held by #{} which waits for it",
				target.name(),
				target.sequence(),
				actor.name(),
				holder
			)
		})
	}

	/// Takes one unit of in-flight capacity. Threads outside the pool queue
	/// up in ticket order; threads already running a message never block.
	fn admit(&self, s: &mut Guard<'_>) -> Result<()> {
		let Some(max) = self.config.max_in_flight else {
			s.in_flight += 1;
			return Ok(());
		};

		if current::is_executing() || (s.serving == s.next_ticket && s.in_flight < max) {
			s.in_flight += 1;
			return Ok(());
		}

		let ticket = s.next_ticket;
		s.next_ticket += 1;
		trace!(ticket, in_flight = s.in_flight, max, "send waiting for admission");

		loop {
			if s.shutdown {
				return Err(ActorError::ShutDown);
			}
			if s.serving == ticket && s.in_flight < max {
				break;
			}
			self.admission.wait(s);
		}

		s.serving += 1;
		s.in_flight += 1;
		self.admission.notify_all();
		Ok(())
	}

	/// Wakes sleeping workers for outstanding demand, then spawns new ones
	/// while fewer than `cpu_threads` consume CPU.
	pub(super) fn balance(self: &Arc<Self>, s: &mut Scheduling) -> Result<()> {
		let mut needed = s.demand.saturating_sub(s.starting + s.wakeups);

		while needed > 0 && s.has_sleeper() {
			if !self.work_available.notify_one() {
				break;
			}
			s.wakeups += 1;
			needed -= 1;
		}

		while needed > 0 && s.cpu_active() < self.config.cpu_threads && s.workers < self.config.max_workers {
			worker::spawn(self, s)?;
			needed -= 1;
		}
		Ok(())
	}

	/// Records a new status for a worker of this controller and compensates
	/// when the thread stops consuming CPU. Returns the status to restore, or
	/// `None` if the calling thread is not one of this controller's workers.
	fn enter_status(self: &Arc<Self>, s: &mut Scheduling, status: WorkerStatus) -> Option<WorkerStatus> {
		if current::worker_of() != Some(self.id()) {
			return None;
		}

		let previous = current::replace_status(status);
		s.transition(previous, status);

		if status.is_blocking() {
			if s.demand > 0 {
				let _ = self.balance(s);
			} else if status == WorkerStatus::WaitingExternal
				&& !s.has_sleeper()
				&& s.workers < self.config.max_workers
			{
				trace!("spawning spare worker for a long wait");
				let _ = worker::spawn(self, s);
			}
		}
		Some(previous)
	}

	fn restore_status(&self, s: &mut Scheduling, previous: Option<WorkerStatus>) {
		if let Some(previous) = previous {
			self.switch_status(s, previous);
		}
	}

	pub(super) fn switch_status(&self, s: &mut Scheduling, status: WorkerStatus) {
		let previous = current::replace_status(status);
		s.transition(previous, status);
	}
}

/// Drops a finished invocation. The last handle is dropped with the lock
/// released: its result may own the last reference to an actor, whose drop
/// takes the lock again.
fn discard(s: &mut Guard<'_>, invocation: Arc<Invocation>) {
	if let Some(last) = Arc::into_inner(invocation) {
		MutexGuard::unlocked(s, move || drop(last));
	}
}
