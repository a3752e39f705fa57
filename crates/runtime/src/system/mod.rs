// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Actor system: the handle users hold to create actors.
//!
//! The system owns one [`Controller`] and its worker pool. Cloning an
//! [`ActorSystem`] is cheap; live actors hold a clone too, so the pool shuts
//! down once the last system handle and the last actor reference are gone.

mod controller;
mod worker;

use std::{
	any::{TypeId, type_name},
	collections::HashMap,
	sync::{Arc, Weak},
};

pub(crate) use controller::Controller;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::{
	actor::{Actor, ActorRef, reference::ActorCell, validate::validate},
	config::SystemConfig,
	current,
	error::Result,
};

/// Snapshot of the worker pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
	pub workers: usize,
	pub peak_workers: usize,
	pub starting: usize,
	pub running: usize,
	pub idle: usize,
	pub running_io: usize,
	pub waiting_internal: usize,
	pub waiting_external: usize,
	pub sleeping: usize,
	pub actors: usize,
	pub demand: usize,
	pub in_flight: usize,
	/// Senders outside the pool queued for admission.
	pub admission_queue: usize,
	/// Invocations executing right now, per declared thread usage.
	pub cpu_bound: usize,
	pub io: usize,
	pub waiting: usize,
}

pub(crate) struct SystemInner {
	controller: Arc<Controller>,
	admitted: Mutex<HashMap<TypeId, Result<()>>>,
}

impl Drop for SystemInner {
	fn drop(&mut self) {
		self.controller.begin_shutdown();
	}
}

#[derive(Clone)]
pub struct ActorSystem {
	inner: Arc<SystemInner>,
}

impl ActorSystem {
	pub fn new(config: SystemConfig) -> Self {
		let controller = Controller::new(config);
		debug!(
			cpu_threads = controller.config().cpu_threads,
			max_workers = controller.config().max_workers,
			max_in_flight = ?controller.config().max_in_flight,
			"actor system created"
		);
		Self {
			inner: Arc::new(SystemInner {
				controller,
				admitted: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// The system whose message is executing on the calling thread.
	pub fn current() -> Option<ActorSystem> {
		current::invocation()?.system().upgrade().map(|inner| ActorSystem {
			inner,
		})
	}

	/// Creates an actor.
	///
	/// The first creation of each actor type checks its descriptor against
	/// its concurrency model; a failed check is returned by every later
	/// creation of that type as well.
	pub fn create<A: Actor>(&self, actor: A) -> Result<ActorRef<A>> {
		self.admit::<A>()?;
		let key = self.inner.controller.register(type_name::<A>(), A::MODEL)?;
		Ok(ActorRef::new(Arc::new(ActorCell {
			key,
			system: self.clone(),
			actor: RwLock::new(actor),
		})))
	}

	pub fn config(&self) -> &SystemConfig {
		self.inner.controller.config()
	}

	pub fn stats(&self) -> PoolStats {
		self.inner.controller.stats()
	}

	pub fn is_shutdown(&self) -> bool {
		self.inner.controller.is_shutdown()
	}

	/// Refuses new sends, lets workers finish queued messages and waits for
	/// them to exit. Call it from outside the pool.
	pub fn shutdown(&self) {
		self.inner.controller.shutdown();
	}

	pub(crate) fn controller(&self) -> &Arc<Controller> {
		&self.inner.controller
	}

	pub(crate) fn downgrade(&self) -> Weak<SystemInner> {
		Arc::downgrade(&self.inner)
	}

	fn admit<A: Actor>(&self) -> Result<()> {
		self.inner
			.admitted
			.lock()
			.entry(TypeId::of::<A>())
			.or_insert_with(|| {
				let verdict = validate(A::MODEL, &A::descriptor());
				debug!(actor = type_name::<A>(), model = ?A::MODEL, ok = verdict.is_ok(), "actor type checked");
				verdict
			})
			.clone()
	}
}

impl Default for ActorSystem {
	fn default() -> Self {
		Self::new(SystemConfig::default())
	}
}

impl std::fmt::Debug for ActorSystem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ActorSystem").field("stats", &self.stats()).finish()
	}
}
