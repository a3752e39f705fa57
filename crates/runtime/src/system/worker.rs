// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Worker threads of the pool.
//!
//! A worker visits actors with demand round-robin, running a bounded batch of
//! each actor's messages per visit. With nothing to do it parks on the
//! controller's condition variable until demand appears or `idle_timeout`
//! passes, after which it exits if more than `min_workers` are alive.

use std::{
	sync::{Arc, atomic::Ordering},
	thread,
};

use tracing::{debug, warn};

use super::controller::{Controller, Scheduling};
use crate::{
	current::{self, WorkerStatus},
	error::{ActorError, Result},
};

/// Starts a worker. Called with the scheduling lock held.
pub(super) fn spawn(controller: &Arc<Controller>, s: &mut Scheduling) -> Result<()> {
	let index = controller.spawned.fetch_add(1, Ordering::Relaxed);
	let name = format!("{}-{}", controller.config.thread_name, index);
	let worker = controller.clone();

	let spawned = thread::Builder::new()
		.name(name.clone())
		.stack_size(controller.config.stack_size)
		.spawn(move || run(worker));

	match spawned {
		Ok(handle) => {
			s.workers += 1;
			s.starting += 1;
			s.peak_workers = s.peak_workers.max(s.workers);

			let mut handles = controller.handles.lock();
			handles.retain(|handle| !handle.is_finished());
			handles.push(handle);

			debug!(worker = %name, workers = s.workers, demand = s.demand, "spawned worker");
			Ok(())
		}
		Err(err) => {
			warn!(worker = %name, error = %err, "failed to spawn worker");
			Err(ActorError::Spawn {
				message: err.to_string(),
			})
		}
	}
}

fn run(controller: Arc<Controller>) {
	current::register_worker(controller.id());
	let name = thread::current().name().unwrap_or("worker").to_string();
	debug!(worker = %name, "worker started");

	let idle_timeout = controller.config.idle_timeout;
	let min_workers = controller.config.min_workers;

	let mut s = controller.state.lock();
	s.starting -= 1;
	s.statuses[WorkerStatus::Idle.index()] += 1;

	loop {
		if let Some(key) = s.ready.rotate().copied() {
			controller.switch_status(&mut s, WorkerStatus::Running);
			controller.drain(&mut s, key);
			controller.switch_status(&mut s, WorkerStatus::Idle);
			continue;
		}

		if s.shutdown {
			break;
		}

		s.sleeping += 1;
		let timed_out = controller.work_available.wait_for(&mut s, idle_timeout).timed_out();
		s.sleeping -= 1;
		if !timed_out {
			s.wakeups = s.wakeups.saturating_sub(1);
		}
		s.wakeups = s.wakeups.min(s.sleeping);

		if timed_out && s.ready.is_empty() && s.workers > min_workers {
			debug!(worker = %name, workers = s.workers - 1, "retiring idle worker");
			break;
		}
	}

	s.statuses[WorkerStatus::Idle.index()] -= 1;
	s.workers -= 1;
	let remaining = s.workers;
	drop(s);

	debug!(worker = %name, remaining, "worker stopped");
}
