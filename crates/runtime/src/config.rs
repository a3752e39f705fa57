// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Configuration for an [`ActorSystem`](crate::ActorSystem).

use std::time::Duration;

/// Configuration for the worker pool of an actor system.
#[derive(Debug, Clone)]
pub struct SystemConfig {
	/// Target number of workers running CPU-bound message bodies at once.
	///
	/// Default: number of CPUs
	pub cpu_threads: usize,

	/// Workers kept alive even when idle.
	///
	/// Default: 1
	pub min_workers: usize,

	/// Hard cap on the number of worker threads.
	///
	/// Default: 512
	pub max_workers: usize,

	/// How long an idle worker parks before it considers retiring.
	///
	/// Default: 5 seconds
	pub idle_timeout: Duration,

	/// Messages a worker runs from one actor before moving on to the next.
	///
	/// Default: 32
	pub drain_budget: usize,

	/// Maximum number of sent but unfinished invocations. `None` = unbounded.
	///
	/// Default: None
	pub max_in_flight: Option<usize>,

	/// Stack size of worker threads in bytes.
	///
	/// Default: 16 MiB
	pub stack_size: usize,

	/// Prefix of worker thread names.
	///
	/// Default: "guild-worker"
	pub thread_name: String,

	/// Log the start and end of every invocation at `debug` level.
	///
	/// Default: false
	pub log_actions: bool,
}

impl Default for SystemConfig {
	fn default() -> Self {
		Self {
			cpu_threads: num_cpus::get(),
			min_workers: 1,
			max_workers: 512,
			idle_timeout: Duration::from_secs(5),
			drain_budget: 32,
			max_in_flight: None,
			stack_size: 16 * 1024 * 1024,
			thread_name: "guild-worker".to_string(),
			log_actions: false,
		}
	}
}

impl SystemConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_cpu_threads(mut self, threads: usize) -> Self {
		self.cpu_threads = threads;
		self
	}

	pub fn with_min_workers(mut self, workers: usize) -> Self {
		self.min_workers = workers;
		self
	}

	pub fn with_max_workers(mut self, workers: usize) -> Self {
		self.max_workers = workers;
		self
	}

	pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
		self.idle_timeout = timeout;
		self
	}

	pub fn with_drain_budget(mut self, budget: usize) -> Self {
		self.drain_budget = budget;
		self
	}

	/// Bound the number of in-flight invocations. Senders outside the pool
	/// block in arrival order once the bound is reached.
	pub fn with_max_in_flight(mut self, max: usize) -> Self {
		self.max_in_flight = Some(max);
		self
	}

	pub fn with_stack_size(mut self, bytes: usize) -> Self {
		self.stack_size = bytes;
		self
	}

	pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
		self.thread_name = name.into();
		self
	}

	pub fn with_log_actions(mut self, enabled: bool) -> Self {
		self.log_actions = enabled;
		self
	}

	/// Clamps zero and contradictory values.
	pub(crate) fn normalized(mut self) -> Self {
		self.cpu_threads = self.cpu_threads.max(1);
		self.max_workers = self.max_workers.max(1);
		self.min_workers = self.min_workers.min(self.max_workers);
		self.drain_budget = self.drain_budget.max(1);
		self.max_in_flight = self.max_in_flight.map(|max| max.max(1));
		self.stack_size = self.stack_size.max(64 * 1024);
		if self.idle_timeout.is_zero() {
			self.idle_timeout = Duration::from_millis(1);
		}
		self
	}
}
