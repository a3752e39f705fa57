// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Core actor trait and associated types.
//!
//! This module defines the fundamental abstractions for the actor model:
//! - [`Actor`]: The trait that all actors must implement
//! - [`ConcurrencyModel`]: How many messages of one actor may run at once
//! - [`ThreadUsage`]: How a message body uses its thread
//! - [`MessageSpec`]: Name and thread usage of a message

use std::any::type_name;

use crate::actor::validate::ActorDescriptor;

/// How messages of one actor are scheduled relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConcurrencyModel {
	/// One message at a time, in send order. Bodies get `&mut` access.
	Exclusive,

	/// Any number of messages at once, in no particular order. Fields must be
	/// immutable, actors, or explicitly shared thread-safe values.
	MultiThreaded,

	/// Like `MultiThreaded`, and additionally every field is final.
	Stateless,
}

impl ConcurrencyModel {
	#[inline]
	pub fn is_exclusive(self) -> bool {
		matches!(self, ConcurrencyModel::Exclusive)
	}
}

/// How a message body uses the thread it runs on.
///
/// Only affects pool sizing, never correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThreadUsage {
	#[default]
	CpuBound,

	/// Blocks on IO such as disk or sockets.
	Io,

	/// Waits for an event outside the runtime, possibly for a long time.
	Waiting,
}

impl ThreadUsage {
	pub(crate) const COUNT: usize = 3;

	#[inline]
	pub(crate) fn index(self) -> usize {
		self as usize
	}
}

/// Logical name and declared thread usage of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageSpec {
	pub name: &'static str,
	pub usage: ThreadUsage,
}

impl Default for MessageSpec {
	fn default() -> Self {
		Self::new("message")
	}
}

impl MessageSpec {
	pub const fn new(name: &'static str) -> Self {
		Self {
			name,
			usage: ThreadUsage::CpuBound,
		}
	}

	pub const fn with_usage(mut self, usage: ThreadUsage) -> Self {
		self.usage = usage;
		self
	}

	pub const fn io(self) -> Self {
		self.with_usage(ThreadUsage::Io)
	}

	pub const fn waiting(self) -> Self {
		self.with_usage(ThreadUsage::Waiting)
	}
}

/// A unit of state reachable only through messages.
///
/// Messages are closures sent through an [`ActorRef`](crate::ActorRef). The
/// concurrency model decides whether they get `&mut Self` (exclusive) or
/// `&Self` (concurrent).
///
/// # Example
///
/// ```ignore
/// struct Counter {
///     total: u64,
/// }
///
/// impl Actor for Counter {}
///
/// let system = ActorSystem::new(SystemConfig::default());
/// let counter = system.create(Counter { total: 0 })?;
/// let total = counter
///     .send(|counter, _ctx| {
///         counter.total += 1;
///         AsyncResult::ready(counter.total)
///     })?
///     .get()?;
/// ```
pub trait Actor: Send + Sync + 'static {
	const MODEL: ConcurrencyModel = ConcurrencyModel::Exclusive;

	/// Declared fields, checked against [`Self::MODEL`] before the first
	/// instance is created.
	fn descriptor() -> ActorDescriptor
	where
		Self: Sized,
	{
		ActorDescriptor::new(type_name::<Self>())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_message_spec_builders() {
		let spec = MessageSpec::new("read");
		assert_eq!(spec.usage, ThreadUsage::CpuBound);
		assert_eq!(spec.io().usage, ThreadUsage::Io);
		assert_eq!(spec.waiting().usage, ThreadUsage::Waiting);
		assert_eq!(MessageSpec::default().name, "message");
	}

	#[test]
	fn test_default_model_is_exclusive() {
		struct Plain;
		impl Actor for Plain {}

		assert!(Plain::MODEL.is_exclusive());
		assert!(!ConcurrencyModel::Stateless.is_exclusive());
		assert!(Plain::descriptor().fields().is_empty());
	}
}
