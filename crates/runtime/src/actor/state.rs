// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-actor scheduling state.
//!
//! Each actor owns a mailbox of invocations that have not started yet. An
//! exclusive actor additionally records which invocation currently holds it;
//! while a holder exists nothing else of that actor may start, and the next
//! message to start is always the mailbox head. A concurrent actor has no
//! holder and any queued invocation may start at any time.
//!
//! All of this lives in the controller's scheduling table and is only touched
//! with the scheduling lock held.

use std::sync::Arc;

use crate::{
	actor::ConcurrencyModel,
	invocation::Invocation,
	queue::{IntrusiveQueue, QueueKey},
};

/// Generational key of an actor in the scheduling table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ActorKey {
	index: u32,
	generation: u32,
}

impl ActorKey {
	#[cfg(test)]
	pub(crate) fn dangling() -> Self {
		Self {
			index: u32::MAX,
			generation: 0,
		}
	}
}

enum Variant {
	Exclusive {
		holder: Option<u64>,
	},
	Concurrent,
}

pub(crate) struct ActorState {
	name: &'static str,
	variant: Variant,
	mailbox: IntrusiveQueue<Arc<Invocation>>,
	/// Demand last reported to the controller.
	pub(crate) reported: usize,
	/// Entry in the controller's ready index while demand is nonzero.
	pub(crate) ready: Option<QueueKey>,
}

impl ActorState {
	pub(crate) fn new(name: &'static str, model: ConcurrencyModel) -> Self {
		let variant = if model.is_exclusive() {
			Variant::Exclusive {
				holder: None,
			}
		} else {
			Variant::Concurrent
		};

		Self {
			name,
			variant,
			mailbox: IntrusiveQueue::new(),
			reported: 0,
			ready: None,
		}
	}

	#[inline]
	pub(crate) fn name(&self) -> &'static str {
		self.name
	}

	#[inline]
	pub(crate) fn queued(&self) -> usize {
		self.mailbox.len()
	}

	/// Sequence number of the invocation holding an exclusive actor.
	pub(crate) fn holder(&self) -> Option<u64> {
		match self.variant {
			Variant::Exclusive {
				holder,
			} => holder,
			Variant::Concurrent => None,
		}
	}

	/// Number of additional threads this actor could use right now.
	pub(crate) fn demand(&self) -> usize {
		match self.variant {
			Variant::Exclusive {
				holder: None,
			} if !self.mailbox.is_empty() => 1,
			Variant::Exclusive {
				..
			} => 0,
			Variant::Concurrent => self.mailbox.len(),
		}
	}

	pub(crate) fn enqueue(&mut self, invocation: Arc<Invocation>) -> QueueKey {
		self.mailbox.push(invocation)
	}

	/// Takes the next invocation to run, claiming an exclusive actor for it.
	pub(crate) fn claim_next(&mut self) -> Option<Arc<Invocation>> {
		match &mut self.variant {
			Variant::Exclusive {
				holder,
			} => {
				if holder.is_some() {
					return None;
				}
				let invocation = self.mailbox.pop()?;
				*holder = Some(invocation.sequence());
				Some(invocation)
			}
			Variant::Concurrent => self.mailbox.pop(),
		}
	}

	/// Takes the next invocation that brings `target` closer to running.
	///
	/// For an exclusive actor this is the mailbox head as long as `target` is
	/// still queued behind it; for a concurrent actor it is `target` itself.
	/// Returns `None` without side effects when the actor is held or `target`
	/// is no longer queued.
	pub(crate) fn claim_toward(&mut self, target: &Invocation) -> Option<Arc<Invocation>> {
		let key = target.queue_key()?;
		match &self.variant {
			Variant::Exclusive {
				holder: Some(_),
			} => None,
			Variant::Exclusive {
				holder: None,
			} => {
				if !self.mailbox.contains(key) {
					return None;
				}
				self.claim_next()
			}
			Variant::Concurrent => self.mailbox.remove(key),
		}
	}

	/// Gives up the exclusive hold taken for `invocation`.
	pub(crate) fn release(&mut self, invocation: &Invocation) {
		if let Variant::Exclusive {
			holder,
		} = &mut self.variant
		{
			debug_assert_eq!(*holder, Some(invocation.sequence()));
			*holder = None;
		}
	}

	/// Removes a queued invocation that will never run.
	pub(crate) fn withdraw(&mut self, invocation: &Invocation) -> Option<Arc<Invocation>> {
		self.mailbox.remove(invocation.queue_key()?)
	}
}

struct TableSlot {
	generation: u32,
	state: Option<ActorState>,
}

/// Slot arena of actor states.
#[derive(Default)]
pub(crate) struct ActorTable {
	slots: Vec<TableSlot>,
	free: Vec<u32>,
	len: usize,
}

impl ActorTable {
	pub(crate) fn insert(&mut self, state: ActorState) -> ActorKey {
		self.len += 1;
		if let Some(index) = self.free.pop() {
			let slot = &mut self.slots[index as usize];
			slot.state = Some(state);
			return ActorKey {
				index,
				generation: slot.generation,
			};
		}

		let index = self.slots.len() as u32;
		self.slots.push(TableSlot {
			generation: 0,
			state: Some(state),
		});
		ActorKey {
			index,
			generation: 0,
		}
	}

	pub(crate) fn get(&self, key: ActorKey) -> Option<&ActorState> {
		self.slots.get(key.index as usize).filter(|slot| slot.generation == key.generation)?.state.as_ref()
	}

	pub(crate) fn get_mut(&mut self, key: ActorKey) -> Option<&mut ActorState> {
		self.slots.get_mut(key.index as usize).filter(|slot| slot.generation == key.generation)?.state.as_mut()
	}

	pub(crate) fn remove(&mut self, key: ActorKey) -> Option<ActorState> {
		let slot = self.slots.get_mut(key.index as usize).filter(|slot| slot.generation == key.generation)?;
		let state = slot.state.take()?;
		slot.generation = slot.generation.wrapping_add(1);
		self.free.push(key.index);
		self.len -= 1;
		Some(state)
	}

	#[inline]
	pub(crate) fn len(&self) -> usize {
		self.len
	}
}
