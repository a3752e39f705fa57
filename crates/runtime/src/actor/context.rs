// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Actor execution context.
//!
//! The context provides message bodies with access to:
//! - Self reference, to hand out or to message the actor itself
//! - Actor system, to create further actors

use crate::{
	actor::{Actor, ActorRef},
	current,
	system::ActorSystem,
};

/// Context passed to every message body.
pub struct Context<A: Actor> {
	self_ref: ActorRef<A>,
	system: ActorSystem,
}

impl<A: Actor> Context<A> {
	pub(crate) fn new(self_ref: ActorRef<A>, system: ActorSystem) -> Self {
		Self {
			self_ref,
			system,
		}
	}

	/// Get a reference to send messages to self.
	pub fn self_ref(&self) -> ActorRef<A> {
		self.self_ref.clone()
	}

	pub fn system(&self) -> &ActorSystem {
		&self.system
	}

	/// Nesting depth of the current message on this thread, starting at 1.
	pub fn depth(&self) -> usize {
		current::depth()
	}
}

impl<A: Actor> Clone for Context<A> {
	fn clone(&self) -> Self {
		Self {
			self_ref: self.self_ref.clone(),
			system: self.system.clone(),
		}
	}
}
