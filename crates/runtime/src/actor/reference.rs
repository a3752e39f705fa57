// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Actor references and the send operations.

use std::{any::type_name, fmt, sync::Arc};

use parking_lot::RwLock;

use crate::{
	actor::{Actor, Context, MessageSpec, state::ActorKey},
	error::{ActorError, Result},
	invocation::{Invocation, Task},
	result::{AsyncResult, ResultCell},
	system::ActorSystem,
};

/// Storage of one actor.
///
/// Exclusive bodies take the write lock, which the holder invariant keeps
/// uncontended. Shared bodies take a recursive read lock so a thread helping
/// with another message of the same concurrent actor cannot block itself.
pub(crate) struct ActorCell<A: Actor> {
	pub(crate) key: ActorKey,
	pub(crate) system: ActorSystem,
	pub(crate) actor: RwLock<A>,
}

impl<A: Actor> Drop for ActorCell<A> {
	fn drop(&mut self) {
		self.system.controller().deregister(self.key);
	}
}

/// Handle to send messages to an actor.
///
/// Every send returns immediately with an [`AsyncResult`]. Only usage errors
/// are returned as `Err` here; failures of the message itself arrive through
/// the result.
pub struct ActorRef<A: Actor> {
	cell: Arc<ActorCell<A>>,
}

impl<A: Actor> ActorRef<A> {
	pub(crate) fn new(cell: Arc<ActorCell<A>>) -> Self {
		Self {
			cell,
		}
	}

	/// Sends a message that gets exclusive access to the actor.
	pub fn send<R, F>(&self, body: F) -> Result<AsyncResult<R>>
	where
		R: Clone + Send + Sync + 'static,
		F: FnOnce(&mut A, &Context<A>) -> AsyncResult<R> + Send + 'static,
	{
		self.send_with(MessageSpec::default(), body)
	}

	pub fn send_with<R, F>(&self, spec: MessageSpec, body: F) -> Result<AsyncResult<R>>
	where
		R: Clone + Send + Sync + 'static,
		F: FnOnce(&mut A, &Context<A>) -> AsyncResult<R> + Send + 'static,
	{
		self.require_exclusive()?;
		self.dispatch(spec, false, move |cell, ctx| body(&mut *cell.actor.write(), ctx), |outcome| outcome)
	}

	/// Sends a message that only reads the actor. On a concurrent actor it
	/// may run in parallel with other messages; on an exclusive actor it still
	/// runs alone and in order.
	pub fn send_shared<R, F>(&self, body: F) -> Result<AsyncResult<R>>
	where
		R: Clone + Send + Sync + 'static,
		F: FnOnce(&A, &Context<A>) -> AsyncResult<R> + Send + 'static,
	{
		self.send_shared_with(MessageSpec::default(), body)
	}

	pub fn send_shared_with<R, F>(&self, spec: MessageSpec, body: F) -> Result<AsyncResult<R>>
	where
		R: Clone + Send + Sync + 'static,
		F: FnOnce(&A, &Context<A>) -> AsyncResult<R> + Send + 'static,
	{
		self.dispatch(spec, false, move |cell, ctx| body(&*cell.actor.read_recursive(), ctx), |outcome| outcome)
	}

	/// Sends the initializing message of an exclusive actor. The body must
	/// resolve to a reference to this very actor, otherwise the result fails
	/// with [`ActorError::Contract`].
	pub fn initialize<F>(&self, body: F) -> Result<AsyncResult<ActorRef<A>>>
	where
		F: FnOnce(&mut A, &Context<A>) -> AsyncResult<ActorRef<A>> + Send + 'static,
	{
		self.require_exclusive()?;
		let expected = Arc::downgrade(&self.cell);
		self.dispatch(
			MessageSpec::new("initialize"),
			true,
			move |cell, ctx| body(&mut *cell.actor.write(), ctx),
			move |outcome| {
				let produced = outcome?;
				if std::ptr::eq(Arc::as_ptr(&produced.cell), expected.as_ptr()) {
					Ok(produced)
				} else {
					Err(ActorError::Contract {
						message: format!("initializer of `{}` must return the actor itself", type_name::<A>()),
					})
				}
			},
		)
	}

	pub fn system(&self) -> &ActorSystem {
		&self.cell.system
	}

	/// Whether both references point to the same actor.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.cell, &other.cell)
	}

	fn require_exclusive(&self) -> Result<()> {
		if A::MODEL.is_exclusive() {
			Ok(())
		} else {
			Err(ActorError::ExclusiveAccess {
				actor: type_name::<A>(),
			})
		}
	}

	fn dispatch<R, B, C>(&self, spec: MessageSpec, initializer: bool, body: B, check: C) -> Result<AsyncResult<R>>
	where
		R: Clone + Send + Sync + 'static,
		B: FnOnce(&ActorCell<A>, &Context<A>) -> AsyncResult<R> + Send + 'static,
		C: FnOnce(Result<R>) -> Result<R> + Send + 'static,
	{
		let controller = self.cell.system.controller().clone();
		let result = Arc::new(ResultCell::new());

		let target = self.cell.clone();
		let resolve = result.clone();
		let task: Task = Box::new(move || {
			let ctx = Context::new(ActorRef::new(target.clone()), target.system.clone());
			body(&target, &ctx).forward_to(&resolve, check);
		});

		let invocation = Invocation::new(
			controller.envelope(self.cell.key, spec, initializer),
			self.cell.system.downgrade(),
			result.clone(),
			task,
		);
		controller.submit(&invocation)?;
		Ok(AsyncResult::pending(result, invocation, controller))
	}
}

impl<A: Actor> Clone for ActorRef<A> {
	fn clone(&self) -> Self {
		Self {
			cell: self.cell.clone(),
		}
	}
}

impl<A: Actor> fmt::Debug for ActorRef<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActorRef").field("actor", &type_name::<A>()).field("key", &self.cell.key).finish()
	}
}
