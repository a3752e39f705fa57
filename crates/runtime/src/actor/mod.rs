// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Actors, their references and the scheduling state kept per actor.

mod context;
pub(crate) mod reference;
pub(crate) mod state;
mod traits;
pub(crate) mod validate;

pub use context::Context;
pub use reference::ActorRef;
pub use traits::{Actor, ConcurrencyModel, MessageSpec, ThreadUsage};
pub use validate::{ActorDescriptor, FieldDescriptor, FieldKind, FieldMutability, validate};
