// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Admission check of actor types against their concurrency model.
//!
//! Runs once per actor type, before the first instance is created.

use std::collections::HashSet;

use crate::{
	actor::ConcurrencyModel,
	error::{ActorError, Result},
};

/// Whether a field can be reassigned after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldMutability {
	Final,
	Reassignable,
}

/// What kind of value a field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
	/// Deeply immutable value.
	Immutable,
	/// Reference to another actor.
	Actor,
	/// Value explicitly marked as shared and thread-safe.
	Shared,
	/// Anything else.
	Mutable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
	pub name: &'static str,
	pub mutability: FieldMutability,
	pub kind: FieldKind,
}

impl FieldDescriptor {
	pub const fn new(name: &'static str, mutability: FieldMutability, kind: FieldKind) -> Self {
		Self {
			name,
			mutability,
			kind,
		}
	}
}

/// Declared fields of an actor type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorDescriptor {
	name: &'static str,
	fields: Vec<FieldDescriptor>,
}

impl ActorDescriptor {
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			fields: Vec::new(),
		}
	}

	pub fn field(mut self, field: FieldDescriptor) -> Self {
		self.fields.push(field);
		self
	}

	/// Final field holding an immutable value.
	pub fn immutable(self, name: &'static str) -> Self {
		self.field(FieldDescriptor::new(name, FieldMutability::Final, FieldKind::Immutable))
	}

	/// Final field holding another actor.
	pub fn actor(self, name: &'static str) -> Self {
		self.field(FieldDescriptor::new(name, FieldMutability::Final, FieldKind::Actor))
	}

	/// Final field holding a shared thread-safe value.
	pub fn shared(self, name: &'static str) -> Self {
		self.field(FieldDescriptor::new(name, FieldMutability::Final, FieldKind::Shared))
	}

	/// Reassignable field holding a plain value.
	pub fn mutable(self, name: &'static str) -> Self {
		self.field(FieldDescriptor::new(name, FieldMutability::Reassignable, FieldKind::Mutable))
	}

	pub fn name(&self) -> &'static str {
		self.name
	}

	pub fn fields(&self) -> &[FieldDescriptor] {
		&self.fields
	}
}

/// Checks `descriptor` against the rules of `model`.
pub fn validate(model: ConcurrencyModel, descriptor: &ActorDescriptor) -> Result<()> {
	let reject = |reason: String| ActorError::Configuration {
		actor: descriptor.name,
		reason,
	};

	let mut seen = HashSet::new();
	for field in &descriptor.fields {
		if !seen.insert(field.name) {
			return Err(reject(format!("field `{}` is declared twice", field.name)));
		}

		match model {
			ConcurrencyModel::Exclusive => {}
			ConcurrencyModel::MultiThreaded => {
				if field.kind == FieldKind::Mutable {
					return Err(reject(format!(
						"field `{}` of a multi-threaded actor must be immutable, an actor, or shared",
						field.name
					)));
				}
				if field.mutability == FieldMutability::Reassignable && field.kind != FieldKind::Shared {
					return Err(reject(format!(
						"reassignable field `{}` of a multi-threaded actor must be shared",
						field.name
					)));
				}
			}
			ConcurrencyModel::Stateless => {
				if field.mutability != FieldMutability::Final {
					return Err(reject(format!("field `{}` of a stateless actor must be final", field.name)));
				}
				if field.kind == FieldKind::Mutable {
					return Err(reject(format!(
						"field `{}` of a stateless actor must be immutable, an actor, or shared",
						field.name
					)));
				}
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_exclusive_accepts_anything() {
		let descriptor = ActorDescriptor::new("Counter").mutable("count").immutable("label");
		assert!(validate(ConcurrencyModel::Exclusive, &descriptor).is_ok());
	}

	#[test]
	fn test_duplicate_fields_rejected() {
		let descriptor = ActorDescriptor::new("Twice").immutable("x").shared("x");
		let err = validate(ConcurrencyModel::Exclusive, &descriptor).unwrap_err();
		assert!(matches!(err, ActorError::Configuration { actor: "Twice", .. }));
	}

	#[test]
	fn test_multi_threaded_rules() {
		let ok = ActorDescriptor::new("Cache")
			.immutable("capacity")
			.actor("backend")
			.field(FieldDescriptor::new("hits", FieldMutability::Reassignable, FieldKind::Shared));
		assert!(validate(ConcurrencyModel::MultiThreaded, &ok).is_ok());

		let mutable = ActorDescriptor::new("Cache").mutable("entries");
		assert!(validate(ConcurrencyModel::MultiThreaded, &mutable).is_err());

		let reassigned = ActorDescriptor::new("Cache").field(FieldDescriptor::new(
			"limit",
			FieldMutability::Reassignable,
			FieldKind::Immutable,
		));
		assert!(validate(ConcurrencyModel::MultiThreaded, &reassigned).is_err());
	}

	#[test]
	fn test_stateless_rules() {
		let ok = ActorDescriptor::new("Hasher").immutable("seed").shared("stats").actor("sink");
		assert!(validate(ConcurrencyModel::Stateless, &ok).is_ok());

		let reassignable_shared = ActorDescriptor::new("Hasher").field(FieldDescriptor::new(
			"stats",
			FieldMutability::Reassignable,
			FieldKind::Shared,
		));
		let err = validate(ConcurrencyModel::Stateless, &reassignable_shared).unwrap_err();
		assert!(err.to_string().contains("must be final"));
	}
}
