// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, error::Error, sync::Arc};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ActorError>;

/// Every failure the runtime reports, either synchronously at the call site or
/// through a result handle.
#[derive(Debug, Clone, Error)]
pub enum ActorError {
	#[error("actor system is shut down")]
	ShutDown,

	#[error("actor `{actor}` is concurrent and does not grant exclusive access")]
	ExclusiveAccess {
		actor: &'static str,
	},

	#[error("message failed: {message}")]
	Message {
		message: String,
		source: Arc<dyn Error + Send + Sync>,
	},

	#[error("message panicked: {message}")]
	Panicked {
		message: String,
	},

	#[error("contract violation: {message}")]
	Contract {
		message: String,
	},

	#[error("invalid actor `{actor}`: {reason}")]
	Configuration {
		actor: &'static str,
		reason: String,
	},

	#[error("deadlock: {message}")]
	Deadlock {
		message: String,
	},

	#[error("failed to spawn worker thread: {message}")]
	Spawn {
		message: String,
	},
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Failure(String);

impl ActorError {
	/// Wraps a foreign error as a message failure. An `ActorError` passes
	/// through unchanged.
	pub fn wrap<E>(error: E) -> Self
	where
		E: Error + Send + Sync + 'static,
	{
		if let Some(error) = (&error as &dyn Any).downcast_ref::<ActorError>() {
			return error.clone();
		}
		ActorError::Message {
			message: error.to_string(),
			source: Arc::new(error),
		}
	}

	/// A message failure carrying only a description.
	pub fn msg(message: impl Into<String>) -> Self {
		let message = message.into();
		ActorError::Message {
			source: Arc::new(Failure(message.clone())),
			message,
		}
	}

	pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
		let message = if let Some(text) = payload.downcast_ref::<&str>() {
			(*text).to_string()
		} else if let Some(text) = payload.downcast_ref::<String>() {
			text.clone()
		} else {
			"non-string panic payload".to_string()
		};
		ActorError::Panicked {
			message,
		}
	}
}
