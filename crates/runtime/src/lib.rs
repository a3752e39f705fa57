// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Thread-based actor runtime.
//!
//! This crate provides:
//! - Actors with exclusive or concurrent access to their state
//! - Message sends that return an [`AsyncResult`] right away
//! - An elastic worker pool that grows while workers block and shrinks when
//!   they idle
//! - Reentrant help: a thread waiting on a queued message runs it itself
//!
//! # Usage
//!
//! ```ignore
//! let system = ActorSystem::new(SystemConfig::default());
//! let counter = system.create(Counter { total: 0 })?;
//!
//! let total = counter
//!     .send(|counter, _ctx| {
//!         counter.total += 1;
//!         AsyncResult::ready(counter.total)
//!     })?
//!     .get()?;
//! ```

pub mod actor;
mod config;
pub mod current;
mod error;
mod invocation;
pub mod queue;
mod result;
mod system;

pub use actor::{Actor, ActorRef, ConcurrencyModel, Context, MessageSpec, ThreadUsage};
pub use config::SystemConfig;
pub use current::WorkerStatus;
pub use error::{ActorError, Result};
pub use result::{AsyncResult, Awaitable, NotifierId, await_all, await_all_until_error, await_any};
pub use system::{ActorSystem, PoolStats};
