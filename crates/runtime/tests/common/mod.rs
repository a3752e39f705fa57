// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#![allow(dead_code)]

use std::time::Duration;

use guild_runtime::{ActorSystem, SystemConfig};

/// Upper bound for anything a test waits on.
pub const LONG: Duration = Duration::from_secs(10);

pub fn config(cpu_threads: usize) -> SystemConfig {
	guild_testing::init_tracing();
	SystemConfig::default().with_cpu_threads(cpu_threads).with_idle_timeout(Duration::from_millis(200))
}

pub fn system(cpu_threads: usize) -> ActorSystem {
	ActorSystem::new(config(cpu_threads))
}
