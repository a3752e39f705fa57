// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Helpers shared by the test suites of the workspace.

pub mod util;

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Installs a test-friendly fmt subscriber once per process.
///
/// Honors `RUST_LOG` and stays silent below `warn` otherwise.
pub fn init_tracing() {
	INIT.call_once(|| {
		let _ = tracing_subscriber::fmt()
			.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
			.with_test_writer()
			.with_thread_names(true)
			.try_init();
	});
}
