// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

mod common;

use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
	time::Duration,
};

use common::LONG;
use guild_runtime::{Actor, AsyncResult, MessageSpec};

struct Journal {
	entries: Vec<usize>,
}

impl Actor for Journal {}

#[test]
fn test_messages_run_in_send_order() {
	let system = common::system(4);
	let journal = system
		.create(Journal {
			entries: Vec::new(),
		})
		.unwrap();

	let results: Vec<_> = (0..20)
		.map(|i| {
			journal.send(move |journal, _| {
				journal.entries.push(i);
				AsyncResult::ready(journal.entries.len())
			})
			.unwrap()
		})
		.collect();

	for (i, result) in results.iter().enumerate() {
		assert_eq!(result.get().unwrap(), i + 1);
	}

	let entries = journal.send_shared(|journal, _| AsyncResult::ready(journal.entries.clone())).unwrap().get().unwrap();
	assert_eq!(entries, (0..20).collect::<Vec<_>>());
	system.shutdown();
}

#[test]
fn test_bodies_never_overlap() {
	let system = common::system(4);
	let journal = system
		.create(Journal {
			entries: Vec::new(),
		})
		.unwrap();

	let active = Arc::new(AtomicUsize::new(0));
	let overlaps = Arc::new(AtomicUsize::new(0));

	let results: Vec<_> = (0..16)
		.map(|i| {
			let active = active.clone();
			let overlaps = overlaps.clone();
			let spec = MessageSpec::new("slow").waiting();
			let body = move || {
				if active.fetch_add(1, Ordering::SeqCst) != 0 {
					overlaps.fetch_add(1, Ordering::SeqCst);
				}
				thread::sleep(Duration::from_millis(2));
				active.fetch_sub(1, Ordering::SeqCst);
			};

			// shared sends on an exclusive actor are serialized as well
			let sent = if i % 2 == 0 {
				journal.send_with(spec, move |journal, _| {
					body();
					journal.entries.push(i);
					AsyncResult::empty()
				})
			} else {
				journal.send_shared_with(spec, move |_, _| {
					body();
					AsyncResult::empty()
				})
			};
			sent.unwrap()
		})
		.collect();

	for result in &results {
		assert!(result.wait_timeout(LONG));
		assert!(result.get().is_ok());
	}

	assert_eq!(overlaps.load(Ordering::SeqCst), 0);
	let entries = journal.send(|journal, _| AsyncResult::ready(journal.entries.clone())).unwrap().get().unwrap();
	assert_eq!(entries, (0..16).step_by(2).collect::<Vec<_>>());
	system.shutdown();
}

#[test]
fn test_state_survives_between_messages() {
	let system = common::system(2);
	let journal = system
		.create(Journal {
			entries: vec![7],
		})
		.unwrap();

	journal.send(|journal, _| {
		journal.entries.push(8);
		AsyncResult::empty()
	})
	.unwrap();

	let sum = journal.send(|journal, _| AsyncResult::ready(journal.entries.iter().sum::<usize>())).unwrap();
	assert_eq!(sum.get().unwrap(), 15);
	system.shutdown();
}
