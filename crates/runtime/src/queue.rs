// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! FIFO ring with O(1) removal by handle.
//!
//! Every actor mailbox and the controller's index of runnable actors use this
//! queue. Entries live in a slot arena and link to their neighbours by slot
//! index, forming a ring: the tail is always `head.prev`. [`push`] returns a
//! [`QueueKey`] which is all a caller needs to test membership or to remove
//! the entry later, without scanning.
//!
//! Keys carry a generation that is bumped whenever a slot is vacated, so a key
//! kept around after its entry was popped never matches a reused slot.
//!
//! The queue is not thread-safe. Callers serialize access; in this crate that
//! is the controller's scheduling lock.
//!
//! [`push`]: IntrusiveQueue::push

/// Handle to an entry of an [`IntrusiveQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueKey {
	index: u32,
	generation: u32,
}

struct Node<T> {
	value: T,
	prev: u32,
	next: u32,
}

enum Entry<T> {
	Occupied(Node<T>),
	Vacant {
		next_free: Option<u32>,
	},
}

struct Slot<T> {
	generation: u32,
	entry: Entry<T>,
}

pub struct IntrusiveQueue<T> {
	slots: Vec<Slot<T>>,
	free: Option<u32>,
	head: Option<u32>,
	len: usize,
}

impl<T> IntrusiveQueue<T> {
	pub fn new() -> Self {
		Self {
			slots: Vec::new(),
			free: None,
			head: None,
			len: 0,
		}
	}

	#[inline]
	pub fn len(&self) -> usize {
		self.len
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Appends `value` at the tail.
	pub fn push(&mut self, value: T) -> QueueKey {
		let (prev, next, index) = match self.head {
			None => {
				let index = self.next_index();
				(index, index, index)
			}
			Some(head) => {
				let tail = self.node(head).prev;
				(tail, head, self.next_index())
			}
		};

		let generation = self.occupy(
			index,
			Node {
				value,
				prev,
				next,
			},
		);

		if prev != index {
			self.node_mut(prev).next = index;
			self.node_mut(next).prev = index;
		} else {
			self.head = Some(index);
		}
		self.len += 1;

		QueueKey {
			index,
			generation,
		}
	}

	/// Removes and returns the head.
	pub fn pop(&mut self) -> Option<T> {
		let head = self.head?;
		Some(self.unlink(head))
	}

	/// Removes the entry identified by `key`, wherever it sits in the queue.
	///
	/// Returns `None` if the entry is no longer queued.
	pub fn remove(&mut self, key: QueueKey) -> Option<T> {
		if !self.contains(key) {
			return None;
		}
		Some(self.unlink(key.index))
	}

	/// Returns `true` if `key` still refers to a queued entry.
	#[inline]
	pub fn contains(&self, key: QueueKey) -> bool {
		match self.slots.get(key.index as usize) {
			Some(slot) => slot.generation == key.generation && matches!(slot.entry, Entry::Occupied(_)),
			None => false,
		}
	}

	pub fn peek(&self) -> Option<&T> {
		self.head.map(|head| &self.node(head).value)
	}

	/// Moves the head to the tail and returns it.
	pub fn rotate(&mut self) -> Option<&T> {
		let head = self.head?;
		self.head = Some(self.node(head).next);
		Some(&self.node(head).value)
	}

	/// Iterates from head to tail.
	pub fn iter(&self) -> Iter<'_, T> {
		Iter {
			queue: self,
			cursor: self.head,
			remaining: self.len,
		}
	}

	/// Keeps only the entries for which `keep` returns `true`, preserving order.
	pub fn retain<F>(&mut self, mut keep: F)
	where
		F: FnMut(&T) -> bool,
	{
		let Some(mut cursor) = self.head else {
			return;
		};

		for _ in 0..self.len {
			let next = self.node(cursor).next;
			if !keep(&self.node(cursor).value) {
				self.unlink(cursor);
			}
			cursor = next;
		}
	}

	pub fn clear(&mut self) {
		while self.pop().is_some() {}
	}

	fn next_index(&self) -> u32 {
		match self.free {
			Some(index) => index,
			None => {
				debug_assert!(self.slots.len() < u32::MAX as usize);
				self.slots.len() as u32
			}
		}
	}

	fn occupy(&mut self, index: u32, node: Node<T>) -> u32 {
		match self.slots.get_mut(index as usize) {
			Some(slot) => {
				let Entry::Vacant {
					next_free,
				} = slot.entry
				else {
					unreachable!("free list points at an occupied slot");
				};
				self.free = next_free;
				slot.entry = Entry::Occupied(node);
				slot.generation
			}
			None => {
				self.slots.push(Slot {
					generation: 0,
					entry: Entry::Occupied(node),
				});
				0
			}
		}
	}

	fn unlink(&mut self, index: u32) -> T {
		let slot = &mut self.slots[index as usize];
		let entry = std::mem::replace(
			&mut slot.entry,
			Entry::Vacant {
				next_free: self.free,
			},
		);
		slot.generation = slot.generation.wrapping_add(1);
		self.free = Some(index);

		let Entry::Occupied(node) = entry else {
			unreachable!("unlinking a vacant slot");
		};

		self.len -= 1;
		if self.len == 0 {
			self.head = None;
		} else {
			self.node_mut(node.prev).next = node.next;
			self.node_mut(node.next).prev = node.prev;
			if self.head == Some(index) {
				self.head = Some(node.next);
			}
		}

		node.value
	}

	fn node(&self, index: u32) -> &Node<T> {
		match &self.slots[index as usize].entry {
			Entry::Occupied(node) => node,
			Entry::Vacant {
				..
			} => unreachable!("link points at a vacant slot"),
		}
	}

	fn node_mut(&mut self, index: u32) -> &mut Node<T> {
		match &mut self.slots[index as usize].entry {
			Entry::Occupied(node) => node,
			Entry::Vacant {
				..
			} => unreachable!("link points at a vacant slot"),
		}
	}
}

impl<T> Default for IntrusiveQueue<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: std::fmt::Debug> std::fmt::Debug for IntrusiveQueue<T> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.iter()).finish()
	}
}

pub struct Iter<'a, T> {
	queue: &'a IntrusiveQueue<T>,
	cursor: Option<u32>,
	remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
	type Item = &'a T;

	fn next(&mut self) -> Option<Self::Item> {
		if self.remaining == 0 {
			return None;
		}
		let index = self.cursor?;
		let node = self.queue.node(index);
		self.cursor = Some(node.next);
		self.remaining -= 1;
		Some(&node.value)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(self.remaining, Some(self.remaining))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn collect(queue: &IntrusiveQueue<u32>) -> Vec<u32> {
		queue.iter().copied().collect()
	}

	#[test]
	fn test_push_pop_fifo() {
		let mut queue = IntrusiveQueue::new();
		for i in 0..5 {
			queue.push(i);
		}
		assert_eq!(queue.len(), 5);
		assert_eq!(collect(&queue), vec![0, 1, 2, 3, 4]);

		for i in 0..5 {
			assert_eq!(queue.pop(), Some(i));
		}
		assert_eq!(queue.pop(), None);
		assert!(queue.is_empty());
	}

	#[test]
	fn test_remove_by_key() {
		let mut queue = IntrusiveQueue::new();
		let keys: Vec<_> = (0..5).map(|i| queue.push(i)).collect();

		assert_eq!(queue.remove(keys[2]), Some(2));
		assert_eq!(queue.remove(keys[0]), Some(0));
		assert_eq!(queue.remove(keys[4]), Some(4));
		assert_eq!(collect(&queue), vec![1, 3]);

		// second removal is a no-op
		assert_eq!(queue.remove(keys[2]), None);
		assert!(!queue.contains(keys[2]));
		assert!(queue.contains(keys[1]));
	}

	#[test]
	fn test_stale_key_does_not_match_reused_slot() {
		let mut queue = IntrusiveQueue::new();
		let first = queue.push(10);
		assert_eq!(queue.pop(), Some(10));

		let second = queue.push(20);
		assert!(!queue.contains(first));
		assert!(queue.contains(second));
		assert_eq!(queue.remove(first), None);
		assert_eq!(queue.len(), 1);
	}

	#[test]
	fn test_remove_last_entry_resets_head() {
		let mut queue = IntrusiveQueue::new();
		let key = queue.push(1);
		assert_eq!(queue.remove(key), Some(1));
		assert!(queue.peek().is_none());

		queue.push(2);
		queue.push(3);
		assert_eq!(collect(&queue), vec![2, 3]);
	}

	#[test]
	fn test_rotate_round_robin() {
		let mut queue = IntrusiveQueue::new();
		for i in 0..3 {
			queue.push(i);
		}

		let order: Vec<u32> = (0..6).map(|_| *queue.rotate().unwrap()).collect();
		assert_eq!(order, vec![0, 1, 2, 0, 1, 2]);
		assert_eq!(queue.len(), 3);

		let mut empty: IntrusiveQueue<u32> = IntrusiveQueue::new();
		assert!(empty.rotate().is_none());
	}

	#[test]
	fn test_retain_removes_visited_entries() {
		let mut queue = IntrusiveQueue::new();
		for i in 0..10 {
			queue.push(i);
		}
		queue.retain(|v| v % 3 != 0);
		assert_eq!(collect(&queue), vec![1, 2, 4, 5, 7, 8]);

		queue.retain(|_| false);
		assert!(queue.is_empty());
	}

	#[test]
	fn test_interleaved_push_and_remove() {
		let mut queue = IntrusiveQueue::new();
		let a = queue.push(1);
		let b = queue.push(2);
		queue.remove(a);
		let c = queue.push(3);
		queue.push(4);
		queue.remove(c);

		assert_eq!(collect(&queue), vec![2, 4]);
		assert!(queue.contains(b));
		assert_eq!(queue.peek(), Some(&2));

		queue.clear();
		assert!(queue.is_empty());
		assert!(!queue.contains(b));
	}
}
