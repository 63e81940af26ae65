//! Fixed-capacity pools which eliminate per-frame heap churn. Graph nodes,
//! edge records and per-search path nodes are all drawn from a [Pool] sized
//! generously at startup, handed out as generation-checked [Handle]s and
//! recycled back onto a free-list when released.
//!
//! Hierarchical mesh construction creates and discards many intermediate
//! records so the default capacities are deliberately large: thousands of
//! nodes, tens of thousands of edges.
//!

use bevy::prelude::*;

/// Default slot count for graph node pools
pub const NODE_POOL_CAPACITY: usize = 4096;
/// Default slot count for edge record pools
pub const EDGE_POOL_CAPACITY: usize = 32768;
/// Default slot count for planner path node pools
pub const PATH_POOL_CAPACITY: usize = 4096;

/// A stable reference to a slot within a [Pool]. The generation counter
/// invalidates any copies of a handle once its slot has been released and
/// reused, guarding against use-after-free style bugs
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Reflect)]
pub struct Handle {
	/// Slot index within the pool
	index: u32,
	/// Generation of the slot at the time the handle was issued
	generation: u32,
}

impl Handle {
	/// Get the slot index
	pub fn index(&self) -> u32 {
		self.index
	}
}

/// Raised when a [Pool] cannot satisfy an [Pool::acquire] request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
	/// Every slot is in use and the pool's [GrowthPolicy] forbids growing
	Exhausted,
}

impl std::fmt::Display for PoolError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PoolError::Exhausted => write!(f, "pool capacity exhausted"),
		}
	}
}

impl std::error::Error for PoolError {}

/// What a [Pool] does once every slot is in use
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GrowthPolicy {
	/// Surface [PoolError::Exhausted] to the caller, typical for development
	/// builds where running out of capacity is a sizing bug worth noticing
	#[cfg_attr(debug_assertions, default)]
	Fail,
	/// Double the capacity and log a warning. Never a silent allocation in
	/// the hot path - each growth event is reported
	#[cfg_attr(not(debug_assertions), default)]
	Grow,
}

/// Capacity counters for instrumentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDiagnostics {
	/// Total slot count
	pub capacity: usize,
	/// Slots currently on the free-list
	pub free: usize,
}

/// A slot of a [Pool] - either occupied by a value or sat on the free-list
#[derive(Clone)]
struct Slot<T> {
	/// Bumped every time the slot is released so stale handles are rejected
	generation: u32,
	/// The stored value while the slot is live
	value: Option<T>,
}

/// A preallocated slab of `T` slots with a free-list. Acquire hands out
/// [Handle]s, release recycles slots, and no allocation happens during
/// steady-state operation
pub struct Pool<T> {
	/// Slot storage
	slots: Vec<Slot<T>>,
	/// Indices of released slots available for reuse
	free: Vec<u32>,
	/// What to do on exhaustion
	policy: GrowthPolicy,
}

impl<T> Pool<T> {
	/// Create a pool of `capacity` slots with the given exhaustion `policy`
	pub fn new(capacity: usize, policy: GrowthPolicy) -> Self {
		let mut slots = Vec::with_capacity(capacity);
		let mut free = Vec::with_capacity(capacity);
		for i in 0..capacity {
			slots.push(Slot {
				generation: 0,
				value: None,
			});
			// hand out low indices first
			free.push((capacity - 1 - i) as u32);
		}
		Pool { slots, free, policy }
	}
	/// Place `value` into a free slot and return its [Handle]
	pub fn acquire(&mut self, value: T) -> Result<Handle, PoolError> {
		let index = match self.free.pop() {
			Some(index) => index,
			None => match self.policy {
				GrowthPolicy::Fail => return Err(PoolError::Exhausted),
				GrowthPolicy::Grow => {
					let old_capacity = self.slots.len();
					let new_capacity = (old_capacity * 2).max(1);
					warn!(
						"Pool exhausted, growing capacity from {} to {}",
						old_capacity, new_capacity
					);
					for i in (old_capacity..new_capacity).rev() {
						self.slots.push(Slot {
							generation: 0,
							value: None,
						});
						self.free.push(i as u32);
					}
					// reverse-pushed so the lowest new index comes out first
					self.free.pop().unwrap_or(old_capacity as u32)
				}
			},
		};
		let slot = &mut self.slots[index as usize];
		slot.value = Some(value);
		Ok(Handle {
			index,
			generation: slot.generation,
		})
	}
	/// Return the slot behind `handle` to the free-list. Releasing a stale
	/// handle twice is a programmer error - it aborts in debug builds and is
	/// logged and ignored otherwise
	pub fn release(&mut self, handle: Handle) {
		let slot = &mut self.slots[handle.index as usize];
		if slot.generation != handle.generation || slot.value.is_none() {
			debug_assert!(
				false,
				"Released a stale pool handle {:?} (slot generation {})",
				handle, slot.generation
			);
			error!("Released a stale pool handle {:?}, ignoring", handle);
			return;
		}
		slot.value = None;
		slot.generation = slot.generation.wrapping_add(1);
		self.free.push(handle.index);
	}
	/// Get a reference to the value behind `handle` if the handle is live
	pub fn get(&self, handle: Handle) -> Option<&T> {
		let slot = self.slots.get(handle.index as usize)?;
		if slot.generation != handle.generation {
			return None;
		}
		slot.value.as_ref()
	}
	/// Get a mutable reference to the value behind `handle` if the handle is
	/// live
	pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
		let slot = self.slots.get_mut(handle.index as usize)?;
		if slot.generation != handle.generation {
			return None;
		}
		slot.value.as_mut()
	}
	/// Whether `handle` still refers to a live slot
	pub fn is_live(&self, handle: Handle) -> bool {
		self.get(handle).is_some()
	}
	/// Capacity counters for instrumentation
	pub fn diagnostics(&self) -> PoolDiagnostics {
		PoolDiagnostics {
			capacity: self.slots.len(),
			free: self.free.len(),
		}
	}
}
