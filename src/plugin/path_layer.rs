//! Logic for handling pathfinding requests against [NavigationMesh] entities
//! and advancing in-flight queries by one time slice per frame
//!

use crate::prelude::*;
use bevy::prelude::*;
use std::collections::HashMap;

/// Ask a mesh entity for a route between two world positions. A new request
/// replaces whatever query was in flight on that entity
#[derive(Event)]
pub struct EventPathRequest {
	/// The mesh entity that should answer
	entity: Entity,
	/// Where the route starts
	source: Vec2,
	/// Where the route ends
	destination: Vec2,
}

impl EventPathRequest {
	/// Create a new instance of [EventPathRequest]
	#[cfg(not(tarpaulin_include))]
	pub fn new(entity: Entity, source: Vec2, destination: Vec2) -> Self {
		EventPathRequest {
			entity,
			source,
			destination,
		}
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_source(&self) -> Vec2 {
		self.source
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_destination(&self) -> Vec2 {
		self.destination
	}
}

/// Cancel the in-flight query of a mesh entity, synchronously returning its
/// search records to the pools
#[derive(Event)]
pub struct EventClearPath {
	/// The mesh entity whose query should be discarded
	entity: Entity,
}

impl EventClearPath {
	/// Create a new instance of [EventClearPath]
	#[cfg(not(tarpaulin_include))]
	pub fn new(entity: Entity) -> Self {
		EventClearPath { entity }
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
}

/// Emitted once when a query concludes with a route. Positions run from the
/// destination back to the source
#[derive(Event)]
pub struct EventPathSolved {
	/// The mesh entity that answered the query
	entity: Entity,
	/// Route waypoints ordered destination back to source
	path: Vec<Vec2>,
}

impl EventPathSolved {
	#[cfg(not(tarpaulin_include))]
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_path(&self) -> &[Vec2] {
		&self.path
	}
}

/// Emitted once when a query concludes without a route
#[derive(Event)]
pub struct EventPathFailed {
	/// The mesh entity that answered the query
	entity: Entity,
}

impl EventPathFailed {
	#[cfg(not(tarpaulin_include))]
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
}

/// The last [PathResult] reported per mesh entity. An entity's entry is
/// discarded whenever a new request or a cancellation arrives so every
/// query announces its own conclusion, even when consecutive queries
/// conclude with the same variant
#[derive(Resource, Default)]
pub struct PathAnnouncements(HashMap<Entity, PathResult>);

/// Read [EventClearPath] and cancel the targeted mesh's active query
#[cfg(not(tarpaulin_include))]
pub fn process_clear_requests(
	mut events: EventReader<EventClearPath>,
	mut announcements: ResMut<PathAnnouncements>,
	mut query: Query<&mut NavigationMesh>,
) {
	for event in events.read() {
		announcements.0.remove(&event.get_entity());
		if let Ok(mut mesh) = query.get_mut(event.get_entity()) {
			mesh.clear_destination();
		}
	}
}

/// Read [EventPathRequest] and point the targeted mesh's query at the new
/// endpoints
#[cfg(not(tarpaulin_include))]
pub fn process_path_requests(
	mut events: EventReader<EventPathRequest>,
	mut announcements: ResMut<PathAnnouncements>,
	mut query: Query<&mut NavigationMesh>,
) {
	for event in events.read() {
		announcements.0.remove(&event.get_entity());
		match query.get_mut(event.get_entity()) {
			Ok(mut mesh) => {
				mesh.set_source(event.get_source());
				mesh.set_destination(event.get_destination());
			}
			Err(_) => {
				error!(
					"Path requested of an entity without a mesh: {:?}",
					event.get_entity()
				);
			}
		}
	}
}

/// Run one time slice of every in-flight query and announce conclusions.
/// A conclusion is announced only on the frame it is first reached, repeat
/// `Solved` reports from an idle solved query stay silent
#[cfg(not(tarpaulin_include))]
pub fn advance_path_queries(
	mut query: Query<(Entity, &TileMap, &mut NavigationMesh)>,
	mut announcements: ResMut<PathAnnouncements>,
	mut event_solved: EventWriter<EventPathSolved>,
	mut event_failed: EventWriter<EventPathFailed>,
) {
	for (entity, map, mut mesh) in query.iter_mut() {
		let result = mesh.plan_path(map);
		let last = announcements.0.insert(entity, result);
		if last == Some(result) {
			continue;
		}
		match result {
			PathResult::Solved => {
				event_solved.write(EventPathSolved {
					entity,
					path: mesh.best_path(),
				});
			}
			PathResult::Failed => {
				event_failed.write(EventPathFailed { entity });
			}
			PathResult::NotStarted => {}
		}
	}
}
