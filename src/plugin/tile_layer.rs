//! Logic for handling changes to the [TileMap] which in turn rebuilds the
//! clusters of the [NavigationMesh] covering the edited tiles
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Used to overwrite the terrain classification of a tile on one map entity.
/// Solidity changes reshape doorways so the owning cluster is regenerated
#[derive(Event)]
pub struct EventUpdateTileKind {
	/// The map entity to edit
	entity: Entity,
	/// Tile to update
	coords: TileCoords,
	/// The terrain the tile should become
	kind: TileKind,
}

impl EventUpdateTileKind {
	/// Create a new instance of [EventUpdateTileKind]
	#[cfg(not(tarpaulin_include))]
	pub fn new(entity: Entity, coords: TileCoords, kind: TileKind) -> Self {
		EventUpdateTileKind {
			entity,
			coords,
			kind,
		}
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_coords(&self) -> TileCoords {
		self.coords
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_kind(&self) -> TileKind {
		self.kind
	}
}

/// Used to set or clear the `OCCUPIED` bit of a tile on one map entity.
/// Occupancy is transient and consulted at search time, so no regeneration
/// follows
#[derive(Event)]
pub struct EventSetTileOccupied {
	/// The map entity to edit
	entity: Entity,
	/// Tile to update
	coords: TileCoords,
	/// Whether something now stands on the tile
	occupied: bool,
}

impl EventSetTileOccupied {
	/// Create a new instance of [EventSetTileOccupied]
	#[cfg(not(tarpaulin_include))]
	pub fn new(entity: Entity, coords: TileCoords, occupied: bool) -> Self {
		EventSetTileOccupied {
			entity,
			coords,
			occupied,
		}
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_entity(&self) -> Entity {
		self.entity
	}
	#[cfg(not(tarpaulin_include))]
	pub fn get_coords(&self) -> TileCoords {
		self.coords
	}
	#[cfg(not(tarpaulin_include))]
	pub fn is_occupied(&self) -> bool {
		self.occupied
	}
}

/// Read tile edit events, apply them to the targeted [TileMap] and regenerate
/// each affected cluster once, however many of its tiles changed this frame
#[cfg(not(tarpaulin_include))]
pub fn process_tile_updates(
	mut kind_events: EventReader<EventUpdateTileKind>,
	mut occupied_events: EventReader<EventSetTileOccupied>,
	mut query: Query<(&mut TileMap, &mut NavigationMesh)>,
) {
	for event in occupied_events.read() {
		if let Ok((mut map, _mesh)) = query.get_mut(event.get_entity()) {
			map.set_occupied(event.get_coords(), event.is_occupied());
		}
	}
	// coalesce terrain edits so a burst touching one cluster rebuilds it once
	let mut edited: Vec<(Entity, TileCoords)> = Vec::new();
	for event in kind_events.read() {
		let Ok((mut map, _mesh)) = query.get_mut(event.get_entity()) else {
			error!("Tile edit targeted an entity without a map: {:?}", event.get_entity());
			continue;
		};
		map.set_tile_kind(event.get_coords(), event.get_kind());
		if !edited.contains(&(event.get_entity(), event.get_coords())) {
			edited.push((event.get_entity(), event.get_coords()));
		}
	}
	if edited.is_empty() {
		return;
	}
	let mut clusters: Vec<(Entity, ClusterID)> = Vec::new();
	let mut pending: Vec<(Entity, Vec2)> = Vec::new();
	for (entity, coords) in edited {
		let Ok((map, mesh)) = query.get_mut(entity) else {
			continue;
		};
		let position = map.dimensions().position_from_tile_coords(coords);
		if let Some(id) = mesh.cluster_at(position) {
			if !clusters.contains(&(entity, id)) {
				clusters.push((entity, id));
				pending.push((entity, position));
			}
		}
	}
	for (entity, position) in pending {
		let Ok((map, mut mesh)) = query.get_mut(entity) else {
			continue;
		};
		debug!("Regenerating the cluster covering {}", position);
		if let Err(e) = mesh.regenerate_cluster(position, map.as_ref()) {
			error!("Cluster regeneration ran out of pool capacity: {}", e);
		}
	}
}
