//! Defines the Bevy [Plugin] for navigation mesh pathfinding
//!

use crate::prelude::*;
use bevy::prelude::*;

pub mod path_layer;
pub mod tile_layer;

/// Orders terrain regeneration ahead of query planning within a frame so a
/// search never reads a half-rebuilt cluster
#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone)]
pub enum OrderingSet {
	/// Apply tile edits and rebuild affected clusters
	Regenerate,
	/// Advance path queries
	Plan,
}

/// Registers the types, events and systems driving [NavigationMesh] entities
pub struct NavMeshTilesPlugin;

impl Plugin for NavMeshTilesPlugin {
	#[cfg(not(tarpaulin_include))]
	fn build(&self, app: &mut App) {
		app.register_type::<Ordinal>()
			.register_type::<MapDimensions>()
			.register_type::<TileCoords>()
			.register_type::<TileKind>()
			.register_type::<Tile>()
			.register_type::<Handle>()
			.register_type::<NodeKind>()
			.register_type::<ClusterID>()
			.register_type::<NavMeshConfig>()
			.add_event::<tile_layer::EventUpdateTileKind>()
			.add_event::<tile_layer::EventSetTileOccupied>()
			.add_event::<path_layer::EventPathRequest>()
			.add_event::<path_layer::EventClearPath>()
			.add_event::<path_layer::EventPathSolved>()
			.add_event::<path_layer::EventPathFailed>()
			.init_resource::<path_layer::PathAnnouncements>()
			.configure_sets(Update, (OrderingSet::Regenerate, OrderingSet::Plan).chain())
			.add_systems(
				Update,
				(
					tile_layer::process_tile_updates.in_set(OrderingSet::Regenerate),
					(
						path_layer::process_clear_requests,
						path_layer::process_path_requests,
						path_layer::advance_path_queries,
					)
						.chain()
						.in_set(OrderingSet::Plan),
				),
			);
	}
}
