//! Spawnable bundle pairing the world grid with its navigation mesh
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Everything an entity needs to answer pathfinding queries over a tile map
#[derive(Bundle)]
pub struct NavMeshBundle {
	/// The world grid
	tile_map: TileMap,
	/// Hierarchical search space and query surface over the grid
	navigation_mesh: NavigationMesh,
}

impl NavMeshBundle {
	/// Create a new instance of [NavMeshBundle] over an all-`Empty` map of
	/// `columns x rows` tiles
	pub fn new(
		config: NavMeshConfig,
		columns: usize,
		rows: usize,
		tile_width: f32,
		tile_height: f32,
	) -> Self {
		let tile_map = TileMap::new(columns, rows, tile_width, tile_height);
		NavMeshBundle::from_tile_map(config, tile_map)
	}
	/// Create a new instance of [NavMeshBundle] over an existing [TileMap]
	pub fn from_tile_map(config: NavMeshConfig, tile_map: TileMap) -> Self {
		let navigation_mesh = match NavigationMesh::new(config, &tile_map) {
			Ok(mesh) => mesh,
			Err(e) => panic!("Building the navigation mesh exceeded pool capacity: {}", e),
		};
		NavMeshBundle {
			tile_map,
			navigation_mesh,
		}
	}
	/// Create a new instance of [NavMeshBundle] where the [TileMap] is read
	/// from a `ron` file on disk
	#[cfg(feature = "ron")]
	pub fn new_from_disk(config: NavMeshConfig, path: &str) -> Self {
		let tile_map = TileMap::from_ron(path.to_string());
		NavMeshBundle::from_tile_map(config, tile_map)
	}
}
