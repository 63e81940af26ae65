//! A [Cluster] is a square sub-region of the tile map forming one cell of
//! the hierarchical layer. Walking the border between two adjacent clusters
//! finds the openings in the terrain; each opening produces a pair of
//! Entrance nodes, one per side, and those entrances are all a long-range
//! search ever needs to visit.
//!
//! Run detection is iterative. An accumulator extends while both sides of
//! the border stay open and flushes when either side closes or the border
//! ends, mirroring how portal candidates are swept along sector boundaries.
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Unique identifier of a [Cluster] based on its `(column, row)` position
/// within the grid of clusters covering the map
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Reflect)]
pub struct ClusterID((usize, usize));

impl ClusterID {
	/// Create a new instance of [ClusterID] from a column and row position
	pub fn new(column: usize, row: usize) -> Self {
		ClusterID((column, row))
	}
	/// Get the cluster `(column, row)`
	pub fn get_column_row(&self) -> (usize, usize) {
		self.0
	}
	/// Get the cluster column
	pub fn get_column(&self) -> usize {
		self.0 .0
	}
	/// Get the cluster row
	pub fn get_row(&self) -> usize {
		self.0 .1
	}
	/// The cluster a tile coordinate falls within, for clusters of
	/// `resolution x resolution` tiles
	pub fn from_tile_coords(coords: TileCoords, resolution: usize) -> Self {
		ClusterID::new(coords.get_column() / resolution, coords.get_row() / resolution)
	}
	/// The adjoining [ClusterID] in the given orthogonal direction, [None] at
	/// the edge of the cluster grid. Panics if `ordinal` is diagonal
	pub fn adjacent(&self, ordinal: Ordinal, cluster_columns: usize, cluster_rows: usize) -> Option<ClusterID> {
		let (column, row) = self.get_column_row();
		match ordinal {
			Ordinal::North => (row > 0).then(|| ClusterID::new(column, row - 1)),
			Ordinal::East => (column + 1 < cluster_columns).then(|| ClusterID::new(column + 1, row)),
			Ordinal::South => (row + 1 < cluster_rows).then(|| ClusterID::new(column, row + 1)),
			Ordinal::West => (column > 0).then(|| ClusterID::new(column - 1, row)),
			_ => panic!("Cluster adjacency is orthogonal only, got {:?}", ordinal),
		}
	}
}

/// A square tile sub-region of the map. Owns the Entrance node handles
/// placed along its borders so regeneration can discard and rebuild them
#[derive(Clone, Debug)]
pub struct Cluster {
	/// Position within the grid of clusters
	id: ClusterID,
	/// Tile coordinate of the cluster's north-west tile
	first_tile: TileCoords,
	/// Tile coordinate of the cluster's south-east tile, inclusive. Clusters
	/// along the map's east and south edges may be smaller than the
	/// configured resolution
	last_tile: TileCoords,
	/// World-space rectangle covering the cluster's tiles
	bounds: Rect,
	/// Entrance nodes currently placed on this cluster's side of its borders
	nodes: Vec<Handle>,
}

impl Cluster {
	/// Create a cluster covering tiles `first_tile..=last_tile`
	pub fn new(
		id: ClusterID,
		first_tile: TileCoords,
		last_tile: TileCoords,
		dimensions: &MapDimensions,
	) -> Self {
		let min = Vec2::new(
			first_tile.get_column() as f32 * dimensions.get_tile_width(),
			first_tile.get_row() as f32 * dimensions.get_tile_height(),
		);
		let max = Vec2::new(
			(last_tile.get_column() + 1) as f32 * dimensions.get_tile_width(),
			(last_tile.get_row() + 1) as f32 * dimensions.get_tile_height(),
		);
		Cluster {
			id,
			first_tile,
			last_tile,
			bounds: Rect::from_corners(min, max),
			nodes: Vec::new(),
		}
	}
	/// Position within the grid of clusters
	pub fn get_id(&self) -> ClusterID {
		self.id
	}
	/// World-space rectangle covering the cluster's tiles
	pub fn bounds(&self) -> Rect {
		self.bounds
	}
	/// Tile coordinate of the cluster's north-west tile
	pub fn first_tile(&self) -> TileCoords {
		self.first_tile
	}
	/// Tile coordinate of the cluster's south-east tile, inclusive
	pub fn last_tile(&self) -> TileCoords {
		self.last_tile
	}
	/// Whether a world position falls within the cluster
	pub fn contains(&self, position: Vec2) -> bool {
		self.bounds.contains(position)
	}
	/// Entrance nodes currently placed on this cluster's side of its borders
	pub fn nodes(&self) -> &[Handle] {
		&self.nodes
	}
	/// Record an Entrance node as belonging to this cluster
	pub fn add_entrance(&mut self, node: Handle) {
		if !self.nodes.contains(&node) {
			self.nodes.push(node);
		}
	}
	/// Forget an Entrance node, typically just before its removal from the
	/// graph
	pub fn remove_entrance(&mut self, node: Handle) {
		self.nodes.retain(|h| *h != node);
	}
	/// Forget every Entrance node of the cluster
	pub fn clear_entrances(&mut self) -> Vec<Handle> {
		std::mem::take(&mut self.nodes)
	}
	/// The tile coordinates along one edge of the cluster, ordered west to
	/// east or north to south. Panics if `ordinal` is diagonal
	pub fn border_coords(&self, ordinal: Ordinal) -> Vec<TileCoords> {
		let (first_column, first_row) = self.first_tile.get_column_row();
		let (last_column, last_row) = self.last_tile.get_column_row();
		match ordinal {
			Ordinal::North => (first_column..=last_column)
				.map(|c| TileCoords::new(c, first_row))
				.collect(),
			Ordinal::South => (first_column..=last_column)
				.map(|c| TileCoords::new(c, last_row))
				.collect(),
			Ordinal::West => (first_row..=last_row)
				.map(|r| TileCoords::new(first_column, r))
				.collect(),
			Ordinal::East => (first_row..=last_row)
				.map(|r| TileCoords::new(last_column, r))
				.collect(),
			_ => panic!("Cluster borders are orthogonal only, got {:?}", ordinal),
		}
	}
}

/// Walk a border described by two parallel tile lists - `near` on this
/// cluster's side and `far` on the neighbour's - and find the maximal runs
/// of indices where both sides are `Empty` terrain. Returned runs are
/// inclusive `(start, end)` index pairs into the lists. Transient occupancy
/// is ignored, openings are a property of the terrain alone
pub fn wall_walk_runs(
	tiles: &impl TileProvider,
	near: &[TileCoords],
	far: &[TileCoords],
) -> Vec<(usize, usize)> {
	debug_assert!(near.len() == far.len(), "Border sides must be the same length");
	let mut runs = Vec::new();
	let mut run_start: Option<usize> = None;
	for index in 0..near.len() {
		let near_open = tiles
			.tile_at_coords(near[index])
			.map(|t| t.kind() == TileKind::Empty)
			.unwrap_or(false);
		let far_open = tiles
			.tile_at_coords(far[index])
			.map(|t| t.kind() == TileKind::Empty)
			.unwrap_or(false);
		if near_open && far_open {
			if run_start.is_none() {
				run_start = Some(index);
			}
		} else if let Some(start) = run_start.take() {
			runs.push((start, index - 1));
		}
	}
	if let Some(start) = run_start {
		runs.push((start, near.len() - 1));
	}
	runs
}

/// The border indices where a run places its entrances. Short runs get a
/// single entrance at the midpoint; runs wider than `split_threshold` get
/// one at each end so agents hugging either side of a wide opening are not
/// funnelled through its middle
pub fn entrance_indices(run: (usize, usize), split_threshold: usize) -> Vec<usize> {
	let (start, end) = run;
	let width = end - start + 1;
	if width > split_threshold {
		vec![start, end]
	} else {
		vec![start + width / 2]
	}
}
