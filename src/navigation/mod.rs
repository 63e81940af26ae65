//! Hierarchical pathfinding over a tile-based world.
//!
//! [Near Optimal Hierarchical Path-Finding](https://webdocs.cs.ualberta.ca/~mmueller/ps/hpastar.pdf)
//!
//! The map is divided into a series of square Clusters. Where a doorway exists
//! between two Clusters a pair of linked Entrance nodes is recorded, one on
//! each side of the shared border. Entrances within the same Cluster are
//! joined by edges carrying the true in-cluster travel cost, computed by
//! running a flat A* bounded to the Cluster. Together the Entrances form an
//! abstract graph that is far smaller than the tile grid, so long-range
//! queries only ever search a handful of nodes.
//!
//! Definitions:
//!
//! * Cluster - a square `NxN` tile sub-region of the map
//! * Entrance - a node placed at a passable opening along a Cluster border
//! * Intra-cluster edge - precomputed true-cost link between two Entrances of
//!   the same Cluster
//! * Inter-cluster edge - link between the two Entrances of a doorway facing
//!   each other across a border
//! * Time slicing - a search runs a bounded number of iterations per
//!   `update()` call so a long search spans several frames instead of
//!   stalling one
//!

pub mod arena;
pub mod cluster;
pub mod graph;
pub mod mesh;
pub mod planner;
pub mod tile;

use bevy::prelude::*;

/// Cost of a step between two orthogonally adjacent tiles, per world unit
pub const STRAIGHT_COST: f32 = 1.0;
/// Cost of a step between two diagonally adjacent tiles, per world unit.
/// Must exceed [STRAIGHT_COST] for the octile heuristic to stay admissible
pub const DIAGONAL_COST: f32 = std::f32::consts::SQRT_2;

/// Convenience way of accessing the 4 sides of a [crate::prelude::Cluster]
/// and the 8 directions of movement between tiles
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Reflect)]
pub enum Ordinal {
	North,
	East,
	South,
	West,
	NorthEast,
	SouthEast,
	SouthWest,
	NorthWest,
}

impl Ordinal {
	/// The four orthogonal directions in clockwise order starting north
	pub const ORTHOGONALS: [Ordinal; 4] =
		[Ordinal::North, Ordinal::East, Ordinal::South, Ordinal::West];
	/// All eight directions of tile movement
	pub const ALL: [Ordinal; 8] = [
		Ordinal::North,
		Ordinal::East,
		Ordinal::South,
		Ordinal::West,
		Ordinal::NorthEast,
		Ordinal::SouthEast,
		Ordinal::SouthWest,
		Ordinal::NorthWest,
	];
	/// Returns the opposite [Ordinal] of the current
	pub fn inverse(&self) -> Ordinal {
		match self {
			Ordinal::North => Ordinal::South,
			Ordinal::East => Ordinal::West,
			Ordinal::South => Ordinal::North,
			Ordinal::West => Ordinal::East,
			Ordinal::NorthEast => Ordinal::SouthWest,
			Ordinal::SouthEast => Ordinal::NorthWest,
			Ordinal::SouthWest => Ordinal::NorthEast,
			Ordinal::NorthWest => Ordinal::SouthEast,
		}
	}
	/// Whether the direction is one of the four diagonals
	pub fn is_diagonal(&self) -> bool {
		matches!(
			self,
			Ordinal::NorthEast | Ordinal::SouthEast | Ordinal::SouthWest | Ordinal::NorthWest
		)
	}
	/// The `(column, row)` offset a step in this direction applies to a tile
	/// coordinate, with rows growing southwards
	pub fn offset(&self) -> (i32, i32) {
		match self {
			Ordinal::North => (0, -1),
			Ordinal::East => (1, 0),
			Ordinal::South => (0, 1),
			Ordinal::West => (-1, 0),
			Ordinal::NorthEast => (1, -1),
			Ordinal::SouthEast => (1, 1),
			Ordinal::SouthWest => (-1, 1),
			Ordinal::NorthWest => (-1, -1),
		}
	}
	/// For two adjacent tiles find the [Ordinal] pointing from `source` to
	/// `target`. Panics if the tiles are not orthogonally or diagonally
	/// adjacent
	pub fn tile_to_tile_direction(target: (i32, i32), source: (i32, i32)) -> Self {
		let direction = (target.0 - source.0, target.1 - source.1);
		match direction {
			(0, -1) => Ordinal::North,
			(1, -1) => Ordinal::NorthEast,
			(1, 0) => Ordinal::East,
			(1, 1) => Ordinal::SouthEast,
			(0, 1) => Ordinal::South,
			(-1, 1) => Ordinal::SouthWest,
			(-1, 0) => Ordinal::West,
			(-1, -1) => Ordinal::NorthWest,
			_ => panic!(
				"Tile {:?} is not orthogonally or diagonally adjacent to {:?}",
				target, source
			),
		}
	}
}

/// Octile distance between two world positions. With [STRAIGHT_COST] of `1`
/// and [DIAGONAL_COST] of `sqrt(2)` this never overestimates the true
/// remaining travel cost on an 8-directional grid whose edge costs are
/// Euclidean distances, making it an admissible A* heuristic
pub fn octile_distance(a: Vec2, b: Vec2) -> f32 {
	let dx = (a.x - b.x).abs();
	let dy = (a.y - b.y).abs();
	let shorter = dx.min(dy);
	DIAGONAL_COST * shorter + STRAIGHT_COST * (dx + dy - 2.0 * shorter)
}
