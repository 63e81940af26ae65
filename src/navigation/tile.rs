//! The world collaborator - a grid of tiles which the pathfinding layers
//! query for passability. A [Tile] is either `Empty` or `Solid` and carries
//! mutable attribute bits such as `OCCUPIED` for transient blockers (a parked
//! unit, a closed door). An example map may look:
//!
//! ```text
//!  ___________________________________
//! |     |     |     |     |     |     |
//! |  .  |  .  |  .  |  .  |  .  |  .  |
//! |_____|_____|_____|_____|_____|_____|
//! |     |     |     |     |     |     |
//! |  .  |  .  |  x  |  x  |  .  |  .  |
//! |_____|_____|_____|_____|_____|_____|
//! |     |     |     |     |     |     |
//! |  .  |  .  |  x  |  .  |  .  |  .  |
//! |_____|_____|_____|_____|_____|_____|
//! |     |     |     |     |     |     |
//! |  .  |  .  |  .  |  .  |  .  |  .  |
//! |_____|_____|_____|_____|_____|_____|
//! ```
//!
//! World positions use a top-left origin with `+x` running east and `+y`
//! running south, so tile `(0, 0)` covers the world rectangle from `(0, 0)`
//! to `(tile_width, tile_height)` and its centre sits at half a tile.
//!

use crate::prelude::*;
use bevy::prelude::*;

/// What a tile is made of - the only property that permanently blocks
/// navigation
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Reflect)]
pub enum TileKind {
	/// Walkable ground
	#[default]
	Empty,
	/// A wall or other impassable terrain
	Solid,
}

/// Mutable attribute bits of a [Tile]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Reflect)]
pub struct TileFlags(u8);

impl TileFlags {
	/// Something is standing on the tile making it temporarily impassable
	pub const OCCUPIED: TileFlags = TileFlags(1);
	/// Whether every bit of `other` is set in `self`
	pub fn contains(&self, other: TileFlags) -> bool {
		self.0 & other.0 == other.0
	}
	/// Set every bit of `other`
	pub fn insert(&mut self, other: TileFlags) {
		self.0 |= other.0;
	}
	/// Clear every bit of `other`
	pub fn remove(&mut self, other: TileFlags) {
		self.0 &= !other.0;
	}
}

/// A single cell of the world grid
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Reflect)]
pub struct Tile {
	/// Permanent terrain classification
	kind: TileKind,
	/// Transient attribute bits
	flags: TileFlags,
}

impl Tile {
	/// Get the terrain classification
	pub fn kind(&self) -> TileKind {
		self.kind
	}
	/// Get the attribute bits
	pub fn flags(&self) -> TileFlags {
		self.flags
	}
	/// Whether the tile can currently be walked on - `Empty` terrain with no
	/// `OCCUPIED` bit set
	pub fn is_passable(&self) -> bool {
		self.kind == TileKind::Empty && !self.flags.contains(TileFlags::OCCUPIED)
	}
}

/// `(column, row)` position of a tile within the grid
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash, Reflect)]
pub struct TileCoords((usize, usize));

impl TileCoords {
	/// Create a new instance of [TileCoords]
	pub fn new(column: usize, row: usize) -> Self {
		TileCoords((column, row))
	}
	/// Get the `(column, row)` tuple
	pub fn get_column_row(&self) -> (usize, usize) {
		self.0
	}
	/// Get the column
	pub fn get_column(&self) -> usize {
		self.0 .0
	}
	/// Get the row
	pub fn get_row(&self) -> usize {
		self.0 .1
	}
}

/// The measurements of the world: the tile grid size and the world-unit size
/// of each tile
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Debug, Default, Reflect)]
pub struct MapDimensions {
	/// Number of tile columns
	columns: usize,
	/// Number of tile rows
	rows: usize,
	/// World-unit width of a tile
	tile_width: f32,
	/// World-unit height of a tile
	tile_height: f32,
}

impl MapDimensions {
	/// Create a new instance of [MapDimensions]. Panics if any measurement is
	/// zero - a world without area cannot be navigated
	pub fn new(columns: usize, rows: usize, tile_width: f32, tile_height: f32) -> Self {
		if columns == 0 || rows == 0 {
			panic!(
				"Map dimensions `({}, {})` must be at least one tile in each direction",
				columns, rows
			);
		}
		if tile_width <= 0.0 || tile_height <= 0.0 {
			panic!(
				"Tile size `({}, {})` must be positive",
				tile_width, tile_height
			);
		}
		MapDimensions {
			columns,
			rows,
			tile_width,
			tile_height,
		}
	}
	/// Number of tile columns
	pub fn get_columns(&self) -> usize {
		self.columns
	}
	/// Number of tile rows
	pub fn get_rows(&self) -> usize {
		self.rows
	}
	/// World-unit width of a tile
	pub fn get_tile_width(&self) -> f32 {
		self.tile_width
	}
	/// World-unit height of a tile
	pub fn get_tile_height(&self) -> f32 {
		self.tile_height
	}
	/// World-unit width of the whole map
	pub fn get_map_width(&self) -> f32 {
		self.columns as f32 * self.tile_width
	}
	/// World-unit height of the whole map
	pub fn get_map_height(&self) -> f32 {
		self.rows as f32 * self.tile_height
	}
	/// The tile containing a world `position`, or [None] when the position
	/// falls outside the map
	pub fn tile_coords_from_position(&self, position: Vec2) -> Option<TileCoords> {
		if position.x < 0.0
			|| position.y < 0.0
			|| position.x >= self.get_map_width()
			|| position.y >= self.get_map_height()
		{
			return None;
		}
		let column = (position.x / self.tile_width).floor() as usize;
		let row = (position.y / self.tile_height).floor() as usize;
		Some(TileCoords::new(
			column.min(self.columns - 1),
			row.min(self.rows - 1),
		))
	}
	/// World position of the centre of a tile
	pub fn position_from_tile_coords(&self, coords: TileCoords) -> Vec2 {
		Vec2::new(
			(coords.get_column() as f32 + 0.5) * self.tile_width,
			(coords.get_row() as f32 + 0.5) * self.tile_height,
		)
	}
	/// The collision rectangle of a tile in world units
	pub fn collision_rect(&self, coords: TileCoords) -> Rect {
		let min = Vec2::new(
			coords.get_column() as f32 * self.tile_width,
			coords.get_row() as f32 * self.tile_height,
		);
		Rect::from_corners(min, min + Vec2::new(self.tile_width, self.tile_height))
	}
	/// The coordinates of the tile one step in `ordinal` from `coords`, or
	/// [None] when the step leaves the map
	pub fn adjacent_coords(&self, coords: TileCoords, ordinal: Ordinal) -> Option<TileCoords> {
		let (dc, dr) = ordinal.offset();
		let column = coords.get_column() as i32 + dc;
		let row = coords.get_row() as i32 + dr;
		if column < 0 || row < 0 || column >= self.columns as i32 || row >= self.rows as i32 {
			return None;
		}
		Some(TileCoords::new(column as usize, row as usize))
	}
}

/// Read access to the world grid, consumed by the graph and planner layers.
/// Implemented by [TileMap]; game integrations with their own world storage
/// can implement it directly
pub trait TileProvider {
	/// The measurements of the world
	fn dimensions(&self) -> &MapDimensions;
	/// The tile at grid `coords`, or [None] when out of bounds
	fn tile_at_coords(&self, coords: TileCoords) -> Option<&Tile>;
	/// The tile containing world `position`, or [None] when outside the map
	fn tile_at(&self, position: Vec2) -> Option<&Tile> {
		let coords = self.dimensions().tile_coords_from_position(position)?;
		self.tile_at_coords(coords)
	}
	/// The tile one step in `ordinal` from `coords` with its coordinates, or
	/// [None] when the step leaves the map
	fn adjacent(&self, coords: TileCoords, ordinal: Ordinal) -> Option<(TileCoords, &Tile)> {
		let next = self.dimensions().adjacent_coords(coords, ordinal)?;
		self.tile_at_coords(next).map(|t| (next, t))
	}
}

/// Row-major storage of the world grid
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Component, Clone)]
pub struct TileMap {
	/// The measurements of the world
	dimensions: MapDimensions,
	/// Tiles in row-major order
	tiles: Vec<Tile>,
}

impl TileMap {
	/// Create a map of all-`Empty` tiles
	pub fn new(columns: usize, rows: usize, tile_width: f32, tile_height: f32) -> Self {
		let dimensions = MapDimensions::new(columns, rows, tile_width, tile_height);
		TileMap {
			dimensions,
			tiles: vec![Tile::default(); columns * rows],
		}
	}
	/// Flat index of `coords`, panics when out of bounds - callers are
	/// expected to have validated coordinates through [MapDimensions]
	fn index(&self, coords: TileCoords) -> usize {
		if coords.get_column() >= self.dimensions.get_columns()
			|| coords.get_row() >= self.dimensions.get_rows()
		{
			panic!(
				"Tile coords out of bounds. Asked for column {}, row {}, map is {}x{}",
				coords.get_column(),
				coords.get_row(),
				self.dimensions.get_columns(),
				self.dimensions.get_rows()
			);
		}
		coords.get_row() * self.dimensions.get_columns() + coords.get_column()
	}
	/// Overwrite the terrain classification of a tile
	pub fn set_tile_kind(&mut self, coords: TileCoords, kind: TileKind) {
		let index = self.index(coords);
		self.tiles[index].kind = kind;
	}
	/// Set or clear the `OCCUPIED` attribute bit of a tile
	pub fn set_occupied(&mut self, coords: TileCoords, occupied: bool) {
		let index = self.index(coords);
		if occupied {
			self.tiles[index].flags.insert(TileFlags::OCCUPIED);
		} else {
			self.tiles[index].flags.remove(TileFlags::OCCUPIED);
		}
	}
	/// From a `ron` file generate the [TileMap]
	#[cfg(feature = "ron")]
	pub fn from_ron(path: String) -> Self {
		let file = std::fs::File::open(path).expect("Failed opening TileMap file");
		let map: TileMap = match ron::de::from_reader(file) {
			Ok(map) => map,
			Err(e) => panic!("Failed deserializing TileMap: {}", e),
		};
		if map.tiles.len() != map.dimensions.get_columns() * map.dimensions.get_rows() {
			panic!(
				"TileMap file holds {} tiles but dimensions require {}",
				map.tiles.len(),
				map.dimensions.get_columns() * map.dimensions.get_rows()
			);
		}
		map
	}
}

impl TileProvider for TileMap {
	fn dimensions(&self) -> &MapDimensions {
		&self.dimensions
	}
	fn tile_at_coords(&self, coords: TileCoords) -> Option<&Tile> {
		if coords.get_column() >= self.dimensions.get_columns()
			|| coords.get_row() >= self.dimensions.get_rows()
		{
			return None;
		}
		self.tiles
			.get(coords.get_row() * self.dimensions.get_columns() + coords.get_column())
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	#[test]
	fn tile_centre_positions() {
		let dimensions = MapDimensions::new(3, 3, 16.0, 16.0);
		let result = dimensions.position_from_tile_coords(TileCoords::new(0, 0));
		assert_eq!(Vec2::new(8.0, 8.0), result);
		let result = dimensions.position_from_tile_coords(TileCoords::new(2, 2));
		assert_eq!(Vec2::new(40.0, 40.0), result);
	}
	#[test]
	fn position_to_coords_roundtrip() {
		let dimensions = MapDimensions::new(4, 3, 16.0, 16.0);
		let coords = TileCoords::new(3, 1);
		let centre = dimensions.position_from_tile_coords(coords);
		let result = dimensions.tile_coords_from_position(centre);
		assert_eq!(Some(coords), result);
	}
	#[test]
	fn position_outside_map_misses() {
		let dimensions = MapDimensions::new(3, 3, 16.0, 16.0);
		assert_eq!(
			None,
			dimensions.tile_coords_from_position(Vec2::new(-1.0, 8.0))
		);
		assert_eq!(
			None,
			dimensions.tile_coords_from_position(Vec2::new(8.0, 48.0))
		);
	}
	#[test]
	fn adjacency_respects_map_edges() {
		let dimensions = MapDimensions::new(3, 3, 16.0, 16.0);
		let corner = TileCoords::new(0, 0);
		assert_eq!(None, dimensions.adjacent_coords(corner, Ordinal::North));
		assert_eq!(None, dimensions.adjacent_coords(corner, Ordinal::West));
		assert_eq!(
			Some(TileCoords::new(1, 1)),
			dimensions.adjacent_coords(corner, Ordinal::SouthEast)
		);
	}
	#[test]
	fn solid_and_occupied_block_passage() {
		let mut map = TileMap::new(3, 3, 16.0, 16.0);
		let coords = TileCoords::new(1, 1);
		assert!(map.tile_at_coords(coords).unwrap().is_passable());
		map.set_occupied(coords, true);
		assert!(!map.tile_at_coords(coords).unwrap().is_passable());
		map.set_occupied(coords, false);
		map.set_tile_kind(coords, TileKind::Solid);
		assert!(!map.tile_at_coords(coords).unwrap().is_passable());
	}
	#[test]
	fn collision_rect_spans_tile() {
		let dimensions = MapDimensions::new(3, 3, 16.0, 16.0);
		let rect = dimensions.collision_rect(TileCoords::new(1, 2));
		assert_eq!(Vec2::new(16.0, 32.0), rect.min);
		assert_eq!(Vec2::new(32.0, 48.0), rect.max);
	}
	#[test]
	#[should_panic]
	fn zero_sized_map_rejected() {
		MapDimensions::new(0, 3, 16.0, 16.0);
	}
}
