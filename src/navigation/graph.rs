//! A [Graph] is an unordered registry of every [GraphNode] belonging to one
//! search space. The flat search space holds one node per walkable tile; the
//! hierarchical search space holds only Entrance nodes. Both node and edge
//! records are drawn from [Pool]s so building, querying and tearing down
//! graphs never allocates during gameplay.
//!
//! A node's outgoing edges form an intrusive singly-linked list threaded
//! through the edge pool, so a node of any degree costs a single slot plus
//! one edge record per neighbour.
//!

use crate::prelude::*;
use bevy::prelude::*;
use std::collections::BTreeMap;

/// The searchable-space variant a [GraphNode] represents. The only
/// polymorphic behaviours a node needs are passability and emptiness so a
/// tagged union takes the place of subclassing
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Reflect)]
pub enum NodeKind {
	/// A node bound to a single walkable tile of the flat search space
	Tile,
	/// An abstract node placed at a doorway along a Cluster border
	Entrance,
}

/// A link from one [GraphNode] to another with a precomputed travel cost.
/// Records chain together through `next` to form a node's edge list
#[derive(Clone, Copy, Debug)]
pub struct EdgeRecord {
	/// The node this edge arrives at
	target: Handle,
	/// Non-negative travel cost of taking this edge
	cost: f32,
	/// Next edge of the owning node's list
	next: Option<Handle>,
}

/// A unit of searchable space: wraps a tile (or an abstract entrance
/// position), exposes a world position and an edge list. A node's position
/// never changes after binding
#[derive(Clone, Copy, Debug)]
pub struct GraphNode {
	/// Which search-space variant the node belongs to
	kind: NodeKind,
	/// World position, bound once at creation
	position: Vec2,
	/// Head of the intrusive edge list
	edges: Option<Handle>,
	/// True for ad-hoc query endpoints that are not part of the permanent
	/// mesh
	temporary: bool,
}

impl GraphNode {
	/// Which search-space variant the node belongs to
	pub fn kind(&self) -> NodeKind {
		self.kind
	}
	/// World position the node is bound to
	pub fn position(&self) -> Vec2 {
		self.position
	}
	/// Whether the node is an ad-hoc query endpoint
	pub fn is_temporary(&self) -> bool {
		self.temporary
	}
}

/// Iterator over the `(target, cost)` pairs of a node's edge list
pub struct EdgeIter<'a> {
	/// The graph owning the edge pool being walked
	graph: &'a Graph,
	/// The next edge record to yield
	next: Option<Handle>,
}

impl Iterator for EdgeIter<'_> {
	type Item = (Handle, f32);
	fn next(&mut self) -> Option<Self::Item> {
		let handle = self.next?;
		let record = self.graph.edges.get(handle)?;
		self.next = record.next;
		Some((record.target, record.cost))
	}
}

/// An unordered registry of [GraphNode]s with pooled storage
pub struct Graph {
	/// Node slot pool
	nodes: Pool<GraphNode>,
	/// Edge record slot pool
	edges: Pool<EdgeRecord>,
	/// Handles of every live node, no ordering guarantee
	registry: Vec<Handle>,
}

impl Default for Graph {
	fn default() -> Self {
		Graph::new(NODE_POOL_CAPACITY, EDGE_POOL_CAPACITY, GrowthPolicy::default())
	}
}

impl Graph {
	/// Create a graph with explicit pool sizing
	pub fn new(node_capacity: usize, edge_capacity: usize, policy: GrowthPolicy) -> Self {
		Graph {
			nodes: Pool::new(node_capacity, policy),
			edges: Pool::new(edge_capacity, policy),
			registry: Vec::with_capacity(node_capacity),
		}
	}
	/// Build a flat search space over `tiles`: one [NodeKind::Tile] node per
	/// tile, each linked to its 8 neighbours with Euclidean step costs.
	/// Solidity and occupancy are deliberately not consulted here, they are
	/// evaluated at search time instead so terrain edits never restructure
	/// the flat graph. Returns the graph plus a coordinate lookup of its
	/// nodes
	pub fn from_tile_map(
		tiles: &impl TileProvider,
	) -> Result<(Graph, BTreeMap<TileCoords, Handle>), PoolError> {
		let dimensions = tiles.dimensions();
		// sized exactly for the grid: one node per tile, at most 8 directed
		// edge records each
		let node_capacity = dimensions.get_columns() * dimensions.get_rows();
		let mut graph = Graph::new(node_capacity, node_capacity * 8, GrowthPolicy::default());
		let mut lookup = BTreeMap::new();
		for row in 0..dimensions.get_rows() {
			for column in 0..dimensions.get_columns() {
				let coords = TileCoords::new(column, row);
				let position = dimensions.position_from_tile_coords(coords);
				let handle = graph.add_node(NodeKind::Tile, position, false)?;
				lookup.insert(coords, handle);
			}
		}
		// each tile links towards west and north only, the links being
		// symmetric covers the other four directions
		for (&coords, &handle) in &lookup {
			for ordinal in [
				Ordinal::West,
				Ordinal::NorthWest,
				Ordinal::North,
				Ordinal::NorthEast,
			] {
				if let Some(adjacent) = dimensions.adjacent_coords(coords, ordinal) {
					if let Some(&neighbour) = lookup.get(&adjacent) {
						graph.add_neighbour(handle, neighbour, None)?;
					}
				}
			}
		}
		Ok((graph, lookup))
	}
	/// Register a new node bound to `position`
	pub fn add_node(
		&mut self,
		kind: NodeKind,
		position: Vec2,
		temporary: bool,
	) -> Result<Handle, PoolError> {
		let handle = self.nodes.acquire(GraphNode {
			kind,
			position,
			edges: None,
			temporary,
		})?;
		self.registry.push(handle);
		Ok(handle)
	}
	/// Remove a node, unlinking every edge in both directions, and return its
	/// slots to the pools
	pub fn remove_node(&mut self, node: Handle) {
		if self.nodes.get(node).is_none() {
			debug_assert!(false, "Removed a node that was never registered: {:?}", node);
			error!("Removed an unregistered node {:?}, ignoring", node);
			return;
		}
		// unlink the reverse direction of every edge first
		let neighbours: Vec<Handle> = self.edges_of(node).map(|(target, _)| target).collect();
		for neighbour in neighbours {
			self.remove_directed_edge(neighbour, node);
		}
		// release the node's own edge chain
		let mut next = self.nodes.get(node).and_then(|n| n.edges);
		while let Some(record) = next {
			next = self.edges.get(record).and_then(|r| r.next);
			self.edges.release(record);
		}
		self.registry.retain(|h| *h != node);
		self.nodes.release(node);
	}
	/// Link two nodes symmetrically. When `cost` is [None] it defaults to the
	/// Euclidean distance between the node positions. Linking an already
	/// linked pair is a no-op
	pub fn add_neighbour(
		&mut self,
		a: Handle,
		b: Handle,
		cost: Option<f32>,
	) -> Result<(), PoolError> {
		let cost = self.resolve_cost(a, b, cost);
		self.add_directed_edge(a, b, cost)?;
		self.add_directed_edge(b, a, cost)?;
		Ok(())
	}
	/// Link `a` to `b` without the reverse edge
	pub fn add_neighbour_one_way(
		&mut self,
		a: Handle,
		b: Handle,
		cost: Option<f32>,
	) -> Result<(), PoolError> {
		let cost = self.resolve_cost(a, b, cost);
		self.add_directed_edge(a, b, cost)
	}
	/// Remove the link between two nodes in both directions
	pub fn remove_neighbour(&mut self, a: Handle, b: Handle) {
		self.remove_directed_edge(a, b);
		self.remove_directed_edge(b, a);
	}
	/// Whether `a` has an outgoing edge to `b`
	pub fn has_neighbour(&self, a: Handle, b: Handle) -> bool {
		self.edges_of(a).any(|(target, _)| target == b)
	}
	/// The cost of the edge from `a` to `b` if one exists
	pub fn edge_cost(&self, a: Handle, b: Handle) -> Option<f32> {
		self.edges_of(a)
			.find(|(target, _)| *target == b)
			.map(|(_, cost)| cost)
	}
	/// Iterate the `(target, cost)` pairs of a node's edges
	pub fn edges_of(&self, node: Handle) -> EdgeIter {
		EdgeIter {
			graph: self,
			next: self.nodes.get(node).and_then(|n| n.edges),
		}
	}
	/// Number of outgoing edges of a node
	pub fn edge_count_of(&self, node: Handle) -> usize {
		self.edges_of(node).count()
	}
	/// Access a node's record
	pub fn node(&self, handle: Handle) -> Option<&GraphNode> {
		self.nodes.get(handle)
	}
	/// Iterate every live node handle, no ordering guarantee
	pub fn iter_nodes(&self) -> impl Iterator<Item = Handle> + '_ {
		self.registry.iter().copied()
	}
	/// Number of live nodes
	pub fn node_count(&self) -> usize {
		self.registry.len()
	}
	/// Pool capacity counters: `(nodes, edges)`
	pub fn diagnostics(&self) -> (PoolDiagnostics, PoolDiagnostics) {
		(self.nodes.diagnostics(), self.edges.diagnostics())
	}
	/// Whether the tile under `node` can currently be traversed when arriving
	/// from `from`. False when the tile is `Solid` or `OCCUPIED`, and false
	/// for a single-tile diagonal step which cuts a corner - either of the
	/// two orthogonally adjacent tiles forming the corner being `Solid` makes
	/// the move illegal
	pub fn is_passable(
		&self,
		node: Handle,
		from: Option<Handle>,
		tiles: &impl TileProvider,
	) -> bool {
		let Some(record) = self.nodes.get(node) else {
			return false;
		};
		let dimensions = tiles.dimensions();
		let Some(coords) = dimensions.tile_coords_from_position(record.position) else {
			return false;
		};
		let Some(tile) = tiles.tile_at_coords(coords) else {
			return false;
		};
		if !tile.is_passable() {
			return false;
		}
		if let Some(from) = from {
			if let Some(from_record) = self.nodes.get(from) {
				if let Some(from_coords) =
					dimensions.tile_coords_from_position(from_record.position)
				{
					let dc = coords.get_column() as i32 - from_coords.get_column() as i32;
					let dr = coords.get_row() as i32 - from_coords.get_row() as i32;
					// the corner-cut rule only applies to unit diagonal steps
					if dc.abs() == 1 && dr.abs() == 1 {
						let flank_a =
							TileCoords::new(from_coords.get_column(), coords.get_row());
						let flank_b =
							TileCoords::new(coords.get_column(), from_coords.get_row());
						for flank in [flank_a, flank_b] {
							if let Some(tile) = tiles.tile_at_coords(flank) {
								if tile.kind() == TileKind::Solid {
									return false;
								}
							}
						}
					}
				}
			}
		}
		true
	}
	/// Whether the tile under `node` is `Empty` terrain, disregarding
	/// transient occupancy
	pub fn is_empty(&self, node: Handle, tiles: &impl TileProvider) -> bool {
		let Some(record) = self.nodes.get(node) else {
			return false;
		};
		match tiles.tile_at(record.position) {
			Some(tile) => tile.kind() == TileKind::Empty,
			None => false,
		}
	}
	/// The default edge cost between two nodes when none is supplied
	fn resolve_cost(&self, a: Handle, b: Handle, cost: Option<f32>) -> f32 {
		match cost {
			Some(cost) => {
				debug_assert!(cost >= 0.0, "Edge costs must be non-negative, got {}", cost);
				cost
			}
			None => {
				let pa = self.nodes.get(a).map(|n| n.position).unwrap_or_default();
				let pb = self.nodes.get(b).map(|n| n.position).unwrap_or_default();
				pa.distance(pb)
			}
		}
	}
	/// Push an edge record at the head of `a`'s list unless one to `b`
	/// already exists
	fn add_directed_edge(&mut self, a: Handle, b: Handle, cost: f32) -> Result<(), PoolError> {
		if self.nodes.get(a).is_none() || self.nodes.get(b).is_none() {
			debug_assert!(false, "Linked a node that was never registered");
			error!("Linked an unregistered node, ignoring edge {:?}->{:?}", a, b);
			return Ok(());
		}
		if self.has_neighbour(a, b) {
			return Ok(());
		}
		let head = self.nodes.get(a).and_then(|n| n.edges);
		let record = self.edges.acquire(EdgeRecord {
			target: b,
			cost,
			next: head,
		})?;
		if let Some(node) = self.nodes.get_mut(a) {
			node.edges = Some(record);
		}
		Ok(())
	}
	/// Unlink the edge from `a` to `b` if one exists and recycle its record
	fn remove_directed_edge(&mut self, a: Handle, b: Handle) {
		let mut previous: Option<Handle> = None;
		let mut current = self.nodes.get(a).and_then(|n| n.edges);
		while let Some(record) = current {
			let Some(edge) = self.edges.get(record) else {
				break;
			};
			let next = edge.next;
			if edge.target == b {
				match previous {
					Some(previous) => {
						if let Some(edge) = self.edges.get_mut(previous) {
							edge.next = next;
						}
					}
					None => {
						if let Some(node) = self.nodes.get_mut(a) {
							node.edges = next;
						}
					}
				}
				self.edges.release(record);
				return;
			}
			previous = Some(record);
			current = next;
		}
	}
}
