//! The time-sliced A* planner. A search session grows its open and closed
//! sets across successive [AStarPlanner::update] calls, each bounded by a
//! fixed iteration cap, so a long search spans several frames instead of
//! stalling one. All per-session [PathNode] records are drawn from a [Pool]
//! and recycled when the session restarts or is cancelled.
//!
//! The open list is a plain vector scanned left to right each iteration.
//! Among equal `F` scores the scan prefers the entry encountered with
//! `F <= best`, which makes expansion order - and therefore the chosen path
//! among equal-cost alternatives - fully deterministic. Swapping the scan for
//! a priority heap would change which tied node is expanded first, so the
//! scan stays.
//!

use crate::prelude::*;
use bevy::prelude::*;

/// Search iterations performed per [AStarPlanner::update] call
pub const DEFAULT_ITERATION_CAP: usize = 30;

/// Outcome surfaced to the caller after each [AStarPlanner::update] call
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum PathResult {
	/// Source or destination is unset, or the search has not yet concluded -
	/// a normal transient state, not an error
	#[default]
	NotStarted,
	/// The destination was reached; walk [AStarPlanner::current_best]'s
	/// `previous` chain for the path
	Solved,
	/// The destination is unreachable: its tile (or the source tile) is not
	/// passable, or the open list emptied without reaching it
	Failed,
}

/// Per-search-session wrapper around a graph node
#[derive(Clone, Copy, Debug)]
pub struct PathNode {
	/// The graph node this record wraps
	node: Handle,
	/// Back-reference to the path node this one was reached from. Purely a
	/// traversal pointer, never an ownership link
	previous: Option<Handle>,
	/// Travel cost accumulated from the source (G)
	cost_from_start: f32,
	/// Heuristic estimate of the remaining cost to the destination (H)
	cost_to_end: f32,
	/// `G + H` (F)
	final_cost: f32,
	/// Consumer-owned bookkeeping for path-following
	reached: bool,
	/// Set on the destination record once the session solves
	path_solved: bool,
}

impl PathNode {
	/// The graph node this record wraps
	pub fn node(&self) -> Handle {
		self.node
	}
	/// The path node this one was reached from
	pub fn previous(&self) -> Option<Handle> {
		self.previous
	}
	/// Travel cost accumulated from the source
	pub fn cost_from_start(&self) -> f32 {
		self.cost_from_start
	}
	/// Heuristic estimate of the remaining cost to the destination
	pub fn cost_to_end(&self) -> f32 {
		self.cost_to_end
	}
	/// `G + H`
	pub fn final_cost(&self) -> f32 {
		self.final_cost
	}
	/// Consumer-owned path-following flag
	pub fn is_reached(&self) -> bool {
		self.reached
	}
	/// Whether this record closed a solved session
	pub fn is_path_solved(&self) -> bool {
		self.path_solved
	}
}

/// Incremental A* over a [Graph]. Set a source and destination then call
/// [AStarPlanner::update] once per frame until it reports
/// [PathResult::Solved] or [PathResult::Failed]
pub struct AStarPlanner {
	/// Session storage for [PathNode] records
	pool: Pool<PathNode>,
	/// Frontier records awaiting expansion
	open: Vec<Handle>,
	/// Finalised records
	closed: Vec<Handle>,
	/// Graph node the search starts from
	source: Option<Handle>,
	/// Graph node the search aims for
	destination: Option<Handle>,
	/// Record closest to the destination so far; the destination record once
	/// solved
	best: Option<Handle>,
	/// Whether the destination has been reached this session
	solved: bool,
	/// Forces the session to restart on the next update
	invalidated: bool,
	/// Search iterations allowed per update call
	iteration_cap: usize,
	/// Optional rectangle the search may not expand outside of, used for
	/// cluster-bounded searches
	bounds: Option<Rect>,
}

impl Default for AStarPlanner {
	fn default() -> Self {
		AStarPlanner::new(PATH_POOL_CAPACITY, GrowthPolicy::default())
	}
}

impl AStarPlanner {
	/// Create a planner with explicit session pool sizing
	pub fn new(path_capacity: usize, policy: GrowthPolicy) -> Self {
		AStarPlanner {
			pool: Pool::new(path_capacity, policy),
			open: Vec::with_capacity(path_capacity),
			closed: Vec::with_capacity(path_capacity),
			source: None,
			destination: None,
			best: None,
			solved: false,
			invalidated: true,
			iteration_cap: DEFAULT_ITERATION_CAP,
			bounds: None,
		}
	}
	/// Set the graph node the search starts from. Invalidates the session
	/// only if the node actually differs; the restart happens lazily on the
	/// next [AStarPlanner::update]
	pub fn set_source(&mut self, node: Handle) {
		if self.source != Some(node) {
			self.source = Some(node);
			self.invalidated = true;
		}
	}
	/// Set the graph node the search aims for. Invalidates the session only
	/// if the node actually differs
	pub fn set_destination(&mut self, node: Handle) {
		if self.destination != Some(node) {
			self.destination = Some(node);
			self.invalidated = true;
		}
	}
	/// Cancel the session: discard all search state and return every
	/// outstanding [PathNode] to the pool
	pub fn clear_destination(&mut self) {
		self.reset_session();
		self.destination = None;
	}
	/// Restrict expansion to `bounds`, or lift the restriction with [None]
	pub fn set_bounds(&mut self, bounds: Option<Rect>) {
		if self.bounds != bounds {
			self.bounds = bounds;
			self.invalidated = true;
		}
	}
	/// Override the per-update iteration cap
	pub fn set_iteration_cap(&mut self, cap: usize) {
		self.iteration_cap = cap.max(1);
	}
	/// Whether the current session has reached the destination
	pub fn is_solved(&self) -> bool {
		self.solved
	}
	/// The record closest to the destination - the destination record itself
	/// once solved. Walk `previous` to obtain the path from destination back
	/// to source
	pub fn current_best(&self) -> Option<Handle> {
		self.best
	}
	/// Access a session record
	pub fn path_node(&self, handle: Handle) -> Option<&PathNode> {
		self.pool.get(handle)
	}
	/// Set the consumer-owned `reached` flag of a session record
	pub fn mark_reached(&mut self, handle: Handle) {
		if let Some(record) = self.pool.get_mut(handle) {
			record.reached = true;
		}
	}
	/// The graph nodes of the best chain, ordered destination back to source
	pub fn best_chain(&self) -> Vec<Handle> {
		let mut nodes = Vec::new();
		let mut cursor = self.best;
		while let Some(handle) = cursor {
			let Some(record) = self.pool.get(handle) else {
				break;
			};
			nodes.push(record.node);
			cursor = record.previous;
		}
		nodes
	}
	/// Session pool capacity counters for instrumentation
	pub fn pool_diagnostics(&self) -> PoolDiagnostics {
		self.pool.diagnostics()
	}
	/// Run up to the iteration cap of search work. Call once per frame until
	/// [PathResult::Solved] or [PathResult::Failed] is reported
	pub fn update(&mut self, graph: &Graph, tiles: &impl TileProvider) -> PathResult {
		let (Some(source), Some(destination)) = (self.source, self.destination) else {
			return PathResult::NotStarted;
		};
		// unreachable by construction, no iterations consumed
		if !graph.is_passable(destination, None, tiles) {
			return PathResult::Failed;
		}
		if !graph.is_passable(source, None, tiles) {
			return PathResult::Failed;
		}
		// the world may have mutated under the current best chain
		if !self.invalidated {
			let mut cursor = self.best;
			while let Some(handle) = cursor {
				let Some(record) = self.pool.get(handle) else {
					break;
				};
				if !graph.is_passable(record.node, None, tiles) {
					self.invalidated = true;
					break;
				}
				cursor = record.previous;
			}
		}
		if self.invalidated {
			self.reset_session();
			let source_position = match graph.node(source) {
				Some(node) => node.position(),
				None => return PathResult::Failed,
			};
			let destination_position = match graph.node(destination) {
				Some(node) => node.position(),
				None => return PathResult::Failed,
			};
			let cost_to_end = octile_distance(source_position, destination_position);
			let seed = match self.pool.acquire(PathNode {
				node: source,
				previous: None,
				cost_from_start: 0.0,
				cost_to_end,
				final_cost: cost_to_end,
				reached: false,
				path_solved: false,
			}) {
				Ok(seed) => seed,
				Err(e) => {
					error!("Path pool exhausted seeding a search: {}", e);
					return PathResult::Failed;
				}
			};
			self.open.push(seed);
			self.best = Some(seed);
			self.invalidated = false;
		}
		if self.solved {
			return PathResult::Solved;
		}
		for _ in 0..self.iteration_cap {
			if self.open.is_empty() {
				return PathResult::Failed;
			}
			// left-to-right scan selecting any entry with F <= current best;
			// this exact tie-break keeps expansion deterministic
			let mut best_index = 0;
			let mut best_final_cost = match self.pool.get(self.open[0]) {
				Some(record) => record.final_cost,
				None => f32::MAX,
			};
			for (index, handle) in self.open.iter().enumerate().skip(1) {
				if let Some(record) = self.pool.get(*handle) {
					if record.final_cost <= best_final_cost {
						best_final_cost = record.final_cost;
						best_index = index;
					}
				}
			}
			// preserve scan order for the remaining entries
			let current = self.open.remove(best_index);
			self.closed.push(current);
			let (current_node, current_cost_from_start, current_cost_to_end) =
				match self.pool.get(current) {
					Some(record) => (record.node, record.cost_from_start, record.cost_to_end),
					None => continue,
				};
			// track the record closest to the goal for best-effort paths
			let best_cost_to_end = self
				.best
				.and_then(|h| self.pool.get(h))
				.map(|r| r.cost_to_end)
				.unwrap_or(f32::MAX);
			if current_cost_to_end < best_cost_to_end {
				self.best = Some(current);
			}
			if current_node == destination {
				if let Some(record) = self.pool.get_mut(current) {
					record.path_solved = true;
				}
				self.best = Some(current);
				self.solved = true;
				return PathResult::Solved;
			}
			// classic relaxation over passable, non-closed neighbours
			let destination_position = graph
				.node(destination)
				.map(|n| n.position())
				.unwrap_or_default();
			let edges: Vec<(Handle, f32)> = graph.edges_of(current_node).collect();
			for (target, edge_cost) in edges {
				if !graph.is_passable(target, Some(current_node), tiles) {
					continue;
				}
				let target_position = match graph.node(target) {
					Some(node) => node.position(),
					None => continue,
				};
				if let Some(bounds) = self.bounds {
					if !bounds.contains(target_position) {
						continue;
					}
				}
				if self
					.closed
					.iter()
					.any(|h| self.pool.get(*h).map(|r| r.node) == Some(target))
				{
					continue;
				}
				let tentative = current_cost_from_start + edge_cost;
				let existing = self
					.open
					.iter()
					.find(|h| self.pool.get(**h).map(|r| r.node) == Some(target))
					.copied();
				match existing {
					Some(existing) => {
						if let Some(record) = self.pool.get_mut(existing) {
							if tentative < record.cost_from_start {
								record.cost_from_start = tentative;
								record.final_cost = tentative + record.cost_to_end;
								record.previous = Some(current);
							}
						}
					}
					None => {
						let cost_to_end = octile_distance(target_position, destination_position);
						match self.pool.acquire(PathNode {
							node: target,
							previous: Some(current),
							cost_from_start: tentative,
							cost_to_end,
							final_cost: tentative + cost_to_end,
							reached: false,
							path_solved: false,
						}) {
							Ok(handle) => self.open.push(handle),
							Err(e) => {
								error!("Path pool exhausted mid-search: {}", e);
								return PathResult::Failed;
							}
						}
					}
				}
			}
		}
		// cap exhausted with the open list still populated - the session
		// resumes on the next call
		PathResult::NotStarted
	}
	/// Return every outstanding session record to the pool and clear the
	/// open/closed sets
	fn reset_session(&mut self) {
		for handle in self.open.drain(..) {
			self.pool.release(handle);
		}
		for handle in self.closed.drain(..) {
			self.pool.release(handle);
		}
		self.best = None;
		self.solved = false;
		self.invalidated = true;
	}
	/// Drive the session to a conclusion in one call. Used for offline work
	/// such as intra-cluster linking where time slicing is unnecessary
	pub(crate) fn solve(&mut self, graph: &Graph, tiles: &impl TileProvider) -> PathResult {
		loop {
			match self.update(graph, tiles) {
				PathResult::Solved => return PathResult::Solved,
				PathResult::Failed => return PathResult::Failed,
				PathResult::NotStarted => {
					// a set source and destination plus a populated open list
					// always terminates; an unset endpoint never will
					if self.source.is_none() || self.destination.is_none() {
						return PathResult::NotStarted;
					}
				}
			}
		}
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// Flat graph over an all-empty 3x3 map of 16x16 tiles
	fn flat_3x3() -> (TileMap, Graph, std::collections::BTreeMap<TileCoords, Handle>) {
		let map = TileMap::new(3, 3, 16.0, 16.0);
		let (graph, lookup) = Graph::from_tile_map(&map).unwrap();
		(map, graph, lookup)
	}
	#[test]
	fn unset_endpoints_report_not_started() {
		let (map, graph, lookup) = flat_3x3();
		let mut planner = AStarPlanner::default();
		assert_eq!(PathResult::NotStarted, planner.update(&graph, &map));
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		assert_eq!(PathResult::NotStarted, planner.update(&graph, &map));
	}
	#[test]
	fn open_grid_diagonal_shortcut() {
		// all-empty 3x3, source (0,0) destination (2,2): the solve is a
		// 3 node diagonal chain costing two diagonal steps
		let (map, graph, lookup) = flat_3x3();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 2)]);
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		let chain = planner.best_chain();
		assert_eq!(3, chain.len());
		let record = planner.path_node(planner.current_best().unwrap()).unwrap();
		let expected = 2.0 * 16.0 * DIAGONAL_COST;
		assert!((record.cost_from_start() - expected).abs() < 0.01);
		assert!(record.is_path_solved());
	}
	#[test]
	fn solid_destination_fails_immediately() {
		let (mut map, graph, lookup) = flat_3x3();
		map.set_tile_kind(TileCoords::new(2, 2), TileKind::Solid);
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 2)]);
		assert_eq!(PathResult::Failed, planner.update(&graph, &map));
		// no iterations were consumed - the pool is untouched
		let diagnostics = planner.pool_diagnostics();
		assert_eq!(diagnostics.capacity, diagnostics.free);
	}
	#[test]
	fn solid_source_fails_immediately() {
		let (mut map, graph, lookup) = flat_3x3();
		map.set_tile_kind(TileCoords::new(0, 0), TileKind::Solid);
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 2)]);
		assert_eq!(PathResult::Failed, planner.update(&graph, &map));
	}
	#[test]
	fn blocked_centre_detours_without_corner_cut() {
		//  _________
		// |s_|__|__|
		// |__|x_|__|
		// |__|__|d_|
		// the centre block also forbids the diagonals that graze it, so the
		// best route is four orthogonal steps around the block
		let mut map = TileMap::new(3, 3, 16.0, 16.0);
		map.set_tile_kind(TileCoords::new(1, 1), TileKind::Solid);
		let (graph, lookup) = Graph::from_tile_map(&map).unwrap();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 2)]);
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		let chain = planner.best_chain();
		assert_eq!(5, chain.len());
		let centre = lookup[&TileCoords::new(1, 1)];
		assert!(!chain.contains(&centre));
		// no consecutive pair forms a diagonal cutting the solid corner
		for pair in chain.windows(2) {
			assert!(graph.is_passable(pair[0], Some(pair[1]), &map));
		}
	}
	#[test]
	fn walled_off_destination_exhausts_open_list() {
		//  _________
		// |s_|x_|d_|
		// |__|x_|__|
		// |__|x_|__|
		let mut map = TileMap::new(3, 3, 16.0, 16.0);
		map.set_tile_kind(TileCoords::new(1, 0), TileKind::Solid);
		map.set_tile_kind(TileCoords::new(1, 1), TileKind::Solid);
		map.set_tile_kind(TileCoords::new(1, 2), TileKind::Solid);
		let (graph, lookup) = Graph::from_tile_map(&map).unwrap();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 0)]);
		assert_eq!(PathResult::Failed, planner.update(&graph, &map));
	}
	#[test]
	fn solved_result_is_idempotent() {
		let (map, graph, lookup) = flat_3x3();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 2)]);
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		let first = planner.best_chain();
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		assert_eq!(first, planner.best_chain());
	}
	#[test]
	fn setting_same_endpoints_does_not_invalidate() {
		let (map, graph, lookup) = flat_3x3();
		let mut planner = AStarPlanner::default();
		let source = lookup[&TileCoords::new(0, 0)];
		let destination = lookup[&TileCoords::new(2, 2)];
		planner.set_source(source);
		planner.set_destination(destination);
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		let first = planner.best_chain();
		planner.set_source(source);
		planner.set_destination(destination);
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		assert_eq!(first, planner.best_chain());
	}
	#[test]
	fn blocking_a_solved_path_restarts_the_search() {
		//  _____________
		// |s_|__|__|__|
		// |__|__|__|__|
		// |__|__|__|d_|
		let map = TileMap::new(4, 3, 16.0, 16.0);
		let (graph, lookup) = Graph::from_tile_map(&map).unwrap();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(3, 2)]);
		let mut map = map;
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		let first = planner.best_chain();
		// block a tile on the solved chain
		let blocked_node = first[1];
		let blocked_coords = map
			.dimensions()
			.tile_coords_from_position(graph.node(blocked_node).unwrap().position())
			.unwrap();
		map.set_tile_kind(blocked_coords, TileKind::Solid);
		// the planner notices, restarts and resolves around the block
		let result = planner.update(&graph, &map);
		assert!(result == PathResult::Solved || result == PathResult::NotStarted);
		let result = planner.solve(&graph, &map);
		assert_eq!(PathResult::Solved, result);
		let second = planner.best_chain();
		assert!(!second.contains(&blocked_node));
	}
	#[test]
	fn iteration_cap_slices_a_long_search() {
		// a 12x12 room with the cap forced down to 1 cannot conclude in a
		// single update call but concludes across many
		let map = TileMap::new(12, 12, 16.0, 16.0);
		let (graph, lookup) = Graph::from_tile_map(&map).unwrap();
		let mut planner = AStarPlanner::default();
		planner.set_iteration_cap(1);
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(11, 11)]);
		assert_eq!(PathResult::NotStarted, planner.update(&graph, &map));
		let mut updates = 1;
		loop {
			match planner.update(&graph, &map) {
				PathResult::Solved => break,
				PathResult::NotStarted => updates += 1,
				PathResult::Failed => panic!("open room search cannot fail"),
			}
			assert!(updates < 1000, "search never concluded");
		}
		assert!(updates > 1);
		assert_eq!(12, planner.best_chain().len());
	}
	#[test]
	fn clear_destination_returns_all_capacity() {
		let (map, graph, lookup) = flat_3x3();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 2)]);
		planner.set_iteration_cap(1);
		let _ = planner.update(&graph, &map);
		planner.clear_destination();
		let diagnostics = planner.pool_diagnostics();
		assert_eq!(diagnostics.capacity, diagnostics.free);
		assert_eq!(PathResult::NotStarted, planner.update(&graph, &map));
	}
	#[test]
	fn bounded_search_refuses_to_leave_the_rectangle() {
		// an open map, but the bounds rectangle covers only the 2x2 corner
		// so a destination outside it is unreachable until the clamp lifts
		let map = TileMap::new(4, 3, 16.0, 16.0);
		let (graph, lookup) = Graph::from_tile_map(&map).unwrap();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(3, 2)]);
		planner.set_bounds(Some(Rect::new(0.0, 0.0, 32.0, 32.0)));
		assert_eq!(PathResult::Failed, planner.solve(&graph, &map));
		planner.set_bounds(None);
		assert_eq!(PathResult::Solved, planner.solve(&graph, &map));
	}
	#[test]
	fn equal_cost_tie_break_expands_the_last_scanned_entry() {
		// two midpoints on the same tile give two routes of identical cost,
		// so every F score ties. The open-list scan keeps the entry it meets
		// last, and the source's edge list iterates in reverse link order, so
		// the solved chain must run through the first-linked midpoint. A
		// strict `<` scan (or a heap) would route through the other one
		let map = TileMap::new(3, 3, 16.0, 16.0);
		let mut graph = Graph::new(8, 16, GrowthPolicy::Fail);
		let source = graph
			.add_node(NodeKind::Entrance, Vec2::new(8.0, 8.0), false)
			.unwrap();
		let first = graph
			.add_node(NodeKind::Entrance, Vec2::new(24.0, 8.0), false)
			.unwrap();
		let second = graph
			.add_node(NodeKind::Entrance, Vec2::new(24.0, 8.0), false)
			.unwrap();
		let destination = graph
			.add_node(NodeKind::Entrance, Vec2::new(40.0, 8.0), false)
			.unwrap();
		graph.add_neighbour(source, first, Some(16.0)).unwrap();
		graph.add_neighbour(source, second, Some(16.0)).unwrap();
		graph.add_neighbour(first, destination, Some(16.0)).unwrap();
		graph.add_neighbour(second, destination, Some(16.0)).unwrap();
		let mut planner = AStarPlanner::default();
		planner.set_source(source);
		planner.set_destination(destination);
		assert_eq!(PathResult::Solved, planner.update(&graph, &map));
		assert_eq!(vec![destination, first, source], planner.best_chain());
	}
	#[test]
	fn admissible_cost_lower_bound() {
		// solved cost can never undercut the straight-line distance
		let (map, graph, lookup) = flat_3x3();
		let mut planner = AStarPlanner::default();
		planner.set_source(lookup[&TileCoords::new(0, 0)]);
		planner.set_destination(lookup[&TileCoords::new(2, 1)]);
		assert_eq!(PathResult::Solved, planner.solve(&graph, &map));
		let record = planner.path_node(planner.current_best().unwrap()).unwrap();
		let source_position = graph.node(lookup[&TileCoords::new(0, 0)]).unwrap().position();
		let destination_position =
			graph.node(lookup[&TileCoords::new(2, 1)]).unwrap().position();
		assert!(
			record.cost_from_start() >= source_position.distance(destination_position) - 0.01
		);
	}
}
