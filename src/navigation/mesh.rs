//! The [NavigationMesh] ties the layers together: a grid of [Cluster]s over
//! the tile map, an abstract [Graph] of Entrance nodes spanning every
//! cluster border, and a time-sliced [AStarPlanner] answering long-range
//! queries over that abstract graph.
//!
//! Building the mesh walks each cluster's top and left borders only; the
//! symmetric neighbour covers the bottom and right cases from its own walk
//! so every border is processed exactly once. Intra-cluster edges carry the
//! true in-cluster travel cost, computed by a flat search bounded to the
//! cluster's rectangle, never a straight-line guess.
//!
//! When terrain changes, [NavigationMesh::regenerate_cluster] rebuilds just
//! the affected cluster: its entrances are torn down (cascading to any
//! neighbouring entrance left stranded without a cross-border link), all
//! four borders are re-walked and the cluster plus its neighbours are
//! re-linked.
//!

use crate::prelude::*;
use bevy::prelude::*;
use std::collections::BTreeMap;

/// Tuning knobs of a [NavigationMesh]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[derive(Clone, Copy, Debug, Reflect)]
pub struct NavMeshConfig {
	/// Edge length of a cluster in tiles
	pub cluster_resolution: usize,
	/// Border runs wider than this place an entrance pair at each end of the
	/// run instead of a single pair at its midpoint
	pub entrance_split_threshold: usize,
	/// What the mesh's pools do on exhaustion
	#[reflect(ignore)]
	pub growth_policy: GrowthPolicy,
	/// Search iterations the query planner performs per
	/// [NavigationMesh::plan_path] call
	pub iteration_cap: usize,
}

impl NavMeshConfig {
	/// Create a config for clusters of `cluster_resolution x
	/// cluster_resolution` tiles with the split threshold at half the
	/// resolution. Panics if the resolution is zero
	pub fn new(cluster_resolution: usize) -> Self {
		if cluster_resolution == 0 {
			panic!("Cluster resolution must be at least 1");
		}
		NavMeshConfig {
			cluster_resolution,
			entrance_split_threshold: (cluster_resolution / 2).max(1),
			growth_policy: GrowthPolicy::default(),
			iteration_cap: DEFAULT_ITERATION_CAP,
		}
	}
}

impl Default for NavMeshConfig {
	fn default() -> Self {
		NavMeshConfig::new(10)
	}
}

/// Pool capacity counters of a mesh for instrumentation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshDiagnostics {
	/// Abstract graph node pool
	pub nodes: PoolDiagnostics,
	/// Abstract graph edge pool
	pub edges: PoolDiagnostics,
	/// Query planner path node pool
	pub paths: PoolDiagnostics,
}

/// One end of a query, snapped to the abstract graph
#[derive(Clone, Copy, Debug)]
struct QueryEndpoint {
	/// World position the consumer asked for
	position: Vec2,
	/// Node representing the position in the abstract graph, created lazily
	/// on the next [NavigationMesh::plan_path]
	node: Option<Handle>,
	/// Whether `node` is an ad-hoc temporary rather than a reused permanent
	/// Entrance
	temporary: bool,
}

impl QueryEndpoint {
	/// An endpoint awaiting lazy materialisation
	fn pending(position: Vec2) -> Self {
		QueryEndpoint {
			position,
			node: None,
			temporary: false,
		}
	}
}

/// Hierarchical search space over a tile map and the query surface on top
/// of it
#[derive(Component)]
pub struct NavigationMesh {
	/// Tuning knobs the mesh was built with
	config: NavMeshConfig,
	/// Sizing of the underlying tile map
	dimensions: MapDimensions,
	/// Number of cluster columns covering the map
	cluster_columns: usize,
	/// Number of cluster rows covering the map
	cluster_rows: usize,
	/// The cluster grid
	clusters: BTreeMap<ClusterID, Cluster>,
	/// Flat search space, one node per tile, used for bounded in-cluster
	/// cost solves
	tile_graph: Graph,
	/// Tile coordinate lookup into the flat search space
	tile_lookup: BTreeMap<TileCoords, Handle>,
	/// Abstract search space of Entrance nodes plus any temporary query
	/// endpoints
	graph: Graph,
	/// Owning cluster of every permanent Entrance node
	node_owners: BTreeMap<Handle, ClusterID>,
	/// Tile coordinate lookup of every permanent Entrance node
	entrance_lookup: BTreeMap<TileCoords, Handle>,
	/// Planner answering hierarchical queries over the abstract graph
	planner: AStarPlanner,
	/// Planner reused for bounded in-cluster cost solves over the flat
	/// graph
	linker: AStarPlanner,
	/// Where the active query starts
	source: Option<QueryEndpoint>,
	/// Where the active query ends
	destination: Option<QueryEndpoint>,
}

impl NavigationMesh {
	/// Build the full mesh over `tiles`: allocate the cluster grid, walk
	/// every cluster's top and left borders for entrances, then link each
	/// cluster's entrances with true in-cluster costs
	pub fn new(config: NavMeshConfig, tiles: &impl TileProvider) -> Result<Self, PoolError> {
		let dimensions = *tiles.dimensions();
		let resolution = config.cluster_resolution;
		let cluster_columns = dimensions.get_columns().div_ceil(resolution);
		let cluster_rows = dimensions.get_rows().div_ceil(resolution);
		let (tile_graph, tile_lookup) = Graph::from_tile_map(tiles)?;
		let mut linker = AStarPlanner::new(PATH_POOL_CAPACITY, config.growth_policy);
		linker.set_iteration_cap(usize::MAX);
		let mut planner = AStarPlanner::new(PATH_POOL_CAPACITY, config.growth_policy);
		planner.set_iteration_cap(config.iteration_cap);
		let mut mesh = NavigationMesh {
			config,
			dimensions,
			cluster_columns,
			cluster_rows,
			clusters: BTreeMap::new(),
			tile_graph,
			tile_lookup,
			graph: Graph::new(NODE_POOL_CAPACITY, EDGE_POOL_CAPACITY, config.growth_policy),
			node_owners: BTreeMap::new(),
			entrance_lookup: BTreeMap::new(),
			planner,
			linker,
			source: None,
			destination: None,
		};
		// row-major creation so the north and west neighbours of each
		// cluster always exist before its borders are walked
		for cluster_row in 0..cluster_rows {
			for cluster_column in 0..cluster_columns {
				let id = ClusterID::new(cluster_column, cluster_row);
				let first_tile =
					TileCoords::new(cluster_column * resolution, cluster_row * resolution);
				let last_tile = TileCoords::new(
					((cluster_column + 1) * resolution - 1).min(dimensions.get_columns() - 1),
					((cluster_row + 1) * resolution - 1).min(dimensions.get_rows() - 1),
				);
				let cluster = Cluster::new(id, first_tile, last_tile, &dimensions);
				mesh.clusters.insert(id, cluster);
				for ordinal in [Ordinal::North, Ordinal::West] {
					mesh.walk_border(id, ordinal, tiles)?;
				}
			}
		}
		let ids: Vec<ClusterID> = mesh.clusters.keys().copied().collect();
		for id in ids {
			mesh.link_cluster_internals(id, tiles)?;
		}
		Ok(mesh)
	}
	/// Tuning knobs the mesh was built with
	pub fn config(&self) -> &NavMeshConfig {
		&self.config
	}
	/// Sizing of the underlying tile map
	pub fn dimensions(&self) -> &MapDimensions {
		&self.dimensions
	}
	/// The abstract search space of Entrance nodes
	pub fn graph(&self) -> &Graph {
		&self.graph
	}
	/// Number of cluster `(columns, rows)` covering the map
	pub fn cluster_grid_size(&self) -> (usize, usize) {
		(self.cluster_columns, self.cluster_rows)
	}
	/// Access a cluster by its grid position
	pub fn cluster(&self, id: ClusterID) -> Option<&Cluster> {
		self.clusters.get(&id)
	}
	/// The cluster containing a world position
	pub fn cluster_at(&self, position: Vec2) -> Option<ClusterID> {
		let coords = self.dimensions.tile_coords_from_position(position)?;
		Some(ClusterID::from_tile_coords(coords, self.config.cluster_resolution))
	}
	/// Iterate every cluster
	pub fn iter_clusters(&self) -> impl Iterator<Item = &Cluster> {
		self.clusters.values()
	}
	/// The permanent Entrance node sat on the same tile as `position`, if any
	pub fn find_node_at(&self, position: Vec2) -> Option<Handle> {
		let coords = self.dimensions.tile_coords_from_position(position)?;
		self.entrance_lookup.get(&coords).copied()
	}
	/// The permanent Entrance node nearest to `position`, if the mesh has
	/// any entrances at all
	pub fn find_closest_node(&self, position: Vec2) -> Option<Handle> {
		let mut closest: Option<(Handle, f32)> = None;
		for handle in self.node_owners.keys().copied() {
			let Some(node) = self.graph.node(handle) else {
				continue;
			};
			let distance = node.position().distance_squared(position);
			if closest.map(|(_, best)| distance < best).unwrap_or(true) {
				closest = Some((handle, distance));
			}
		}
		closest.map(|(handle, _)| handle)
	}
	/// Create a temporary query node at `position` and link it to every
	/// Entrance of its cluster with true bounded in-cluster costs. The node
	/// must be handed back via [NavigationMesh::remove_temp_node] once its
	/// query concludes
	pub fn insert_temp_node(
		&mut self,
		position: Vec2,
		tiles: &impl TileProvider,
	) -> Result<Handle, PoolError> {
		let node = self.graph.add_node(NodeKind::Entrance, position, true)?;
		if let Some(id) = self.cluster_at(position) {
			let (bounds, entrances) = match self.clusters.get(&id) {
				Some(cluster) => (cluster.bounds(), cluster.nodes().to_vec()),
				None => return Ok(node),
			};
			for entrance in entrances {
				let entrance_position = match self.graph.node(entrance) {
					Some(n) => n.position(),
					None => continue,
				};
				if let Some(cost) =
					self.intra_cluster_cost(position, entrance_position, bounds, tiles)
				{
					self.graph.add_neighbour(node, entrance, Some(cost))?;
				}
			}
		}
		Ok(node)
	}
	/// Unlink a temporary query node and return its slots to the pools
	pub fn remove_temp_node(&mut self, node: Handle) {
		debug_assert!(
			self.graph.node(node).map(|n| n.is_temporary()).unwrap_or(false),
			"Only temporary nodes may be removed this way: {:?}",
			node
		);
		self.graph.remove_node(node);
	}
	/// Set where the active query starts. A change discards the in-flight
	/// search; setting the same position again is a no-op
	pub fn set_source(&mut self, position: Vec2) {
		if self.source.map(|e| e.position) == Some(position) {
			return;
		}
		if let Some(endpoint) = self.source.take() {
			self.release_endpoint(endpoint);
		}
		self.source = Some(QueryEndpoint::pending(position));
	}
	/// Set where the active query ends. A change discards the in-flight
	/// search; setting the same position again is a no-op
	pub fn set_destination(&mut self, position: Vec2) {
		if self.destination.map(|e| e.position) == Some(position) {
			return;
		}
		if let Some(endpoint) = self.destination.take() {
			self.release_endpoint(endpoint);
		}
		self.destination = Some(QueryEndpoint::pending(position));
	}
	/// Cancel the active query, returning every in-flight search record to
	/// the pools
	pub fn clear_destination(&mut self) {
		self.planner.clear_destination();
		if let Some(endpoint) = self.destination.take() {
			self.release_endpoint(endpoint);
		}
	}
	/// Run one time slice of the hierarchical query. Call once per frame
	/// until [PathResult::Solved] or [PathResult::Failed] is reported
	pub fn plan_path(&mut self, tiles: &impl TileProvider) -> PathResult {
		if self.source.is_none() || self.destination.is_none() {
			return PathResult::NotStarted;
		}
		// materialise endpoints lazily so a burst of set_source calls in
		// one frame costs a single linking pass
		if self.source.map(|e| e.node.is_none()).unwrap_or(false) {
			let position = self.source.map(|e| e.position).unwrap_or_default();
			match self.materialise_endpoint(position, tiles) {
				Some(endpoint) => self.source = Some(endpoint),
				None => return PathResult::Failed,
			}
		}
		if self.destination.map(|e| e.node.is_none()).unwrap_or(false) {
			let position = self.destination.map(|e| e.position).unwrap_or_default();
			match self.materialise_endpoint(position, tiles) {
				Some(endpoint) => self.destination = Some(endpoint),
				None => return PathResult::Failed,
			}
		}
		let (Some(source), Some(destination)) = (
			self.source.and_then(|e| e.node),
			self.destination.and_then(|e| e.node),
		) else {
			return PathResult::Failed;
		};
		// endpoints sharing a cluster may connect directly, which also
		// covers maps small enough to have no entrances at all
		if source != destination && !self.graph.has_neighbour(source, destination) {
			let source_position = self.source.map(|e| e.position).unwrap_or_default();
			let destination_position = self.destination.map(|e| e.position).unwrap_or_default();
			let source_cluster = self.cluster_at(source_position);
			if source_cluster.is_some() && source_cluster == self.cluster_at(destination_position)
			{
				let bounds = source_cluster
					.and_then(|id| self.clusters.get(&id))
					.map(|c| c.bounds());
				if let Some(bounds) = bounds {
					if let Some(cost) = self.intra_cluster_cost(
						source_position,
						destination_position,
						bounds,
						tiles,
					) {
						if self.graph.add_neighbour(source, destination, Some(cost)).is_err() {
							return PathResult::Failed;
						}
					}
				}
			}
		}
		self.planner.set_source(source);
		self.planner.set_destination(destination);
		self.planner.update(&self.graph, tiles)
	}
	/// The best record of the active query, the destination once solved
	pub fn current_best(&self) -> Option<&PathNode> {
		self.planner
			.current_best()
			.and_then(|handle| self.planner.path_node(handle))
	}
	/// World positions of the best chain, ordered destination back to source
	pub fn best_path(&self) -> Vec<Vec2> {
		self.planner
			.best_chain()
			.iter()
			.filter_map(|handle| self.graph.node(*handle).map(|n| n.position()))
			.collect()
	}
	/// Pool capacity counters for instrumentation
	pub fn pool_diagnostics(&self) -> MeshDiagnostics {
		let (nodes, edges) = self.graph.diagnostics();
		MeshDiagnostics {
			nodes,
			edges,
			paths: self.planner.pool_diagnostics(),
		}
	}
	/// Rebuild the cluster containing `position` after a terrain change: its
	/// entrances are removed with an orphan cascade into neighbouring
	/// clusters, all four borders are re-walked and the cluster plus its
	/// orthogonal neighbours are re-linked. Idempotent for unchanged terrain
	pub fn regenerate_cluster(
		&mut self,
		position: Vec2,
		tiles: &impl TileProvider,
	) -> Result<(), PoolError> {
		let Some(id) = self.cluster_at(position) else {
			warn!("Cluster regeneration requested outside the map at {}", position);
			return Ok(());
		};
		// temporary query nodes never survive regeneration
		self.planner.clear_destination();
		if let Some(endpoint) = self.source.take() {
			let position = endpoint.position;
			self.release_endpoint(endpoint);
			self.source = Some(QueryEndpoint::pending(position));
		}
		if let Some(endpoint) = self.destination.take() {
			let position = endpoint.position;
			self.release_endpoint(endpoint);
			self.destination = Some(QueryEndpoint::pending(position));
		}
		// tear down the cluster's entrances, cascading to any neighbouring
		// entrance stranded without a remaining cross-border link
		let doomed = match self.clusters.get_mut(&id) {
			Some(cluster) => cluster.clear_entrances(),
			None => return Ok(()),
		};
		let mut worklist = doomed;
		while let Some(node) = worklist.pop() {
			let neighbours: Vec<Handle> =
				self.graph.edges_of(node).map(|(target, _)| target).collect();
			if let Some(owner) = self.node_owners.remove(&node) {
				if let Some(cluster) = self.clusters.get_mut(&owner) {
					cluster.remove_entrance(node);
				}
			}
			if let Some(coords) = self
				.graph
				.node(node)
				.and_then(|n| self.dimensions.tile_coords_from_position(n.position()))
			{
				self.entrance_lookup.remove(&coords);
			}
			self.graph.remove_node(node);
			for neighbour in neighbours {
				let Some(owner) = self.node_owners.get(&neighbour).copied() else {
					continue;
				};
				let stranded = !self.graph.edges_of(neighbour).any(|(target, _)| {
					self.node_owners
						.get(&target)
						.map(|o| *o != owner)
						.unwrap_or(false)
				});
				if stranded && !worklist.contains(&neighbour) {
					worklist.push(neighbour);
				}
			}
		}
		// all four borders this time; the duplicate guard inside the walk
		// reuses any far-side entrance that survived the cascade
		for ordinal in Ordinal::ORTHOGONALS {
			self.walk_border(id, ordinal, tiles)?;
		}
		self.link_cluster_internals(id, tiles)?;
		for ordinal in Ordinal::ORTHOGONALS {
			if let Some(neighbour) = id.adjacent(ordinal, self.cluster_columns, self.cluster_rows)
			{
				self.link_cluster_internals(neighbour, tiles)?;
			}
		}
		Ok(())
	}
	/// Walk one border of a cluster and synthesize an entrance pair per
	/// opening found, reusing any node already sat on the relevant tile
	fn walk_border(
		&mut self,
		id: ClusterID,
		ordinal: Ordinal,
		tiles: &impl TileProvider,
	) -> Result<(), PoolError> {
		let Some(neighbour_id) = id.adjacent(ordinal, self.cluster_columns, self.cluster_rows)
		else {
			return Ok(());
		};
		let near: Vec<TileCoords> = match self.clusters.get(&id) {
			Some(cluster) => cluster.border_coords(ordinal),
			None => return Ok(()),
		};
		let far: Vec<TileCoords> = near
			.iter()
			.filter_map(|coords| self.dimensions.adjacent_coords(*coords, ordinal))
			.collect();
		if far.len() != near.len() {
			debug_assert!(false, "Border walk escaped the map along {:?} of {:?}", ordinal, id);
			return Ok(());
		}
		let runs = wall_walk_runs(tiles, &near, &far);
		for run in runs {
			for index in entrance_indices(run, self.config.entrance_split_threshold) {
				self.create_entrance_pair(near[index], id, far[index], neighbour_id)?;
			}
		}
		Ok(())
	}
	/// Create (or reuse) the two facing Entrance nodes of one doorway and
	/// link them with distance cost
	fn create_entrance_pair(
		&mut self,
		near_coords: TileCoords,
		near_id: ClusterID,
		far_coords: TileCoords,
		far_id: ClusterID,
	) -> Result<(), PoolError> {
		let near = self.entrance_node_at(near_coords, near_id)?;
		let far = self.entrance_node_at(far_coords, far_id)?;
		self.graph.add_neighbour(near, far, None)?;
		Ok(())
	}
	/// The permanent Entrance node on a tile, created and registered to
	/// `owner` when absent
	fn entrance_node_at(
		&mut self,
		coords: TileCoords,
		owner: ClusterID,
	) -> Result<Handle, PoolError> {
		let position = self.dimensions.position_from_tile_coords(coords);
		if let Some(existing) = self.find_node_at(position) {
			return Ok(existing);
		}
		let node = self.graph.add_node(NodeKind::Entrance, position, false)?;
		self.node_owners.insert(node, owner);
		self.entrance_lookup.insert(coords, node);
		if let Some(cluster) = self.clusters.get_mut(&owner) {
			cluster.add_entrance(node);
		}
		Ok(node)
	}
	/// Link every unlinked pair of a cluster's entrances with the true
	/// shortest in-cluster cost. Pairs with no path inside the cluster stay
	/// disconnected at the abstract level
	fn link_cluster_internals(
		&mut self,
		id: ClusterID,
		tiles: &impl TileProvider,
	) -> Result<(), PoolError> {
		let (bounds, nodes) = match self.clusters.get(&id) {
			Some(cluster) => (cluster.bounds(), cluster.nodes().to_vec()),
			None => return Ok(()),
		};
		for i in 0..nodes.len() {
			for j in (i + 1)..nodes.len() {
				let (a, b) = (nodes[i], nodes[j]);
				if self.graph.has_neighbour(a, b) {
					continue;
				}
				let (Some(pa), Some(pb)) = (
					self.graph.node(a).map(|n| n.position()),
					self.graph.node(b).map(|n| n.position()),
				) else {
					continue;
				};
				if let Some(cost) = self.intra_cluster_cost(pa, pb, bounds, tiles) {
					self.graph.add_neighbour(a, b, Some(cost))?;
				}
			}
		}
		Ok(())
	}
	/// True shortest travel cost between two world positions, searched over
	/// the flat graph bounded to `bounds`. [None] when no in-bounds path
	/// exists
	fn intra_cluster_cost(
		&mut self,
		from: Vec2,
		to: Vec2,
		bounds: Rect,
		tiles: &impl TileProvider,
	) -> Option<f32> {
		let from_coords = self.dimensions.tile_coords_from_position(from)?;
		let to_coords = self.dimensions.tile_coords_from_position(to)?;
		let from_node = *self.tile_lookup.get(&from_coords)?;
		let to_node = *self.tile_lookup.get(&to_coords)?;
		self.linker.set_bounds(Some(bounds));
		self.linker.set_source(from_node);
		self.linker.set_destination(to_node);
		match self.linker.solve(&self.tile_graph, tiles) {
			PathResult::Solved => self
				.linker
				.current_best()
				.and_then(|h| self.linker.path_node(h))
				.map(|record| record.cost_from_start()),
			_ => None,
		}
	}
	/// Lazily bind a query endpoint to the abstract graph, reusing a
	/// permanent Entrance when one sits on the same tile
	fn materialise_endpoint(
		&mut self,
		position: Vec2,
		tiles: &impl TileProvider,
	) -> Option<QueryEndpoint> {
		if self.dimensions.tile_coords_from_position(position).is_none() {
			return None;
		}
		if let Some(existing) = self.find_node_at(position) {
			return Some(QueryEndpoint {
				position,
				node: Some(existing),
				temporary: false,
			});
		}
		match self.insert_temp_node(position, tiles) {
			Ok(node) => Some(QueryEndpoint {
				position,
				node: Some(node),
				temporary: true,
			}),
			Err(e) => {
				error!("Node pool exhausted materialising a query endpoint: {}", e);
				None
			}
		}
	}
	/// Release an endpoint's temporary node, if it holds one
	fn release_endpoint(&mut self, endpoint: QueryEndpoint) {
		if endpoint.temporary {
			if let Some(node) = endpoint.node {
				self.remove_temp_node(node);
			}
		}
	}
}

// #[rustfmt::skip]
#[cfg(test)]
mod tests {
	use super::*;
	/// Drive a hierarchical query to a conclusion
	fn solve(mesh: &mut NavigationMesh, tiles: &TileMap) -> PathResult {
		for _ in 0..1000 {
			match mesh.plan_path(tiles) {
				PathResult::NotStarted => continue,
				conclusion => return conclusion,
			}
		}
		panic!("query never concluded");
	}
	/// Sorted tile coordinates of every permanent entrance plus the sorted
	/// cost list of the abstract graph, for idempotence comparisons
	fn mesh_fingerprint(mesh: &NavigationMesh) -> (Vec<TileCoords>, Vec<i64>) {
		let mut coords: Vec<TileCoords> = mesh
			.node_owners
			.keys()
			.filter_map(|h| mesh.graph.node(*h))
			.filter_map(|n| mesh.dimensions.tile_coords_from_position(n.position()))
			.collect();
		coords.sort();
		let mut costs: Vec<i64> = mesh
			.node_owners
			.keys()
			.flat_map(|h| mesh.graph.edges_of(*h))
			.map(|(_, cost)| (cost * 1024.0) as i64)
			.collect();
		costs.sort();
		(coords, costs)
	}
	#[test]
	fn open_map_places_split_entrances_on_every_border() {
		// 20x20 empty map, 10 tile clusters: a 2x2 cluster grid with four
		// internal borders. Each fully open border is one run of width 10,
		// wider than the split threshold of 5, so an entrance pair at each
		// end of every border. Pairs landing on the same corner tile from
		// two different borders share a node
		let map = TileMap::new(20, 20, 16.0, 16.0);
		let mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		assert_eq!((2, 2), mesh.cluster_grid_size());
		assert_eq!(12, mesh.graph().node_count());
		for cluster in mesh.iter_clusters() {
			assert_eq!(3, cluster.nodes().len());
		}
	}
	#[test]
	fn narrow_doorway_gets_a_single_midpoint_pair() {
		// 20x10: two clusters side by side, the shared border walled off
		// except a 3 tile doorway at rows 3..=5. One pair at the doorway
		// midpoint row 4
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		for row in 0..10 {
			if !(3..=5).contains(&row) {
				map.set_tile_kind(TileCoords::new(9, row), TileKind::Solid);
			}
		}
		let mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		assert_eq!(2, mesh.graph().node_count());
		let near = mesh.find_node_at(map.dimensions().position_from_tile_coords(TileCoords::new(9, 4)));
		let far = mesh.find_node_at(map.dimensions().position_from_tile_coords(TileCoords::new(10, 4)));
		let (near, far) = (near.unwrap(), far.unwrap());
		assert!(mesh.graph().has_neighbour(near, far));
		// the doorway pair sits one tile width apart
		assert!((mesh.graph().edge_cost(near, far).unwrap() - 16.0).abs() < 0.01);
	}
	#[test]
	fn intra_cluster_edges_carry_true_costs() {
		// a wall inside the left cluster forces a detour between its two
		// border entrances, so the cached cost must exceed straight-line
		//  y=0 ________________________
		//      |         |x           |
		//      |         |x           |
		//      |    _____|x___________|  internal wall x at column 5
		//      |                      |
		//      |______________________|
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		for row in 0..10 {
			if row != 8 {
				map.set_tile_kind(TileCoords::new(9, row), TileKind::Solid);
			}
		}
		for row in 0..7 {
			map.set_tile_kind(TileCoords::new(5, row), TileKind::Solid);
		}
		// entrances of the left cluster: its east doorway at (9, 8) plus
		// nothing else, so link the doorway against a temp node instead
		let mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let mut mesh = mesh;
		mesh.set_source(map.dimensions().position_from_tile_coords(TileCoords::new(0, 0)));
		mesh.set_destination(map.dimensions().position_from_tile_coords(TileCoords::new(19, 0)));
		assert_eq!(PathResult::Solved, solve(&mut mesh, &map));
		let best = mesh.current_best().unwrap();
		// the route must round the internal wall and pass the doorway, far
		// further than the straight line across the top
		let straight = 19.0 * 16.0;
		assert!(best.cost_from_start() > straight);
	}
	#[test]
	fn plan_path_across_clusters() {
		let map = TileMap::new(20, 10, 16.0, 16.0);
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let source = map.dimensions().position_from_tile_coords(TileCoords::new(1, 5));
		let destination = map.dimensions().position_from_tile_coords(TileCoords::new(18, 5));
		mesh.set_source(source);
		mesh.set_destination(destination);
		assert_eq!(PathResult::Solved, solve(&mut mesh, &map));
		let path = mesh.best_path();
		assert!(path.len() >= 2);
		assert_eq!(destination, path[0]);
		assert_eq!(source, *path.last().unwrap());
	}
	#[test]
	fn same_cluster_query_needs_no_entrances() {
		// a single-cluster map has no entrances at all, the endpoints link
		// directly
		let map = TileMap::new(8, 8, 16.0, 16.0);
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		assert_eq!(0, mesh.graph().node_count());
		mesh.set_source(Vec2::new(8.0, 8.0));
		mesh.set_destination(Vec2::new(120.0, 120.0));
		assert_eq!(PathResult::Solved, solve(&mut mesh, &map));
	}
	#[test]
	fn solid_destination_fails() {
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		map.set_tile_kind(TileCoords::new(18, 5), TileKind::Solid);
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		mesh.set_source(map.dimensions().position_from_tile_coords(TileCoords::new(1, 5)));
		mesh.set_destination(map.dimensions().position_from_tile_coords(TileCoords::new(18, 5)));
		assert_eq!(PathResult::Failed, solve(&mut mesh, &map));
	}
	#[test]
	fn temp_nodes_return_their_capacity() {
		let map = TileMap::new(20, 10, 16.0, 16.0);
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let before = mesh.pool_diagnostics();
		let node = mesh.insert_temp_node(Vec2::new(40.0, 40.0), &map).unwrap();
		assert!(mesh.graph().node(node).unwrap().is_temporary());
		assert!(mesh.graph().edge_count_of(node) > 0);
		mesh.remove_temp_node(node);
		assert_eq!(before, mesh.pool_diagnostics());
	}
	#[test]
	fn find_helpers_snap_to_entrances() {
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		for row in 0..10 {
			if row != 4 {
				map.set_tile_kind(TileCoords::new(9, row), TileKind::Solid);
			}
		}
		let mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let doorway = map.dimensions().position_from_tile_coords(TileCoords::new(9, 4));
		assert!(mesh.find_node_at(doorway).is_some());
		assert_eq!(None, mesh.find_node_at(Vec2::new(8.0, 8.0)));
		let closest = mesh.find_closest_node(Vec2::new(8.0, 72.0)).unwrap();
		assert_eq!(Some(closest), mesh.find_node_at(doorway));
	}
	#[test]
	fn find_node_at_tracks_regeneration() {
		// the coordinate index follows entrances through a rebuild: the old
		// doorway lookup misses and the relocated doorway resolves
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		for row in 0..10 {
			if row != 4 {
				map.set_tile_kind(TileCoords::new(9, row), TileKind::Solid);
			}
		}
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let old_doorway = map.dimensions().position_from_tile_coords(TileCoords::new(9, 4));
		assert!(mesh.find_node_at(old_doorway).is_some());
		// move the doorway from row 4 to row 7
		map.set_tile_kind(TileCoords::new(9, 4), TileKind::Solid);
		map.set_tile_kind(TileCoords::new(9, 7), TileKind::Empty);
		mesh.regenerate_cluster(old_doorway, &map).unwrap();
		assert_eq!(None, mesh.find_node_at(old_doorway));
		let new_doorway = map.dimensions().position_from_tile_coords(TileCoords::new(9, 7));
		assert!(mesh.find_node_at(new_doorway).is_some());
	}
	#[test]
	fn regeneration_is_idempotent() {
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		for row in 0..10 {
			if !(3..=5).contains(&row) {
				map.set_tile_kind(TileCoords::new(9, row), TileKind::Solid);
			}
		}
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let probe = Vec2::new(40.0, 40.0);
		mesh.regenerate_cluster(probe, &map).unwrap();
		let first = mesh_fingerprint(&mesh);
		mesh.regenerate_cluster(probe, &map).unwrap();
		let second = mesh_fingerprint(&mesh);
		assert_eq!(first, second);
		// and the entrances match the freshly built mesh
		let fresh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		assert_eq!(mesh_fingerprint(&fresh).0, second.0);
	}
	#[test]
	fn regeneration_notices_a_closed_doorway() {
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		for row in 0..10 {
			if row != 4 {
				map.set_tile_kind(TileCoords::new(9, row), TileKind::Solid);
			}
		}
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let source = map.dimensions().position_from_tile_coords(TileCoords::new(1, 5));
		let destination = map.dimensions().position_from_tile_coords(TileCoords::new(18, 5));
		mesh.set_source(source);
		mesh.set_destination(destination);
		assert_eq!(PathResult::Solved, solve(&mut mesh, &map));
		// brick up the doorway and rebuild its cluster
		let doorway = TileCoords::new(9, 4);
		map.set_tile_kind(doorway, TileKind::Solid);
		let doorway_position = map.dimensions().position_from_tile_coords(doorway);
		mesh.regenerate_cluster(doorway_position, &map).unwrap();
		// the doorway pair is gone, the far-side partner cascaded with it
		assert_eq!(0, mesh.graph().node_count());
		assert_eq!(PathResult::Failed, solve(&mut mesh, &map));
	}
	#[test]
	fn regeneration_notices_a_new_doorway() {
		let mut map = TileMap::new(20, 10, 16.0, 16.0);
		for row in 0..10 {
			map.set_tile_kind(TileCoords::new(9, row), TileKind::Solid);
		}
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		assert_eq!(0, mesh.graph().node_count());
		let source = map.dimensions().position_from_tile_coords(TileCoords::new(1, 5));
		let destination = map.dimensions().position_from_tile_coords(TileCoords::new(18, 5));
		mesh.set_source(source);
		mesh.set_destination(destination);
		assert_eq!(PathResult::Failed, solve(&mut mesh, &map));
		// knock a doorway through and rebuild
		let doorway = TileCoords::new(9, 4);
		map.set_tile_kind(doorway, TileKind::Empty);
		mesh.regenerate_cluster(map.dimensions().position_from_tile_coords(doorway), &map)
			.unwrap();
		assert_eq!(2, mesh.graph().node_count());
		mesh.set_source(source);
		mesh.set_destination(destination);
		assert_eq!(PathResult::Solved, solve(&mut mesh, &map));
	}
	#[test]
	fn clear_destination_releases_query_state() {
		let map = TileMap::new(20, 10, 16.0, 16.0);
		let mut mesh = NavigationMesh::new(NavMeshConfig::default(), &map).unwrap();
		let baseline = mesh.pool_diagnostics();
		mesh.set_source(Vec2::new(24.0, 24.0));
		mesh.set_destination(Vec2::new(296.0, 136.0));
		assert_eq!(PathResult::Solved, solve(&mut mesh, &map));
		mesh.clear_destination();
		mesh.set_source(Vec2::new(24.0, 24.0));
		// only the source endpoint remains materialised
		let after = mesh.pool_diagnostics();
		assert_eq!(baseline.paths, after.paths);
		assert_eq!(baseline.nodes.free - 1, after.nodes.free);
		assert_eq!(PathResult::NotStarted, mesh.plan_path(&map));
	}
}
