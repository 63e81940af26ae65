//! `use bevy_navmesh_tiles_plugin::prelude::*;` to import common structures and methods
//!

#[doc(hidden)]
pub use crate::navigation::{
	arena::*, cluster::*, graph::*, mesh::*, planner::*, tile::*, *,
};

#[doc(hidden)]
pub use crate::{
	bundle::*,
	plugin::{path_layer::*, tile_layer::*, *},
};
