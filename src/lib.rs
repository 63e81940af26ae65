//! This is a plugin for the Bevy game engine providing time-sliced
//! hierarchical pathfinding over tile-based maps
//!

pub mod bundle;
pub mod navigation;
pub mod plugin;

pub mod prelude;
