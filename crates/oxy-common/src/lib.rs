#![allow(clippy::too_many_arguments, clippy::needless_range_loop, clippy::manual_range_contains)]

pub mod q_shared;
pub mod bspfile;
pub mod error;
pub mod cmodel;
pub mod pvs;
pub mod trace;
pub mod hullmove;
pub mod cvar;
