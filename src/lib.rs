pub mod geometry_utils;
pub mod streamer_config;
pub mod study_config;
pub mod systems;
pub mod tether_interface;
pub mod tracking;
pub mod transport;

/// Position components (x, y, z) as they appear on the wire
pub type Position3D = [f32; 3];

/// Quaternion components in (x, y, z, w) order, as they appear on the wire
pub type Rotation3D = [f32; 4];
