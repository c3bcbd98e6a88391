pub mod box_geometry;
pub mod group;
pub mod ids;
pub mod particle;
pub mod system;
pub mod topology;
pub mod virial;
