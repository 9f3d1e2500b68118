// ============================================
// Mesh Module - Извлечение поверхности чанков
// ============================================

mod marching_cubes;
mod tables;
mod thread_local;
mod vertex;

pub use marching_cubes::{CubeNeighborhood, EdgePolicy, MarchingCubes, MeshingContext};
pub use thread_local::with_meshing_context;
pub use vertex::{ChunkMesh, TerrainVertex};
