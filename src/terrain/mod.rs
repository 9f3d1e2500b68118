// ============================================
// Terrain Module - Объёмный террейн из чанков
// ============================================

pub mod constants;
pub mod curve;
pub mod editor;
pub mod error;
pub mod field;
pub mod generation;
pub mod grid;
pub mod mesh;
pub mod scheduler;

// Re-exports
pub use constants::{EXTERIOR_DENSITY, ISO_LEVEL};
pub use curve::{Curve, Keyframe, KeyframeCurve};
pub use editor::{sculpt, BrushSettings, EditReport, SculptMode, TerrainEditor};
pub use error::{EditError, FieldError, GridError, LoadError};
pub use field::ScalarField;
pub use generation::{FieldSource, GenerationContext, NoiseSettings, NoiseTerrainSource, PlanetSource, SphereSource};
pub use grid::{Aabb, Chunk, ChunkGrid, ChunkHandle, GridCoord, GridShape, MeshStats, PersistedFields};
pub use mesh::{ChunkMesh, EdgePolicy, MarchingCubes, TerrainVertex};
pub use scheduler::{Dispatch, SchedulerConfig, TriangulationScheduler};
