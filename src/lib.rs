// ============================================
// Planet Terrain - Редактируемый объёмный террейн
// ============================================
// Сетка чанков с полями плотности, marching cubes без швов между
// чанками, скульптинг кистью и фоновая триангуляция

pub mod app;
pub mod config;
pub mod save;
pub mod terrain;

pub use config::TerrainConfig;
pub use terrain::{ChunkGrid, MarchingCubes, ScalarField, TerrainEditor, TriangulationScheduler};
