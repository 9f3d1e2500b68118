// ============================================
// Grid Module - Сетка чанков
// ============================================

mod chunk;
mod chunk_grid;
mod neighbors;
mod shape;

pub use chunk::{Aabb, Chunk, ChunkHandle};
pub use chunk_grid::{ChunkGrid, MeshStats, PersistedFields};
pub use neighbors::{backward_neighbors, surrounding_neighbors, ForwardNeighbors, ForwardOffset};
pub use shape::{GridCoord, GridShape};
