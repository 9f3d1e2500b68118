// ============================================
// Terrain Constants - Константы terrain
// ============================================

/// Порог изоповерхности: плотность >= ISO_LEVEL считается твёрдой
pub const ISO_LEVEL: f32 = 0.5;

/// Плотность пространства за пределами сетки (режим EdgePolicy::Sealed)
pub const EXTERIOR_DENSITY: f32 = 0.0;

/// Размер ребра чанка в сэмплах по умолчанию
pub const DEFAULT_CHUNK_SIZE: u32 = 16;

/// Количество прямых соседей (+x, +y, +z и их комбинации)
pub const FORWARD_NEIGHBOR_COUNT: usize = 7;
