// ============================================
// Chunk - Чанк сетки: поле плотности + меш
// ============================================
// Соседи хранятся индексами в массиве ChunkGrid, поле - через Arc,
// чтобы асинхронная триангуляция читала снимок, а редактор писал копию

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ultraviolet::Vec3;

use super::neighbors::ForwardNeighbors;
use super::shape::GridCoord;
use crate::terrain::error::FieldError;
use crate::terrain::field::ScalarField;
use crate::terrain::mesh::ChunkMesh;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Непрозрачный handle чанка для хоста (рендер-объект, результат пикинга)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHandle(u64);

impl ChunkHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Axis-aligned bounding box в мировых координатах
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x < self.max.x
            && point.y >= self.min.y && point.y < self.max.y
            && point.z >= self.min.z && point.z < self.max.z
    }
}

/// Один чанк сетки
#[derive(Debug)]
pub struct Chunk {
    coord: GridCoord,
    index: u32,
    handle: ChunkHandle,
    origin: Vec3,
    size: u32,
    field: Arc<ScalarField>,
    forward: ForwardNeighbors,
    surrounding: Vec<u32>,
    /// Чанк на нижней границе сетки по x, y, z
    low_edges: [bool; 3],
    mesh: ChunkMesh,
    needs_triangulation: bool,
    /// Асинхронная задача в работе
    pub(crate) in_flight: bool,
    /// Повторный запрос пришёл, пока задача была в работе
    pub(crate) deferred: bool,
}

impl Chunk {
    /// Новый чанк с нулевым полем; соседи подключаются сеткой позже
    pub(crate) fn new(coord: GridCoord, index: u32, origin: Vec3, size: u32) -> Self {
        Self {
            coord,
            index,
            handle: ChunkHandle::next(),
            origin,
            size,
            field: Arc::new(ScalarField::new(size)),
            forward: ForwardNeighbors::default(),
            surrounding: Vec::new(),
            low_edges: [coord.x == 0, coord.y == 0, coord.z == 0],
            mesh: ChunkMesh::default(),
            needs_triangulation: true,
            in_flight: false,
            deferred: false,
        }
    }

    pub(crate) fn wire(&mut self, forward: ForwardNeighbors, surrounding: Vec<u32>) {
        self.forward = forward;
        self.surrounding = surrounding;
    }

    #[inline]
    pub fn coord(&self) -> GridCoord {
        self.coord
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn handle(&self) -> ChunkHandle {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Мировая позиция начала чанка (coord * S)
    #[inline]
    pub fn world_position(&self) -> Vec3 {
        self.origin
    }

    pub fn world_bounds(&self) -> Aabb {
        let s = self.size as f32;
        Aabb::new(self.origin, self.origin + Vec3::new(s, s, s))
    }

    #[inline]
    pub fn forward_neighbors(&self) -> &ForwardNeighbors {
        &self.forward
    }

    /// Окружение 3×3×3 (до 26 чанков)
    #[inline]
    pub fn surrounding_neighbors(&self) -> &[u32] {
        &self.surrounding
    }

    #[inline]
    pub fn low_edges(&self) -> [bool; 3] {
        self.low_edges
    }

    #[inline]
    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    /// Снимок поля для фоновой задачи
    #[inline]
    pub(crate) fn field_snapshot(&self) -> Arc<ScalarField> {
        Arc::clone(&self.field)
    }

    /// Изменяемое поле; если снимок читает задача - копия при записи
    #[inline]
    pub(crate) fn field_mut(&mut self) -> &mut ScalarField {
        Arc::make_mut(&mut self.field)
    }

    /// Заменить поле; размер обязан совпадать с S×S×S
    pub fn set_field(&mut self, field: ScalarField) -> Result<(), FieldError> {
        field.validate()?;
        if field.size() != self.size {
            return Err(FieldError::DimensionMismatch { expected: self.size, actual: field.size() });
        }
        self.field = Arc::new(field);
        self.needs_triangulation = true;
        Ok(())
    }

    #[inline]
    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    #[inline]
    pub fn needs_triangulation(&self) -> bool {
        self.needs_triangulation
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.needs_triangulation = true;
    }

    /// Асинхронная триангуляция этого чанка ещё не применена
    #[inline]
    pub fn is_triangulating(&self) -> bool {
        self.in_flight
    }

    /// Поставить новый меш и пометить чанк актуальным
    pub(crate) fn replace_mesh(&mut self, mesh: ChunkMesh) {
        self.mesh = mesh;
        self.needs_triangulation = false;
    }

    /// Убрать меш, поле не трогаем
    pub fn clear(&mut self) {
        self.mesh.clear();
        self.needs_triangulation = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::constants::ISO_LEVEL;

    fn chunk() -> Chunk {
        Chunk::new(GridCoord::new(1, 0, 2), 5, Vec3::new(4.0, 0.0, 8.0), 4)
    }

    #[test]
    fn test_set_field_rejects_wrong_size() {
        let mut c = chunk();
        let before = c.field().clone();
        let err = c.set_field(ScalarField::filled(5, 1.0)).unwrap_err();
        assert_eq!(err, FieldError::DimensionMismatch { expected: 4, actual: 5 });
        assert_eq!(c.field(), &before);

        c.set_field(ScalarField::filled(4, 1.0)).unwrap();
        assert_eq!(c.field().solid_count(ISO_LEVEL), 64);
    }

    #[test]
    fn test_handles_are_unique() {
        let a = chunk();
        let b = chunk();
        assert_ne!(a.handle(), b.handle());
    }

    #[test]
    fn test_bounds_and_low_edges() {
        let c = chunk();
        let bounds = c.world_bounds();
        assert_eq!(bounds.min, Vec3::new(4.0, 0.0, 8.0));
        assert_eq!(bounds.max, Vec3::new(8.0, 4.0, 12.0));
        assert!(bounds.contains(Vec3::new(5.0, 1.0, 9.0)));
        assert!(!bounds.contains(Vec3::new(8.0, 1.0, 9.0)));
        assert_eq!(c.low_edges(), [false, true, false]);
    }

    #[test]
    fn test_field_mut_copies_when_snapshot_alive() {
        let mut c = chunk();
        let snapshot = c.field_snapshot();
        c.field_mut().set(0, 0, 0, 1.0);
        assert_eq!(snapshot.get(0, 0, 0), 0.0);
        assert_eq!(c.field().get(0, 0, 0), 1.0);
    }

    #[test]
    fn test_clear_keeps_field() {
        let mut c = chunk();
        c.field_mut().fill(1.0);
        c.replace_mesh(ChunkMesh { vertices: Vec::new(), indices: vec![0, 0, 0] });
        assert!(!c.needs_triangulation());
        c.clear();
        assert!(c.mesh().is_empty());
        assert!(c.needs_triangulation());
        assert_eq!(c.field().solid_count(ISO_LEVEL), 64);
    }
}
