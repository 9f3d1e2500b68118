// ============================================
// Chunk Grid - Сетка чанков и массовые операции
// ============================================
// Плоский массив чанков в порядке x + y*W + z*W*H. Соседи связываются
// один раз вторым проходом, после того как созданы все чанки

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use ultraviolet::Vec3;

use super::chunk::{Aabb, Chunk, ChunkHandle};
use super::neighbors::{backward_neighbors, surrounding_neighbors, ForwardNeighbors, ForwardOffset};
use super::shape::{GridCoord, GridShape};
use crate::terrain::constants::FORWARD_NEIGHBOR_COUNT;
use crate::terrain::error::{FieldError, GridError, LoadError};
use crate::terrain::field::ScalarField;
use crate::terrain::generation::{FieldSource, GenerationContext};
use crate::terrain::mesh::{CubeNeighborhood, MarchingCubes, MeshingContext};
use crate::terrain::scheduler::{Dispatch, TriangulationScheduler};

/// Разреженное отображение индекс чанка → поле, для сохранения
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedFields {
    pub shape: GridShape,
    pub fields: BTreeMap<u32, ScalarField>,
}

/// Суммарная статистика мешей
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub chunks_with_mesh: usize,
    pub vertices: usize,
    pub indices: usize,
    pub triangles: usize,
    pub memory_bytes: usize,
}

/// Окрестность чанка по живым полям сетки
fn neighborhood_of(chunks: &[Chunk], index: usize) -> CubeNeighborhood<'_> {
    let chunk = &chunks[index];
    let mut neighbors = [None; FORWARD_NEIGHBOR_COUNT];
    for (offset, neighbor) in chunk.forward_neighbors().iter() {
        neighbors[offset.slot()] = neighbor.map(|n| chunks[n as usize].field());
    }
    CubeNeighborhood { field: chunk.field(), neighbors, low_edges: chunk.low_edges() }
}

/// Владелец всех чанков
pub struct ChunkGrid {
    shape: GridShape,
    chunks: Vec<Chunk>,
    extractor: MarchingCubes,
    meshing_ctx: MeshingContext,
}

impl ChunkGrid {
    /// Сетка с экстрактором по умолчанию (τ = 0.5, EdgePolicy::Open)
    pub fn new(shape: GridShape) -> Self {
        Self::with_extractor(shape, MarchingCubes::default())
    }

    /// Проверить размеры и построить сетку
    pub fn from_dims(width: i64, height: i64, depth: i64, chunk_size: i64) -> Result<Self, GridError> {
        Ok(Self::new(GridShape::new(width, height, depth, chunk_size)?))
    }

    pub fn with_extractor(shape: GridShape, extractor: MarchingCubes) -> Self {
        let count = shape.chunk_count();
        let size = shape.chunk_size();

        // Проход 1: все чанки
        let mut chunks: Vec<Chunk> = (0..count)
            .map(|index| {
                let coord = shape.delinearize(index);
                Chunk::new(coord, index, shape.world_origin(coord), size)
            })
            .collect();

        // Проход 2: соседи, все индексы уже существуют
        for chunk in &mut chunks {
            let coord = chunk.coord();
            chunk.wire(ForwardNeighbors::wire(&shape, coord), surrounding_neighbors(&shape, coord));
        }

        log::debug!("[GRID] Создана сетка {} ({} чанков)", shape, count);

        Self { shape, chunks, extractor, meshing_ctx: MeshingContext::new() }
    }

    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[inline]
    pub fn extractor(&self) -> MarchingCubes {
        self.extractor
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn chunk(&self, index: u32) -> Option<&Chunk> {
        self.chunks.get(index as usize)
    }

    #[inline]
    pub fn chunk_mut(&mut self, index: u32) -> Option<&mut Chunk> {
        self.chunks.get_mut(index as usize)
    }

    pub fn chunk_at(&self, coord: GridCoord) -> Option<&Chunk> {
        if !self.shape.contains(coord) {
            return None;
        }
        self.chunk(self.shape.linearize(coord))
    }

    /// Чанк, содержащий мировую точку
    pub fn chunk_at_world(&self, point: Vec3) -> Option<&Chunk> {
        self.shape.coord_at_world(point).and_then(|c| self.chunk_at(c))
    }

    /// Линейный поиск по handle хоста
    pub fn find_by_handle(&self, handle: ChunkHandle) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.handle() == handle)
    }

    /// Заменить поле чанка; None если индекса нет
    pub fn set_field(&mut self, index: u32, field: ScalarField) -> Option<Result<(), FieldError>> {
        self.chunk_mut(index).map(|c| c.set_field(field))
    }

    /// Окрестность для экстрактора: поле чанка + 7 прямых соседей
    pub fn neighborhood(&self, index: u32) -> Option<CubeNeighborhood<'_>> {
        ((index as usize) < self.chunks.len()).then(|| neighborhood_of(&self.chunks, index as usize))
    }

    // ============================================
    // Генерация
    // ============================================

    /// Заполнить все поля источником; чанки независимы, поэтому параллельно
    pub fn generate_fields<S>(&mut self, source: &S)
    where
        S: FieldSource + Sync + ?Sized,
    {
        let start = Instant::now();
        let shape = self.shape;

        self.chunks.par_iter_mut().for_each(|chunk| {
            let ctx = GenerationContext {
                shape,
                coord: chunk.coord(),
                origin: chunk.world_position(),
                size: chunk.size(),
            };
            source.generate(chunk.field_mut(), &ctx);
            chunk.mark_dirty();
        });

        log::info!("[GRID] Генерация полей: {} чанков за {:.2?}", self.chunks.len(), start.elapsed());
    }

    // ============================================
    // Триангуляция
    // ============================================

    /// Синхронная триангуляция одного чанка; false если индекса нет
    pub fn triangulate(&mut self, index: u32) -> bool {
        let i = index as usize;
        if i >= self.chunks.len() {
            return false;
        }
        let mesh = self.extractor.extract_with_context(&neighborhood_of(&self.chunks, i), &mut self.meshing_ctx);
        log::trace!("[MESH] Чанк {}: {} треугольников", index, mesh.triangle_count());
        self.chunks[i].replace_mesh(mesh);
        true
    }

    /// Синхронная триангуляция всех чанков в порядке сетки
    pub fn triangulate_all(&mut self) {
        let start = Instant::now();
        for index in 0..self.chunks.len() as u32 {
            self.triangulate(index);
        }
        let stats = self.mesh_stats();
        log::info!(
            "[GRID] Триангуляция: {} чанков, {} треугольников за {:.2?}",
            self.chunks.len(),
            stats.triangles,
            start.elapsed()
        );
    }

    /// Перестроить только помеченные чанки
    pub fn triangulate_dirty(&mut self) -> usize {
        let dirty: Vec<u32> = self.chunks.iter().filter(|c| c.needs_triangulation()).map(|c| c.index()).collect();
        for &index in &dirty {
            self.triangulate(index);
        }
        dirty.len()
    }

    /// Асинхронная триангуляция одного чанка
    pub fn triangulate_async(&mut self, scheduler: &mut TriangulationScheduler, index: u32) -> Option<Dispatch> {
        scheduler.request(self, index)
    }

    /// Поставить в очередь все чанки; не блокирует
    pub fn triangulate_all_async(&mut self, scheduler: &mut TriangulationScheduler) {
        for index in 0..self.chunks.len() as u32 {
            scheduler.request(self, index);
        }
        log::debug!("[ASYNC] Запрошена триангуляция {} чанков", self.chunks.len());
    }

    pub fn clear_all(&mut self) {
        for chunk in &mut self.chunks {
            chunk.clear();
        }
    }

    /// Поле чанка читает асинхронная задача: его собственная или задача
    /// чанка, для которого он прямой сосед
    pub fn is_field_locked(&self, index: u32) -> bool {
        let Some(chunk) = self.chunk(index) else {
            return false;
        };
        chunk.is_triangulating()
            || backward_neighbors(&self.shape, chunk.coord())
                .into_iter()
                .any(|b| self.chunks[b as usize].is_triangulating())
    }

    // ============================================
    // Сохранение / загрузка
    // ============================================

    /// Все поля сетки для сохранения
    pub fn prepare_for_save(&self) -> PersistedFields {
        let fields = self.chunks.iter().map(|c| (c.index(), c.field().clone())).collect();
        PersistedFields { shape: self.shape, fields }
    }

    /// Применить загруженные поля. Всё проверяется до первой замены:
    /// при ошибке сетка не меняется. Чанки без записи сохраняют поле
    pub fn restore_from_load(&mut self, saved: PersistedFields) -> Result<usize, LoadError> {
        if saved.shape != self.shape {
            return Err(LoadError::ShapeMismatch { expected: self.shape, found: saved.shape });
        }

        let chunk_count = self.shape.chunk_count();
        let size = self.shape.chunk_size();
        for (&index, field) in &saved.fields {
            if index >= chunk_count {
                return Err(LoadError::IndexOutOfRange { index, chunk_count });
            }
            field.validate().map_err(|error| LoadError::Field { index, error })?;
            if field.size() != size {
                let error = FieldError::DimensionMismatch { expected: size, actual: field.size() };
                return Err(LoadError::Field { index, error });
            }
        }

        let restored = saved.fields.len();
        for (index, field) in saved.fields {
            self.chunks[index as usize]
                .set_field(field)
                .map_err(|error| LoadError::Field { index, error })?;
        }

        log::info!("[GRID] Загружено полей: {} из {}", restored, chunk_count);
        Ok(restored)
    }

    // ============================================
    // Диагностика
    // ============================================

    pub fn mesh_stats(&self) -> MeshStats {
        self.chunks.iter().fold(MeshStats::default(), |mut s, c| {
            let mesh = c.mesh();
            if !mesh.is_empty() {
                s.chunks_with_mesh += 1;
            }
            s.vertices += mesh.vertex_count();
            s.indices += mesh.index_count();
            s.triangles += mesh.triangle_count();
            s.memory_bytes += mesh.memory_usage();
            s
        })
    }

    /// Границы всей сетки в мировых координатах
    pub fn world_bounds(&self) -> Aabb {
        Aabb::new(Vec3::zero(), self.shape.world_extent())
    }

    /// Прямой сосед чанка по смещению
    pub fn forward_neighbor(&self, index: u32, offset: ForwardOffset) -> Option<&Chunk> {
        self.chunk(index)?.forward_neighbors().get(offset).and_then(|n| self.chunk(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::constants::ISO_LEVEL;
    use crate::terrain::generation::SphereSource;
    use crate::terrain::mesh::EdgePolicy;

    fn world_vertices(grid: &ChunkGrid, index: u32) -> Vec<Vec3> {
        let chunk = grid.chunk(index).unwrap();
        chunk
            .mesh()
            .vertices
            .iter()
            .map(|v| chunk.world_position() + Vec3::from(v.position))
            .collect()
    }

    #[test]
    fn test_invalid_shape_is_fatal() {
        assert!(ChunkGrid::from_dims(2, 0, 2, 4).is_err());
        assert!(ChunkGrid::from_dims(2, 2, 2, -4).is_err());
    }

    #[test]
    fn test_grid_wiring() {
        let grid = ChunkGrid::from_dims(3, 2, 2, 4).unwrap();
        assert_eq!(grid.len(), 12);
        for (i, chunk) in grid.chunks().iter().enumerate() {
            assert_eq!(chunk.index() as usize, i);
            assert_eq!(grid.shape().linearize(chunk.coord()), chunk.index());
            for (_, n) in chunk.forward_neighbors().iter() {
                if let Some(n) = n {
                    assert!((n as usize) < grid.len());
                }
            }
        }
        let first = grid.chunk(0).unwrap();
        assert_eq!(first.forward_neighbors().present(), 7);
        assert_eq!(first.surrounding_neighbors().len(), 7);
        let x_neighbor = grid.forward_neighbor(0, ForwardOffset::X).unwrap();
        assert_eq!(x_neighbor.coord(), GridCoord::new(1, 0, 0));
        assert_eq!(grid.chunk(11).unwrap().forward_neighbors().present(), 0);
    }

    #[test]
    fn test_find_by_handle_and_world_lookup() {
        let grid = ChunkGrid::from_dims(2, 2, 2, 4).unwrap();
        let target = grid.chunk(5).unwrap().handle();
        assert_eq!(grid.find_by_handle(target).map(|c| c.index()), Some(5));

        let other = ChunkGrid::from_dims(1, 1, 1, 4).unwrap();
        assert!(grid.find_by_handle(other.chunk(0).unwrap().handle()).is_none());

        assert_eq!(grid.chunk_at_world(Vec3::new(5.0, 1.0, 6.0)).map(|c| c.index()), Some(5));
        assert!(grid.chunk_at_world(Vec3::new(9.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn test_generate_fields_passes_world_origin() {
        let mut grid = ChunkGrid::from_dims(2, 1, 2, 4).unwrap();
        grid.generate_fields(&|field: &mut ScalarField, ctx: &GenerationContext| {
            field.fill(ctx.origin.x + ctx.origin.z * 10.0);
            assert_eq!(ctx.size, 4);
            assert_eq!(ctx.shape.chunk_count(), 4);
        });
        for chunk in grid.chunks() {
            let expected = chunk.world_position().x + chunk.world_position().z * 10.0;
            assert!(chunk.field().samples().iter().all(|&v| v == expected));
            assert!(chunk.needs_triangulation());
        }
    }

    #[test]
    fn test_triangulate_is_idempotent() {
        let mut grid = ChunkGrid::from_dims(2, 2, 1, 8).unwrap();
        grid.generate_fields(&SphereSource::new(Vec3::new(7.6, 8.3, 4.1), 3.1));
        grid.triangulate_all();
        let before: Vec<_> = grid.chunks().iter().map(|c| c.mesh().clone()).collect();
        assert!(before.iter().any(|m| !m.is_empty()));
        assert!(grid.chunks().iter().all(|c| !c.needs_triangulation()));

        grid.triangulate_all();
        for (chunk, old) in grid.chunks().iter().zip(&before) {
            assert_eq!(chunk.mesh().vertex_bytes(), old.vertex_bytes());
            assert_eq!(chunk.mesh().index_bytes(), old.index_bytes());
        }
    }

    #[test]
    fn test_seam_vertices_match() {
        let s = 8.0;
        let mut grid = ChunkGrid::from_dims(2, 1, 1, 8).unwrap();
        grid.generate_fields(&SphereSource::new(Vec3::new(8.37, 3.41, 3.63), 2.6));
        grid.triangulate_all();

        let on_plane = |vs: Vec<Vec3>| {
            let mut pts: Vec<(f32, f32)> =
                vs.into_iter().filter(|p| (p.x - s).abs() < 1e-6).map(|p| (p.y, p.z)).collect();
            pts.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
            pts
        };
        let a = on_plane(world_vertices(&grid, 0));
        let b = on_plane(world_vertices(&grid, 1));

        assert!(!a.is_empty());
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(&b) {
            assert!((pa.0 - pb.0).abs() < 1e-4 && (pa.1 - pb.1).abs() < 1e-4, "{:?} != {:?}", pa, pb);
        }
    }

    #[test]
    fn test_uniform_solid_grid_has_no_interior_seams() {
        let shape = GridShape::new(2, 2, 2, 4).unwrap();
        let extent = 2.0 * 4.0;

        // Open: за границей сетки ничего нет, внутри всё твёрдое - пусто
        let mut open = ChunkGrid::new(shape);
        open.generate_fields(&|f: &mut ScalarField, _: &GenerationContext| f.fill(1.0));
        open.triangulate_all();
        assert_eq!(open.mesh_stats().triangles, 0);

        // Sealed: только внешняя оболочка
        let mut sealed = ChunkGrid::with_extractor(shape, MarchingCubes::new(ISO_LEVEL, EdgePolicy::Sealed));
        sealed.generate_fields(&|f: &mut ScalarField, _: &GenerationContext| f.fill(1.0));
        sealed.triangulate_all();

        for index in 0..sealed.len() as u32 {
            let vertices = world_vertices(&sealed, index);
            assert!(!vertices.is_empty(), "chunk {} has no outer faces", index);
            for p in vertices {
                let outer = [p.x, p.y, p.z]
                    .iter()
                    .any(|&c| (c + 0.5).abs() < 1e-5 || (c - (extent - 0.5)).abs() < 1e-5);
                assert!(outer, "interior vertex {:?} in chunk {}", p, index);
            }
        }
    }

    #[test]
    fn test_clear_all_keeps_fields() {
        let mut grid = ChunkGrid::from_dims(1, 1, 1, 6).unwrap();
        grid.generate_fields(&SphereSource::new(Vec3::new(2.5, 2.5, 2.5), 1.5));
        grid.triangulate_all();
        assert!(grid.mesh_stats().triangles > 0);
        let field = grid.chunk(0).unwrap().field().clone();

        grid.clear_all();
        assert_eq!(grid.mesh_stats(), MeshStats::default());
        assert_eq!(grid.chunk(0).unwrap().field(), &field);
        assert_eq!(grid.triangulate_dirty(), 1);
        assert!(grid.mesh_stats().triangles > 0);
    }

    #[test]
    fn test_save_restore_round_trip() {
        let mut grid = ChunkGrid::from_dims(2, 1, 1, 4).unwrap();
        grid.generate_fields(&SphereSource::new(Vec3::new(4.1, 1.7, 2.2), 2.0));
        let saved = grid.prepare_for_save();
        assert_eq!(saved.fields.len(), 2);

        let mut fresh = ChunkGrid::from_dims(2, 1, 1, 4).unwrap();
        assert_eq!(fresh.restore_from_load(saved.clone()).unwrap(), 2);
        for (a, b) in grid.chunks().iter().zip(fresh.chunks()) {
            let bits_a: Vec<u32> = a.field().samples().iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u32> = b.field().samples().iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn test_restore_sparse_map_keeps_other_fields() {
        let mut grid = ChunkGrid::from_dims(2, 1, 1, 4).unwrap();
        grid.generate_fields(&|f: &mut ScalarField, _: &GenerationContext| f.fill(0.25));

        let mut fields = BTreeMap::new();
        fields.insert(1, ScalarField::filled(4, 0.75));
        let restored = grid.restore_from_load(PersistedFields { shape: grid.shape(), fields }).unwrap();
        assert_eq!(restored, 1);
        assert!(grid.chunk(0).unwrap().field().samples().iter().all(|&v| v == 0.25));
        assert!(grid.chunk(1).unwrap().field().samples().iter().all(|&v| v == 0.75));
    }

    #[test]
    fn test_restore_rejects_bad_data_without_partial_apply() {
        let mut grid = ChunkGrid::from_dims(2, 1, 1, 4).unwrap();
        let original = grid.prepare_for_save();

        let other_shape = GridShape::new(1, 1, 2, 4).unwrap();
        let err = grid
            .restore_from_load(PersistedFields { shape: other_shape, fields: BTreeMap::new() })
            .unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }));

        let mut fields = BTreeMap::new();
        fields.insert(0, ScalarField::filled(4, 1.0));
        fields.insert(1, ScalarField::filled(3, 1.0));
        let err = grid.restore_from_load(PersistedFields { shape: grid.shape(), fields }).unwrap_err();
        assert_eq!(
            err,
            LoadError::Field { index: 1, error: FieldError::DimensionMismatch { expected: 4, actual: 3 } }
        );

        let mut fields = BTreeMap::new();
        fields.insert(0, ScalarField::filled(4, 1.0));
        fields.insert(7, ScalarField::filled(4, 1.0));
        let err = grid.restore_from_load(PersistedFields { shape: grid.shape(), fields }).unwrap_err();
        assert_eq!(err, LoadError::IndexOutOfRange { index: 7, chunk_count: 2 });

        assert_eq!(grid.prepare_for_save(), original);
    }

    #[test]
    fn test_set_field_through_grid() {
        let mut grid = ChunkGrid::from_dims(1, 1, 1, 4).unwrap();
        assert!(grid.set_field(3, ScalarField::new(4)).is_none());
        assert!(grid.set_field(0, ScalarField::new(5)).unwrap().is_err());
        assert!(grid.set_field(0, ScalarField::filled(4, 1.0)).unwrap().is_ok());
    }

    #[test]
    fn test_world_bounds() {
        let grid = ChunkGrid::from_dims(3, 1, 2, 4).unwrap();
        let bounds = grid.world_bounds();
        assert_eq!(bounds.max, Vec3::new(12.0, 4.0, 8.0));
        assert_eq!(bounds.center(), Vec3::new(6.0, 2.0, 4.0));
    }
}
