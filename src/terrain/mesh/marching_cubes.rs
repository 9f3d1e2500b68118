// ============================================
// Marching Cubes - Извлечение изоповерхности чанка
// ============================================
//
// Куб на локальной координате x использует сэмплы x и x+1. Для x+1 == S
// сэмпл берётся из плоскости 0 прямого соседа. Если соседа нет (граница
// сетки), поведение задаёт EdgePolicy:
// - Open: куб не строится, за границей сетки геометрии нет
// - Sealed: за границей пустота (EXTERIOR_DENSITY), на нижних границах
//   сетки добавляется слой кубов на -1, оболочка получается замкнутой
//
// Порядок обхода: z, затем y, затем x (x во внутреннем цикле). Вершины
// сварены по рёбрам решётки и всегда интерполируются от нижнего конца
// ребра, поэтому два соседних чанка получают одинаковые точки на общей грани.

use serde::{Deserialize, Serialize};
use ultraviolet::Vec3;

use super::tables::{CORNER_OFFSETS, EDGE_CONNECTIONS, EDGE_TABLE, TRI_TABLE};
use super::vertex::{ChunkMesh, TerrainVertex};
use crate::terrain::constants::{EXTERIOR_DENSITY, FORWARD_NEIGHBOR_COUNT, ISO_LEVEL};
use crate::terrain::field::ScalarField;
use crate::terrain::grid::ForwardOffset;

/// Что делать с кубами, которым не хватает сэмплов за границей сетки
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    #[default]
    Open,
    Sealed,
}

/// Поле чанка вместе с полями прямых соседей
#[derive(Clone, Copy, Debug)]
pub struct CubeNeighborhood<'a> {
    pub field: &'a ScalarField,
    /// Слоты по ForwardOffset::slot()
    pub neighbors: [Option<&'a ScalarField>; FORWARD_NEIGHBOR_COUNT],
    /// Чанк лежит на нижней границе сетки по осям x, y, z
    pub low_edges: [bool; 3],
}

impl<'a> CubeNeighborhood<'a> {
    /// Одиночный чанк без соседей
    pub fn isolated(field: &'a ScalarField) -> Self {
        Self { field, neighbors: [None; FORWARD_NEIGHBOR_COUNT], low_edges: [true; 3] }
    }

    pub fn with_neighbor(mut self, offset: ForwardOffset, field: &'a ScalarField) -> Self {
        debug_assert_eq!(field.size(), self.field.size());
        self.neighbors[offset.slot()] = Some(field);
        self
    }

    pub fn with_low_edges(mut self, low_edges: [bool; 3]) -> Self {
        self.low_edges = low_edges;
        self
    }

    /// Плотность в точке решётки с координатами в [-1, S]
    #[inline]
    fn sample(&self, x: i32, y: i32, z: i32, policy: EdgePolicy) -> Option<f32> {
        // -1 достижимо только в Sealed на нижней границе сетки
        if x < 0 || y < 0 || z < 0 {
            return Some(EXTERIOR_DENSITY);
        }

        let size = self.field.size() as i32;
        let mask = (x == size) as u8 | ((y == size) as u8) << 1 | ((z == size) as u8) << 2;
        let Some(offset) = ForwardOffset::from_mask(mask) else {
            return Some(self.field.get(x as u32, y as u32, z as u32));
        };

        let lx = if x == size { 0 } else { x as u32 };
        let ly = if y == size { 0 } else { y as u32 };
        let lz = if z == size { 0 } else { z as u32 };

        match (self.neighbors[offset.slot()], policy) {
            (Some(neighbor), _) => Some(neighbor.get(lx, ly, lz)),
            (None, EdgePolicy::Open) => None,
            (None, EdgePolicy::Sealed) => Some(EXTERIOR_DENSITY),
        }
    }
}

/// Переиспользуемые буферы экстрактора
#[derive(Default)]
pub struct MeshingContext {
    /// Индекс вершины на ребре решётки (u32::MAX - ещё нет)
    edge_cache: Vec<u32>,
    normals: Vec<Vec3>,
    vertices: Vec<TerrainVertex>,
    indices: Vec<u32>,
}

impl MeshingContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, lattice_points: usize) {
        self.edge_cache.clear();
        self.edge_cache.resize(lattice_points * 3, u32::MAX);
        self.normals.clear();
        self.vertices.clear();
        self.indices.clear();
    }

    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        let pa = Vec3::from(self.vertices[a as usize].position);
        let pb = Vec3::from(self.vertices[b as usize].position);
        let pc = Vec3::from(self.vertices[c as usize].position);
        // Площадь-взвешенная нормаль грани, смотрит из твёрдого в пустое
        let face = (pb - pa).cross(pc - pa);
        self.normals[a as usize] += face;
        self.normals[b as usize] += face;
        self.normals[c as usize] += face;
        self.indices.extend_from_slice(&[a, b, c]);
    }

    fn take_results(&mut self) -> ChunkMesh {
        for (vertex, normal) in self.vertices.iter_mut().zip(&self.normals) {
            let len = normal.mag();
            let n = if len > f32::EPSILON { *normal / len } else { *normal };
            vertex.normal = [n.x, n.y, n.z];
        }
        ChunkMesh {
            vertices: std::mem::take(&mut self.vertices),
            indices: std::mem::take(&mut self.indices),
        }
    }
}

/// Нижний угол ребра и ось ребра
#[inline]
fn edge_axis(edge: usize) -> (usize, usize, usize) {
    let [c0, c1] = EDGE_CONNECTIONS[edge];
    let (o0, o1) = (CORNER_OFFSETS[c0], CORNER_OFFSETS[c1]);
    let axis = (0..3).find(|&i| o0[i] != o1[i]).unwrap_or(0);
    if o0[axis] < o1[axis] {
        (c0, c1, axis)
    } else {
        (c1, c0, axis)
    }
}

/// Табличный marching cubes с учётом соседних чанков
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarchingCubes {
    iso_level: f32,
    policy: EdgePolicy,
}

impl Default for MarchingCubes {
    fn default() -> Self {
        Self::new(ISO_LEVEL, EdgePolicy::Open)
    }
}

impl MarchingCubes {
    pub fn new(iso_level: f32, policy: EdgePolicy) -> Self {
        Self { iso_level, policy }
    }

    pub fn iso_level(&self) -> f32 {
        self.iso_level
    }

    pub fn policy(&self) -> EdgePolicy {
        self.policy
    }

    pub fn extract(&self, hood: &CubeNeighborhood) -> ChunkMesh {
        let mut ctx = MeshingContext::new();
        self.extract_with_context(hood, &mut ctx)
    }

    /// Zero-allocation вариант с переиспользуемым контекстом
    pub fn extract_with_context(&self, hood: &CubeNeighborhood, ctx: &mut MeshingContext) -> ChunkMesh {
        let size = hood.field.size() as i32;
        let start = |axis: usize| -> i32 {
            if self.policy == EdgePolicy::Sealed && hood.low_edges[axis] { -1 } else { 0 }
        };
        let origin = [start(0), start(1), start(2)];
        let span = [size - origin[0] + 1, size - origin[1] + 1, size - origin[2] + 1];
        ctx.reset((span[0] * span[1] * span[2]) as usize);

        let mut values = [0.0f32; 8];
        for z in origin[2]..size {
            for y in origin[1]..size {
                for x in origin[0]..size {
                    if !self.load_corners(hood, [x, y, z], &mut values) {
                        continue;
                    }

                    let mut cube_index = 0usize;
                    for (i, &v) in values.iter().enumerate() {
                        if v < self.iso_level {
                            cube_index |= 1 << i;
                        }
                    }
                    if EDGE_TABLE[cube_index] == 0 {
                        continue;
                    }

                    for tri in TRI_TABLE[cube_index].chunks_exact(3) {
                        if tri[0] < 0 {
                            break;
                        }
                        let a = self.edge_vertex(ctx, origin, span, [x, y, z], tri[0] as usize, &values);
                        let b = self.edge_vertex(ctx, origin, span, [x, y, z], tri[1] as usize, &values);
                        let c = self.edge_vertex(ctx, origin, span, [x, y, z], tri[2] as usize, &values);
                        ctx.push_triangle(a, b, c);
                    }
                }
            }
        }

        ctx.take_results()
    }

    /// Заполнить 8 значений углов; false если какого-то сэмпла нет
    #[inline]
    fn load_corners(&self, hood: &CubeNeighborhood, cube: [i32; 3], values: &mut [f32; 8]) -> bool {
        for (i, offset) in CORNER_OFFSETS.iter().enumerate() {
            match hood.sample(cube[0] + offset[0], cube[1] + offset[1], cube[2] + offset[2], self.policy) {
                Some(v) => values[i] = v,
                None => return false,
            }
        }
        true
    }

    fn edge_vertex(
        &self,
        ctx: &mut MeshingContext,
        origin: [i32; 3],
        span: [i32; 3],
        cube: [i32; 3],
        edge: usize,
        values: &[f32; 8],
    ) -> u32 {
        let (lower, upper, axis) = edge_axis(edge);
        let offset = CORNER_OFFSETS[lower];
        let p = [cube[0] + offset[0], cube[1] + offset[1], cube[2] + offset[2]];

        let lattice = (p[0] - origin[0]) + (p[1] - origin[1]) * span[0] + (p[2] - origin[2]) * span[0] * span[1];
        let key = lattice as usize * 3 + axis;
        let cached = ctx.edge_cache[key];
        if cached != u32::MAX {
            return cached;
        }

        let (d0, d1) = (values[lower], values[upper]);
        let t = if d1 != d0 { (self.iso_level - d0) / (d1 - d0) } else { 0.5 };
        let mut position = [p[0] as f32, p[1] as f32, p[2] as f32];
        position[axis] += t;

        let index = ctx.vertices.len() as u32;
        ctx.vertices.push(TerrainVertex::new(position, [0.0; 3]));
        ctx.normals.push(Vec3::zero());
        ctx.edge_cache[key] = index;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_field(size: u32, center: [f32; 3], radius: f32) -> ScalarField {
        let mut field = ScalarField::new(size);
        for z in 0..size {
            for y in 0..size {
                for x in 0..size {
                    let d = ((x as f32 - center[0]).powi(2)
                        + (y as f32 - center[1]).powi(2)
                        + (z as f32 - center[2]).powi(2))
                    .sqrt();
                    field.set(x, y, z, ISO_LEVEL + radius - d);
                }
            }
        }
        field
    }

    #[test]
    fn test_uniform_fields_are_empty() {
        let mc = MarchingCubes::default();
        for value in [0.0, 0.49, 0.5, 1.0] {
            let field = ScalarField::filled(6, value);
            assert!(mc.extract(&CubeNeighborhood::isolated(&field)).is_empty());
        }
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let field = sphere_field(8, [3.7, 4.1, 3.3], 2.4);
        let mc = MarchingCubes::default();
        let hood = CubeNeighborhood::isolated(&field);
        let first = mc.extract(&hood);
        let second = mc.extract(&hood);
        assert!(!first.is_empty());
        assert_eq!(first, second);
        assert_eq!(first.vertex_bytes(), second.vertex_bytes());
        assert_eq!(first.index_bytes(), second.index_bytes());

        let mut ctx = MeshingContext::new();
        let third = mc.extract_with_context(&hood, &mut ctx);
        let fourth = mc.extract_with_context(&hood, &mut ctx);
        assert_eq!(first, third);
        assert_eq!(third, fourth);
    }

    #[test]
    fn test_isolated_chunk_stays_inside_its_field() {
        // Сфера упирается в верхние грани поля: кубы на S-1 без соседей пропускаются
        let field = sphere_field(5, [4.2, 4.2, 4.2], 2.3);
        let mesh = MarchingCubes::default().extract(&CubeNeighborhood::isolated(&field));
        for v in &mesh.vertices {
            for c in v.position {
                assert!((0.0..=4.0).contains(&c), "vertex {:?} outside field", v.position);
            }
        }
    }

    #[test]
    fn test_vertices_lie_on_iso_crossings() {
        let field = sphere_field(8, [3.5, 3.6, 3.4], 2.2);
        let mesh = MarchingCubes::default().extract(&CubeNeighborhood::isolated(&field));
        assert!(mesh.triangle_count() > 8);
        for v in &mesh.vertices {
            let [x, y, z] = v.position;
            let d = ((x - 3.5).powi(2) + (y - 3.6).powi(2) + (z - 3.4).powi(2)).sqrt();
            // линейная интерполяция расстояния вдоль ребра даёт небольшую ошибку
            assert!((d - 2.2).abs() < 0.2, "vertex {:?} at distance {}", v.position, d);
        }
    }

    #[test]
    fn test_normals_point_out_of_solid() {
        let center = [3.5, 3.5, 3.5];
        let field = sphere_field(8, center, 2.2);
        let mesh = MarchingCubes::default().extract(&CubeNeighborhood::isolated(&field));
        for v in &mesh.vertices {
            let out = Vec3::new(v.position[0] - center[0], v.position[1] - center[1], v.position[2] - center[2]);
            let n = Vec3::from(v.normal);
            assert!(n.dot(out) > 0.0, "normal {:?} points inward at {:?}", v.normal, v.position);
        }
    }

    #[test]
    fn test_welded_indices_are_valid() {
        let field = sphere_field(8, [3.5, 3.5, 3.5], 2.6);
        let mesh = MarchingCubes::default().extract(&CubeNeighborhood::isolated(&field));
        assert_eq!(mesh.indices.len() % 3, 0);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        // каждая вершина сварена и используется несколькими треугольниками
        assert!(mesh.vertices.len() < mesh.indices.len());
    }

    #[test]
    fn test_sealed_policy_closes_solid_block() {
        let field = ScalarField::filled(4, 1.0);
        let hood = CubeNeighborhood::isolated(&field);

        let open = MarchingCubes::new(ISO_LEVEL, EdgePolicy::Open).extract(&hood);
        assert!(open.is_empty());

        let sealed = MarchingCubes::new(ISO_LEVEL, EdgePolicy::Sealed).extract(&hood);
        assert!(!sealed.is_empty());
        for v in &sealed.vertices {
            let on_shell = v.position.iter().any(|&c| (c + 0.5).abs() < 1e-5 || (c - 3.5).abs() < 1e-5);
            assert!(on_shell, "vertex {:?} is not on the outer shell", v.position);
        }

        // Чанк не на нижней границе: закрываются только верхние грани
        let inner = hood.with_low_edges([false; 3]);
        let upper = MarchingCubes::new(ISO_LEVEL, EdgePolicy::Sealed).extract(&inner);
        assert!(!upper.is_empty());
        assert!(upper.vertices.iter().all(|v| v.position.iter().all(|&c| c >= 0.0)));
    }

    #[test]
    fn test_neighbor_supplies_boundary_samples() {
        // Половина x < 2 твёрдая в чанке A, чанк B целиком пустой:
        // поверхность на x = 1.5 внутри A, граница A/B ничего не добавляет
        let size = 4;
        let mut a = ScalarField::new(size);
        for z in 0..size {
            for y in 0..size {
                for x in 0..2 {
                    a.set(x, y, z, 1.0);
                }
            }
        }
        let b = ScalarField::new(size);
        let hood = CubeNeighborhood::isolated(&a).with_neighbor(ForwardOffset::X, &b);
        let mesh = MarchingCubes::default().extract(&hood);
        assert!(!mesh.is_empty());
        assert!(mesh.vertices.iter().all(|v| (v.position[0] - 1.5).abs() < 1e-6));

        // Если B твёрдый, между x = 3 и плоскостью 0 соседа появляется вторая стенка
        let solid_b = ScalarField::filled(size, 1.0);
        let hood = CubeNeighborhood::isolated(&a).with_neighbor(ForwardOffset::X, &solid_b);
        let mesh = MarchingCubes::default().extract(&hood);
        assert!(mesh.vertices.iter().any(|v| (v.position[0] - 3.5).abs() < 1e-6));
    }
}
