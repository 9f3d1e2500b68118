// ============================================
// Grid Shape - Форма сетки и линеаризация координат
// ============================================
// index = x + y*W + z*W*H (x меняется быстрее всего)

use std::fmt;

use ndshape::{RuntimeShape, Shape};
use serde::{Deserialize, Serialize};
use ultraviolet::Vec3;

use crate::terrain::constants::DEFAULT_CHUNK_SIZE;
use crate::terrain::error::GridError;

/// Координата чанка в сетке
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridCoord {
    #[inline]
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn to_array(self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Форма сетки: W×H×D чанков по S сэмплов на ребро
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ShapeDef", into = "ShapeDef")]
pub struct GridShape {
    width: u32,
    height: u32,
    depth: u32,
    chunk_size: u32,
}

/// Сырое представление формы (для JSON/bincode, валидируется при чтении)
#[derive(Serialize, Deserialize)]
struct ShapeDef {
    width: i64,
    height: i64,
    depth: i64,
    chunk_size: i64,
}

impl TryFrom<ShapeDef> for GridShape {
    type Error = GridError;

    fn try_from(def: ShapeDef) -> Result<Self, Self::Error> {
        GridShape::new(def.width, def.height, def.depth, def.chunk_size)
    }
}

impl From<GridShape> for ShapeDef {
    fn from(shape: GridShape) -> Self {
        Self {
            width: shape.width as i64,
            height: shape.height as i64,
            depth: shape.depth as i64,
            chunk_size: shape.chunk_size as i64,
        }
    }
}

impl GridShape {
    /// Создать форму; любая неположительная размерность - фатальная ошибка
    pub fn new(width: i64, height: i64, depth: i64, chunk_size: i64) -> Result<Self, GridError> {
        let invalid = || GridError::InvalidShape { width, height, depth, size: chunk_size };
        let dims = [width, height, depth, chunk_size];
        if dims.iter().any(|&d| d <= 0 || d > u32::MAX as i64) {
            return Err(invalid());
        }
        // Количество чанков должно помещаться в u32 индекс
        if (width as u128) * (height as u128) * (depth as u128) > u32::MAX as u128 {
            return Err(invalid());
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
            depth: depth as u32,
            chunk_size: chunk_size as u32,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 { self.width }

    #[inline]
    pub fn height(&self) -> u32 { self.height }

    #[inline]
    pub fn depth(&self) -> u32 { self.depth }

    #[inline]
    pub fn chunk_size(&self) -> u32 { self.chunk_size }

    #[inline]
    fn nd(&self) -> RuntimeShape<u32, 3> {
        RuntimeShape::<u32, 3>::new([self.width, self.height, self.depth])
    }

    /// W*H*D
    #[inline]
    pub fn chunk_count(&self) -> u32 {
        self.nd().size()
    }

    #[inline]
    pub fn linearize(&self, coord: GridCoord) -> u32 {
        debug_assert!(self.contains(coord));
        self.nd().linearize(coord.to_array())
    }

    #[inline]
    pub fn delinearize(&self, index: u32) -> GridCoord {
        let [x, y, z] = self.nd().delinearize(index);
        GridCoord::new(x, y, z)
    }

    #[inline]
    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x < self.width && coord.y < self.height && coord.z < self.depth
    }

    /// Координата со смещением, None если вышли за сетку
    pub fn offset(&self, coord: GridCoord, dx: i32, dy: i32, dz: i32) -> Option<GridCoord> {
        let x = coord.x as i64 + dx as i64;
        let y = coord.y as i64 + dy as i64;
        let z = coord.z as i64 + dz as i64;
        if x < 0 || y < 0 || z < 0 {
            return None;
        }
        let moved = GridCoord::new(x as u32, y as u32, z as u32);
        self.contains(moved).then_some(moved)
    }

    /// Мировая позиция начала чанка (grid coord * S)
    #[inline]
    pub fn world_origin(&self, coord: GridCoord) -> Vec3 {
        let s = self.chunk_size as f32;
        Vec3::new(coord.x as f32 * s, coord.y as f32 * s, coord.z as f32 * s)
    }

    /// Размер всей сетки в мировых единицах
    #[inline]
    pub fn world_extent(&self) -> Vec3 {
        let s = self.chunk_size as f32;
        Vec3::new(self.width as f32 * s, self.height as f32 * s, self.depth as f32 * s)
    }

    /// Чанк, которому принадлежит мировая точка
    pub fn coord_at_world(&self, point: Vec3) -> Option<GridCoord> {
        let s = self.chunk_size as f32;
        let cx = (point.x / s).floor();
        let cy = (point.y / s).floor();
        let cz = (point.z / s).floor();
        if cx < 0.0 || cy < 0.0 || cz < 0.0 {
            return None;
        }
        let coord = GridCoord::new(cx as u32, cy as u32, cz as u32);
        self.contains(coord).then_some(coord)
    }
}

impl Default for GridShape {
    /// Плоская сетка 10×5×10 чанков
    fn default() -> Self {
        Self { width: 10, height: 5, depth: 10, chunk_size: DEFAULT_CHUNK_SIZE }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}@{}", self.width, self.height, self.depth, self.chunk_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linearize_example() {
        let shape = GridShape::new(3, 2, 2, 4).unwrap();
        assert_eq!(shape.linearize(GridCoord::new(2, 1, 1)), 2 + 1 * 3 + 1 * 3 * 2);
        assert_eq!(shape.linearize(GridCoord::new(2, 1, 1)), 11);
    }

    #[test]
    fn test_linearize_bijection() {
        let shape = GridShape::new(3, 2, 2, 4).unwrap();
        assert_eq!(shape.chunk_count(), 12);

        let mut seen = vec![false; 12];
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..3 {
                    let coord = GridCoord::new(x, y, z);
                    let idx = shape.linearize(coord);
                    assert!(!seen[idx as usize], "index {} hit twice", idx);
                    seen[idx as usize] = true;
                    assert_eq!(shape.delinearize(idx), coord);
                }
            }
        }
        assert!(seen.iter().all(|&s| s));
        for idx in 0..12 {
            assert_eq!(shape.linearize(shape.delinearize(idx)), idx);
        }
    }

    #[test]
    fn test_invalid_shape_rejected() {
        assert!(GridShape::new(0, 1, 1, 4).is_err());
        assert!(GridShape::new(1, -2, 1, 4).is_err());
        assert!(GridShape::new(1, 1, 1, 0).is_err());
        assert!(GridShape::new(1, 1, 1, 1).is_ok());
    }

    #[test]
    fn test_offset_and_world_lookup() {
        let shape = GridShape::new(2, 2, 2, 4).unwrap();
        let origin = GridCoord::new(1, 0, 0);
        assert_eq!(shape.offset(origin, 1, 0, 0), None);
        assert_eq!(shape.offset(origin, -1, 1, 1), Some(GridCoord::new(0, 1, 1)));
        assert_eq!(shape.coord_at_world(Vec3::new(5.5, 0.2, 7.9)), Some(GridCoord::new(1, 0, 1)));
        assert_eq!(shape.coord_at_world(Vec3::new(-0.1, 0.0, 0.0)), None);
        assert_eq!(shape.coord_at_world(Vec3::new(8.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_shape_json_validation() {
        let ok: GridShape = serde_json::from_str(r#"{"width":2,"height":3,"depth":4,"chunk_size":8}"#).unwrap();
        assert_eq!(ok.chunk_count(), 24);
        let bad = serde_json::from_str::<GridShape>(r#"{"width":2,"height":0,"depth":4,"chunk_size":8}"#);
        assert!(bad.is_err());
    }
}
