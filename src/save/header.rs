// ============================================
// Save Header - Заголовок файла сохранения
// ============================================

use serde::{Deserialize, Serialize};

use crate::terrain::error::GridError;
use crate::terrain::grid::GridShape;

/// Магическое число "MCTR" в ASCII
pub const MAGIC_NUMBER: [u8; 4] = [0x4D, 0x43, 0x54, 0x52];

/// Версия формата сохранения
pub const SAVE_VERSION: u32 = 1;

/// Размер заголовка в bincode (байт)
pub const HEADER_SIZE: usize = 32;

/// Заголовок файла сохранения (32 байта)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveHeader {
    /// Магическое число для валидации
    pub magic: [u8; 4],
    /// Версия формата
    pub version: u32,
    /// Сид шума
    pub seed: i32,
    /// W, H, D, S
    pub shape: [u32; 4],
    /// Количество сохранённых полей
    pub field_count: u32,
}

impl SaveHeader {
    pub fn new(seed: i32, shape: GridShape, field_count: u32) -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: SAVE_VERSION,
            seed,
            shape: [shape.width(), shape.height(), shape.depth(), shape.chunk_size()],
            field_count,
        }
    }

    /// Проверка валидности заголовка
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC_NUMBER && self.version == SAVE_VERSION
    }

    pub fn grid_shape(&self) -> Result<GridShape, GridError> {
        let [w, h, d, s] = self.shape;
        GridShape::new(w as i64, h as i64, d as i64, s as i64)
    }
}

impl Default for SaveHeader {
    fn default() -> Self {
        Self {
            magic: MAGIC_NUMBER,
            version: SAVE_VERSION,
            seed: 0,
            shape: [1, 1, 1, 1],
            field_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size_is_fixed() {
        let size = bincode::serialized_size(&SaveHeader::default()).unwrap();
        assert_eq!(size as usize, HEADER_SIZE);
        let shape = GridShape::new(10, 5, 10, 16).unwrap();
        let header = SaveHeader::new(-77, shape, 500);
        assert_eq!(bincode::serialized_size(&header).unwrap() as usize, HEADER_SIZE);
        assert_eq!(header.grid_shape().unwrap(), shape);
        assert!(header.is_valid());
    }
}
