// ============================================
// Terrain Errors - Ошибки terrain
// ============================================

use std::fmt;

use super::grid::GridShape;

/// Ошибка конфигурации сетки
#[derive(Debug, Clone, PartialEq)]
pub enum GridError {
    /// Одна из размерностей (W, H, D, S) не положительная
    InvalidShape { width: i64, height: i64, depth: i64, size: i64 },
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::InvalidShape { width, height, depth, size } => write!(
                f,
                "invalid grid shape {}x{}x{} with chunk size {}: every dimension must be positive",
                width, height, depth, size
            ),
        }
    }
}

impl std::error::Error for GridError {}

/// Ошибка замены скалярного поля
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// Размер поля не совпадает с S×S×S чанка
    DimensionMismatch { expected: u32, actual: u32 },
    /// Длина данных не равна size³
    InvalidLength { size: u32, len: usize },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::DimensionMismatch { expected, actual } => write!(
                f,
                "field is {0}x{0}x{0}, chunk expects {1}x{1}x{1}",
                actual, expected
            ),
            FieldError::InvalidLength { size, len } => {
                write!(f, "field data has {} samples, size {} needs {}", len, size, (*size as usize).pow(3))
            }
        }
    }
}

impl std::error::Error for FieldError {}

/// Ошибка применения загруженных полей к живой сетке
#[derive(Debug, Clone, PartialEq)]
pub enum LoadError {
    /// Форма сохранения не совпадает с формой сетки
    ShapeMismatch { expected: GridShape, found: GridShape },
    /// Индекс чанка за пределами сетки
    IndexOutOfRange { index: u32, chunk_count: u32 },
    /// Поле конкретного чанка некорректно
    Field { index: u32, error: FieldError },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::ShapeMismatch { expected, found } => {
                write!(f, "saved shape {} does not match grid shape {}", found, expected)
            }
            LoadError::IndexOutOfRange { index, chunk_count } => {
                write!(f, "chunk index {} is outside the grid ({} chunks)", index, chunk_count)
            }
            LoadError::Field { index, error } => write!(f, "chunk {}: {}", index, error),
        }
    }
}

impl std::error::Error for LoadError {}

/// Ошибка скульптинга
#[derive(Debug, Clone, PartialEq)]
pub enum EditError {
    /// Поле чанка сейчас читает асинхронная триангуляция
    ChunkBusy { index: u32 },
}

impl fmt::Display for EditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditError::ChunkBusy { index } => {
                write!(f, "chunk {} is being triangulated asynchronously", index)
            }
        }
    }
}

impl std::error::Error for EditError {}
