// ============================================
// World File - Чтение/запись файла мира
// ============================================
// [заголовок 32 байта][zstd(bincode(PersistedFields))]
//
// Значения f32 пишутся побитно, загрузка возвращает те же биты

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::terrain::error::{GridError, LoadError};
use crate::terrain::grid::{ChunkGrid, PersistedFields};

use super::header::{SaveHeader, HEADER_SIZE, MAGIC_NUMBER, SAVE_VERSION};

/// Уровень сжатия ZSTD
const COMPRESSION_LEVEL: i32 = 3;

/// Результат загрузки мира
#[derive(Debug)]
pub struct LoadedWorld {
    pub seed: i32,
    pub fields: PersistedFields,
}

/// Ошибки сохранения/загрузки
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Serialize(String),
    Deserialize(String),
    InvalidMagic,
    UnsupportedVersion(u32),
    Compression(String),
    InvalidShape(GridError),
    /// Сохранение не подходит к сетке
    Load(LoadError),
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<GridError> for SaveError {
    fn from(e: GridError) -> Self {
        SaveError::InvalidShape(e)
    }
}

impl From<LoadError> for SaveError {
    fn from(e: LoadError) -> Self {
        SaveError::Load(e)
    }
}

impl SaveError {
    /// Файла нет - это новый мир, а не ошибка
    pub fn is_not_found(&self) -> bool {
        matches!(self, SaveError::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "io error: {}", e),
            SaveError::Serialize(e) => write!(f, "serialize error: {}", e),
            SaveError::Deserialize(e) => write!(f, "deserialize error: {}", e),
            SaveError::InvalidMagic => write!(f, "not a terrain save file"),
            SaveError::UnsupportedVersion(v) => {
                write!(f, "unsupported save version {} (expected {})", v, SAVE_VERSION)
            }
            SaveError::Compression(e) => write!(f, "compression error: {}", e),
            SaveError::InvalidShape(e) => write!(f, "{}", e),
            SaveError::Load(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SaveError::Io(e) => Some(e),
            SaveError::InvalidShape(e) => Some(e),
            SaveError::Load(e) => Some(e),
            _ => None,
        }
    }
}

/// Основной интерфейс для работы с файлом мира
pub struct WorldFile;

impl WorldFile {
    /// Сохранить поля в файл
    pub fn save(path: impl AsRef<Path>, seed: i32, fields: &PersistedFields) -> Result<(), SaveError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // 1. Заголовок
        let header = SaveHeader::new(seed, fields.shape, fields.fields.len() as u32);
        let header_bytes = bincode::serialize(&header).map_err(|e| SaveError::Serialize(e.to_string()))?;
        writer.write_all(&header_bytes)?;

        // 2. Тело: bincode + ZSTD
        let body_bytes = bincode::serialize(fields).map_err(|e| SaveError::Serialize(e.to_string()))?;
        let compressed = zstd::encode_all(&body_bytes[..], COMPRESSION_LEVEL)
            .map_err(|e| SaveError::Compression(e.to_string()))?;
        writer.write_all(&compressed)?;

        writer.flush()?;
        Ok(())
    }

    /// Сохранить все поля сетки
    pub fn save_grid(path: impl AsRef<Path>, seed: i32, grid: &ChunkGrid) -> Result<(), SaveError> {
        let path = path.as_ref();
        let fields = grid.prepare_for_save();
        Self::save(path, seed, &fields)?;
        log::info!("[SAVE] Мир сохранён в {} ({} полей)", path.display(), fields.fields.len());
        Ok(())
    }

    /// Загрузить файл мира
    pub fn load(path: impl AsRef<Path>) -> Result<LoadedWorld, SaveError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        // 1. Заголовок
        let header_size = bincode::serialized_size(&SaveHeader::default()).unwrap_or(HEADER_SIZE as u64) as usize;
        let mut header_bytes = vec![0u8; header_size];
        reader.read_exact(&mut header_bytes)?;

        let header: SaveHeader =
            bincode::deserialize(&header_bytes).map_err(|e| SaveError::Deserialize(e.to_string()))?;

        if !header.is_valid() {
            if header.magic != MAGIC_NUMBER {
                return Err(SaveError::InvalidMagic);
            }
            return Err(SaveError::UnsupportedVersion(header.version));
        }
        let shape = header.grid_shape()?;

        // 2. Тело
        let mut compressed = Vec::new();
        reader.read_to_end(&mut compressed)?;

        let body_bytes = zstd::decode_all(&compressed[..]).map_err(|e| SaveError::Compression(e.to_string()))?;

        let fields: PersistedFields =
            bincode::deserialize(&body_bytes).map_err(|e| SaveError::Deserialize(e.to_string()))?;

        if fields.shape != shape || fields.fields.len() != header.field_count as usize {
            return Err(SaveError::Deserialize(format!(
                "header describes {} fields of {}, body has {} fields of {}",
                header.field_count,
                shape,
                fields.fields.len(),
                fields.shape
            )));
        }

        Ok(LoadedWorld { seed: header.seed, fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::field::ScalarField;
    use crate::terrain::generation::{NoiseSettings, NoiseTerrainSource};
    use crate::terrain::grid::GridShape;
    use std::collections::BTreeMap;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("planet_terrain_{}_{}.dat", name, std::process::id()))
    }

    #[test]
    fn test_save_load_roundtrip() {
        let mut grid = ChunkGrid::from_dims(2, 2, 1, 8).unwrap();
        grid.generate_fields(&NoiseTerrainSource::new(NoiseSettings::default()));

        let path = temp_path("roundtrip");
        WorldFile::save_grid(&path, 4242, &grid).unwrap();
        let loaded = WorldFile::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.seed, 4242);
        assert_eq!(loaded.fields.shape, grid.shape());
        assert_eq!(loaded.fields.fields.len(), 4);
        for chunk in grid.chunks() {
            let saved = &loaded.fields.fields[&chunk.index()];
            let a: Vec<u32> = chunk.field().samples().iter().map(|v| v.to_bits()).collect();
            let b: Vec<u32> = saved.samples().iter().map(|v| v.to_bits()).collect();
            assert_eq!(a, b);
        }

        let mut fresh = ChunkGrid::from_dims(2, 2, 1, 8).unwrap();
        assert_eq!(fresh.restore_from_load(loaded.fields).unwrap(), 4);
        assert_eq!(fresh.prepare_for_save(), grid.prepare_for_save());
    }

    #[test]
    fn test_sparse_map_roundtrip() {
        let shape = GridShape::new(3, 1, 1, 4).unwrap();
        let mut fields = BTreeMap::new();
        fields.insert(2, ScalarField::filled(4, -0.0));
        let persisted = PersistedFields { shape, fields };

        let path = temp_path("sparse");
        WorldFile::save(&path, 1, &persisted).unwrap();
        let loaded = WorldFile::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.fields.fields.len(), 1);
        assert!(loaded.fields.fields[&2].samples().iter().all(|v| v.to_bits() == (-0.0f32).to_bits()));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let path = temp_path("magic");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let result = WorldFile::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(SaveError::InvalidMagic)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut header = SaveHeader::default();
        header.version = SAVE_VERSION + 1;
        let path = temp_path("version");
        std::fs::write(&path, bincode::serialize(&header).unwrap()).unwrap();
        let result = WorldFile::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(SaveError::UnsupportedVersion(v)) if v == SAVE_VERSION + 1));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = WorldFile::load(temp_path("missing"));
        assert!(result.as_ref().is_err_and(|e| e.is_not_found()));

        let path = temp_path("truncated");
        std::fs::write(&path, [0u8; 4]).unwrap();
        let truncated = WorldFile::load(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(&truncated, Err(SaveError::Io(_))));
        assert!(!truncated.is_err_and(|e| e.is_not_found()));
    }
}
