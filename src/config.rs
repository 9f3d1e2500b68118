// ============================================
// Config - Настройки террейна из JSON
// ============================================

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::terrain::constants::ISO_LEVEL;
use crate::terrain::editor::BrushSettings;
use crate::terrain::generation::NoiseSettings;
use crate::terrain::grid::GridShape;
use crate::terrain::mesh::{EdgePolicy, MarchingCubes};
use crate::terrain::scheduler::SchedulerConfig;

/// Файл сохранения по умолчанию
pub const SAVE_FILE: &str = "terrain.dat";

/// Сид шума для нового мира
pub const DEFAULT_SEED: i32 = 12345;

/// Каким источником заполнять поля
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Рельеф из шума и кривой высоты
    #[default]
    Terrain,
    /// Сферическая планета в центре сетки
    Planet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub shape: GridShape,
    pub iso_level: f32,
    pub edge_policy: EdgePolicy,
    pub source: SourceKind,
    /// Плотность в центре планеты (SourceKind::Planet)
    pub planet_start_height: f32,
    pub noise: NoiseSettings,
    pub brush: BrushSettings,
    pub scheduler: SchedulerConfig,
    pub save_path: PathBuf,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            shape: GridShape::default(),
            iso_level: ISO_LEVEL,
            edge_policy: EdgePolicy::Open,
            source: SourceKind::Terrain,
            planet_start_height: 40.0,
            noise: NoiseSettings::default(),
            brush: BrushSettings::default(),
            scheduler: SchedulerConfig::default(),
            save_path: PathBuf::from(SAVE_FILE),
        }
    }
}

impl TerrainConfig {
    /// Загрузить из JSON строки
    pub fn load_from_json(json: &str) -> Result<Self, String> {
        let config: TerrainConfig =
            serde_json::from_str(json).map_err(|e| format!("Failed to parse JSON: {}", e))?;
        if !config.iso_level.is_finite() {
            return Err(format!("iso_level must be finite, got {}", config.iso_level));
        }
        Ok(config)
    }

    /// Загрузить из файла
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| format!("Failed to read file: {}", e))?;
        Self::load_from_json(&content)
    }

    /// Файл, если он есть и читается, иначе настройки по умолчанию
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("[CONFIG] {} не найден, настройки по умолчанию", path.display());
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("[CONFIG] {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn extractor(&self) -> MarchingCubes {
        MarchingCubes::new(self.iso_level, self.edge_policy)
    }
}
