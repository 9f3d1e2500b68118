// ============================================
// App - Демонстрационный прогон террейна
// ============================================
// Генерация → асинхронная триангуляция → пара правок кистью → сохранение

use std::error::Error;
use std::time::Instant;

use ultraviolet::Vec3;

use crate::config::{SourceKind, TerrainConfig};
use crate::save::{SaveError, WorldFile};
use crate::terrain::editor::{SculptMode, TerrainEditor};
use crate::terrain::generation::{NoiseTerrainSource, PlanetSource};
use crate::terrain::grid::ChunkGrid;
use crate::terrain::scheduler::TriangulationScheduler;

/// Собранный террейн с редактором и планировщиком
pub struct App {
    config: TerrainConfig,
    grid: ChunkGrid,
    editor: TerrainEditor,
    scheduler: TriangulationScheduler,
    seed: i32,
}

impl App {
    pub fn new(config: TerrainConfig) -> Result<Self, Box<dyn Error>> {
        let grid = ChunkGrid::with_extractor(config.shape, config.extractor());
        let editor = TerrainEditor::new(config.brush.clone());
        let scheduler = TriangulationScheduler::new(config.scheduler)?;
        let seed = config.noise.seed;
        Ok(Self { config, grid, editor, scheduler, seed })
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    /// Сгенерировать поля и поверх применить сохранение.
    /// Нет файла - новый мир; битый или чужой файл - ошибка, файл не трогаем
    pub fn generate(&mut self) -> Result<(), SaveError> {
        let mut noise = self.config.noise;

        let loaded = match WorldFile::load(&self.config.save_path) {
            Ok(world) => Some(world),
            Err(e) if e.is_not_found() => {
                log::info!("[SAVE] Новый мир (seed: {})", noise.seed);
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(world) = &loaded {
            noise.seed = world.seed;
        }

        match self.config.source {
            SourceKind::Terrain => self.grid.generate_fields(&NoiseTerrainSource::new(noise)),
            SourceKind::Planet => {
                let planet = PlanetSource::centered(&self.grid.shape(), self.config.planet_start_height, noise);
                self.grid.generate_fields(&planet);
            }
        }

        if let Some(world) = loaded {
            let count = self.grid.restore_from_load(world.fields)?;
            log::info!("[SAVE] Загружен мир из {} ({} полей)", self.config.save_path.display(), count);
        }
        self.seed = noise.seed;
        Ok(())
    }

    /// Триангуляция всей сетки через пул, с ожиданием
    pub fn triangulate(&mut self) {
        let start = Instant::now();
        self.grid.triangulate_all_async(&mut self.scheduler);
        let applied = self.scheduler.wait_idle(&mut self.grid);
        let stats = self.grid.mesh_stats();
        log::info!(
            "[ASYNC] Применено {} мешей: {} треугольников, {} вершин, {:.1} KB за {:.2?}",
            applied,
            stats.triangles,
            stats.vertices,
            stats.memory_bytes as f32 / 1024.0,
            start.elapsed()
        );
    }

    /// Пара правок в центре сетки: добавить и вырезать
    pub fn sculpt_demo(&mut self) {
        let bounds = self.grid.world_bounds();
        let center = bounds.center();
        let points = [
            (SculptMode::Add, center + Vec3::new(0.0, bounds.size().y * 0.1, 0.0)),
            (SculptMode::Subtract, center - Vec3::new(0.0, bounds.size().y * 0.1, 0.0)),
        ];

        for (mode, point) in points {
            match self.editor.apply_at_point(&mut self.grid, mode, point) {
                Ok(report) => log::info!(
                    "[EDIT] {:?} в {:?}: изменено {} сэмплов, перестроено чанков {}",
                    mode,
                    point,
                    report.samples_changed,
                    report.rebuilt.len()
                ),
                Err(e) => log::warn!("[EDIT] {}", e),
            }
        }
    }

    pub fn save(&self) -> Result<(), SaveError> {
        WorldFile::save_grid(&self.config.save_path, self.seed, &self.grid)
    }

    /// Полный прогон
    pub fn run(&mut self) -> Result<(), SaveError> {
        log::info!("[GRID] Сетка {}, политика края {:?}", self.grid.shape(), self.config.edge_policy);
        self.generate()?;
        self.triangulate();
        self.sculpt_demo();
        self.save()
    }
}
