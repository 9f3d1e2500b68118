// ============================================
// Terrain Editor - Скульптинг полей плотности
// ============================================
//
// Кисть меняет сэмплы чанка-источника и его окружения 3×3×3 в радиусе
// от точки попадания. Перестраиваются только чанки, где хотя бы один
// сэмпл сменил класс (твёрдый/пустой) относительно порога экстрактора.
// Сэмплы нижней грани чанка общие с чанками, которые их читают: если
// такой сэмпл изменился, владелец и читатель перестраиваются только вместе.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use ultraviolet::Vec3;

use crate::terrain::curve::{Curve, KeyframeCurve};
use crate::terrain::error::EditError;
use crate::terrain::grid::{Chunk, ChunkGrid, ChunkHandle, ForwardOffset};

/// Направление скульптинга
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SculptMode {
    Add,
    Subtract,
}

impl SculptMode {
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            SculptMode::Add => 1.0,
            SculptMode::Subtract => -1.0,
        }
    }
}

/// Параметры кисти
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushSettings {
    pub radius: f32,
    pub strength: f32,
    /// Сила по t = 1 - 1/(1 + расстояние)
    pub curve: KeyframeCurve,
}

impl Default for BrushSettings {
    fn default() -> Self {
        Self {
            radius: 4.0,
            strength: 0.5,
            curve: KeyframeCurve::linear(0.0, 1.0, 1.0, 0.0),
        }
    }
}

/// Итог одного применения кисти
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditReport {
    /// Чанки, в которых изменился хотя бы один сэмпл
    pub touched: Vec<u32>,
    /// Чанки, где сэмпл пересёк порог
    pub flipped: Vec<u32>,
    /// Перестроенные чанки (flipped + пары по общим граням)
    pub rebuilt: Vec<u32>,
    pub samples_changed: usize,
}

impl EditReport {
    #[inline]
    pub fn needs_triangulation(&self, index: u32) -> bool {
        self.flipped.contains(&index)
    }
}

/// Кратчайшее расстояние от точки до решётки сэмплов чанка
fn distance_to_samples(chunk: &Chunk, point: Vec3) -> f32 {
    let min = chunk.world_position();
    let last = (chunk.size() - 1) as f32;
    let max = min + Vec3::new(last, last, last);
    (point.clamped(min, max) - point).mag()
}

/// Результат кисти для одного чанка
#[derive(Default)]
struct ChunkEdit {
    changed: usize,
    flipped: bool,
    /// Смещения читателей, чьи общие сэмплы (локальная координата 0) изменились
    seam_masks: u8,
}

pub struct TerrainEditor {
    brush: BrushSettings,
}

impl TerrainEditor {
    pub fn new(brush: BrushSettings) -> Self {
        Self { brush }
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    pub fn brush_mut(&mut self) -> &mut BrushSettings {
        &mut self.brush
    }

    /// Применить кисть по результату пикинга хоста. Неизвестный handle - no-op
    pub fn apply(
        &self,
        grid: &mut ChunkGrid,
        handle: ChunkHandle,
        mode: SculptMode,
        point: Vec3,
    ) -> Result<EditReport, EditError> {
        let Some(source) = grid.find_by_handle(handle).map(|c| c.index()) else {
            log::debug!("[EDIT] Чанк с handle {} не найден", handle.raw());
            return Ok(EditReport::default());
        };
        self.apply_to(grid, source, mode, point)
    }

    /// Источник определяется по самой точке; точка вне сетки - no-op
    pub fn apply_at_point(&self, grid: &mut ChunkGrid, mode: SculptMode, point: Vec3) -> Result<EditReport, EditError> {
        match grid.chunk_at_world(point).map(|c| c.index()) {
            Some(source) => self.apply_to(grid, source, mode, point),
            None => Ok(EditReport::default()),
        }
    }

    pub fn apply_to(
        &self,
        grid: &mut ChunkGrid,
        source: u32,
        mode: SculptMode,
        point: Vec3,
    ) -> Result<EditReport, EditError> {
        let brush = &self.brush;
        sculpt(grid, source, mode.sign(), point, brush.radius, brush.strength, &brush.curve)
    }
}

/// Ядро кисти: sign * curve(t) * strength к каждому сэмплу ближе radius
pub fn sculpt<C>(
    grid: &mut ChunkGrid,
    source: u32,
    sign: f32,
    point: Vec3,
    radius: f32,
    strength: f32,
    curve: &C,
) -> Result<EditReport, EditError>
where
    C: Curve + ?Sized,
{
    let start = Instant::now();
    let Some(source_chunk) = grid.chunk(source) else {
        return Ok(EditReport::default());
    };

    let mut candidates = vec![source];
    candidates.extend_from_slice(source_chunk.surrounding_neighbors());
    candidates.retain(|&i| grid.chunk(i).is_some_and(|c| distance_to_samples(c, point) < radius));

    // Ни одно поле под кистью не должно читаться фоновой задачей
    if let Some(&busy) = candidates.iter().find(|&&i| grid.is_field_locked(i)) {
        log::warn!("[EDIT] Чанк {} занят триангуляцией, правка отклонена", busy);
        return Err(EditError::ChunkBusy { index: busy });
    }

    let mut report = EditReport::default();
    let mut rebuild = BTreeSet::new();
    // (владелец, читатель) с изменёнными общими сэмплами
    let mut seams = Vec::new();
    let shape = grid.shape();
    let iso = grid.extractor().iso_level();

    for index in candidates {
        let Some(chunk) = grid.chunk_mut(index) else {
            continue;
        };
        let edit = brush_chunk(chunk, sign, point, radius, strength, iso, curve);
        if edit.changed == 0 {
            continue;
        }
        report.touched.push(index);
        report.samples_changed += edit.changed;

        let coord = chunk.coord();
        for offset in ForwardOffset::ALL {
            if edit.seam_masks & (1 << offset.mask()) == 0 {
                continue;
            }
            let (dx, dy, dz) = offset.delta();
            if let Some(reader) = shape.offset(coord, -dx, -dy, -dz) {
                seams.push((index, shape.linearize(reader)));
            }
        }

        if edit.flipped {
            chunk.mark_dirty();
            report.flipped.push(index);
            rebuild.insert(index);
        }
    }

    // Шов не должен расходиться: пара перестраивается целиком
    loop {
        let before = rebuild.len();
        for &(owner, reader) in &seams {
            if rebuild.contains(&owner) || rebuild.contains(&reader) {
                rebuild.insert(owner);
                rebuild.insert(reader);
            }
        }
        if rebuild.len() == before {
            break;
        }
    }

    for &index in &rebuild {
        grid.triangulate(index);
    }
    report.rebuilt = rebuild.into_iter().collect();

    if !report.touched.is_empty() {
        log::debug!(
            "[EDIT] {} сэмплов в {} чанках, перестроено {} за {:.2?}",
            report.samples_changed,
            report.touched.len(),
            report.rebuilt.len(),
            start.elapsed()
        );
    }
    Ok(report)
}

fn brush_chunk<C>(
    chunk: &mut Chunk,
    sign: f32,
    point: Vec3,
    radius: f32,
    strength: f32,
    iso: f32,
    curve: &C,
) -> ChunkEdit
where
    C: Curve + ?Sized,
{
    let origin = chunk.world_position();
    let size = chunk.size();
    let field = chunk.field_mut();
    let mut edit = ChunkEdit::default();

    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                let p = origin + Vec3::new(x as f32, y as f32, z as f32);
                let delta = (p - point).mag();
                if delta >= radius {
                    continue;
                }
                let t = 1.0 - 1.0 / (1.0 + delta);
                let volume = curve.evaluate(t) * strength * sign;
                if volume == 0.0 {
                    continue;
                }

                let (before, after) = field.add(x, y, z, volume);
                edit.changed += 1;
                if (before >= iso) != (after >= iso) {
                    edit.flipped = true;
                }

                // маска осей, где сэмпл лежит на нижней грани
                let low = (x == 0) as u8 | ((y == 0) as u8) << 1 | ((z == 0) as u8) << 2;
                if low == 0 {
                    continue;
                }
                for offset in ForwardOffset::ALL {
                    if offset.mask() & !low == 0 {
                        edit.seam_masks |= 1 << offset.mask();
                    }
                }
            }
        }
    }
    edit
}
