// ============================================
// Field Sources - Готовые генераторы плотности
// ============================================

use serde::{Deserialize, Serialize};
use ultraviolet::Vec3;

use super::noise::fbm3d;
use super::source::{fill_with, FieldSource, GenerationContext};
use crate::config::DEFAULT_SEED;
use crate::terrain::constants::ISO_LEVEL;
use crate::terrain::curve::{Curve, KeyframeCurve};
use crate::terrain::field::ScalarField;
use crate::terrain::grid::GridShape;

/// Параметры фрактального шума
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub seed: i32,
    pub frequency: f32,
    pub octaves: u32,
    pub lacunarity: f32,
    pub gain: f32,
    pub amplitude: f32,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            frequency: 0.05,
            octaves: 3,
            lacunarity: 2.0,
            gain: 0.5,
            amplitude: 1.0,
        }
    }
}

impl NoiseSettings {
    /// Шум в диапазоне -amplitude..amplitude
    #[inline]
    pub fn sample(&self, p: Vec3) -> f32 {
        let f = self.frequency;
        let n = fbm3d(p.x * f, p.y * f, p.z * f, self.seed, self.octaves, self.lacunarity, self.gain);
        (n * 2.0 - 1.0) * self.amplitude
    }
}

/// Рельеф: |шум| минус кривая высоты по нормированному y
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseTerrainSource {
    pub noise: NoiseSettings,
    pub height_curve: KeyframeCurve,
}

impl NoiseTerrainSource {
    pub fn new(noise: NoiseSettings) -> Self {
        // внизу плотность > 1, наверху < 0
        Self { noise, height_curve: KeyframeCurve::linear(0.0, -1.0, 1.0, 1.0) }
    }

    pub fn with_height_curve(mut self, curve: KeyframeCurve) -> Self {
        self.height_curve = curve;
        self
    }
}

impl FieldSource for NoiseTerrainSource {
    fn generate(&self, field: &mut ScalarField, ctx: &GenerationContext) {
        let world_height = (ctx.shape.height() * ctx.shape.chunk_size()) as f32;
        fill_with(field, ctx, |p| {
            let t = p.y / world_height;
            self.noise.sample(p).abs() - self.height_curve.evaluate(t)
        });
    }
}

/// Планета: плотность спадает линейно от start_height + шум до 0
/// по t = 1 - 1/(1 + d), d - расстояние до центра
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanetSource {
    pub center: Vec3,
    pub start_height: f32,
    pub noise: NoiseSettings,
}

impl PlanetSource {
    /// Центр планеты в центре сетки
    pub fn centered(shape: &GridShape, start_height: f32, noise: NoiseSettings) -> Self {
        Self { center: shape.world_extent() * 0.5, start_height, noise }
    }

    #[inline]
    pub fn density(&self, p: Vec3) -> f32 {
        let d = (self.center - p).mag();
        let t = 1.0 - 1.0 / (1.0 + d);
        let top = self.start_height + self.noise.sample(p);
        top * (1.0 - t)
    }
}

impl FieldSource for PlanetSource {
    fn generate(&self, field: &mut ScalarField, ctx: &GenerationContext) {
        fill_with(field, ctx, |p| self.density(p));
    }
}

/// Гладкая сфера: плотность ISO_LEVEL ровно на радиусе
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereSource {
    pub center: Vec3,
    pub radius: f32,
}

impl SphereSource {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    #[inline]
    pub fn density(&self, p: Vec3) -> f32 {
        ISO_LEVEL + self.radius - (p - self.center).mag()
    }
}

impl FieldSource for SphereSource {
    fn generate(&self, field: &mut ScalarField, ctx: &GenerationContext) {
        fill_with(field, ctx, |p| self.density(p));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::grid::GridCoord;

    fn ctx(shape: GridShape, coord: GridCoord) -> GenerationContext {
        GenerationContext {
            shape,
            coord,
            origin: shape.world_origin(coord),
            size: shape.chunk_size(),
        }
    }

    #[test]
    fn test_sphere_source_uses_world_position() {
        let shape = GridShape::new(2, 1, 1, 4).unwrap();
        let source = SphereSource::new(Vec3::new(5.0, 1.0, 1.0), 1.5);
        let mut field = ScalarField::new(4);
        source.generate(&mut field, &ctx(shape, GridCoord::new(1, 0, 0)));
        // локальный (1,1,1) = мировой (5,1,1) - центр сферы
        assert!((field.get(1, 1, 1) - 2.0).abs() < 1e-6);
        assert!(field.get(3, 3, 3) < ISO_LEVEL);
    }

    #[test]
    fn test_noise_terrain_is_solid_below_empty_above() {
        let shape = GridShape::new(1, 4, 1, 4).unwrap();
        let source = NoiseTerrainSource::new(NoiseSettings::default());

        let mut bottom = ScalarField::new(4);
        source.generate(&mut bottom, &ctx(shape, GridCoord::new(0, 0, 0)));
        assert!(bottom.get(2, 0, 2) >= ISO_LEVEL);

        let mut top = ScalarField::new(4);
        source.generate(&mut top, &ctx(shape, GridCoord::new(0, 3, 0)));
        assert!(top.get(2, 3, 2) < ISO_LEVEL);
    }

    #[test]
    fn test_planet_density_falls_off() {
        let noise = NoiseSettings { amplitude: 0.0, ..NoiseSettings::default() };
        let shape = GridShape::new(2, 2, 2, 8).unwrap();
        let planet = PlanetSource::centered(&shape, 8.0, noise);
        assert_eq!(planet.center, Vec3::new(8.0, 8.0, 8.0));
        assert!((planet.density(planet.center) - 8.0).abs() < 1e-6);
        let near = planet.density(Vec3::new(9.0, 8.0, 8.0));
        let far = planet.density(Vec3::new(40.0, 8.0, 8.0));
        assert!(near > far);
        assert!(far < ISO_LEVEL);
    }
}
