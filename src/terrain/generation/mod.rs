// ============================================
// Generation Module - Заполнение полей плотности
// ============================================

pub mod noise;
mod source;
mod sources;

pub use source::{fill_with, FieldSource, GenerationContext};
pub use sources::{NoiseSettings, NoiseTerrainSource, PlanetSource, SphereSource};
