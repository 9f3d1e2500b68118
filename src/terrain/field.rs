// ============================================
// Scalar Field - Плотное поле плотности чанка
// ============================================
// S×S×S сэмплов в локальных координатах чанка, x меняется быстрее всего

use serde::{Deserialize, Serialize};

use super::error::FieldError;

/// Поле плотности одного чанка
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    size: u32,
    samples: Vec<f32>,
}

impl ScalarField {
    /// Нулевое поле size³
    pub fn new(size: u32) -> Self {
        Self::filled(size, 0.0)
    }

    /// Поле, заполненное одним значением
    pub fn filled(size: u32, value: f32) -> Self {
        let len = (size as usize).pow(3);
        Self { size, samples: vec![value; len] }
    }

    /// Поле из готового массива сэмплов
    pub fn from_samples(size: u32, samples: Vec<f32>) -> Result<Self, FieldError> {
        let field = Self { size, samples };
        field.validate()?;
        Ok(field)
    }

    /// Проверка инварианта len == size³ (нужна после десериализации)
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.samples.len() != (self.size as usize).pow(3) {
            return Err(FieldError::InvalidLength { size: self.size, len: self.samples.len() });
        }
        Ok(())
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    fn index(&self, x: u32, y: u32, z: u32) -> usize {
        debug_assert!(x < self.size && y < self.size && z < self.size);
        let s = self.size as usize;
        x as usize + y as usize * s + z as usize * s * s
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32, z: u32) -> f32 {
        self.samples[self.index(x, y, z)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, z: u32, value: f32) {
        let idx = self.index(x, y, z);
        self.samples[idx] = value;
    }

    /// Прибавить delta к сэмплу, вернуть (старое, новое) значение
    #[inline]
    pub fn add(&mut self, x: u32, y: u32, z: u32, delta: f32) -> (f32, f32) {
        let idx = self.index(x, y, z);
        let before = self.samples[idx];
        self.samples[idx] = before + delta;
        (before, self.samples[idx])
    }

    /// Сэмпл твёрдый при плотности >= iso
    #[inline]
    pub fn is_solid(&self, x: u32, y: u32, z: u32, iso: f32) -> bool {
        self.get(x, y, z) >= iso
    }

    pub fn fill(&mut self, value: f32) {
        self.samples.fill(value);
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Количество твёрдых сэмплов при пороге iso
    pub fn solid_count(&self, iso: f32) -> usize {
        self.samples.iter().filter(|&&d| d >= iso).count()
    }
}
