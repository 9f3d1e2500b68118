// ============================================
// Field Source - Колбэк генерации поля чанка
// ============================================

use ultraviolet::Vec3;

use crate::terrain::field::ScalarField;
use crate::terrain::grid::{GridCoord, GridShape};

/// Что знает генератор о чанке, который заполняет
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationContext {
    pub shape: GridShape,
    pub coord: GridCoord,
    /// Мировая позиция сэмпла (0, 0, 0) чанка
    pub origin: Vec3,
    pub size: u32,
}

impl GenerationContext {
    /// Мировая позиция локального сэмпла
    #[inline]
    pub fn world_point(&self, x: u32, y: u32, z: u32) -> Vec3 {
        self.origin + Vec3::new(x as f32, y as f32, z as f32)
    }
}

/// Источник плотности. Вызывается параллельно для разных чанков,
/// поэтому результат должен зависеть только от позиции
pub trait FieldSource {
    fn generate(&self, field: &mut ScalarField, ctx: &GenerationContext);
}

impl<F> FieldSource for F
where
    F: Fn(&mut ScalarField, &GenerationContext),
{
    fn generate(&self, field: &mut ScalarField, ctx: &GenerationContext) {
        self(field, ctx)
    }
}

/// Заполнить поле функцией мировой позиции
pub fn fill_with(field: &mut ScalarField, ctx: &GenerationContext, density: impl Fn(Vec3) -> f32) {
    let size = field.size();
    for z in 0..size {
        for y in 0..size {
            for x in 0..size {
                field.set(x, y, z, density(ctx.world_point(x, y, z)));
            }
        }
    }
}
