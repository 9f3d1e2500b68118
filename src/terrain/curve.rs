// ============================================
// Curves - Кривые силы кисти и профиля высоты
// ============================================

use serde::{Deserialize, Serialize};

/// Функция одного аргумента t, обычно t в [0, 1]
pub trait Curve {
    fn evaluate(&self, t: f32) -> f32;
}

impl<F> Curve for F
where
    F: Fn(f32) -> f32,
{
    #[inline]
    fn evaluate(&self, t: f32) -> f32 {
        self(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
}

impl Keyframe {
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Кусочно-линейная кривая по ключам; за крайними ключами значение постоянно
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CurveDef", into = "CurveDef")]
pub struct KeyframeCurve {
    keys: Vec<Keyframe>,
}

/// JSON представление; ключи сортируются при чтении
#[derive(Serialize, Deserialize)]
struct CurveDef {
    keys: Vec<Keyframe>,
}

impl From<CurveDef> for KeyframeCurve {
    fn from(def: CurveDef) -> Self {
        KeyframeCurve::new(def.keys)
    }
}

impl From<KeyframeCurve> for CurveDef {
    fn from(curve: KeyframeCurve) -> Self {
        Self { keys: curve.keys }
    }
}

impl KeyframeCurve {
    /// Ключи сортируются по времени
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Прямая из (t0, v0) в (t1, v1)
    pub fn linear(t0: f32, v0: f32, t1: f32, v1: f32) -> Self {
        Self::new(vec![Keyframe::new(t0, v0), Keyframe::new(t1, v1)])
    }

    pub fn constant(value: f32) -> Self {
        Self::new(vec![Keyframe::new(0.0, value)])
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }
}

impl Default for KeyframeCurve {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

impl Curve for KeyframeCurve {
    fn evaluate(&self, t: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        // первый ключ со временем > t; t строго внутри диапазона
        let upper = self.keys.partition_point(|k| k.time <= t);
        let (a, b) = (self.keys[upper - 1], self.keys[upper]);
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        a.value + (b.value - a.value) * (t - a.time) / span
    }
}
