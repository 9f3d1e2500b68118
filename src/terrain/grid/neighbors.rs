// ============================================
// Chunk Neighbors - Топология соседей
// ============================================
// Прямые соседи (+x, +y, +z и их комбинации) нужны marching cubes,
// окружение 3×3×3 нужно редактору

use super::shape::{GridCoord, GridShape};
use crate::terrain::constants::FORWARD_NEIGHBOR_COUNT;

/// Смещение прямого соседа: bit0 = +x, bit1 = +y, bit2 = +z
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ForwardOffset(u8);

impl ForwardOffset {
    pub const X: Self = Self(0b001);
    pub const Y: Self = Self(0b010);
    pub const XY: Self = Self(0b011);
    pub const Z: Self = Self(0b100);
    pub const XZ: Self = Self(0b101);
    pub const YZ: Self = Self(0b110);
    pub const XYZ: Self = Self(0b111);

    /// Все 7 смещений в порядке слотов
    pub const ALL: [Self; FORWARD_NEIGHBOR_COUNT] =
        [Self::X, Self::Y, Self::XY, Self::Z, Self::XZ, Self::YZ, Self::XYZ];

    /// Смещение из маски 1..=7
    #[inline]
    pub fn from_mask(mask: u8) -> Option<Self> {
        (1..=7).contains(&mask).then_some(Self(mask))
    }

    #[inline]
    pub fn mask(self) -> u8 {
        self.0
    }

    /// Слот в массиве соседей
    #[inline]
    pub fn slot(self) -> usize {
        self.0 as usize - 1
    }

    #[inline]
    pub fn delta(self) -> (i32, i32, i32) {
        ((self.0 & 1) as i32, ((self.0 >> 1) & 1) as i32, ((self.0 >> 2) & 1) as i32)
    }
}

/// Индексы 7 прямых соседей; None на границе сетки
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForwardNeighbors([Option<u32>; FORWARD_NEIGHBOR_COUNT]);

impl ForwardNeighbors {
    /// Связать чанк с его прямыми соседями
    pub fn wire(shape: &GridShape, coord: GridCoord) -> Self {
        let mut slots = [None; FORWARD_NEIGHBOR_COUNT];
        for offset in ForwardOffset::ALL {
            let (dx, dy, dz) = offset.delta();
            slots[offset.slot()] = shape.offset(coord, dx, dy, dz).map(|c| shape.linearize(c));
        }
        Self(slots)
    }

    #[inline]
    pub fn get(&self, offset: ForwardOffset) -> Option<u32> {
        self.0[offset.slot()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ForwardOffset, Option<u32>)> + '_ {
        ForwardOffset::ALL.iter().map(move |&o| (o, self.0[o.slot()]))
    }

    /// Количество существующих соседей
    pub fn present(&self) -> usize {
        self.0.iter().filter(|n| n.is_some()).count()
    }
}

/// Окружение 3×3×3 без самого чанка, обрезанное по сетке
pub fn surrounding_neighbors(shape: &GridShape, coord: GridCoord) -> Vec<u32> {
    let mut result = Vec::with_capacity(26);
    for dz in -1..=1 {
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                if let Some(c) = shape.offset(coord, dx, dy, dz) {
                    result.push(shape.linearize(c));
                }
            }
        }
    }
    result
}

/// Чанки, для которых `coord` является прямым соседом (они читают его поле)
pub fn backward_neighbors(shape: &GridShape, coord: GridCoord) -> Vec<u32> {
    ForwardOffset::ALL
        .iter()
        .filter_map(|o| {
            let (dx, dy, dz) = o.delta();
            shape.offset(coord, -dx, -dy, -dz).map(|c| shape.linearize(c))
        })
        .collect()
}
