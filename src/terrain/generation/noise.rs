// ============================================
// Noise Functions - Шумовые функции для генерации
// ============================================

/// Hash3D со сдвигом по seed, значение в диапазоне 0.0..1.0
#[inline(always)]
pub fn hash3d(x: i32, y: i32, z: i32, seed: i32) -> f32 {
    let n = x.wrapping_mul(374761393)
        .wrapping_add(y.wrapping_mul(668265263))
        .wrapping_add(z.wrapping_mul(1274126177))
        .wrapping_add(seed.wrapping_mul(1013904223));
    let n = (n ^ (n >> 13)).wrapping_mul(1911520717);
    ((n as u32) as f32) / (u32::MAX as f32)
}

#[inline(always)]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// 3D Value Noise, 0.0..1.0
#[inline]
pub fn noise3d(x: f32, y: f32, z: f32, seed: i32) -> f32 {
    let xi = x.floor() as i32;
    let yi = y.floor() as i32;
    let zi = z.floor() as i32;

    let xf = smoothstep(x - x.floor());
    let yf = smoothstep(y - y.floor());
    let zf = smoothstep(z - z.floor());

    let n000 = hash3d(xi, yi, zi, seed);
    let n100 = hash3d(xi + 1, yi, zi, seed);
    let n010 = hash3d(xi, yi + 1, zi, seed);
    let n110 = hash3d(xi + 1, yi + 1, zi, seed);
    let n001 = hash3d(xi, yi, zi + 1, seed);
    let n101 = hash3d(xi + 1, yi, zi + 1, seed);
    let n011 = hash3d(xi, yi + 1, zi + 1, seed);
    let n111 = hash3d(xi + 1, yi + 1, zi + 1, seed);

    let nx00 = n000 + xf * (n100 - n000);
    let nx10 = n010 + xf * (n110 - n010);
    let nx01 = n001 + xf * (n101 - n001);
    let nx11 = n011 + xf * (n111 - n011);

    let nxy0 = nx00 + yf * (nx10 - nx00);
    let nxy1 = nx01 + yf * (nx11 - nx01);

    nxy0 + zf * (nxy1 - nxy0)
}

/// FBM 3D - несколько октав шума, 0.0..1.0
#[inline]
pub fn fbm3d(x: f32, y: f32, z: f32, seed: i32, octaves: u32, lacunarity: f32, gain: f32) -> f32 {
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for octave in 0..octaves.max(1) {
        let s = seed.wrapping_add(octave as i32);
        value += amplitude * noise3d(x * frequency, y * frequency, z * frequency, s);
        max_value += amplitude;
        amplitude *= gain;
        frequency *= lacunarity;
    }

    value / max_value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_range_and_determinism() {
        for i in 0..200 {
            let p = i as f32 * 0.37;
            let n = noise3d(p, p * 0.5, -p, 7);
            assert!((0.0..=1.0).contains(&n));
            assert_eq!(n, noise3d(p, p * 0.5, -p, 7));
        }
    }

    #[test]
    fn test_seed_changes_noise() {
        let differs = (0..32).any(|i| hash3d(i, 0, 0, 1) != hash3d(i, 0, 0, 2));
        assert!(differs);
    }

    #[test]
    fn test_fbm_is_normalized() {
        for i in 0..100 {
            let p = i as f32 * 0.91;
            let n = fbm3d(p, -p, p * 0.3, 3, 4, 2.0, 0.5);
            assert!((0.0..=1.0).contains(&n));
        }
    }
}
