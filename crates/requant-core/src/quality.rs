//! JPEG quality estimation from quantization tables.
//!
//! The encoder quality setting is not stored in a JPEG file, but it leaves a
//! fingerprint in the quantization tables: IJG-style encoders scale the
//! Annex K reference tables by a factor derived from the quality. This module
//! inverts that scaling with calibrated thresholds measured against the
//! reference encoder at every quality from 1 to 100.
//!
//! The result is an estimate. Encoders with custom tables (or tables tuned
//! per image) map to the nearest calibrated quality, or to 0 when nothing
//! matches.

/// Number of coefficients in an 8x8 quantization table.
pub const TABLE_SIZE: usize = 64;

/// Zigzag order to natural (row-major) order mapping.
pub const ZIGZAG_TO_NATURAL: [usize; TABLE_SIZE] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// A JPEG quantization table, stored in natural (row-major) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizationTable {
    values: [u16; TABLE_SIZE],
}

impl QuantizationTable {
    /// Create a table from coefficients already in natural order.
    pub fn from_natural(values: [u16; TABLE_SIZE]) -> Self {
        Self { values }
    }

    /// Create a table from coefficients in zigzag order, as stored in a
    /// DQT segment.
    pub fn from_zigzag(zigzag: &[u16; TABLE_SIZE]) -> Self {
        let mut values = [0u16; TABLE_SIZE];
        for (k, &v) in zigzag.iter().enumerate() {
            values[ZIGZAG_TO_NATURAL[k]] = v;
        }
        Self { values }
    }

    /// Coefficients in natural order.
    pub fn values(&self) -> &[u16; TABLE_SIZE] {
        &self.values
    }

    /// Sum of all 64 coefficients.
    pub fn sum(&self) -> u32 {
        self.values.iter().map(|&v| u32::from(v)).sum()
    }

    #[inline]
    fn at(&self, index: usize) -> u32 {
        u32::from(self.values[index])
    }
}

// Calibration thresholds for two-table (color) images, quality 1 first.
// Each table ends with a 0 sentinel.
static HASH: [u32; 101] = [
    1020, 1015, 932, 848, 780, 735, 702, 679, 660, 645, 632, 623, 613, 607, 600, 594, 589, 585,
    581, 571, 555, 542, 529, 514, 494, 474, 457, 439, 424, 410, 397, 386, 373, 364, 351, 341, 334,
    324, 317, 309, 299, 294, 287, 279, 274, 267, 262, 257, 251, 247, 243, 237, 232, 227, 222, 217,
    213, 207, 202, 198, 192, 188, 183, 177, 173, 168, 163, 157, 153, 148, 143, 139, 132, 128, 125,
    119, 115, 108, 104, 99, 94, 90, 84, 79, 74, 70, 64, 59, 55, 49, 45, 40, 34, 30, 25, 20, 15, 11,
    6, 4, 0,
];

static SUMS: [u32; 101] = [
    32640, 32635, 32266, 31495, 30665, 29804, 29146, 28599, 28104, 27670, 27225, 26725, 26210,
    25716, 25240, 24789, 24373, 23946, 23572, 22846, 21801, 20842, 19949, 19121, 18386, 17651,
    16998, 16349, 15800, 15247, 14783, 14321, 13859, 13535, 13081, 12702, 12423, 12056, 11779,
    11513, 11135, 10955, 10676, 10392, 10208, 9928, 9747, 9564, 9369, 9193, 9017, 8822, 8639, 8458,
    8270, 8084, 7896, 7710, 7527, 7347, 7156, 6977, 6788, 6607, 6422, 6236, 6054, 5867, 5684, 5495,
    5305, 5128, 4945, 4751, 4638, 4442, 4248, 4065, 3888, 3698, 3509, 3326, 3139, 2957, 2775, 2586,
    2405, 2216, 2037, 1846, 1666, 1483, 1297, 1109, 927, 735, 554, 375, 201, 128, 0,
];

// Calibration thresholds for single-table (grayscale) images.
static BW_HASH: [u32; 101] = [
    510, 505, 422, 380, 355, 338, 326, 318, 311, 305, 300, 297, 293, 291, 288, 286, 284, 283, 281,
    280, 279, 278, 277, 273, 262, 251, 243, 233, 225, 218, 211, 205, 198, 193, 186, 181, 177, 172,
    168, 164, 158, 156, 152, 148, 145, 142, 139, 136, 133, 131, 129, 126, 123, 120, 118, 115, 113,
    110, 107, 105, 102, 100, 97, 94, 92, 89, 87, 83, 81, 79, 76, 74, 70, 68, 66, 63, 61, 57, 55,
    52, 50, 48, 44, 42, 39, 37, 34, 31, 29, 26, 24, 21, 18, 16, 13, 11, 8, 6, 3, 2, 0,
];

static BW_SUMS: [u32; 101] = [
    16320, 16315, 15946, 15277, 14655, 14073, 13623, 13230, 12859, 12560, 12240, 11861, 11456,
    11081, 10714, 10360, 10027, 9679, 9368, 9056, 8680, 8331, 7995, 7668, 7376, 7084, 6823, 6562,
    6345, 6125, 5939, 5756, 5571, 5421, 5240, 5086, 4976, 4829, 4719, 4616, 4463, 4393, 4280, 4166,
    4092, 3980, 3909, 3835, 3755, 3688, 3621, 3541, 3467, 3396, 3323, 3247, 3170, 3096, 3021, 2952,
    2874, 2804, 2727, 2657, 2583, 2509, 2437, 2362, 2290, 2211, 2136, 2068, 1996, 1915, 1858, 1773,
    1692, 1620, 1552, 1477, 1398, 1326, 1251, 1179, 1109, 1031, 961, 884, 814, 736, 667, 592, 518,
    441, 369, 292, 221, 151, 86, 64, 0,
];

/// Estimate the quality a JPEG was encoded at from its quantization tables.
///
/// # Arguments
///
/// * `luma` - Luminance table (slot 0)
/// * `chroma` - Chrominance table (slot 1), absent for grayscale sources
///
/// # Returns
///
/// The nearest calibrated quality (1-100), or 0 when `luma` is absent or no
/// calibration entry matches. The value is an estimate of the original
/// encoder setting, never an exact recovery of it.
pub fn estimate_quality(
    luma: Option<&QuantizationTable>,
    chroma: Option<&QuantizationTable>,
) -> u8 {
    let Some(luma) = luma else {
        return 0;
    };

    let sum = luma.sum() + chroma.map_or(0, QuantizationTable::sum);

    match chroma {
        Some(chroma) => {
            let hashval = luma.at(2) + luma.at(53) + chroma.at(0) + chroma.at(TABLE_SIZE - 1);
            scan(hashval, sum, &HASH, &SUMS)
        }
        None => {
            let hashval = luma.at(2) + luma.at(53);
            scan(hashval, sum, &BW_HASH, &BW_SUMS)
        }
    }
}

/// Linear first-match scan over a calibration pair.
///
/// Must stay a left-to-right scan: the thresholds are treated as ordered
/// data, and the first index where either value reaches its threshold wins.
fn scan(hashval: u32, sum: u32, hash: &[u32; 101], sums: &[u32; 101]) -> u8 {
    for (i, (&h, &s)) in hash.iter().zip(sums.iter()).take(100).enumerate() {
        if hashval >= h || sum >= s {
            let quality = (i + 1) as u8;
            if hashval > h || sum > s {
                log::trace!("quality {} (approximate)", quality);
            } else {
                log::trace!("quality {}", quality);
            }
            return quality;
        }
    }
    0
}

#[cfg(test)]
pub(crate) mod test_tables {
    //! IJG reference tables scaled the way libjpeg's `jpeg_set_quality` does.

    use super::{QuantizationTable, TABLE_SIZE};

    pub const ANNEX_K_LUMA: [u16; TABLE_SIZE] = [
        16, 11, 10, 16, 24, 40, 51, 61, 12, 12, 14, 19, 26, 58, 60, 55, 14, 13, 16, 24, 40, 57, 69,
        56, 14, 17, 22, 29, 51, 87, 80, 62, 18, 22, 37, 56, 68, 109, 103, 77, 24, 35, 55, 64, 81,
        104, 113, 92, 49, 64, 78, 87, 103, 121, 120, 101, 72, 92, 95, 98, 112, 100, 103, 99,
    ];

    pub const ANNEX_K_CHROMA: [u16; TABLE_SIZE] = [
        17, 18, 24, 47, 99, 99, 99, 99, 18, 21, 26, 66, 99, 99, 99, 99, 24, 26, 56, 99, 99, 99, 99,
        99, 47, 66, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
        99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
    ];

    /// Scale a natural-order base table to `quality` with baseline clamping.
    pub fn scaled(base: &[u16; TABLE_SIZE], quality: u32) -> QuantizationTable {
        let scale = if quality < 50 {
            5000 / quality
        } else {
            200 - quality * 2
        };
        let mut values = [0u16; TABLE_SIZE];
        for (out, &v) in values.iter_mut().zip(base.iter()) {
            *out = ((u32::from(v) * scale + 50) / 100).clamp(1, 255) as u16;
        }
        QuantizationTable::from_natural(values)
    }
}

#[cfg(test)]
mod tests {
    use super::test_tables::*;
    use super::*;

    #[test]
    fn test_absent_luma_is_unknown() {
        assert_eq!(estimate_quality(None, None), 0);

        let chroma = scaled(&ANNEX_K_CHROMA, 75);
        assert_eq!(estimate_quality(None, Some(&chroma)), 0);
    }

    #[test]
    fn test_color_tables_recover_every_quality() {
        for q in 1..=100u32 {
            let luma = scaled(&ANNEX_K_LUMA, q);
            let chroma = scaled(&ANNEX_K_CHROMA, q);
            assert_eq!(
                u32::from(estimate_quality(Some(&luma), Some(&chroma))),
                q,
                "color tables at quality {}",
                q
            );
        }
    }

    #[test]
    fn test_grayscale_tables_recover_every_quality() {
        for q in 1..=100u32 {
            let luma = scaled(&ANNEX_K_LUMA, q);
            assert_eq!(
                u32::from(estimate_quality(Some(&luma), None)),
                q,
                "grayscale table at quality {}",
                q
            );
        }
    }

    #[test]
    fn test_near_lossless_monochrome() {
        // All-ones table: sum 64, hashval 2, the finest grayscale entry.
        let luma = QuantizationTable::from_natural([1; TABLE_SIZE]);
        let quality = estimate_quality(Some(&luma), None);
        assert!(quality >= 98, "expected near 100, got {}", quality);
    }

    #[test]
    fn test_near_lossless_color() {
        let table = QuantizationTable::from_natural([1; TABLE_SIZE]);
        assert_eq!(estimate_quality(Some(&table), Some(&table)), 100);
    }

    #[test]
    fn test_coarse_tables_hit_quality_one() {
        let table = QuantizationTable::from_natural([255; TABLE_SIZE]);
        assert_eq!(estimate_quality(Some(&table), Some(&table)), 1);
        assert_eq!(estimate_quality(Some(&table), None), 1);
    }

    #[test]
    fn test_zero_tables_match_nothing() {
        let table = QuantizationTable::from_natural([0; TABLE_SIZE]);
        assert_eq!(estimate_quality(Some(&table), Some(&table)), 0);
        assert_eq!(estimate_quality(Some(&table), None), 0);
    }

    #[test]
    fn test_hash_alone_can_match() {
        // Sum stays tiny but the hashed positions are coarse.
        let mut values = [1u16; TABLE_SIZE];
        values[2] = 600;
        values[53] = 500;
        let luma = QuantizationTable::from_natural(values);
        let chroma = QuantizationTable::from_natural([1; TABLE_SIZE]);
        // hashval = 600 + 500 + 1 + 1 = 1102 >= HASH[0]
        assert_eq!(estimate_quality(Some(&luma), Some(&chroma)), 1);
    }

    #[test]
    fn test_from_zigzag_reorders() {
        let mut zigzag = [0u16; TABLE_SIZE];
        for (k, v) in zigzag.iter_mut().enumerate() {
            *v = k as u16;
        }
        let table = QuantizationTable::from_zigzag(&zigzag);
        // Zigzag index 2 is row 1, column 0.
        assert_eq!(table.values()[8], 2);
        // Zigzag index 5 is row 0, column 2.
        assert_eq!(table.values()[2], 5);
        assert_eq!(table.values()[63], 63);
        assert_eq!(table.sum(), (0..64).sum::<u32>());
    }

    #[test]
    fn test_calibration_tables_are_ordered() {
        for table in [&HASH, &SUMS, &BW_HASH, &BW_SUMS] {
            assert_eq!(table[100], 0);
            assert!(table.windows(2).all(|w| w[0] > w[1]));
        }
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
