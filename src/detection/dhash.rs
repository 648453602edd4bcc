use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use image_hasher::ImageHash;

/// Downscaled grid width; one extra column so each row yields `HASH_WIDTH - 1` gradients.
pub const HASH_WIDTH: u32 = 9;
pub const HASH_HEIGHT: u32 = 8;
pub const HASH_BITS: usize = ((HASH_WIDTH - 1) * HASH_HEIGHT) as usize;

/// 64-bit difference hash, bits packed row-major and MSB-first.
#[derive(Debug, Clone)]
pub struct DHash {
    hash: ImageHash<Vec<u8>>,
}

impl DHash {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let hash = ImageHash::<Vec<u8>>::from_bytes(bytes)
            .map_err(|err| anyhow!("invalid dHash bytes: {err:?}"))?;
        Ok(Self { hash })
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.hash.as_bytes()
    }

    pub fn bit_len(&self) -> usize {
        self.hash.as_bytes().len() * 8
    }

    /// All-zero or all-one: the frame had no horizontal luminance structure.
    pub fn is_degenerate(&self) -> bool {
        let bytes = self.as_bytes();
        bytes.iter().all(|b| *b == 0x00) || bytes.iter().all(|b| *b == 0xFF)
    }

    pub fn to_base64(&self) -> String {
        self.hash.to_base64()
    }
}

pub fn compute_dhash(img: &RgbaImage) -> Result<DHash> {
    let small = imageops::resize(img, HASH_WIDTH, HASH_HEIGHT, FilterType::Triangle);

    let mut bytes = vec![0u8; HASH_BITS / 8];
    let mut bit = 0usize;
    for y in 0..HASH_HEIGHT {
        for x in 0..HASH_WIDTH - 1 {
            let left = luminance(small.get_pixel(x, y).0);
            let right = luminance(small.get_pixel(x + 1, y).0);
            if left > right {
                bytes[bit / 8] |= 0x80 >> (bit % 8);
            }
            bit += 1;
        }
    }

    DHash::from_bytes(&bytes)
}

/// Fraction of matching bits. Hashes of different length are never similar.
pub fn hamming_similarity(lhs: &DHash, rhs: &DHash) -> f64 {
    let bits = lhs.bit_len();
    if bits == 0 || bits != rhs.bit_len() {
        return 0.0;
    }
    let distance = lhs.hash.dist(&rhs.hash);
    1.0 - (f64::from(distance) / bits as f64)
}

fn luminance([r, g, b, _]: [u8; 4]) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}
