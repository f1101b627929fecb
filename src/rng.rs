const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// mulberry32. Small, fast and identical on every platform, which keeps
/// generated cell content stable across restarts.
#[derive(Clone, Debug)]
pub struct Rng {
    seed: u32,
}

impl Rng {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        self.seed = self.seed.wrapping_add(0x6d2b79f5);
        let mut t = self.seed;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / 4_294_967_296.0
    }
}

/// 32-bit FNV-1a over the UTF-8 bytes of `key`.
pub fn hash_key(key: &str) -> u32 {
    key.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
    })
}

/// Stable fraction in [0, 1) derived only from `key`.
pub fn luck(key: &str) -> f64 {
    Rng::new(hash_key(key)).next_f64()
}
