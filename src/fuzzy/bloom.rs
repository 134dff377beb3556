use std::io::{self, Read, Write};

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Probabilistic set of UTF-8 strings: no false negatives, tunable
/// false-positive rate. Used to prune insertion expansion during candidate
/// generation — a negative answer proves no dictionary word lies down that
/// branch.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    bits: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    items: u64,
}

const LN2: f64 = std::f64::consts::LN_2;

/// Golden ratio increment, spreads per-hash seeds uniformly.
const SEED_BASE: u64 = 0x9E37_79B9_7F4A_7C15;

impl BloomFilter {
    /// Sizes the filter for `expected_items` at the target false-positive
    /// rate. Both parameters are clamped to usable minima so degenerate
    /// inputs still yield a working filter.
    pub fn with_capacity(expected_items: u64, false_positive_rate: f64) -> Self {
        let n = expected_items.max(1) as f64;
        let p = false_positive_rate.clamp(1e-9, 0.5);

        let num_bits = ((-n * p.ln()) / (LN2 * LN2)).ceil().max(64.0) as u64;
        let num_hashes = (((num_bits as f64 / n) * LN2).round() as u32).max(1);

        Self {
            bits: vec![0u64; num_bits.div_ceil(64) as usize],
            num_bits,
            num_hashes,
            items: 0,
        }
    }

    pub fn insert(&mut self, key: &str) {
        for i in 0..self.num_hashes {
            let bit = self.bit_index(key.as_bytes(), i);
            self.bits[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.items += 1;
    }

    /// True for every inserted key; occasionally true for others.
    pub fn contains(&self, key: &str) -> bool {
        (0..self.num_hashes).all(|i| {
            let bit = self.bit_index(key.as_bytes(), i);
            self.bits[(bit / 64) as usize] & (1 << (bit % 64)) != 0
        })
    }

    /// Number of keys inserted so far (not an estimate of distinct keys).
    pub fn len(&self) -> u64 {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    fn bit_index(&self, key: &[u8], hash_no: u32) -> u64 {
        let seed = SEED_BASE.wrapping_mul(hash_no as u64 + 1);
        xxh3_64_with_seed(key, seed) % self.num_bits
    }

    /// Writes the filter as a little-endian byte stream:
    /// `num_bits: u64`, `num_hashes: u32`, `items: u64`, bit words.
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.num_bits.to_le_bytes())?;
        out.write_all(&self.num_hashes.to_le_bytes())?;
        out.write_all(&self.items.to_le_bytes())?;
        for word in &self.bits {
            out.write_all(&word.to_le_bytes())?;
        }
        Ok(())
    }

    /// Reads a filter previously written by [`dump`](Self::dump). A short
    /// read surfaces as an `io::Error`; callers treat that as a stale cache.
    pub fn load<R: Read>(input: &mut R) -> io::Result<Self> {
        let num_bits = read_u64(input)?;
        let num_hashes = read_u32(input)?;
        let items = read_u64(input)?;

        if num_bits == 0 || num_hashes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "bloom filter header has zero bits or hashes",
            ));
        }

        let num_words = num_bits.div_ceil(64) as usize;
        let mut bits = vec![0u64; num_words];
        for word in bits.iter_mut() {
            *word = read_u64(input)?;
        }

        Ok(Self {
            bits,
            num_bits,
            num_hashes,
            items,
        })
    }
}

pub(crate) fn read_u64<R: Read>(input: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(input: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u16<R: Read>(input: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_false_negatives() {
        let mut filter = BloomFilter::with_capacity(1000, 0.001);
        let keys: Vec<String> = (0..500).map(|i| format!("word{i}")).collect();
        for key in &keys {
            filter.insert(key);
        }
        for key in &keys {
            assert!(filter.contains(key), "inserted key {key:?} must be found");
        }
    }

    #[test]
    fn false_positive_rate_is_plausible() {
        let mut filter = BloomFilter::with_capacity(1000, 0.001);
        for i in 0..1000 {
            filter.insert(&format!("present{i}"));
        }
        let false_positives = (0..10_000)
            .filter(|i| filter.contains(&format!("absent{i}")))
            .count();
        // Target is 0.1%; allow an order of magnitude of slack.
        assert!(
            false_positives < 100,
            "expected ~10 false positives out of 10k, got {false_positives}"
        );
    }

    #[test]
    fn lookup_is_deterministic() {
        let mut filter = BloomFilter::with_capacity(100, 0.01);
        filter.insert("checker");
        assert!(filter.contains("checker"));
        assert!(filter.contains("checker"));
    }

    #[test]
    fn dump_load_round_trip_agrees_on_inserted_keys() {
        let mut filter = BloomFilter::with_capacity(5000, 0.001);
        let keys: Vec<String> = (0..2000).map(|i| format!("entry-{i}")).collect();
        for key in &keys {
            filter.insert(key);
        }

        let mut buf = Vec::new();
        filter.dump(&mut buf).unwrap();
        let loaded = BloomFilter::load(&mut buf.as_slice()).unwrap();

        assert_eq!(loaded.len(), filter.len());
        for key in &keys {
            assert_eq!(loaded.contains(key), filter.contains(key));
        }
        // Probe keys must agree too: the loaded filter is bit-identical.
        for i in 0..1000 {
            let probe = format!("probe-{i}");
            assert_eq!(loaded.contains(&probe), filter.contains(&probe));
        }
    }

    #[test]
    fn truncated_dump_is_rejected() {
        let mut filter = BloomFilter::with_capacity(100, 0.01);
        filter.insert("abc");
        let mut buf = Vec::new();
        filter.dump(&mut buf).unwrap();
        buf.truncate(buf.len() / 2);
        assert!(BloomFilter::load(&mut buf.as_slice()).is_err());
    }

    #[test]
    fn minimum_sizing_still_works() {
        let mut filter = BloomFilter::with_capacity(0, 0.001);
        filter.insert("x");
        assert!(filter.contains("x"));
        assert!(!filter.is_empty());
    }
}
