//! Open-addressed, multi-generation hash-table index (`keys.ht`/`seqs.ht`).
//!
//! Each generation is a flat table of 4-byte big-endian slots storing
//! `offset + 1` (zero means empty). Insertion linear-probes forward from
//! `hash % slots`; once a generation's load factor reaches 0.5 a new
//! generation with double the slots is appended. Older generations are
//! never rewritten, so a lookup must search every generation, newest first.

use std::io::{self, Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};

const HEADER_VERSION: u32 = 2;
const INITIAL_SLOTS: u32 = 1024;
const LOAD_FACTOR_LIMIT: f64 = 0.5;

struct Generation {
    slots: Vec<u32>,
    count: u32,
}

impl Generation {
    fn new(slots: u32) -> Self {
        Self {
            slots: vec![0u32; slots as usize],
            count: 0,
        }
    }

    fn load_factor(&self) -> f64 {
        self.count as f64 / self.slots.len() as f64
    }

    fn insert(&mut self, hash: u32, offset: u64) {
        let start = (hash as usize) % self.slots.len();
        let mut i = start;
        loop {
            if self.slots[i] == 0 {
                self.slots[i] = (offset + 1) as u32;
                self.count += 1;
                return;
            }
            i = (i + 1) % self.slots.len();
            // A full generation would loop forever; callers always roll a
            // new generation before load factor approaches 1.0.
            if i == start {
                panic!("hash table generation is full");
            }
        }
    }

    /// Every offset on the forward probe run starting at `hash % slots`,
    /// stopping at the first empty slot.
    fn candidates(&self, hash: u32) -> Vec<u64> {
        let start = (hash as usize) % self.slots.len();
        let mut out = Vec::new();
        let mut i = start;
        loop {
            let v = self.slots[i];
            if v == 0 {
                break;
            }
            out.push((v - 1) as u64);
            i = (i + 1) % self.slots.len();
            if i == start {
                break;
            }
        }
        out
    }
}

/// A hash-table index file: `keys.ht` or `seqs.ht`.
pub struct HashTableIndex {
    seq: u32,
    generations: Vec<Generation>,
}

impl HashTableIndex {
    /// A fresh, empty index with one generation of [`INITIAL_SLOTS`] slots.
    pub fn new() -> Self {
        Self {
            seq: 0,
            generations: vec![Generation::new(INITIAL_SLOTS)],
        }
    }

    /// The highest log sequence number this index has observed, used to
    /// resume incremental indexing after a restart.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.seq = seq;
    }

    /// Inserts `key -> offset`, rolling a new doubled generation first if
    /// the current (newest) generation's load factor would reach 0.5.
    pub fn insert(&mut self, key: &str, offset: u64) {
        let hash = hthash(key);
        let newest = self.generations.last_mut().expect("at least one generation");
        newest.insert(hash, offset);
        if newest.load_factor() >= LOAD_FACTOR_LIMIT {
            let new_slots = (newest.slots.len() as u32) * 2;
            self.generations.push(Generation::new(new_slots));
        }
    }

    /// All offsets that might correspond to `key`, newest generation first.
    /// The caller must read each candidate record and confirm an exact match.
    pub fn lookup(&self, key: &str) -> Vec<u64> {
        let hash = hthash(key);
        let mut out = Vec::new();
        for gen in self.generations.iter().rev() {
            out.extend(gen.candidates(hash));
        }
        out
    }

    /// Serializes the index to `writer` in the on-disk format described in
    /// the module documentation.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(&HEADER_VERSION.to_be_bytes())?;
        writer.write_all(&self.seq.to_be_bytes())?;
        for gen in &self.generations {
            writer.write_all(&(gen.slots.len() as u32).to_be_bytes())?;
            writer.write_all(&gen.count.to_be_bytes())?;
            for slot in &gen.slots {
                writer.write_all(&slot.to_be_bytes())?;
            }
        }
        Ok(())
    }

    /// Parses an index previously written by [`write_to`].
    pub fn read_from<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let _version = u32::from_be_bytes(header[0..4].try_into().unwrap());
        let seq = u32::from_be_bytes(header[4..8].try_into().unwrap());

        let mut generations = Vec::new();
        loop {
            let mut gen_header = [0u8; 8];
            match reader.read_exact(&mut gen_header) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let slots = u32::from_be_bytes(gen_header[0..4].try_into().unwrap());
            let count = u32::from_be_bytes(gen_header[4..8].try_into().unwrap());
            let mut table = vec![0u32; slots as usize];
            for entry in table.iter_mut() {
                let mut buf = [0u8; 4];
                reader.read_exact(&mut buf)?;
                *entry = u32::from_be_bytes(buf);
            }
            generations.push(Generation { slots: table, count });
        }
        if generations.is_empty() {
            generations.push(Generation::new(INITIAL_SLOTS));
        }
        Ok(Self { seq, generations })
    }
}

impl Default for HashTableIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// `_hthash`: big-endian `u32` decoded from the first six base64 characters
/// following a sigil-prefixed key's leading character (`key[1..7]`, padded
/// with `"=="` to a decodable length).
pub fn hthash(key: &str) -> u32 {
    let body: String = key.chars().skip(1).take(6).collect();
    let padded = format!("{body}==");
    let decoded = STANDARD
        .decode(&padded)
        .expect("hthash input is always six valid base64 characters");
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&decoded[..4]);
    u32::from_be_bytes(buf)
}

/// `seq2key(author, seq) = "_" + base64(sha1(str(seq) + author)[:8])`, the
/// synthetic key the `(author, sequence)` index hashes its entries under.
pub fn seq2key(author: &str, seq: u64) -> String {
    let preimage = format!("{seq}{author}");
    let digest = ssb_crypto::hash::sha1(preimage.as_bytes());
    format!("_{}", STANDARD.encode(&digest[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_finds_offset() {
        let mut idx = HashTableIndex::new();
        idx.insert("%xRDqws/TrQmOd4aEwZ32jdLhP873ZKjIgHlggPR0eoo=.sha256", 42);
        let candidates = idx.lookup("%xRDqws/TrQmOd4aEwZ32jdLhP873ZKjIgHlggPR0eoo=.sha256");
        assert!(candidates.contains(&42));
    }

    fn test_key(i: u64) -> String {
        format!("%id{i:04}xx.sha256")
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut idx = HashTableIndex::new();
        for i in 0..10u64 {
            idx.insert(&test_key(i), i * 100);
        }
        idx.set_seq(10);

        let mut buf = Vec::new();
        idx.write_to(&mut buf).unwrap();
        let restored = HashTableIndex::read_from(&buf[..]).unwrap();
        assert_eq!(restored.seq(), 10);
        for i in 0..10u64 {
            assert!(restored.lookup(&test_key(i)).contains(&(i * 100)));
        }
    }

    #[test]
    fn load_factor_growth_adds_a_new_generation() {
        let mut idx = HashTableIndex::new();
        // Push past a 0.5 load factor on the initial 1024-slot generation.
        for i in 0..600u64 {
            idx.insert(&test_key(i), i);
        }
        assert!(idx.generations.len() >= 2);
    }
}
