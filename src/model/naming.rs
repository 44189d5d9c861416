//! Storage naming encoders.
//!
//! Relation names are order-independent in their two endpoint names and
//! combine them with the multiplexer. A multiplexer carries no direction:
//! `Car.FrontWheels -> Wheel ("front")` and `Wheel.Car -> Car ("front")` name
//! the same relation. Relations that must stay apart need distinct
//! multiplexers.
#![forbid(unsafe_code)]

use xxhash_rust::xxh64::xxh64;

/// Maps logical names to storage names.
pub trait NamingEncoder: Send + Sync {
    /// Storage name of a container.
    fn encode_container_name(&self, logical_name: &str) -> String;

    /// Storage name of a relation. Must satisfy
    /// `encode_relation_name(a, b, m) == encode_relation_name(b, a, m)`.
    fn encode_relation_name(&self, name_a: &str, name_b: &str, multiplexer: &str) -> String;
}

fn ordered<'a>(name_a: &'a str, name_b: &'a str) -> (&'a str, &'a str) {
    if name_a <= name_b {
        (name_a, name_b)
    } else {
        (name_b, name_a)
    }
}

/// Readable names: containers keep their logical name, relations join the
/// sorted endpoint names around the multiplexer.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainNamingEncoder;

impl NamingEncoder for PlainNamingEncoder {
    fn encode_container_name(&self, logical_name: &str) -> String {
        logical_name.to_owned()
    }

    fn encode_relation_name(&self, name_a: &str, name_b: &str, multiplexer: &str) -> String {
        let (first, second) = ordered(name_a, name_b);
        if multiplexer.is_empty() {
            format!("{first}_{second}")
        } else {
            format!("{first}_{multiplexer}_{second}")
        }
    }
}

/// Opaque fixed-width names derived from a stable 64-bit hash.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashingNamingEncoder {
    seed: u64,
}

const SEPARATOR: u8 = 0x1f;

impl HashingNamingEncoder {
    /// Encoder with a custom seed; different seeds yield disjoint name spaces.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl NamingEncoder for HashingNamingEncoder {
    fn encode_container_name(&self, logical_name: &str) -> String {
        format!("c_{:016x}", xxh64(logical_name.as_bytes(), self.seed))
    }

    fn encode_relation_name(&self, name_a: &str, name_b: &str, multiplexer: &str) -> String {
        let (first, second) = ordered(name_a, name_b);
        let mut key = Vec::with_capacity(first.len() + second.len() + multiplexer.len() + 2);
        key.extend_from_slice(first.as_bytes());
        key.push(SEPARATOR);
        key.extend_from_slice(multiplexer.as_bytes());
        key.push(SEPARATOR);
        key.extend_from_slice(second.as_bytes());
        format!("r_{:016x}", xxh64(&key, self.seed))
    }
}
