//! Request id generators

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::RequestId;

/// Produces correlation ids for outgoing requests.
///
/// Any `Iterator<Item = RequestId>` qualifies. Uniqueness is only promised per
/// generator instance.
pub trait IdGenerator: Send + Sync {
    fn next_id(&mut self) -> RequestId;
}

impl<I> IdGenerator for I
where
    I: Iterator<Item = RequestId> + Send + Sync,
{
    fn next_id(&mut self) -> RequestId {
        // built-in generators never end; a finite user iterator falls back to zero
        self.next().unwrap_or(RequestId::Number(0))
    }
}

/// Sequential integers: 1, 2, 3, ...
#[derive(Debug, Clone)]
pub struct DecimalGenerator {
    next: i64,
}

impl DecimalGenerator {
    pub fn new(start: i64) -> Self {
        Self { next: start }
    }
}

impl Default for DecimalGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Iterator for DecimalGenerator {
    type Item = RequestId;

    fn next(&mut self) -> Option<RequestId> {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        Some(RequestId::Number(id))
    }
}

/// Sequential lowercase hexadecimal strings: "1", ..., "9", "a", "b", ...
#[derive(Debug, Clone)]
pub struct HexadecimalGenerator {
    next: u64,
}

impl HexadecimalGenerator {
    pub fn new(start: u64) -> Self {
        Self { next: start }
    }
}

impl Default for HexadecimalGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Iterator for HexadecimalGenerator {
    type Item = RequestId;

    fn next(&mut self) -> Option<RequestId> {
        let id = format!("{:x}", self.next);
        self.next = self.next.wrapping_add(1);
        Some(RequestId::String(id))
    }
}

pub const DEFAULT_RANDOM_CHARS: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

/// Random strings, e.g. "fubui5e6".
///
/// Not unique: with the default length of 8 the chance of a collision is
/// around one in a million.
#[derive(Debug, Clone)]
pub struct RandomGenerator {
    length: usize,
    chars: Vec<char>,
}

impl RandomGenerator {
    pub fn new(length: usize, chars: &str) -> Result<Self> {
        let chars: Vec<char> = chars.chars().collect();
        if chars.is_empty() {
            return Err(Error::Validation(
                "Random id alphabet cannot be empty".to_string(),
            ));
        }
        Ok(Self { length, chars })
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self {
            length: 8,
            chars: DEFAULT_RANDOM_CHARS.chars().collect(),
        }
    }
}

impl Iterator for RandomGenerator {
    type Item = RequestId;

    fn next(&mut self) -> Option<RequestId> {
        let mut rng = rand::rng();
        let id: String = (0..self.length)
            .filter_map(|_| self.chars.choose(&mut rng))
            .collect();
        Some(RequestId::String(id))
    }
}

/// Version 4 UUIDs, e.g. "9bfe2c93-717e-4a45-b91b-55422c5af4ff"
#[derive(Debug, Clone, Default)]
pub struct UuidGenerator;

impl Iterator for UuidGenerator {
    type Item = RequestId;

    fn next(&mut self) -> Option<RequestId> {
        Some(RequestId::String(uuid::Uuid::new_v4().to_string()))
    }
}

/// Generator selection as it appears in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IdGeneratorConfig {
    Decimal { start: i64 },
    Hexadecimal { start: u64 },
    Random { length: usize },
    Uuid,
}

impl IdGeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if let IdGeneratorConfig::Random { length } = self {
            if *length == 0 {
                return Err(Error::Validation(
                    "Random id length must be greater than 0".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Whether every id this generator yields is an integer
    pub fn is_numeric(&self) -> bool {
        matches!(self, IdGeneratorConfig::Decimal { .. })
    }

    pub fn build(&self) -> Box<dyn IdGenerator> {
        match self {
            IdGeneratorConfig::Decimal { start } => Box::new(DecimalGenerator::new(*start)),
            IdGeneratorConfig::Hexadecimal { start } => {
                Box::new(HexadecimalGenerator::new(*start))
            }
            IdGeneratorConfig::Random { length } => Box::new(RandomGenerator {
                length: *length,
                ..RandomGenerator::default()
            }),
            IdGeneratorConfig::Uuid => Box::new(UuidGenerator),
        }
    }
}

impl Default for IdGeneratorConfig {
    fn default() -> Self {
        IdGeneratorConfig::Decimal { start: 1 }
    }
}
