use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::CoreError;

/// Returns the current wall-clock time as milliseconds since Unix epoch.
pub fn physical_now() -> Result<u64, CoreError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| CoreError::InvalidData("system clock before epoch".into()))
}

/// A 12-byte Hybrid Logical Clock timestamp: 8 bytes wall_ms (big-endian u64)
/// followed by 4 bytes counter (big-endian u32).
///
/// Used as the `whenCreated` stamp of a mapping. Byte order equals stamp
/// order, so stamps compare correctly as SQLite blobs.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Hlc {
    wall_ms: u64,
    counter: u32,
}

impl Hlc {
    pub const LEN: usize = 12;

    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[..8].copy_from_slice(&self.wall_ms.to_be_bytes());
        buf[8..].copy_from_slice(&self.counter.to_be_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let arr: [u8; 12] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidData(format!("hlc must be 12 bytes, got {}", bytes.len())))?;
        let mut wall = [0u8; 8];
        let mut counter = [0u8; 4];
        wall.copy_from_slice(&arr[..8]);
        counter.copy_from_slice(&arr[8..]);
        Ok(Self {
            wall_ms: u64::from_be_bytes(wall),
            counter: u32::from_be_bytes(counter),
        })
    }

    /// RFC 3339 rendering of the wall component, millisecond precision, UTC.
    pub fn to_rfc3339(&self) -> Result<String, CoreError> {
        let nanos = i128::from(self.wall_ms) * 1_000_000;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|e| CoreError::Serialization(e.to_string()))?
            .format(&Rfc3339)
            .map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// Parses an RFC 3339 timestamp into a stamp with a zero counter.
    pub fn parse_rfc3339(text: &str) -> Result<Self, CoreError> {
        let parsed = OffsetDateTime::parse(text, &Rfc3339)
            .map_err(|e| CoreError::validation("whenCreated", e.to_string()))?;
        let millis = parsed.unix_timestamp_nanos() / 1_000_000;
        let wall_ms = u64::try_from(millis)
            .map_err(|_| CoreError::validation("whenCreated", "timestamp before epoch"))?;
        Ok(Self::new(wall_ms, 0))
    }
}

impl Ord for Hlc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for Hlc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A clock that generates monotonically increasing HLC timestamps.
pub struct HlcClock {
    wall_ms: u64,
    counter: u32,
}

impl HlcClock {
    pub fn new() -> Self {
        Self {
            wall_ms: 0,
            counter: 0,
        }
    }

    /// Generate the next monotonically increasing timestamp.
    pub fn tick(&mut self) -> Result<Hlc, CoreError> {
        let now = physical_now()?;

        let hlc = if now > self.wall_ms {
            Hlc::new(now, 0)
        } else {
            let counter = self
                .counter
                .checked_add(1)
                .ok_or_else(|| CoreError::InvalidData("hlc counter overflow".into()))?;
            Hlc::new(self.wall_ms, counter)
        };

        self.wall_ms = hlc.wall_ms;
        self.counter = hlc.counter;
        Ok(hlc)
    }

    /// Advance past a stamp that is already persisted, so stamps issued after
    /// a restart still sort after existing rows.
    pub fn observe(&mut self, seen: Hlc) {
        if seen > Hlc::new(self.wall_ms, self.counter) {
            self.wall_ms = seen.wall_ms;
            self.counter = seen.counter;
        }
    }
}

impl Default for HlcClock {
    fn default() -> Self {
        Self::new()
    }
}
