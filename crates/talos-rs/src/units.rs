//! Human readable disk sizes
//!
//! Sizes are printed with SI units ("256 GB") the way Talos reports them,
//! and parsed from either SI or IEC notation.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::TalosError;

const SI_SUFFIXES: &[&str] = &["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Size of a disk or partition in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct DiskSize(pub u64);

impl DiskSize {
    pub fn bytes(&self) -> u64 {
        self.0
    }
}

impl From<u64> for DiskSize {
    fn from(bytes: u64) -> Self {
        DiskSize(bytes)
    }
}

impl fmt::Display for DiskSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&humanize_bytes(self.0))
    }
}

/// Format a byte count with base-1000 units, one decimal below 10
pub fn humanize_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{} B", bytes);
    }

    let mut exp = 0usize;
    let mut scale = 1u64;
    while exp + 1 < SI_SUFFIXES.len() && bytes / scale >= 1000 {
        scale *= 1000;
        exp += 1;
    }

    let val = ((bytes as f64 / scale as f64) * 10.0 + 0.5).floor() / 10.0;
    if val < 10.0 {
        format!("{:.1} {}", val, SI_SUFFIXES[exp])
    } else {
        format!("{:.0} {}", val, SI_SUFFIXES[exp])
    }
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let m = match unit {
        "" | "b" => 1,
        "k" | "kb" => 1000,
        "ki" | "kib" => 1 << 10,
        "m" | "mb" => 1000u64.pow(2),
        "mi" | "mib" => 1 << 20,
        "g" | "gb" => 1000u64.pow(3),
        "gi" | "gib" => 1 << 30,
        "t" | "tb" => 1000u64.pow(4),
        "ti" | "tib" => 1 << 40,
        "p" | "pb" => 1000u64.pow(5),
        "pi" | "pib" => 1 << 50,
        "e" | "eb" => 1000u64.pow(6),
        "ei" | "eib" => 1 << 60,
        _ => return None,
    };
    Some(m)
}

/// Parse "512", "1.5 GB", "100MiB" and similar into bytes
pub fn parse_bytes(input: &str) -> Result<u64, TalosError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == ','))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let number = number.replace(',', "");
    if number.is_empty() {
        return Err(TalosError::InvalidSize(input.to_string()));
    }

    let multiplier = unit_multiplier(&unit.trim().to_lowercase())
        .ok_or_else(|| TalosError::InvalidSize(input.to_string()))?;

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(multiplier)
            .ok_or_else(|| TalosError::InvalidSize(input.to_string()));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| TalosError::InvalidSize(input.to_string()))?;
    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes >= u64::MAX as f64 {
        return Err(TalosError::InvalidSize(input.to_string()));
    }
    Ok(bytes as u64)
}

impl Serialize for DiskSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Only use the short form when it reads back to the exact value
        if self.0 % 1000 == 0 {
            let human = humanize_bytes(self.0);
            if matches!(parse_bytes(&human), Ok(parsed) if parsed == self.0) {
                return serializer.serialize_str(&human);
            }
        }
        serializer.serialize_u64(self.0)
    }
}

struct DiskSizeVisitor;

impl Visitor<'_> for DiskSizeVisitor {
    type Value = DiskSize;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a byte count or a human readable size")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<DiskSize, E> {
        Ok(DiskSize(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<DiskSize, E> {
        u64::try_from(v)
            .map(DiskSize)
            .map_err(|_| E::custom(format!("negative size {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DiskSize, E> {
        parse_bytes(v).map(DiskSize).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for DiskSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DiskSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_small_values_are_plain_bytes() {
        assert_eq!(humanize_bytes(0), "0 B");
        assert_eq!(humanize_bytes(9), "9 B");
        assert_eq!(humanize_bytes(512), "512 B");
    }

    #[test]
    fn test_humanize_uses_si_units() {
        assert_eq!(humanize_bytes(256_000_000_000), "256 GB");
        assert_eq!(humanize_bytes(1_500_000_000), "1.5 GB");
        assert_eq!(humanize_bytes(82_854_982), "83 MB");
        assert_eq!(humanize_bytes(1000), "1.0 kB");
    }

    #[test]
    fn test_parse_bytes_accepts_si_and_iec() {
        assert_eq!(parse_bytes("42").unwrap(), 42);
        assert_eq!(parse_bytes("256 GB").unwrap(), 256_000_000_000);
        assert_eq!(parse_bytes("1.5GB").unwrap(), 1_500_000_000);
        assert_eq!(parse_bytes("100 MiB").unwrap(), 100 * 1024 * 1024);
        assert_eq!(parse_bytes("4k").unwrap(), 4000);
    }

    #[test]
    fn test_parse_bytes_rejects_garbage() {
        assert!(parse_bytes("").is_err());
        assert!(parse_bytes("GB").is_err());
        assert!(parse_bytes("12 parsecs").is_err());
        assert!(parse_bytes("99999999999 EB").is_err());
    }

    #[test]
    fn test_serialize_prefers_lossless_human_form() {
        let exact = serde_yaml::to_string(&DiskSize(100_000_000)).unwrap();
        assert_eq!(exact.trim(), "100 MB");

        // "1.2 GB" would read back as 1200000000
        let lossy = serde_yaml::to_string(&DiskSize(1_234_567_000)).unwrap();
        assert_eq!(lossy.trim(), "1234567000");

        let not_round = serde_yaml::to_string(&DiskSize(1024)).unwrap();
        assert_eq!(not_round.trim(), "1024");
    }

    #[test]
    fn test_deserialize_from_int_or_string() {
        let from_int: DiskSize = serde_yaml::from_str("256000000000").unwrap();
        assert_eq!(from_int, DiskSize(256_000_000_000));

        let from_str: DiskSize = serde_yaml::from_str("\"10 GiB\"").unwrap();
        assert_eq!(from_str.bytes(), 10 * 1024 * 1024 * 1024);

        assert!(serde_yaml::from_str::<DiskSize>("\"lots\"").is_err());
    }
}
