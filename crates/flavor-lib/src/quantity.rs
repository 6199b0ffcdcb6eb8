//! Resource quantities with magnitude-based equality
//!
//! Parses the Kubernetes quantity grammar (`250m`, `1Gi`, `1.5`, `2e3`, ...)
//! into an exact count of nano-units, so differently spelled strings that
//! denote the same amount compare equal. The original spelling is kept for
//! display and serialization.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as WireQuantity;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::QuantityError;

/// Quantities are stored as multiples of 10^-9
const NANO_EXPONENT: i32 = 9;

/// Largest decimal exponent accepted in `e`/`E` notation
const MAX_DECIMAL_EXPONENT: i32 = 30;

/// Longest significant digit run that still fits the i128 accumulator
const MAX_SIGNIFICANT_DIGITS: usize = 30;

enum Scale {
    Decimal(i32),
    Binary(u32),
}

/// A parsed resource amount
///
/// Equality, ordering and hashing only look at the numeric value:
/// `"1"`, `"1000m"` and `"1e0"` are the same quantity.
#[derive(Debug, Clone)]
pub struct Quantity {
    text: String,
    nanos: i128,
}

impl Quantity {
    /// Parse a quantity string
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let text = input.trim();
        if text.is_empty() {
            return Err(QuantityError::Empty);
        }

        let (negative, unsigned) = match text.as_bytes()[0] {
            b'-' => (true, &text[1..]),
            b'+' => (false, &text[1..]),
            _ => (false, text),
        };

        let split = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(split);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityError::InvalidNumber(text.to_string()));
        }

        let scale = parse_suffix(suffix, text)?;
        let magnitude = magnitude_in_nanos(int_part, frac_part, scale, text)?;

        Ok(Self {
            text: text.to_string(),
            nanos: if negative { -magnitude } else { magnitude },
        })
    }

    /// Value in nano-units (10^-9)
    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    /// The quantity as it was written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }
}

fn parse_suffix(suffix: &str, text: &str) -> Result<Scale, QuantityError> {
    let scale = match suffix {
        "" => Scale::Decimal(0),
        "n" => Scale::Decimal(-9),
        "u" => Scale::Decimal(-6),
        "m" => Scale::Decimal(-3),
        "k" => Scale::Decimal(3),
        "M" => Scale::Decimal(6),
        "G" => Scale::Decimal(9),
        "T" => Scale::Decimal(12),
        "P" => Scale::Decimal(15),
        "E" => Scale::Decimal(18),
        "Ki" => Scale::Binary(10),
        "Mi" => Scale::Binary(20),
        "Gi" => Scale::Binary(30),
        "Ti" => Scale::Binary(40),
        "Pi" => Scale::Binary(50),
        "Ei" => Scale::Binary(60),
        _ => {
            let exponent = suffix
                .strip_prefix('e')
                .or_else(|| suffix.strip_prefix('E'))
                .ok_or_else(|| QuantityError::UnknownSuffix(text.to_string()))?;
            let exponent: i32 = exponent
                .parse()
                .map_err(|_| QuantityError::InvalidExponent(text.to_string()))?;
            if exponent.unsigned_abs() > MAX_DECIMAL_EXPONENT.unsigned_abs() {
                return Err(QuantityError::OutOfRange(text.to_string()));
            }
            Scale::Decimal(exponent)
        }
    };
    Ok(scale)
}

/// Exact magnitude in nano-units; sub-nano remainders round away from zero
fn magnitude_in_nanos(
    int_part: &str,
    frac_part: &str,
    scale: Scale,
    text: &str,
) -> Result<i128, QuantityError> {
    let out_of_range = || QuantityError::OutOfRange(text.to_string());

    let digits = format!("{int_part}{frac_part}");
    let significant = digits.trim_start_matches('0');
    if significant.is_empty() {
        return Ok(0);
    }
    if significant.len() > MAX_SIGNIFICANT_DIGITS {
        return Err(out_of_range());
    }
    let mut mantissa: i128 = significant
        .parse()
        .map_err(|_| QuantityError::InvalidNumber(text.to_string()))?;

    let mut exponent = NANO_EXPONENT - frac_part.len() as i32;
    match scale {
        Scale::Decimal(e) => exponent += e,
        Scale::Binary(shift) => {
            mantissa = mantissa
                .checked_mul(1i128 << shift)
                .ok_or_else(out_of_range)?;
        }
    }

    if exponent >= 0 {
        10i128
            .checked_pow(exponent as u32)
            .and_then(|factor| mantissa.checked_mul(factor))
            .ok_or_else(out_of_range)
    } else {
        match 10i128.checked_pow(exponent.unsigned_abs()) {
            Some(divisor) => {
                let quotient = mantissa / divisor;
                Ok(if mantissa % divisor == 0 {
                    quotient
                } else {
                    quotient + 1
                })
            }
            // Divisor exceeds any mantissa: a non-zero value below one nano-unit
            None => Ok(1),
        }
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.nanos == other.nanos
    }
}

impl Eq for Quantity {}

impl Hash for Quantity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nanos.hash(state);
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.nanos.cmp(&other.nanos)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<&WireQuantity> for Quantity {
    type Error = QuantityError;

    fn try_from(value: &WireQuantity) -> Result<Self, Self::Error> {
        Self::parse(&value.0)
    }
}

impl From<&Quantity> for WireQuantity {
    fn from(value: &Quantity) -> Self {
        WireQuantity(value.text.clone())
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QuantityVisitor;

        impl de::Visitor<'_> for QuantityVisitor {
            type Value = Quantity;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a resource quantity such as \"250m\" or \"1Gi\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Quantity, E> {
                Quantity::parse(v).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Quantity, E> {
                Quantity::parse(&v.to_string()).map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Quantity, E> {
                Quantity::parse(&v.to_string()).map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Quantity, E> {
                Quantity::parse(&v.to_string()).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(QuantityVisitor)
    }
}
