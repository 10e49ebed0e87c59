use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Sort-order sentinel for the `%` wildcard, which absorbs zero or more
/// characters. Outside the valid code point range, so it can never collide
/// with a real character weight.
pub const ANY_WEIGHT: u32 = u32::MAX;

/// Sort-order sentinel for the `_` wildcard, which absorbs exactly one
/// character.
pub const SINGLE_WEIGHT: u32 = u32::MAX - 1;

/// Comparison rule used to derive character weights for pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collation {
    /// Binary comparison, `utf8mb4_0900_bin`: weights are raw code points.
    Utf8mb4Bin,
    /// Case- and accent-insensitive comparison, `utf8mb4_0900_ai_ci`.
    Utf8mb4AiCi,
}

impl Collation {
    pub fn is_case_sensitive(self) -> bool {
        matches!(self, Collation::Utf8mb4Bin)
    }

    /// Appends the weight sequence for one character. The insensitive
    /// collation decomposes to NFD, drops combining marks, and lowercases,
    /// so `É` and `e` weigh the same. A character that is purely a combining
    /// mark contributes no weight.
    pub(crate) fn push_weights(self, ch: char, out: &mut Vec<u32>) {
        match self {
            Collation::Utf8mb4Bin => out.push(ch as u32),
            Collation::Utf8mb4AiCi => {
                for base in std::iter::once(ch).nfd() {
                    if is_combining_mark(base) {
                        continue;
                    }
                    for lowered in base.to_lowercase() {
                        out.push(lowered as u32);
                    }
                }
            }
        }
    }
}
