//! Sequential numbering of titles and requests.
//!
//! Numbers look like `LT1-2026-0007` (titles) and `DEM-LT1-2026-0007`
//! (requests). The sequence is scoped by (type code, year) and computed as
//! the highest existing sequence plus one; there is no counter table.
//! Writers take a transaction-scoped lock on the scope before reading the
//! highest sequence, and the unique constraint on the number column catches
//! any writer that skipped it. A collision is retried after a short jittered
//! backoff.

use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;

use crate::models::TitleType;

/// Prefix of request file numbers.
pub const REQUEST_PREFIX: &str = "DEM";

/// Retries after a number collision.
pub const MAX_NUMBER_RETRIES: u32 = 3;

/// Creation attempts in total: the first one plus the retries.
pub const MAX_NUMBER_ATTEMPTS: u32 = MAX_NUMBER_RETRIES + 1;

/// Base delay before the first retry; doubled for each later one.
const COLLISION_BACKOFF_MS: u64 = 20;

/// Delay before retrying after collision number `attempt` (1-based).
///
/// `jitter_ms` is added as is; callers draw it at random so that writers
/// that collided once do not collide again in lockstep.
pub fn collision_backoff(attempt: u32, jitter_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(6);
    Duration::from_millis(COLLISION_BACKOFF_MS * 2_u64.pow(exponent) + jitter_ms)
}

lazy_static! {
    static ref NUMBER_REGEX: Regex =
        Regex::new(r"^(?:DEM-)?(?P<code>[A-Z0-9]{3})-(?P<year>\d{4})-(?P<seq>\d{4,})$").unwrap();
}

/// Which kind of entity a number is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Title,
    Request,
}

/// Scope of one sequence: a number kind, a type code and a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberScope {
    pub kind: NumberKind,
    pub title_type: TitleType,
    pub year: i32,
}

impl NumberScope {
    pub fn title(title_type: TitleType, year: i32) -> Self {
        Self {
            kind: NumberKind::Title,
            title_type,
            year,
        }
    }

    pub fn request(title_type: TitleType, year: i32) -> Self {
        Self {
            kind: NumberKind::Request,
            title_type,
            year,
        }
    }

    /// Common prefix of every number in this scope, dash included.
    pub fn prefix(&self) -> String {
        match self.kind {
            NumberKind::Title => format!("{}-{}-", self.title_type.code(), self.year),
            NumberKind::Request => format!(
                "{}-{}-{}-",
                REQUEST_PREFIX,
                self.title_type.code(),
                self.year
            ),
        }
    }

    /// Key of the advisory lock serialising allocations in this scope.
    pub fn lock_key(&self) -> String {
        format!("number:{}", self.prefix())
    }

    /// SQL `LIKE` pattern selecting the numbers of this scope.
    pub fn like_pattern(&self) -> String {
        format!("{}%", self.prefix())
    }

    pub fn format(&self, sequence: u32) -> String {
        format!("{}{:04}", self.prefix(), sequence)
    }

    /// Sequence part of `number` if it belongs to this scope.
    pub fn parse_sequence(&self, number: &str) -> Option<u32> {
        let is_request = number.starts_with("DEM-");
        if is_request != (self.kind == NumberKind::Request) {
            return None;
        }
        let caps = NUMBER_REGEX.captures(number)?;
        if &caps["code"] != self.title_type.code() || caps["year"].parse::<i32>().ok()? != self.year {
            return None;
        }
        caps["seq"].parse().ok()
    }

    /// Next number given the numbers already issued in (or near) this scope.
    ///
    /// Numbers from other scopes and malformed numbers are ignored.
    pub fn next_number<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> String {
        let max = existing
            .into_iter()
            .filter_map(|n| self.parse_sequence(n))
            .max()
            .unwrap_or(0);
        self.format(max + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_number_of_scope() {
        let scope = NumberScope::title(TitleType::LicenceType1, 2026);
        assert_eq!(scope.next_number(std::iter::empty()), "LT1-2026-0001");

        let scope = NumberScope::request(TitleType::LicenceType1, 2026);
        assert_eq!(scope.next_number(std::iter::empty()), "DEM-LT1-2026-0001");
    }

    #[test]
    fn test_sequential_numbers_have_no_gaps() {
        let scope = NumberScope::request(TitleType::Concessions, 2026);
        let mut issued: Vec<String> = Vec::new();
        for expected in 1..=12u32 {
            let next = scope.next_number(issued.iter().map(String::as_str));
            assert_eq!(next, format!("DEM-CON-2026-{:04}", expected));
            issued.push(next);
        }
    }

    #[test]
    fn test_max_plus_one_not_count() {
        let scope = NumberScope::title(TitleType::Recepisse, 2026);
        let existing = ["REC-2026-0001", "REC-2026-0007", "REC-2026-0003"];
        assert_eq!(scope.next_number(existing), "REC-2026-0008");
    }

    #[test]
    fn test_other_scopes_are_ignored() {
        let scope = NumberScope::title(TitleType::LicenceType2, 2026);
        let existing = [
            "LT1-2026-0009",
            "LT2-2025-0042",
            "DEM-LT2-2026-0005",
            "LT2-2026-0002",
            "garbage",
        ];
        assert_eq!(scope.next_number(existing), "LT2-2026-0003");
    }

    #[test]
    fn test_sequence_beyond_four_digits() {
        let scope = NumberScope::title(TitleType::AgrementVendeurs, 2026);
        assert_eq!(scope.next_number(["AGV-2026-9999"]), "AGV-2026-10000");
        assert_eq!(scope.parse_sequence("AGV-2026-10000"), Some(10000));
    }

    #[test]
    fn test_three_retries_after_first_attempt() {
        assert_eq!(MAX_NUMBER_RETRIES, 3);
        assert_eq!(MAX_NUMBER_ATTEMPTS, 4);
    }

    #[test]
    fn test_collision_backoff_grows_with_jitter() {
        assert_eq!(collision_backoff(1, 0), Duration::from_millis(20));
        assert_eq!(collision_backoff(2, 0), Duration::from_millis(40));
        assert_eq!(collision_backoff(3, 7), Duration::from_millis(87));
        assert!(collision_backoff(40, 0) <= Duration::from_millis(20 * 64));
    }

    #[test]
    fn test_lock_key_differs_per_kind() {
        let title = NumberScope::title(TitleType::LicenceType1, 2026);
        let request = NumberScope::request(TitleType::LicenceType1, 2026);
        assert_ne!(title.lock_key(), request.lock_key());
        assert_eq!(request.lock_key(), "number:DEM-LT1-2026-");
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(
            NumberScope::request(TitleType::AgrementInstallateurs, 2027).like_pattern(),
            "DEM-AGI-2027-%"
        );
    }
}
