//! Item validation rules.
//!
//! [`ItemRules`] is the operator-editable part of the configuration: which
//! item types are accepted, string length bounds, numeric ceilings and the
//! working-hours gate for mutating bot commands.

use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{NewItem, Price};

/// Errors for a rule set that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("allowed_types cannot be empty")]
    NoAllowedTypes,
    #[error("invalid string length range")]
    InvalidLengthRange,
    #[error("max_item_amount must be >= 1")]
    InvalidMaxAmount,
    #[error("max_item_price must be >= 0")]
    InvalidMaxPrice,
}

/// Reasons a new item is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemRuleViolation {
    #[error("item name must be {min}-{max} printable ASCII characters")]
    InvalidName { min: usize, max: usize },
    #[error("item amount must be between 1 and {max}")]
    InvalidAmount { max: i32 },
    #[error("item type must be one of: {allowed}")]
    TypeNotAllowed { allowed: String },
    #[error("item price must be between 0 and {max}")]
    InvalidPrice { max: Decimal },
}

/// Operator-editable item rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRules {
    pub allowed_types: Vec<String>,
    pub min_len_str: usize,
    pub max_len_str: usize,
    pub max_item_amount: i32,
    pub max_item_price: Decimal,
    pub skip_working_hours: bool,
}

impl Default for ItemRules {
    fn default() -> Self {
        Self {
            allowed_types: vec!["spare part".to_owned(), "miscellaneous".to_owned()],
            min_len_str: 1,
            max_len_str: 255,
            max_item_amount: 1_000_000,
            max_item_price: Decimal::new(99_999_999, 2),
            skip_working_hours: true,
        }
    }
}

impl ItemRules {
    /// Check that the rule set itself is coherent.
    ///
    /// # Errors
    ///
    /// Returns the first `RulesError` found.
    pub fn validate(&self) -> Result<(), RulesError> {
        if self.allowed_types.iter().all(|t| t.trim().is_empty()) {
            return Err(RulesError::NoAllowedTypes);
        }
        if self.min_len_str < 1 || self.max_len_str < self.min_len_str {
            return Err(RulesError::InvalidLengthRange);
        }
        if self.max_item_amount < 1 {
            return Err(RulesError::InvalidMaxAmount);
        }
        if self.max_item_price.is_sign_negative() && !self.max_item_price.is_zero() {
            return Err(RulesError::InvalidMaxPrice);
        }
        Ok(())
    }

    /// Trim and drop empty entries from `allowed_types`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.allowed_types = self
            .allowed_types
            .into_iter()
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// Whether `text` is printable ASCII within the configured length bounds.
    #[must_use]
    pub fn validate_text(&self, text: &str) -> bool {
        let len = text.chars().count();
        (self.min_len_str..=self.max_len_str).contains(&len)
            && text
                .chars()
                .all(|c| c.is_ascii_graphic() || c.is_ascii_whitespace())
    }

    /// Returns the canonical (lower-cased) form of `item_type` if allowed.
    #[must_use]
    pub fn allowed_type(&self, item_type: &str) -> Option<String> {
        let wanted = item_type.trim().to_lowercase();
        self.allowed_types
            .iter()
            .any(|t| t.to_lowercase() == wanted)
            .then_some(wanted)
    }

    /// Validate and normalize a new item.
    ///
    /// # Errors
    ///
    /// Returns the first `ItemRuleViolation` found.
    pub fn validate_new_item(&self, mut item: NewItem) -> Result<NewItem, ItemRuleViolation> {
        item.item_name = item.item_name.trim().to_owned();
        if !self.validate_text(&item.item_name) {
            return Err(ItemRuleViolation::InvalidName {
                min: self.min_len_str,
                max: self.max_len_str,
            });
        }
        if item.item_amount < 1 || item.item_amount > self.max_item_amount {
            return Err(ItemRuleViolation::InvalidAmount {
                max: self.max_item_amount,
            });
        }
        item.item_type =
            self.allowed_type(&item.item_type)
                .ok_or_else(|| ItemRuleViolation::TypeNotAllowed {
                    allowed: self.allowed_types.join(" or "),
                })?;
        if let Some(price) = item.item_price
            && price.amount() > self.max_item_price
        {
            return Err(ItemRuleViolation::InvalidPrice {
                max: self.max_item_price,
            });
        }
        Ok(item)
    }

    /// Whether mutating bot commands are accepted at `now`.
    ///
    /// Working hours are Monday to Friday, 09:30 up to (not including) 19:00
    /// wall-clock time in `zone`.
    #[must_use]
    pub fn within_working_hours<Z: TimeZone>(&self, now: DateTime<Utc>, zone: &Z) -> bool {
        if self.skip_working_hours {
            return true;
        }
        let local = now.with_timezone(zone);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let open = NaiveTime::from_hms_opt(9, 30, 0);
        let close = NaiveTime::from_hms_opt(19, 0, 0);
        let time = NaiveTime::from_hms_opt(local.hour(), local.minute(), local.second());
        match (open, close, time) {
            (Some(open), Some(close), Some(time)) => time >= open && time < close,
            _ => false,
        }
    }
}

/// Parse a price typed by a user, accepting `-` for "no price".
///
/// # Errors
///
/// Returns `PriceError` for anything that is not a non-negative number.
pub fn parse_optional_price(text: &str) -> Result<Option<Price>, crate::types::PriceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return Ok(None);
    }
    Price::from_plaintext(trimmed).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::FixedOffset;
    use chrono_tz::Europe::Lisbon;

    use super::*;

    fn item(name: &str, amount: i32, item_type: &str, price: Option<&str>) -> NewItem {
        NewItem {
            item_name: name.to_owned(),
            item_amount: amount,
            item_type: item_type.to_owned(),
            item_price: price.map(|p| Price::from_plaintext(p).unwrap()),
            availability: true,
        }
    }

    #[test]
    fn test_default_rules_are_valid() {
        assert_eq!(ItemRules::default().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_incoherent_rules() {
        let mut rules = ItemRules {
            allowed_types: vec![" ".to_owned()],
            ..ItemRules::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::NoAllowedTypes));

        rules = ItemRules {
            min_len_str: 10,
            max_len_str: 5,
            ..ItemRules::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::InvalidLengthRange));

        rules = ItemRules {
            min_len_str: 0,
            ..ItemRules::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::InvalidLengthRange));

        rules = ItemRules {
            max_item_amount: 0,
            ..ItemRules::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::InvalidMaxAmount));

        rules = ItemRules {
            max_item_price: Decimal::new(-1, 0),
            ..ItemRules::default()
        };
        assert_eq!(rules.validate(), Err(RulesError::InvalidMaxPrice));
    }

    #[test]
    fn test_validate_text() {
        let rules = ItemRules::default();
        assert!(rules.validate_text("BOLT M8 (zinc)"));
        assert!(!rules.validate_text(""));
        assert!(!rules.validate_text("café"));
        assert!(!rules.validate_text(&"x".repeat(256)));
    }

    #[test]
    fn test_validate_new_item_normalizes_type() {
        let rules = ItemRules::default();
        let ok = rules
            .validate_new_item(item(" WIDGET ", 3, "Spare Part", Some("2.5")))
            .unwrap();
        assert_eq!(ok.item_name, "WIDGET");
        assert_eq!(ok.item_type, "spare part");
    }

    #[test]
    fn test_validate_new_item_violations() {
        let rules = ItemRules::default();
        assert!(matches!(
            rules.validate_new_item(item("W", 0, "spare part", None)),
            Err(ItemRuleViolation::InvalidAmount { .. })
        ));
        assert!(matches!(
            rules.validate_new_item(item("W", 1, "food", None)),
            Err(ItemRuleViolation::TypeNotAllowed { .. })
        ));
        assert!(matches!(
            rules.validate_new_item(item("W", 1, "spare part", Some("1000000"))),
            Err(ItemRuleViolation::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_working_hours() {
        let rules = ItemRules {
            skip_working_hours: false,
            ..ItemRules::default()
        };
        let utc = FixedOffset::east_opt(0).unwrap();
        // 2026-10-14 is a Wednesday.
        let open = Utc.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2026, 10, 14, 9, 29, 59).unwrap();
        let closing = Utc.with_ymd_and_hms(2026, 10, 14, 19, 0, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap();

        assert!(rules.within_working_hours(open, &utc));
        assert!(!rules.within_working_hours(early, &utc));
        assert!(!rules.within_working_hours(closing, &utc));
        assert!(!rules.within_working_hours(saturday, &utc));

        let plus_one = FixedOffset::east_opt(3600).unwrap();
        assert!(rules.within_working_hours(early, &plus_one));
    }

    #[test]
    fn test_working_hours_follow_daylight_saving() {
        let rules = ItemRules {
            skip_working_hours: false,
            ..ItemRules::default()
        };
        // 08:45 UTC is 09:45 in Lisbon during summer time and 08:45 in winter.
        let summer = Utc.with_ymd_and_hms(2026, 7, 15, 8, 45, 0).unwrap();
        let winter = Utc.with_ymd_and_hms(2026, 1, 14, 8, 45, 0).unwrap();
        assert!(rules.within_working_hours(summer, &Lisbon));
        assert!(!rules.within_working_hours(winter, &Lisbon));

        // 18:30 UTC is 19:30 in Lisbon during summer time.
        let summer_evening = Utc.with_ymd_and_hms(2026, 7, 15, 18, 30, 0).unwrap();
        let winter_evening = Utc.with_ymd_and_hms(2026, 1, 14, 18, 30, 0).unwrap();
        assert!(!rules.within_working_hours(summer_evening, &Lisbon));
        assert!(rules.within_working_hours(winter_evening, &Lisbon));
    }

    #[test]
    fn test_skip_working_hours() {
        let rules = ItemRules::default();
        let sunday = Utc.with_ymd_and_hms(2026, 10, 18, 3, 0, 0).unwrap();
        assert!(rules.within_working_hours(sunday, &Utc));
    }

    #[test]
    fn test_parse_optional_price() {
        assert_eq!(parse_optional_price("-").unwrap(), None);
        assert_eq!(parse_optional_price("").unwrap(), None);
        assert!(parse_optional_price("4.20").unwrap().is_some());
        assert!(parse_optional_price("abc").is_err());
    }
}
