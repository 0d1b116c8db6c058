//! Date helper functions

use chrono::{DateTime, Locale, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::{ConfigError, DateConfig};
use crate::content::Post;

/// Formats publication dates for display in a fixed locale and timezone
#[derive(Debug, Clone)]
pub struct DateFormatter {
    /// chrono strftime pattern
    pattern: String,
    locale: Locale,
    timezone: Tz,
}

impl DateFormatter {
    /// Build a formatter from a date-fns style pattern (`dd MMM yyyy`), a
    /// locale name (`pt_BR` or `pt-BR`) and an IANA timezone.
    pub fn new(pattern: &str, locale: &str, timezone: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: date_fns_to_chrono_format(pattern),
            locale: parse_locale(locale)?,
            timezone: parse_timezone(timezone)?,
        })
    }

    pub fn from_config(config: &DateConfig) -> Result<Self, ConfigError> {
        Self::new(&config.format, &config.locale, &config.timezone)
    }

    /// Format a timestamp, e.g. `15 mar 2024`
    pub fn format(&self, date: &DateTime<Utc>) -> String {
        date.with_timezone(&self.timezone)
            .format_localized(&self.pattern, self.locale)
            .to_string()
    }

    /// The text shown for a post's date: the preformatted value when the
    /// listing stamped one, otherwise the formatted publication date.
    pub fn display(&self, post: &Post) -> String {
        match (&post.display_date, &post.first_publication_date) {
            (Some(shown), _) => shown.clone(),
            (None, Some(date)) => self.format(date),
            (None, None) => String::new(),
        }
    }
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml<Tz: TimeZone>(date: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

pub fn parse_locale(name: &str) -> Result<Locale, ConfigError> {
    let normalized = name.trim().replace('-', "_");
    Locale::try_from(normalized.as_str()).map_err(|_| ConfigError::Locale(name.to_string()))
}

pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::Timezone(name.to_string()))
}

/// Convert date-fns (Unicode) format tokens to chrono format
fn date_fns_to_chrono_format(format: &str) -> String {
    // Longest tokens first within each field
    let replacements = [
        // Year
        ("yyyy", "%Y"),
        ("yy", "%y"),
        // Month
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        // Day of month
        ("dd", "%d"),
        // Weekday
        ("EEEE", "%A"),
        ("EEE", "%a"),
        // Time
        ("HH", "%H"),
        ("hh", "%I"),
        ("mm", "%M"),
        ("ss", "%S"),
    ];

    let mut result = format.to_string();

    for (from, to) in replacements {
        result = result.replace(from, to);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brazilian() -> DateFormatter {
        DateFormatter::new("dd MMM yyyy", "pt-BR", "America/Sao_Paulo").unwrap()
    }

    #[test]
    fn test_format_in_portuguese() {
        let date = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(brazilian().format(&date), "15 mar 2024");

        let date = Utc.with_ymd_and_hms(2021, 2, 3, 12, 0, 0).unwrap();
        assert_eq!(brazilian().format(&date), "03 fev 2021");
    }

    #[test]
    fn test_format_uses_configured_timezone() {
        // 01:00 UTC is still the previous day in Sao Paulo
        let date = Utc.with_ymd_and_hms(2024, 3, 16, 1, 0, 0).unwrap();
        assert_eq!(brazilian().format(&date), "15 mar 2024");
    }

    #[test]
    fn test_display_prefers_stamped_date() {
        let mut post = Post {
            uid: "a".to_string(),
            first_publication_date: Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()),
            title: String::new(),
            subtitle: String::new(),
            author: String::new(),
            display_date: None,
        };
        assert_eq!(brazilian().display(&post), "15 mar 2024");

        post.display_date = Some("ontem".to_string());
        assert_eq!(brazilian().display(&post), "ontem");

        post.display_date = None;
        post.first_publication_date = None;
        assert_eq!(brazilian().display(&post), "");
    }

    #[test]
    fn test_rejects_unknown_locale_and_timezone() {
        assert!(matches!(
            DateFormatter::new("dd", "xx_YY", "UTC"),
            Err(ConfigError::Locale(_))
        ));
        assert!(matches!(
            DateFormatter::new("dd", "pt_BR", "Mars/Olympus"),
            Err(ConfigError::Timezone(_))
        ));
    }

    #[test]
    fn test_date_fns_to_chrono() {
        assert_eq!(date_fns_to_chrono_format("dd MMM yyyy"), "%d %b %Y");
        assert_eq!(date_fns_to_chrono_format("yyyy-MM-dd HH:mm"), "%Y-%m-%d %H:%M");
    }

    #[test]
    fn test_date_xml() {
        let date = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(date_xml(&date), "2024-01-15T10:30:00+00:00");
    }
}
