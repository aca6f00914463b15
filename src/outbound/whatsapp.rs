//! WhatsApp deep links
//!
//! Pure formatting over a record: a Handlebars message template plus a
//! `https://wa.me/<number>?text=...` link. Kept apart from the classifier so
//! message wording can change without touching urgency logic.

use fleet_types::VehicleRecord;
use handlebars::Handlebars;
use serde_json::json;
use url::Url;

use crate::config::MessagingConfig;
use crate::error::{FleetError, Result};

pub const DEFAULT_TEMPLATE: &str = "Hello {{#if driver}}{{driver}}{{else}}driver{{/if}}, \
the {{#if document_type}}{{document_type}}{{else}}document{{/if}} of vehicle {{vehicle}} \
expires on {{expiration_date}}. Please arrange the renewal.";

const TEMPLATE_NAME: &str = "message";
const WA_BASE: &str = "https://wa.me/";

/// International numbers are at most 15 digits; anything shorter than 10 is
/// neither local nor international
const INTERNATIONAL_LEN: std::ops::RangeInclusive<usize> = 10..=15;

/// Builds messages and deep links from a fixed template
pub struct MessageLinkBuilder {
    handlebars: Handlebars<'static>,
    country_code: String,
    local_number_len: usize,
}

impl MessageLinkBuilder {
    pub fn new(config: &MessagingConfig) -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars
            .register_template_string(TEMPLATE_NAME, &config.template)
            .map_err(|e| FleetError::Template(e.to_string()))?;

        Ok(Self {
            handlebars,
            country_code: config.country_code.clone(),
            local_number_len: config.local_number_len,
        })
    }

    /// Render the message text for a record
    pub fn message(&self, record: &VehicleRecord) -> Result<String> {
        let data = json!({
            "key": record.key,
            "vehicle": record.plate.as_deref().unwrap_or(&record.key),
            "plate": record.plate,
            "driver": record.driver,
            "company": record.company,
            "document_type": record.document_type,
            "expiration_date": record
                .expiration_date
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_else(|| "an unknown date".to_string()),
        });
        self.handlebars
            .render(TEMPLATE_NAME, &data)
            .map_err(|e| FleetError::Template(e.to_string()))
    }

    /// Deep link for a record, `None` when the phone is absent or unusable
    pub fn link(&self, record: &VehicleRecord) -> Result<Option<String>> {
        let Some(number) = record
            .phone
            .as_deref()
            .and_then(|raw| self.international_number(raw))
        else {
            return Ok(None);
        };
        let text = self.message(record)?;
        let mut url = Url::parse(WA_BASE)
            .and_then(|base| base.join(&number))
            .map_err(|e| FleetError::Template(format!("invalid link for {}: {}", number, e)))?;
        url.query_pairs_mut().append_pair("text", &text);
        Ok(Some(url.to_string()))
    }

    /// Digits-only international form of a phone cell
    pub fn international_number(&self, raw: &str) -> Option<String> {
        normalize_phone(raw, &self.country_code, self.local_number_len)
    }
}

/// Strip formatting, drop `+`/`00` international prefixes, and prefix local
/// numbers of exactly `local_len` digits with `country_code`.
pub fn normalize_phone(raw: &str, country_code: &str, local_len: usize) -> Option<String> {
    let raw = raw.trim();
    if raw.chars().any(|c| c.is_alphabetic()) {
        return None;
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if raw.starts_with('+') {
        return INTERNATIONAL_LEN.contains(&digits.len()).then_some(digits);
    }
    if let Some(rest) = digits.strip_prefix("00") {
        return INTERNATIONAL_LEN.contains(&rest.len()).then(|| rest.to_string());
    }
    if digits.len() == local_len {
        return Some(format!("{}{}", country_code, digits));
    }
    INTERNATIONAL_LEN.contains(&digits.len()).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn builder() -> MessageLinkBuilder {
        MessageLinkBuilder::new(&MessagingConfig::default()).unwrap()
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("600 12 34 56", "34", 9).as_deref(), Some("34600123456"));
        assert_eq!(normalize_phone("+34 600-123-456", "34", 9).as_deref(), Some("34600123456"));
        assert_eq!(normalize_phone("0034600123456", "34", 9).as_deref(), Some("34600123456"));
        assert_eq!(normalize_phone("351912345678", "34", 9).as_deref(), Some("351912345678"));
        assert_eq!(normalize_phone("12345", "34", 9), None);
        assert_eq!(normalize_phone("", "34", 9), None);
        assert_eq!(normalize_phone("n/a", "34", 9), None);
    }

    #[test]
    fn test_message_template() {
        let record = VehicleRecord::new("1234ABC")
            .with_driver("Ana")
            .with_document_type("ITV")
            .with_expiration(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        let text = builder().message(&record).unwrap();
        assert_eq!(
            text,
            "Hello Ana, the ITV of vehicle 1234ABC expires on 05/03/2024. \
             Please arrange the renewal."
        );
    }

    #[test]
    fn test_message_without_optional_fields() {
        let text = builder().message(&VehicleRecord::new("9999XYZ")).unwrap();
        assert!(text.starts_with("Hello driver, the document of vehicle 9999XYZ"));
        assert!(text.contains("an unknown date"));
    }

    #[test]
    fn test_link_encodes_text() {
        let record = VehicleRecord::new("1234ABC")
            .with_driver("Ana & Luis")
            .with_phone("600123456");
        let link = builder().link(&record).unwrap().unwrap();
        assert!(link.starts_with("https://wa.me/34600123456?text=Hello+Ana+%26+Luis"));
    }

    #[test]
    fn test_no_phone_no_link() {
        assert_eq!(builder().link(&VehicleRecord::new("A")).unwrap(), None);
        let bad = VehicleRecord::new("A").with_phone("ext. 12");
        assert_eq!(builder().link(&bad).unwrap(), None);
    }

    #[test]
    fn test_bad_template_is_config_time_error() {
        let config = MessagingConfig {
            template: "{{#if driver}}unclosed".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            MessageLinkBuilder::new(&config),
            Err(FleetError::Template(_))
        ));
    }
}
