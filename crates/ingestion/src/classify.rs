//! Content classification
//!
//! Flags personal data and sensitivity markers in document text and
//! measures extraction quality. Only counts are kept, never the matched
//! values. The result is attached to chunk metadata and never blocks
//! indexing.

use crate::errors::IngestionError;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

const SENSITIVE_KEYWORDS: &[&str] = &[
    "confidential",
    "proprietary",
    "internal use only",
    "privileged",
    "trade secret",
    "do not distribute",
    "restricted",
    "classified",
    "nda",
];

/// Alphanumeric ratio under which extracted text is considered garbled
const LOW_QUALITY_RATIO: f32 = 0.5;

/// PII findings above this count raise the level to confidential
const CONFIDENTIAL_PII_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityLevel {
    Public,
    Internal,
    Confidential,
    Restricted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiCounts {
    pub email: usize,
    pub phone: usize,
    pub ssn: usize,
    pub credit_card: usize,
    pub ip_address: usize,
}

impl PiiCounts {
    pub fn total(&self) -> usize {
        self.email + self.phone + self.ssn + self.credit_card + self.ip_address
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextQuality {
    pub char_count: usize,
    pub alphanumeric_count: usize,
    pub alphanumeric_ratio: f32,
    pub low_quality: bool,
}

impl TextQuality {
    pub fn measure(text: &str) -> Self {
        let char_count = text.chars().count();
        let alphanumeric_count = text.chars().filter(|c| c.is_alphanumeric()).count();
        let alphanumeric_ratio = if char_count == 0 {
            0.0
        } else {
            alphanumeric_count as f32 / char_count as f32
        };

        Self {
            char_count,
            alphanumeric_count,
            alphanumeric_ratio,
            low_quality: alphanumeric_ratio < LOW_QUALITY_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentClassification {
    pub level: SensitivityLevel,
    pub pii: PiiCounts,
    pub keywords: Vec<String>,
    pub quality: TextQuality,
}

/// Regex-based classifier, compiled once and shared
pub struct ContentClassifier {
    email: Regex,
    phone: Regex,
    ssn: Regex,
    credit_card: Regex,
    ip_address: Regex,
}

impl ContentClassifier {
    pub fn new() -> Result<Self, IngestionError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| IngestionError::ClassificationError(e.to_string()))
        };

        Ok(Self {
            email: compile(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            phone: compile(r"(?:\+1[-. ]?)?\(?\b[0-9]{3}\)?[-. ][0-9]{3}[-. ][0-9]{4}\b")?,
            ssn: compile(r"\b[0-9]{3}-[0-9]{2}-[0-9]{4}\b")?,
            credit_card: compile(r"\b(?:[0-9]{4}[- ]?){3}[0-9]{4}\b")?,
            ip_address: compile(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b")?,
        })
    }

    pub fn classify(&self, text: &str) -> ContentClassification {
        let pii = PiiCounts {
            email: self.email.find_iter(text).count(),
            phone: self.phone.find_iter(text).count(),
            ssn: self.ssn.find_iter(text).count(),
            credit_card: self.credit_card.find_iter(text).count(),
            ip_address: self.ip_address.find_iter(text).count(),
        };

        let lowered = text.to_lowercase();
        let keywords: Vec<String> = SENSITIVE_KEYWORDS
            .iter()
            .filter(|kw| contains_phrase(&lowered, kw))
            .map(|kw| kw.to_string())
            .collect();

        let level = if pii.ssn > 0 || pii.credit_card > 0 {
            SensitivityLevel::Restricted
        } else if !keywords.is_empty() || pii.total() > CONFIDENTIAL_PII_COUNT {
            SensitivityLevel::Confidential
        } else if pii.total() > 0 {
            SensitivityLevel::Internal
        } else {
            SensitivityLevel::Public
        };

        ContentClassification {
            level,
            pii,
            keywords,
            quality: TextQuality::measure(text),
        }
    }
}

/// Phrase match on word boundaries, so "nda" does not hit "calendar"
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.match_indices(phrase).any(|(pos, _)| {
        let before = haystack[..pos].chars().next_back();
        let after = haystack[pos + phrase.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ContentClassifier {
        ContentClassifier::new().unwrap()
    }

    #[test]
    fn test_plain_text_is_public() {
        let result = classifier().classify("Quarterly calendar for the garden club.");
        assert_eq!(result.level, SensitivityLevel::Public);
        assert_eq!(result.pii.total(), 0);
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn test_email_is_internal() {
        let result = classifier().classify("Contact jane.doe@example.com for details.");
        assert_eq!(result.pii.email, 1);
        assert_eq!(result.level, SensitivityLevel::Internal);
    }

    #[test]
    fn test_ssn_is_restricted() {
        let result = classifier().classify("Employee SSN: 123-45-6789");
        assert_eq!(result.pii.ssn, 1);
        assert_eq!(result.level, SensitivityLevel::Restricted);
    }

    #[test]
    fn test_card_number_is_restricted() {
        let result = classifier().classify("Card 4111 1111 1111 1111 on file");
        assert_eq!(result.pii.credit_card, 1);
        assert_eq!(result.level, SensitivityLevel::Restricted);
    }

    #[test]
    fn test_keyword_is_confidential() {
        let result = classifier().classify("PROPRIETARY and Confidential. Do not distribute.");
        assert_eq!(result.level, SensitivityLevel::Confidential);
        assert!(result.keywords.contains(&"proprietary".to_string()));
        assert!(result.keywords.contains(&"do not distribute".to_string()));
    }

    #[test]
    fn test_many_pii_findings_are_confidential() {
        let text = "a@x.io b@x.io c@x.io call 555-123-4567 server 10.0.0.1";
        let result = classifier().classify(text);
        assert_eq!(result.pii.email, 3);
        assert_eq!(result.pii.phone, 1);
        assert_eq!(result.pii.ip_address, 1);
        assert_eq!(result.level, SensitivityLevel::Confidential);
    }

    #[test]
    fn test_text_quality() {
        let good = TextQuality::measure("abcd");
        assert!((good.alphanumeric_ratio - 1.0).abs() < f32::EPSILON);
        assert!(!good.low_quality);

        let garbled = TextQuality::measure("a ~~ ## !! ?? ..");
        assert!(garbled.low_quality);

        let empty = TextQuality::measure("");
        assert_eq!(empty.alphanumeric_ratio, 0.0);
        assert!(empty.low_quality);
    }

    #[test]
    fn test_phrase_boundaries() {
        assert!(contains_phrase("signed an nda today", "nda"));
        assert!(!contains_phrase("see the calendar", "nda"));
    }
}
