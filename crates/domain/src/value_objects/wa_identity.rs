//! WhatsApp identity value object
//!
//! Parses the identities the gateway hands us (bare phone numbers, user JIDs
//! with device suffixes, group JIDs) into one normalized form that is used as
//! the cache key and as the search term against the helpdesk.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

const GROUP_SERVER: &str = "g.us";
const BRAZIL_COUNTRY_CODE: &str = "55";

/// A normalized WhatsApp correspondent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum WhatsAppIdentity {
    /// An individual, identified by the digits of their phone number
    Phone(String),
    /// A group chat, identified by the raw group id (without `@g.us`)
    Group(String),
}

impl WhatsAppIdentity {
    /// Parse a raw identity
    ///
    /// Group JIDs (`…@g.us`) become [`WhatsAppIdentity::Group`], everything
    /// else is treated as a phone number: the server part and any device
    /// suffix (`:12`) are dropped and only digits are kept.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let (user, server) = split_jid(raw);
        if server == Some(GROUP_SERVER) {
            return Self::group(user);
        }
        Self::phone(user)
    }

    /// Parse a raw identity with an explicit group flag
    ///
    /// The flag wins over the JID suffix; gateways do not always send the
    /// `@g.us` server part for groups.
    pub fn from_raw(raw: &str, is_group: bool) -> Result<Self, DomainError> {
        if is_group {
            let (user, _) = split_jid(raw);
            Self::group(user)
        } else {
            Self::parse(raw)
        }
    }

    fn phone(user: &str) -> Result<Self, DomainError> {
        let without_device = user.split(':').next().unwrap_or(user);
        let digits = normalize_phone(without_device);

        if digits.len() < 7 || digits.len() > 15 {
            return Err(DomainError::InvalidIdentity(format!(
                "phone number must have 7-15 digits, got '{user}'"
            )));
        }

        Ok(Self::Phone(digits))
    }

    fn group(user: &str) -> Result<Self, DomainError> {
        let id = user.trim();
        if id.is_empty() {
            return Err(DomainError::InvalidIdentity(
                "group id must not be empty".to_string(),
            ));
        }
        Ok(Self::Group(id.to_string()))
    }

    /// The normalized identity (digits for phones, raw id for groups)
    pub fn normalized(&self) -> &str {
        match self {
            Self::Phone(digits) => digits,
            Self::Group(id) => id,
        }
    }

    pub const fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }

    /// Whether the Brazilian ninth-digit numbering quirk applies
    pub fn has_numbering_variant(&self) -> bool {
        match self {
            Self::Phone(digits) => brazilian_mobile_variant(digits).is_some(),
            Self::Group(_) => false,
        }
    }

    /// All forms under which this identity may be registered remotely
    ///
    /// The normalized form always comes first. Brazilian mobile numbers add
    /// the counterpart with or without the extra ninth digit.
    pub fn lookup_variants(&self) -> Vec<String> {
        let mut variants = vec![self.normalized().to_string()];
        if let Self::Phone(digits) = self {
            if let Some(variant) = brazilian_mobile_variant(digits) {
                variants.push(variant);
            }
        }
        variants
    }

    /// Identity in the form the gateway accepts as a message recipient
    pub fn recipient(&self) -> String {
        match self {
            Self::Phone(digits) => digits.clone(),
            Self::Group(id) => format!("{id}@{GROUP_SERVER}"),
        }
    }

    /// Identity in E.164 form for phones (`+<digits>`), raw id for groups
    pub fn e164(&self) -> String {
        match self {
            Self::Phone(digits) => format!("+{digits}"),
            Self::Group(id) => id.clone(),
        }
    }
}

impl fmt::Display for WhatsAppIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phone(digits) => write!(f, "+{digits}"),
            Self::Group(id) => write!(f, "{id}@{GROUP_SERVER}"),
        }
    }
}

impl TryFrom<&str> for WhatsAppIdentity {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

fn split_jid(raw: &str) -> (&str, Option<&str>) {
    let raw = raw.trim();
    match raw.split_once('@') {
        Some((user, server)) => (user, Some(server)),
        None => (raw, None),
    }
}

/// Keep only ASCII digits
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// The other form of a Brazilian mobile number, if `digits` is one
///
/// Brazilian mobiles were migrated to nine local digits by prefixing a `9`,
/// and WhatsApp still reports many accounts in the old eight-digit form.
/// `55 DD 9XXXXXXXX` (13 digits) maps to `55 DD XXXXXXXX` (12 digits) and
/// vice versa. Twelve-digit numbers only count as mobiles when the subscriber
/// part starts with 6-9; landlines have no variant.
pub fn brazilian_mobile_variant(digits: &str) -> Option<String> {
    if !matches!(digits.len(), 12 | 13)
        || !digits.starts_with(BRAZIL_COUNTRY_CODE)
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let (prefix, subscriber) = digits.split_at(4);
    match digits.len() {
        13 if subscriber.starts_with('9') => Some(format!("{prefix}{}", &subscriber[1..])),
        12 if subscriber.starts_with(['6', '7', '8', '9']) => Some(format!("{prefix}9{subscriber}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_phone_number() {
        let id = WhatsAppIdentity::parse("+49 151 2345-6789").unwrap();
        assert_eq!(id, WhatsAppIdentity::Phone("4915123456789".to_string()));
    }

    #[test]
    fn strips_jid_server_and_device_suffix() {
        let id = WhatsAppIdentity::parse("5511987654321:17@s.whatsapp.net").unwrap();
        assert_eq!(id.normalized(), "5511987654321");
        assert!(!id.is_group());
    }

    #[test]
    fn parses_group_jid() {
        let id = WhatsAppIdentity::parse("120363025246125486@g.us").unwrap();
        assert_eq!(id, WhatsAppIdentity::Group("120363025246125486".to_string()));
        assert!(id.is_group());
    }

    #[test]
    fn explicit_group_flag_wins() {
        let id = WhatsAppIdentity::from_raw("5511987654321-1612345678", true).unwrap();
        assert_eq!(id.normalized(), "5511987654321-1612345678");
        assert!(id.is_group());
    }

    #[test]
    fn rejects_too_short_numbers() {
        assert!(WhatsAppIdentity::parse("12345").is_err());
        assert!(WhatsAppIdentity::parse("@s.whatsapp.net").is_err());
    }

    #[test]
    fn rejects_empty_group() {
        assert!(WhatsAppIdentity::from_raw("@g.us", true).is_err());
    }

    #[test]
    fn brazilian_long_form_maps_to_short_form() {
        assert_eq!(
            brazilian_mobile_variant("5511987654321").as_deref(),
            Some("551187654321")
        );
    }

    #[test]
    fn brazilian_short_form_maps_to_long_form() {
        assert_eq!(
            brazilian_mobile_variant("551187654321").as_deref(),
            Some("5511987654321")
        );
    }

    #[test]
    fn brazilian_landline_has_no_variant() {
        assert_eq!(brazilian_mobile_variant("551132654321"), None);
    }

    #[test]
    fn other_countries_have_no_variant() {
        assert_eq!(brazilian_mobile_variant("4915123456789"), None);
        let id = WhatsAppIdentity::parse("4915123456789").unwrap();
        assert!(!id.has_numbering_variant());
        assert_eq!(id.lookup_variants(), vec!["4915123456789".to_string()]);
    }

    #[test]
    fn lookup_variants_put_normalized_form_first() {
        let id = WhatsAppIdentity::parse("551187654321").unwrap();
        assert_eq!(
            id.lookup_variants(),
            vec!["551187654321".to_string(), "5511987654321".to_string()]
        );
    }

    #[test]
    fn recipient_format() {
        let phone = WhatsAppIdentity::parse("+5511987654321").unwrap();
        assert_eq!(phone.recipient(), "5511987654321");
        assert_eq!(phone.e164(), "+5511987654321");

        let group = WhatsAppIdentity::parse("1203630@g.us").unwrap();
        assert_eq!(group.recipient(), "1203630@g.us");
    }

    #[test]
    fn display_format() {
        let phone = WhatsAppIdentity::parse("5511987654321").unwrap();
        assert_eq!(phone.to_string(), "+5511987654321");
    }
}
