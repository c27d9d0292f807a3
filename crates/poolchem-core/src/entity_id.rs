//! Entity ID type representing a domain.object_id pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity IDs
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity_id must contain exactly one '.' separator")]
    InvalidFormat,

    #[error("domain cannot be empty")]
    EmptyDomain,

    #[error("object_id cannot be empty")]
    EmptyObjectId,

    #[error("domain contains invalid characters: {0}")]
    InvalidDomainChars(String),

    #[error("object_id contains invalid characters: {0}")]
    InvalidObjectIdChars(String),
}

/// Identifier of an entity, e.g. `sensor.pool_temperature`
///
/// Both halves are lowercase ASCII alphanumerics and underscores, and may
/// not start or end with an underscore. Domains additionally may not
/// contain `__`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    /// Create a new EntityId from domain and object_id parts
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        if domain.is_empty() {
            return Err(EntityIdError::EmptyDomain);
        }
        if object_id.is_empty() {
            return Err(EntityIdError::EmptyObjectId);
        }
        if domain.contains("__") || !is_slug(&domain) {
            return Err(EntityIdError::InvalidDomainChars(domain));
        }
        if !is_slug(&object_id) {
            return Err(EntityIdError::InvalidObjectIdChars(object_id));
        }

        Ok(Self { domain, object_id })
    }

    /// Build an entity id from a domain and free-form display text
    ///
    /// `("sensor", "Back Yard Pool CSI")` becomes `sensor.back_yard_pool_csi`.
    pub fn from_name(domain: &str, name: &str) -> Result<Self, EntityIdError> {
        Self::new(domain, slugify(name))
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

fn is_slug(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Lowercase `text` and collapse every run of non-alphanumerics into `_`
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => {
                Self::new(domain, object_id)
            }
            _ => Err(EntityIdError::InvalidFormat),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensor_id() {
        let id: EntityId = "sensor.pool_ph".parse().unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "pool_ph");
        assert_eq!(id.to_string(), "sensor.pool_ph");
    }

    #[test]
    fn test_rejects_bad_format() {
        assert_eq!(
            "sensor".parse::<EntityId>(),
            Err(EntityIdError::InvalidFormat)
        );
        assert_eq!(
            "sensor.a.b".parse::<EntityId>(),
            Err(EntityIdError::InvalidFormat)
        );
        assert_eq!(".ph".parse::<EntityId>(), Err(EntityIdError::EmptyDomain));
        assert_eq!(
            "sensor.".parse::<EntityId>(),
            Err(EntityIdError::EmptyObjectId)
        );
    }

    #[test]
    fn test_rejects_bad_characters() {
        assert!(matches!(
            "Sensor.ph".parse::<EntityId>(),
            Err(EntityIdError::InvalidDomainChars(_))
        ));
        assert!(matches!(
            "sen__sor.ph".parse::<EntityId>(),
            Err(EntityIdError::InvalidDomainChars(_))
        ));
        assert!(matches!(
            "sensor._ph".parse::<EntityId>(),
            Err(EntityIdError::InvalidObjectIdChars(_))
        ));
        assert!(matches!(
            "sensor.pool-ph".parse::<EntityId>(),
            Err(EntityIdError::InvalidObjectIdChars(_))
        ));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Back Yard Pool"), "back_yard_pool");
        assert_eq!(slugify("  FC/CYA Ratio "), "fc_cya_ratio");
        assert_eq!(slugify("Pool"), "pool");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn test_from_name() {
        let id = EntityId::from_name("number", "Pool Target pH").unwrap();
        assert_eq!(id.to_string(), "number.pool_target_ph");
    }

    #[test]
    fn test_serde_roundtrip_as_string() {
        let id: EntityId = "sensor.pool_temp".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sensor.pool_temp\"");
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<EntityId>("\"nope\"").is_err());
    }
}
