//! Cache tags
//!
//! A tag is a tag type plus an optional entity id. Collection reads provide
//! the bare collection tag (`Organizations`), reads by id provide a tag with
//! an id (`Organization:5`).
//!
//! Matching follows the invalidation rule:
//! - an invalidated tag **without** id matches every provided tag of the same
//!   type, with or without id
//! - an invalidated tag **with** id matches only the identical provided tag

use crate::core::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagType {
    Organizations,
    Organization,
    Locations,
    Location,
    Providers,
    Provider,
    Specializations,
    Specialization,
    Appointments,
}

impl TagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagType::Organizations => "Organizations",
            TagType::Organization => "Organization",
            TagType::Locations => "Locations",
            TagType::Location => "Location",
            TagType::Providers => "Providers",
            TagType::Provider => "Provider",
            TagType::Specializations => "Specializations",
            TagType::Specialization => "Specialization",
            TagType::Appointments => "Appointments",
        }
    }

    pub fn all() -> &'static [TagType] {
        &[
            TagType::Organizations,
            TagType::Organization,
            TagType::Locations,
            TagType::Location,
            TagType::Providers,
            TagType::Provider,
            TagType::Specializations,
            TagType::Specialization,
            TagType::Appointments,
        ]
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TagType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagType::all()
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Unknown tag type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub tag_type: TagType,
    pub id: Option<EntityId>,
}

impl Tag {
    /// A tag covering a whole collection (`Organizations`)
    pub fn collection(tag_type: TagType) -> Self {
        Self { tag_type, id: None }
    }

    /// A tag for one entity (`Organization:5`)
    pub fn entity(tag_type: TagType, id: EntityId) -> Self {
        Self {
            tag_type,
            id: Some(id),
        }
    }

    /// Whether invalidating `self` invalidates an entry providing `provided`
    pub fn matches(&self, provided: &Tag) -> bool {
        if self.tag_type != provided.tag_type {
            return false;
        }
        match self.id {
            None => true,
            Some(id) => provided.id == Some(id),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}:{}", self.tag_type, id),
            None => write!(f, "{}", self.tag_type),
        }
    }
}

impl FromStr for Tag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((tag_type, id)) => {
                let id = id
                    .parse::<EntityId>()
                    .map_err(|e| format!("Invalid tag id '{}': {}", id, e))?;
                Ok(Tag::entity(tag_type.parse()?, id))
            }
            None => Ok(Tag::collection(s.parse()?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(
            Tag::collection(TagType::Organizations).to_string(),
            "Organizations"
        );
        assert_eq!(
            Tag::entity(TagType::Organization, 5).to_string(),
            "Organization:5"
        );
    }

    #[test]
    fn test_parse_roundtrip() {
        let tag: Tag = "Provider:42".parse().unwrap();
        assert_eq!(tag, Tag::entity(TagType::Provider, 42));
        assert!("Unknown".parse::<Tag>().is_err());
        assert!("Provider:abc".parse::<Tag>().is_err());
    }

    #[test]
    fn test_collection_and_entity_tags_are_distinct() {
        assert_ne!(
            Tag::collection(TagType::Organizations),
            Tag::entity(TagType::Organization, 5)
        );
        assert!(!Tag::collection(TagType::Organizations).matches(&Tag::entity(TagType::Organization, 5)));
    }

    #[test]
    fn test_bare_tag_matches_all_ids_of_type() {
        let bare = Tag::collection(TagType::Organization);
        assert!(bare.matches(&Tag::entity(TagType::Organization, 1)));
        assert!(bare.matches(&Tag::entity(TagType::Organization, 2)));
        assert!(bare.matches(&Tag::collection(TagType::Organization)));
    }

    #[test]
    fn test_tag_with_id_matches_exactly() {
        let five = Tag::entity(TagType::Organization, 5);
        assert!(five.matches(&Tag::entity(TagType::Organization, 5)));
        assert!(!five.matches(&Tag::entity(TagType::Organization, 6)));
        assert!(!five.matches(&Tag::collection(TagType::Organization)));
    }
}
