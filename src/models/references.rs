use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// A user acting on content; role gates moderation operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
}

impl Actor {
    pub fn new(display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            role,
            is_active: true,
        }
    }

    /// Moderator-or-above capability check
    pub fn is_moderator(&self) -> bool {
        self.role >= Role::Moderator
    }
}

/// User role ladder; ordering is capability ordering
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, EnumString, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    ContentCreator,
    Moderator,
    Admin,
}

/// Shallow category summary carried into index documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
}

/// Shallow topic summary; a topic belongs to a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    pub id: Uuid,
    pub category_id: Uuid,
    pub name: String,
    pub is_active: bool,
}

/// Shallow tag summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagSummary {
    pub id: Uuid,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ladder_ordering() {
        assert!(Role::Admin > Role::Moderator);
        assert!(Role::Moderator > Role::ContentCreator);
        assert!(Role::ContentCreator > Role::User);
    }

    #[test]
    fn test_moderator_capability() {
        assert!(Actor::new("mod", Role::Moderator).is_moderator());
        assert!(Actor::new("admin", Role::Admin).is_moderator());
        assert!(!Actor::new("writer", Role::ContentCreator).is_moderator());
        assert!(!Actor::new("user", Role::User).is_moderator());
    }
}
