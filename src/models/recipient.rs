use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which side of the marketplace a notification is addressed to.
/// Stored as text alongside the recipient id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecipientKind {
    Adopter,
    Shelter,
}

impl RecipientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientKind::Adopter => "adopter",
            RecipientKind::Shelter => "shelter",
        }
    }
}

/// A notification recipient: an adopter account or a shelter account.
/// Carrying the id inside the variant forces every dispatch site to say
/// which side of the marketplace it is addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationRecipient {
    Adopter(Uuid),
    Shelter(Uuid),
}

impl NotificationRecipient {
    pub fn id(&self) -> Uuid {
        match self {
            NotificationRecipient::Adopter(id) | NotificationRecipient::Shelter(id) => *id,
        }
    }

    pub fn kind(&self) -> RecipientKind {
        match self {
            NotificationRecipient::Adopter(_) => RecipientKind::Adopter,
            NotificationRecipient::Shelter(_) => RecipientKind::Shelter,
        }
    }

    pub fn from_parts(kind: RecipientKind, id: Uuid) -> Self {
        match kind {
            RecipientKind::Adopter => NotificationRecipient::Adopter(id),
            RecipientKind::Shelter => NotificationRecipient::Shelter(id),
        }
    }
}

/// Fixed notification taxonomy. Stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
    System,
    Application,
    Pet,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
            NotificationKind::System => "system",
            NotificationKind::Application => "application",
            NotificationKind::Pet => "pet",
        }
    }

    /// Parse a caller-supplied tag. Unrecognized tags degrade to `Info`
    /// instead of failing: a notification is always secondary to the
    /// workflow that produced it.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "info" => NotificationKind::Info,
            "success" => NotificationKind::Success,
            "warning" => NotificationKind::Warning,
            "error" => NotificationKind::Error,
            "system" => NotificationKind::System,
            "application" => NotificationKind::Application,
            "pet" => NotificationKind::Pet,
            _ => NotificationKind::Info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_tag_round_trip() {
        for kind in [
            NotificationKind::Info,
            NotificationKind::Success,
            NotificationKind::Warning,
            NotificationKind::Error,
            NotificationKind::System,
            NotificationKind::Application,
            NotificationKind::Pet,
        ] {
            assert_eq!(NotificationKind::from_tag(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unknown_tag_falls_back_to_info() {
        assert_eq!(NotificationKind::from_tag("bogus"), NotificationKind::Info);
        assert_eq!(NotificationKind::from_tag(""), NotificationKind::Info);
        assert_eq!(NotificationKind::from_tag("INFO"), NotificationKind::Info);
    }

    #[test]
    fn test_recipient_parts() {
        let id = Uuid::new_v4();
        let r = NotificationRecipient::Shelter(id);
        assert_eq!(r.id(), id);
        assert_eq!(r.kind(), RecipientKind::Shelter);
        assert_eq!(NotificationRecipient::from_parts(r.kind(), r.id()), r);
    }
}
