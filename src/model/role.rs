//! Association endpoints
//!
//! A role pairs a player (a topic or an association) with a role type. Topic
//! players are addressed either by id or by URI, never both.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// How a topic player is addressed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPlayer {
    Id(i64),
    Uri(String),
}

/// A role played by a topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTopicRole", into = "RawTopicRole")]
pub struct TopicRoleModel {
    player: TopicPlayer,
    role_type_uri: String,
}

/// A role played by an association
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAssociationRole", into = "RawAssociationRole")]
pub struct AssociationRoleModel {
    assoc_id: i64,
    role_type_uri: String,
}

/// One endpoint of an association
///
/// Wire form: `{topic_id|topic_uri, role_type_uri}` or `{assoc_id, role_type_uri}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleModel {
    Topic(TopicRoleModel),
    Association(AssociationRoleModel),
}

fn check_role_type(role_type_uri: &str) -> CoreResult<()> {
    if role_type_uri.trim().is_empty() {
        return Err(CoreError::InvalidState(
            "role type URI must not be empty".to_string(),
        ));
    }
    Ok(())
}

impl TopicRoleModel {
    /// Create a topic role; exactly one of `topic_id` and `topic_uri` must be given
    pub fn new(
        topic_id: Option<i64>,
        topic_uri: Option<String>,
        role_type_uri: impl Into<String>,
    ) -> CoreResult<Self> {
        let role_type_uri = role_type_uri.into();
        check_role_type(&role_type_uri)?;
        let player = match (topic_id, topic_uri) {
            (Some(id), None) => TopicPlayer::Id(id),
            (None, Some(uri)) => TopicPlayer::Uri(uri),
            (Some(_), Some(_)) => {
                return Err(CoreError::InvalidState(
                    "topic role is addressed by both id and URI".to_string(),
                ))
            }
            (None, None) => {
                return Err(CoreError::InvalidState(
                    "topic role is addressed by neither id nor URI".to_string(),
                ))
            }
        };
        Ok(Self {
            player,
            role_type_uri,
        })
    }

    pub fn player(&self) -> &TopicPlayer {
        &self.player
    }

    pub fn topic_id(&self) -> Option<i64> {
        match &self.player {
            TopicPlayer::Id(id) => Some(*id),
            TopicPlayer::Uri(_) => None,
        }
    }

    pub fn topic_uri(&self) -> Option<&str> {
        match &self.player {
            TopicPlayer::Id(_) => None,
            TopicPlayer::Uri(uri) => Some(uri),
        }
    }

    pub fn role_type_uri(&self) -> &str {
        &self.role_type_uri
    }
}

impl AssociationRoleModel {
    pub fn new(assoc_id: i64, role_type_uri: impl Into<String>) -> CoreResult<Self> {
        let role_type_uri = role_type_uri.into();
        check_role_type(&role_type_uri)?;
        Ok(Self {
            assoc_id,
            role_type_uri,
        })
    }

    pub fn assoc_id(&self) -> i64 {
        self.assoc_id
    }
}

impl RoleModel {
    /// A topic role addressed by id
    pub fn topic_id(id: i64, role_type_uri: impl Into<String>) -> CoreResult<Self> {
        TopicRoleModel::new(Some(id), None, role_type_uri).map(RoleModel::Topic)
    }

    /// A topic role addressed by URI
    pub fn topic_uri(uri: impl Into<String>, role_type_uri: impl Into<String>) -> CoreResult<Self> {
        TopicRoleModel::new(None, Some(uri.into()), role_type_uri).map(RoleModel::Topic)
    }

    /// An association role
    pub fn association(assoc_id: i64, role_type_uri: impl Into<String>) -> CoreResult<Self> {
        AssociationRoleModel::new(assoc_id, role_type_uri).map(RoleModel::Association)
    }

    pub fn role_type_uri(&self) -> &str {
        match self {
            RoleModel::Topic(role) => &role.role_type_uri,
            RoleModel::Association(role) => &role.role_type_uri,
        }
    }

    pub fn set_role_type_uri(&mut self, role_type_uri: impl Into<String>) -> CoreResult<()> {
        let role_type_uri = role_type_uri.into();
        check_role_type(&role_type_uri)?;
        match self {
            RoleModel::Topic(role) => role.role_type_uri = role_type_uri,
            RoleModel::Association(role) => role.role_type_uri = role_type_uri,
        }
        Ok(())
    }

    /// Player id, unless this is a topic role addressed by URI
    pub fn player_id(&self) -> Option<i64> {
        match self {
            RoleModel::Topic(role) => role.topic_id(),
            RoleModel::Association(role) => Some(role.assoc_id),
        }
    }

    /// The player as an object reference, if addressed by id
    pub fn player_ref(&self) -> Option<super::ObjectRef> {
        match self {
            RoleModel::Topic(role) => role.topic_id().map(super::ObjectRef::Topic),
            RoleModel::Association(role) => Some(super::ObjectRef::Association(role.assoc_id)),
        }
    }

    pub fn is_topic_role(&self) -> bool {
        matches!(self, RoleModel::Topic(_))
    }

    /// Whether both roles address the same player the same way.
    ///
    /// Topic roles match on addressing mode and value, association roles on
    /// player id. Role types are not compared.
    pub fn refs_same_object(&self, other: &RoleModel) -> bool {
        match (self, other) {
            (RoleModel::Topic(a), RoleModel::Topic(b)) => a.player == b.player,
            (RoleModel::Association(a), RoleModel::Association(b)) => a.assoc_id == b.assoc_id,
            _ => false,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawTopicRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_uri: Option<String>,
    role_type_uri: String,
}

impl TryFrom<RawTopicRole> for TopicRoleModel {
    type Error = CoreError;

    fn try_from(raw: RawTopicRole) -> Result<Self, Self::Error> {
        TopicRoleModel::new(raw.topic_id, raw.topic_uri, raw.role_type_uri)
    }
}

impl From<TopicRoleModel> for RawTopicRole {
    fn from(role: TopicRoleModel) -> Self {
        let (topic_id, topic_uri) = match role.player {
            TopicPlayer::Id(id) => (Some(id), None),
            TopicPlayer::Uri(uri) => (None, Some(uri)),
        };
        Self {
            topic_id,
            topic_uri,
            role_type_uri: role.role_type_uri,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawAssociationRole {
    assoc_id: i64,
    role_type_uri: String,
}

impl TryFrom<RawAssociationRole> for AssociationRoleModel {
    type Error = CoreError;

    fn try_from(raw: RawAssociationRole) -> Result<Self, Self::Error> {
        AssociationRoleModel::new(raw.assoc_id, raw.role_type_uri)
    }
}

impl From<AssociationRoleModel> for RawAssociationRole {
    fn from(role: AssociationRoleModel) -> Self {
        Self {
            assoc_id: role.assoc_id,
            role_type_uri: role.role_type_uri,
        }
    }
}
