//! Serialisierbare Form eines Entities.

use serde::{Deserialize, Serialize};

use crate::core::{Entity, EntityData, EntityId, Loc, Member, Tags};

/// Flacher Record; nur die zur Variante passenden Felder sind belegt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Loc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
}

impl From<&Entity> for EntityRecord {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id(),
            tags: entity.tags().clone(),
            loc: entity.loc(),
            nodes: entity.nodes().to_vec(),
            members: entity.members().to_vec(),
        }
    }
}

impl TryFrom<EntityRecord> for Entity {
    type Error = String;

    fn try_from(record: EntityRecord) -> Result<Self, Self::Error> {
        use crate::core::EntityKind;

        let id = record.id;
        let data = match id.kind() {
            EntityKind::Point => {
                if !record.nodes.is_empty() || !record.members.is_empty() {
                    log::warn!("Point {} enthält nodes/members, werden ignoriert", id);
                }
                let loc = record
                    .loc
                    .ok_or_else(|| format!("Point {id} ohne Koordinate"))?;
                if !loc.is_finite() {
                    return Err(format!("Point {id} hat ungültige Koordinate {loc}"));
                }
                EntityData::Point { loc }
            }
            EntityKind::Line => EntityData::Line {
                nodes: record.nodes.into(),
            },
            EntityKind::Relation => EntityData::Relation {
                members: record.members.into(),
            },
        };
        Ok(Entity::new(id, data, record.tags))
    }
}
