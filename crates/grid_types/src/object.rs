//! Scene objects and how they are handed to another region.

use crate::types::{AgentId, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One prim of a linked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenePart {
    pub id: Uuid,
    pub name: String,
    /// Scene-scoped number, 0 until a scene assigns one
    pub local_id: u32,
    /// Offset from the object's root position
    pub offset: Vector3,
}

/// A linked group of parts living in exactly one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: Uuid,
    pub name: String,
    pub owner_id: AgentId,
    pub position: Vector3,
    /// Scene-scoped number, 0 until a scene assigns one
    pub local_id: u32,
    pub parts: Vec<ScenePart>,
}

impl SceneObject {
    /// Creates a single-part object owned by `owner_id`.
    pub fn new(name: impl Into<String>, owner_id: AgentId, position: Vector3) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            name: name.clone(),
            owner_id,
            position,
            local_id: 0,
            parts: vec![ScenePart {
                id: Uuid::new_v4(),
                name,
                local_id: 0,
                offset: Vector3::ZERO,
            }],
        }
    }

    /// Deep copy for insertion into another scene of the same process.
    ///
    /// In-world ids are kept; scene-scoped local ids are cleared so the
    /// receiving scene assigns its own.
    pub fn copy_for_new_scene(&self) -> SceneObject {
        let mut copy = self.clone();
        copy.local_id = 0;
        for part in &mut copy.parts {
            part.local_id = 0;
        }
        copy
    }
}

/// How an object reaches its destination scene.
///
/// A scene graph node has exactly one owning scene. An object that still
/// belongs to a scene in this process must therefore be copied before the
/// destination takes it; one that arrived from the network has no other
/// owner and is adopted as-is.
#[derive(Debug, Clone)]
pub enum ObjectHandoff {
    /// Object owned by a scene in this process; the destination receives a deep copy
    Local(Arc<SceneObject>),
    /// Object deserialized from another node; the destination adopts this instance
    Remote(Arc<SceneObject>),
}

impl ObjectHandoff {
    pub fn object(&self) -> &Arc<SceneObject> {
        match self {
            ObjectHandoff::Local(object) | ObjectHandoff::Remote(object) => object,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ObjectHandoff::Local(_))
    }

    /// Resolves the instance the destination scene should insert.
    pub fn into_destination_object(self) -> Arc<SceneObject> {
        match self {
            ObjectHandoff::Local(object) => Arc::new(object.copy_for_new_scene()),
            ObjectHandoff::Remote(object) => object,
        }
    }
}
