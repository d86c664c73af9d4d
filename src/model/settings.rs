//! Model Settings Document
//!
//! Typed view of a `*.model3.json` settings file: the file references a model
//! is assembled from, parameter groups, hit areas and layout.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::animation::parameters::ParameterId;
use crate::errors::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileReferences {
    pub moc: String,
    pub textures: Vec<String>,
    pub physics: String,
    pub pose: String,
    pub user_data: String,
    pub expressions: Vec<ExpressionRef>,
    /// Groups keyed by name, iterated in name order.
    pub motions: BTreeMap<String, Vec<MotionRef>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExpressionRef {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MotionRef {
    pub file: String,
    pub sound: String,
    /// Negative means "keep the motion's own fade".
    pub fade_in_time: f32,
    pub fade_out_time: f32,
}

impl Default for MotionRef {
    fn default() -> Self {
        Self {
            file: String::new(),
            sound: String::new(),
            fade_in_time: -1.0,
            fade_out_time: -1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ParameterGroup {
    pub target: String,
    pub name: String,
    pub ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HitArea {
    /// Drawable the area is tested against.
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ModelSettings {
    pub file_references: FileReferences,
    pub groups: Vec<ParameterGroup>,
    pub hit_areas: Vec<HitArea>,
    pub layout: Layout,
}

/// The settings `Layout` object, kept in document order.
///
/// Later keys override earlier ones when they touch the same axis, so the
/// order the document declares them in is significant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout(pub Vec<(String, f32)>);

impl Layout {
    #[must_use]
    pub fn entries(&self) -> &[(String, f32)] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Layout {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LayoutVisitor;
        impl<'de> Visitor<'de> for LayoutVisitor {
            type Value = Layout;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of layout keys to numbers")
            }
            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, f32>()? {
                    entries.push((key, value));
                }
                Ok(Layout(entries))
            }
            fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
                Ok(Layout::default())
            }
        }
        deserializer.deserialize_any(LayoutVisitor)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

impl ModelSettings {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[must_use]
    pub fn moc_file(&self) -> Option<&str> {
        non_empty(&self.file_references.moc)
    }

    #[must_use]
    pub fn physics_file(&self) -> Option<&str> {
        non_empty(&self.file_references.physics)
    }

    #[must_use]
    pub fn pose_file(&self) -> Option<&str> {
        non_empty(&self.file_references.pose)
    }

    #[must_use]
    pub fn user_data_file(&self) -> Option<&str> {
        non_empty(&self.file_references.user_data)
    }

    /// Declared expressions with a non-empty file.
    pub fn expressions(&self) -> impl Iterator<Item = &ExpressionRef> {
        self.file_references
            .expressions
            .iter()
            .filter(|e| !e.file.is_empty())
    }

    /// Texture slots in declaration order; empty names are unused slots.
    #[must_use]
    pub fn texture_slots(&self) -> &[String] {
        &self.file_references.textures
    }

    pub fn motion_groups(&self) -> impl Iterator<Item = (&str, &[MotionRef])> {
        self.file_references
            .motions
            .iter()
            .map(|(name, motions)| (name.as_str(), motions.as_slice()))
    }

    #[must_use]
    pub fn motion_count(&self, group: &str) -> usize {
        self.file_references.motions.get(group).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn total_motion_count(&self) -> usize {
        self.file_references.motions.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn motion(&self, group: &str, index: usize) -> Option<&MotionRef> {
        self.file_references.motions.get(group)?.get(index)
    }

    fn group_ids(&self, name: &str) -> Vec<ParameterId> {
        self.groups
            .iter()
            .filter(|g| g.name == name)
            .flat_map(|g| g.ids.iter().map(|id| ParameterId::new(id)))
            .collect()
    }

    #[must_use]
    pub fn eye_blink_ids(&self) -> Vec<ParameterId> {
        self.group_ids("EyeBlink")
    }

    #[must_use]
    pub fn lip_sync_ids(&self) -> Vec<ParameterId> {
        self.group_ids("LipSync")
    }

    /// Drawable id behind the hit area called `name`.
    #[must_use]
    pub fn hit_area_drawable(&self, name: &str) -> Option<&str> {
        self.hit_areas
            .iter()
            .find(|area| area.name == name)
            .map(|area| area.id.as_str())
    }
}

/// One `UserData` entry attached to a drawable or part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserDataEntry {
    pub target: String,
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct UserDataDocument {
    user_data: Vec<UserDataEntry>,
}

/// Parses a `*.userdata3.json` document.
pub fn parse_user_data(bytes: &[u8]) -> Result<Vec<UserDataEntry>> {
    let doc: UserDataDocument = serde_json::from_slice(bytes)?;
    Ok(doc.user_data)
}
