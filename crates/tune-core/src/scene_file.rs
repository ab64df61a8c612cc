//! Scene JSON format.
//!
//! ```json
//! {
//!   "models": [
//!     { "shapeType": "plank",
//!       "position": { "x": 0, "y": 10, "z": 0 },
//!       "rotation": { "x": 0, "y": 0, "z": 0, "w": 1 },
//!       "scale": { "x": 8, "y": 0.5, "z": 3 },
//!       "userData": { "shapeType": "plank", "note": "C", "accidental": "", "octave": 4 } }
//!   ],
//!   "marbleInitialPosition": { "x": 0, "y": 20, "z": 0 }
//! }
//! ```
//!
//! Marbles are never listed in `models`; a single marble is rebuilt from
//! `marbleInitialPosition` on import.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Model, NoteAssignment};

#[derive(Debug, thiserror::Error)]
pub enum SceneFileError {
    #[error("Invalid scene JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3Record {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Record {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Vec3Record> for Vec3 {
    fn from(v: Vec3Record) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuatRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl From<Quat> for QuatRecord {
    fn from(q: Quat) -> Self {
        Self {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        }
    }
}

impl From<QuatRecord> for Quat {
    fn from(q: QuatRecord) -> Self {
        Quat::from_xyzw(q.x, q.y, q.z, q.w)
    }
}

/// One exported entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub shape_type: String,
    pub position: Vec3Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<QuatRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3Record>,
    #[serde(default)]
    pub user_data: Map<String, Value>,
}

impl ModelRecord {
    pub fn from_model(model: &Model) -> Self {
        Self {
            shape_type: model.shape.name().to_string(),
            position: model.transform.position.into(),
            rotation: Some(model.transform.rotation.into()),
            scale: Some(model.transform.scale.into()),
            user_data: model.user_data.clone(),
        }
    }

    pub fn rotation(&self) -> Quat {
        self.rotation.map_or(Quat::IDENTITY, Quat::from)
    }

    /// Note stored in the user data, if any.
    pub fn note(&self) -> Option<NoteAssignment> {
        NoteAssignment::from_user_data(&self.user_data)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneFile {
    #[serde(default)]
    pub models: Vec<ModelRecord>,
    #[serde(default)]
    pub marble_initial_position: Option<Vec3Record>,
}

impl SceneFile {
    /// Captures every non-marble entity plus the marble origin.
    pub fn capture(models: &[Model], marble_origin: Option<Vec3>) -> Self {
        Self {
            models: models
                .iter()
                .filter(|model| !model.is_marble())
                .map(ModelRecord::from_model)
                .collect(),
            marble_initial_position: marble_origin.map(Vec3Record::from),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SceneFileError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SceneFileError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SceneFileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn piece(shape: &str, position: Vec3, angle_deg: f32, note: Option<NoteAssignment>) -> ModelRecord {
    let mut user_data = Map::new();
    user_data.insert("shapeType".to_string(), Value::from(shape));
    if let Some(note) = note {
        note.write_user_data(&mut user_data);
    }
    ModelRecord {
        shape_type: shape.to_string(),
        position: position.into(),
        rotation: Some(Quat::from_rotation_z(angle_deg.to_radians()).into()),
        scale: None,
        user_data,
    }
}

/// Built-in demo: a zig-zag of planks playing a C major run into a drum.
pub fn demo_scene() -> SceneFile {
    let run = [("C", 60.0), ("D", 45.0), ("E", 30.0), ("F", 15.0), ("G", 0.0)];
    let mut models: Vec<ModelRecord> = run
        .iter()
        .enumerate()
        .map(|(i, (letter, y))| {
            let side = if i % 2 == 0 { -12.0 } else { 12.0 };
            let tilt = if i % 2 == 0 { -10.0 } else { 10.0 };
            piece(
                "plank",
                Vec3::new(side, *y, 0.0),
                tilt,
                Some(NoteAssignment::new(*letter, "", 4)),
            )
        })
        .collect();
    models.push(piece(
        "cylinder",
        Vec3::new(0.0, -15.0, 0.0),
        0.0,
        Some(NoteAssignment::new("C", "", 5)),
    ));
    models.push(piece("decoration-star", Vec3::new(25.0, 75.0, -2.0), 0.0, None));

    SceneFile {
        models,
        marble_initial_position: Some(Vec3::new(-12.0, 75.0, 0.0).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ShapeKind;
    use crate::test_utils::model_at;

    #[test]
    fn test_field_names() {
        let mut plank = model_at(1, ShapeKind::Plank, Vec3::new(1.0, 2.0, 3.0), Vec3::ONE);
        plank.set_note(Some(NoteAssignment::new("C", "", 4)));
        let file = SceneFile::capture(&[plank], Some(Vec3::new(0.0, 20.0, 0.0)));

        let json: Value = serde_json::from_str(&file.to_json().unwrap()).unwrap();
        let model = &json["models"][0];
        assert_eq!(model["shapeType"], "plank");
        assert_eq!(model["position"]["y"], 2.0);
        assert_eq!(model["rotation"]["w"], 1.0);
        assert_eq!(model["userData"]["note"], "C");
        assert_eq!(model["userData"]["octave"], 4);
        assert_eq!(json["marbleInitialPosition"]["y"], 20.0);
    }

    #[test]
    fn test_capture_excludes_marbles() {
        let models = vec![
            model_at(1, ShapeKind::Marble, Vec3::ZERO, Vec3::ONE),
            model_at(2, ShapeKind::Plank, Vec3::ZERO, Vec3::ONE),
        ];
        let file = SceneFile::capture(&models, None);
        assert_eq!(file.models.len(), 1);
        assert_eq!(file.models[0].shape_type, "plank");

        let json: Value = serde_json::from_str(&file.to_json().unwrap()).unwrap();
        assert!(json["marbleInitialPosition"].is_null());
    }

    #[test]
    fn test_minimal_record_defaults() {
        let file = SceneFile::from_json(
            r#"{ "models": [ { "shapeType": "cylinder", "position": { "x": 1, "y": 2, "z": 3 } } ] }"#,
        )
        .unwrap();
        let record = &file.models[0];
        assert_eq!(record.rotation(), Quat::IDENTITY);
        assert!(record.scale.is_none());
        assert!(record.user_data.is_empty());
        assert!(file.marble_initial_position.is_none());
    }

    #[test]
    fn test_user_data_preserved() {
        let json = r#"{ "models": [ { "shapeType": "plank", "position": { "x": 0, "y": 0, "z": 0 },
            "userData": { "shapeType": "plank", "label": "intro", "note": "B", "accidental": "b", "octave": 3 } } ] }"#;
        let file = SceneFile::from_json(json).unwrap();
        assert_eq!(file.models[0].note().map(|n| n.name()), Some("Bb3".to_string()));

        let again = SceneFile::from_json(&file.to_json().unwrap()).unwrap();
        assert_eq!(again.models[0].user_data["label"], "intro");
    }

    #[test]
    fn test_invalid_json() {
        assert!(SceneFile::from_json("{ \"models\": 3 }").is_err());
    }

    #[test]
    fn test_demo_scene() {
        let demo = demo_scene();
        assert_eq!(demo.models.len(), 7);
        assert!(demo.marble_initial_position.is_some());
        assert!(demo.models.iter().all(|m| m.shape_type != "marble"));
        let notes: Vec<String> = demo
            .models
            .iter()
            .filter_map(|m| m.note().map(|n| n.name()))
            .collect();
        assert_eq!(notes, vec!["C4", "D4", "E4", "F4", "G4", "C5"]);
    }
}
