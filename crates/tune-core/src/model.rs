//! Scene entities and their note assignments.

use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::BodyHandle;
use crate::highlight::HighlightColor;

/// Unique identifier of a scene entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shape category of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Marble,
    Plank,
    Cylinder,
    Curve,
    /// Purely visual piece (`decoration-*`); never simulated.
    Decoration(String),
    /// A prototype the physics layer has no collider recipe for.
    Other(String),
}

impl ShapeKind {
    pub const DECORATION_PREFIX: &'static str = "decoration";

    pub fn from_name(name: &str) -> Self {
        match name {
            "marble" => Self::Marble,
            "plank" => Self::Plank,
            "cylinder" => Self::Cylinder,
            "curve" => Self::Curve,
            other if other.starts_with(Self::DECORATION_PREFIX) => {
                Self::Decoration(other.to_string())
            }
            other => Self::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Marble => "marble",
            Self::Plank => "plank",
            Self::Cylinder => "cylinder",
            Self::Curve => "curve",
            Self::Decoration(name) | Self::Other(name) => name,
        }
    }

    pub fn is_marble(&self) -> bool {
        matches!(self, Self::Marble)
    }

    /// Pieces a marble can jump to: everything except marbles and curves.
    pub fn is_jump_target(&self) -> bool {
        !matches!(self, Self::Marble | Self::Curve)
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Visual transform of an entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Flat note names in chromatic order, as used by the note sample files.
pub const NOTE_LETTERS: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Octave range available on an 88-key piano for a note name.
pub fn octave_range(note: &str) -> Option<(i32, i32)> {
    match note {
        "A" | "Bb" | "B" => Some((0, 7)),
        "C" => Some((1, 8)),
        "Db" | "D" | "Eb" | "E" | "F" | "Gb" | "G" | "Ab" => Some((1, 7)),
        _ => None,
    }
}

/// All 88 piano key names from A0 to C8, lowest first.
pub fn piano_note_names() -> Vec<String> {
    let mut names = Vec::with_capacity(88);
    for octave in 0..=8 {
        for note in NOTE_LETTERS {
            if let Some((low, high)) = octave_range(note)
                && (low..=high).contains(&octave)
            {
                names.push(format!("{note}{octave}"));
            }
        }
    }
    names
}

/// Musical note attached to a piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteAssignment {
    /// Natural letter, `A` through `G`.
    pub letter: String,
    /// Either empty or `b`.
    #[serde(default)]
    pub accidental: String,
    pub octave: i32,
}

impl NoteAssignment {
    pub fn new(letter: impl Into<String>, accidental: impl Into<String>, octave: i32) -> Self {
        Self {
            letter: letter.into(),
            accidental: accidental.into(),
            octave,
        }
    }

    /// Sample name, e.g. `C4` or `Bb3`.
    pub fn name(&self) -> String {
        format!("{}{}{}", self.letter, self.accidental, self.octave)
    }

    /// Whether the note exists on an 88-key piano.
    pub fn is_playable(&self) -> bool {
        let note = format!("{}{}", self.letter, self.accidental);
        octave_range(&note).is_some_and(|(low, high)| (low..=high).contains(&self.octave))
    }

    /// Reads `note` / `accidental` / `octave` from entity user data.
    pub fn from_user_data(data: &Map<String, Value>) -> Option<Self> {
        let letter = data.get("note")?.as_str()?;
        let octave = data.get("octave")?.as_i64()?;
        let accidental = data
            .get("accidental")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Some(Self::new(letter, accidental, i32::try_from(octave).ok()?))
    }

    /// Writes the note back into entity user data.
    pub fn write_user_data(&self, data: &mut Map<String, Value>) {
        data.insert("note".to_string(), Value::from(self.letter.clone()));
        data.insert("accidental".to_string(), Value::from(self.accidental.clone()));
        data.insert("octave".to_string(), Value::from(self.octave));
    }
}

/// A placed entity.
#[derive(Debug, Clone)]
pub struct Model {
    pub id: EntityId,
    pub shape: ShapeKind,
    pub transform: Transform,
    /// Simulated body, absent for decorations and while dragged.
    pub body: Option<BodyHandle>,
    /// Explicit jump target overriding the height order.
    pub next_target: Option<EntityId>,
    pub note: Option<NoteAssignment>,
    pub highlight: Option<HighlightColor>,
    /// Free-form data carried through export and import.
    pub user_data: Map<String, Value>,
}

impl Model {
    pub fn new(id: EntityId, shape: ShapeKind, transform: Transform) -> Self {
        let mut user_data = Map::new();
        user_data.insert("shapeType".to_string(), Value::from(shape.name()));
        Self {
            id,
            shape,
            transform,
            body: None,
            next_target: None,
            note: None,
            highlight: None,
            user_data,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn is_marble(&self) -> bool {
        self.shape.is_marble()
    }

    /// Assigns or clears the note, keeping user data in step.
    pub fn set_note(&mut self, note: Option<NoteAssignment>) {
        match &note {
            Some(note) => note.write_user_data(&mut self.user_data),
            None => {
                for key in ["note", "accidental", "octave"] {
                    self.user_data.remove(key);
                }
            }
        }
        self.note = note;
    }
}
