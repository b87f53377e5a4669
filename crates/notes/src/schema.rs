use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version written into every note file.  Files without the field are
/// treated as version 1.
pub const NOTE_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    NOTE_SCHEMA_VERSION
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteType {
    #[default]
    SingleDocument,
    MultiDocument,
}

impl NoteType {
    /// Classify by how many documents a note links to.
    pub fn for_document_count(count: usize) -> Self {
        if count > 1 {
            Self::MultiDocument
        } else {
            Self::SingleDocument
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::SingleDocument => "SingleDocument",
            Self::MultiDocument => "MultiDocument",
        }
    }
}

/// A persisted artifact derived from one or more documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Empty until the store assigns one; immutable afterwards.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub linked_documents: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub generated_by: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub note_type: NoteType,
    #[serde(default)]
    pub cross_document_context: Option<String>,
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

impl Note {
    /// A fresh, unsaved note linked to `linked_documents`.  The note type
    /// follows the document count.
    pub fn new(linked_documents: Vec<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        let note_type = NoteType::for_document_count(linked_documents.len());
        Self {
            id: String::new(),
            linked_documents,
            title: title.into(),
            content: content.into(),
            category: String::new(),
            created_at: Utc::now(),
            updated_at: None,
            tags: Vec::new(),
            generated_by: String::new(),
            instructions: String::new(),
            note_type,
            cross_document_context: None,
            schema_version: NOTE_SCHEMA_VERSION,
        }
    }

    pub fn is_cross_document(&self) -> bool {
        self.note_type == NoteType::MultiDocument && self.linked_documents.len() > 1
    }

    pub fn links(&self, file_name: &str) -> bool {
        self.linked_documents.iter().any(|doc| doc == file_name)
    }

    /// Case-insensitive substring match over title, content, category,
    /// tags and linked document names.  `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        let hit = |field: &str| field.to_lowercase().contains(needle);
        hit(&self.title)
            || hit(&self.content)
            || hit(&self.category)
            || self.tags.iter().any(|tag| hit(tag))
            || self.linked_documents.iter().any(|doc| hit(doc))
    }
}

/// Listing record kept in `notes_index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteIndexEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub linked_documents: Vec<String>,
    #[serde(default)]
    pub note_type: NoteType,
}

impl NoteIndexEntry {
    pub fn from_note(note: &Note) -> Self {
        Self {
            id: note.id.clone(),
            title: note.title.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at.unwrap_or(note.created_at),
            linked_documents: note.linked_documents.clone(),
            note_type: note.note_type,
        }
    }
}
