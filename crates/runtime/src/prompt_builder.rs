//! Pure prompt assembly and post-processing of generated note text.

use std::fmt::Write as _;

use docrag_core::{FileRecord, SummaryRecord, truncate_with_ellipsis};
use docrag_notes::NoteType;

pub const DEFAULT_NOTE_INSTRUCTIONS: &str = "Generate a comprehensive note summarizing the key points, \
insights, and important information from this document. Focus on actionable insights and main takeaways.";

pub const DEFAULT_CROSS_DOCUMENT_INSTRUCTIONS: &str = "Analyze the relationships and connections between \
these documents. Identify common themes, contradictions, and insights that emerge from comparing them.";

pub const FALLBACK_NOTE_TITLE: &str = "Generated Note";

const MAX_TITLE_CHARS: usize = 100;

/// Words that open the cross-document section of a generated note.
const CROSS_DOCUMENT_MARKERS: [&str; 3] = ["cross-document", "relationships", "comparative"];

// ─── note prompt ─────────────────────────────────────────────────────────────

/// Everything needed to assemble a note-generation prompt.
pub struct NotePromptInputs<'a> {
    pub document_names: &'a [String],
    pub note_type: NoteType,
    pub instructions: &'a str,
    pub cross_document_instructions: &'a str,
    /// Cached summaries in request order; names without one are absent.
    pub summaries: &'a [SummaryRecord],
}

pub fn build_note_prompt(inputs: &NotePromptInputs<'_>) -> String {
    let mut prompt = String::from(
        "You are an expert document analyst. Generate a comprehensive note based on the \
         following documents and instructions.\n\n",
    );

    match inputs.note_type {
        NoteType::MultiDocument => {
            let _ = write!(
                prompt,
                "MULTI-DOCUMENT ANALYSIS REQUEST:\n\
                 Number of documents: {count}\n\
                 Documents: {names}\n\n\
                 Instructions for cross-document analysis:\n\
                 {cross}\n\n\
                 Please generate a note that:\n\
                 1. Identifies key themes across all documents\n\
                 2. Highlights relationships and connections between documents\n\
                 3. Provides comparative analysis where relevant\n\
                 4. Summarizes insights that emerge from the combination of documents\n\n",
                count = inputs.document_names.len(),
                names = inputs.document_names.join(", "),
                cross = inputs.cross_document_instructions,
            );
        }
        NoteType::SingleDocument => {
            let name = inputs.document_names.first().map(String::as_str).unwrap_or_default();
            let _ = write!(
                prompt,
                "SINGLE DOCUMENT ANALYSIS REQUEST:\n\
                 Document: {name}\n\n\
                 Instructions:\n\
                 {instructions}\n\n",
                instructions = inputs.instructions,
            );
        }
    }

    prompt.push_str("DOCUMENT SUMMARIES:\n==================\n");
    for record in inputs.summaries {
        let _ = write!(
            prompt,
            "Document: {}\nSummary: {}\n\n",
            record.file_name, record.summary
        );
    }

    prompt.push_str(
        "Please generate a well-structured note with:\n\
         - A clear, descriptive title\n\
         - Organized content with key points\n\
         - Actionable insights\n\
         - Relevant tags or categories\n",
    );
    prompt
}

// ─── generated text post-processing ─────────────────────────────────────────

/// First non-blank line, capped at 100 characters including the ellipsis.
pub fn extract_title(content: &str) -> String {
    match content.lines().map(str::trim).find(|line| !line.is_empty()) {
        None => FALLBACK_NOTE_TITLE.to_string(),
        Some(line) if line.chars().count() > MAX_TITLE_CHARS => {
            truncate_with_ellipsis(line, MAX_TITLE_CHARS - 3)
        }
        Some(line) => line.to_string(),
    }
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// The section that starts at the first line mentioning a cross-document
/// marker and runs up to the next Markdown heading.  `None` for one
/// document or when no marker appears.
pub fn extract_cross_document_context(content: &str, document_count: usize) -> Option<String> {
    if document_count <= 1 {
        return None;
    }

    let mut lines = content.lines();
    let start = lines.by_ref().find(|line| {
        let lower = line.to_lowercase();
        CROSS_DOCUMENT_MARKERS.iter().any(|marker| lower.contains(marker))
    })?;

    let mut section = vec![start];
    section.extend(lines.take_while(|line| !is_heading(line)));
    let text = section.join("\n").trim_end().to_string();
    (!text.is_empty()).then_some(text)
}

// ─── chat context ────────────────────────────────────────────────────────────

/// A document offered to the model as chat context.
pub struct ChatDocument {
    pub record: FileRecord,
    /// `None` when the content could not be read.
    pub content: Option<String>,
}

/// `1536` -> `"1.5 KB"`, `2048` -> `"2 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rendered = format!("{value:.1}");
    let rendered = rendered.strip_suffix(".0").unwrap_or(&rendered);
    format!("{rendered} {}", UNITS[unit])
}

/// Wrap `question` with a description and content preview of each
/// document.  Without documents the question is returned unchanged.
pub fn build_document_context_prompt(
    documents: &[ChatDocument],
    question: &str,
    max_content_chars: usize,
) -> String {
    if documents.is_empty() {
        return question.to_string();
    }

    let mut prompt = String::from("Context: The user is asking about the following document(s):\n\n");
    for doc in documents {
        let record = &doc.record;
        let _ = writeln!(prompt, "Document: {}", record.file_name);
        let _ = writeln!(prompt, "Size: {}", format_file_size(record.size_bytes));
        let _ = writeln!(prompt, "Type: {}", record.extension);
        let _ = writeln!(prompt, "Created: {}", record.created_at.format("%Y-%m-%d"));
        match &doc.content {
            Some(content) if !content.is_empty() => {
                let _ = writeln!(
                    prompt,
                    "Content preview: {}",
                    truncate_with_ellipsis(content, max_content_chars)
                );
            }
            Some(_) => {}
            None => prompt.push_str("Note: Content could not be loaded for analysis.\n"),
        }
        prompt.push('\n');
    }

    let _ = write!(
        prompt,
        "User Question: {question}\n\n\
         Please provide a helpful response based on the document(s) and user's question."
    );
    prompt
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::{TimeZone, Utc};

    use super::*;

    fn summary(name: &str, text: &str) -> SummaryRecord {
        SummaryRecord::new(name, text)
    }

    #[test]
    fn single_document_prompt_layout() {
        let names = vec!["report.txt".to_string()];
        let summaries = vec![summary("report.txt", "Strong quarter.")];
        let prompt = build_note_prompt(&NotePromptInputs {
            document_names: &names,
            note_type: NoteType::SingleDocument,
            instructions: DEFAULT_NOTE_INSTRUCTIONS,
            cross_document_instructions: DEFAULT_CROSS_DOCUMENT_INSTRUCTIONS,
            summaries: &summaries,
        });

        assert!(prompt.starts_with("You are an expert document analyst."));
        assert!(prompt.contains("SINGLE DOCUMENT ANALYSIS REQUEST:\nDocument: report.txt\n"));
        assert!(prompt.contains(&format!("Instructions:\n{DEFAULT_NOTE_INSTRUCTIONS}\n")));
        assert!(prompt.contains("Document: report.txt\nSummary: Strong quarter.\n"));
        assert!(!prompt.contains("MULTI-DOCUMENT"));
        assert!(prompt.ends_with("- Relevant tags or categories\n"));
    }

    #[test]
    fn multi_document_prompt_lists_every_document() {
        let names = vec!["a.md".to_string(), "b.md".to_string(), "c.md".to_string()];
        let summaries = vec![summary("a.md", "A."), summary("c.md", "C.")];
        let prompt = build_note_prompt(&NotePromptInputs {
            document_names: &names,
            note_type: NoteType::MultiDocument,
            instructions: DEFAULT_NOTE_INSTRUCTIONS,
            cross_document_instructions: "Compare them.",
            summaries: &summaries,
        });

        assert!(prompt.contains("Number of documents: 3\nDocuments: a.md, b.md, c.md\n"));
        assert!(prompt.contains("Instructions for cross-document analysis:\nCompare them.\n"));
        assert!(prompt.contains("Summary: A."));
        assert!(prompt.contains("Summary: C."));
        assert!(!prompt.contains(DEFAULT_NOTE_INSTRUCTIONS));
    }

    #[test]
    fn title_is_first_non_blank_line() {
        assert_eq!(extract_title("\n  \n  # Heading \nbody"), "# Heading");
        assert_eq!(extract_title(""), FALLBACK_NOTE_TITLE);
        assert_eq!(extract_title("   \n\t"), FALLBACK_NOTE_TITLE);
    }

    #[test]
    fn long_title_is_capped_at_one_hundred_chars() {
        let long = "x".repeat(150);
        let title = extract_title(&long);
        assert_eq!(title.chars().count(), 100);
        assert!(title.ends_with("..."));

        let exact = "y".repeat(100);
        assert_eq!(extract_title(&exact), exact);
    }

    #[test]
    fn cross_document_context_runs_to_next_heading() {
        let content = "# Note\nIntro\n## Document Relationships\n- A cites B\n- B extends A\n## Action Items\n- ship";
        let context = extract_cross_document_context(content, 2).unwrap();
        assert_eq!(context, "## Document Relationships\n- A cites B\n- B extends A");
    }

    #[test]
    fn cross_document_context_absent_cases() {
        let content = "## Comparative Analysis\nsimilar";
        assert!(extract_cross_document_context(content, 1).is_none());
        assert!(extract_cross_document_context("# Title\nnothing here", 2).is_none());
        assert_eq!(
            extract_cross_document_context(content, 3).as_deref(),
            Some("## Comparative Analysis\nsimilar")
        );
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2048), "2 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5 MB");
    }

    fn chat_doc(name: &str, content: Option<&str>) -> ChatDocument {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        ChatDocument {
            record: FileRecord {
                original_path: PathBuf::from(name),
                copied_path: PathBuf::from(name),
                file_name: name.to_string(),
                created_at: created,
                modified_at: created,
                size_bytes: 2048,
                char_count: content.map(str::len).unwrap_or(0),
                extension: ".txt".into(),
            },
            content: content.map(str::to_string),
        }
    }

    #[test]
    fn context_prompt_without_documents_is_the_question() {
        assert_eq!(build_document_context_prompt(&[], "hi?", 2000), "hi?");
    }

    #[test]
    fn context_prompt_describes_each_document() {
        let long = "z".repeat(2500);
        let docs = vec![chat_doc("a.txt", Some(&long)), chat_doc("b.txt", None)];
        let prompt = build_document_context_prompt(&docs, "What changed?", 2000);

        assert!(prompt.starts_with("Context: The user is asking about the following document(s):\n\n"));
        assert!(prompt.contains("Document: a.txt\nSize: 2 KB\nType: .txt\nCreated: 2024-05-01\n"));
        assert!(prompt.contains(&format!("Content preview: {}...\n", "z".repeat(2000))));
        assert!(prompt.contains("Document: b.txt"));
        assert!(prompt.contains("Note: Content could not be loaded for analysis.\n"));
        assert!(prompt.ends_with(
            "User Question: What changed?\n\nPlease provide a helpful response based on the document(s) and user's question."
        ));
    }
}
