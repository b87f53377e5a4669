use anyhow::{Result, bail};

use docrag_notes::{Note, NoteStore};

pub(crate) fn print_note_line(note: &Note) {
    println!(
        "{}  {}  [{}]  {}  ({})",
        note.id,
        note.created_at.format("%Y-%m-%d %H:%M"),
        note.note_type.label(),
        note.title,
        note.linked_documents.join(", ")
    );
}

pub(crate) fn print_note_lines(notes: &[Note]) {
    if notes.is_empty() {
        println!("(no notes)");
        return;
    }
    notes.iter().for_each(print_note_line);
}

pub(crate) fn print_note(note: &Note) {
    println!("── {} ─────────────────────────────────────", note.title);
    println!("id:        {}", note.id);
    println!("type:      {}", note.note_type.label());
    println!("documents: {}", note.linked_documents.join(", "));
    println!("category:  {}", note.category);
    if !note.tags.is_empty() {
        println!("tags:      {}", note.tags.join(", "));
    }
    println!("created:   {}", note.created_at.to_rfc3339());
    if let Some(updated) = note.updated_at {
        println!("updated:   {}", updated.to_rfc3339());
    }
    println!("by:        {}", note.generated_by);
    println!();
    println!("{}", note.content);
    if let Some(context) = &note.cross_document_context {
        println!();
        println!("cross-document context:");
        println!("{context}");
    }
}

pub(crate) async fn run_notes_list(store: &NoteStore, document: Option<&str>) {
    let notes = match document {
        Some(name) => store.get_for_document(name).await,
        None => store.get_all().await,
    };
    print_note_lines(&notes);
}

pub(crate) async fn run_notes_show(store: &NoteStore, id: &str) -> Result<()> {
    match store.get_by_id(id).await {
        Some(note) => {
            print_note(&note);
            Ok(())
        }
        None => bail!("note not found: {id}"),
    }
}

pub(crate) async fn run_notes_search(store: &NoteStore, term: &str) {
    print_note_lines(&store.search(term).await);
}

pub(crate) async fn run_notes_delete(store: &NoteStore, id: &str) -> Result<()> {
    if store.get_by_id(id).await.is_none() {
        bail!("note not found: {id}");
    }
    if !store.delete(id).await {
        bail!("failed to delete note {id}");
    }
    println!("deleted note {id}");
    Ok(())
}

pub(crate) async fn run_notes_reconcile(store: &NoteStore) -> Result<()> {
    let report = store.reconcile().await?;
    println!(
        "note index reconciled in {}: {} added, {} removed",
        store.directory().display(),
        report.added,
        report.removed
    );
    Ok(())
}
