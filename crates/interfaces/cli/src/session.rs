use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;

use docrag_runtime::{App, GenerateNoteRequest};

use crate::notes_cmds::{print_note, print_note_lines};

const HELP: &[&str] = &[
    "/files                         list workspace files",
    "/status                        workspace status",
    "/summary <file>                cached summary, generating it if needed",
    "/summaries <file>...           cached summaries only",
    "/regen <file>                  regenerate a summary",
    "/note <file>... [| instructions]  generate a note",
    "/notes [file]                  list notes",
    "/search <term>                 search notes",
    "/cross <file>...               cross-document notes covering the files",
    "/delete <note-id>              delete a note",
    "/remove <file>                 remove a file and its notes",
    "/rename <old> <new>            rename a file",
    "/upload <path>                 upload a file into the workspace",
    "/chat [@file ...] <question>   ask about the workspace",
    "/stream <prompt>               streamed chat",
    "/help, /exit",
];

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionCommand {
    Files,
    Status,
    Summary(String),
    Summaries(Vec<String>),
    Regen(String),
    Note {
        documents: Vec<String>,
        instructions: Option<String>,
    },
    Notes(Option<String>),
    Search(String),
    Cross(Vec<String>),
    Delete(String),
    Remove(String),
    Rename(String, String),
    Upload(PathBuf),
    Chat {
        documents: Vec<String>,
        question: String,
    },
    Stream(String),
    Help,
    Exit,
    Invalid(String),
}

fn words(rest: &str) -> Vec<String> {
    rest.split_whitespace().map(str::to_string).collect()
}

/// Parse one REPL line.  Lines without a leading `/` are chat questions.
pub(crate) fn parse_command(line: &str) -> SessionCommand {
    let line = line.trim();
    let Some(body) = line.strip_prefix('/') else {
        return SessionCommand::Chat {
            documents: Vec::new(),
            question: line.to_string(),
        };
    };
    let (name, rest) = body.split_once(char::is_whitespace).unwrap_or((body, ""));
    let rest = rest.trim();
    let required = |usage: &str, build: fn(String) -> SessionCommand| {
        if rest.is_empty() {
            SessionCommand::Invalid(format!("usage: {usage}"))
        } else {
            build(rest.to_string())
        }
    };

    match name {
        "files" => SessionCommand::Files,
        "status" => SessionCommand::Status,
        "summary" => required("/summary <file>", SessionCommand::Summary),
        "summaries" => SessionCommand::Summaries(words(rest)),
        "regen" => required("/regen <file>", SessionCommand::Regen),
        "note" => {
            let (names, instructions) = match rest.split_once('|') {
                Some((names, text)) => (names, Some(text.trim().to_string()).filter(|t| !t.is_empty())),
                None => (rest, None),
            };
            let documents = words(names);
            if documents.is_empty() {
                SessionCommand::Invalid("usage: /note <file>... [| instructions]".to_string())
            } else {
                SessionCommand::Note {
                    documents,
                    instructions,
                }
            }
        }
        "notes" => SessionCommand::Notes((!rest.is_empty()).then(|| rest.to_string())),
        "search" => SessionCommand::Search(rest.to_string()),
        "cross" => SessionCommand::Cross(words(rest)),
        "delete" => required("/delete <note-id>", SessionCommand::Delete),
        "remove" => required("/remove <file>", SessionCommand::Remove),
        "rename" => match words(rest).as_slice() {
            [old, new] => SessionCommand::Rename(old.clone(), new.clone()),
            _ => SessionCommand::Invalid("usage: /rename <old> <new>".to_string()),
        },
        "upload" => required("/upload <path>", |path| SessionCommand::Upload(PathBuf::from(path))),
        "chat" => {
            let mut documents = Vec::new();
            let mut question = Vec::new();
            for word in rest.split_whitespace() {
                match word.strip_prefix('@') {
                    Some(name) if question.is_empty() && !name.is_empty() => documents.push(name.to_string()),
                    _ => question.push(word),
                }
            }
            SessionCommand::Chat {
                documents,
                question: question.join(" "),
            }
        }
        "stream" => SessionCommand::Stream(rest.to_string()),
        "help" => SessionCommand::Help,
        "exit" | "quit" => SessionCommand::Exit,
        other => SessionCommand::Invalid(format!("unknown command: /{other} (try /help)")),
    }
}

pub(crate) async fn run_session(app: &App, source: PathBuf, dest: Option<PathBuf>) -> Result<()> {
    let workspace = app.initialize(&source, dest).await?;
    println!(
        "workspace ready: {} files copied from {} to {}",
        workspace.files.len().await,
        workspace.source.display(),
        workspace.destination.display()
    );
    println!("type /help for commands, or any text to chat");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            println!("session closed");
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let command = parse_command(&line);
        if command == SessionCommand::Exit {
            println!("session closed");
            break;
        }
        if let Err(err) = dispatch(app, command).await {
            println!("error: {err:#}");
        }
    }
    Ok(())
}

async fn dispatch(app: &App, command: SessionCommand) -> Result<()> {
    let generator = app.generator();
    match command {
        SessionCommand::Files => {
            let files = app.workspace().list_files().await?;
            if files.is_empty() {
                println!("(no files)");
            }
            for file in files {
                let cached = if app.summaries().contains(&file.file_name) { "*" } else { " " };
                println!("{cached} {:<40} {:>10} bytes", file.file_name, file.size_bytes);
            }
        }
        SessionCommand::Status => {
            let status = app.status().await;
            println!("initialized: {}", status.initialized);
            println!("files:       {}", status.file_count);
            println!("summaries:   {}", app.summaries().len());
            if let Some(at) = status.last_initialized {
                println!("since:       {}", at.to_rfc3339());
            }
            if let Some(source) = &status.source_path {
                println!("source:      {source}");
            }
            if let Some(dest) = &status.destination_path {
                println!("destination: {dest}");
            }
            if status.needs_reinitialization() {
                println!("workspace is empty; start a new session to re-ingest");
            }
        }
        SessionCommand::Summary(file) => println!("{}", app.summarize(&file).await?),
        SessionCommand::Summaries(files) => {
            let records = app.summaries_for(&files).await;
            if records.is_empty() {
                println!("(no cached summaries)");
            }
            for record in records {
                println!("── {} (~{} tokens)", record.file_name, record.token_count);
                println!("{}", record.summary);
            }
        }
        SessionCommand::Regen(file) => println!("{}", app.regenerate_summary(&file).await?),
        SessionCommand::Note {
            documents,
            instructions,
        } => {
            let mut request = GenerateNoteRequest::for_documents(documents);
            request.instructions = instructions;
            let response = generator.generate_note(&request).await;
            match response.note {
                Some(note) if response.success => print_note(&note),
                _ => println!(
                    "{}: {}",
                    response.message,
                    response.error.unwrap_or_default()
                ),
            }
        }
        SessionCommand::Notes(file) => {
            let notes = match file {
                Some(file) => generator.notes_for_document(&file).await,
                None => generator.all_notes().await,
            };
            print_note_lines(&notes);
        }
        SessionCommand::Search(term) => print_note_lines(&generator.search_notes(&term).await),
        SessionCommand::Cross(files) => print_note_lines(&generator.cross_document_notes(&files).await),
        SessionCommand::Delete(id) => {
            if generator.note_by_id(&id).await.is_none() {
                println!("note not found: {id}");
            } else if generator.delete_note(&id).await {
                println!("deleted note {id}");
            } else {
                println!("failed to delete note {id}");
            }
        }
        SessionCommand::Remove(file) => {
            if app.remove_file(&file).await? {
                println!("removed {file} and its notes");
            } else {
                println!("file not found: {file}");
            }
        }
        SessionCommand::Rename(old, new) => match app.rename_file(&old, &new).await? {
            Some(record) => println!("renamed {old} -> {}", record.file_name),
            None => println!("cannot rename {old}: missing source or {new} already exists"),
        },
        SessionCommand::Upload(path) => {
            let record = app.upload_path(&path).await?;
            println!("uploaded {} as {}", path.display(), record.file_name);
        }
        SessionCommand::Chat {
            documents,
            question,
        } => {
            let target = app.chat_target(None, None)?;
            let reply = if documents.is_empty() {
                app.chat().chat(&question, &target).await?
            } else {
                app.chat()
                    .chat_about_documents(app.workspace(), &documents, &question, &target)
                    .await?
            };
            println!("{reply}");
        }
        SessionCommand::Stream(prompt) => {
            let target = app.chat_target(None, None)?;
            let mut chunks = app.chat().chat_stream(&prompt, &target).await?;
            let mut stdout = io::stdout();
            while let Some(chunk) = chunks.next_chunk().await {
                print!("{chunk}");
                stdout.flush()?;
            }
            println!();
        }
        SessionCommand::Help => HELP.iter().for_each(|line| println!("{line}")),
        SessionCommand::Invalid(message) => println!("{message}"),
        SessionCommand::Exit => {}
    }
    Ok(())
}
