use std::sync::Mutex;

use async_trait::async_trait;

use docrag_core::{DocumentSummaries, SummaryRecord};

/// Records which files asked for a background summary.
#[derive(Debug, Default)]
pub struct RecordingSummaries {
    requested: Mutex<Vec<String>>,
}

impl RecordingSummaries {
    pub fn requested(&self) -> Vec<String> {
        let mut names = self.requested.lock().unwrap().clone();
        names.sort();
        names
    }
}

#[async_trait]
impl DocumentSummaries for RecordingSummaries {
    async fn generate(&self, _content: &str, file_name: &str) -> String {
        format!("summary of {file_name}")
    }

    fn generate_in_background(&self, _content: String, file_name: String) {
        self.requested.lock().unwrap().push(file_name);
    }

    async fn get(&self, _file_name: &str) -> Option<SummaryRecord> {
        None
    }

    async fn get_many(&self, _file_names: &[String]) -> Vec<SummaryRecord> {
        Vec::new()
    }
}
