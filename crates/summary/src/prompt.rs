/// Summarization prompt for one document.
pub fn summary_prompt(file_name: &str, content: &str) -> String {
    format!(
        "Please provide a concise summary of the following document.\n\n\
         Document Name: {file_name}\n\n\
         Requirements:\n\
         - Keep the summary between 2-4 sentences\n\
         - Focus on the main topics and key information\n\
         - Use clear, professional language\n\
         - Avoid technical jargon when possible\n\n\
         Document Content:\n\
         {content}\n\n\
         Summary:"
    )
}

pub fn fallback_summary(file_name: &str) -> String {
    format!("Unable to generate summary for {file_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_name_and_content() {
        let prompt = summary_prompt("report.txt", "Q3 results were strong.");
        assert!(prompt.starts_with("Please provide a concise summary"));
        assert!(prompt.contains("Document Name: report.txt"));
        assert!(prompt.contains("Document Content:\nQ3 results were strong."));
        assert!(prompt.ends_with("Summary:"));
    }

    #[test]
    fn fallback_names_the_file() {
        assert_eq!(
            fallback_summary("a.md"),
            "Unable to generate summary for a.md"
        );
    }
}
