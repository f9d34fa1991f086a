//! Prompt assembly for retrieval-augmented answers.

use crate::config::Prompts;
use crate::error::Result;
use crate::vector_store::{DocumentMetadata, SearchResult};
use std::collections::HashMap;

/// Render retrieved chunks as the `{{context}}` block of a prompt.
///
/// Each chunk becomes a `#### Text:` section, followed by a `#### Metadata:`
/// section when `metadata` has an entry at the same position. Sections are
/// separated by a `-----` line.
pub fn format_context(chunks: &[String], metadata: &[DocumentMetadata]) -> Result<String> {
    let mut context = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!("#### Text:\n{}\n\n", chunk));
        if let Some(meta) = metadata.get(i) {
            context.push_str(&format!(
                "#### Metadata:\n{}\n\n",
                serde_json::to_string_pretty(meta)?
            ));
        }
        if i + 1 < chunks.len() {
            context.push_str("-----\n\n");
        }
    }
    Ok(context)
}

/// Fill `template` with the formatted context and the query.
pub fn format_prompt(
    prompts: &Prompts,
    query: &str,
    chunks: &[String],
    metadata: &[DocumentMetadata],
    template: &str,
) -> Result<String> {
    let mut vars = HashMap::new();
    vars.insert("context".to_string(), format_context(chunks, metadata)?);
    vars.insert("query".to_string(), query.to_string());
    Ok(prompts.render_with_custom(template, &vars))
}

/// Chunk texts and metadata of a retrieval, ready for [`format_prompt`].
pub fn split_results(results: &[SearchResult]) -> (Vec<String>, Vec<DocumentMetadata>) {
    results
        .iter()
        .map(|r| (r.document.clone(), r.metadata.clone()))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(filename: &str) -> DocumentMetadata {
        DocumentMetadata {
            language: "en".to_string(),
            filename: filename.to_string(),
            chunk_index: 0,
            total_chunks: 1,
            date: None,
        }
    }

    #[test]
    fn test_context_with_metadata() {
        let chunks = vec!["first".to_string(), "second".to_string()];
        let context = format_context(&chunks, &[meta("a.txt"), meta("b.txt")]).unwrap();

        assert!(context.starts_with("#### Text:\nfirst\n\n#### Metadata:\n{\n  \"language\": \"en\""));
        assert_eq!(context.matches("-----\n\n").count(), 1);
        assert!(context.ends_with("}\n\n"));
    }

    #[test]
    fn test_context_without_metadata() {
        let chunks = vec!["only".to_string()];
        assert_eq!(format_context(&chunks, &[]).unwrap(), "#### Text:\nonly\n\n");
    }

    #[test]
    fn test_prompt_fills_placeholders() {
        let mut prompts = Prompts::default();
        prompts.variables.insert("name".to_string(), "Coco".to_string());

        let prompt = format_prompt(
            &prompts,
            "what?",
            &["ctx".to_string()],
            &[],
            "{{name}} | {{context}}| {{query}}",
        )
        .unwrap();
        assert_eq!(prompt, "Coco | #### Text:\nctx\n\n| what?");
    }
}
