//! Prompt templates for Minne.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub summarizer: SummarizerPrompts,
    pub rag: RagPrompts,
    pub classifier: ClassifierPrompts,
    pub research: ResearchPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}


/// Prompts for the metadata-extraction summarization pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerPrompts {
    pub system: String,
    pub user: String,
}

impl Default for SummarizerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a summarizing assistant. When given a document, your job is to extract and translate the information into clear, simple language for use in a retrieval system.

Rules:
- Do NOT invent facts or leave out important information. Every person, company, number, and year in the document must appear in your output.
- Use plain language that a non-technical person can understand.
- Include all relevant details.
- Metadata fields like Topic and Guests can include multiple comma-separated values.
- Start every block with a delimiter line of the form: --- <short title> ---
- After the delimiter line, emit the fields of the matching format, one per line. Notes may span multiple lines and runs until the next delimiter.

If the document is related to {{organization}}, use this format:

--- <short title> ---
Topic: (choose one or more from: sponsorship, meeting, club history, executives, misc)
Guests: (names of any companies or individuals mentioned)
Year: (if a specific year is mentioned, include it here)
Notes: (summarize the content clearly and completely)

If the document is related to school or academics, use this format:

--- <short title> ---
Topic: (name of the subject, e.g., CS, geology, sociology)
Year: (if mentioned, include it here)
Notes: (summarize all important academic concepts, topics, or facts mentioned)

If the document is a general researched item that fits neither category, use this format:

--- <short title> ---
Topic: Researched Items, and then whatever the topic is, include both
Notes: word for word whatever has been passed down to you

If you are unsure which category a document falls into, take your best guess based on the content. A single input may produce several blocks when it covers distinct subjects."#.to_string(),

            user: r#"Here is the document text:

{{text}}"#.to_string(),
        }
    }
}

/// Prompts for RAG answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPrompts {
    pub system: String,
    pub user: String,
}

impl Default for RagPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant answering questions based on the provided context.

Use only the context to answer the question. If the answer is not clearly available in the context, say "I don't have enough information to answer that question based on the available documents." Do not answer from outside knowledge."#.to_string(),

            user: r#"Context:
{{context}}

Question: {{question}}

Answer:"#.to_string(),
        }
    }
}

/// Prompts for single-shot topic classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ClassifierPrompts {
    fn default() -> Self {
        Self {
            system: r#"Your job is to determine what category a piece of text is related to. The possible categories are: sponsorship, meeting, club history, executives, misc.

No other categories are possible. If the text asks about money, assume it is related to sponsorship. If the text asks about anything related to meetings, assume it is about meeting. Anything else is misc.

Reply with the category only. No greeting, no explanation, just the category."#.to_string(),

            user: r#"{{text}}"#.to_string(),
        }
    }
}

/// Prompts for article summarization during research.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ResearchPrompts {
    fn default() -> Self {
        Self {
            system: r#"You summarize articles for a research assistant. Summarize the given article in 5-6 bullet points, no more. Include any useful links related to the topic at the end. Skip ads and irrelevant content."#.to_string(),

            user: r#"Content:
{{content}}"#.to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let summarizer_path = custom_path.join("summarizer.toml");
            if summarizer_path.exists() {
                let content = std::fs::read_to_string(&summarizer_path)?;
                prompts.summarizer = toml::from_str(&content)?;
            }

            let rag_path = custom_path.join("rag.toml");
            if rag_path.exists() {
                let content = std::fs::read_to_string(&rag_path)?;
                prompts.rag = toml::from_str(&content)?;
            }

            let classifier_path = custom_path.join("classifier.toml");
            if classifier_path.exists() {
                let content = std::fs::read_to_string(&classifier_path)?;
                prompts.classifier = toml::from_str(&content)?;
            }

            let research_path = custom_path.join("research.toml");
            if research_path.exists() {
                let content = std::fs::read_to_string(&research_path)?;
                prompts.research = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.summarizer.system.is_empty());
        assert!(!prompts.rag.system.is_empty());
        assert!(prompts.rag.system.contains("I don't have enough information"));
        assert!(prompts.summarizer.system.contains("{{organization}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_custom_variables_are_overridden_by_provided() {
        let mut prompts = Prompts::default();
        prompts
            .variables
            .insert("organization".to_string(), "Acme Club".to_string());

        let rendered = prompts.render_with_custom("Org: {{organization}}", &Default::default());
        assert_eq!(rendered, "Org: Acme Club");

        let mut vars = std::collections::HashMap::new();
        vars.insert("organization".to_string(), "Other".to_string());
        let rendered = prompts.render_with_custom("Org: {{organization}}", &vars);
        assert_eq!(rendered, "Org: Other");
    }

    #[test]
    fn test_load_custom_dir_overrides_one_group() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rag.toml"),
            "system = \"custom system\"\nuser = \"Q: {{question}}\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.rag.system, "custom system");
        // Other groups keep their defaults.
        assert!(prompts.summarizer.system.contains("summarizing assistant"));
    }
}
