//! Article summarization for the research workflow.
//!
//! The research agent extracts several articles per query; each summarization
//! is independent, so they run concurrently. Results are joined by input
//! index, never completion order, so the combined output is reproducible.

use crate::config::Prompts;
use crate::error::Result;
use crate::llm::LanguageModel;
use crate::retry::RetryPolicy;
use futures::future;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// An extracted article to summarize.
#[derive(Debug, Clone)]
pub struct Article {
    /// Where the article came from, cited in the output.
    pub url: String,
    /// Raw extracted content.
    pub content: String,
}

/// Summarizes batches of researched articles.
pub struct ArticleSummarizer {
    llm: Arc<dyn LanguageModel>,
    prompts: Prompts,
    retry: RetryPolicy,
}

impl ArticleSummarizer {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Prompts) -> Self {
        Self {
            llm,
            prompts,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Summarize all articles concurrently and concatenate the results in
    /// input order, each followed by its source URL and separated by block
    /// delimiters the ingestion pipeline understands.
    #[instrument(skip(self, articles), fields(count = articles.len()))]
    pub async fn summarize_all(&self, articles: &[Article]) -> Result<String> {
        let summaries = future::try_join_all(
            articles.iter().map(|article| self.summarize_one(article)),
        )
        .await?;

        info!("Summarized {} articles", summaries.len());
        Ok(summaries.join("\n\n---\n\n"))
    }

    async fn summarize_one(&self, article: &Article) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("content".to_string(), article.content.clone());
        let system = self
            .prompts
            .render_with_custom(&self.prompts.research.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.research.user, &vars);

        let summary = self.retry.run(|| self.llm.complete(&system, &user)).await?;
        Ok(format!("{}\n(Source: {})", summary.trim(), article.url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MinneError;
    use crate::llm::testing::FakeLanguageModel;
    use async_trait::async_trait;

    /// Echoes a marker derived from the article content, so output order is
    /// attributable to input order.
    struct EchoModel;

    #[async_trait]
    impl LanguageModel for EchoModel {
        async fn complete(&self, _system: &str, user: &str) -> crate::error::Result<String> {
            let marker = user
                .lines()
                .find(|l| l.starts_with("article-"))
                .unwrap_or("unknown");
            Ok(format!("summary of {}", marker))
        }
    }

    fn article(n: usize) -> Article {
        Article {
            url: format!("https://example.com/{}", n),
            content: format!("article-{}\nbody text", n),
        }
    }

    #[tokio::test]
    async fn test_results_join_in_input_order() {
        let summarizer = ArticleSummarizer::new(Arc::new(EchoModel), Prompts::default());
        let articles: Vec<Article> = (0..4).map(article).collect();

        let combined = summarizer.summarize_all(&articles).await.unwrap();
        let parts: Vec<&str> = combined.split("\n\n---\n\n").collect();

        assert_eq!(parts.len(), 4);
        for (i, part) in parts.iter().enumerate() {
            assert!(part.contains(&format!("summary of article-{}", i)));
            assert!(part.ends_with(&format!("(Source: https://example.com/{})", i)));
        }
    }

    #[tokio::test]
    async fn test_empty_batch_yields_empty_output() {
        let summarizer = ArticleSummarizer::new(Arc::new(EchoModel), Prompts::default());
        assert_eq!(summarizer.summarize_all(&[]).await.unwrap(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_surfaces_after_retries() {
        let llm = Arc::new(FakeLanguageModel::failing("extractor down"));
        let summarizer = ArticleSummarizer::new(llm.clone(), Prompts::default());

        let err = summarizer.summarize_all(&[article(0)]).await.unwrap_err();
        assert!(matches!(err, MinneError::OpenAI(_)));
        assert_eq!(llm.call_count(), 3);
    }
}
