//! Topic labels: normalization and single-shot classification.
//!
//! Topics form a closed set. Organizational labels (`sponsorship`, `meeting`,
//! `club_history`, `executives`, `misc`), a small academic subset (`cs`,
//! `geology`, `sociology`, `personal`), and the general two-part form
//! `Researched Items, <subtopic>`. Anything unrecognized collapses to `misc`.

use crate::config::Prompts;
use crate::error::{MinneError, Result};
use crate::llm::LanguageModel;
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Fallback label for unrecognized topics.
pub const MISC: &str = "misc";

/// Prefix of the general two-part topic form.
const RESEARCHED_PREFIX: &str = "researched items";

/// Map a raw label onto the closed set, or `None` when it is not a known
/// label. Matching is case- and separator-insensitive.
pub fn match_label(raw: &str) -> Option<&'static str> {
    let folded: String = raw
        .trim()
        .trim_end_matches('.')
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();

    match folded.as_str() {
        "sponsorship" | "sponsorships" | "sponsor" => Some("sponsorship"),
        "meeting" | "meetings" => Some("meeting"),
        "club_history" | "clubhistory" => Some("club_history"),
        "executives" | "executive" | "execs" => Some("executives"),
        "misc" | "miscellaneous" => Some(MISC),
        "cs" | "compsci" | "computer_science" | "cpsc" => Some("cs"),
        "geology" => Some("geology"),
        "sociology" => Some("sociology"),
        "personal" => Some("personal"),
        _ => None,
    }
}

/// Normalize one raw topic label to its canonical value.
///
/// Known synonyms and casings map onto the closed set; the general form keeps
/// its subtopic as `Researched Items, <subtopic>`; everything else is `misc`.
pub fn normalize_topic(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return MISC.to_string();
    }

    if trimmed.to_lowercase().starts_with(RESEARCHED_PREFIX) {
        let subtopic = trimmed[RESEARCHED_PREFIX.len()..]
            .trim_start_matches([',', '-', ':', ' '])
            .trim();
        if subtopic.is_empty() {
            return MISC.to_string();
        }
        return format!("Researched Items, {}", subtopic);
    }

    match_label(trimmed)
        .map(str::to_string)
        .unwrap_or_else(|| MISC.to_string())
}

/// Normalize a possibly multi-valued `Topic` field.
///
/// The field is a comma-separated set of labels; each is normalized and
/// duplicates are dropped while preserving order. The two-part
/// `Researched Items, <subtopic>` form contains a comma itself and is kept
/// whole rather than split.
pub fn normalize_topics(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.to_lowercase().starts_with(RESEARCHED_PREFIX) {
        return normalize_topic(trimmed);
    }

    let mut seen: Vec<String> = Vec::new();
    for part in trimmed.split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let normalized = normalize_topic(part);
        if !seen.contains(&normalized) {
            seen.push(normalized);
        }
    }
    if seen.is_empty() {
        return MISC.to_string();
    }
    seen.join(", ")
}

/// True when a document's (possibly multi-valued) topic field contains `label`.
pub fn topic_matches(doc_topic: &str, label: &str) -> bool {
    doc_topic
        .split(',')
        .any(|part| part.trim().eq_ignore_ascii_case(label.trim()))
}

/// Single-shot LLM topic classifier used to narrow retrieval filters.
pub struct TopicClassifier {
    llm: Arc<dyn LanguageModel>,
    prompts: Prompts,
    retry: RetryPolicy,
}

impl TopicClassifier {
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

    /// Classify `text` into a known topic label, or `None` when no filter
    /// should be applied.
    ///
    /// Fails open: a model error or an out-of-set prediction degrades to
    /// unfiltered retrieval instead of propagating, so classification
    /// problems can never turn a query into zero results.
    #[instrument(skip(self, text))]
    pub async fn classify(&self, text: &str) -> Option<String> {
        match self.try_classify(text).await {
            Ok(label) => label,
            Err(e) => {
                warn!("Topic classification failed, skipping filter: {}", e);
                None
            }
        }
    }

    async fn try_classify(&self, text: &str) -> Result<Option<String>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let mut vars = HashMap::new();
        vars.insert("text".to_string(), text.to_string());
        let system = self
            .prompts
            .render_with_custom(&self.prompts.classifier.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.classifier.user, &vars);

        let raw = self
            .retry
            .run(|| self.llm.complete(&system, &user))
            .await
            .map_err(|e| MinneError::Classification(e.to_string()))?;

        let label = match_label(&raw);
        debug!(raw = %raw.trim(), ?label, "classified query topic");
        Ok(label.map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::FakeLanguageModel;

    #[test]
    fn test_normalize_is_idempotent_over_synonyms() {
        for raw in ["Club History", "club_history", "CLUB HISTORY", "club-history"] {
            assert_eq!(normalize_topic(raw), "club_history", "raw: {}", raw);
        }
        assert_eq!(normalize_topic("Sponsorship"), "sponsorship");
        assert_eq!(normalize_topic("meetings"), "meeting");
        assert_eq!(normalize_topic("CPSC"), "cs");
    }

    #[test]
    fn test_unrecognized_becomes_misc() {
        assert_eq!(normalize_topic("quantum baking"), "misc");
        assert_eq!(normalize_topic(""), "misc");
        assert_eq!(normalize_topic("   "), "misc");
    }

    #[test]
    fn test_researched_items_keeps_subtopic() {
        assert_eq!(
            normalize_topic("Researched Items, Quantum Computing"),
            "Researched Items, Quantum Computing"
        );
        assert_eq!(
            normalize_topic("researched items - rust"),
            "Researched Items, rust"
        );
        assert_eq!(normalize_topic("Researched Items"), "misc");
    }

    #[test]
    fn test_normalize_topics_treats_field_as_set() {
        assert_eq!(normalize_topics("Sponsorship, Meeting"), "sponsorship, meeting");
        assert_eq!(normalize_topics("meeting, Meetings"), "meeting");
        assert_eq!(normalize_topics("garbage, sponsorship"), "misc, sponsorship");
        // The two-part general form is not split on its comma.
        assert_eq!(
            normalize_topics("Researched Items, Coffee"),
            "Researched Items, Coffee"
        );
    }

    #[test]
    fn test_topic_matches_set_semantics() {
        assert!(topic_matches("sponsorship, meeting", "meeting"));
        assert!(topic_matches("sponsorship", "Sponsorship"));
        assert!(!topic_matches("sponsorship, meeting", "executives"));
    }

    #[tokio::test]
    async fn test_classifier_maps_known_label() {
        let llm = Arc::new(FakeLanguageModel::returning("Club History\n"));
        let classifier = TopicClassifier::new(llm, Prompts::default());

        let label = classifier.classify("tell me about the club's origins").await;
        assert_eq!(label.as_deref(), Some("club_history"));
    }

    #[tokio::test]
    async fn test_classifier_fails_open_on_unknown_label() {
        let llm = Arc::new(FakeLanguageModel::returning("something else entirely"));
        let classifier = TopicClassifier::new(llm, Prompts::default());

        assert_eq!(classifier.classify("anything").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classifier_fails_open_on_model_error() {
        let llm = Arc::new(FakeLanguageModel::failing("api down"));
        let classifier = TopicClassifier::new(llm, Prompts::default());

        assert_eq!(classifier.classify("anything").await, None);
    }
}
