//! Query answering over the persisted store.
//!
//! Asks the store for the top-k nearest fragments, assembles them into a
//! bounded context block, and delegates to the generation capability with
//! a fixed instruction. An empty store and an empty search result are
//! successful, informative answers, never errors, so callers can
//! distinguish "nothing to search" from "search failed".

use tracing::{debug, info};

use crate::error::EngineError;
use crate::generate::Generator;
use crate::models::Answer;
use crate::store::VectorStore;

/// Fixed system instruction handed to the generation capability.
pub const SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant. Answer questions based only on the provided context.";

/// Fixed answer when nothing has been ingested yet.
pub const NO_DOCUMENTS_ANSWER: &str =
    "No documents have been ingested yet. Add documents before asking questions.";

/// Fixed answer when the search returns nothing relevant.
pub const NO_RESULTS_ANSWER: &str = "No relevant information found in the store.";

/// Delimiter between fragments in the assembled context block.
const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

/// Answer a query against the given store generation.
///
/// Fragments enter the context most-similar-first, joined by a fixed
/// delimiter, until adding another would exceed `max_context_chars`.
/// A fragment that does not make it into the context is also excluded
/// from the returned sources, so the citation list only names what the
/// generator actually saw. The returned answer text is trimmed.
pub async fn answer(
    query: &str,
    top_k: usize,
    max_context_chars: usize,
    store: &dyn VectorStore,
    generator: &dyn Generator,
) -> Result<Answer, EngineError> {
    let count = store.count().await.map_err(EngineError::Store)?;
    if count == 0 {
        info!("query against empty store");
        return Ok(Answer {
            text: NO_DOCUMENTS_ANSWER.to_string(),
            sources: Vec::new(),
        });
    }

    let hits = store.search(query, top_k).await.map_err(EngineError::Store)?;
    if hits.is_empty() {
        info!("search returned no results");
        return Ok(Answer {
            text: NO_RESULTS_ANSWER.to_string(),
            sources: Vec::new(),
        });
    }

    let mut context = String::new();
    let mut sources = Vec::new();
    for hit in &hits {
        let extra = if context.is_empty() {
            hit.text.len()
        } else {
            CONTEXT_DELIMITER.len() + hit.text.len()
        };
        if !context.is_empty() && context.len() + extra > max_context_chars {
            debug!(dropped = %hit.id, "fragment over context budget");
            continue;
        }
        if !context.is_empty() {
            context.push_str(CONTEXT_DELIMITER);
        }
        context.push_str(&hit.text);
        sources.push(hit.id.clone());
    }

    let prompt = build_prompt(&context, query);
    debug!(fragments = sources.len(), context_chars = context.len(), "invoking generator");

    let text = generator
        .generate(SYSTEM_INSTRUCTION, &prompt)
        .await
        .map_err(EngineError::Generation)?;

    Ok(Answer {
        text: text.trim().to_string(),
        sources,
    })
}

fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question based only on the following context:\n\n\
         {context}\n\n\
         ---\n\n\
         Question: {question}\n\n\
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::models::Fragment;
    use crate::store::memory::InMemoryStore;

    /// Generator that records its inputs and echoes a fixed reply.
    struct ScriptedGenerator {
        reply: String,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedGenerator {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
            self.calls
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Ok(self.reply.clone())
        }
    }

    fn fragment(id: &str, text: &str) -> Fragment {
        Fragment {
            id: id.to_string(),
            source: "doc.txt".to_string(),
            page: 0,
            sequence: 0,
            text: text.to_string(),
            hash: "h".to_string(),
        }
    }

    fn store() -> InMemoryStore {
        InMemoryStore::new(Arc::new(HashEmbedder::new(64)))
    }

    #[tokio::test]
    async fn test_empty_store_short_circuits() {
        let store = store();
        let generator = ScriptedGenerator::new("unused");

        let result = answer("anything", 5, 8000, &store, &generator)
            .await
            .unwrap();
        assert_eq!(result.text, NO_DOCUMENTS_ANSWER);
        assert!(result.sources.is_empty());
        // The generation capability was never invoked.
        assert!(generator.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_answer_includes_ranked_sources() {
        let store = store();
        store
            .upsert(&[
                fragment("a.txt:0:0", "hacking carries imprisonment up to three years"),
                fragment("a.txt:0:1", "bread dough must rest overnight"),
            ])
            .await
            .unwrap();
        let generator = ScriptedGenerator::new("  Imprisonment up to three years.  ");

        let result = answer("punishment for hacking", 2, 8000, &store, &generator)
            .await
            .unwrap();
        assert_eq!(result.text, "Imprisonment up to three years.");
        assert_eq!(result.sources.len(), 2);
        assert_eq!(result.sources[0], "a.txt:0:0");

        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (system, prompt) = &calls[0];
        assert_eq!(system, SYSTEM_INSTRUCTION);
        assert!(prompt.contains("hacking carries imprisonment"));
        assert!(prompt.contains("Question: punishment for hacking"));
    }

    #[tokio::test]
    async fn test_context_is_bounded() {
        let store = store();
        let long = "hacking ".repeat(100); // ~800 chars, matches the query
        store
            .upsert(&[
                fragment("a.txt:0:0", &long),
                fragment("a.txt:0:1", &long),
                fragment("a.txt:0:2", &long),
            ])
            .await
            .unwrap();
        let generator = ScriptedGenerator::new("answer");

        // Budget fits one fragment only.
        let result = answer("hacking", 3, 1000, &store, &generator).await.unwrap();
        assert_eq!(result.sources.len(), 1);

        let calls = generator.calls.lock().unwrap();
        let (_, prompt) = &calls[0];
        // Only the template's own separator remains; no fragment joins.
        assert_eq!(prompt.matches(CONTEXT_DELIMITER).count(), 1);
    }

    #[tokio::test]
    async fn test_generation_error_propagates() {
        struct FailingGenerator;

        #[async_trait]
        impl Generator for FailingGenerator {
            fn model_name(&self) -> &str {
                "failing"
            }
            async fn generate(&self, _system: &str, _prompt: &str) -> Result<String> {
                anyhow::bail!("upstream 500")
            }
        }

        let store = store();
        store
            .upsert(&[fragment("a.txt:0:0", "some indexed text")])
            .await
            .unwrap();

        let err = answer("some text", 1, 8000, &store, &FailingGenerator)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Generation(_)));
    }
}
