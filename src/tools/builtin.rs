//! Tools shipped with Coco.

use super::{ParamType, ToolArgs, ToolDefinition, ToolParameter, ToolRegistry};
use crate::error::{CocoError, Result};
use crate::lm::LanguageModel;
use crate::vector_store::{DateRange, SearchResult, VectorStore};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Shared state the built-in tools operate on.
pub struct ToolContext {
    lm: Arc<dyn LanguageModel>,
    store: Arc<dyn VectorStore>,
    embedding_model: String,
}

impl ToolContext {
    pub fn new(lm: Arc<dyn LanguageModel>, store: Arc<dyn VectorStore>, embedding_model: &str) -> Self {
        Self {
            lm,
            store,
            embedding_model: embedding_model.to_string(),
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.lm
            .embed(&[query.to_string()], &self.embedding_model)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CocoError::Embedding("Empty embedding response".to_string()))
    }

    async fn search(&self, query: &str, n_results: i64, dates: DateRange) -> Result<Value> {
        let embedding = self.embed_query(query).await?;
        let n_results = usize::try_from(n_results).map_err(|_| {
            CocoError::InvalidArgument(format!("result count must not be negative, got {}", n_results))
        })?;
        let hits = self.store.get_closest(&embedding, n_results, dates).await?;
        debug!("Query '{}' matched {} documents", query, hits.len());
        Ok(Value::Array(hits.iter().map(hit_json).collect()))
    }

    async fn semantic_query(&self, args: ToolArgs) -> Result<Value> {
        self.search(args.str("query")?, args.i64("num_results")?, DateRange::default())
            .await
    }

    async fn date_filtered_query(&self, args: ToolArgs) -> Result<Value> {
        let dates = DateRange::new(
            parse_date(args.opt_str("start_date")?)?,
            parse_date(args.opt_str("end_date")?)?,
        );
        self.search(args.str("query")?, args.i64("top_k")?, dates).await
    }
}

fn hit_json(hit: &SearchResult) -> Value {
    json!({
        "id": hit.id,
        "content": hit.document,
        "metadata": hit.metadata,
        "relevance_score": hit.relevance_score(),
    })
}

fn parse_date(value: Option<&str>) -> Result<Option<NaiveDate>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| CocoError::InvalidArgument(format!("'{}' is not a YYYY-MM-DD date: {}", text, e))),
    }
}

fn secret_word(args: ToolArgs) -> Result<Value> {
    let modifier = args.opt_str("modifier")?.unwrap_or("");
    let word = if modifier.is_empty() {
        "banana".to_string()
    } else {
        format!("banana_{}", modifier)
    };

    Ok(json!({
        "secret_word": word,
        "timestamp": chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        "message": "This is a secret word for testing purposes",
    }))
}

/// Bind a `ToolContext` method as a tool handler.
fn bound<F, Fut>(ctx: &Arc<ToolContext>, method: F) -> impl Fn(ToolArgs) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<ToolContext>, ToolArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    move |args| method(Arc::clone(&ctx), args)
}

/// Definitions of the built-in tools, in advertised order.
pub fn definitions(ctx: Arc<ToolContext>) -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "semantic_query",
            "Search for relevant information in the database based on a query",
            bound(&ctx, |ctx, args| async move { ctx.semantic_query(args).await }),
        )
        .param(ToolParameter::required(
            "query",
            ParamType::String,
            "The natural language query to search for",
        ))
        .param(
            ToolParameter::optional("num_results", ParamType::Integer, "The number of results to return")
                .with_default(5),
        ),
        ToolDefinition::new(
            "date_filtered_query",
            "Search for relevant information in the database with date filtering",
            bound(&ctx, |ctx, args| async move { ctx.date_filtered_query(args).await }),
        )
        .param(ToolParameter::required(
            "query",
            ParamType::String,
            "The natural language query to search for",
        ))
        .param(ToolParameter::optional(
            "start_date",
            ParamType::String,
            "The start date for filtering in YYYY-MM-DD format",
        ))
        .param(ToolParameter::optional(
            "end_date",
            ParamType::String,
            "The end date for filtering in YYYY-MM-DD format",
        ))
        .param(
            ToolParameter::optional("top_k", ParamType::Integer, "The number of results to return")
                .with_default(5),
        ),
        ToolDefinition::new("get_secret_word", "Get the secret word", |args| async move {
            secret_word(args)
        })
        .param(
            ToolParameter::optional(
                "modifier",
                ParamType::String,
                "A string to append to the secret word (optional)",
            )
            .with_default(""),
        ),
    ]
}

/// Registry holding the built-in tools.
pub fn registry(ctx: Arc<ToolContext>) -> Result<ToolRegistry> {
    ToolRegistry::from_definitions(definitions(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::testing::{fake_embedding, ScriptedModel};
    use crate::tools::ToolCall;
    use crate::vector_store::{Document, DocumentMetadata, MemoryVectorStore};
    use serde_json::Map;

    async fn fixture() -> ToolRegistry {
        let store = Arc::new(MemoryVectorStore::new());
        let docs: Vec<Document> = [("cat", 1), ("giraffe", 15), ("aardvark", 28)]
            .into_iter()
            .map(|(text, day)| Document {
                text: text.to_string(),
                embedding: fake_embedding(text),
                metadata: DocumentMetadata {
                    filename: "animals.txt".to_string(),
                    date: NaiveDate::from_ymd_opt(2024, 2, day),
                    ..Default::default()
                },
            })
            .collect();
        store.add(&docs).await.unwrap();

        let ctx = ToolContext::new(Arc::new(ScriptedModel::default()), store, "nomic-embed-text");
        registry(Arc::new(ctx)).unwrap()
    }

    fn call(name: &str, args: Value) -> ToolCall {
        let arguments = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        ToolCall::new("tool_call_0", name, arguments)
    }

    #[tokio::test]
    async fn test_advertised_order() {
        let names: Vec<String> = fixture()
            .await
            .list_tools()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(names, vec!["semantic_query", "date_filtered_query", "get_secret_word"]);
    }

    #[tokio::test]
    async fn test_semantic_query_coerces_count() {
        let hits = fixture()
            .await
            .execute(&call("semantic_query", json!({"query": "cat", "num_results": "2"})))
            .await
            .unwrap();

        let hits = hits.as_array().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0]["content"], "cat");
        assert!(hits[0]["relevance_score"].as_f64().unwrap() > 0.99);
    }

    #[tokio::test]
    async fn test_date_filtered_query() {
        let hits = fixture()
            .await
            .execute(&call(
                "date_filtered_query",
                json!({"query": "cat", "start_date": "2024-02-10", "end_date": "2024-02-20"}),
            ))
            .await
            .unwrap();

        let hits = hits.as_array().unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["content"], "giraffe");
        assert_eq!(hits[0]["metadata"]["date"], "2024-02-15");
    }

    #[tokio::test]
    async fn test_date_filtered_query_rejects_bad_date() {
        let err = fixture()
            .await
            .execute(&call(
                "date_filtered_query",
                json!({"query": "cat", "start_date": "last tuesday"}),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CocoError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_secret_word() {
        let registry = fixture().await;

        let plain = registry
            .execute(&call("get_secret_word", json!({})))
            .await
            .unwrap();
        assert_eq!(plain["secret_word"], "banana");
        assert!(plain["timestamp"].is_string());

        let modified = registry
            .execute(&call("get_secret_word", json!({"modifier": "split"})))
            .await
            .unwrap();
        assert_eq!(modified["secret_word"], "banana_split");
    }
}
