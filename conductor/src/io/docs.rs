//! Documentation lookup for the research executor.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::io::config::DocsConfig;

/// Source of library documentation snippets.
pub trait DocsSource: Send + Sync {
    /// Find `library` and return documentation relevant to `query` as text.
    fn lookup(&self, library: &str, query: &str) -> Result<String>;
}

/// Context7 HTTP API: library search, then context fetch for the best match.
#[derive(Debug, Clone)]
pub struct Context7 {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LibraryHit {
    id: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ContextReply {
    code_snippets: Vec<CodeSnippet>,
    info_snippets: Vec<InfoSnippet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CodeSnippet {
    code_title: Option<String>,
    code_description: String,
    code_list: Vec<CodeItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CodeItem {
    language: String,
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InfoSnippet {
    title: Option<String>,
    content: String,
}

impl Context7 {
    /// Build a client. Must be called outside any async runtime context.
    pub fn from_config(config: &DocsConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build docs http client")?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn get_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut request = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .query(params);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .with_context(|| format!("GET {path}"))?
            .error_for_status()
            .with_context(|| format!("GET {path}"))?
            .json()
            .with_context(|| format!("decode {path} reply"))
    }
}

impl DocsSource for Context7 {
    #[instrument(skip(self))]
    fn lookup(&self, library: &str, query: &str) -> Result<String> {
        let search = self.get_json("libs/search", &[("libraryName", library), ("query", query)])?;
        let Some(hit) = best_match(&search)? else {
            return Ok(format!("Context7: No library found for '{library}'."));
        };
        let Some(library_id) = hit.id.as_deref() else {
            return Ok(format!("Context7: Invalid library data found for '{library}'."));
        };
        let title = hit.title.as_deref().unwrap_or(library_id);
        debug!(library_id, "library resolved");

        let context = self.get_json(
            "context",
            &[("libraryId", library_id), ("query", query), ("type", "json")],
        )?;
        render_context(title, query, context)
    }
}

/// The search reply is either `{"results": [...]}` or a bare array.
fn best_match(search: &Value) -> Result<Option<LibraryHit>> {
    let hits = match search {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => return Err(anyhow!("unexpected library search reply")),
    };
    hits.first()
        .map(|hit| serde_json::from_value(hit.clone()).context("decode library entry"))
        .transpose()
}

fn render_context(title: &str, query: &str, reply: Value) -> Result<String> {
    let reply: ContextReply = serde_json::from_value(reply).context("decode context reply")?;
    if reply.code_snippets.is_empty() && reply.info_snippets.is_empty() {
        return Ok(format!(
            "Context7: Found library '{title}' but no documentation returned for query '{query}'."
        ));
    }

    let mut out = vec![format!("--- Context7 Results for '{title}' ---")];
    for snippet in reply.code_snippets {
        out.push(format!(
            "\nTitle: {}\nDescription: {}",
            snippet.code_title.as_deref().unwrap_or("Untitled"),
            snippet.code_description
        ));
        for item in snippet.code_list {
            out.push(format!("Code ({}):\n{}", item.language, item.code));
        }
    }
    for snippet in reply.info_snippets {
        out.push(format!(
            "\nTitle: {}\nContent: {}",
            snippet.title.as_deref().unwrap_or("Untitled"),
            snippet.content
        ));
    }
    Ok(out.join("\n"))
}
