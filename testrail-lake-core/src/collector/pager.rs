//! Generic API collector
//!
//! Flat mode issues one request (no page size) or walks `limit`/`offset`
//! pages. Fan-out mode runs one such walk per input record, a bounded number
//! at a time. Every page is staged in the raw store in one transaction.

use futures_util::{stream, StreamExt, TryStreamExt};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::client::ApiClient;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::ApiParams;

/// Endpoint path with `{connectionId}`, `{projectId}` and `{input.<field>}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    /// Render the template. Input values are percent-encoded.
    pub fn render(&self, params: &ApiParams, input: Option<&Value>) -> Result<String> {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                Error::Config(format!("unterminated placeholder in URL template {:?}", self.0))
            })?;
            let name = &after[..end];
            out.push_str(&self.resolve(name, params, input)?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn resolve(&self, name: &str, params: &ApiParams, input: Option<&Value>) -> Result<String> {
        match name {
            "connectionId" => Ok(params.connection_id.to_string()),
            "projectId" => Ok(params.project_id.to_string()),
            _ => {
                let field = name.strip_prefix("input.").ok_or_else(|| {
                    Error::Config(format!(
                        "unknown placeholder {{{}}} in URL template {:?}",
                        name, self.0
                    ))
                })?;
                let value = input.and_then(|i| i.get(field)).ok_or_else(|| {
                    Error::Config(format!(
                        "URL template {:?} needs input field {:?}",
                        self.0, field
                    ))
                })?;
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    other => {
                        return Err(Error::Config(format!(
                            "input field {:?} is not a scalar: {}",
                            field, other
                        )))
                    }
                };
                Ok(urlencoding::encode(&text).into_owned())
            }
        }
    }
}

/// How to pull records out of a response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseParser {
    /// Bare array, or the paginated envelope holding the array under `key`
    Envelope(&'static str),
    /// A single object
    Single,
}

/// Records of one response, plus whether the envelope links to a next page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub records: Vec<Value>,
    /// `None` when the response carried no `_links`
    pub has_next: Option<bool>,
}

impl ResponseParser {
    pub fn envelope(key: &'static str) -> Self {
        ResponseParser::Envelope(key)
    }

    pub fn single() -> Self {
        ResponseParser::Single
    }

    pub fn parse(&self, body: Value) -> Result<Page> {
        match self {
            ResponseParser::Single => match body {
                Value::Object(_) => Ok(Page {
                    records: vec![body],
                    has_next: None,
                }),
                other => Err(Error::Transport(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                ))),
            },
            ResponseParser::Envelope(key) => match body {
                Value::Array(records) => Ok(Page {
                    records,
                    has_next: None,
                }),
                Value::Object(mut map) => {
                    let has_next = map.get("_links").map(|links| match links.get("next") {
                        Some(Value::String(s)) => !s.is_empty(),
                        _ => false,
                    });
                    match map.remove(*key) {
                        Some(Value::Array(records)) => Ok(Page { records, has_next }),
                        Some(Value::Null) | None => Ok(Page {
                            records: Vec::new(),
                            has_next,
                        }),
                        Some(other) => Err(Error::Transport(format!(
                            "expected {:?} to be an array, got {}",
                            key,
                            json_kind(&other)
                        ))),
                    }
                }
                other => Err(Error::Transport(format!(
                    "expected an array or envelope, got {}",
                    json_kind(&other)
                ))),
            },
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extra query pairs for one request
pub type QueryFn = Box<dyn Fn(Option<&Value>) -> Vec<(String, String)> + Send + Sync>;

/// Everything one collection needs besides the shared handles
pub struct ApiCollectorArgs {
    /// Raw table the records land in
    pub table: &'static str,
    pub params: ApiParams,
    pub url_template: UrlTemplate,
    /// `None` issues a single request per unit
    pub page_size: Option<usize>,
    pub query: Option<QueryFn>,
    /// Parent records for fan-out mode
    pub input: Option<Vec<Value>>,
    pub parser: ResponseParser,
    /// Fan-out units in flight at once
    pub concurrency: usize,
}

/// Counters reported by one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub requests: usize,
    pub records: usize,
}

impl std::ops::AddAssign for CollectStats {
    fn add_assign(&mut self, other: Self) {
        self.requests += other.requests;
        self.records += other.records;
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Store,
    Fetch,
}

/// Collects one endpoint family into the raw store
pub struct ApiCollector<'a> {
    db: &'a Database,
    api: &'a dyn ApiClient,
    cancel: CancellationToken,
    args: ApiCollectorArgs,
}

impl<'a> ApiCollector<'a> {
    pub fn new(
        db: &'a Database,
        api: &'a dyn ApiClient,
        cancel: CancellationToken,
        args: ApiCollectorArgs,
    ) -> Self {
        Self {
            db,
            api,
            cancel,
            args,
        }
    }

    /// Replace the staged rows for this scope with a fresh collection.
    pub async fn execute(&self) -> Result<CollectStats> {
        let removed = self.db.delete_raw(self.args.table, &self.args.params)?;
        if removed > 0 {
            tracing::debug!(table = self.args.table, removed, "Cleared staged raw rows");
        }

        let (stats, _) = self.run(Mode::Store).await?;

        tracing::info!(
            table = self.args.table,
            requests = stats.requests,
            records = stats.records,
            "Collection complete"
        );
        Ok(stats)
    }

    /// Walk the endpoint and return the records without staging them.
    pub async fn fetch_all(&self) -> Result<Vec<Value>> {
        let (_, records) = self.run(Mode::Fetch).await?;
        Ok(records)
    }

    async fn run(&self, mode: Mode) -> Result<(CollectStats, Vec<Value>)> {
        match &self.args.input {
            None => self.run_unit(None, mode).await,
            Some(inputs) => {
                let units: Vec<(CollectStats, Vec<Value>)> = stream::iter(inputs.iter())
                    .map(|input| self.run_unit(Some(input), mode))
                    .buffer_unordered(self.args.concurrency.max(1))
                    .try_collect()
                    .await?;

                let mut stats = CollectStats::default();
                let mut records = Vec::new();
                for (unit_stats, unit_records) in units {
                    stats += unit_stats;
                    records.extend(unit_records);
                }
                Ok((stats, records))
            }
        }
    }

    async fn run_unit(
        &self,
        input: Option<&Value>,
        mode: Mode,
    ) -> Result<(CollectStats, Vec<Value>)> {
        let path = self.args.url_template.render(&self.args.params, input)?;
        let mut stats = CollectStats::default();
        let mut fetched = Vec::new();
        let mut offset = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut query: Vec<(String, String)> = Vec::new();
            if let Some(size) = self.args.page_size {
                query.push(("limit".to_string(), size.to_string()));
                query.push(("offset".to_string(), offset.to_string()));
            }
            if let Some(extra) = &self.args.query {
                query.extend(extra(input));
            }

            let body = self.api.get(&path, &query).await?;
            stats.requests += 1;
            let page = self.args.parser.parse(body)?;
            let count = page.records.len();

            tracing::debug!(
                table = self.args.table,
                path = %path,
                input = ?input,
                page = stats.requests,
                offset,
                records = count,
                "Fetched page"
            );

            if count > 0 {
                match mode {
                    Mode::Store => {
                        let url = request_url(&self.api.url_for(&path), &query);
                        self.db.insert_raw_page(
                            self.args.table,
                            &self.args.params,
                            &url,
                            input,
                            &page.records,
                        )?;
                    }
                    Mode::Fetch => fetched.extend(page.records),
                }
                stats.records += count;
            }

            let Some(size) = self.args.page_size else {
                break;
            };
            if count == 0 || count < size || page.has_next == Some(false) {
                break;
            }
            offset += count;
        }

        Ok((stats, fetched))
    }
}

fn request_url(base: &str, query: &[(String, String)]) -> String {
    let mut url = base.to_string();
    for (key, value) in query {
        url.push('&');
        url.push_str(&urlencoding::encode(key));
        url.push('=');
        url.push_str(&urlencoding::encode(value));
    }
    url
}
