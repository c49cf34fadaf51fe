//! Planning collaborator: turns a question plus file list into a [`Plan`].

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::{
    cache::RequestCache,
    config::Config,
    llm::{ChatMessage, ChatOptions, LlmClient},
    plan::{Plan, StepKind},
};

pub struct Planner {
    llm: LlmClient,
    options: ChatOptions,
    cache: Option<RequestCache>,
}

impl Planner {
    pub fn new(llm: LlmClient, options: ChatOptions, cache: Option<RequestCache>) -> Self {
        Self { llm, options, cache }
    }

    /// `model` overrides `DEFAULT_MODEL`; `use_cache` false bypasses the response cache.
    pub fn from_config(cfg: &Config, model: Option<String>, use_cache: bool) -> Result<Self> {
        let llm = LlmClient::from_config(cfg)?;
        let options = ChatOptions {
            model: model
                .or_else(|| cfg.get("DEFAULT_MODEL"))
                .unwrap_or_else(|| "openai/gpt-4.1-nano".into()),
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: cfg.get_u64("PLANNER_MAX_TOKENS").unwrap_or(2048) as u32,
        };
        let cache = use_cache.then(|| RequestCache::from_config(cfg));
        Ok(Self::new(llm, options, cache))
    }

    pub async fn plan(&self, question: &str, files: &[String], allowed: &[StepKind]) -> Result<Plan> {
        let messages = vec![ChatMessage::user(build_prompt(question, files, allowed))];
        let key = self
            .cache
            .as_ref()
            .map(|c| c.key_for(self.llm.base_url(), &self.options.model, &messages));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(text) = cache.get(key) {
                info!("using cached plan");
                return parse_plan(&text, allowed);
            }
        }

        if !self.llm.has_api_key() {
            bail!("OPENAI_API_KEY (or AIPIPE_TOKEN) is not set; pass --plan to run without the planner");
        }
        info!(model = %self.options.model, files = files.len(), "requesting plan");
        let text = self
            .llm
            .complete(messages, self.options.clone())
            .await
            .context("Planner request failed")?;
        debug!(response = %text, "raw planner response");

        let plan = parse_plan(&text, allowed)?;
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            cache.set(key, &text)?;
        }
        Ok(plan)
    }
}

/// Parse planner output and reject step types the engine will not run.
pub fn parse_plan(text: &str, allowed: &[StepKind]) -> Result<Plan> {
    let plan = Plan::from_json(text).context("Planner returned an invalid plan")?;
    if let Some(step) = plan.steps().iter().find(|s| !allowed.contains(&s.kind)) {
        bail!("Planner used step type '{}' which is not enabled (step '{}')", step.kind, step.id);
    }
    Ok(plan)
}

pub fn build_prompt(question: &str, files: &[String], allowed: &[StepKind]) -> String {
    let types: Vec<&str> = allowed.iter().map(StepKind::as_str).collect();
    let files_json = serde_json::to_string(files).unwrap_or_else(|_| "[]".into());
    let types_json = serde_json::to_string(&types).unwrap_or_else(|_| "[]".into());
    format!(
        r#"You plan data-analysis jobs. Produce a JSON array of steps that answers the question below.

Files in the working directory: {files_json}

Question:
"""{question}"""

Each step is an object with "id", "type" and "args", and may carry "timeout" (seconds).

Rules:
1. Use only these step types: {types_json}.
2. Step ids are unique, short snake_case names. Never use "__final__".
3. A step may only reference ids of steps that come before it ("from", "df_ref", "from_steps").
4. Read uploaded files with read_file using one of the listed names. Never invent file names; every other input must be the save_as of an earlier step.
5. Step arguments:
   - fetch_url: {{"url", "save_as"}}
   - read_file: {{"path"}}
   - extract_table: {{"from", "save_as", "index"}} where "from" is a fetch_url or read_file step
   - query: {{"query", "save_as"}} SQL over every CSV in the working directory; refer to tables by file name, e.g. "films.csv"
   - run_code: {{"code": [lines...]}} runs in the working directory; print the answer to stdout
   - plot: {{"df_ref", "x", "y", "regression", "xlabel", "ylabel", "save_as"}}
   - summarize: {{"from_steps": [ids], "columns", "max_rows"}}
   - return: {{"from": [ids]}}
6. The last step must be "return", listing the steps whose results form the answer.

Example:
[
  {{"id": "fetch_page", "type": "fetch_url", "args": {{"url": "https://en.wikipedia.org/wiki/List_of_highest-grossing_films", "save_as": "films.html"}}}},
  {{"id": "films", "type": "extract_table", "args": {{"from": "fetch_page", "save_as": "films.csv"}}}},
  {{"id": "top", "type": "query", "args": {{"query": "SELECT * FROM \"films.csv\" LIMIT 10", "save_as": "top.csv"}}}},
  {{"id": "answer", "type": "return", "args": {{"from": ["top"]}}}}
]

Respond with the raw JSON array only, without explanations or Markdown."#
    )
}
