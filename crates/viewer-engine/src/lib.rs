use std::env;
use std::io::BufReader;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use viewer_contracts::chart::{figure_from_payload, normalize_figure};
use viewer_contracts::frames::{Frame, Table, ACCEPTABLE_RESPONSES};
use viewer_contracts::sse::{read_sse_records, truncate_text};

pub mod terminal;

pub use terminal::TerminalPresenter;

const DEFAULT_API_BASE: &str = "https://app.vanna.ai/api/v0";
const API_KEY_HEADER: &str = "VANNA-API-KEY";
const ERROR_BODY_MAX_CHARS: usize = 512;

/// Connection settings for the analytics agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    pub api_base: String,
    pub api_key: String,
    pub user_email: String,
    pub agent_id: String,
}

/// Required settings that were left empty.
#[derive(Debug, Error)]
#[error("missing required settings: {}", .0.join(", "))]
pub struct MissingSettings(pub Vec<&'static str>);

impl AgentConfig {
    /// Reads `VANNA_API_BASE`, `VANNA_API_KEY`, `VANNA_USER_EMAIL` and
    /// `VANNA_AGENT_ID`. Unset values stay empty, except the API base.
    pub fn from_env() -> Self {
        Self {
            api_base: non_empty_env("VANNA_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: non_empty_env("VANNA_API_KEY").unwrap_or_default(),
            user_email: non_empty_env("VANNA_USER_EMAIL").unwrap_or_default(),
            agent_id: non_empty_env("VANNA_AGENT_ID").unwrap_or_default(),
        }
    }

    /// Applies explicit overrides; `None` and blank values keep the current
    /// setting.
    pub fn with_overrides(
        mut self,
        api_base: Option<&str>,
        api_key: Option<&str>,
        user_email: Option<&str>,
        agent_id: Option<&str>,
    ) -> Self {
        let pick = |current: &mut String, value: Option<&str>| {
            if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
                *current = value.to_string();
            }
        };
        pick(&mut self.api_base, api_base);
        pick(&mut self.api_key, api_key);
        pick(&mut self.user_email, user_email);
        pick(&mut self.agent_id, agent_id);
        self.api_base = self.api_base.trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> std::result::Result<(), MissingSettings> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("api base", &self.api_base),
            ("API key", &self.api_key),
            ("user email", &self.user_email),
            ("agent id", &self.agent_id),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingSettings(missing))
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat_sse", self.api_base)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub user_email: &'a str,
    pub agent_id: &'a str,
    pub acceptable_responses: &'a [&'a str],
}

/// Blocking client for the agent's streaming chat endpoint.
pub struct AgentClient {
    config: AgentConfig,
    http: HttpClient,
}

impl AgentClient {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AgentConfig {
        &mut self.config
    }

    /// Sends one prompt and buffers every record of the streamed answer.
    pub fn chat_sse(&self, message: &str) -> Result<Vec<Value>> {
        self.config.validate()?;
        let endpoint = self.config.endpoint();
        let request = ChatRequest {
            message,
            user_email: &self.config.user_email,
            agent_id: &self.config.agent_id,
            acceptable_responses: ACCEPTABLE_RESPONSES,
        };
        tracing::info!(%endpoint, agent_id = %self.config.agent_id, "sending prompt to agent");

        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .with_context(|| format!("agent request failed ({endpoint})"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!(
                "agent request failed ({}): {}",
                status.as_u16(),
                truncate_text(&body, ERROR_BODY_MAX_CHARS)
            );
        }

        let records =
            read_sse_records(BufReader::new(response)).context("agent response stream failed")?;
        tracing::info!(records = records.len(), "agent response stream finished");
        Ok(records)
    }
}

/// Presentation layer the dispatcher renders into.
pub trait Presenter {
    fn header(&mut self, number: usize, kind: &str) -> Result<()>;
    fn info(&mut self, text: &str) -> Result<()>;
    fn markdown(&mut self, text: &str) -> Result<()>;
    fn caption(&mut self, text: &str) -> Result<()>;
    fn warning(&mut self, text: &str) -> Result<()>;
    fn error(&mut self, text: &str) -> Result<()>;
    fn success(&mut self, text: &str) -> Result<()>;
    fn image(&mut self, url: &str, caption: &str) -> Result<()>;
    fn link(&mut self, title: &str, url: &str) -> Result<()>;
    fn button(&mut self, label: &str) -> Result<()>;
    fn table(&mut self, table: &Table) -> Result<()>;
    fn code(&mut self, code: &str, language: &str) -> Result<()>;
    /// Receives a fully normalized chart document.
    fn chart(&mut self, number: usize, figure: &Value) -> Result<()>;
    fn raw_json(&mut self, label: &str, value: &Value) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub frames: usize,
    pub charts_rendered: usize,
    pub charts_failed: usize,
    pub decode_failures: usize,
}

/// Renders every record in order. A chart that cannot be normalized is
/// reported with its raw payload and the loop moves on; only presenter
/// errors abort.
pub fn dispatch_records(records: &[Value], presenter: &mut dyn Presenter) -> Result<DispatchSummary> {
    let mut summary = DispatchSummary::default();
    for (idx, record) in records.iter().enumerate() {
        let number = idx + 1;
        let frame = Frame::from_record(record);
        presenter.header(number, frame.kind())?;
        summary.frames += 1;

        match frame {
            Frame::Text { text } => presenter.info(&text)?,
            Frame::Image { image_url, caption } => match image_url {
                Some(url) => presenter.image(&url, &caption)?,
                None => {
                    presenter.warning("Image URL missing or invalid")?;
                    presenter.raw_json("Record", record)?;
                }
            },
            Frame::Link {
                title,
                url,
                description,
            } => {
                presenter.link(&title, &url)?;
                if let Some(description) = description {
                    presenter.caption(&description)?;
                }
            }
            Frame::Buttons { text, buttons } => {
                presenter.markdown(&text)?;
                for button in &buttons {
                    presenter.button(&button.label)?;
                }
            }
            Frame::Dataframe { table } => match table {
                Some(table) => presenter.table(&table)?,
                None => {
                    presenter.warning("Dataframe payload missing or not tabular")?;
                    presenter.raw_json("Record", record)?;
                }
            },
            Frame::Plotly { payload } => {
                render_chart(number, &payload, presenter, &mut summary)?;
            }
            Frame::Sql { query } => presenter.code(&query, "sql")?,
            Frame::Error { error } => presenter.error(&error)?,
            Frame::End => presenter.success("End of response stream")?,
            Frame::Unknown { kind } => {
                presenter.warning(&format!("Unknown response type: {kind}"))?;
                presenter.raw_json("Record", record)?;
            }
        }
    }
    tracing::debug!(?summary, "dispatched response frames");
    Ok(summary)
}

fn render_chart(
    number: usize,
    payload: &Value,
    presenter: &mut dyn Presenter,
    summary: &mut DispatchSummary,
) -> Result<()> {
    let rendered = figure_from_payload(payload)
        .map_err(anyhow::Error::from)
        .and_then(|mut figure| {
            let report = normalize_figure(&mut figure)?;
            presenter.chart(number, &figure)?;
            Ok(report)
        });

    match rendered {
        Ok(report) => {
            summary.charts_rendered += 1;
            summary.decode_failures += report.fields.failures.len();
            presenter.raw_json("Chart JSON", payload)?;
        }
        Err(err) => {
            let message = format!("{err:#}");
            tracing::warn!(response = number, error = %message, "chart render failed");
            summary.charts_failed += 1;
            presenter.error("Plotly render failed")?;
            presenter.error(&message)?;
            presenter.raw_json("Chart JSON", payload)?;
        }
    }
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
