use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use viewer_contracts::chart::{figure_from_payload, normalize_figure};
use viewer_contracts::chat::{parse_intent, CHAT_HELP_COMMANDS};
use viewer_contracts::sse::read_sse_records;
use viewer_engine::{
    dispatch_records, AgentClient, AgentConfig, DispatchSummary, MissingSettings,
    TerminalPresenter,
};

#[derive(Debug, Parser)]
#[command(
    name = "vanna-view",
    version,
    about = "Render every response type of an analytics agent in the terminal"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Send one prompt and render the streamed answer.
    Ask(AskArgs),
    /// Interactive prompt loop.
    Chat(ChatArgs),
    /// Render a saved response stream.
    Replay(ReplayArgs),
    /// Normalize one chart document.
    Normalize(NormalizeArgs),
}

#[derive(Debug, Args)]
struct AgentArgs {
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    user_email: Option<String>,
    #[arg(long)]
    agent_id: Option<String>,
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// Directory for exported chart JSON/HTML files.
    #[arg(long)]
    charts_dir: Option<PathBuf>,
    /// Print raw payloads alongside rendered frames.
    #[arg(long)]
    raw: bool,
}

#[derive(Debug, Parser)]
struct AskArgs {
    #[arg(long)]
    prompt: String,
    #[command(flatten)]
    agent: AgentArgs,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[command(flatten)]
    agent: AgentArgs,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Parser)]
struct ReplayArgs {
    #[arg(long)]
    input: PathBuf,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Parser)]
struct NormalizeArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            if let Some(missing) = err.downcast_ref::<MissingSettings>() {
                eprintln!("Please fill in all fields. ({missing})");
                std::process::exit(2);
            }
            eprintln!("vanna-view error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Ask(args) => run_ask(args),
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Replay(args) => run_replay(args),
        Command::Normalize(args) => run_normalize(args),
    }
}

fn agent_config(args: &AgentArgs) -> AgentConfig {
    AgentConfig::from_env().with_overrides(
        args.api_base.as_deref(),
        args.api_key.as_deref(),
        args.user_email.as_deref(),
        args.agent_id.as_deref(),
    )
}

fn run_ask(args: AskArgs) -> Result<i32> {
    let prompt = args.prompt.trim();
    if prompt.is_empty() {
        return Err(MissingSettings(vec!["prompt"]).into());
    }
    let client = AgentClient::new(agent_config(&args.agent));
    let records = client.chat_sse(prompt)?;
    let summary = render_records(&records, args.output.raw, args.output.charts_dir)?;
    Ok(exit_code(&summary))
}

fn run_replay(args: ReplayArgs) -> Result<i32> {
    let file = fs::File::open(&args.input)
        .with_context(|| format!("failed opening {}", args.input.display()))?;
    let records = read_sse_records(BufReader::new(file))
        .with_context(|| format!("failed reading {}", args.input.display()))?;
    let summary = render_records(&records, args.output.raw, args.output.charts_dir)?;
    Ok(exit_code(&summary))
}

fn run_normalize(args: NormalizeArgs) -> Result<i32> {
    let figure = normalize_chart_file(&args.input)?;
    let rendered = serde_json::to_string_pretty(&figure)?;
    match args.out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, rendered)
                .with_context(|| format!("failed writing {}", path.display()))?;
            println!("Normalized chart written to {}", path.display());
        }
        None => println!("{rendered}"),
    }
    Ok(0)
}

/// Reads a chart document, or a whole `plotly` frame record, and normalizes
/// it. Decode failures are printed as warnings; shape errors fail.
fn normalize_chart_file(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?;
    let document: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let payload = document.get("json_plotly").unwrap_or(&document);
    let mut figure = figure_from_payload(payload)?;
    let report = normalize_figure(&mut figure)
        .with_context(|| format!("failed normalizing {}", path.display()))?;
    for failure in &report.fields.failures {
        eprintln!("warning: {} replaced with []: {}", failure.path, failure.error);
    }
    Ok(figure)
}

fn render_records(
    records: &[Value],
    show_raw: bool,
    charts_dir: Option<PathBuf>,
) -> Result<DispatchSummary> {
    println!("Response Breakdown ({} frames)", records.len());
    let stdout = io::stdout();
    let mut presenter = TerminalPresenter::new(stdout.lock())
        .with_raw(show_raw)
        .with_chart_dir(charts_dir);
    let summary = dispatch_records(records, &mut presenter)?;
    presenter.into_inner().flush()?;
    Ok(summary)
}

fn exit_code(summary: &DispatchSummary) -> i32 {
    if summary.charts_failed > 0 {
        3
    } else {
        0
    }
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut client = AgentClient::new(agent_config(&args.agent));
    let mut show_raw = args.output.raw;
    let mut turn = 0usize;

    let stdin = io::stdin();
    let mut line = String::new();

    println!("Agent chat started. Type /help for commands.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => continue,
            "help" => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            "quit" => break,
            "set_agent" => match command_value(&intent.command_args) {
                Some(agent_id) => {
                    client.config_mut().agent_id = agent_id.clone();
                    println!("Agent set to {agent_id}");
                }
                None => println!("/agent requires an agent id"),
            },
            "set_email" => match command_value(&intent.command_args) {
                Some(email) => {
                    client.config_mut().user_email = email.clone();
                    println!("User email set to {email}");
                }
                None => println!("/email requires an address"),
            },
            "set_raw" => match intent.command_args.get("enabled").and_then(Value::as_bool) {
                Some(enabled) => {
                    show_raw = enabled;
                    println!("Raw payloads {}", if enabled { "on" } else { "off" });
                }
                None => println!("/raw takes on or off"),
            },
            "ask" => {
                let Some(prompt) = intent.prompt.as_deref() else {
                    continue;
                };
                if let Err(missing) = client.config().validate() {
                    println!("Please fill in all fields. ({missing})");
                    continue;
                }
                turn += 1;
                println!("Calling agent...");
                let records = match client.chat_sse(prompt) {
                    Ok(records) => records,
                    Err(err) => {
                        println!("error: {err:#}");
                        continue;
                    }
                };
                let charts_dir = args
                    .output
                    .charts_dir
                    .as_ref()
                    .map(|dir| dir.join(format!("turn-{turn:02}")));
                render_records(&records, show_raw, charts_dir)?;
            }
            "unknown" => {
                let command = intent
                    .command_args
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                println!("Unknown command: /{command}");
            }
            other => println!("Unhandled action: {other}"),
        }
    }

    Ok(())
}

fn command_value(args: &BTreeMap<String, Value>) -> Option<String> {
    args.get("value")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use serde_json::json;

    use viewer_contracts::sse::read_sse_records;
    use viewer_engine::{dispatch_records, DispatchSummary, TerminalPresenter};

    use super::{exit_code, normalize_chart_file, Cli, Command};

    #[test]
    fn parses_ask_with_agent_and_output_flags() {
        let cli = Cli::try_parse_from([
            "vanna-view",
            "ask",
            "--prompt",
            "Show me usage stats by email",
            "--agent-id",
            "agent-1",
            "--charts-dir",
            "/tmp/charts",
            "--raw",
        ])
        .unwrap_or_else(|err| panic!("{err}"));
        match cli.command {
            Command::Ask(args) => {
                assert_eq!(args.prompt, "Show me usage stats by email");
                assert_eq!(args.agent.agent_id.as_deref(), Some("agent-1"));
                assert!(args.output.raw);
                assert_eq!(
                    args.output.charts_dir.as_deref(),
                    Some(std::path::Path::new("/tmp/charts"))
                );
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn normalize_accepts_frame_records_and_string_payloads() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("frame.json");
        let figure = json!({"data": [{"y": {"bdata": "AQACAAMA", "dtype": "i2"}}]});
        std::fs::write(
            &path,
            serde_json::to_string(&json!({
                "type": "plotly",
                "json_plotly": serde_json::to_string(&figure)?,
            }))?,
        )?;

        let normalized = normalize_chart_file(&path)?;
        assert_eq!(normalized["data"][0]["y"], json!([1, 2, 3]));
        Ok(())
    }

    #[test]
    fn normalize_reports_shape_errors() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("figure.json");
        std::fs::write(&path, "{\"layout\": {}}")?;
        let err = normalize_chart_file(&path)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(err.contains("no `data` trace list"), "{err}");
        Ok(())
    }

    #[test]
    fn demo_stream_replays_without_chart_failures() -> anyhow::Result<()> {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/usage-stream.sse");
        let file = std::fs::File::open(path)?;
        let records = read_sse_records(std::io::BufReader::new(file))?;
        let mut presenter = TerminalPresenter::new(Vec::new());
        let summary = dispatch_records(&records, &mut presenter)?;

        assert_eq!(summary.frames, 6);
        assert_eq!(summary.charts_rendered, 1);
        assert_eq!(summary.decode_failures, 1);
        assert_eq!(exit_code(&summary), 0);
        let text = String::from_utf8(presenter.into_inner())?;
        assert!(text.contains("[chart] Queries per weekday (1 traces)"));
        assert!(text.contains("  - bar \"queries\": 5 points"));
        assert!(text.contains("ok: End of response stream"));
        Ok(())
    }

    #[test]
    fn failed_charts_change_the_exit_code() {
        assert_eq!(exit_code(&DispatchSummary::default()), 0);
        let summary = DispatchSummary {
            charts_failed: 1,
            ..DispatchSummary::default()
        };
        assert_eq!(exit_code(&summary), 3);
    }
}
