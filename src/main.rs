use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use hunkwise_core::{HunkwiseConfig, OutputFormat, PullRequestDetails, ReviewComment};
use hunkwise_difflens::filter::DiffFilter;
use hunkwise_difflens::parser::{parse_unified_diff, FileDiff};
use hunkwise_review::github::{GitHubClient, PullRequestRef};
use hunkwise_review::pipeline::ReviewPipeline;
use hunkwise_review::{build_service, interpret_response};

const CONFIG_FILE: &str = ".hunkwise.toml";

#[derive(Parser)]
#[command(
    name = "hunkwise",
    version,
    about = "Line-anchored pull request reviews from pluggable LLM backends",
    long_about = "hunkwise sends every hunk of a diff to an LLM backend and turns the\n\
                  JSON it answers with into inline review comments.\n\n\
                  Examples:\n  \
                    git diff main | hunkwise review          Review a diff from stdin\n  \
                    hunkwise review --pr owner/repo#1        Review a GitHub pull request\n  \
                    hunkwise prompt --file changes.patch     Show the prompts without calling a model\n  \
                    hunkwise parse --file reply.txt          Interpret a raw model reply"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .hunkwise.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: text, json or markdown
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Create a default .hunkwise.toml in the current directory
    Init,
    /// Print the prompt every hunk would be sent with, without calling a model
    Prompt {
        /// Read diff from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Pull request title to embed
        #[arg(long, default_value = "")]
        title: String,

        /// Pull request description to embed
        #[arg(long)]
        description: Option<String>,

        /// Backend whose prompt wording to use (overrides llm.provider)
        #[arg(long)]
        provider: Option<String>,
    },
    /// Interpret a raw model reply and print the review comments it contains
    Parse {
        /// Read the reply from file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Review a diff hunk by hunk with the configured backend
    #[command(long_about = "Review a diff hunk by hunk with the configured backend.\n\n\
        Accepts a diff from stdin, a file, or a GitHub pull request.\n\n\
        Examples:\n  git diff | hunkwise review --title 'Fix login'\n  \
        hunkwise review --pr owner/repo#123 --post-comments\n  \
        hunkwise review --event-path \"$GITHUB_EVENT_PATH\" --post-comments")]
    Review {
        /// Read diff from file instead of stdin
        #[arg(long, conflicts_with_all = ["pr", "event_path"])]
        file: Option<PathBuf>,

        /// GitHub pull request (owner/repo#123)
        #[arg(long, conflicts_with = "event_path")]
        pr: Option<String>,

        /// GitHub Actions event payload naming the pull request
        #[arg(long)]
        event_path: Option<PathBuf>,

        /// Pull request title (overrides the one fetched from GitHub)
        #[arg(long)]
        title: Option<String>,

        /// Pull request description (overrides the one fetched from GitHub)
        #[arg(long)]
        description: Option<String>,

        /// Additional glob patterns to exclude (repeatable, comma-separated)
        #[arg(long)]
        exclude: Vec<String>,

        /// Post the comments as a review on the pull request
        #[arg(long)]
        post_comments: bool,
    },
}

fn read_input(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            Ok(input)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<HunkwiseConfig> {
    let config = match path {
        Some(path) => HunkwiseConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                HunkwiseConfig::from_file(default_path)?
            } else {
                tracing::debug!("no {CONFIG_FILE} found, using defaults");
                HunkwiseConfig::default()
            }
        }
    };
    Ok(config)
}

fn parse_diff_input(input: &str) -> Result<Vec<FileDiff>> {
    if input.trim().is_empty() {
        miette::bail!(miette::miette!(
            help = "Pipe a diff to hunkwise, e.g.: git diff | hunkwise review\n       Or use --file <path> or --pr owner/repo#123",
            "Empty diff input"
        ));
    }
    Ok(parse_unified_diff(input)?)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("HUNKWISE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

const DEFAULT_CONFIG: &str = r#"# hunkwise configuration

[llm]
# Backend: "openai", "ollama", "openai-compatible" or "gemini"
provider = "openai"
model = "gpt-4o"
# api_key = "sk-..."       # or set OPENAI_API_KEY / GEMINI_API_KEY
# base_url = "http://localhost:11434"
temperature = 0.2
# max_output_tokens = 1024
timeout_secs = 120

[review]
# Glob patterns of files to leave out, e.g. ["docs/**", "*.generated.rs"]
exclude = []
# Extensions (without dot) to leave out
skip_extensions = []
# Files with more changed lines are skipped
max_changed_lines = 1000
# Cap on comments per run
# max_comments = 25
"#;

fn print_comments(comments: &[ReviewComment], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(comments).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            for c in comments {
                println!("- **Line {}**: {}", c.line_number, c.review_comment);
            }
        }
        OutputFormat::Text => {
            if comments.is_empty() {
                println!("No review comments.");
            }
            for c in comments {
                println!("line {}: {}", c.line_number, c.review_comment);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Command::Prompt {
            ref file,
            ref title,
            ref description,
            ref provider,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let mut llm = config.llm.clone();
            if let Some(provider) = provider {
                llm.provider = provider.clone();
            }
            // Prompts never reach the network, so a missing key is fine here.
            if llm.resolve_api_key().is_none() {
                llm.api_key = Some("unused".into());
            }
            let service = build_service(&llm)?;

            let diffs = parse_diff_input(&read_input(file)?)?;
            let filtered = DiffFilter::from_config(&config.review).filter(diffs);
            let pr = PullRequestDetails {
                title: title.clone(),
                description: description.clone(),
                ..PullRequestDetails::default()
            };

            let mut prompts = Vec::new();
            for diff in &filtered.kept {
                for hunk in &diff.hunks {
                    prompts.push((diff, hunk, service.create_prompt(&diff.file, hunk, &pr)));
                }
            }

            match cli.format {
                OutputFormat::Json => {
                    let items: Vec<serde_json::Value> = prompts
                        .iter()
                        .map(|(diff, hunk, prompt)| {
                            serde_json::json!({
                                "path": diff.file.path,
                                "hunk": hunk.header(),
                                "prompt": prompt,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&items).into_diagnostic()?);
                }
                OutputFormat::Markdown => {
                    for (diff, hunk, prompt) in &prompts {
                        println!("## `{}` {}\n", diff.file.path.display(), hunk.header());
                        println!("````text\n{prompt}````\n");
                    }
                }
                OutputFormat::Text => {
                    for (diff, hunk, prompt) in &prompts {
                        println!("=== {} {} ===", diff.file.path.display(), hunk.header());
                        println!("{prompt}");
                    }
                }
            }
        }
        Command::Parse { ref file } => {
            let raw = read_input(file)?;
            print_comments(&interpret_response(&raw), cli.format)?;
        }
        Command::Review {
            ref file,
            ref pr,
            ref event_path,
            ref title,
            ref description,
            ref exclude,
            post_comments,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.review.exclude.extend(exclude.iter().cloned());

            let pr_ref = match (pr, event_path) {
                (Some(pr), _) => Some(pr.parse::<PullRequestRef>()?),
                (None, Some(path)) => Some(PullRequestRef::from_event_file(path)?),
                (None, None) => None,
            };
            if post_comments && pr_ref.is_none() {
                miette::bail!(miette::miette!(
                    help = "Pass --pr owner/repo#123 or --event-path",
                    "--post-comments needs a pull request"
                ));
            }

            let github = match &pr_ref {
                Some(_) => Some(GitHubClient::new(None)?),
                None => None,
            };

            let (diff_input, mut details) = match (&github, &pr_ref) {
                (Some(github), Some(pr_ref)) => (
                    github.get_pr_diff(pr_ref).await?,
                    github.get_pr_details(pr_ref).await?,
                ),
                _ => (read_input(file)?, PullRequestDetails::default()),
            };
            if let Some(title) = title {
                details.title = title.clone();
            }
            if let Some(description) = description {
                details.description = Some(description.clone());
            }

            let diffs = parse_diff_input(&diff_input)?;
            let service = build_service(&config.llm)?;
            let pipeline = ReviewPipeline::new(service, &config.review);
            let result = pipeline.review(diffs, &details).await?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);
                }
                OutputFormat::Markdown => print!("{}", result.to_markdown()),
                OutputFormat::Text => print!("{result}"),
            }

            if post_comments {
                if let (Some(github), Some(pr_ref)) = (&github, &pr_ref) {
                    github
                        .post_review(pr_ref, &result.comments, &result.summary())
                        .await?;
                    eprintln!("Posted {} comment(s) to {pr_ref}", result.comments.len());
                }
            }
        }
    }

    Ok(())
}
