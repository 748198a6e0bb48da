use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use askgraph::data::RowSet;
use askgraph::render::{OutputFormat, RenderOptions};
use askgraph::response::AgentReply;
use askgraph::session::{ChartState, Session, TranscriptEntry};

#[derive(Parser, Debug)]
#[command(name = "askgraph")]
#[command(about = "Render charts from conversational data-analysis replies", long_about = None)]
struct Args {
    /// Backend reply JSON file ('-' reads stdin)
    reply: String,

    /// Replace the reply's result rows with rows from this file
    #[arg(long)]
    rows: Option<PathBuf>,

    /// Format of the --rows file
    #[arg(long, value_enum, default_value_t = RowsFormat::Json)]
    rows_format: RowsFormat,

    /// Prompt text recorded in the transcript
    #[arg(long, default_value = "")]
    prompt: String,

    /// Output file for the chart image (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 800)]
    width: u32,

    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Emit SVG instead of PNG
    #[arg(long)]
    svg: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum RowsFormat {
    Json,
    Csv,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let reply_text = if args.reply == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read reply from stdin")?;
        text
    } else {
        fs::read_to_string(&args.reply)
            .with_context(|| format!("Failed to read reply file '{}'", args.reply))?
    };
    let mut reply = AgentReply::from_json_str(&reply_text).context("Failed to parse reply JSON")?;

    if let Some(path) = &args.rows {
        let rows = match args.rows_format {
            RowsFormat::Json => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read rows file '{}'", path.display()))?;
                let value: serde_json::Value =
                    serde_json::from_str(&text).context("Failed to parse rows JSON")?;
                RowSet::from_json(&value)?
            }
            RowsFormat::Csv => {
                let file = fs::File::open(path)
                    .with_context(|| format!("Failed to open rows file '{}'", path.display()))?;
                RowSet::from_csv_reader(file)?
            }
        };
        reply.results = Some(rows.to_json());
    }

    let render_options = RenderOptions {
        width: args.width,
        height: args.height,
        format: if args.svg {
            OutputFormat::Svg
        } else {
            OutputFormat::Png
        },
    };

    let mut session = Session::new(render_options);
    let token = session.begin_request(&args.prompt);
    session.apply_reply(token, &reply);

    for entry in session.transcript() {
        match entry {
            TranscriptEntry::User { prompt } if !prompt.is_empty() => {
                eprintln!("> {prompt}");
            }
            TranscriptEntry::User { .. } => {}
            TranscriptEntry::Agent { text, sql } => {
                eprintln!("{text}");
                if let Some(sql) = sql {
                    eprintln!("[query] {sql}");
                }
            }
        }
    }

    match session.insights().chart {
        ChartState::Rendered => {
            let image = session
                .export_chart()
                .context("Rendered chart has no exportable image")?;
            match &args.output {
                Some(path) => fs::write(path, image)
                    .with_context(|| format!("Failed to write '{}'", path.display()))?,
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    handle
                        .write_all(image)
                        .context("Failed to write chart to stdout")?;
                    handle.flush().context("Failed to flush stdout")?;
                }
            }
        }
        ChartState::Empty { ref message } | ChartState::Failed { ref message } => {
            eprintln!("{message}");
        }
        ChartState::Idle => {}
    }

    Ok(())
}
