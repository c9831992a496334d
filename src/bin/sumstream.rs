use clap::Parser;
use log::{debug, error};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sumstream::{
  CallbackSink, RequestController, RequestParams, SummarizerConfig,
  SummarySink, TerminationReason,
};

/// Stream a summary of a text file (or stdin) to stdout.
/// Ctrl-C stops the summary where it is.
#[derive(Debug, Parser)]
#[command(name = "sumstream", version)]
struct Cli
{   /// Text file to summarize; reads stdin when omitted
    input: Option<PathBuf>
  , /// Summary endpoint; defaults to $SUMSTREAM_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>
  , /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>
  , /// Target length as a percentage of the input
    #[arg(long, default_value_t = sumstream::request::DEFAULT_PERCENT)]
    percent: u8
  , /// Bulleted list instead of a paragraph
    #[arg(long)]
    bullets: bool
  , /// Sampling temperature between 0 and 1
    #[arg(long, default_value_t = sumstream::request::DEFAULT_TEMPERATURE)]
    temperature: f32
  , /// Cancel the request after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>
}

fn read_input(path: Option<&PathBuf>)
  -> Result<String, sumstream::Error>
{   let mut content = String::new();
    match path
    {   Some(path) => {
          content = std::fs::read_to_string(path).map_err(|e| {
            sumstream::Error::Other(
              format!("{}: {}", path.display(), e)
            )
          })?;
        }
      , None => {
          std::io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| sumstream::Error::Other(e.to_string()))?;
        }
    }
    Ok(content)
}

fn load_config(cli: &Cli)
  -> Result<SummarizerConfig, sumstream::Error>
{   let mut config = match &cli.config
    {   Some(path) => SummarizerConfig::from_json_file(path)?
      , None => SummarizerConfig::from_env()?
    };
    if let Some(endpoint) = &cli.endpoint
    {   config.endpoint = endpoint.clone();
        config.validate()?;
    }
    Ok(config)
}

/// Writes each new suffix of the summary to stdout; stops writing and
/// fires `closed` on the first write error (e.g. a broken pipe)
fn stdout_sink(closed: CancellationToken) -> impl SummarySink
{   let on_update_closed = closed.clone();
    let mut printed = 0usize;
    CallbackSink::new(
      move |text: &str| {
        if on_update_closed.is_cancelled()
        {   return;
        }
        let mut stdout = std::io::stdout().lock();
        let written = stdout
          .write_all(text[printed..].as_bytes())
          .and_then(|_| stdout.flush());
        match written
        {   Ok(()) => printed = text.len()
          , Err(e) => {
              error!("Writing summary to stdout failed: {}", e);
              on_update_closed.cancel();
            }
        }
      },
      move |reason: &TerminationReason| {
        debug!("Summary done: {}", reason);
        if !closed.is_cancelled()
        {   let _ = writeln!(std::io::stdout());
        }
      }
    )
}

async fn run(cli: Cli) -> Result<TerminationReason, sumstream::Error>
{   let config = load_config(&cli)?;
    let content = read_input(cli.input.as_ref())?;
    let params = RequestParams::new(content)
      .with_percent(cli.percent)
      .with_bullets(cli.bullets)
      .with_temperature(cli.temperature);

    let controller = RequestController::new(&config)?;
    let stdout_closed = CancellationToken::new();

    let handle = controller
      .start(params, stdout_sink(stdout_closed.clone()))
      .await?;
    if let Some(secs) = cli.timeout_secs
    {   handle.cancel_after(Duration::from_secs(secs));
    }

    let outcome = tokio::select!
    { outcome = handle.finished() => outcome?
    , _ = tokio::signal::ctrl_c() => {
        debug!("Ctrl-C, cancelling");
        controller.cancel(&handle);
        handle.finished().await?
      }
    , _ = stdout_closed.cancelled() => {
        controller.cancel(&handle);
        handle.finished().await?;
        return Err(sumstream::Error::Other(
          "stdout closed, request cancelled".to_string()
        ));
      }
    };

    controller.shutdown().await?;
    Ok(outcome.reason)
}

/// Process exit status: cancellation is not a failure
fn exit_status(result: &Result<TerminationReason, sumstream::Error>)
  -> u8
{   match result
    {   Ok(reason) if reason.is_failure() => 1
      , Ok(_) => 0
      , Err(_) => 1
    }
}

#[tokio::main]
async fn main() -> ExitCode
{   env_logger::init();
    let cli = Cli::parse();

    let result = run(cli).await;
    match &result
    {   Ok(TerminationReason::Cancelled) => {
          eprintln!("sumstream: cancelled");
        }
      , Ok(reason) if reason.is_failure() => {
          eprintln!("sumstream: {}", reason);
        }
      , Ok(_) => {}
      , Err(e) => {
          error!("{}", e);
          eprintln!("sumstream: {}", e);
        }
    }
    ExitCode::from(exit_status(&result))
}
