use std::sync::Arc;

use anyhow::{Context, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use phishsim::classifier::IntentClassifier;
use phishsim::config::{AppConfig, SimulationConfig};
use phishsim::llm::create_gemini_provider;
use phishsim::mail::{MailGateway, ZohoMail};
use phishsim::simulation::{BatchSummary, Report, Simulation};
use phishsim::store::{EventLog, StateStore};

const USAGE: &str = "usage: phishsim <start EMAIL[,EMAIL...] | process | remind | report | targets | log>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Start(Vec<String>),
    Process,
    Remind,
    Report,
    Targets,
    Log,
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            bail!(USAGE);
        };
        let command = match name.as_str() {
            "start" => {
                let emails: Vec<String> = rest
                    .iter()
                    .flat_map(|arg| arg.split(','))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if emails.is_empty() {
                    bail!("start needs at least one email address\n{USAGE}");
                }
                Command::Start(emails)
            }
            "process" => Command::Process,
            "remind" => Command::Remind,
            "report" => Command::Report,
            "targets" => Command::Targets,
            "log" => Command::Log,
            other => bail!("unknown command {other:?}\n{USAGE}"),
        };
        Ok(command)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Keep the guard alive so buffered file output is flushed on exit
    let _trace_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    match command {
        Command::Start(emails) => {
            let mut simulation = open_simulation().await?;
            let summary = simulation.start(emails.as_slice()).await;
            finish(&simulation, summary)
        }
        Command::Process => {
            let mut simulation = open_simulation().await?;
            let summary = simulation.process_responses().await?;
            finish(&simulation, summary)
        }
        Command::Remind => {
            let mut simulation = open_simulation().await?;
            let summary = simulation.send_reminders().await;
            finish(&simulation, summary)
        }
        Command::Report => {
            let config = SimulationConfig::from_env().context("failed to load configuration")?;
            let store = StateStore::open(&config.state_path).await?;
            let report = Report::from_records(store.records().values());
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Targets => {
            let config = SimulationConfig::from_env().context("failed to load configuration")?;
            let store = StateStore::open(&config.state_path).await?;
            println!("{}", serde_json::to_string_pretty(store.records())?);
            Ok(())
        }
        Command::Log => {
            let config = SimulationConfig::from_env().context("failed to load configuration")?;
            println!("{}", EventLog::open(&config.log_path).await?.to_json()?);
            Ok(())
        }
    }
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match std::env::var("PHISHSIM_TRACE_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "phishsim.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}

/// Load the full config, authenticate against the mail provider and open the
/// persisted state.
async fn open_simulation() -> anyhow::Result<Simulation> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    eprintln!("phishsim v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mail: {} (account {})", config.zoho.mail_url, config.zoho.account_id);
    eprintln!("   Model: {}", config.gemini.model);
    eprintln!("   State: {}", config.simulation.state_path.display());
    eprintln!("   Log: {}", config.simulation.log_path.display());
    eprintln!("   Max retries: {}", config.simulation.max_retries);

    let mail = Arc::new(ZohoMail::new(config.zoho.clone())?);
    mail.authenticate()
        .await
        .context("mail provider authentication failed")?;

    let llm = create_gemini_provider(&config.gemini)?;
    let classifier = IntentClassifier::new(llm, config.classifier);
    let simulation = Simulation::open(config.simulation, mail, classifier)
        .await
        .context("failed to open simulation state")?;
    Ok(simulation)
}

fn finish(simulation: &Simulation, summary: BatchSummary) -> anyhow::Result<()> {
    eprintln!(
        "Done: {} succeeded, {} failed, {} skipped, {} expired",
        summary.succeeded, summary.failed, summary.skipped, summary.expired
    );
    println!("{}", serde_json::to_string_pretty(&simulation.report())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn start_accepts_comma_and_space_separated_addresses() {
        let command = Command::parse(&args(&["start", "a@x.com, b@x.com", "c@x.com"])).unwrap();
        assert_eq!(
            command,
            Command::Start(args(&["a@x.com", "b@x.com", "c@x.com"]))
        );
    }

    #[test]
    fn start_without_addresses_is_rejected() {
        assert!(Command::parse(&args(&["start", " , "])).is_err());
    }

    #[test]
    fn read_commands_take_no_arguments() {
        assert_eq!(Command::parse(&args(&["report"])).unwrap(), Command::Report);
        assert_eq!(Command::parse(&args(&["targets"])).unwrap(), Command::Targets);
        assert_eq!(Command::parse(&args(&["log"])).unwrap(), Command::Log);
    }

    #[test]
    fn unknown_or_missing_command_is_rejected() {
        assert!(Command::parse(&args(&["launch"])).is_err());
        assert!(Command::parse(&[]).is_err());
    }
}
