use pagescope::kernel::config::EngineConfig;
use pagescope::kernel::event::RawEvent;
use pagescope::kernel::metrics::contrast::ColorSample;
use pagescope::kernel::observation::Capabilities;
use pagescope::kernel::reactor::{Command, Reactor};
use pagescope::kernel::scorer::{self, Rubric};
use pagescope::kernel::time::Timestamp;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// One line of the newline-delimited JSON feed on stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum FeedLine {
    Start {
        #[serde(default)]
        capabilities: Option<Capabilities>,
    },
    Event {
        event: RawEvent,
    },
    Track {
        element: String,
    },
    Colors {
        sample: ColorSample,
    },
    Harvest {
        now: Timestamp,
    },
    Reset,
}

async fn request_harvest(tx: &mpsc::Sender<Command>, now: Timestamp) -> anyhow::Result<pagescope::MetricSnapshot> {
    let (reply, response) = oneshot::channel();
    tx.send(Command::Harvest { now, reply: Some(reply) }).await?;
    Ok(response.await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the report.
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match std::env::var("PAGESCOPE_CONFIG") {
        Ok(path) => EngineConfig::load(path)?,
        Err(_) => EngineConfig::default(),
    };
    let rubric = match std::env::var("PAGESCOPE_RUBRIC") {
        Ok(path) => Rubric::load(path)?,
        Err(_) => Rubric::web_vitals(),
    };

    let (tx, rx) = mpsc::channel(256);
    let mut reactor = Reactor::new(rx, config);
    let driver = tokio::spawn(async move {
        reactor.run().await;
    });

    tx.send(Command::Start(Capabilities::all())).await?;

    let mut last_seen: Timestamp = 0.0;
    let mut harvested = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let feed: FeedLine = match serde_json::from_str(line) {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!("Skipping unreadable feed line: {}", e);
                continue;
            }
        };

        let command = match feed {
            FeedLine::Start { capabilities } => {
                harvested = None;
                last_seen = 0.0;
                Command::Start(capabilities.unwrap_or_else(Capabilities::all))
            }
            FeedLine::Event { event } => {
                if event.end_time().is_finite() {
                    last_seen = last_seen.max(event.end_time());
                }
                Command::Raw(event)
            }
            FeedLine::Track { element } => Command::Track(element),
            FeedLine::Colors { sample } => Command::Colors(sample),
            FeedLine::Harvest { now } => {
                harvested = Some(request_harvest(&tx, now).await?);
                continue;
            }
            FeedLine::Reset => {
                harvested = None;
                Command::Reset
            }
        };
        tx.send(command).await?;
    }

    let snapshot = match harvested {
        Some(snapshot) => snapshot,
        None => request_harvest(&tx, last_seen).await?,
    };
    drop(tx);
    driver.await?;

    let scorecard = scorer::score(&snapshot, &rubric);
    tracing::info!(
        "Composite {:?}, grade {}",
        scorecard.composite,
        scorecard.grade.map(|g| g.to_string()).unwrap_or_else(|| "n/a".to_string())
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "snapshot": snapshot, "scorecard": scorecard }))?
    );
    Ok(())
}
