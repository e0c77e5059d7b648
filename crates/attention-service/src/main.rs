//! attention-service: the thin consumer-surface binary for attention-core.
//!
//! Wires one `attention_core::Engine` behind CLI subcommands mirroring the
//! `store`/`recall`/`anticipate`/`whats_relevant`/context-op verbs of the
//! core crate's consumer surface. This binary has no durable backend of its
//! own (the in-memory reference store lives only for the process's
//! lifetime), so it is a single-shot operator shim rather than a
//! long-running server — a real deployment wires a persistent
//! `DurableStore` implementation behind the same trait.

use std::sync::Arc;
use std::time::Duration;

use attention_core::config::{AttentionConfig, ConfigHandle};
use attention_core::context::FrameDelta;
use attention_core::daemon::{Event, EventKind};
use attention_core::engine::{Engine, RequestingDevice};
use attention_core::error::Outcome;
use attention_core::external::{HeuristicFeatureExtractor, InMemoryStore, LoggingNotificationSink};
use attention_core::gate::Purpose;
use attention_core::ids::{DeviceId, EntityId, OwnerId};
use attention_core::memory::{DeviceOrigin, DeviceType, PrivacyTier};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// attention-service — consumer-surface CLI for the attention and salience core.
#[derive(Parser)]
#[command(name = "attention-service")]
#[command(author = "Attention Core Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Drive an attention-core Engine from the command line")]
struct Cli {
    /// Owner id to operate as. Generates a fresh one if omitted (each run
    /// starts from an empty in-memory store, so a stable id only matters
    /// within a single invocation that issues multiple subcommands).
    #[arg(long, global = true)]
    owner: Option<OwnerId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum PrivacyTierArg {
    General,
    Personal,
    Vault,
}

impl From<PrivacyTierArg> for PrivacyTier {
    fn from(value: PrivacyTierArg) -> Self {
        match value {
            PrivacyTierArg::General => PrivacyTier::General,
            PrivacyTierArg::Personal => PrivacyTier::Personal,
            PrivacyTierArg::Vault => PrivacyTier::Vault,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DeviceTypeArg {
    Mobile,
    Desktop,
    Wearable,
    Robotic,
    Voice,
}

impl From<DeviceTypeArg> for DeviceType {
    fn from(value: DeviceTypeArg) -> Self {
        match value {
            DeviceTypeArg::Mobile => DeviceType::Mobile,
            DeviceTypeArg::Desktop => DeviceType::Desktop,
            DeviceTypeArg::Wearable => DeviceType::Wearable,
            DeviceTypeArg::Robotic => DeviceType::Robotic,
            DeviceTypeArg::Voice => DeviceType::Voice,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Store one observation and report its id and base salience.
    Store {
        /// Observation content.
        content: String,
        /// Privacy tier for this observation.
        #[arg(long, value_enum, default_value = "general")]
        tier: PrivacyTierArg,
        /// Comma-separated tags.
        #[arg(long)]
        tags: Option<String>,
        /// Originating device type.
        #[arg(long, value_enum, default_value = "mobile")]
        device: DeviceTypeArg,
    },

    /// Recall candidates matching a query, through the context gate.
    Recall {
        query: String,
        /// Maximum age (days) of candidates to consider.
        #[arg(long)]
        since_days: Option<i64>,
    },

    /// Show what's currently in the owner's attention window.
    WhatsRelevant {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Show predicted future accesses for this owner's tracked entities.
    Anticipate,

    /// Set (merge into) the owner's active context frame on one device.
    SetContext {
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        activity: Option<String>,
        #[arg(long, value_enum, default_value = "mobile")]
        device: DeviceTypeArg,
    },

    /// Clear all of the owner's context frames.
    ClearContext,

    /// Feed one synthetic event into the proactive arm and show the action taken.
    Event {
        #[arg(value_enum)]
        kind: EventKindArg,
        /// Free-text payload (call transcript, email body, ...).
        #[arg(long, default_value = "")]
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EventKindArg {
    PhoneRing,
    PhoneCallContent,
    Doorbell,
    EmailReceived,
    CalendarReminder,
    TimeTrigger,
    SensorAlert,
    DeviceInput,
    SilenceDetected,
    LocationChange,
    MarketData,
    CustomWebhook,
}

impl From<EventKindArg> for EventKind {
    fn from(value: EventKindArg) -> Self {
        match value {
            EventKindArg::PhoneRing => EventKind::PhoneRing,
            EventKindArg::PhoneCallContent => EventKind::PhoneCallContent,
            EventKindArg::Doorbell => EventKind::Doorbell,
            EventKindArg::EmailReceived => EventKind::EmailReceived,
            EventKindArg::CalendarReminder => EventKind::CalendarReminder,
            EventKindArg::TimeTrigger => EventKind::TimeTrigger,
            EventKindArg::SensorAlert => EventKind::SensorAlert,
            EventKindArg::DeviceInput => EventKind::DeviceInput,
            EventKindArg::SilenceDetected => EventKind::SilenceDetected,
            EventKindArg::LocationChange => EventKind::LocationChange,
            EventKindArg::MarketData => EventKind::MarketData,
            EventKindArg::CustomWebhook => EventKind::CustomWebhook,
        }
    }
}

fn split_tags(tags: Option<String>) -> Vec<String> {
    tags.as_deref()
        .map(|t| t.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn build_engine() -> Engine {
    Engine::new(
        ConfigHandle::new(AttentionConfig::default()),
        Arc::new(InMemoryStore::new()),
        Arc::new(HeuristicFeatureExtractor),
        None,
        Arc::new(LoggingNotificationSink),
        0.6,
    )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let owner = cli.owner.unwrap_or_default();
    let engine = build_engine();

    let result = match cli.command {
        Commands::Store { content, tier, tags, device } => run_store(&engine, owner, content, tier.into(), split_tags(tags), device.into()).await,
        Commands::Recall { query, since_days } => run_recall(&engine, owner, query, since_days).await,
        Commands::WhatsRelevant { limit } => run_whats_relevant(&engine, owner, limit).await,
        Commands::Anticipate => run_anticipate(&engine, owner),
        Commands::SetContext { location, activity, device } => run_set_context(&engine, owner, location, activity, device.into()),
        Commands::ClearContext => {
            engine.clear_context(owner);
            println!("context cleared for owner {owner}");
            Ok(())
        }
        Commands::Event { kind, text } => run_event(&engine, owner, kind.into(), text).await,
    };

    if let Err(err) = result {
        error!(error = %err, "attention-service: command failed");
        std::process::exit(1);
    }
}

async fn run_store(
    engine: &Engine,
    owner: OwnerId,
    content: String,
    tier: PrivacyTier,
    tags: Vec<String>,
    device: DeviceType,
) -> anyhow::Result<()> {
    let origin = DeviceOrigin { device_id: DeviceId::new(), device_type: device };
    let outcome = engine
        .store(owner, content.into_bytes(), tier, origin, tags, Duration::from_millis(500))
        .await;
    match outcome {
        Outcome::Ok((id, salience)) => {
            println!("stored {id} base_salience={salience:.1}");
            Ok(())
        }
        Outcome::Degraded((id, salience), reasons) => {
            println!("stored {id} base_salience={salience:.1} (degraded: {reasons:?})");
            Ok(())
        }
        other => Err(anyhow::anyhow!("store failed: {other:?}")),
    }
}

async fn run_recall(engine: &Engine, owner: OwnerId, query: String, since_days: Option<i64>) -> anyhow::Result<()> {
    let mut filter = attention_core::external::ListFilter::default();
    if let Some(days) = since_days {
        filter.since = Some(Utc::now() - chrono::Duration::days(days));
    }
    let outcome = engine
        .recall(owner, &query, filter, Purpose::Recall, RequestingDevice::default(), Duration::from_millis(500))
        .await;
    match outcome {
        Outcome::Ok(hits) | Outcome::Degraded(hits, _) => {
            if hits.is_empty() {
                println!("no matches");
            }
            for hit in hits {
                println!(
                    "{} salience={:.1} tags={:?} {}",
                    hit.memory.id,
                    hit.effective_salience,
                    hit.memory.tags,
                    String::from_utf8_lossy(&hit.memory.content)
                );
            }
            Ok(())
        }
        other => Err(anyhow::anyhow!("recall failed: {other:?}")),
    }
}

async fn run_whats_relevant(engine: &Engine, owner: OwnerId, limit: usize) -> anyhow::Result<()> {
    match engine.whats_relevant(owner, limit).await {
        Outcome::Ok(hits) | Outcome::Degraded(hits, _) => {
            for hit in hits {
                println!("{} salience={:.1} {}", hit.memory.id, hit.effective_salience, hit.reason);
            }
            Ok(())
        }
        other => Err(anyhow::anyhow!("whats_relevant failed: {other:?}")),
    }
}

fn run_anticipate(engine: &Engine, owner: OwnerId) -> anyhow::Result<()> {
    match engine.anticipate(owner, Utc::now()) {
        Outcome::Ok(predictions) | Outcome::Degraded(predictions, _) => {
            if predictions.is_empty() {
                println!("no patterns detected yet");
            }
            for p in predictions {
                println!(
                    "entity={} state={:?} confidence={:.2} predicted_at={}",
                    p.entity, p.state, p.confidence, p.predicted_at
                );
            }
            Ok(())
        }
        other => Err(anyhow::anyhow!("anticipate failed: {other:?}")),
    }
}

fn run_set_context(
    engine: &Engine,
    owner: OwnerId,
    location: Option<String>,
    activity: Option<String>,
    device_type: DeviceType,
) -> anyhow::Result<()> {
    engine.set_context(
        owner,
        DeviceId::new(),
        device_type,
        FrameDelta {
            location,
            activity,
            ..Default::default()
        },
    );
    println!("context updated for owner {owner}");
    Ok(())
}

async fn run_event(engine: &Engine, owner: OwnerId, kind: EventKind, text: String) -> anyhow::Result<()> {
    let event = Event {
        owner,
        kind,
        timestamp: Utc::now(),
        text,
        subject_entity: Some(EntityId::new()),
    };
    match engine.handle_event(event).await {
        Some(action) => {
            info!(?action, "event processed");
            println!("action={:?} reason={}", action.kind, action.reason);
            Ok(())
        }
        None => {
            println!("event dropped (out of order)");
            Ok(())
        }
    }
}
