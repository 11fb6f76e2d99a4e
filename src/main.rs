//! Демонстрационный узел scopecast.
//!
//! Поднимает брокер в процессе, клиента с подписками из настроек, публикует
//! обновление из JSON-файла (топики без пространства имён) и печатает итог
//! публикации и содержимое хранилища клиента.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use scopecast::{
    logging::init_logging, Broker, DataStore, DataUpdate, DispatchStatus, PublishResult,
    RetryingTransport, Settings, SubscriptionSet, Transport, UpdateListener, UpdatePublisher,
};
use serde_json::json;
use tracing::{info, warn};

/// Аргументы командной строки. Переопределяют загруженные настройки.
#[derive(Parser, Debug)]
#[command(name = "scopecast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Publish a data update through scoped hierarchical topics", long_about = None)]
struct Cli {
    /// Файл настроек (TOML/YAML/JSON)
    #[arg(short, long, env = "SCOPECAST_CONFIG")]
    config: Option<PathBuf>,
    /// Область публикатора и клиента
    #[arg(short, long)]
    scope: Option<String>,
    /// Топик подписки клиента (можно повторять)
    #[arg(short, long = "topic")]
    topics: Vec<String>,
    /// JSON-файл с обновлением
    #[arg(short, long)]
    update: PathBuf,
    /// Не ждать подтверждения доставки по каналам
    #[arg(long)]
    no_wait: bool,
    /// Сколько ждать применения на стороне клиента, мс
    #[arg(long, default_value = "1000")]
    settle_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load_from(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(scope) = cli.scope {
        settings.scope = scope;
    }
    if !cli.topics.is_empty() {
        settings.topics = cli.topics;
    }
    if cli.no_wait {
        settings.wait_for_completion = false;
    }
    settings.validate().context("invalid settings")?;

    let logging = init_logging(settings.logging.clone())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    let raw = std::fs::read(&cli.update)
        .with_context(|| format!("failed to read {}", cli.update.display()))?;
    let update = DataUpdate::decode(&raw).context("update file is not a valid data update")?;

    let broker = Arc::new(Broker::new(settings.broker_capacity));
    let transport: Arc<dyn Transport> = Arc::new(RetryingTransport::new(
        Arc::clone(&broker),
        settings.retry_policy(),
    ));

    let namespacer = settings.namespacer()?;
    let store = Arc::new(DataStore::new());
    let listener = UpdateListener::new(Arc::clone(&transport), namespacer.clone(), store.clone())
        .start(&settings.topics)?;

    let publisher = UpdatePublisher::new(settings.topic_transform()?, transport);
    let result = publisher
        .publish(update, settings.wait_for_completion)
        .await
        .context("publish failed")?;

    let expected = expected_deliveries(&result, &listener.subscriptions());
    let mut processed = listener.processed();
    let settle = Duration::from_millis(cli.settle_ms);
    if tokio::time::timeout(settle, processed.wait_for(|n| *n >= expected))
        .await
        .is_err()
    {
        warn!(settle_ms = cli.settle_ms, "Client did not process every delivery in time");
    }

    let report = json!({
        "scope": namespacer.mode().to_string(),
        "subscriptions": listener.subscriptions().iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        "publish": result,
        "client": listener.stats(),
        "store": store.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    listener.shutdown().await;
    broker.close();
    info!(file_sink = logging.has_file_sink(), "scopecast demo finished");
    logging.shutdown();
    Ok(())
}

/// Сколько сообщений должен обработать клиент после публикации.
///
/// При ожидании доставки это сумма получателей. Без ожидания каналы ещё в
/// состоянии `Scheduled`, поэтому считаются те из них, на которые подписан
/// клиент (он единственный получатель в этом процессе).
fn expected_deliveries(
    result: &PublishResult,
    subscriptions: &SubscriptionSet,
) -> u64 {
    result
        .outcomes
        .iter()
        .map(|o| match o.status {
            DispatchStatus::Delivered { receivers } => receivers as u64,
            DispatchStatus::Scheduled => u64::from(subscriptions.contains(o.channel.as_str())),
            DispatchStatus::Failed { .. } => 0,
        })
        .sum()
}
