//! Цикл приёма обновлений клиента.
//!
//! Каждая подписка транспорта пересылается во общий входящий канал; цикл
//! ждёт следующее сообщение (без опроса), декодирует его и передаёт в
//! [`UpdateDispatcher`]. Перенастройка перестраивает набор подписок и
//! подменяет его целиком.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use super::{ApplyEngine, DispatchStats, SubscriptionHandle, SubscriptionSet, UpdateDispatcher};
use crate::{
    error::{DecodeError, RecvError, TopicError},
    pubsub::{Message, Subscription, Transport},
    topic::Namespacer,
    update::DataUpdate,
};

const INBOX_CAPACITY: usize = 256;

enum Command {
    Resubscribe(Vec<Subscription>),
    Shutdown,
}

/// Построитель клиента: транспорт, пространство имён и механизм применения.
pub struct UpdateListener {
    transport: Arc<dyn Transport>,
    namespacer: Namespacer,
    engine: Arc<dyn ApplyEngine>,
}

/// Управление запущенным клиентом.
pub struct ListenerHandle {
    commands: mpsc::UnboundedSender<Command>,
    transport: Arc<dyn Transport>,
    namespacer: Namespacer,
    dispatcher: UpdateDispatcher,
    processed: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

struct RunLoop {
    dispatcher: UpdateDispatcher,
    inbox_tx: mpsc::Sender<Message>,
    forwarders: Vec<JoinHandle<()>>,
    processed: watch::Sender<u64>,
}

////////////////////////////////////////////////////////////////////////////////
// UpdateListener
////////////////////////////////////////////////////////////////////////////////

impl UpdateListener {
    pub fn new(
        transport: Arc<dyn Transport>,
        namespacer: Namespacer,
        engine: Arc<dyn ApplyEngine>,
    ) -> Self {
        Self {
            transport,
            namespacer,
            engine,
        }
    }

    /// Строит набор подписок, подписывается на его каналы и запускает цикл
    /// приёма. Подписки активны к моменту возврата.
    pub fn start<I, S>(
        self,
        topics: I,
    ) -> Result<ListenerHandle, TopicError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = SubscriptionSet::build(&self.namespacer, topics)?;
        let subscriptions = subscribe_all(self.transport.as_ref(), &set);
        info!(
            scope = %self.namespacer.mode(),
            topics = ?set.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            "Listener subscribed"
        );

        let handle = Arc::new(SubscriptionHandle::new(set));
        let dispatcher = UpdateDispatcher::new(handle, self.engine);

        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (processed_tx, processed_rx) = watch::channel(0);

        let mut run = RunLoop {
            dispatcher: dispatcher.clone(),
            inbox_tx,
            forwarders: Vec::new(),
            processed: processed_tx,
        };
        run.forward(subscriptions);
        let task = tokio::spawn(run.run(inbox_rx, commands_rx));

        Ok(ListenerHandle {
            commands: commands_tx,
            transport: self.transport,
            namespacer: self.namespacer,
            dispatcher,
            processed: processed_rx,
            task,
        })
    }
}

fn subscribe_all(
    transport: &dyn Transport,
    set: &SubscriptionSet,
) -> Vec<Subscription> {
    set.iter()
        .map(|topic| transport.subscribe(topic.as_str()))
        .collect()
}

////////////////////////////////////////////////////////////////////////////////
// ListenerHandle
////////////////////////////////////////////////////////////////////////////////

impl ListenerHandle {
    /// Текущий набор подписок.
    pub fn subscriptions(&self) -> Arc<SubscriptionSet> {
        self.dispatcher.subscriptions().load()
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.metrics().snapshot()
    }

    /// Счётчик обработанных сообщений (включая нераскодированные).
    pub fn processed(&self) -> watch::Receiver<u64> {
        self.processed.clone()
    }

    /// Перестраивает набор подписок тем же пространством имён.
    ///
    /// Новые каналы подписываются до подмены набора, поэтому сообщения по
    /// ним не теряются. При ошибке в имени топика ничего не меняется.
    pub fn reconfigure<I, S>(
        &self,
        topics: I,
    ) -> Result<(), TopicError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = SubscriptionSet::build(&self.namespacer, topics)?;
        let subscriptions = subscribe_all(self.transport.as_ref(), &set);
        let count = set.len();
        self.dispatcher.subscriptions().replace(set);

        if self
            .commands
            .send(Command::Resubscribe(subscriptions))
            .is_err()
        {
            warn!("Listener already stopped, reconfiguration only updated the filter");
        }
        info!(topics = count, "Listener reconfigured");
        Ok(())
    }

    /// Останавливает цикл приёма. Обработка, начатая до вызова, может
    /// быть прервана.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(err) = self.task.await {
            warn!(error = %err, "Listener task ended abnormally");
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// RunLoop
////////////////////////////////////////////////////////////////////////////////

impl RunLoop {
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Message>,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Resubscribe(subscriptions)) => self.forward(subscriptions),
                    Some(Command::Shutdown) | None => break,
                },
                Some(message) = inbox.recv() => self.handle(message).await,
            }
        }

        self.stop_forwarders();
        debug!("Listener stopped");
    }

    /// Заменяет пересылку подписок новым набором.
    fn forward(
        &mut self,
        subscriptions: Vec<Subscription>,
    ) {
        self.stop_forwarders();
        self.forwarders = subscriptions
            .into_iter()
            .map(|sub| tokio::spawn(forward_subscription(sub, self.inbox_tx.clone())))
            .collect();
    }

    fn stop_forwarders(&mut self) {
        for task in self.forwarders.drain(..) {
            task.abort();
        }
    }

    async fn handle(
        &self,
        message: Message,
    ) {
        match decode(&message) {
            Ok(update) => {
                let report = self.dispatcher.dispatch(update).await;
                debug!(
                    channel = %message.channel,
                    applied = report.applied(),
                    skipped_mismatch = report.skipped_mismatch(),
                    skipped_empty = report.skipped_empty(),
                    failed = report.failed(),
                    "Update dispatched"
                );
            }
            Err(err) => {
                warn!(error = %err, "Dropping undecodable update");
                self.dispatcher.metrics().record_decode_failure();
            }
        }
        self.processed.send_modify(|n| *n += 1);
    }
}

fn decode(message: &Message) -> Result<DataUpdate, DecodeError> {
    DataUpdate::decode(&message.payload).map_err(|e| DecodeError {
        channel: message.channel.to_string(),
        reason: e.to_string(),
    })
}

async fn forward_subscription(
    mut sub: Subscription,
    inbox: mpsc::Sender<Message>,
) {
    loop {
        match sub.recv().await {
            Ok(message) => {
                if inbox.send(message).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(channel = %sub.channel, skipped, "Subscriber lagged, updates lost");
            }
            Err(RecvError::Closed) => {
                debug!(channel = %sub.channel, "Subscription closed");
                break;
            }
        }
    }
}
