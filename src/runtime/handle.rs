use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::{debug, info};

use crate::{
    core::{LotteryCore, dispatch::DispatchReport, registry::ApplyOutcome},
    error::{LotteryError, LotteryResult},
    event::EntrantSet,
    types::{EntrantStatus, EventId, InvitationResponse, UserId},
};

use super::events::LotteryEvent;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Lottery(#[from] LotteryError),
    #[error("lottery runtime channel closed")]
    ChannelClosed,
    #[error("blocking task failed: {0}")]
    Join(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Bound of each event worker's command queue.
    pub command_queue_bound: usize,
    /// Capacity of the broadcast event channel.
    pub events_capacity: usize,
    /// An event worker with no command for this long exits.
    pub worker_idle_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 64,
            events_capacity: 1024,
            worker_idle_ms: 30_000,
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    Apply {
        user_id: UserId,
        resp: Reply<ApplyOutcome>,
    },
    Withdraw {
        user_id: UserId,
        resp: Reply<bool>,
    },
    SelectWinners {
        count: i64,
        resp: Reply<Vec<UserId>>,
    },
    Dispatch {
        resp: Reply<DispatchReport>,
    },
    Respond {
        user_id: UserId,
        response: InvitationResponse,
        resp: Reply<EntrantStatus>,
    },
    CancelEntrant {
        user_id: UserId,
        resp: Reply<()>,
    },
    DispatchLosers {
        resp: Reply<DispatchReport>,
    },
    NotifyGroup {
        set: EntrantSet,
        title: Option<String>,
        message: String,
        resp: Reply<DispatchReport>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

struct WorkerSlot {
    tx: mpsc::Sender<Command>,
    generation: u64,
}

type WorkerTable = Arc<Mutex<HashMap<EventId, WorkerSlot>>>;

/// Cloneable front door to the per-event workers.
///
/// Every mutation for one event id runs on that event's worker, one at a
/// time; different events run on different workers. Workers start on the
/// first command for an existing event and exit after `worker_idle_ms`
/// without one.
pub struct LotteryHandle {
    core: Arc<LotteryCore>,
    workers: WorkerTable,
    next_generation: Arc<AtomicU64>,
    events_tx: broadcast::Sender<LotteryEvent>,
    closed: Arc<AtomicBool>,
    config: RuntimeConfig,
}

impl Clone for LotteryHandle {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            workers: Arc::clone(&self.workers),
            next_generation: Arc::clone(&self.next_generation),
            events_tx: self.events_tx.clone(),
            closed: Arc::clone(&self.closed),
            config: self.config.clone(),
        }
    }
}

pub fn spawn_lottery(core: LotteryCore, config: RuntimeConfig) -> LotteryHandle {
    let (events_tx, _) = broadcast::channel::<LotteryEvent>(config.events_capacity.max(1));
    LotteryHandle {
        core: Arc::new(core),
        workers: Arc::new(Mutex::new(HashMap::new())),
        next_generation: Arc::new(AtomicU64::new(0)),
        events_tx,
        closed: Arc::new(AtomicBool::new(false)),
        config,
    }
}

impl LotteryHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<LotteryEvent> {
        self.events_tx.subscribe()
    }

    pub fn core(&self) -> &LotteryCore {
        &self.core
    }

    /// Number of event workers currently running.
    pub fn active_workers(&self) -> usize {
        lock_workers(&self.workers).len()
    }

    pub async fn apply(&self, event_id: &str, user_id: impl Into<UserId>) -> Result<ApplyOutcome, RuntimeError> {
        let user_id = user_id.into();
        self.request(event_id, |resp| Command::Apply { user_id, resp }).await
    }

    pub async fn withdraw(&self, event_id: &str, user_id: impl Into<UserId>) -> Result<bool, RuntimeError> {
        let user_id = user_id.into();
        self.request(event_id, |resp| Command::Withdraw { user_id, resp }).await
    }

    pub async fn select_winners(&self, event_id: &str, count: i64) -> Result<Vec<UserId>, RuntimeError> {
        self.request(event_id, |resp| Command::SelectWinners { count, resp }).await
    }

    pub async fn dispatch_winner_notifications(&self, event_id: &str) -> Result<DispatchReport, RuntimeError> {
        self.request(event_id, |resp| Command::Dispatch { resp }).await
    }

    pub async fn respond(
        &self,
        event_id: &str,
        user_id: impl Into<UserId>,
        response: InvitationResponse,
    ) -> Result<EntrantStatus, RuntimeError> {
        let user_id = user_id.into();
        self.request(event_id, |resp| Command::Respond {
            user_id,
            response,
            resp,
        })
        .await
    }

    /// Organizer cancellation of a chosen entrant.
    pub async fn cancel_entrant(&self, event_id: &str, user_id: impl Into<UserId>) -> Result<(), RuntimeError> {
        let user_id = user_id.into();
        self.request(event_id, |resp| Command::CancelEntrant { user_id, resp }).await
    }

    pub async fn dispatch_loser_notifications(&self, event_id: &str) -> Result<DispatchReport, RuntimeError> {
        self.request(event_id, |resp| Command::DispatchLosers { resp }).await
    }

    pub async fn notify_group(
        &self,
        event_id: &str,
        set: EntrantSet,
        title: Option<String>,
        message: impl Into<String>,
    ) -> Result<DispatchReport, RuntimeError> {
        let message = message.into();
        self.request(event_id, |resp| Command::NotifyGroup {
            set,
            title,
            message,
            resp,
        })
        .await
    }

    /// Reads bypass the workers.
    pub async fn status_of(&self, event_id: &str, user_id: &str) -> Result<EntrantStatus, RuntimeError> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        run_blocking(&self.core, move |core| Ok(core.registry.status_of(&event_id, &user_id))).await
    }

    /// Stops every worker after its queued commands drain.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.closed.store(true, Ordering::SeqCst);
        let senders: Vec<mpsc::Sender<Command>> = lock_workers(&self.workers)
            .drain()
            .map(|(_, slot)| slot.tx)
            .collect();

        for tx in senders {
            let (done_tx, done_rx) = oneshot::channel();
            if tx.send(Command::Shutdown { resp: done_tx }).await.is_ok() {
                let _ = done_rx.await;
            }
        }
        info!("lottery runtime stopped");
        Ok(())
    }

    async fn request<T>(
        &self,
        event_id: &str,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        let mut cmd = make(tx);
        // A worker may retire between lookup and send; the command then comes
        // back and goes to its successor.
        loop {
            let worker = self.worker_for(event_id).await?;
            match worker.send(cmd).await {
                Ok(()) => break,
                Err(mpsc::error::SendError(returned)) => cmd = returned,
            }
        }
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    async fn worker_for(&self, event_id: &str) -> Result<mpsc::Sender<Command>, RuntimeError> {
        if let Some(tx) = self.live_worker(event_id)? {
            return Ok(tx);
        }

        let eid = event_id.to_string();
        run_blocking(&self.core, move |core| core.registry.event(&eid).map(|_| ())).await?;

        let mut workers = lock_workers(&self.workers);
        if self.closed.load(Ordering::SeqCst) {
            return Err(RuntimeError::ChannelClosed);
        }
        if let Some(slot) = workers.get(event_id) {
            if !slot.tx.is_closed() {
                return Ok(slot.tx.clone());
            }
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel::<Command>(self.config.command_queue_bound.max(1));
        tokio::spawn(run_worker(
            WorkerContext {
                event_id: event_id.to_string(),
                generation,
                core: Arc::clone(&self.core),
                events_tx: self.events_tx.clone(),
                workers: Arc::clone(&self.workers),
                idle: Duration::from_millis(self.config.worker_idle_ms.max(1)),
            },
            rx,
        ));
        workers.insert(
            event_id.to_string(),
            WorkerSlot {
                tx: tx.clone(),
                generation,
            },
        );
        debug!(event_id, generation, "event worker started");
        Ok(tx)
    }

    fn live_worker(&self, event_id: &str) -> Result<Option<mpsc::Sender<Command>>, RuntimeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RuntimeError::ChannelClosed);
        }
        Ok(lock_workers(&self.workers)
            .get(event_id)
            .filter(|slot| !slot.tx.is_closed())
            .map(|slot| slot.tx.clone()))
    }
}

fn lock_workers(workers: &WorkerTable) -> MutexGuard<'_, HashMap<EventId, WorkerSlot>> {
    workers.lock().unwrap_or_else(PoisonError::into_inner)
}

struct WorkerContext {
    event_id: EventId,
    generation: u64,
    core: Arc<LotteryCore>,
    events_tx: broadcast::Sender<LotteryEvent>,
    workers: WorkerTable,
    idle: Duration,
}

impl WorkerContext {
    /// Drops this worker's table entry unless a successor replaced it.
    fn retire(&self) {
        let mut workers = lock_workers(&self.workers);
        if workers
            .get(&self.event_id)
            .is_some_and(|slot| slot.generation == self.generation)
        {
            workers.remove(&self.event_id);
        }
    }
}

async fn run_worker(ctx: WorkerContext, mut rx: mpsc::Receiver<Command>) {
    loop {
        match time::timeout(ctx.idle, rx.recv()).await {
            Ok(Some(cmd)) => {
                if handle_command(&ctx.event_id, cmd, &ctx.core, &ctx.events_tx).await {
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => {
                rx.close();
                ctx.retire();
                while let Ok(cmd) = rx.try_recv() {
                    handle_command(&ctx.event_id, cmd, &ctx.core, &ctx.events_tx).await;
                }
                debug!(event_id = %ctx.event_id, "event worker idle, retired");
                return;
            }
        }
    }
    ctx.retire();
    debug!(event_id = %ctx.event_id, "event worker stopped");
}

async fn handle_command(
    event_id: &str,
    cmd: Command,
    core: &Arc<LotteryCore>,
    events_tx: &broadcast::Sender<LotteryEvent>,
) -> bool {
    match cmd {
        Command::Apply { user_id, resp } => {
            let (eid, uid) = (event_id.to_string(), user_id.clone());
            let res = run_blocking(core, move |core| core.registry.apply(&eid, &uid)).await;
            if matches!(res, Ok(ApplyOutcome::Applied)) {
                let _ = events_tx.send(LotteryEvent::Applied {
                    event_id: event_id.to_string(),
                    user_id,
                });
            }
            let _ = resp.send(res);
        }
        Command::Withdraw { user_id, resp } => {
            let (eid, uid) = (event_id.to_string(), user_id.clone());
            let res = run_blocking(core, move |core| core.registry.withdraw(&eid, &uid)).await;
            if matches!(res, Ok(true)) {
                let _ = events_tx.send(LotteryEvent::Withdrawn {
                    event_id: event_id.to_string(),
                    user_id,
                });
            }
            let _ = resp.send(res);
        }
        Command::SelectWinners { count, resp } => {
            let eid = event_id.to_string();
            let res = run_blocking(core, move |core| core.selector.select_winners(&eid, count)).await;
            if let Ok(winners) = &res {
                if !winners.is_empty() {
                    let _ = events_tx.send(LotteryEvent::WinnersSelected {
                        event_id: event_id.to_string(),
                        winners: winners.clone(),
                    });
                }
            }
            let _ = resp.send(res);
        }
        Command::Dispatch { resp } => {
            let eid = event_id.to_string();
            let res = run_blocking(core, move |core| {
                core.dispatcher.dispatch_winner_notifications(&eid)
            })
            .await;
            if let Ok(report) = &res {
                if report.count() > 0 {
                    let _ = events_tx.send(LotteryEvent::WinnersNotified {
                        event_id: event_id.to_string(),
                        notified: report.notified.clone(),
                    });
                }
            }
            let _ = resp.send(res);
        }
        Command::Respond {
            user_id,
            response,
            resp,
        } => {
            let (eid, uid) = (event_id.to_string(), user_id.clone());
            let res = run_blocking(core, move |core| core.registry.respond(&eid, &uid, response)).await;
            if res.is_ok() {
                let _ = events_tx.send(LotteryEvent::InvitationAnswered {
                    event_id: event_id.to_string(),
                    user_id,
                    response,
                });
            }
            let _ = resp.send(res);
        }
        Command::CancelEntrant { user_id, resp } => {
            let (eid, uid) = (event_id.to_string(), user_id.clone());
            let res = run_blocking(core, move |core| core.registry.cancel_entrant(&eid, &uid)).await;
            if res.is_ok() {
                let _ = events_tx.send(LotteryEvent::EntrantCancelled {
                    event_id: event_id.to_string(),
                    user_id,
                });
            }
            let _ = resp.send(res);
        }
        Command::DispatchLosers { resp } => {
            let eid = event_id.to_string();
            let res = run_blocking(core, move |core| {
                core.dispatcher.dispatch_loser_notifications(&eid)
            })
            .await;
            if let Ok(report) = &res {
                if report.count() > 0 {
                    let _ = events_tx.send(LotteryEvent::LosersNotified {
                        event_id: event_id.to_string(),
                        notified: report.notified.clone(),
                    });
                }
            }
            let _ = resp.send(res);
        }
        Command::NotifyGroup {
            set,
            title,
            message,
            resp,
        } => {
            let eid = event_id.to_string();
            let res = run_blocking(core, move |core| {
                core.dispatcher
                    .notify_group(&eid, set, title.as_deref(), &message)
            })
            .await;
            if let Ok(report) = &res {
                if report.count() > 0 {
                    let _ = events_tx.send(LotteryEvent::GroupNotified {
                        event_id: event_id.to_string(),
                        set,
                        notified: report.notified.clone(),
                    });
                }
            }
            let _ = resp.send(res);
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

async fn run_blocking<T, F>(core: &Arc<LotteryCore>, f: F) -> Result<T, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce(&LotteryCore) -> LotteryResult<T> + Send + 'static,
{
    let core = Arc::clone(core);
    tokio::task::spawn_blocking(move || f(&core))
        .await
        .map_err(|err| RuntimeError::Join(err.to_string()))?
        .map_err(RuntimeError::from)
}
