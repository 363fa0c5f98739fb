//! Background worker that runs recycle and blacklist filter passes.

use crate::error::PoolError;
use crate::pool::PoolState;

use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

// One slot per coalesced command kind plus shutdown, with headroom.
const COMMAND_CAPACITY: usize = 4;

/// Work items consumed by the recycle worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Tick,
    ForceRecycle,
    BlacklistChanged,
    Shutdown,
}

#[derive(Debug, Default)]
struct Pending {
    recycle: AtomicBool,
    blacklist: AtomicBool,
}

impl Pending {
    fn flag(&self, command: Command) -> Option<&AtomicBool> {
        match command {
            Command::ForceRecycle => Some(&self.recycle),
            Command::BlacklistChanged => Some(&self.blacklist),
            Command::Tick | Command::Shutdown => None,
        }
    }
}

/// Handle to a running recycle worker.
pub(crate) struct Recycler {
    commands: mpsc::Sender<Command>,
    pending: Arc<Pending>,
    _task: JoinHandle<()>,
}

impl Recycler {
    /// Spawn the worker on the current Tokio runtime.
    pub(crate) fn spawn(state: Arc<PoolState>, period: Duration) -> Result<Self, PoolError> {
        let runtime = tokio::runtime::Handle::try_current()?;
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let pending = Arc::new(Pending::default());

        let task = runtime.spawn(run(state, receiver, Arc::clone(&pending), period));

        Ok(Self {
            commands,
            pending,
            _task: task,
        })
    }

    /// Queue a command without blocking.
    ///
    /// A command of a kind that is already queued is dropped. Returns whether
    /// the command was queued.
    pub(crate) fn notify(&self, command: Command) -> bool {
        let flag = self.pending.flag(command);
        if let Some(flag) = flag {
            if flag.swap(true, Ordering::AcqRel) {
                debug!("{:?} already pending, coalesced", command);
                return false;
            }
        }

        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                if let Some(flag) = flag {
                    flag.store(false, Ordering::Release);
                }
                warn!("Failed to queue {:?} for recycler: {}", command, e);
                false
            }
        }
    }

    pub(crate) fn shutdown(self) {
        self.notify(Command::Shutdown);
    }
}

async fn run(
    state: Arc<PoolState>,
    mut commands: mpsc::Receiver<Command>,
    pending: Arc<Pending>,
    period: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Proxy recycler started (interval: {:?})", period);

    loop {
        let command = tokio::select! {
            _ = ticker.tick() => Command::Tick,
            // A closed channel means the pool was dropped.
            received = commands.recv() => received.unwrap_or(Command::Shutdown),
        };

        if let Some(flag) = pending.flag(command) {
            flag.store(false, Ordering::Release);
        }

        match command {
            // A requested recycle still runs unforced.
            Command::Tick | Command::ForceRecycle => {
                if let Err(e) = state.recycle(false) {
                    debug!("Recycle pass after {:?} failed: {}", command, e);
                }
            }
            Command::BlacklistChanged => {
                let removed = state.filter_blacklisted();
                if removed > 0 {
                    info!("Removed {} blacklisted proxies from rotation", removed);
                }
            }
            Command::Shutdown => break,
        }
    }

    info!("Proxy recycler stopped");
}
