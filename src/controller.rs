//! Tentalux Controller
//!
//! The long-lived core of the bridge. [`TentaluxController`]:
//! - polls the rig for its state on a fixed interval,
//! - turns commands (batch brightness, pose activation) into HTTP requests,
//! - keeps the latest [`Snapshot`] of every arm,
//! - notifies subscribers when the state they track changed.
//!
//! # Concurrency
//!
//! Commands may be issued from any task while the poll loop runs. Every state
//! update goes through a single async update lock, which makes the
//! "replace snapshot, then notify subscribers" step one serialized unit.
//! Readers clone an `Arc<Snapshot>` out of a `parking_lot::RwLock` and never
//! block on network I/O.
//!
//! Each request is stamped with a sequence number when it is issued. A status
//! answer older than the last one applied is discarded, so a slow poll cannot
//! roll the snapshot back past a newer command echo. Command echoes are always
//! applied: the caller of a command sees its result.
//!
//! Every subscriber is probed under its own panic guard; one faulty subscriber
//! is logged and skipped without starving the others.
//!
//! # Lifecycle
//!
//! ```text
//! STOPPED --connect()--> RUNNING --close()--> STOPPED
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let transport = Arc::new(HttpTransport::new(config.base_url(), config.request_timeout())?);
//! let controller = TentaluxController::new(transport, config.poll_interval());
//!
//! controller.connect().await?;               // fails fast if the rig is down
//! controller.control_some(&[ArmCommand::new(3, 128)]).await?;
//! assert_eq!(controller.snapshot().brightness(3), Some(128));
//! controller.close().await;
//! ```

use crate::config::TentaluxConfig;
use crate::error::{AppResult, TentaluxError};
use crate::rig::protocol::{
    self, ArmCommand, Pose, CAMERA_PATH, CONTROL_FIELD, CONTROL_SOME_PATH, POSE_FIELD,
    QUERY_POSES_PATH, SET_POSE_PATH, STATUS_PATH,
};
use crate::rig::transport::{RigTransport, DEFAULT_REQUEST_TIMEOUT};
use crate::snapshot::Snapshot;
use crate::subscriber::{Subscriber, SubscriberSet};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

// =============================================================================
// TentaluxController
// =============================================================================

/// Handle to the rig controller. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct TentaluxController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    transport: Arc<dyn RigTransport>,
    poll_interval: Duration,
    /// Time `close()` grants an in-flight poll on top of one interval.
    request_timeout: Duration,
    snapshot: RwLock<Arc<Snapshot>>,
    subscribers: Mutex<SubscriberSet>,
    /// Sequence number of the last applied answer. Held while notifying.
    update_lock: tokio::sync::Mutex<u64>,
    next_seq: AtomicU64,
    poll: Mutex<Option<PollTask>>,
}

/// Where a state echo came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    /// `/status`, explicit or polled. Dropped when stale.
    Status,
    /// `/controlsome` or `/s_pose`. Always applied.
    Command,
}

struct PollTask {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TentaluxController {
    /// Create a stopped controller talking through `transport`.
    pub fn new(transport: Arc<dyn RigTransport>, poll_interval: Duration) -> Self {
        Self::with_timeouts(transport, poll_interval, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a stopped controller using the polling and rig settings of `config`.
    pub fn from_config(transport: Arc<dyn RigTransport>, config: &TentaluxConfig) -> Self {
        Self::with_timeouts(transport, config.poll_interval(), config.request_timeout())
    }

    fn with_timeouts(
        transport: Arc<dyn RigTransport>,
        poll_interval: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                transport,
                poll_interval,
                request_timeout,
                snapshot: RwLock::new(Arc::new(Snapshot::default())),
                subscribers: Mutex::new(SubscriberSet::new()),
                update_lock: tokio::sync::Mutex::new(0),
                next_seq: AtomicU64::new(1),
                poll: Mutex::new(None),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Fetch status once, then start the background poll loop.
    ///
    /// Returns once the loop is spawned. Calling it on a running controller
    /// only refreshes the status.
    ///
    /// # Errors
    /// Whatever the initial status fetch returns; the loop is not started then.
    pub async fn connect(&self) -> AppResult<()> {
        let snapshot = self.status().await?;
        info!(
            rig = %self.inner.transport.base_url(),
            arms = snapshot.arms(),
            "Connected to Tentalux"
        );

        let mut poll = self.inner.poll.lock();
        if poll.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            debug!("Poll loop already running");
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.poll_interval;
        let span = tracing::info_span!("poll_loop", rig = %self.inner.transport.base_url());
        let handle = tokio::spawn(poll_loop(weak, interval, shutdown_rx).instrument(span));
        *poll = Some(PollTask {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Stop the poll loop and wait for it to finish.
    ///
    /// A poll already in flight is allowed to complete (bounded by one poll
    /// interval plus the request timeout, after which it is aborted). Once this
    /// returns the loop issues no further requests. Closing a stopped
    /// controller is a no-op.
    pub async fn close(&self) {
        let task = self.inner.poll.lock().take();
        let Some(PollTask {
            shutdown_tx,
            mut handle,
        }) = task
        else {
            return;
        };

        let _ = shutdown_tx.send(());
        let bound = self.inner.poll_interval + self.inner.request_timeout;
        match tokio::time::timeout(bound, &mut handle).await {
            Ok(_) => info!("Tentalux poll loop stopped"),
            Err(_) => {
                warn!(?bound, "Poll loop did not stop in time, aborting it");
                handle.abort();
                let _ = handle.await;
            }
        }
    }

    /// Whether the poll loop is running.
    pub fn is_running(&self) -> bool {
        self.inner
            .poll
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Fetch rig status, update the snapshot and notify subscribers.
    pub async fn status(&self) -> AppResult<Arc<Snapshot>> {
        let seq = self.inner.issue();
        let body = self.inner.transport.post(STATUS_PATH, &[]).await?;
        self.inner.apply(seq, Echo::Status, &body).await
    }

    /// Set the brightness of one or more arms in a single request.
    ///
    /// The rig echoes its full state, so the snapshot is updated from the
    /// answer before this returns.
    ///
    /// # Errors
    /// - `InvalidCommand` for an empty batch or an arm index outside the
    ///   current snapshot (once the arm count is known)
    /// - `Network` / `Protocol` from the request
    pub async fn control_some(&self, commands: &[ArmCommand]) -> AppResult<Arc<Snapshot>> {
        self.validate(commands)?;
        let data = protocol::encode_commands(commands)?;
        debug!(commands = %data, "controlsome");

        let seq = self.inner.issue();
        let body = self
            .inner
            .transport
            .post(CONTROL_SOME_PATH, &[(CONTROL_FIELD, data.as_str())])
            .await?;
        self.inner.apply(seq, Echo::Command, &body).await
    }

    /// List the poses the rig knows. Does not touch the snapshot.
    pub async fn get_poses(&self) -> AppResult<Vec<Pose>> {
        let body = self.inner.transport.get(QUERY_POSES_PATH).await?;
        protocol::parse_poses(&body)
    }

    /// Activate `pose` and update the snapshot from the rig's echo.
    pub async fn set_pose(&self, pose: &Pose) -> AppResult<Arc<Snapshot>> {
        debug!(%pose, "s_pose");
        let seq = self.inner.issue();
        let body = self
            .inner
            .transport
            .post(SET_POSE_PATH, &[(POSE_FIELD, pose.as_str())])
            .await?;
        self.inner.apply(seq, Echo::Command, &body).await
    }

    /// URL of the rig's still camera image. No network access.
    pub fn camera_url(&self) -> String {
        self.inner.transport.url(CAMERA_PATH)
    }

    fn validate(&self, commands: &[ArmCommand]) -> AppResult<()> {
        if commands.is_empty() {
            return Err(TentaluxError::InvalidCommand(
                "controlsome needs at least one arm command".into(),
            ));
        }

        let arms = self.arms();
        if arms == 0 {
            // Arm count unknown until the first status; let the rig judge.
            return Ok(());
        }
        if let Some(bad) = commands.iter().find(|c| c.number >= arms) {
            return Err(TentaluxError::InvalidCommand(format!(
                "arm {} does not exist (rig has {} arms)",
                bad.number, arms
            )));
        }
        Ok(())
    }

    // =========================================================================
    // State access
    // =========================================================================

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.read().clone()
    }

    /// Arm count from the most recent successful snapshot.
    pub fn arms(&self) -> usize {
        self.inner.snapshot.read().arms()
    }

    /// The transport this controller talks through.
    pub fn transport(&self) -> Arc<dyn RigTransport> {
        self.inner.transport.clone()
    }

    /// Configured poll interval.
    pub fn poll_interval(&self) -> Duration {
        self.inner.poll_interval
    }

    // =========================================================================
    // Subscribers
    // =========================================================================

    /// Register `subscriber` for change notifications.
    ///
    /// The controller keeps only a weak reference: dropping the subscriber
    /// unsubscribes it. Returns `false` if its identity is already registered.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> bool {
        let added = self.inner.subscribers.lock().subscribe(&subscriber);
        if added {
            debug!(subscriber = %subscriber.subscriber_id(), "Subscribed");
        } else {
            warn!(
                subscriber = %subscriber.subscriber_id(),
                "Ignoring duplicate subscription"
            );
        }
        added
    }

    /// Remove the subscriber registered as `id`.
    pub fn unsubscribe(&self, id: &str) -> bool {
        self.inner.subscribers.lock().unsubscribe(id)
    }

    /// Whether `id` is currently subscribed.
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.inner.subscribers.lock().contains(id)
    }
}

impl ControllerInner {
    fn issue(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Parse a state echo, install it and notify subscribers.
    async fn apply(&self, seq: u64, echo: Echo, body: &Value) -> AppResult<Arc<Snapshot>> {
        let snapshot = Arc::new(Snapshot::new(protocol::parse_arbs(body)?));

        let mut last_applied = self.update_lock.lock().await;
        if echo == Echo::Status && seq < *last_applied {
            debug!(seq, last = *last_applied, "Discarding stale rig state");
            return Ok(self.snapshot.read().clone());
        }
        *last_applied = (*last_applied).max(seq);
        *self.snapshot.write() = snapshot.clone();

        let subscribers = self.subscribers.lock().live();
        for subscriber in subscribers {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                let changed = subscriber.on_possible_change(&snapshot);
                if changed {
                    subscriber.publish();
                }
                changed
            }));
            match outcome {
                Ok(true) => debug!(subscriber = %subscriber.subscriber_id(), "State changed"),
                Ok(false) => {}
                Err(_) => warn!(
                    subscriber = %subscriber.subscriber_id(),
                    "Subscriber panicked during notification"
                ),
            }
        }
        Ok(snapshot)
    }
}

// =============================================================================
// Poll loop
// =============================================================================

async fn poll_loop(
    inner: Weak<ControllerInner>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        match shutdown_rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => {}
            _ => break,
        }
        let Some(inner) = inner.upgrade() else {
            debug!("Controller dropped, poll loop exiting");
            break;
        };

        let controller = TentaluxController { inner };
        match AssertUnwindSafe(controller.status()).catch_unwind().await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "Status poll failed"),
            Err(_) => warn!("Status poll panicked"),
        }
        drop(controller);

        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
