use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::attributes::{FileAttributes, LocalFileAttributes};
use crate::buffer::{BufferState, FlushReport, SparqlBuffer, TaskHandle, TripleStore, WriteTask};
use crate::config::{ConfigService, PathResolver};
use crate::controller::{Controller, MountPoint, VolumeEvent};
use crate::crawler::Crawler;
use crate::error::{IndexRequestError, MinerError, Result};
use crate::identity::ContentIdentifier;
use crate::runtime::actor::{ActorParts, MinerActor};
use crate::runtime::protocol::MinerEvent;
use crate::tree::IndexedRoot;
use crate::types::RequesterId;
use crate::watch::{IndexOutcome, IndexRequest};

/// Collaborators the miner runs against.
pub struct MinerServices {
    pub config: Arc<ConfigService>,
    pub store: Arc<dyn TripleStore>,
    pub crawler: Arc<dyn Crawler>,
    pub attributes: Arc<dyn FileAttributes>,
    pub resolver: PathResolver,
    pub system_locations: Option<Vec<PathBuf>>,
}

impl MinerServices {
    /// Services backed by the local filesystem and the process environment.
    pub fn new(
        config: Arc<ConfigService>,
        store: Arc<dyn TripleStore>,
        crawler: Arc<dyn Crawler>,
    ) -> Self {
        Self {
            config,
            store,
            crawler,
            attributes: Arc::new(LocalFileAttributes),
            resolver: PathResolver::default(),
            system_locations: None,
        }
    }

    pub fn with_attributes(mut self, attributes: Arc<dyn FileAttributes>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_resolver(mut self, resolver: PathResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_system_locations(mut self, locations: Vec<PathBuf>) -> Self {
        self.system_locations = Some(locations);
        self
    }
}

#[derive(Clone)]
pub struct MinerHandle {
    event_tx: mpsc::UnboundedSender<MinerEvent>,
    config: Arc<ConfigService>,
    shutdown: CancellationToken,
}

impl MinerHandle {
    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }

    pub fn config(&self) -> &Arc<ConfigService> {
        &self.config
    }

    pub async fn index(
        &self,
        request: IndexRequest,
    ) -> std::result::Result<IndexOutcome, IndexRequestError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.event_tx
            .send(MinerEvent::Index {
                request,
                reply: reply_tx,
            })
            .map_err(|_| IndexRequestError::Stopped)?;
        reply_rx.await.map_err(|_| IndexRequestError::Stopped)?
    }

    /// Drops every watch held by a requester that went away.
    pub async fn release_requester(&self, requester: RequesterId) -> Result<Vec<PathBuf>> {
        self.call(|reply| MinerEvent::ReleaseRequester { requester, reply })
            .await
    }

    pub async fn push_task(&self, task: WriteTask) -> Result<TaskHandle> {
        self.call(|reply| MinerEvent::PushTask { task, reply }).await
    }

    /// Starts a flush. `None` when a batch is already in flight or nothing is
    /// queued; otherwise the receiver yields the batch report.
    pub async fn flush(
        &self,
        reason: impl Into<String>,
    ) -> Result<Option<oneshot::Receiver<FlushReport>>> {
        let reason = reason.into();
        self.call(|reply| MinerEvent::Flush { reason, reply }).await
    }

    pub async fn buffer_state(&self, file: impl AsRef<Path>) -> Result<BufferState> {
        let file = file.as_ref().to_path_buf();
        self.call(|reply| MinerEvent::BufferState { file, reply })
            .await
    }

    pub async fn identify(&self, file: impl AsRef<Path>) -> Result<ContentIdentifier> {
        let file = file.as_ref().to_path_buf();
        self.call(|reply| MinerEvent::Identify { file, reply })
            .await?
    }

    pub async fn roots(&self) -> Result<Vec<IndexedRoot>> {
        self.call(|reply| MinerEvent::Roots { reply }).await
    }

    pub fn mount_added(&self, mount: MountPoint) -> Result<()> {
        self.send(MinerEvent::Volume(VolumeEvent::Mounted(mount)))
    }

    pub fn mount_removed(&self, path: impl Into<PathBuf>) -> Result<()> {
        self.send(MinerEvent::Volume(VolumeEvent::Unmounted(path.into())))
    }

    /// Stops the actor. In-flight probes and the current batch are cancelled.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, event: MinerEvent) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(stopped());
        }
        self.event_tx.send(event).map_err(|_| stopped())
    }

    async fn call<T>(&self, event: impl FnOnce(oneshot::Sender<T>) -> MinerEvent) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(event(reply_tx))?;
        reply_rx
            .await
            .map_err(|_| MinerError::Internal("miner dropped response".to_string()))
    }
}

fn stopped() -> MinerError {
    MinerError::Internal("miner stopped".to_string())
}

pub fn spawn_miner(services: MinerServices) -> MinerHandle {
    let MinerServices {
        config,
        store,
        crawler,
        attributes,
        resolver,
        system_locations,
    } = services;

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();

    let settings = config.snapshot();
    let buffer = SparqlBuffer::new(
        store,
        settings.buffer_limit,
        completion_tx,
        shutdown.child_token(),
    );
    let mut controller = Controller::new(resolver);
    if let Some(locations) = system_locations {
        controller = controller.with_system_locations(locations);
    }

    let actor = MinerActor::new(ActorParts {
        controller,
        config: config.clone(),
        attributes,
        crawler,
        buffer,
        completion_rx,
        event_tx: event_tx.clone(),
        event_rx,
        shutdown: shutdown.clone(),
    });

    tokio::spawn(async move {
        actor.run().await;
    });

    MinerHandle {
        event_tx,
        config,
        shutdown,
    }
}
