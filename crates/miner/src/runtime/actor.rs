
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::attributes::FileAttributes;
use crate::buffer::{
    BatchCompletion, FlushCallback, FlushReport, SparqlBuffer, TaskHandle, WriteTask,
};
use crate::config::snapshot::{check_config, save_config};
use crate::config::{ConfigChange, ConfigService, MinerSettings, SettingsKey};
use crate::controller::Controller;
use crate::crawler::Crawler;
use crate::identity::IdentityResolver;
use crate::runtime::protocol::{IndexReply, MinerEvent};
use crate::tree::IndexingTree;
use crate::watch::{IndexRequest, WatchArbiter};

const LIMIT_FLUSH_REASON: &str = "task limit reached";
const TIMER_FLUSH_REASON: &str = "flush interval elapsed";

/// Single owner of the indexing tree and everything that mutates it.
///
/// Slow work (attribute probes, volume lookups, batch writes) runs on spawned
/// tasks that post their results back as events, so every state change is
/// applied here, one event at a time.
pub(crate) struct MinerActor {
    tree: IndexingTree,
    controller: Controller,
    arbiter: WatchArbiter,
    identity: IdentityResolver,
    buffer: SparqlBuffer,
    config: Arc<ConfigService>,
    settings: MinerSettings,
    attributes: Arc<dyn FileAttributes>,
    crawler: Arc<dyn Crawler>,
    event_tx: mpsc::UnboundedSender<MinerEvent>,
    event_rx: mpsc::UnboundedReceiver<MinerEvent>,
    completion_rx: mpsc::UnboundedReceiver<BatchCompletion>,
    config_rx: broadcast::Receiver<ConfigChange>,
    config_open: bool,
    flush_timer: Interval,
    shutdown: CancellationToken,
}

pub(crate) struct ActorParts {
    pub controller: Controller,
    pub config: Arc<ConfigService>,
    pub attributes: Arc<dyn FileAttributes>,
    pub crawler: Arc<dyn Crawler>,
    pub buffer: SparqlBuffer,
    pub completion_rx: mpsc::UnboundedReceiver<BatchCompletion>,
    pub event_tx: mpsc::UnboundedSender<MinerEvent>,
    pub event_rx: mpsc::UnboundedReceiver<MinerEvent>,
    pub shutdown: CancellationToken,
}

impl MinerActor {
    pub(crate) fn new(parts: ActorParts) -> Self {
        let settings = parts.config.snapshot();
        let config_rx = parts.config.subscribe();
        Self {
            tree: IndexingTree::default(),
            controller: parts.controller,
            arbiter: WatchArbiter::new(),
            identity: IdentityResolver::new(parts.attributes.clone()),
            buffer: parts.buffer,
            config: parts.config,
            flush_timer: flush_timer(&settings),
            settings,
            attributes: parts.attributes,
            crawler: parts.crawler,
            event_tx: parts.event_tx,
            event_rx: parts.event_rx,
            completion_rx: parts.completion_rx,
            config_rx,
            config_open: true,
            shutdown: parts.shutdown,
        }
    }

    pub(crate) async fn run(mut self) {
        self.start();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }
                Some(event) = self.event_rx.recv() => self.handle_event(event),
                change = self.config_rx.recv(), if self.config_open => {
                    self.handle_config_notification(change);
                }
                _ = self.flush_timer.tick() => {
                    self.buffer.flush(TIMER_FLUSH_REASON, None);
                }
            }
        }

        self.drain().await;
    }

    fn start(&mut self) {
        self.controller.initialize(&mut self.tree, &self.settings);
        self.after_directories_changed();

        if let Some(state_dir) = self.settings.state_dir.clone() {
            let arbiter = &self.arbiter;
            let on_demand = |path: &Path| arbiter.is_requester_owned(path);
            if let Err(error) = check_config(&mut self.tree, &state_dir, on_demand) {
                log::warn!(
                    "indexing config snapshot check failed dir={}: {}",
                    state_dir.display(),
                    error
                );
            }
        }

        self.dispatch_tree_events();
    }

    fn handle_event(&mut self, event: MinerEvent) {
        match event {
            MinerEvent::Index { request, reply } => self.spawn_probe(request, reply),
            MinerEvent::IndexProbed { result, reply } => {
                let outcome = result.and_then(|probed| {
                    self.arbiter
                        .apply(&mut self.tree, self.crawler.as_ref(), probed)
                });
                self.dispatch_tree_events();
                let _ = reply.send(outcome);
            }
            MinerEvent::ReleaseRequester { requester, reply } => {
                let removed = self.arbiter.release(&mut self.tree, &requester);
                self.dispatch_tree_events();
                if !removed.is_empty() {
                    self.restore_uncovered_roots();
                }
                let _ = reply.send(removed);
            }
            MinerEvent::PushTask { task, reply } => {
                let _ = reply.send(self.push_task(task));
            }
            MinerEvent::Flush { reason, reply } => {
                let (report_tx, report_rx) = oneshot::channel();
                let callback: FlushCallback = Box::new(move |report: &FlushReport| {
                    let _ = report_tx.send(report.clone());
                });
                let started = self.buffer.flush(&reason, Some(callback));
                let _ = reply.send(started.then_some(report_rx));
            }
            MinerEvent::BufferState { file, reply } => {
                let _ = reply.send(self.buffer.state_of(&file));
            }
            MinerEvent::Identify { file, reply } => {
                let plan = IdentityResolver::plan(&self.tree, &file);
                let identity = self.identity.clone();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let result = identity.resolve(plan).await;
                    let _ = event_tx.send(MinerEvent::IdentityResolved { result, reply });
                });
            }
            MinerEvent::IdentityResolved { result, reply } => {
                let result =
                    result.map(|resolved| IdentityResolver::finish(&mut self.tree, resolved));
                let _ = reply.send(result);
            }
            MinerEvent::Roots { reply } => {
                let _ = reply.send(self.tree.list_roots());
            }
            MinerEvent::Volume(event) => {
                self.controller.handle_volume_event(&mut self.tree, event);
                self.dispatch_tree_events();
            }
        }
    }

    fn spawn_probe(&self, request: IndexRequest, reply: IndexReply) {
        let attributes = self.attributes.clone();
        let event_tx = self.event_tx.clone();
        let cancel = self.shutdown.child_token();
        tokio::spawn(async move {
            let result = WatchArbiter::probe(attributes.as_ref(), request, &cancel).await;
            let _ = event_tx.send(MinerEvent::IndexProbed { result, reply });
        });
    }

    fn push_task(&mut self, task: WriteTask) -> TaskHandle {
        let handle = self.buffer.push(task);
        if self.buffer.limit_reached() {
            self.buffer.flush(LIMIT_FLUSH_REASON, None);
        }
        handle
    }

    fn handle_completion(&mut self, completion: BatchCompletion) {
        if self.buffer.complete(completion).is_none() {
            return;
        }
        if self.buffer.limit_reached() && self.buffer.pending_len() > 0 {
            self.buffer.flush(LIMIT_FLUSH_REASON, None);
        }
    }

    fn handle_config_notification(
        &mut self,
        change: Result<ConfigChange, broadcast::error::RecvError>,
    ) {
        match change {
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("config notifications lagged skipped={}", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                log::debug!("config service closed, no further settings changes");
                self.config_open = false;
                return;
            }
        }

        // Diff against the settings last applied so lagged changes are not lost.
        let fresh = self.config.snapshot();
        let keys = self.settings.changed_keys(&fresh);
        if keys.is_empty() {
            return;
        }
        self.settings = fresh;
        self.apply_settings(&ConfigChange { keys });
    }

    fn apply_settings(&mut self, change: &ConfigChange) {
        log::info!("applying settings change keys={:?}", change.keys);

        let removed = self
            .controller
            .apply_settings(&mut self.tree, &self.settings, change);
        if change.touches_directories()
            || change.keys.contains(&SettingsKey::RequireLocationInConfig)
        {
            self.after_directories_changed();
        }
        if change.keys.contains(&SettingsKey::BufferLimit) {
            self.buffer.set_limit(self.settings.buffer_limit);
            if self.buffer.limit_reached() {
                self.buffer.flush(LIMIT_FLUSH_REASON, None);
            }
        }
        if change.keys.contains(&SettingsKey::FlushInterval) {
            self.flush_timer = flush_timer(&self.settings);
        }

        self.dispatch_tree_events();
        if !removed.is_empty() {
            self.restore_uncovered_roots();
        }

        if !removed.is_empty() || change.touches_directories() || change.touches_filters() {
            self.save_snapshot();
        }
    }

    /// Configured roots are never released by watchers.
    fn after_directories_changed(&mut self) {
        let configured: Vec<PathBuf> = self
            .controller
            .directories()
            .roots()
            .map(|(path, _)| path.clone())
            .collect();
        for root in &configured {
            self.arbiter.mark_static(root);
        }
        self.arbiter
            .set_eligibility(self.controller.eligibility_policy(&self.settings));
    }

    /// Brings back configured roots and suspended on-demand roots whose
    /// covering root was just removed.
    fn restore_uncovered_roots(&mut self) {
        self.controller.restore_configured_roots(&mut self.tree);
        let restored = self.arbiter.restore_suspended(&mut self.tree);
        if !restored.is_empty() {
            log::info!("restored on-demand roots={:?}", restored);
        }
        self.after_directories_changed();
        self.dispatch_tree_events();
    }

    fn save_snapshot(&self) {
        let Some(state_dir) = &self.settings.state_dir else {
            return;
        };
        let on_demand = |path: &Path| self.arbiter.is_requester_owned(path);
        if let Err(error) = save_config(&self.tree, state_dir, on_demand) {
            log::warn!(
                "failed to save indexing config snapshot dir={}: {}",
                state_dir.display(),
                error
            );
        }
    }

    fn dispatch_tree_events(&mut self) {
        for event in self.tree.take_events() {
            self.arbiter.handle_tree_event(&event);
            self.crawler.tree_changed(&event);
        }
    }

    /// Waits for the interrupted batch so its callback still runs.
    async fn drain(mut self) {
        if self.buffer.is_flushing() {
            if let Some(completion) = self.completion_rx.recv().await {
                self.buffer.complete(completion);
            }
        }
        let pending = self.buffer.pending_len();
        if pending > 0 {
            log::info!("miner stopped with unflushed tasks pending={}", pending);
        }
        log::info!("miner stopped roots={}", self.tree.len());
    }
}

fn flush_timer(settings: &MinerSettings) -> Interval {
    let period = settings.flush_interval();
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}
