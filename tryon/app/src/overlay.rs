//! Ownership of the displayed eyewear asset.
//!
//! Loads may overlap. Each request is numbered when it is issued and a
//! finished load only becomes active if its number is higher than the one
//! currently applied; anything older is released on arrival.

use anyhow::Result;
use api::{AssetLoader, Pose, SceneAsset};
use common::config::ModelConfig;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::SessionError;

/// A loaded asset plus the request that produced it. Releases its resources
/// when dropped unless that already happened.
pub struct OverlayModel {
    path: String,
    sequence: u64,
    asset: Box<dyn SceneAsset>,
    released: bool,
}

impl OverlayModel {
    fn new(ticket: &LoadTicket, asset: Box<dyn SceneAsset>) -> Self {
        Self {
            path: ticket.path.clone(),
            sequence: ticket.sequence,
            asset,
            released: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn asset(&self) -> &dyn SceneAsset {
        self.asset.as_ref()
    }

    pub fn release(mut self) {
        self.release_resources();
    }

    fn release_resources(&mut self) {
        if !self.released {
            self.released = true;
            self.asset.release();
        }
    }
}

impl Drop for OverlayModel {
    fn drop(&mut self) {
        self.release_resources();
    }
}

impl std::fmt::Debug for OverlayModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayModel")
            .field("path", &self.path)
            .field("sequence", &self.sequence)
            .field("bytes", &self.asset.byte_size())
            .finish()
    }
}

/// Identifies one load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    path: String,
    sequence: u64,
}

impl LoadTicket {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Activated {
        path: String,
        sequence: u64,
    },
    /// A newer request had already been applied; this result was released.
    Discarded {
        path: String,
        sequence: u64,
        superseded_by: u64,
    },
}

struct LoadCompletion {
    ticket: LoadTicket,
    result: Result<OverlayModel>,
}

pub struct OverlayModelManager {
    loader: Arc<dyn AssetLoader>,
    placement: ModelConfig,
    active: Option<OverlayModel>,
    next_sequence: u64,
    applied_sequence: u64,
    pending: usize,
    closed: bool,
    completions_tx: mpsc::UnboundedSender<LoadCompletion>,
    completions_rx: mpsc::UnboundedReceiver<LoadCompletion>,
}

impl OverlayModelManager {
    pub fn new(loader: Arc<dyn AssetLoader>, placement: &ModelConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            loader,
            placement: placement.clone(),
            active: None,
            next_sequence: 0,
            applied_sequence: 0,
            pending: 0,
            closed: false,
            completions_tx,
            completions_rx,
        }
    }

    pub fn active(&self) -> Option<&OverlayModel> {
        self.active.as_ref()
    }

    pub fn active_path(&self) -> Option<&str> {
        self.active.as_ref().map(OverlayModel::path)
    }

    /// Requests issued through [`request_model`](Self::request_model) whose
    /// completion has not been polled yet.
    pub fn pending_loads(&self) -> usize {
        self.pending
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_user_scale(&mut self, factor: f32) {
        self.placement.user_scale_factor = factor;
    }

    /// Where a model sits before the first tracked pose reaches it.
    pub fn initial_pose(&self) -> Pose {
        Pose {
            scale: self.placement.initial_scale(),
            ..Pose::default()
        }
    }

    /// Number a new request without starting it.
    pub fn begin_load(&mut self, path: &str) -> LoadTicket {
        self.next_sequence += 1;
        debug!("Model load #{} issued for {:?}", self.next_sequence, path);
        LoadTicket {
            path: path.to_string(),
            sequence: self.next_sequence,
        }
    }

    /// Apply the result of a request started with [`begin_load`](Self::begin_load).
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Box<dyn SceneAsset>>,
    ) -> Result<LoadOutcome, SessionError> {
        let result = result.map(|asset| OverlayModel::new(&ticket, asset));
        self.apply(LoadCompletion { ticket, result })
    }

    /// Load `path` and apply the result before returning.
    pub async fn load_model(&mut self, path: &str) -> Result<LoadOutcome, SessionError> {
        self.ensure_open(path)?;
        let ticket = self.begin_load(path);
        let loader = self.loader.clone();
        let load_path = ticket.path.clone();
        let result = tokio::task::spawn_blocking(move || loader.load(&load_path))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|loaded| loaded);
        self.complete_load(ticket, result)
    }

    /// Start loading `path` on the blocking pool. The result is applied by a
    /// later [`poll_completions`](Self::poll_completions).
    pub fn request_model(&mut self, path: &str) -> Result<LoadTicket, SessionError> {
        self.ensure_open(path)?;
        let ticket = self.begin_load(path);
        let loader = self.loader.clone();
        let tx = self.completions_tx.clone();
        let task_ticket = ticket.clone();

        tokio::task::spawn_blocking(move || {
            let result = loader
                .load(&task_ticket.path)
                .map(|asset| OverlayModel::new(&task_ticket, asset));
            // A closed or dropped manager hands the completion back here; dropping
            // it releases the model.
            let _ = tx.send(LoadCompletion {
                ticket: task_ticket,
                result,
            });
        });

        self.pending += 1;
        Ok(ticket)
    }

    pub fn poll_completions(&mut self) -> Vec<Result<LoadOutcome, SessionError>> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            outcomes.push(self.apply(completion));
        }
        outcomes
    }

    pub fn apply_pose(&mut self, pose: &Pose) {
        if let Some(model) = self.active.as_mut() {
            model.asset.set_transform(pose);
        }
    }

    /// Release the active model, leaving nothing displayed.
    pub fn release(&mut self) {
        if let Some(model) = self.active.take() {
            info!("Releasing overlay model {:?}", model.path);
            model.release();
        }
    }

    /// Stop taking requests and release everything this manager holds.
    ///
    /// Completions already queued are released now. Loads still running
    /// release their result on the loader thread once they find the channel
    /// closed.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.applied_sequence = self.next_sequence;
        self.completions_rx.close();

        let mut dropped = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if completion.result.is_ok() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            debug!("Released {} model(s) that finished loading during shutdown", dropped);
        }
        self.pending = 0;
        self.release();
    }

    fn ensure_open(&self, path: &str) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::ModelManagerClosed {
                path: path.to_string(),
            });
        }
        Ok(())
    }

    fn apply(&mut self, completion: LoadCompletion) -> Result<LoadOutcome, SessionError> {
        let LoadCompletion { ticket, result } = completion;

        let model = match result {
            Ok(model) => model,
            Err(e) => {
                warn!(
                    "✗ Failed to load model #{} {:?}: {:#}",
                    ticket.sequence, ticket.path, e
                );
                return Err(SessionError::AssetLoadFailure {
                    path: ticket.path,
                    reason: format!("{:#}", e),
                });
            }
        };

        if self.closed || ticket.sequence <= self.applied_sequence {
            debug!(
                "Discarding model #{} {:?}, superseded by #{}",
                ticket.sequence, ticket.path, self.applied_sequence
            );
            model.release();
            return Ok(LoadOutcome::Discarded {
                path: ticket.path,
                sequence: ticket.sequence,
                superseded_by: self.applied_sequence,
            });
        }

        self.activate(model);
        Ok(LoadOutcome::Activated {
            path: ticket.path,
            sequence: ticket.sequence,
        })
    }

    fn activate(&mut self, mut model: OverlayModel) {
        self.release();

        let initial = self.initial_pose();
        model.asset.set_depth_test(false);
        model.asset.set_transform(&initial);

        info!(
            "✓ Overlay model #{} {:?} active ({} bytes)",
            model.sequence,
            model.path,
            model.asset.byte_size()
        );
        self.applied_sequence = model.sequence;
        self.active = Some(model);
    }
}
