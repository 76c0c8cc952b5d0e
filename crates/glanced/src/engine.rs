//! Recognition engine thread.
//!
//! All gallery state lives on one dedicated thread with a single-threaded
//! runtime: candidates are read, a decision is made, and the resulting
//! writes are awaited before the next request is taken, so the
//! read-then-write lifecycle of a frame can never race another frame's.

use crate::events::{EventBus, EventSink};
use glance_core::cluster::{self, Assignment, ClusterConfig, LiveMatch};
use glance_core::throttle::{notify_permitted, Throttle, DEFAULT_BURST_SECS, DEFAULT_COOLDOWN_SECS};
use glance_core::{Detection, FaceStore, Gallery, GalleryError, Identity, NewFace, RecognitionEvent};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Display name given to auto-created identities until someone labels them.
const UNIDENTIFIED_NAME: &str = "Unidentified";

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("gallery: {0}")]
    Gallery(#[from] GalleryError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Runtime knobs for the engine, resolved from config and settings.
pub struct EngineOptions {
    pub cooldown_secs: u64,
    pub burst_secs: u64,
    pub notifications_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            burst_secs: DEFAULT_BURST_SECS,
            notifications_enabled: true,
        }
    }
}

/// Outcome for one detection in an observed frame.
#[derive(Debug, Clone)]
pub struct FrameFace {
    /// Live-recognition hit, if any.
    pub recognized: Option<LiveMatch>,
    /// Result of auto-saving an unrecognized detection, when enabled.
    pub stored: Option<Assignment>,
    /// Whether a recognition event was emitted for this detection.
    pub notified: bool,
}

impl FrameFace {
    fn unmatched() -> Self {
        Self {
            recognized: None,
            stored: None,
            notified: false,
        }
    }
}

/// Messages sent from async callers to the engine thread.
enum EngineRequest {
    Observe {
        detections: Vec<Detection>,
        reply: oneshot::Sender<Vec<FrameFace>>,
    },
    Capture {
        face: NewFace,
        name: Option<String>,
        reply: oneshot::Sender<Result<Assignment, EngineError>>,
    },
    ListIdentities {
        reply: oneshot::Sender<Result<Vec<Identity>, EngineError>>,
    },
    RenameIdentity {
        id: String,
        name: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    SetNotify {
        id: String,
        notify: bool,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    RemoveIdentity {
        id: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    RemoveFace {
        id: String,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Run one live-recognition pass over a frame's detections.
    pub async fn observe(&self, detections: Vec<Detection>) -> Result<Vec<FrameFace>, EngineError> {
        self.request(|reply| EngineRequest::Observe { detections, reply })
            .await
    }

    /// Cluster an explicit capture or upload into the gallery.
    pub async fn capture(
        &self,
        face: NewFace,
        name: Option<String>,
    ) -> Result<Assignment, EngineError> {
        self.request(|reply| EngineRequest::Capture { face, name, reply })
            .await?
    }

    pub async fn list_identities(&self) -> Result<Vec<Identity>, EngineError> {
        self.request(|reply| EngineRequest::ListIdentities { reply }).await?
    }

    pub async fn rename_identity(&self, id: String, name: String) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::RenameIdentity { id, name, reply })
            .await?
    }

    pub async fn set_notify(&self, id: String, notify: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::SetNotify { id, notify, reply })
            .await?
    }

    pub async fn remove_identity(&self, id: String) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::RemoveIdentity { id, reply }).await?
    }

    pub async fn remove_face(&self, id: String) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::RemoveFace { id, reply }).await?
    }
}

/// Spawn the engine on a dedicated OS thread with its own single-threaded
/// runtime. The thread exits once every handle is dropped.
pub fn spawn_engine<S>(
    store: S,
    config: ClusterConfig,
    options: EngineOptions,
    events: EventBus,
) -> EngineHandle
where
    S: FaceStore + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<EngineRequest>(16);

    let engine = Engine {
        gallery: Gallery::new(store),
        config,
        burst: Throttle::new(options.burst_secs),
        cooldown: Throttle::new(options.cooldown_secs),
        notifications_enabled: options.notifications_enabled,
        events,
    };

    std::thread::Builder::new()
        .name("glance-engine".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(err) => {
                    tracing::error!(error = %err, "engine runtime build failed");
                    return;
                }
            };
            runtime.block_on(run(rx, engine));
        })
        .expect("failed to spawn engine thread");

    EngineHandle { tx }
}

async fn run<S: FaceStore>(mut rx: mpsc::Receiver<EngineRequest>, mut engine: Engine<S>) {
    tracing::info!("engine thread started");
    while let Some(req) = rx.recv().await {
        match req {
            EngineRequest::Observe { detections, reply } => {
                let _ = reply.send(engine.observe(detections).await);
            }
            EngineRequest::Capture { face, name, reply } => {
                let _ = reply.send(engine.capture(face, name).await);
            }
            EngineRequest::ListIdentities { reply } => {
                let _ = reply.send(engine.gallery.list_identities().await.map_err(Into::into));
            }
            EngineRequest::RenameIdentity { id, name, reply } => {
                let _ = reply.send(engine.gallery.rename_identity(&id, &name).await.map_err(Into::into));
            }
            EngineRequest::SetNotify { id, notify, reply } => {
                let _ = reply.send(engine.gallery.set_notify(&id, notify).await.map_err(Into::into));
            }
            EngineRequest::RemoveIdentity { id, reply } => {
                let _ = reply.send(engine.gallery.remove_identity(&id).await.map_err(Into::into));
            }
            EngineRequest::RemoveFace { id, reply } => {
                let _ = reply.send(engine.gallery.remove_face(&id).await.map_err(Into::into));
            }
        }
    }
    tracing::info!("engine thread exiting");
}

struct Engine<S: FaceStore> {
    gallery: Gallery<S>,
    config: ClusterConfig,
    /// Short-memory window at the live layer, deduplicating one burst.
    burst: Throttle,
    /// Notification-level cooldown.
    cooldown: Throttle,
    notifications_enabled: bool,
    events: EventBus,
}

impl<S: FaceStore> Engine<S> {
    /// One live-recognition pass.
    ///
    /// Store failures degrade the affected detection to "unmatched" and are
    /// logged; they never stop the loop, so a bad frame or a flaky backend
    /// costs at most that frame.
    async fn observe(&mut self, detections: Vec<Detection>) -> Vec<FrameFace> {
        let candidates = match self.gallery.candidates().await {
            Ok(candidates) => candidates,
            Err(err) => {
                tracing::error!(error = %err, "candidate load failed, skipping frame");
                return detections.iter().map(|_| FrameFace::unmatched()).collect();
            }
        };

        let mut out = Vec::with_capacity(detections.len());
        for detection in detections {
            if !detection.embedding.is_valid() {
                tracing::debug!("detection without embedding, ignoring");
                out.push(FrameFace::unmatched());
                continue;
            }

            match cluster::recognize(&detection.embedding, &candidates, &self.config) {
                Some(hit) => {
                    let notified = self.maybe_notify(&hit, &detection);
                    out.push(FrameFace {
                        recognized: Some(hit),
                        stored: None,
                        notified,
                    });
                }
                None if self.config.auto_save_unrecognized => {
                    let face = NewFace::new(detection.embedding.clone(), detection.crop.clone());
                    // assign() re-reads candidates, so two unknown faces of
                    // the same person within one frame still end up merged.
                    let stored = match cluster::assign(
                        &mut self.gallery,
                        &face,
                        UNIDENTIFIED_NAME,
                        &self.config,
                    )
                    .await
                    {
                        Ok(assignment) => Some(assignment),
                        Err(err) => {
                            tracing::warn!(error = %err, "auto-save failed, detection dropped");
                            None
                        }
                    };
                    out.push(FrameFace {
                        recognized: None,
                        stored,
                        notified: false,
                    });
                }
                None => out.push(FrameFace::unmatched()),
            }
        }
        out
    }

    async fn capture(
        &mut self,
        face: NewFace,
        name: Option<String>,
    ) -> Result<Assignment, EngineError> {
        let name = name.unwrap_or_else(|| UNIDENTIFIED_NAME.to_string());
        let assignment = cluster::assign(&mut self.gallery, &face, &name, &self.config).await?;
        Ok(assignment)
    }

    /// Decide whether a live hit produces a recognition event, and emit it.
    ///
    /// The person-level preference is checked before either throttle is
    /// consulted, so an explicit opt-out wins over any cooldown state. The
    /// cooldown is recorded only after the event went out.
    fn maybe_notify(&mut self, hit: &LiveMatch, detection: &Detection) -> bool {
        if !self.notifications_enabled {
            return false;
        }
        if !notify_permitted(hit.notify) {
            return false;
        }

        let key = hit
            .identity_id
            .clone()
            .unwrap_or_else(|| hit.face_id.clone());

        if !self.burst.should_notify(&key) {
            return false;
        }
        self.burst.record_notified(&key);

        if !self.cooldown.should_notify(&key) {
            return false;
        }

        let event = RecognitionEvent::new(
            hit.name.clone().unwrap_or_else(|| UNIDENTIFIED_NAME.to_string()),
            hit.identity_id.clone(),
            Some(hit.face_id.clone()),
            Some(detection.crop.clone()),
        );
        tracing::info!(
            event_id = %event.id,
            name = %event.name,
            distance = hit.distance,
            "recognition event"
        );
        self.events.publish(event);
        self.cooldown.record_notified(&key);
        true
    }
}
