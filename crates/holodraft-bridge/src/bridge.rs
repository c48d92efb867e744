//! Host bridge actor
//!
//! One task owns the registry and measurement controller and applies host
//! commands to them one at a time. Downloads, loads, exports and AR session
//! start-up run as spawned tasks that report back through a completion
//! channel, so they never block command handling.

use holodraft_core::{
    CoreEvent, LoadError, LoadRequest, LoadedAsset, MeasurementController, ModelLoader,
    ModelMetadata, ModelRegistry, ModelSummary, Pose, RegistrySettings, SourceFormat,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::download::Downloader;
use crate::error::BridgeError;
use crate::protocol::*;

/// Format used when an export request names none
pub const DEFAULT_EXPORT_FORMAT: &str = "fbx";

/// Error code reported when a model is deleted while still loading
pub const LOAD_CANCELLED: &str = "cancelled";

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub download_dir: PathBuf,
    /// Directory local model paths must live under; `None` refuses them
    pub local_model_root: Option<PathBuf>,
    /// Simulated latency of AR session negotiation
    pub ar_init_latency: Duration,
    /// Simulated latency of an export
    pub export_latency: Duration,
    pub export_base_url: String,
    /// Capacity of the outbound event channel
    pub event_capacity: usize,
    pub registry: RegistrySettings,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./downloads"),
            local_model_root: None,
            ar_init_latency: Duration::from_millis(1000),
            export_latency: Duration::from_millis(2000),
            export_base_url: "/api/exports".to_string(),
            event_capacity: 100,
            registry: RegistrySettings::default(),
        }
    }
}

/// Result of a spawned task, fed back to the owner
#[derive(Debug)]
pub enum Completion {
    /// Load pipeline reached an intermediate milestone
    Progress {
        file_id: String,
        token: u64,
        status: LoadStatus,
    },
    Loaded {
        file_id: String,
        token: u64,
        file_name: String,
        format: SourceFormat,
        result: Result<(PathBuf, LoadedAsset), LoadError>,
    },
    ArSessionReady { generation: u64, session_id: String },
    Exported { file_id: String, export_url: String },
}

/// Request sent to a running bridge task
#[derive(Debug)]
pub enum BridgeRequest {
    /// Raw text frame from the host
    Message(String),
    Command(HostCommand),
    Snapshot(oneshot::Sender<Vec<ModelSummary>>),
    Shutdown,
}

/// Owner of the registry and controller on the host's behalf
pub struct HostBridge<L> {
    settings: BridgeSettings,
    registry: ModelRegistry,
    controller: MeasurementController,
    loader: Arc<L>,
    downloader: Downloader,
    events: broadcast::Sender<HostEvent>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    /// In-flight loads by file id; the token identifies the live request
    pending_loads: HashMap<String, u64>,
    next_load_token: u64,
    /// Bumped on every AR start/stop so stale start-ups can be recognised
    ar_generation: u64,
    ar_session: Option<String>,
}

impl<L> HostBridge<L>
where
    L: ModelLoader + Send + Sync + 'static,
{
    pub fn new(settings: BridgeSettings, loader: L) -> Self {
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            registry: ModelRegistry::new(settings.registry.clone()),
            controller: MeasurementController::new(),
            loader: Arc::new(loader),
            downloader: Downloader::new(settings.download_dir.clone())
                .with_local_root(settings.local_model_root.clone()),
            settings,
            events,
            completion_tx,
            completion_rx,
            pending_loads: HashMap::new(),
            next_load_token: 0,
            ar_generation: 0,
            ar_session: None,
        }
    }

    /// Subscribe to outbound events
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn controller(&self) -> &MeasurementController {
        &self.controller
    }

    pub fn ar_session(&self) -> Option<&str> {
        self.ar_session.as_deref()
    }

    pub fn snapshot(&self) -> Vec<ModelSummary> {
        let mut models: Vec<ModelSummary> = self.registry.all().iter().map(|m| m.summary()).collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }

    fn send(&self, event: HostEvent) {
        debug!(event = event.name(), "Sending host event");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn announce_ready(&self) {
        info!("Host bridge ready");
        self.send(HostEvent::ready());
    }

    /// Decode and apply one text frame from the host
    pub fn handle_message(&mut self, text: &str) {
        match HostCommand::parse(text) {
            Ok(command) => self.handle_command(command),
            Err(e) => self.reject(e),
        }
    }

    fn reject(&mut self, error: BridgeError) {
        warn!(error = %error, "Rejected host message");
        // Hosts waiting on these commands get the reply they would have had
        // on failure, besides the generic error event.
        match error.command() {
            Some("LoadModel") | Some("LoadCADModel") => self.send(HostEvent::load_error("unknown", error.code())),
            Some("StartARSession") => self.send(HostEvent::ar_status(false, None)),
            _ => {}
        }
        self.send(HostEvent::bridge_error(&error));
    }

    /// Apply one decoded command
    pub fn handle_command(&mut self, command: HostCommand) {
        debug!(command = command.name(), "Handling host command");
        match command {
            HostCommand::LoadModel(req) => self.start_load(req),
            HostCommand::TransformModel(req) => {
                let pose = Pose::from_euler_degrees(req.position.into(), req.rotation.into(), req.scale.into());
                self.registry.set_pose(&req.file_id, pose);
            }
            HostCommand::UpdateMaterial(req) => {
                self.registry.update_material(
                    &req.file_id,
                    &req.material_name,
                    req.color.into(),
                    req.metallic,
                    req.roughness,
                );
            }
            HostCommand::StartArSession(req) => self.start_ar_session(req),
            HostCommand::StopArSession => {
                self.ar_generation += 1;
                if let Some(session) = self.ar_session.take() {
                    info!(session = %session, "AR session stopped");
                }
                self.send(HostEvent::ar_status(false, None));
            }
            HostCommand::ExportModel(req) => self.start_export(req),
            HostCommand::SelectModel(req) => {
                self.registry.select(&req.file_id);
            }
            HostCommand::DeleteModel(req) => {
                if self.pending_loads.remove(&req.file_id).is_some() {
                    info!(file = %req.file_id, "Load in flight will be discarded");
                    self.send(HostEvent::load_error(&req.file_id, LOAD_CANCELLED));
                } else {
                    self.registry.delete(&req.file_id);
                }
            }
            HostCommand::HighlightModel(req) => {
                self.registry.set_highlighted(&req.file_id, req.highlighted);
            }
            HostCommand::ToggleWireframe => {
                self.registry.toggle_wireframe();
            }
            HostCommand::ToggleExplodedView => {
                self.registry.toggle_exploded_view();
            }
            HostCommand::ToggleCrossSection => {
                self.registry.toggle_cross_section();
            }
            HostCommand::StartMeasurement(req) => self.controller.start_mode(req.kind),
            HostCommand::StopMeasurement => self.controller.stop_mode(),
            HostCommand::MeasurementClick(req) => {
                self.controller.handle_click(&mut self.registry, req.point.into());
            }
            HostCommand::AddAnnotation(req) => {
                self.registry.add_annotation(req.position.into(), &req.text);
            }
            HostCommand::ClearMeasurements => self.registry.clear_measurements_and_annotations(),
        }
        self.flush_core_events();
    }

    fn start_load(&mut self, req: LoadModelRequest) {
        let file_id = req.file_id.clone();
        if self.registry.check_available(&file_id).is_err() {
            return;
        }
        if self.pending_loads.contains_key(&file_id) {
            warn!(file = %file_id, "Model with this id is already loading");
            self.send(HostEvent::load_error(&file_id, "duplicate_id"));
            return;
        }
        self.next_load_token += 1;
        let token = self.next_load_token;
        self.pending_loads.insert(file_id.clone(), token);

        info!(file = %file_id, name = %req.file_name, url = %req.download_url, size = req.file_size, "Loading model");
        self.send(HostEvent::progress(&file_id, LoadStatus::Starting));

        let loader = Arc::clone(&self.loader);
        let downloader = self.downloader.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let progress = |status| {
                let _ = tx.send(Completion::Progress {
                    file_id: req.file_id.clone(),
                    token,
                    status,
                });
            };

            progress(LoadStatus::Downloading);
            let format = if req.format.trim().is_empty() {
                None
            } else {
                Some(SourceFormat::from_extension(&req.format))
            };
            let extension = format.as_ref().map(|f| f.extension().to_string()).unwrap_or_default();
            // A reload of a deleted id must not share the stale task's file
            let download_key = format!("{}-{}", req.file_id, token);

            let result = async {
                let path = downloader.fetch(&download_key, &req.download_url, &extension).await?;
                progress(LoadStatus::Processing);
                let request = match &format {
                    Some(format) => LoadRequest {
                        path: path.clone(),
                        format: format.clone(),
                    },
                    None => LoadRequest::from_path(path.clone()),
                };
                let format = request.format.clone();
                progress(LoadStatus::Loading);
                let asset = loader.load(request).await?;
                Ok::<_, LoadError>((path, asset, format))
            }
            .await;

            let (format, result) = match result {
                Ok((path, asset, format)) => (format, Ok((path, asset))),
                Err(e) => (format.unwrap_or_else(|| SourceFormat::Other(String::new())), Err(e)),
            };
            let _ = tx.send(Completion::Loaded {
                file_id: req.file_id.clone(),
                token,
                file_name: req.file_name.clone(),
                format,
                result,
            });
        });
    }

    fn start_ar_session(&mut self, req: StartArSessionRequest) {
        self.ar_generation += 1;
        let generation = self.ar_generation;
        let latency = self.settings.ar_init_latency;
        let tx = self.completion_tx.clone();

        info!(
            file = %req.file_id,
            hand_tracking = req.enable_hand_tracking,
            collaboration = req.enable_collaboration,
            room = ?req.collaboration_room_id,
            "Starting AR session"
        );

        tokio::spawn(async move {
            let session_id = uuid::Uuid::new_v4().to_string();
            tokio::time::sleep(latency).await;
            let _ = tx.send(Completion::ArSessionReady { generation, session_id });
        });
    }

    fn start_export(&mut self, req: ExportModelRequest) {
        if !self.registry.is_loaded(&req.file_id) {
            warn!(file = %req.file_id, "Cannot export unknown model");
            self.send(HostEvent::exported(&req.file_id, None));
            return;
        }

        let format = if req.format.trim().is_empty() {
            DEFAULT_EXPORT_FORMAT.to_string()
        } else {
            req.format.trim().trim_start_matches('.').to_ascii_lowercase()
        };
        let export_url = format!(
            "{}/{}.{}",
            self.settings.export_base_url.trim_end_matches('/'),
            req.file_id,
            format
        );
        info!(
            file = %req.file_id,
            format = %format,
            animations = req.include_animations,
            materials = req.include_materials,
            "Exporting model"
        );

        let latency = self.settings.export_latency;
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = tx.send(Completion::Exported {
                file_id: req.file_id,
                export_url,
            });
        });
    }

    /// Wait for the next spawned task to report back
    pub async fn next_completion(&mut self) -> Option<Completion> {
        self.completion_rx.recv().await
    }

    /// Apply a spawned task's result
    pub fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Progress { file_id, token, status } => {
                if self.is_live_load(&file_id, token) {
                    self.send(HostEvent::progress(file_id, status));
                }
            }
            Completion::Loaded {
                file_id,
                token,
                file_name,
                format,
                result,
            } => {
                if !self.is_live_load(&file_id, token) {
                    debug!(file = %file_id, token, "Ignoring load result for discarded request");
                    return;
                }
                self.pending_loads.remove(&file_id);
                match result {
                    Ok((path, asset)) => {
                        let path = path.display().to_string();
                        let metadata = if file_name.is_empty() {
                            let mut metadata = ModelMetadata::from_path(&path);
                            metadata.source_format = format;
                            metadata
                        } else {
                            ModelMetadata::new(path, file_name, format)
                        };
                        if let Err(e) = self.registry.register(&file_id, metadata, asset) {
                            debug!(file = %file_id, error = %e, "Registration rejected");
                        }
                    }
                    Err(e) => self.registry.report_load_failure(&file_id, &e),
                }
                self.flush_core_events();
            }
            Completion::ArSessionReady { generation, session_id } => {
                if generation != self.ar_generation {
                    debug!(session = %session_id, "Ignoring superseded AR session start");
                    return;
                }
                info!(session = %session_id, "AR session active");
                self.ar_session = Some(session_id.clone());
                self.send(HostEvent::ar_status(true, Some(session_id)));
            }
            Completion::Exported { file_id, export_url } => {
                if !self.registry.is_loaded(&file_id) {
                    debug!(file = %file_id, "Ignoring export result for deleted model");
                    return;
                }
                info!(file = %file_id, url = %export_url, "Model exported");
                self.send(HostEvent::exported(file_id, Some(export_url)));
            }
        }
    }

    fn is_live_load(&self, file_id: &str, token: u64) -> bool {
        self.pending_loads.get(file_id) == Some(&token)
    }

    /// Forward queued core events to the host, oldest first
    fn flush_core_events(&mut self) {
        for event in self.registry.drain_events() {
            if let Some(host_event) = to_host_event(event) {
                self.send(host_event);
            }
        }
    }

    /// Run the command loop until shutdown or until every handle is dropped
    pub async fn run(mut self, mut requests: mpsc::Receiver<BridgeRequest>) {
        self.announce_ready();
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(BridgeRequest::Message(text)) => self.handle_message(&text),
                    Some(BridgeRequest::Command(command)) => self.handle_command(command),
                    Some(BridgeRequest::Snapshot(reply)) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(BridgeRequest::Shutdown) | None => break,
                },
                Some(completion) = self.completion_rx.recv() => self.handle_completion(completion),
            }
        }
        info!(models = self.registry.len(), "Host bridge stopped");
    }

    /// Move the bridge onto its own task
    pub fn spawn(self) -> BridgeHandle {
        let (tx, rx) = mpsc::channel(self.settings.event_capacity.max(1));
        let handle = BridgeHandle {
            requests: tx,
            events: self.events.clone(),
        };
        tokio::spawn(self.run(rx));
        handle
    }
}

fn to_host_event(event: CoreEvent) -> Option<HostEvent> {
    let timestamp = chrono::Utc::now();
    let host_event = match event {
        CoreEvent::ModelLoaded { id } => HostEvent::progress(id, LoadStatus::Complete),
        CoreEvent::ModelLoadFailed { id, code, .. } => HostEvent::load_error(id, code),
        CoreEvent::ModelSelected { id } => HostEvent::ModelSelected(ModelSelectedPayload {
            file_id: id,
            selected: true,
            timestamp,
        }),
        CoreEvent::ModelDeselected { id } => HostEvent::ModelSelected(ModelSelectedPayload {
            file_id: id,
            selected: false,
            timestamp,
        }),
        CoreEvent::ModelDeleted { id } => HostEvent::ModelDeleted(ModelDeletedPayload { file_id: id, timestamp }),
        CoreEvent::ModelTransformed { id, pose } => HostEvent::ModelTransformed(ModelTransformedPayload {
            file_id: id,
            transform: TransformData {
                position: pose.position.into(),
                rotation: pose.euler_degrees().into(),
                scale: pose.scale.into(),
            },
            timestamp,
        }),
        CoreEvent::VisualizationChanged { mode, enabled } => {
            HostEvent::VisualizationChanged(VisualizationChangedPayload { mode, enabled, timestamp })
        }
        CoreEvent::PointCaptured { kind, index, point } => HostEvent::PointCaptured(PointCapturedPayload {
            kind,
            index,
            point: point.into(),
            timestamp,
        }),
        CoreEvent::MeasurementCreated { kind, id, value } => {
            HostEvent::MeasurementCreated(MeasurementCreatedPayload {
                kind,
                measurement_id: id.0,
                value: value.is_finite().then_some(value),
                timestamp,
            })
        }
        CoreEvent::AnnotationAdded { id, position, text } => HostEvent::AnnotationAdded(AnnotationAddedPayload {
            annotation_id: id.0,
            position: position.into(),
            text,
            timestamp,
        }),
        CoreEvent::DistanceAdded { .. }
        | CoreEvent::AngleAdded { .. }
        | CoreEvent::MeasurementRemoved { .. }
        | CoreEvent::MeasurementsCleared => return None,
    };
    Some(host_event)
}

/// Cloneable handle to a running bridge task
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    requests: mpsc::Sender<BridgeRequest>,
    events: broadcast::Sender<HostEvent>,
}

impl BridgeHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    async fn request(&self, request: BridgeRequest) -> Result<(), BridgeError> {
        self.requests.send(request).await.map_err(|_| BridgeError::Closed)
    }

    /// Forward a raw text frame from the host
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), BridgeError> {
        self.request(BridgeRequest::Message(text.into())).await
    }

    pub async fn send_command(&self, command: HostCommand) -> Result<(), BridgeError> {
        self.request(BridgeRequest::Command(command)).await
    }

    /// Snapshot of every loaded model, taken on the bridge task
    pub async fn models(&self) -> Result<Vec<ModelSummary>, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.request(BridgeRequest::Snapshot(tx)).await?;
        rx.await.map_err(|_| BridgeError::Closed)
    }

    pub async fn shutdown(&self) -> Result<(), BridgeError> {
        self.request(BridgeRequest::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

