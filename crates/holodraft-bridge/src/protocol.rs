//! Host bridge wire protocol
//!
//! Every message in either direction is an envelope `{type, data}`. Inbound
//! `data` may be a JSON object or a string holding one, since browser hosts
//! often pass payloads pre-serialized.

use chrono::{DateTime, Utc};
use glam::DVec3;
use holodraft_core::{MeasurementKind, Rgba, VisualizationMode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BridgeError;

/// Raw `{type, data}` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3Data {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Vector3Data {
    pub fn one() -> Self {
        Self { x: 1.0, y: 1.0, z: 1.0 }
    }
}

impl From<Vector3Data> for DVec3 {
    fn from(v: Vector3Data) -> Self {
        DVec3::new(v.x, v.y, v.z)
    }
}

impl From<DVec3> for Vector3Data {
    fn from(v: DVec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorData {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    #[serde(default = "default_alpha")]
    pub a: f32,
}

fn default_alpha() -> f32 {
    1.0
}

impl Default for ColorData {
    fn default() -> Self {
        Self {
            r: 1.0,
            g: 1.0,
            b: 1.0,
            a: 1.0,
        }
    }
}

impl From<ColorData> for Rgba {
    fn from(c: ColorData) -> Self {
        Rgba::new(c.r, c.g, c.b, c.a)
    }
}

// ============================================================================
// Inbound requests
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadModelRequest {
    pub file_id: String,
    #[serde(default)]
    pub file_name: String,
    pub download_url: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformModelRequest {
    pub file_id: String,
    #[serde(default)]
    pub position: Vector3Data,
    /// Euler angles in degrees
    #[serde(default)]
    pub rotation: Vector3Data,
    #[serde(default = "Vector3Data::one")]
    pub scale: Vector3Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMaterialRequest {
    pub file_id: String,
    #[serde(default = "default_material_name")]
    pub material_name: String,
    #[serde(default)]
    pub color: ColorData,
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "default_roughness")]
    pub roughness: f32,
}

fn default_material_name() -> String {
    holodraft_core::ALL_MATERIALS.to_string()
}

fn default_roughness() -> f32 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartArSessionRequest {
    pub file_id: String,
    pub enable_hand_tracking: bool,
    pub enable_collaboration: bool,
    pub collaboration_room_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportModelRequest {
    pub file_id: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub include_animations: bool,
    #[serde(default = "default_true")]
    pub include_materials: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelIdRequest {
    pub file_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightModelRequest {
    pub file_id: String,
    #[serde(default = "default_true")]
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMeasurementRequest {
    pub kind: MeasurementKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementClickRequest {
    pub point: Vector3Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddAnnotationRequest {
    pub position: Vector3Data,
    pub text: String,
}

/// Decoded inbound host command
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    LoadModel(LoadModelRequest),
    TransformModel(TransformModelRequest),
    UpdateMaterial(UpdateMaterialRequest),
    StartArSession(StartArSessionRequest),
    StopArSession,
    ExportModel(ExportModelRequest),
    SelectModel(ModelIdRequest),
    DeleteModel(ModelIdRequest),
    HighlightModel(HighlightModelRequest),
    ToggleWireframe,
    ToggleExplodedView,
    ToggleCrossSection,
    StartMeasurement(StartMeasurementRequest),
    StopMeasurement,
    MeasurementClick(MeasurementClickRequest),
    AddAnnotation(AddAnnotationRequest),
    ClearMeasurements,
}

impl HostCommand {
    /// Decode a text frame holding one envelope
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| BridgeError::malformed("envelope", e))?;
        Self::from_envelope(envelope)
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, BridgeError> {
        let Envelope { kind, data } = envelope;
        let command = match kind.as_str() {
            "LoadModel" | "LoadCADModel" => {
                let req: LoadModelRequest = payload(&kind, data)?;
                require(&kind, "fileId", &req.file_id)?;
                require(&kind, "downloadUrl", &req.download_url)?;
                HostCommand::LoadModel(req)
            }
            "TransformModel" => {
                let req: TransformModelRequest = payload(&kind, data)?;
                require(&kind, "fileId", &req.file_id)?;
                HostCommand::TransformModel(req)
            }
            "UpdateMaterial" | "UpdateModelMaterial" => {
                let req: UpdateMaterialRequest = payload(&kind, data)?;
                require(&kind, "fileId", &req.file_id)?;
                HostCommand::UpdateMaterial(req)
            }
            "StartARSession" => HostCommand::StartArSession(payload(&kind, data)?),
            "StopARSession" => HostCommand::StopArSession,
            "ExportModel" => {
                let req: ExportModelRequest = payload(&kind, data)?;
                require(&kind, "fileId", &req.file_id)?;
                HostCommand::ExportModel(req)
            }
            "SelectModel" => HostCommand::SelectModel(model_id(&kind, data)?),
            "DeleteModel" => HostCommand::DeleteModel(model_id(&kind, data)?),
            "HighlightModel" => {
                let req: HighlightModelRequest = payload(&kind, data)?;
                require(&kind, "fileId", &req.file_id)?;
                HostCommand::HighlightModel(req)
            }
            "ToggleWireframe" => HostCommand::ToggleWireframe,
            "ToggleExplodedView" => HostCommand::ToggleExplodedView,
            "ToggleCrossSection" => HostCommand::ToggleCrossSection,
            "StartMeasurement" => HostCommand::StartMeasurement(payload(&kind, data)?),
            "StopMeasurement" => HostCommand::StopMeasurement,
            "MeasurementClick" => HostCommand::MeasurementClick(payload(&kind, data)?),
            "AddAnnotation" => HostCommand::AddAnnotation(payload(&kind, data)?),
            "ClearMeasurements" => HostCommand::ClearMeasurements,
            _ => return Err(BridgeError::UnknownCommand(kind)),
        };
        Ok(command)
    }

    /// Canonical command name
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::LoadModel(_) => "LoadModel",
            HostCommand::TransformModel(_) => "TransformModel",
            HostCommand::UpdateMaterial(_) => "UpdateMaterial",
            HostCommand::StartArSession(_) => "StartARSession",
            HostCommand::StopArSession => "StopARSession",
            HostCommand::ExportModel(_) => "ExportModel",
            HostCommand::SelectModel(_) => "SelectModel",
            HostCommand::DeleteModel(_) => "DeleteModel",
            HostCommand::HighlightModel(_) => "HighlightModel",
            HostCommand::ToggleWireframe => "ToggleWireframe",
            HostCommand::ToggleExplodedView => "ToggleExplodedView",
            HostCommand::ToggleCrossSection => "ToggleCrossSection",
            HostCommand::StartMeasurement(_) => "StartMeasurement",
            HostCommand::StopMeasurement => "StopMeasurement",
            HostCommand::MeasurementClick(_) => "MeasurementClick",
            HostCommand::AddAnnotation(_) => "AddAnnotation",
            HostCommand::ClearMeasurements => "ClearMeasurements",
        }
    }
}

fn payload<T: DeserializeOwned>(command: &str, data: Value) -> Result<T, BridgeError> {
    let data = match data {
        Value::String(text) => {
            serde_json::from_str(&text).map_err(|e| BridgeError::malformed(command, e))?
        }
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(data).map_err(|e| BridgeError::malformed(command, e))
}

fn model_id(command: &str, data: Value) -> Result<ModelIdRequest, BridgeError> {
    let req: ModelIdRequest = payload(command, data)?;
    require(command, "fileId", &req.file_id)?;
    Ok(req)
}

fn require(command: &str, field: &'static str, value: &str) -> Result<(), BridgeError> {
    if value.trim().is_empty() {
        return Err(BridgeError::MissingField {
            command: command.to_string(),
            field,
        });
    }
    Ok(())
}

// ============================================================================
// Outbound events
// ============================================================================

/// Load pipeline milestone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Starting,
    Downloading,
    Processing,
    Loading,
    Complete,
    Error,
}

impl LoadStatus {
    /// Progress fraction reported with this milestone
    pub fn progress(self) -> f32 {
        match self {
            LoadStatus::Starting | LoadStatus::Error => 0.0,
            LoadStatus::Downloading => 0.1,
            LoadStatus::Processing => 0.5,
            LoadStatus::Loading => 0.7,
            LoadStatus::Complete => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub status: String,
    pub features: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadProgressPayload {
    pub file_id: String,
    pub progress: f32,
    pub status: LoadStatus,
    /// Machine-readable failure reason, only with `status: "error"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    pub position: Vector3Data,
    /// Euler angles in degrees
    pub rotation: Vector3Data,
    pub scale: Vector3Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelTransformedPayload {
    pub file_id: String,
    pub transform: TransformData,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArSessionStatusPayload {
    pub is_active: bool,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelExportedPayload {
    pub file_id: String,
    pub export_url: Option<String>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSelectedPayload {
    pub file_id: String,
    pub selected: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDeletedPayload {
    pub file_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCapturedPayload {
    pub kind: MeasurementKind,
    pub index: usize,
    pub point: Vector3Data,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementCreatedPayload {
    pub kind: MeasurementKind,
    pub measurement_id: u64,
    /// Metres for distances, degrees for angles; null when undefined
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationAddedPayload {
    pub annotation_id: u64,
    pub position: Vector3Data,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationChangedPayload {
    pub mode: VisualizationMode,
    pub enabled: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Outbound event sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HostEvent {
    #[serde(rename = "onUnityReady")]
    Ready(ReadyPayload),
    #[serde(rename = "onModelLoadProgress")]
    LoadProgress(LoadProgressPayload),
    #[serde(rename = "onModelTransformed")]
    ModelTransformed(ModelTransformedPayload),
    #[serde(rename = "onARSessionStatus")]
    ArSessionStatus(ArSessionStatusPayload),
    #[serde(rename = "onModelExported")]
    ModelExported(ModelExportedPayload),
    #[serde(rename = "onModelSelected")]
    ModelSelected(ModelSelectedPayload),
    #[serde(rename = "onModelDeleted")]
    ModelDeleted(ModelDeletedPayload),
    #[serde(rename = "onPointCaptured")]
    PointCaptured(PointCapturedPayload),
    #[serde(rename = "onMeasurementCreated")]
    MeasurementCreated(MeasurementCreatedPayload),
    #[serde(rename = "onAnnotationAdded")]
    AnnotationAdded(AnnotationAddedPayload),
    #[serde(rename = "onVisualizationChanged")]
    VisualizationChanged(VisualizationChangedPayload),
    #[serde(rename = "onBridgeError")]
    BridgeError(BridgeErrorPayload),
}

/// Capabilities announced in the ready event
pub const FEATURES: &[&str] = &["modelLoading", "editing", "measurement", "annotation", "arSession"];

impl HostEvent {
    pub fn ready() -> Self {
        HostEvent::Ready(ReadyPayload {
            status: "ready".to_string(),
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
            timestamp: Utc::now(),
        })
    }

    pub fn progress(file_id: impl Into<String>, status: LoadStatus) -> Self {
        HostEvent::LoadProgress(LoadProgressPayload {
            file_id: file_id.into(),
            progress: status.progress(),
            status,
            error: None,
            timestamp: Utc::now(),
        })
    }

    pub fn load_error(file_id: impl Into<String>, code: impl Into<String>) -> Self {
        HostEvent::LoadProgress(LoadProgressPayload {
            file_id: file_id.into(),
            progress: LoadStatus::Error.progress(),
            status: LoadStatus::Error,
            error: Some(code.into()),
            timestamp: Utc::now(),
        })
    }

    pub fn ar_status(is_active: bool, session_id: Option<String>) -> Self {
        HostEvent::ArSessionStatus(ArSessionStatusPayload {
            is_active,
            session_id,
            timestamp: Utc::now(),
        })
    }

    pub fn exported(file_id: impl Into<String>, export_url: Option<String>) -> Self {
        HostEvent::ModelExported(ModelExportedPayload {
            file_id: file_id.into(),
            success: export_url.is_some(),
            export_url,
            timestamp: Utc::now(),
        })
    }

    pub fn bridge_error(error: &BridgeError) -> Self {
        HostEvent::BridgeError(BridgeErrorPayload {
            code: error.code().to_string(),
            message: error.to_string(),
            command: error.command().map(str::to_string),
            timestamp: Utc::now(),
        })
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::Ready(_) => "onUnityReady",
            HostEvent::LoadProgress(_) => "onModelLoadProgress",
            HostEvent::ModelTransformed(_) => "onModelTransformed",
            HostEvent::ArSessionStatus(_) => "onARSessionStatus",
            HostEvent::ModelExported(_) => "onModelExported",
            HostEvent::ModelSelected(_) => "onModelSelected",
            HostEvent::ModelDeleted(_) => "onModelDeleted",
            HostEvent::PointCaptured(_) => "onPointCaptured",
            HostEvent::MeasurementCreated(_) => "onMeasurementCreated",
            HostEvent::AnnotationAdded(_) => "onAnnotationAdded",
            HostEvent::VisualizationChanged(_) => "onVisualizationChanged",
            HostEvent::BridgeError(_) => "onBridgeError",
        }
    }
}
