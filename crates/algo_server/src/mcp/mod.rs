use std::sync::Arc;

use algos::{ParameterMap, ResultKey, ResultValue};
use rmcp::{
    model::{CallToolResult, Content, ErrorCode, ServerCapabilities, ServerInfo},
    schemars, tool, Error as McpError, ServerHandler,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    codec,
    error::{CodecError, ErrorKind, SessionError},
    session::Session,
};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AlgorithmNameRequest {
    #[schemars(description = "Algorithm name, as listed by list_algorithms")]
    pub name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImageDataRequest {
    #[schemars(description = "Base64 encoded image file (PNG, TIFF or JPEG)")]
    pub data: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ImagePathRequest {
    #[schemars(description = "Path to the image file")]
    pub path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetParametersRequest {
    #[schemars(description = "Algorithm to select")]
    pub algorithm: String,
    #[schemars(description = "Parameter values keyed by parameter name")]
    #[serde(default)]
    pub parameters: Option<ParameterMap>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetParametersRequest {
    #[schemars(description = "Algorithm whose parameters to read; must be the current selection")]
    pub algorithm: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ResultRequest {
    #[schemars(description = "Result key: image, mask or features")]
    pub key: ResultKey,
}

/// Response category of a failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    NotFound,
    BadRequest,
    UnsupportedMedia,
    InternalError,
}

impl From<ErrorKind> for StatusCategory {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::UnknownAlgorithm | ErrorKind::NoResultAvailable => Self::NotFound,
            ErrorKind::InvalidParameters
            | ErrorKind::NoAlgorithmSelected
            | ErrorKind::NoImageLoaded
            | ErrorKind::StaleResult => Self::BadRequest,
            ErrorKind::UnsupportedMediaType => Self::UnsupportedMedia,
            ErrorKind::AlgorithmExecutionFailure | ErrorKind::InternalError => Self::InternalError,
        }
    }
}

impl StatusCategory {
    fn code(self) -> ErrorCode {
        match self {
            Self::NotFound => ErrorCode::RESOURCE_NOT_FOUND,
            Self::BadRequest | Self::UnsupportedMedia => ErrorCode::INVALID_PARAMS,
            Self::InternalError => ErrorCode::INTERNAL_ERROR,
        }
    }
}

/// Tool error carrying the stable kind identifier in its data
fn tool_error(kind: ErrorKind, error: &dyn std::error::Error) -> McpError {
    let category = StatusCategory::from(kind);
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(&format!(": {cause}"));
        source = cause.source();
    }
    McpError::new(category.code(), message, Some(json!({ "kind": kind, "category": category })))
}

impl From<SessionError> for McpError {
    fn from(error: SessionError) -> Self {
        tool_error(error.kind(), &error)
    }
}

impl From<CodecError> for McpError {
    fn from(error: CodecError) -> Self {
        tool_error(error.kind(), &error)
    }
}

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| tool_error(ErrorKind::InternalError, &e))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

fn message(text: String) -> Result<CallToolResult, McpError> {
    json_result(json!({ "message": text }))
}

/// MCP server exposing the analysis session
#[derive(Clone)]
pub struct AlgoMcpServer {
    session: Arc<Session>,
}

impl AlgoMcpServer {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[tool(tool_box)]
impl AlgoMcpServer {
    #[tool(description = "List the names of the available algorithms")]
    fn list_algorithms(&self) -> Result<CallToolResult, McpError> {
        json_result(json!({ "algos_names": self.session.registry().names() }))
    }

    #[tool(description = "Get the full descriptor of an algorithm: id, description, input format, parameters and outputs")]
    fn describe_algorithm(
        &self,
        #[tool(aggr)] AlgorithmNameRequest { name }: AlgorithmNameRequest,
    ) -> Result<CallToolResult, McpError> {
        let descriptor = self
            .session
            .registry()
            .describe(&name)
            .ok_or(SessionError::UnknownAlgorithm(name))?;
        json_result(json!(descriptor))
    }

    #[tool(description = "Get the parameters an algorithm requires")]
    fn required_parameters(
        &self,
        #[tool(aggr)] AlgorithmNameRequest { name }: AlgorithmNameRequest,
    ) -> Result<CallToolResult, McpError> {
        let registry = self.session.registry();
        if !registry.contains(&name) {
            return Err(SessionError::UnknownAlgorithm(name).into());
        }
        json_result(json!({ "parameters": registry.required_parameters(&name) }))
    }

    #[tool(description = "Send the image to analyse as a base64 encoded image file")]
    fn send_image(
        &self,
        #[tool(aggr)] ImageDataRequest { data }: ImageDataRequest,
    ) -> Result<CallToolResult, McpError> {
        let image = codec::decode_image(&data)?;
        let (width, height) = (image.width(), image.height());
        self.session.set_image(image);
        message(format!("Image loaded ({width}x{height})"))
    }

    #[tool(description = "Load the image to analyse from a file path")]
    fn load_image(
        &self,
        #[tool(aggr)] ImagePathRequest { path }: ImagePathRequest,
    ) -> Result<CallToolResult, McpError> {
        let image = codec::load_image(&path)?;
        self.session.set_image(image);
        message(format!("Image loaded successfully from {path}"))
    }

    #[tool(description = "Select an algorithm; clears any parameters and result")]
    fn select_algorithm(
        &self,
        #[tool(aggr)] AlgorithmNameRequest { name }: AlgorithmNameRequest,
    ) -> Result<CallToolResult, McpError> {
        let algorithm = self.session.select_algorithm(&name)?;
        message(format!("Algorithm {algorithm} selected"))
    }

    #[tool(description = "Select an algorithm and set its parameters; every required parameter must be present")]
    fn set_parameters(
        &self,
        #[tool(aggr)] SetParametersRequest { algorithm, parameters }: SetParametersRequest,
    ) -> Result<CallToolResult, McpError> {
        self.session.select_algorithm(&algorithm)?;
        let parameters = parameters.unwrap_or_default();
        self.session.set_parameters(parameters.clone())?;
        json_result(json!(parameters))
    }

    #[tool(description = "Get the parameters set for the selected algorithm")]
    fn get_parameters(
        &self,
        #[tool(aggr)] GetParametersRequest { algorithm }: GetParametersRequest,
    ) -> Result<CallToolResult, McpError> {
        let selected = self.session.selected_algorithm();
        if selected.map(|kind| kind.to_string()).as_deref() != Some(algorithm.as_str()) {
            return Err(McpError::new(
                ErrorCode::RESOURCE_NOT_FOUND,
                format!("Algorithm {algorithm} is not the selected algorithm"),
                Some(json!({
                    "kind": ErrorKind::NoAlgorithmSelected,
                    "category": StatusCategory::NotFound,
                })),
            ));
        }
        json_result(json!(self.session.parameters().unwrap_or_default()))
    }

    #[tool(description = "Run the selected algorithm on the loaded image")]
    async fn process(&self) -> Result<CallToolResult, McpError> {
        let results = self.session.process().await?;
        json_result(json!({
            "algorithm": self.session.selected_algorithm(),
            "results": results,
        }))
    }

    #[tool(description = "Get a result: image or mask as a base64 PNG (masks are 16-bit), features as GeoJSON")]
    fn get_result(
        &self,
        #[tool(aggr)] ResultRequest { key }: ResultRequest,
    ) -> Result<CallToolResult, McpError> {
        match self.session.result(key)? {
            ResultValue::Image(image) => json_result(json!({ "data": codec::encode_image(&image)? })),
            ResultValue::Mask(mask) => json_result(json!({ "data": codec::encode_mask(&mask)? })),
            ResultValue::Features(features) => feature_collection(&features),
        }
    }

    #[tool(description = "Get the detected objects as a GeoJSON FeatureCollection")]
    fn get_features(&self) -> Result<CallToolResult, McpError> {
        match self.session.result(ResultKey::Features)? {
            ResultValue::Features(features) => feature_collection(&features),
            _ => Err(SessionError::NoResultAvailable { key: ResultKey::Features }.into()),
        }
    }

    #[tool(description = "Get the session state, selected algorithm, parameters and available results")]
    fn session_status(&self) -> Result<CallToolResult, McpError> {
        json_result(json!(self.session.status()))
    }

    #[tool(description = "Delete the image, selection, parameters and result")]
    fn delete_image(&self) -> Result<CallToolResult, McpError> {
        self.session.clear();
        message("Session cleared".to_string())
    }
}

fn feature_collection(features: &[mask::PolygonFeature]) -> Result<CallToolResult, McpError> {
    let collection = mask::features_to_geojson(features)
        .map_err(|e| tool_error(ErrorKind::InternalError, &e))?;
    json_result(json!(collection))
}

#[tool(tool_box)]
impl ServerHandler for AlgoMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("Image analysis server - send an image, select an algorithm and its parameters, process, then fetch the label mask, derived image or GeoJSON features of the detected objects.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
