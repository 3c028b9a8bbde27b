pub mod config;
pub mod http;

pub use config::{ArtifactConfig, ModelsConfig, ServerConfig, ServiceConfig};
pub use http::{
    ArtifactInfo, DefaultRiskResponse, ErrorResponse, HealthResponse, InfoResponse, RecommendRequest,
    RecommendResponse, RiskLevel, SegmentResponse,
};
