//! HTTP inference service for loan default scoring and customer segmentation.
//!
//! Artifacts are loaded once into an [`AppState`]; the router then serves
//! stateless handlers over it.

pub mod banking;
pub mod error;
pub mod features;
pub mod models;
pub mod routes;
pub mod state;

pub use error::{AppError, InferenceError};
pub use features::FeatureRow;
pub use models::{ClusterAssigner, FeatureScaler, ModelSet, Scorer};
pub use routes::router;
pub use state::AppState;
