//! capex-dashboard - CapEx aggregation, ROI scoring, and the planning dashboard API.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod artifacts;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod routes;
pub mod session;

pub use artifacts::{Artifacts, LabelEncoder, MarketEncoder, RoiScorer};
pub use data::{load_records, Measure, Measures, Record};
pub use error::ApiError;
pub use pipeline::{Group, GroupKey, Pipeline, PipelineError, PipelineRun};
pub use report::{DashboardReport, ReportFormat};
pub use routes::{build_router, AppState};
pub use session::{Session, SessionManager};
