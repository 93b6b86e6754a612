pub mod config;
pub mod http;
pub mod labels;
pub mod rooms;

pub use config::MetricsConfig;
pub use http::MetricsServer;
pub use labels::{BoundedLabel, LabelPolicy};
pub use rooms::RoomMetricsImpl;
