pub mod file;
pub mod http;
pub mod metrics;

pub use self::file::{StatFileWriter, StatSnapshot};
pub use self::http::ExportServer;
pub use self::metrics::EngineMetrics;
