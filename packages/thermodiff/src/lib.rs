pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod fir;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod source;
pub mod types;

pub use config::{AcquisitionConfig, ChannelMode, DEFAULT_COEFFICIENTS};
pub use controller::SessionController;
pub use engine::DifferenceEngine;
pub use error::{AcquisitionError, Result};
pub use fir::FirFilter;
pub use protocol::{HostCommand, Message};
pub use session::{Session, SessionState};
pub use sink::{CsvRecordSink, DisplayPoint, DisplaySink, NullDisplay, NullRecordSink, RecordSink, TimeWindow};
pub use source::{LineSource, QueueLineSource};
pub use types::*;
