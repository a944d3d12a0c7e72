//! SchemaHeal engine - detection, fix pipeline and monitoring
//!
//! This crate turns an inferred schema and a live snapshot into healed DDL:
//! - Drift detection
//! - Fix synthesis and validation
//! - Transactional application with an audit log
//! - Issue persistence and the health monitor

pub mod drift_detector;
pub mod synthesizer;
pub mod validator;
pub mod applier;
pub mod reconcile;
pub mod store;
pub mod monitor;

pub use drift_detector::DriftDetector;
pub use synthesizer::{FixSynthesizer, SynthesisError};
pub use validator::{Approval, FixValidator, ValidatedFix, ValidationError};
pub use applier::{ApplyError, FixApplier};
pub use reconcile::reconcile;
pub use store::{IssueStore, JsonFileStore, MemoryStore, StoreError};
pub use monitor::{CycleError, HealthMonitor, IssueView, MonitorError, MonitorState, MonitorStatus, ScanTicket};
