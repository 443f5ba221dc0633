//! # flotilla-checks
//!
//! Filesystem-level inspections of a workspace and its checkouts:
//! compliance validation, artifact cleanup, environment diagnostics and
//! repository kind detection.

pub mod clean;
pub mod detect;
pub mod doctor;
pub mod error;
pub mod validate;

pub use clean::{clean_repo, format_size, ArtifactType, CleanOptions, CleanResult};
pub use detect::{detect_repo_kind, Confidence, DetectedKind};
pub use doctor::{run_diagnostics, DiagnosticResult, DoctorOptions, DoctorReport, Severity};
pub use error::CheckError;
pub use validate::{validate_repo, CheckKind, ValidateOptions, ValidationCheck, ValidationResult};
