//! ClawScore — security scoring for marketplace AI skills.
//!
//! Every skill gets a 0–100 security score built from six independent
//! dimensions (permissions, author trust, network surface, community
//! votes, auditability, malware scan) and a letter grade from S down
//! to D. The scorer itself is a pure function over whatever signals
//! are available; separate drivers refresh individual dimensions in
//! bulk as new scan reports or author data arrive.
//!
//! Uses structured logging via [`tracing`]. Set the `RUST_LOG`
//! environment variable to control log verbosity (e.g.,
//! `RUST_LOG=clawscore=debug`).

pub mod github;
pub mod ingest;
pub mod patterns;
pub mod profile;
pub mod report;
pub mod rescore;
pub mod scan;
pub mod scorer;
pub mod skillmd;
pub mod store;

pub use profile::SkillSecurityProfile;
pub use scorer::{
    compute_security_score, SecurityGrade, SecurityScoreInput, SecurityScoreOutput,
};
