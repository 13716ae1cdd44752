//! Application layer orchestrating a remittance.
//!
//! `RateEngine` and `SettingsCache` are shared, long-lived services; the
//! `calculator` turns them into quotes; `RemittanceFlow` owns one draft and
//! drives it through the `SubmissionPipeline`.

pub mod calculator;
pub mod flow;
pub mod pipeline;
pub mod rate_engine;
pub mod settings_cache;
