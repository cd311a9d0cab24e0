//! Account warm-up engine.
//!
//! Moves social accounts through a 30-day warm-up: a pure phase engine
//! decides what an account should be doing, the orchestrator keeps the job
//! queue stocked, and the worker pool carries jobs out under a global
//! concurrency ceiling and rate limit.

pub mod account;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod jitter;
mod lifecycle;
pub mod limiter;
pub mod orchestrator;
pub mod phase;
pub mod progress;
pub mod service;
pub mod social;
pub mod store;
pub mod worker;

pub use account::{AccountPatch, ActionRecord, ProgressLog, WarmupAccount, WarmupStatus};
pub use config::{ActionPacing, WarmupConfig};
pub use error::WarmupError;
pub use executor::{ActionExecutor, ActionOutcome};
pub use http::{HttpContentGenerator, HttpSocialClient};
pub use jitter::JitterWindow;
pub use limiter::{RateLimiter, RatePermit};
pub use orchestrator::{AccountCycle, AccountReport, Orchestrator, ScanReport, WarmupStats};
pub use phase::{
    DailyQuota, Phase, PhaseConfig, Transition, calculate_phase, config_for_status, reconcile,
    target_status,
};
pub use progress::{DailyReport, ProgressRecorder};
pub use service::WarmupService;
pub use social::{
    ContentError, ContentGenerator, GeneratedPost, Item, ReplyContext, SocialClient, SocialError,
};
pub use store::{AccountStore, LocalAccountStore, StoreError};
pub use worker::{JobOutcome, SkipReason, WorkerPool};
