//! # sp-audit backends
//!
//! Protocol clients and the audit orchestrator for comparing Silent Payments
//! tweak data across independent indexers.
//!
//! Every backend speaks one of four protocols (REST, HTTP JSON-RPC, raw TCP
//! JSON-RPC, streaming gRPC) or replays captured reference data. All clients
//! share one contract, [`BackendClient`], and return tweaks in the normalized
//! form defined by `sp-audit-core`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sp_audit_backends::Auditor;
//! use sp_audit_core::{AuditConfig, FileReferenceStore, ReferenceStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuditConfig::from_path("config.json")?;
//!     let store: Arc<dyn ReferenceStore> = Arc::new(FileReferenceStore::new(&config.reference_dir));
//!     let auditor = Auditor::new(config, store)?;
//!
//!     let result = auditor.audit_one(840_000).await;
//!     for cmp in &result.pairwise_comparisons {
//!         println!("{}: {:.1}%", cmp.pair_name, cmp.match_percentage);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auditor;
pub mod auth;
pub mod client;
pub mod error;
pub mod factory;
pub mod grpc;
pub mod http;
pub mod normalize;
pub mod rate_limit;
pub mod reference;
pub mod rpc;
pub mod socket;

pub use auditor::{Auditor, StopHandle};
pub use client::{BackendClient, CallGuard, HeightStream};
pub use error::BackendError;
pub use factory::build_client;
pub use grpc::GrpcClient;
pub use http::HttpClient;
pub use rate_limit::{LimiterStatus, RateLimiter};
pub use reference::ReferenceClient;
pub use rpc::RpcClient;
pub use socket::SocketClient;
