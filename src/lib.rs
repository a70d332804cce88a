//! # Backup Harness
//!
//! Correlates a mobile-device backup manifest with the content-addressed
//! blobs stored next to it, and harvests every URL reachable from the
//! manifest's rows, including URLs buried inside embedded binary property
//! lists.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ Manifest.db │──▶│  Normalize  │──▶│  Correlate  │──▶ queries / export
//! │  (sqlx)     │   │  + Extract  │   │  (fs index) │
//! └─────────────┘   └──────┬──────┘   └─────────────┘
//!                          │
//!                          ▼
//!                     ┌─────────┐
//!                     │ UrlSet  │──▶ urls.txt
//!                     └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bkh /backups/0000-device/Manifest.db
//! bkh /backups/0000-device/Manifest.db --domain CameraRollDomain --export
//! bkh /backups/0000-device/Manifest.db --content-type image --json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`value`] | Generic decoded value tree |
//! | [`models`] | Raw rows and manifest records |
//! | [`manifest`] | SQLite manifest loader |
//! | [`normalize`] | Row normalization and the record catalog |
//! | [`fs_index`] | Backup root walk |
//! | [`plist_decode`] | Embedded binary property list decoder |
//! | [`urls`] | URL scanning, blocklist, output file |
//! | [`extract`] | Recursive URL extractor |
//! | [`content_type`] | Content-type backends |
//! | [`correlate`] | Catalog ↔ filesystem join |
//! | [`query`] | Domain / content-type / path-hint queries |
//! | [`export`] | Copy selected blobs out |
//! | [`pipeline`] | Run orchestration |

pub mod config;
pub mod content_type;
pub mod correlate;
pub mod error;
pub mod export;
pub mod extract;
pub mod fs_index;
pub mod manifest;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod plist_decode;
pub mod query;
pub mod urls;
pub mod value;
