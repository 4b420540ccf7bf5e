//! Core services for the dispatcher.

pub mod arr;
pub mod dispatcher;
pub mod notify;
pub mod qbittorrent;
pub mod quality;
pub mod scorer;
pub mod tracker;

pub use dispatcher::{Dispatcher, RoutingPlane};
pub use notify::{Event, Notifier, NotifyError};
pub use qbittorrent::{NodeBackend, NodeError, QbittorrentClient};
pub use quality::{QualityAdvisor, QualitySuggestion};
pub use tracker::RequestTracker;
