//! Cloud uploads: when to send, and where to.

pub mod adafruit;
pub mod scheduler;

pub use adafruit::{AdafruitClient, FeedClient, FeedInfo, FeedUploader, LoggingFeedClient};
pub use scheduler::UploadScheduler;
