//! Motion activity classification
//!
//! Turns raw accelerometer samples into a coarse activity gate for the step
//! pipeline. The classifier owns the single latest [`ActivitySample`];
//! consumers read it by value.

pub mod classifier;
pub mod feed;

pub use classifier::ActivityClassifier;
pub use feed::ClassifierFeed;
