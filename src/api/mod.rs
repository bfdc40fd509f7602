//! Remote catalog API.
//!
//! `RecordClient` performs the five CRUD calls against the `car` resource;
//! every outcome crosses the `Resource` classification boundary, so nothing
//! above this module ever sees a raw transport error.

pub mod client;
pub mod resource;

pub use client::RecordClient;
pub use resource::Resource;
