use serde::{Deserialize, Serialize};

/// A catalog record as exchanged with the REST API.
///
/// `id` is `None` only for a record that has not been persisted remotely yet.
/// Values are immutable: every mutation builds a new instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Durable photo URL in the blob store, or empty when the record has no photo.
    #[serde(rename = "imageUrl", default)]
    pub image_url: String,
    pub year: String,
    pub name: String,
    pub licence: String,
    #[serde(default)]
    pub place: Location,
}

/// Where the car was registered. The wire field is named `long`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    #[serde(rename = "long")]
    pub lng: f64,
}

impl Car {
    /// Non-empty persisted id, if any.
    pub fn persisted_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }
}
