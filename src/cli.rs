use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "carkeep", about = "Catalog client for cars with deduplicated photo uploads")]
pub struct Cli {
    /// Base URL of the catalog API
    #[arg(long, env = "CARKEEP_API_URL")]
    pub api_url: String,

    /// Storage bucket holding car photos
    #[arg(long, env = "CARKEEP_BUCKET", default_value = "carkeep.appspot.com")]
    pub bucket: String,

    /// Path of the local upload dedup cache
    #[arg(long, default_value = "~/.carkeep/uploads.db")]
    pub cache_db: String,

    /// Block a second concurrent upload of byte-identical content until the
    /// first finishes, so it reuses the first upload's URL
    #[arg(long)]
    pub serialize_identical_uploads: bool,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every car in the catalog
    List,

    /// Show a single car
    Show { id: String },

    /// Add a new car
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        year: String,
        #[arg(long)]
        licence: String,
        /// Local image path, or an existing store URL
        #[arg(long, default_value = "")]
        photo: String,
        #[arg(long, default_value_t = 0.0)]
        lat: f64,
        #[arg(long, default_value_t = 0.0)]
        lng: f64,
    },

    /// Update an existing car; omitted fields keep their current value
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        licence: Option<String>,
        /// Local image path, or an existing store URL
        #[arg(long)]
        photo: Option<String>,
        #[arg(long)]
        lat: Option<f64>,
        #[arg(long)]
        lng: Option<f64>,
    },

    /// Delete a car (and its photo, best-effort)
    Delete { id: String },

    /// Inspect or wipe the upload dedup cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Entry count and newest upload time
    Status,
    /// Remove every entry
    Clear,
}
