//! carkeep — catalog client for cars with deduplicated photo uploads.
//!
//! Talks to a REST catalog API for record CRUD and to a Firebase-style blob
//! store for photos. Photo uploads are deduplicated by content hash through a
//! persistent local cache, and the displayed list is reconciled in place
//! after each mutation instead of being refetched.

#![warn(clippy::all)]

mod api;
mod blob;
mod cache;
mod cli;
mod config;
mod reconcile;
mod types;
mod upload;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use api::{RecordClient, Resource};
use blob::{BlobStore, FirebaseStore};
use cache::{SqliteUploadCache, UploadCache};
use cli::{CacheCommand, Cli, Command};
use config::Config;
use reconcile::{ListEvent, ListReconciler};
use types::{Car, Location};
use upload::AssetCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_cli(&cli);
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    let client = RecordClient::new(http.clone(), config.api_base_url.clone());
    let store = Arc::new(FirebaseStore::new(http, config.bucket.clone()));

    match cli.command {
        Command::List => list_cars(&client).await,
        Command::Show { id } => show_car(&client, &id).await,
        Command::Add {
            name,
            year,
            licence,
            photo,
            lat,
            lng,
        } => {
            add_car(
                &config,
                &client,
                store,
                Car {
                    id: None,
                    image_url: String::new(),
                    year,
                    name,
                    licence,
                    place: Location { lat, lng },
                },
                photo,
            )
            .await
        }
        Command::Update {
            id,
            name,
            year,
            licence,
            photo,
            lat,
            lng,
        } => update_car(&config, &client, store, id, name, year, licence, photo, lat, lng).await,
        Command::Delete { id } => delete_car(&client, store, &id).await,
        Command::Cache(command) => cache_command(&config, command).await,
    }
}

async fn list_cars(client: &RecordClient) -> anyhow::Result<()> {
    let cars = client.list().await.into_result().map_err(anyhow::Error::msg)?;
    let mut view = ListReconciler::new();
    view.replace_all(cars);
    print_view(&view, None);
    Ok(())
}

async fn show_car(client: &RecordClient, id: &str) -> anyhow::Result<()> {
    let car = client.fetch(id).await.into_result().map_err(anyhow::Error::msg)?;
    println!("{}", format_car(&car));
    Ok(())
}

async fn add_car(
    config: &Config,
    client: &RecordClient,
    store: Arc<FirebaseStore>,
    mut car: Car,
    photo: String,
) -> anyhow::Result<()> {
    // Snapshot the current view first: the mutation is applied to it
    // optimistically instead of refetching afterwards.
    let mut view = current_view(client).await;

    if !photo.is_empty() {
        let assets = open_asset_cache(config, store).await?;
        car.image_url = assets.resolve(&photo, "").await?;
    }

    let saved = client
        .create(&car)
        .await
        .into_result()
        .map_err(anyhow::Error::msg)?;

    let event = view.insert(saved);
    println!("Carro salvo com sucesso!");
    print_view(&view, Some(&event));
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn update_car(
    config: &Config,
    client: &RecordClient,
    store: Arc<FirebaseStore>,
    id: String,
    name: Option<String>,
    year: Option<String>,
    licence: Option<String>,
    photo: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
) -> anyhow::Result<()> {
    let current = client
        .fetch(&id)
        .await
        .into_result()
        .map_err(anyhow::Error::msg)?;
    let mut view = current_view(client).await;

    let image_url = match photo {
        Some(photo) if !photo.is_empty() => {
            let assets = open_asset_cache(config, store).await?;
            assets.resolve(&photo, &current.image_url).await?
        }
        _ => current.image_url.clone(),
    };

    let car = Car {
        id: Some(id.clone()),
        image_url,
        year: year.unwrap_or_else(|| current.year.clone()),
        name: name.unwrap_or_else(|| current.name.clone()),
        licence: licence.unwrap_or_else(|| current.licence.clone()),
        place: Location {
            lat: lat.unwrap_or(current.place.lat),
            lng: lng.unwrap_or(current.place.lng),
        },
    };

    let saved = client
        .update(&id, &car)
        .await
        .into_result()
        .map_err(anyhow::Error::msg)?;

    println!("Carro atualizado com sucesso!");
    if let Some(event) = view.update(saved) {
        print_view(&view, Some(&event));
    }
    Ok(())
}

async fn delete_car(
    client: &RecordClient,
    store: Arc<FirebaseStore>,
    id: &str,
) -> anyhow::Result<()> {
    let current = client
        .fetch(id)
        .await
        .into_result()
        .map_err(anyhow::Error::msg)?;
    let mut view = current_view(client).await;

    // The photo goes with the record; a failed blob cleanup must not block
    // the delete itself.
    if !current.image_url.is_empty() && store.is_store_url(&current.image_url) {
        if let Err(e) = store.delete(&current.image_url).await {
            tracing::warn!(url = %current.image_url, error = %e, "Failed to delete the record's photo");
        }
    }

    client
        .delete(id)
        .await
        .into_result()
        .map_err(anyhow::Error::msg)?;

    println!("Carro excluído com sucesso!");
    if let Some(event) = view.remove(id) {
        print_view(&view, Some(&event));
    }
    Ok(())
}

async fn cache_command(config: &Config, command: CacheCommand) -> anyhow::Result<()> {
    let cache = open_cache(config).await?;
    match command {
        CacheCommand::Status => {
            let status = cache.status().await?;
            match status.newest_upload {
                Some(ts) => println!(
                    "{} entradas, último upload em {}",
                    status.entries,
                    ts.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                None => println!("{} entradas", status.entries),
            }
        }
        CacheCommand::Clear => {
            let removed = cache.clear().await?;
            println!("Cache de uploads limpo ({removed} entradas removidas).");
        }
    }
    Ok(())
}

/// Fetch the full list for display. An unreachable list only degrades the
/// printed view; the mutation itself still reports its own outcome.
async fn current_view(client: &RecordClient) -> ListReconciler {
    let mut view = ListReconciler::new();
    match client.list().await {
        Resource::Success(cars) => {
            view.replace_all(cars);
        }
        Resource::Error(message) => {
            tracing::warn!(%message, "Could not load the current list");
        }
    }
    view
}

async fn open_cache(config: &Config) -> anyhow::Result<SqliteUploadCache> {
    if let Some(parent) = config.cache_db.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(SqliteUploadCache::open(&config.cache_db).await?)
}

async fn open_asset_cache(
    config: &Config,
    store: Arc<FirebaseStore>,
) -> anyhow::Result<AssetCache> {
    let cache = Arc::new(open_cache(config).await?);
    let assets = AssetCache::new(store, cache);
    Ok(if config.serialize_identical_uploads {
        assets.serialize_identical_uploads()
    } else {
        assets
    })
}

fn print_view(view: &ListReconciler, event: Option<&ListEvent>) {
    if let Some(ListEvent::Removed(index)) = event {
        println!("  (removido da posição {index})");
    }
    if view.is_empty() {
        println!("(catálogo vazio)");
        return;
    }
    for (index, car) in view.records().iter().enumerate() {
        let marker = match event {
            Some(ListEvent::Inserted(i)) | Some(ListEvent::Updated(i)) if *i == index => '*',
            _ => ' ',
        };
        println!("{marker} {}", format_car(car));
    }
}

fn format_car(car: &Car) -> String {
    let photo = if car.image_url.is_empty() {
        String::new()
    } else {
        format!(" | {}", car.image_url)
    };
    format!(
        "[{}] {} ({}) placa {} | lat {:.6}, long {:.6}{photo}",
        car.id.as_deref().unwrap_or("-"),
        car.name,
        car.year,
        car.licence,
        car.place.lat,
        car.place.lng,
    )
}
