use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use quinta_scout::activity::{ActivityKind, ActivityQuery};
use quinta_scout::extraction::backend::DEFAULT_SEARCH_ENDPOINT;
use quinta_scout::extraction::{GeminiExtractor, HttpSearchBackend};
use quinta_scout::filter::{filter_and_sort, ListingFilter};
use quinta_scout::models::Listing;
use quinta_scout::store::Store;
use quinta_scout::tracker::{ListingEdit, ManualEntry};
use quinta_scout::{Reconciliation, Tracker};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quinta-scout")]
#[command(about = "Track and rank country-house rental listings")]
struct Cli {
    /// Directory holding listings, settings and the activity log
    #[arg(long, env = "QUINTA_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show listings, best score first
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long = "amenity")]
        amenities: Vec<String>,
        #[arg(long, default_value_t = 120)]
        max_proximity: u32,
        #[arg(long, default_value_t = 8)]
        min_capacity: u32,
        /// Keep the "new" flags instead of marking everything as seen
        #[arg(long)]
        keep_new: bool,
    },

    /// Search every configured site through the search service
    Search {
        #[arg(long, env = "QUINTA_SEARCH_ENDPOINT", default_value = DEFAULT_SEARCH_ENDPOINT)]
        endpoint: String,
    },

    /// Extract listings from a saved page (HTML or text)
    Ingest { file: PathBuf },

    /// Reconcile a JSON array of already extracted records
    Import { file: PathBuf },

    /// Add a listing by hand
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long = "image")]
        images: Vec<String>,
        #[arg(long = "amenity")]
        amenities: Vec<String>,
        #[arg(long, default_value_t = 90)]
        proximity: u32,
        #[arg(long, default_value = "Casa de campo")]
        property_type: String,
        #[arg(long, default_value_t = 8)]
        capacity: u32,
        #[arg(long, default_value = "Consultar")]
        availability: String,
    },

    /// Edit fields of an existing listing
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        /// Replaces the whole amenity set
        #[arg(long = "amenity")]
        amenities: Option<Vec<String>>,
        #[arg(long)]
        proximity: Option<u32>,
        #[arg(long)]
        property_type: Option<String>,
        #[arg(long)]
        capacity: Option<u32>,
        #[arg(long)]
        availability: Option<String>,
    },

    /// Append a comment to a listing
    Comment { id: String, text: String },

    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },

    /// Show the activity log
    Activity {
        #[arg(long)]
        kind: Option<ActivityKind>,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Weights {
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        comfort: Option<f64>,
        #[arg(long)]
        proximity: Option<f64>,
    },
    AddSite { url: String },
    RemoveSite { url: String },
    Prompt { file: PathBuf },
    ApiKey { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let tracker = Tracker::open(Store::new(cli.data_dir.clone())).await?;

    match cli.command {
        Commands::List {
            search,
            amenities,
            max_proximity,
            min_capacity,
            keep_new,
        } => {
            let listings = tracker.listings().await;
            let filter = ListingFilter {
                search,
                amenities,
                max_proximity,
                min_capacity,
            };
            let shown = filter_and_sort(&listings, &filter);
            info!("🏠 {} of {} listings match", shown.len(), listings.len());
            for (i, listing) in shown.iter().enumerate() {
                print_listing(i + 1, listing);
            }
            if !keep_new {
                tracker.acknowledge().await?;
            }
        }
        Commands::Search { endpoint } => {
            let backend = HttpSearchBackend::new(endpoint)?;
            let result = tracker.search(&backend).await?;
            print_reconciliation(&result);
        }
        Commands::Ingest { file } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let settings = tracker.settings().await.with_env_api_key();
            let extractor = GeminiExtractor::new(settings.api_key)?;
            let result = tracker.ingest_text(&extractor, &text).await?;
            print_reconciliation(&result);
        }
        Commands::Import { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records: Vec<serde_json::Value> =
                serde_json::from_str(&raw).context("Import file must hold a JSON array")?;
            let result = tracker.import_candidates(records).await?;
            print_reconciliation(&result);
        }
        Commands::Add {
            name,
            price,
            location,
            description,
            contact,
            images,
            amenities,
            proximity,
            property_type,
            capacity,
            availability,
        } => {
            let listing = tracker
                .add_manual(ManualEntry {
                    name,
                    price,
                    description,
                    location,
                    contact_link: contact,
                    image_urls: images,
                    comfort_features: amenities,
                    proximity_to_caba: proximity,
                    property_type,
                    capacity,
                    availability,
                })
                .await?;
            print_listing(1, &listing);
        }
        Commands::Edit {
            id,
            name,
            price,
            location,
            description,
            contact,
            amenities,
            proximity,
            property_type,
            capacity,
            availability,
        } => {
            let listing = tracker
                .edit_listing(
                    &id,
                    ListingEdit {
                        name,
                        price,
                        description,
                        location,
                        contact_link: contact,
                        comfort_features: amenities,
                        proximity_to_caba: proximity,
                        property_type,
                        capacity,
                        availability,
                    },
                )
                .await?;
            print_listing(1, &listing);
        }
        Commands::Comment { id, text } => {
            let listing = tracker.add_comment(&id, &text).await?;
            println!("{} now has {} comments", listing.name, listing.comments.len());
        }
        Commands::Settings { action } => {
            let mut settings = tracker.settings().await;
            match action {
                None => {
                    println!("{}", serde_json::to_string_pretty(&redacted(&settings))?);
                    return Ok(());
                }
                Some(SettingsAction::Weights {
                    price,
                    comfort,
                    proximity,
                }) => {
                    let w = &mut settings.weights;
                    w.price = price.unwrap_or(w.price);
                    w.comfort = comfort.unwrap_or(w.comfort);
                    w.proximity = proximity.unwrap_or(w.proximity);
                }
                Some(SettingsAction::AddSite { url }) => {
                    if !settings.add_site(&url)? {
                        println!("{} is already configured", url);
                        return Ok(());
                    }
                }
                Some(SettingsAction::RemoveSite { url }) => {
                    if !settings.remove_site(&url) {
                        println!("{} was not configured", url);
                        return Ok(());
                    }
                }
                Some(SettingsAction::Prompt { file }) => {
                    settings.prompt = tokio::fs::read_to_string(&file)
                        .await
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                }
                Some(SettingsAction::ApiKey { key }) => settings.api_key = key,
            }
            tracker.update_settings(settings).await?;
            info!("💾 Settings saved");
        }
        Commands::Activity {
            kind,
            text,
            from,
            to,
        } => {
            let log = tracker.activity().await;
            let query = ActivityQuery {
                kind,
                text,
                from,
                to,
            };
            for entry in log.filter(&query) {
                println!("{}  [{:?}] {}", entry.timestamp.format("%Y-%m-%d %H:%M"), entry.kind, entry.message);
            }
        }
    }

    Ok(())
}

fn print_listing(position: usize, listing: &Listing) {
    let badge = if listing.is_new { " 🆕" } else { "" };
    println!("{}. {} ({} pts){}", position, listing.name, listing.score, badge);
    println!(
        "   ${} · {} · {} min from CABA · {} people",
        listing.price, listing.location, listing.proximity_to_caba, listing.capacity
    );
    println!(
        "   Scores: price {} / comfort {} / proximity {}",
        listing.scores.price, listing.scores.comfort, listing.scores.proximity
    );
    if !listing.comfort_features.is_empty() {
        println!("   Amenities: {}", listing.comfort_features.join(", "));
    }
    for source in &listing.sources {
        println!("   {}: {}", source.site, source.url);
    }
    println!("   ID: {}", listing.id);
    println!();
}

fn print_reconciliation(result: &Reconciliation) {
    info!(
        "✅ {} new, {} updated, {} skipped",
        result.added.len(),
        result.updated.len(),
        result.skipped.len()
    );
    for listing in &result.added {
        println!("NEW      {} ({})", listing.name, listing.id);
    }
    for update in &result.updated {
        println!(
            "UPDATED  {}: ${} -> ${}",
            update.listing.name, update.previous_price, update.listing.price
        );
    }
}

fn redacted(settings: &quinta_scout::config::Settings) -> quinta_scout::config::Settings {
    let mut shown = settings.clone();
    if shown.has_api_key() {
        shown.api_key = "********".to_string();
    }
    shown
}
