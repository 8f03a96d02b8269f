// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::error::Error;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use adsb_client::{Altitude, AnnotationData, FeedClient, LatLng};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use tokio::runtime::Runtime;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;

use flightwatch::annotations::AnnotationEvent;
use flightwatch::map::{LogSurface, METERS_PER_NM};
use flightwatch::watch::{
    classify, BackgroundRunner, FileStore, LogNotifier, WatchStore, START_TRACKING_EVENT,
};
use flightwatch::watchlist::{WatchDetails, WatchList};
use flightwatch::{AppConfig, Session};

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "flightwatch")]
#[command(about = "Live aircraft annotations and background flight watching", long_about = None)]
struct Cli {
    /// Override the feed base URL from the config file
    #[arg(long, global = true)]
    feed_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the aircraft currently around a point
    Snapshot {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Search radius in nautical miles
        #[arg(long, default_value = "100")]
        radius_nm: f64,
    },
    /// Search the feed for aircraft
    Find {
        #[command(subcommand)]
        query: Query,
    },
    /// Run a live map session against the logging surface
    Session {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Visible radius in nautical miles
        #[arg(long, default_value = "100")]
        radius_nm: f64,
        /// Follow this aircraft once it shows up
        #[arg(long)]
        follow: Option<String>,
        /// Stop after this many seconds
        #[arg(long, default_value = "60")]
        duration: u64,
    },
    /// Watch flights until all of them are on the ground
    Watch {
        /// ICAO hex ids of the flights to watch
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show or initialize the configuration file
    Config {
        /// Write the current configuration to disk
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum Query {
    /// Aircraft broadcasting a callsign
    Callsign { callsign: String },
    /// Aircraft with a registration, e.g. N123UA
    Registration { registration: String },
    /// Aircraft squawking a transponder code
    Squawk { squawk: String },
    /// Aircraft of an ICAO type designator, e.g. A320
    Type { type_code: String },
    /// Aircraft using privacy ICAO addresses
    Pia,
    /// Aircraft on the LADD list
    Ladd,
    /// The aircraft closest to a point
    Closest {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Search radius in nautical miles
        #[arg(long, default_value = "250")]
        radius_nm: f64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(url) = cli.feed_url {
        config.feed_base_url = url;
    }

    match cli.command {
        Command::Snapshot { lat, lon, radius_nm } => snapshot(&config, LatLng::new(lat, lon), radius_nm),
        Command::Find { query } => find(&config, query),
        Command::Session {
            lat,
            lon,
            radius_nm,
            follow,
            duration,
        } => session(
            &config,
            LatLng::new(lat, lon),
            radius_nm,
            follow,
            Duration::from_secs(duration),
        ),
        Command::Watch { ids } => watch(&config, &ids),
        Command::Config { init } => show_config(&config, init),
    }
}

fn altitude_label(altitude: Option<Altitude>) -> String {
    match altitude {
        Some(Altitude::Ground) => "ground".to_string(),
        Some(Altitude::Feet(feet)) => format!("{feet:.0} ft"),
        None => "-".to_string(),
    }
}

fn print_aircraft(records: &[AnnotationData]) {
    println!("{:<8} {:<9} {:>10} {:>10} {:>10}  STATUS", "ICAO", "CALLSIGN", "ALTITUDE", "LAT", "LON");
    for record in records {
        let (lat, lng) = record
            .valid_coordinates()
            .map_or(("-".to_string(), "-".to_string()), |c| {
                (format!("{:.4}", c.lat), format!("{:.4}", c.lng))
            });
        println!(
            "{:<8} {:<9} {:>10} {:>10} {:>10}  {}",
            record.id().unwrap_or("?"),
            record.callsign().unwrap_or("-"),
            altitude_label(record.altitude()),
            lat,
            lng,
            classify(record.altitude())
        );
    }
}

fn print_watch_list(entries: &[WatchDetails]) {
    println!("{:<8} {:<9} {:<5} {:<5}  STATUS", "ICAO", "FLIGHT", "FROM", "TO");
    for entry in entries {
        println!(
            "{:<8} {:<9} {:<5} {:<5}  {}",
            entry.id, entry.flight, entry.origin, entry.destination, entry.status
        );
    }
}

fn snapshot(config: &AppConfig, center: LatLng, radius_nm: f64) -> CliResult {
    let client = FeedClient::from_config(&config.feed_config())?;
    let runtime = Runtime::new()?;

    let records = runtime.block_on(client.fetch_overview(center, radius_nm));
    print_aircraft(&records);
    println!("{} aircraft", records.len());
    Ok(())
}

fn find(config: &AppConfig, query: Query) -> CliResult {
    let client = FeedClient::from_config(&config.feed_config())?;
    let runtime = Runtime::new()?;

    let records = runtime.block_on(async {
        match query {
            Query::Callsign { callsign } => client.fetch_by_callsign(&callsign).await,
            Query::Registration { registration } => {
                client.fetch_by_registration(&registration).await
            }
            Query::Squawk { squawk } => client.fetch_by_squawk(&squawk).await,
            Query::Type { type_code } => client.fetch_by_type(&type_code).await,
            Query::Pia => client.fetch_pia().await,
            Query::Ladd => client.fetch_ladd().await,
            Query::Closest { lat, lon, radius_nm } => client
                .fetch_closest(LatLng::new(lat, lon), radius_nm)
                .await
                .map(|closest| closest.into_iter().collect()),
        }
    })?;
    print_aircraft(&records);
    println!("{} aircraft", records.len());
    Ok(())
}

fn session(
    config: &AppConfig,
    center: LatLng,
    radius_nm: f64,
    follow: Option<String>,
    duration: Duration,
) -> CliResult {
    let client = Arc::new(FeedClient::from_config(&config.feed_config())?);
    let surface = LogSurface::new(center, radius_nm * METERS_PER_NM);
    let (session, handle) = Session::new(client, surface, config.session_settings());
    let mut events = session.subscribe();
    let runtime = Runtime::new()?;

    let surface = runtime.block_on(async move {
        let run = session.run();
        tokio::pin!(run);
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let mut pending_follow = follow;
        let mut stopping = false;
        let mut events_open = true;

        loop {
            tokio::select! {
                surface = &mut run => return surface,
                () = &mut deadline, if !stopping => {
                    info!("Session duration elapsed");
                    stopping = true;
                    handle.shutdown();
                }
                _ = &mut ctrl_c, if !stopping => {
                    info!("Interrupted, stopping session");
                    stopping = true;
                    handle.shutdown();
                }
                event = events.recv(), if events_open => match event {
                    Ok(AnnotationEvent::Reconciled(records)) => {
                        info!("{} aircraft on the map", records.len());
                        let found = pending_follow
                            .as_deref()
                            .is_some_and(|id| records.iter().any(|r| r.id() == Some(id)));
                        if found {
                            if let Some(id) = pending_follow.take() {
                                handle.select(id);
                            }
                        }
                    }
                    Ok(AnnotationEvent::SelectedChanged(Some(data))) => {
                        print_aircraft(std::slice::from_ref(&data));
                    }
                    Ok(AnnotationEvent::SelectedChanged(None)) => info!("Back to overview"),
                    Err(RecvError::Lagged(skipped)) => debug!("Skipped {} session events", skipped),
                    Err(RecvError::Closed) => events_open = false,
                },
            }
        }
    });

    println!("Session ended with {} markers still placed", surface.len());
    Ok(())
}

fn watch(config: &AppConfig, ids: &[String]) -> CliResult {
    let client = Arc::new(FeedClient::from_config(&config.feed_config())?);
    let path = config
        .store_path()
        .ok_or("no data directory available for the watch store")?;
    let store = Arc::new(FileStore::open(path)?);
    let runtime = Runtime::new()?;

    let mut list = WatchList::default();
    runtime.block_on(async {
        for id in ids {
            let data = match client.fetch_by_icao(id).await {
                Ok(Some(data)) => data,
                Ok(None) => {
                    warn!("{} is not reporting right now", id);
                    AnnotationData::with_id(id.as_str())
                }
                Err(e) => {
                    warn!("Lookup of {} failed: {}", id, e);
                    AnnotationData::with_id(id.as_str())
                }
            };
            list.add(&data);
        }
    });
    print_watch_list(list.entries());

    let payload = list.start_payload_json()?;
    let runner = BackgroundRunner::new(
        Arc::clone(&store),
        LogNotifier,
        client,
        config.monitor_settings(),
    );
    let (done_tx, mut done_rx) = oneshot::channel();
    runner.dispatch_event(START_TRACKING_EVENT, &payload, false, move |outcome| {
        if done_tx.send(outcome).is_err() {
            debug!("Watch finished after the CLI stopped listening");
        }
    })?;

    let persisted = WatchStore::new(Arc::clone(&store));
    let refresh_every = config.monitor_settings().interval;
    let outcome = runtime.block_on(async {
        let mut refresh = tokio::time::interval(refresh_every);
        refresh.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interrupted = false;

        loop {
            tokio::select! {
                outcome = &mut done_rx => return outcome,
                _ = &mut ctrl_c, if !interrupted => {
                    info!("Interrupted, stopping watch");
                    interrupted = true;
                    runner.shutdown(START_TRACKING_EVENT);
                }
                _ = refresh.tick() => match list.refresh_from(&persisted) {
                    Ok(0) => {}
                    Ok(_) => print_watch_list(list.entries()),
                    Err(e) => warn!("Could not read watch store: {}", e),
                },
            }
        }
    })??;

    println!("Watch finished: {outcome:?}");
    Ok(())
}

fn show_config(config: &AppConfig, init: bool) -> CliResult {
    let path = AppConfig::config_path()?;
    if init {
        config.save()?;
        println!("Wrote {}", path.display());
    } else {
        println!("{}", path.display());
    }
    println!("{config:#?}");
    Ok(())
}
