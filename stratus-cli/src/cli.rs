use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Password, PasswordDisplayMode, Select, Text};
use stratus_core::{
    ApiMode, Config, Coordinates, FileStore, KeyValueStore, Location, RecencyStore, SearchHandle,
    UnitPreference, search::OrchestratorStopped,
};

use crate::{
    render,
    session::{Outcome, Session, failure},
};

const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:8787";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "stratus", version, about = "Weather lookup with city autocomplete")]
pub struct Cli {
    /// Override the configured units for this run: "imperial" or "metric".
    #[arg(long, global = true)]
    pub units: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure how to reach the weather provider.
    Configure {
        /// "direct" (local API key) or "proxy" (key held by stratus-proxy).
        mode: String,
    },

    /// Search for a city and show its weather.
    Search {
        /// City name; prompted for when absent.
        query: Option<String>,
    },

    /// Show weather at the configured home location.
    Here,

    /// List recent searches.
    Recent {
        /// Forget every recent search.
        #[arg(long)]
        clear: bool,
    },

    /// Show weather for entry N of the recent list.
    Open {
        /// 1-based position as printed by `stratus recent`.
        index: usize,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;
        let unit = match self.units.as_deref() {
            Some(raw) => UnitPreference::try_from(raw)?,
            None => config.units,
        };

        match self.command {
            Command::Configure { mode } => configure(config, &mode),
            Command::Search { query } => search(&config, unit, query).await,
            Command::Here => {
                let session = Session::start(&config, unit)?;
                show_weather(session, unit, |h| h.use_current_location()).await
            }
            Command::Recent { clear } => recent(&config, clear),
            Command::Open { index } => {
                let store = recent_store(&config)?;
                let location = recent_entry(&store, index)
                    .ok_or_else(|| {
                        anyhow!(
                            "No recent search #{index}.\n\
                             Hint: run `stratus recent` to list saved places."
                        )
                    })?;
                let session = Session::start(&config, unit)?;
                show_weather(session, unit, move |h| h.select_location(location.clone())).await
            }
        }
    }
}

fn configure(mut config: Config, mode: &str) -> Result<()> {
    let mode = ApiMode::try_from(mode)?;

    match mode {
        ApiMode::Direct => {
            let key = Password::new("OpenWeatherMap API key:")
                .with_display_mode(PasswordDisplayMode::Masked)
                .without_confirmation()
                .prompt()?;
            config.set_api_key(key.trim().to_string());
        }
        ApiMode::Proxy => {
            let url = Text::new("Proxy URL:")
                .with_default(config.proxy_url().unwrap_or(DEFAULT_PROXY_URL))
                .prompt()?;
            config.set_proxy_url(url.trim().to_string());
        }
    }
    config.set_mode(mode);

    let units = vec![UnitPreference::Imperial, UnitPreference::Metric];
    let cursor = units.iter().position(|u| *u == config.units).unwrap_or(0);
    config.units = Select::new("Units:", units)
        .with_starting_cursor(cursor)
        .prompt()?;

    if Confirm::new("Set a home location for `stratus here`?")
        .with_default(config.home.is_some())
        .prompt()?
    {
        let lat = CustomType::<f64>::new("Latitude:")
            .with_error_message("Enter a number between -90 and 90")
            .prompt()?;
        let lon = CustomType::<f64>::new("Longitude:")
            .with_error_message("Enter a number between -180 and 180")
            .prompt()?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            bail!("Coordinates out of range: {lat}, {lon}");
        }
        config.home = Some(Coordinates::new(lat, lon));
    }

    config.save()?;
    println!(
        "Saved {mode} configuration to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

async fn search(config: &Config, unit: UnitPreference, query: Option<String>) -> Result<()> {
    let query = match query {
        Some(query) => query,
        None => Text::new("City:").prompt()?,
    };

    let mut session = Session::start(config, unit)?;
    session.handle().on_query_changed(query.as_str())?;

    let results = loop {
        match session.wait_for_results().await? {
            Outcome::Ready(Some(results)) => break results,
            Outcome::Ready(None) => {
                println!(
                    "Type at least {} characters to search.",
                    config.search.min_search_chars
                );
                return session.finish().await;
            }
            Outcome::Failed { error, retry } => {
                if retry && confirm_retry(error.user_message())? {
                    session.handle().retry()?;
                } else {
                    return Err(failure(error));
                }
            }
        }
    };

    if results.is_empty() {
        println!("No results found");
        return session.finish().await;
    }

    let options: Vec<String> = results
        .iter()
        .map(|location| render::result_line(location, query.trim()))
        .collect();
    let picked = Select::new("Pick a place:", options).raw_prompt()?;
    let chosen = results[picked.index].clone();

    // The list is dismissed by the first pick; retries go by location.
    let mut first = true;
    show_weather(session, unit, move |h| {
        if std::mem::take(&mut first) {
            h.on_select(picked.index)
        } else {
            h.select_location(chosen.clone())
        }
    })
    .await
}

/// Issue a weather request, offering to reissue it on transient failures.
async fn show_weather<F>(mut session: Session, unit: UnitPreference, mut request: F) -> Result<()>
where
    F: FnMut(&SearchHandle) -> Result<(), OrchestratorStopped>,
{
    request(session.handle())?;

    loop {
        match session.wait_for_weather().await? {
            Outcome::Ready((location, report)) => {
                print!("{}", render::weather(&location, &report, unit));
                return session.finish().await;
            }
            Outcome::Failed { error, retry } => {
                if retry && confirm_retry(error.user_message())? {
                    request(session.handle())?;
                } else {
                    return Err(failure(error));
                }
            }
        }
    }
}

fn confirm_retry(message: &str) -> Result<bool> {
    Confirm::new(&format!("{message} Retry?"))
        .with_default(true)
        .prompt()
        .context("Failed to read answer")
}

fn recent_store(config: &Config) -> Result<RecencyStore<FileStore>> {
    Ok(RecencyStore::load(
        FileStore::new(Config::data_dir()?),
        config.search.max_recent,
    ))
}

/// Entry by its one-based position in `stratus recent`.
fn recent_entry<S: KeyValueStore>(store: &RecencyStore<S>, index: usize) -> Option<Location> {
    index.checked_sub(1).and_then(|i| store.get(i)).cloned()
}

fn recent(config: &Config, clear: bool) -> Result<()> {
    let mut store = recent_store(config)?;

    if clear {
        store.clear();
        println!("Cleared recent searches.");
    } else {
        print!("{}", render::recent_list(store.entries()));
    }

    Ok(())
}
