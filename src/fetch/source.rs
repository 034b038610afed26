use anyhow::{Context, Result, bail};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, error, warn};

use super::{HttpClient, fetch_bytes};
use crate::parser::{RawSheet, parse_sheet};

const SPREADSHEET_BASE: &str = "https://docs.google.com/spreadsheets/d/";

/// Where a sheet's CSV lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    Url(String),
}

/// A named sheet waiting to be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSource {
    pub name: String,
    pub location: Location,
}

impl SheetSource {
    /// Interprets a command-line source argument.
    ///
    /// Accepts an http(s) URL, a CSV file, a directory (every `*.csv` in it,
    /// sorted by file name) or `NAME=LOCATION` to name a single sheet
    /// explicitly. Without a name, the file stem or last URL path segment
    /// is used.
    pub fn parse(arg: &str) -> Result<Vec<SheetSource>> {
        if let Some((name, location)) = split_named(arg) {
            return Ok(vec![SheetSource {
                name: name.to_string(),
                location: location_of(location),
            }]);
        }

        match location_of(arg) {
            Location::Url(url) => {
                let parsed = Url::parse(&url).with_context(|| format!("invalid URL {url}"))?;
                let name = parsed
                    .path_segments()
                    .and_then(|mut s| s.next_back())
                    .filter(|s| !s.is_empty())
                    .map(strip_csv_extension)
                    .with_context(|| format!("cannot derive a sheet name from {url}, use NAME={url}"))?;
                Ok(vec![SheetSource {
                    name,
                    location: Location::Url(url),
                }])
            }
            Location::File(path) if path.is_dir() => directory_sources(&path),
            Location::File(path) => {
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .with_context(|| format!("cannot derive a sheet name from {}", path.display()))?
                    .to_string();
                Ok(vec![SheetSource {
                    name,
                    location: Location::File(path),
                }])
            }
        }
    }
}

/// Splits `NAME=LOCATION`, unless the text before `=` looks like part of a path or URL.
fn split_named(arg: &str) -> Option<(&str, &str)> {
    let (name, location) = arg.split_once('=')?;
    let looks_like_path = name.contains(['/', '\\', ':', '?', '&']);
    (!name.is_empty() && !location.is_empty() && !looks_like_path).then_some((name, location))
}

fn location_of(text: &str) -> Location {
    if text.starts_with("http://") || text.starts_with("https://") {
        Location::Url(text.to_string())
    } else {
        Location::File(PathBuf::from(text))
    }
}

fn strip_csv_extension(segment: &str) -> String {
    segment.strip_suffix(".csv").unwrap_or(segment).to_string()
}

fn directory_sources(dir: &Path) -> Result<Vec<SheetSource>> {
    let mut sources = Vec::new();

    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            sources.push(SheetSource {
                name: stem.to_string(),
                location: Location::File(path.clone()),
            });
        }
    }

    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(sources)
}

/// Builds one CSV export URL per named sheet of a published spreadsheet.
///
/// `spreadsheet` is either the spreadsheet's full URL or its bare id.
pub fn spreadsheet_sources(spreadsheet: &str, sheets: &[String]) -> Result<Vec<SheetSource>> {
    let id = spreadsheet_id(spreadsheet)?;

    sheets
        .iter()
        .map(|sheet| -> Result<SheetSource> {
            let mut url = Url::parse(&format!("{SPREADSHEET_BASE}{id}/gviz/tq"))?;
            url.query_pairs_mut()
                .append_pair("tqx", "out:csv")
                .append_pair("headers", "0")
                .append_pair("sheet", sheet);
            Ok(SheetSource {
                name: sheet.clone(),
                location: Location::Url(url.to_string()),
            })
        })
        .collect()
}

fn spreadsheet_id(spreadsheet: &str) -> Result<&str> {
    let id = match spreadsheet.split_once("/d/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or_default(),
        None if !spreadsheet.contains('/') => spreadsheet,
        None => bail!("not a spreadsheet URL or id: {spreadsheet}"),
    };
    if id.is_empty() {
        bail!("not a spreadsheet URL or id: {spreadsheet}");
    }
    Ok(id)
}

/// Loads and parses every source, at most `concurrency` at a time.
///
/// Results come back in the order of `sources` regardless of completion
/// order. A source that cannot be read or parsed is logged and left out.
#[tracing::instrument(skip_all, fields(sources = sources.len(), concurrency = concurrency))]
pub async fn load_sheets<C>(
    client: Arc<C>,
    sources: Vec<SheetSource>,
    concurrency: usize,
) -> Vec<RawSheet>
where
    C: HttpClient + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = Vec::with_capacity(sources.len());

    for source in sources {
        let sem = semaphore.clone();
        let client = client.clone();
        let span = tracing::info_span!("load_sheet", sheet = %source.name);
        let name = source.name.clone();

        let task = tokio::spawn(
            async move { load_sheet(client.as_ref(), &source, sem).await }.instrument(span),
        );
        tasks.push((name, task));
    }

    let mut sheets = Vec::with_capacity(tasks.len());
    for (name, task) in tasks {
        match task.await {
            Ok(Ok(sheet)) => {
                debug!(sheet = %name, rows = sheet.rows.len(), "Sheet loaded");
                sheets.push(sheet);
            }
            Ok(Err(e)) => warn!(sheet = %name, error = %e, "Failed to load sheet"),
            Err(e) => error!(sheet = %name, error = %e, "Sheet load task failed"),
        }
    }
    sheets
}

async fn load_sheet<C: HttpClient + ?Sized>(
    client: &C,
    source: &SheetSource,
    semaphore: Arc<Semaphore>,
) -> Result<RawSheet> {
    let _permit = semaphore.acquire_owned().await?;
    let bytes = match &source.location {
        Location::File(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        Location::Url(url) => fetch_bytes(client, url)
            .await
            .with_context(|| format!("failed to fetch {url}"))?,
    };
    parse_sheet(&source.name, &bytes)
}
