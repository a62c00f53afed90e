use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use catalog::{IngestReport, PointCatalog, load_catalog};
use clap::{Parser, Subcommand};
use foundation::math::{GeoPoint, haversine_km};
use runtime::metrics::Metrics;
use scene::RecordingRenderer;
use streaming::ViewportTracker;
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::{ScreenPos, Viewer, ViewerConfig, ViewerEvent};

#[derive(Parser, Debug)]
#[command(author, version, about = "Query a point-of-interest dataset")]
struct Args {
    /// Dataset: JSON array of {id, name, lat, lon}, optionally gzip-compressed
    #[arg(long, short)]
    dataset: PathBuf,

    /// Viewer configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the working-set radius from the configuration
    #[arg(long)]
    radius_km: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Points within the working-set radius of a center
    Query {
        /// Center as LAT,LON
        #[arg(value_parser = parse_center, allow_hyphen_values = true)]
        center: GeoPoint,
    },

    /// Closest points to a position
    Nearest {
        /// Position as LAT,LON
        #[arg(value_parser = parse_center, allow_hyphen_values = true)]
        at: GeoPoint,

        /// Search radius in kilometers (default: the probe radius)
        #[arg(long)]
        max_km: Option<f64>,

        #[arg(long, short, default_value_t = 1)]
        k: usize,
    },

    /// Points entering and leaving the working set between two centers
    Delta {
        #[arg(value_parser = parse_center, allow_hyphen_values = true)]
        from: GeoPoint,
        #[arg(value_parser = parse_center, allow_hyphen_values = true)]
        to: GeoPoint,
    },

    /// Move the viewer camera through a list of centers and report the working set
    Walk {
        #[arg(value_parser = parse_center, allow_hyphen_values = true, required = true)]
        centers: Vec<GeoPoint>,
    },

    /// Catalog size per category
    Stats,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    if let Err(e) = real_main(Args::parse()).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn real_main(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };
    if let Some(r) = args.radius_km {
        config.load_radius_km = r;
        config.validate()?;
    }

    let IngestReport { catalog, rejected } = open_dataset(&args.dataset)?;
    info!(points = catalog.len(), rejected = rejected.len(), "dataset loaded");
    let catalog = Arc::new(catalog);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Query { center } => cmd_query(&catalog, &config, center, &mut out),
        Command::Nearest { at, max_km, k } => {
            let max_km = max_km.unwrap_or(config.probe_radius_km);
            cmd_nearest(&catalog, at, max_km, k, &mut out)
        }
        Command::Delta { from, to } => cmd_delta(&catalog, &config, from, to, &mut out),
        Command::Walk { centers } => cmd_walk(catalog, &config, &centers, &mut out).await,
        Command::Stats => cmd_stats(&catalog, rejected.len(), &mut out),
    }
}

fn open_dataset(path: &Path) -> Result<IngestReport> {
    load_catalog(path).with_context(|| format!("load dataset {}", path.display()))
}

fn parse_center(s: &str) -> Result<GeoPoint, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {s:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude {lat:?}: {e}"))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("longitude {lon:?}: {e}"))?;
    let p = GeoPoint::new(lat, lon);
    if !p.is_valid() {
        return Err(format!("coordinates out of range: {lat},{lon}"));
    }
    Ok(p)
}

fn cmd_query(
    catalog: &PointCatalog,
    config: &ViewerConfig,
    center: GeoPoint,
    out: &mut impl Write,
) -> Result<()> {
    for id in catalog.query_radius(center, config.load_radius_km) {
        let Some(p) = catalog.get(id.as_str()) else {
            continue;
        };
        writeln!(
            out,
            "{id}\t{}\t{:.3} km\t{}",
            p.category(),
            haversine_km(center, p.position()),
            p.name()
        )?;
    }
    Ok(())
}

fn cmd_nearest(
    catalog: &PointCatalog,
    at: GeoPoint,
    max_km: f64,
    k: usize,
    out: &mut impl Write,
) -> Result<()> {
    if k == 0 {
        bail!("k must be at least 1");
    }
    let hits = catalog.k_nearest(at, k, max_km);
    if hits.is_empty() {
        writeln!(out, "no point within {max_km} km")?;
    }
    for (id, d) in hits {
        let name = catalog.get(id.as_str()).map(|p| p.name()).unwrap_or_default();
        writeln!(out, "{id}\t{d:.3} km\t{name}")?;
    }
    Ok(())
}

fn cmd_delta(
    catalog: &Arc<PointCatalog>,
    config: &ViewerConfig,
    from: GeoPoint,
    to: GeoPoint,
    out: &mut impl Write,
) -> Result<()> {
    let tracker = ViewportTracker::new(catalog.clone(), from, config.load_radius_km);
    let mut metrics = Metrics::new();
    let delta = tracker.delta(from, to, config.load_radius_km, &mut metrics);

    for id in &delta.to_activate {
        writeln!(out, "+{id}")?;
    }
    for id in &delta.to_deactivate {
        writeln!(out, "-{id}")?;
    }
    for line in metrics.report() {
        writeln!(out, "# {line}")?;
    }
    Ok(())
}

async fn cmd_walk(
    catalog: Arc<PointCatalog>,
    config: &ViewerConfig,
    centers: &[GeoPoint],
    out: &mut impl Write,
) -> Result<()> {
    let mut viewer = Viewer::new(
        catalog,
        RecordingRenderer::new(),
        config,
        Arc::new(|_: ScreenPos| -> Option<GeoPoint> { None }),
        Arc::new(|_: GeoPoint| -> Option<f64> { None }),
    );
    let report = viewer.start();
    writeln!(
        out,
        "start\t{} materialized\t{} failed",
        report.materialized, report.failed
    )?;

    let events = viewer.sender();
    for &center in centers {
        events.send(ViewerEvent::CameraSettled(center))?;
    }
    events.send(ViewerEvent::Shutdown)?;
    viewer.run().await;

    writeln!(
        out,
        "end\t{} materialized\t{} visible",
        viewer.store().len(),
        viewer.store().renderer().visible_count()
    )?;
    for line in viewer.metrics().report() {
        writeln!(out, "# {line}")?;
    }
    Ok(())
}

fn cmd_stats(catalog: &PointCatalog, rejected: usize, out: &mut impl Write) -> Result<()> {
    for (category, n) in catalog.count_by_category() {
        writeln!(out, "{category}\t{n}")?;
    }
    writeln!(out, "total\t{}", catalog.len())?;
    writeln!(out, "rejected\t{rejected}")?;
    Ok(())
}
