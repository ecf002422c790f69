use std::path::PathBuf;

use clap::Parser;
use engine::planning::{Preset, build_plan_request};
use engine::playback::{CameraMode, PlaybackConfig};
use engine::PlaybackControl;
use player::Player;
use player::planner::{DEFAULT_API_ROOT, HttpPlanner};
use shared::{LatLon, PlanOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Plan or load a route and play it back without a browser"
)]
struct Args {
    /// GPX track to play instead of asking the planner
    #[arg(long, conflicts_with_all = ["start", "goal"])]
    gpx: Option<PathBuf>,

    /// Start as `lat,lon`
    #[arg(long, value_parser = parse_lat_lon, requires = "goal")]
    start: Option<LatLon>,
    #[arg(long, value_parser = parse_lat_lon, requires = "start")]
    goal: Option<LatLon>,

    /// Planning preset (prefer_roads, avoid_forest, shortest_path, easy_terrain, custom, multi_path)
    #[arg(long, default_value_t = Preset::default())]
    preset: Preset,

    #[arg(long, env = "PLANNER_API_ROOT", default_value = DEFAULT_API_ROOT)]
    api_root: String,

    /// Playback speed multiplier
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Camera mode (follow, bird, free)
    #[arg(long, default_value_t = CameraMode::default())]
    camera: CameraMode,

    /// Draw the traveled trail behind the marker
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    trail: bool,

    /// Write the selected route as GPX once playback is done
    #[arg(long)]
    export: Option<PathBuf>,
}

fn parse_lat_lon(value: &str) -> Result<LatLon, String> {
    let (lat, lon) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `lat,lon`, got `{value}`"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid coordinate `{part}`: {err}"))
    };
    Ok(LatLon::new(parse(lat)?, parse(lon)?))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "player=info,engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut player = Player::new(PlaybackConfig::default());

    match (&args.gpx, args.start, args.goal) {
        (Some(path), _, _) => {
            let statistics = player.load_gpx(path)?;
            tracing::info!(
                "track {:?}: {:.2} km, {} points, +{:.0} m / -{:.0} m",
                path,
                statistics.total_distance_km,
                statistics.waypoint_count,
                statistics.elevation_gain_m,
                statistics.elevation_loss_m
            );
        }
        (None, Some(start), Some(goal)) => {
            let planner = HttpPlanner::new(&args.api_root);
            let request = build_plan_request(start, goal, args.preset, PlanOptions::default());
            let paths = player.plan(&planner, &request).await?;
            tracing::info!("planner returned {paths} paths");
            for entry in player.viewer().registry().iter() {
                tracing::info!(
                    "  {} {} ({} points)",
                    entry.id,
                    entry.label.as_deref().unwrap_or_default(),
                    entry.geometry.len()
                );
            }
        }
        _ => return Err("either --gpx or both --start and --goal are required".into()),
    }

    player.control(PlaybackControl::SetSpeed(args.speed))?;
    player.control(PlaybackControl::SetCameraMode(args.camera))?;
    player.control(PlaybackControl::SetTrailEnabled(args.trail))?;
    let rendered = player.play_to_end().await?;
    tracing::info!("rendered {rendered} playback steps");

    if let Some(path) = &args.export {
        if !player.export_active(path)? {
            tracing::warn!("no route selected, nothing exported");
        }
    }

    Ok(())
}
