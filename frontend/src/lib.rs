mod map_bridge;

use std::time::Duration;

use engine::geometry::Coordinate;
use engine::gpx_io::geometry_from_gpx_str;
use engine::planning::{
    Preset, build_plan_request, describe_terrain, dominant_terrain, error_message_from_body,
    rank_color,
};
use engine::playback::{CameraMode, PlaybackStatus, TickHandle, TickScheduler, TickToken};
use engine::{PathId, PlaybackControl, PointInfo, RouteViewer, ViewerError};
use seed::{prelude::*, virtual_dom::AtValue, *};
use serde::Deserialize;
use shared::{LatLon, PathStatistics, PlanOptions, PlanRequest, PlanResponse};
use wasm_bindgen::{JsCast, prelude::wasm_bindgen};
use wasm_bindgen_futures::JsFuture;

use crate::map_bridge::{BrowserMap, init_map};

const SPEEDS: [f64; 6] = [0.5, 1.0, 2.0, 5.0, 10.0, 20.0];

const SAMPLE_ROUTES: [(&str, &str); 3] = [
    ("Route 1", "/gpx/route1.gpx"),
    ("Route 2", "/gpx/route2.gpx"),
    ("Route 3", "/gpx/route3.gpx"),
];

fn api_root() -> String {
    if let Some(url) = option_env!("FRONTEND_API_ROOT") {
        return url.trim_end_matches('/').to_string();
    }
    "http://127.0.0.1:8000/api/v1".to_string()
}

pub struct Model {
    viewer: RouteViewer<BrowserMap>,
    form: PlanForm,
    click_mode: ClickMode,
    point_info: Option<PointInfo>,
    loading_track: bool,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ClickMode {
    Start,
    Goal,
    Inspect,
}

#[derive(Clone)]
struct PlanForm {
    start_lat: String,
    start_lon: String,
    goal_lat: String,
    goal_lon: String,
    preset: Preset,
    alternatives: String,
    options: PlanOptions,
}

impl Default for PlanForm {
    fn default() -> Self {
        Self {
            start_lat: String::new(),
            start_lon: String::new(),
            goal_lat: String::new(),
            goal_lon: String::new(),
            preset: Preset::default(),
            alternatives: "5".into(),
            options: PlanOptions::default(),
        }
    }
}

impl PlanForm {
    fn to_request(&self) -> Result<PlanRequest, String> {
        let parse = |field: &str, label: &str| {
            field
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid {label}"))
        };
        let start = LatLon::new(
            parse(&self.start_lat, "start latitude")?,
            parse(&self.start_lon, "start longitude")?,
        );
        let goal = LatLon::new(
            parse(&self.goal_lat, "goal latitude")?,
            parse(&self.goal_lon, "goal longitude")?,
        );
        let mut request = build_plan_request(start, goal, self.preset, self.options.clone());
        if request.options.enable_multi_path {
            request.options.max_alternative_paths = self
                .alternatives
                .trim()
                .parse::<u8>()
                .ok()
                .filter(|count| (1..=10).contains(count))
                .ok_or_else(|| "Alternatives must be between 1 and 10".to_string())?;
        }
        Ok(request)
    }

    fn coordinate_pair(lat: &str, lon: &str) -> Option<Coordinate> {
        let lat = lat.trim().parse::<f64>().ok()?;
        let lon = lon.trim().parse::<f64>().ok()?;
        Some(Coordinate::new(lon, lat))
    }

    fn start(&self) -> Option<Coordinate> {
        Self::coordinate_pair(&self.start_lat, &self.start_lon)
    }

    fn goal(&self) -> Option<Coordinate> {
        Self::coordinate_pair(&self.goal_lat, &self.goal_lon)
    }

    /// Writes a map click into the start or goal fields and returns the click
    /// mode for the next click: a placed start hands over to the goal.
    fn place_point(&mut self, mode: ClickMode, lat: f64, lon: f64) -> ClickMode {
        match mode {
            ClickMode::Start => {
                self.start_lat = format_coord(lat);
                self.start_lon = format_coord(lon);
                ClickMode::Goal
            }
            ClickMode::Goal => {
                self.goal_lat = format_coord(lat);
                self.goal_lon = format_coord(lon);
                ClickMode::Goal
            }
            ClickMode::Inspect => ClickMode::Inspect,
        }
    }

    fn clear_points(&mut self) {
        self.start_lat.clear();
        self.start_lon.clear();
        self.goal_lat.clear();
        self.goal_lon.clear();
    }
}

pub enum Msg {
    StartLatChanged(String),
    StartLonChanged(String),
    GoalLatChanged(String),
    GoalLonChanged(String),
    PresetChanged(String),
    AlternativesChanged(String),
    Submit,
    PlanFetched(Result<PlanResponse, String>),
    SetClickMode(ClickMode),
    MapClicked { lat: f64, lon: f64 },
    LoadSample(String),
    TrackFileChosen(web_sys::File),
    TrackFetched { name: String, gpx: Result<String, String> },
    TogglePath(PathId, bool),
    ToggleAll,
    SelectPath(PathId),
    Playback(PlaybackControl),
    SpeedChanged(String),
    CameraModeChanged(String),
    Tick(TickToken),
    DismissError,
    ClearRoutes,
}

/// Schedules playback ticks as seed timeouts. Dropping the handle aborts the
/// timeout.
struct SeedScheduler<'a, O: Orders<Msg>> {
    orders: &'a mut O,
}

impl<O: Orders<Msg>> TickScheduler for SeedScheduler<'_, O> {
    fn schedule(&mut self, delay: Duration, token: TickToken) -> TickHandle {
        let ms = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        let handle = self
            .orders
            .perform_cmd_with_handle(cmds::timeout(ms, move || Msg::Tick(token)));
        TickHandle::new(handle)
    }
}

pub fn init(_: Url, orders: &mut impl Orders<Msg>) -> Model {
    orders.stream(streams::window_event(Ev::from("map-click"), |event| {
        let payload = event
            .dyn_into::<web_sys::CustomEvent>()
            .ok()
            .and_then(|event| serde_wasm_bindgen::from_value::<MapClickPayload>(event.detail()).ok());
        match payload {
            Some(payload) => {
                web_sys::console::debug_1(
                    &format!(
                        "[frontend] map click lat={:.5} lon={:.5}",
                        payload.lat, payload.lon
                    )
                    .into(),
                );
                Some(Msg::MapClicked {
                    lat: payload.lat,
                    lon: payload.lon,
                })
            }
            None => {
                web_sys::console::warn_1(&"[frontend] malformed map-click event".into());
                None
            }
        }
    }));

    Model {
        viewer: RouteViewer::new(BrowserMap::new()),
        form: PlanForm {
            // Bangkok, Lumphini Park to Chatuchak
            start_lat: "13.7307".into(),
            start_lon: "100.5418".into(),
            goal_lat: "13.7999".into(),
            goal_lon: "100.5534".into(),
            ..PlanForm::default()
        },
        click_mode: ClickMode::Start,
        point_info: None,
        loading_track: false,
    }
}

pub fn update(msg: Msg, model: &mut Model, orders: &mut impl Orders<Msg>) {
    match msg {
        Msg::StartLatChanged(val) => {
            model.form.start_lat = val;
            sync_selection_markers(model);
        }
        Msg::StartLonChanged(val) => {
            model.form.start_lon = val;
            sync_selection_markers(model);
        }
        Msg::GoalLatChanged(val) => {
            model.form.goal_lat = val;
            sync_selection_markers(model);
        }
        Msg::GoalLonChanged(val) => {
            model.form.goal_lon = val;
            sync_selection_markers(model);
        }
        Msg::PresetChanged(key) => match key.parse::<Preset>() {
            Ok(preset) => model.form.preset = preset,
            Err(err) => web_sys::console::warn_1(&format!("[frontend] {err}").into()),
        },
        Msg::AlternativesChanged(val) => model.form.alternatives = val,
        Msg::Submit => {
            if model.viewer.is_planning() {
                return;
            }
            match model.form.to_request() {
                Ok(request) => {
                    model.viewer.begin_plan();
                    orders.perform_cmd(send_plan_request(request));
                }
                Err(err) => model.viewer.report_error(&err),
            }
        }
        Msg::PlanFetched(result) => {
            let result = result.map_err(ViewerError::PlanningRequestFailed);
            if let Ok(count) = model.viewer.finish_plan(result) {
                web_sys::console::log_1(&format!("[frontend] plan returned {count} paths").into());
            }
        }
        Msg::SetClickMode(mode) => model.click_mode = mode,
        Msg::MapClicked { lat, lon } => {
            if model.click_mode == ClickMode::Inspect {
                model.point_info = Some(model.viewer.inspect_point(Coordinate::new(lon, lat)));
            } else {
                model.click_mode = model.form.place_point(model.click_mode, lat, lon);
                sync_selection_markers(model);
            }
        }
        Msg::LoadSample(path) => {
            if path.is_empty() {
                return;
            }
            model.loading_track = true;
            orders.perform_cmd(fetch_track(path));
        }
        Msg::TrackFileChosen(file) => {
            model.loading_track = true;
            orders.perform_cmd(read_track_file(file));
        }
        Msg::TrackFetched { name, gpx } => {
            model.loading_track = false;
            let loaded = gpx.and_then(|text| {
                let geometry = geometry_from_gpx_str(&text).map_err(|err| err.to_string())?;
                model
                    .viewer
                    .load_track(&name, geometry)
                    .map_err(|err| err.to_string())
            });
            if let Err(err) = loaded {
                web_sys::console::error_1(&format!("[frontend] loading {name} failed: {err}").into());
                model.viewer.report_error(&format!("Could not load {name}: {err}"));
            }
        }
        Msg::TogglePath(id, visible) => {
            model.viewer.on_path_toggle(id, visible);
        }
        Msg::ToggleAll => {
            model.viewer.toggle_all();
        }
        Msg::SelectPath(id) => {
            if let Err(err) = model.viewer.on_path_select(id) {
                web_sys::console::warn_1(&format!("[frontend] {err}").into());
            }
        }
        Msg::Playback(control) => playback(model, orders, control),
        Msg::SpeedChanged(val) => match val.parse::<f64>() {
            Ok(speed) => playback(model, orders, PlaybackControl::SetSpeed(speed)),
            Err(_) => web_sys::console::warn_1(&format!("[frontend] bad speed {val}").into()),
        },
        Msg::CameraModeChanged(val) => match val.parse::<CameraMode>() {
            Ok(mode) => playback(model, orders, PlaybackControl::SetCameraMode(mode)),
            Err(err) => web_sys::console::warn_1(&format!("[frontend] {err}").into()),
        },
        Msg::Tick(token) => {
            let mut scheduler = SeedScheduler { orders };
            model.viewer.handle_tick(token, &mut scheduler);
        }
        Msg::DismissError => model.viewer.dismiss_error(),
        Msg::ClearRoutes => {
            model.viewer.clear_routes();
            model.form.clear_points();
            model.click_mode = ClickMode::Start;
            model.point_info = None;
            model.viewer.surface().show_selection(None, None);
        }
    }
}

fn playback(model: &mut Model, orders: &mut impl Orders<Msg>, control: PlaybackControl) {
    let mut scheduler = SeedScheduler { orders };
    if let Err(err) = model.viewer.on_playback_control(control, &mut scheduler) {
        web_sys::console::warn_1(&format!("[frontend] playback: {err}").into());
    }
}

async fn send_plan_request(request: PlanRequest) -> Msg {
    web_sys::console::debug_1(
        &format!(
            "[frontend] sending plan request start=({:.5},{:.5}) goal=({:.5},{:.5})",
            request.start.lat, request.start.lon, request.goal.lat, request.goal.lon
        )
        .into(),
    );
    let url = format!("{}/plan", api_root());
    let response = match Request::new(url).method(Method::Post).json(&request) {
        Err(err) => Err(format!("{err:?}")),
        Ok(request) => match request.fetch().await {
            Err(err) => Err(format!("{err:?}")),
            Ok(raw) if !raw.status().is_ok() => {
                let status = raw.status().code;
                let body = raw.json::<serde_json::Value>().await.ok();
                Err(error_message_from_body(status, body.as_ref()))
            }
            Ok(raw) => match raw.json::<PlanResponse>().await {
                Ok(plan) => Ok(plan),
                Err(err) => Err(format!("{err:?}")),
            },
        },
    };

    Msg::PlanFetched(response)
}

async fn fetch_track(path: String) -> Msg {
    let name = SAMPLE_ROUTES
        .iter()
        .find(|(_, sample)| *sample == path)
        .map_or_else(|| path.clone(), |(name, _)| name.to_string());
    let gpx = match Request::new(path.as_str()).fetch().await {
        Err(err) => Err(format!("{err:?}")),
        Ok(raw) => match raw.check_status() {
            Err(status_err) => Err(format!("{status_err:?}")),
            Ok(resp) => resp.text().await.map_err(|err| format!("{err:?}")),
        },
    };
    Msg::TrackFetched { name, gpx }
}

async fn read_track_file(file: web_sys::File) -> Msg {
    let name = file.name();
    web_sys::console::log_1(&format!("[frontend] reading {name}").into());
    let gpx = JsFuture::from(file.text())
        .await
        .map_err(|err| format!("{err:?}"))
        .and_then(|text| {
            text.as_string()
                .ok_or_else(|| "file content is not text".to_string())
        });
    Msg::TrackFetched { name, gpx }
}

pub fn view(model: &Model) -> Node<Msg> {
    div![
        C!["app-container"],
        h1!["Route viewer"],
        view_form(model),
        view_paths(model),
        view_playback(model),
        view_point_info(model),
    ]
}

fn view_form(model: &Model) -> Node<Msg> {
    let input_field = |label: &str, value: &str, msg: fn(String) -> Msg| {
        div![
            C!["input-field"],
            label![label],
            input![
                attrs! {
                    At::Value => value,
                    At::AutoComplete => "off",
                    At::SpellCheck => "false",
                },
                input_ev(Ev::Input, msg),
            ]
        ]
    };
    let click_mode = |mode: ClickMode, text: &str| {
        label![
            input![
                attrs! {
                    At::Type => "radio",
                    At::Name => "click-mode",
                    At::Checked => bool_attr(model.click_mode == mode),
                },
                ev(Ev::Change, move |_| Msg::SetClickMode(mode)),
            ],
            span![text],
        ]
    };

    form![
        C!["controls"],
        fieldset![
            legend!["Track"],
            select![
                option![attrs! { At::Value => "" }, "Choose a sample route"],
                SAMPLE_ROUTES
                    .iter()
                    .map(|(name, path)| option![attrs! { At::Value => *path }, *name]),
                input_ev(Ev::Change, Msg::LoadSample),
                attrs! { At::Disabled => bool_attr(model.loading_track) },
            ],
            input![
                attrs! {
                    At::Type => "file",
                    At::Accept => ".gpx",
                    At::Disabled => bool_attr(model.loading_track),
                },
                ev(Ev::Change, |event| {
                    let file = event
                        .target()?
                        .dyn_into::<web_sys::HtmlInputElement>()
                        .ok()?
                        .files()?
                        .get(0)?;
                    Some(Msg::TrackFileChosen(file))
                }),
            ],
        ],
        fieldset![
            legend!["Points"],
            input_field("Start latitude", &model.form.start_lat, Msg::StartLatChanged),
            input_field("Start longitude", &model.form.start_lon, Msg::StartLonChanged),
            input_field("Goal latitude", &model.form.goal_lat, Msg::GoalLatChanged),
            input_field("Goal longitude", &model.form.goal_lon, Msg::GoalLonChanged),
        ],
        fieldset![
            legend!["Map click"],
            div![
                C!["click-mode"],
                click_mode(ClickMode::Start, "Start"),
                click_mode(ClickMode::Goal, "Goal"),
                click_mode(ClickMode::Inspect, "Inspect"),
            ],
        ],
        fieldset![
            legend!["Planning"],
            select![
                Preset::ALL.iter().map(|preset| option![
                    attrs! {
                        At::Value => preset.key(),
                        At::Selected => bool_attr(*preset == model.form.preset),
                    },
                    preset.label()
                ]),
                input_ev(Ev::Change, Msg::PresetChanged),
            ],
            if model.form.preset == Preset::MultiPath {
                input_field(
                    "Alternatives",
                    &model.form.alternatives,
                    Msg::AlternativesChanged,
                )
            } else {
                empty![]
            },
        ],
        button![
            if model.viewer.is_planning() {
                "Planning..."
            } else {
                "Plan route"
            },
            ev(Ev::Click, |event| {
                event.prevent_default();
                Msg::Submit
            }),
            attrs! { At::Disabled => bool_attr(model.viewer.is_planning()) },
        ],
        if let Some(error) = model.viewer.last_error() {
            div![
                C!["error"],
                p![error],
                button![
                    "Dismiss",
                    ev(Ev::Click, |event| {
                        event.prevent_default();
                        Msg::DismissError
                    }),
                ],
            ]
        } else {
            empty![]
        }
    ]
}

fn view_paths(model: &Model) -> Node<Msg> {
    let registry = model.viewer.registry();
    if registry.is_empty() {
        return div![
            C!["preview"],
            h2!["No route"],
            p!["Load a track or plan a route to display it."]
        ];
    }
    let active = model.viewer.active_path();
    let rows = registry.iter().map(|entry| {
        let id = entry.id;
        let visible = entry.visible;
        div![
            C!["path-row", IF!(active == Some(id) => "active")],
            style! { St::BorderLeft => format!("4px solid {}", entry.color()) },
            input![
                attrs! {
                    At::Type => "checkbox",
                    At::Checked => bool_attr(visible),
                },
                ev(Ev::Change, move |_| Msg::TogglePath(id, !visible)),
            ],
            entry.rank.map(|rank| {
                span![
                    C!["rank"],
                    style! { St::BackgroundColor => rank_color(rank) },
                    format!("#{rank}")
                ]
            }),
            span![entry.label.clone().unwrap_or_else(|| id.to_string())],
            button![
                "Select",
                ev(Ev::Click, move |event| {
                    event.prevent_default();
                    Msg::SelectPath(id)
                }),
            ],
            entry.statistics.as_ref().map(view_path_scores),
        ]
    });

    div![
        C!["preview"],
        h2!["Paths"],
        button![
            "Toggle all",
            ev(Ev::Click, |event| {
                event.prevent_default();
                Msg::ToggleAll
            }),
        ],
        button![
            "Clear",
            ev(Ev::Click, |event| {
                event.prevent_default();
                Msg::ClearRoutes
            }),
        ],
        rows,
        view_statistics(model),
    ]
}

fn view_path_scores(stats: &PathStatistics) -> Node<Msg> {
    let figure = |label: &str, value: Option<f64>, unit: &str, precision: usize| {
        span![
            C!["path-figure"],
            format!(
                "{label}: {}",
                value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.precision$}{unit}"))
            )
        ]
    };
    let score = |label: &str, value: Option<f64>| {
        value.map(|value| {
            div![
                C!["score-bar"],
                span![label],
                progress![attrs! { At::Value => value, At::Max => 100 }],
                small![format!("{value:.1}")],
            ]
        })
    };
    let terrain = dominant_terrain(stats, 3);

    div![
        C!["path-stats"],
        figure("Distance", stats.total_distance_km, " km", 2),
        figure("Ascent", stats.total_ascent, " m", 0),
        figure("Score", stats.overall_score, "/100", 1),
        figure("Max slope", stats.max_slope, "°", 1),
        score("Distance", stats.distance_score),
        score("Elevation", stats.elevation_score),
        score("Safety", stats.safety_score),
        score("Terrain", stats.terrain_score),
        IF!(!terrain.is_empty() => div![
            C!["terrain-composition"],
            terrain
                .iter()
                .map(|(kind, share)| span![format!("{kind}: {share:.1}%")]),
        ]),
    ]
}

fn view_statistics(model: &Model) -> Node<Msg> {
    let Some(stats) = model.viewer.statistics() else {
        return empty![];
    };
    let card = |label: &str, content: String| {
        div![
            C!["metadata-card"],
            span![C!["label"], label],
            strong![content],
        ]
    };
    let export = match model.viewer.active_gpx_data_url() {
        Ok(Some(url)) => a![
            attrs! { At::Href => url, At::Download => "route.gpx" },
            "Download GPX"
        ],
        Ok(None) => empty![],
        Err(err) => small![format!("GPX export unavailable: {err}")],
    };

    div![
        C!["metadata-grid"],
        card("Distance", format!("{:.2} km", stats.total_distance_km)),
        card("Waypoints", stats.waypoint_count.to_string()),
        card("Elevation gain", format!("{:.0} m", stats.elevation_gain_m)),
        card("Elevation loss", format!("{:.0} m", stats.elevation_loss_m)),
        stats
            .max_slope_deg
            .map(|slope| card("Max slope", format!("{slope:.1}°"))),
        stats
            .overall_score
            .map(|score| card("Score", format!("{score:.2}"))),
        model
            .viewer
            .computation_time_seconds()
            .map(|seconds| card("Computed in", format!("{seconds:.2} s"))),
        export,
        model.viewer.terrain_info().map(|info| {
            div![
                C!["terrain-info"],
                h4!["Terrain data"],
                describe_terrain(info).into_iter().map(|line| p![line]),
            ]
        }),
    ]
}

fn view_playback(model: &Model) -> Node<Msg> {
    let state = model.viewer.playback_state();
    if state.status == PlaybackStatus::Idle {
        return empty![];
    }
    let control = |text: &str, control: PlaybackControl| {
        button![
            text,
            ev(Ev::Click, move |event| {
                event.prevent_default();
                Msg::Playback(control)
            }),
        ]
    };
    let trail_enabled = state.trail_enabled;

    fieldset![
        C!["playback"],
        legend!["Simulation"],
        if state.is_playing {
            control("Pause", PlaybackControl::Pause)
        } else {
            control("Play", PlaybackControl::Play)
        },
        control("Reset", PlaybackControl::Reset),
        select![
            SPEEDS.iter().map(|speed| option![
                attrs! {
                    At::Value => speed,
                    At::Selected => bool_attr(*speed == state.speed_multiplier),
                },
                format!("{speed}x")
            ]),
            input_ev(Ev::Change, Msg::SpeedChanged),
        ],
        select![
            CameraMode::ALL.iter().map(|mode| option![
                attrs! {
                    At::Value => mode.as_str(),
                    At::Selected => bool_attr(*mode == state.camera_mode),
                },
                mode.as_str()
            ]),
            input_ev(Ev::Change, Msg::CameraModeChanged),
        ],
        label![
            input![
                attrs! {
                    At::Type => "checkbox",
                    At::Checked => bool_attr(trail_enabled),
                },
                ev(Ev::Change, move |_| Msg::Playback(
                    PlaybackControl::SetTrailEnabled(!trail_enabled)
                )),
            ],
            span!["Trail"],
        ],
        progress![attrs! {
            At::Value => state.current_index,
            At::Max => state.total_points.saturating_sub(1).max(1),
        }],
        small![format!(
            "{}/{}",
            state.current_index + 1,
            state.total_points
        )],
    ]
}

fn view_point_info(model: &Model) -> Node<Msg> {
    let Some(info) = &model.point_info else {
        return empty![];
    };
    div![
        C!["point-info"],
        h3!["Location"],
        p![format!(
            "Latitude {:.6}° ({})",
            info.coordinate.lat, info.latitude_dms
        )],
        p![format!(
            "Longitude {:.6}° ({})",
            info.coordinate.lon, info.longitude_dms
        )],
        p![info
            .terrain_elevation
            .map_or_else(|| "No terrain data".to_string(), |e| format!("Terrain {e:.2} m"))],
    ]
}

#[wasm_bindgen(start)]
pub fn start() {
    init_map();
    App::start("app", init, update, view);
}

fn sync_selection_markers(model: &Model) {
    model
        .viewer
        .surface()
        .show_selection(model.form.start(), model.form.goal());
}

fn bool_attr(value: bool) -> AtValue {
    if value {
        AtValue::Some("true".into())
    } else {
        AtValue::Ignored
    }
}

fn format_coord(value: f64) -> String {
    format!("{value:.5}")
}

#[derive(Deserialize)]
struct MapClickPayload {
    lat: f64,
    lon: f64,
}
