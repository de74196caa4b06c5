use crate::config::AppConfig;
use crate::data::Dataset;
use crate::error::{DashboardError, DashboardResult};
use crate::pages::{render_city_page, render_heatmap_page, render_index};
use crate::processing::{diverging_scores, format_table, label_policy_status, View};
use crate::render::{render_heatmap, render_message, render_policy_chart, render_table};
use crate::types::{CityRecord, PolicyFlag};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Json},
    routing::get,
    Router,
};
use geo::{HaversineDistance, MultiPolygon, Point};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// Wrapper for RTree indexing, position is [lon, lat]
pub struct CityPoint {
    index: usize,
    position: [f64; 2],
}

impl RTreeObject for CityPoint {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for CityPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        dx * dx + dy * dy
    }
}

pub struct AppState {
    pub dataset: Dataset,
    pub tree: RTree<CityPoint>,
    pub boundaries: Vec<MultiPolygon<f64>>,
    pub config: AppConfig,
    default_flag: PolicyFlag,
}

impl AppState {
    pub fn new(config: AppConfig, dataset: Dataset, boundaries: Vec<MultiPolygon<f64>>) -> Result<Self> {
        let tree_items: Vec<CityPoint> = dataset.records().iter().enumerate()
            .filter_map(|(index, record)| {
                let (lat, lon) = record.coordinates()?;
                Some(CityPoint { index, position: [lon, lat] })
            })
            .collect();
        if dataset.is_empty() {
            warn!("Dataset has no cities; dashboards will report an empty selection");
        }
        info!("Indexed {} of {} cities by location", tree_items.len(), dataset.len());

        Ok(Self {
            default_flag: config.heatmap.default_flag()?,
            tree: RTree::bulk_load(tree_items),
            dataset,
            boundaries,
            config,
        })
    }

    /// Closest city to a point, with the great-circle distance in kilometres.
    pub fn nearest(&self, lat: f64, lon: f64) -> Option<(&CityRecord, f64)> {
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        let point = self.tree.nearest_neighbor(&[lon, lat])?;
        let record = self.dataset.records().get(point.index)?;
        let meters = Point::new(lon, lat)
            .haversine_distance(&Point::new(point.position[0], point.position[1]));
        Some((record, meters / 1000.0))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CityParams {
    city: Option<String>,
    switch_view: Option<String>,
}

impl CityParams {
    fn view(&self) -> View {
        View::from_switch(matches!(self.switch_view.as_deref(), Some("on" | "true" | "1")))
    }

    fn city(&self) -> Option<&str> {
        self.city.as_deref().filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HeatmapParams {
    variable: Option<String>,
}

#[derive(Deserialize)]
pub struct NearestParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
pub struct NearestResponse {
    distance_km: f64,
    record: CityRecord,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(|| async { "ok" }))
        .route("/city", get(city_page_handler))
        .route("/city/dashboard", get(city_dashboard_handler))
        .route("/heatmap", get(heatmap_page_handler))
        .route("/heatmap/map", get(heatmap_map_handler))
        .route("/api/cities", get(cities_handler))
        .route("/api/cities/:name", get(city_handler))
        .route("/api/nearest", get(nearest_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig, dataset: Dataset, boundaries: Vec<MultiPolygon<f64>>) -> Result<()> {
    let addr = config.socket_addr();
    let state = Arc::new(AppState::new(config, dataset, boundaries)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Serving dashboards on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Resolved city selection: the requested city, or the first one listed.
fn selected_city(dataset: &Dataset, params: &CityParams) -> DashboardResult<String> {
    match params.city() {
        Some(city) => Ok(city.to_string()),
        None => dataset.cities().into_iter().next().ok_or(DashboardError::NoCities),
    }
}

fn render_dashboard(dataset: &Dataset, city: &str, view: View) -> DashboardResult<String> {
    let record = dataset.find_city(city)?;
    Ok(match view {
        View::Table => render_table(&format_table(record)),
        View::Chart => render_policy_chart(record, &diverging_scores(record)),
    })
}

fn city_dashboard(state: &AppState, params: &CityParams) -> (StatusCode, Option<String>, String) {
    let result = selected_city(&state.dataset, params)
        .and_then(|city| render_dashboard(&state.dataset, &city, params.view()).map(|html| (city, html)));
    match result {
        Ok((city, html)) => (StatusCode::OK, Some(city), html),
        Err(err) => {
            warn!("City dashboard: {}", err);
            (err.status_code(), params.city().map(str::to_string), render_message(&err.to_string()))
        }
    }
}

fn heatmap_map(state: &AppState, params: &HeatmapParams) -> (StatusCode, String, String) {
    let selected = params.variable.clone()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| state.default_flag.column().to_string());
    let result = selected.parse::<PolicyFlag>()
        .map_err(DashboardError::UnknownVariable)
        .map(|flag| {
            let rows = label_policy_status(&state.dataset, flag);
            render_heatmap(&rows, flag, &state.boundaries, &state.config.heatmap)
        });
    match result {
        Ok(html) => (StatusCode::OK, selected, html),
        Err(err) => {
            warn!("Heatmap: {}", err);
            (err.status_code(), selected, render_message(&err.to_string()))
        }
    }
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(render_index(state.dataset.cities().len()))
}

async fn city_page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityParams>,
) -> (StatusCode, Html<String>) {
    let (status, city, dashboard) = city_dashboard(&state, &params);
    let cities = state.dataset.cities();
    let page = render_city_page(&cities, city.as_deref(), params.view(), &dashboard);
    (status, Html(page))
}

async fn city_dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityParams>,
) -> (StatusCode, Html<String>) {
    let (status, _, dashboard) = city_dashboard(&state, &params);
    (status, Html(dashboard))
}

async fn heatmap_page_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HeatmapParams>,
) -> (StatusCode, Html<String>) {
    let (status, selected, map) = heatmap_map(&state, &params);
    (status, Html(render_heatmap_page(&selected, &map)))
}

async fn heatmap_map_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HeatmapParams>,
) -> (StatusCode, Html<String>) {
    let (status, _, map) = heatmap_map(&state, &params);
    (status, Html(map))
}

async fn cities_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.dataset.cities())
}

async fn city_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> DashboardResult<Json<CityRecord>> {
    Ok(Json(state.dataset.find_city(&name)?.clone()))
}

async fn nearest_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NearestParams>,
) -> Json<Option<NearestResponse>> {
    Json(state.nearest(params.lat, params.lon).map(|(record, distance_km)| NearestResponse {
        distance_km,
        record: record.clone(),
    }))
}
