use crate::config::HeatmapConfig;
use crate::processing::{PolicyScore, StatusRow, TableRow};
use crate::types::{CityRecord, PolicyFlag, PolicyStatus};
use geo::{LineString, MultiPolygon};
use std::f64::consts::PI;
use std::fmt::Write;

const TABLE_STYLES: &str = r#"<style>
    table {
        width: 100%;
        border-collapse: collapse;
        font-family: Arial, sans-serif;
    }
    th {
        background-color: #4CAF50;
        color: white;
        padding: 12px;
        text-align: left;
    }
    td {
        padding: 8px;
        text-align: left;
        background-color: #f9f9f9;
        border: 1px solid #ddd;
    }
    tr:nth-child(even) {
        background-color: #f2f2f2;
    }
    tr:hover {
        background-color: #ddd;
    }
</style>"#;

// Policy chart geometry
const CHART_WIDTH: f64 = 1000.0;
const CHART_HEIGHT: f64 = 400.0;
const LABEL_WIDTH: f64 = 360.0;
const CHART_HEADER: f64 = 70.0;
const CHART_DOMAIN: f64 = 0.5;
const IMPLEMENTED_FILL: &str = "lightgreen";
const NOT_IMPLEMENTED_FILL: &str = "lightcoral";

// Heatmap geometry
const MAP_TITLE_HEIGHT: f64 = 50.0;
const MAP_PADDING: f64 = 30.0;
const MIN_BUBBLE_RADIUS: f64 = 2.0;
// Smallest mercator span fitted to the viewport, about 3.6 degrees of longitude.
const MIN_SPAN: f64 = 0.01;
const MAX_LATITUDE: f64 = 85.051_128_78;

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// A visible error block for any output region.
pub fn render_message(message: &str) -> String {
    format!(
        r#"<div class="message" role="alert" style="padding: 12px; border: 1px solid #e0b4b4; background-color: #fff6f6; color: #9f3a38; font-family: Arial, sans-serif;">{}</div>"#,
        html_escape(message)
    )
}

pub fn render_table(rows: &[TableRow]) -> String {
    let mut body = String::new();
    for row in rows {
        let _ = write!(
            body,
            "\n      <tr>\n        <td>{}</td>\n        <td>{}</td>\n      </tr>",
            html_escape(&row.property),
            html_escape(&row.value)
        );
    }

    format!(
        r#"{styles}
<table class="dataframe">
  <thead>
    <tr>
      <th>Property</th>
      <th>Value</th>
    </tr>
  </thead>
  <tbody>{body}
  </tbody>
</table>"#,
        styles = TABLE_STYLES,
        body = body,
    )
}

/// Python-style float display: integral values keep one decimal.
fn display_float(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Diverging bar chart with the x domain fixed at [-0.5, 0.5].
pub fn render_policy_chart(record: &CityRecord, scores: &[PolicyScore]) -> String {
    let width = LABEL_WIDTH + CHART_WIDTH + 20.0;
    let height = CHART_HEADER + CHART_HEIGHT + 20.0;
    let center = LABEL_WIDTH + CHART_WIDTH / 2.0;
    let half = CHART_WIDTH / 2.0;
    let band = CHART_HEIGHT / scores.len().max(1) as f64;
    let bar_height = band * 0.8;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="policy-chart" xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="Arial, sans-serif">"#
    );
    let _ = write!(
        svg,
        r##"<rect x="{LABEL_WIDTH}" y="{CHART_HEADER}" width="{CHART_WIDTH}" height="{CHART_HEIGHT}" fill="#f9f9f9"/>"##
    );

    let annotation = format!(
        "City's Population (in thousands): {}, Total Fatal Encounters: {}",
        display_float(record.population as f64 / 1000.0),
        record.incidents
    );
    let _ = write!(
        svg,
        r#"<text class="annotation" x="{center}" y="18" text-anchor="middle" font-size="12">{}</text>"#,
        html_escape(&annotation)
    );

    let legend_offset = 0.3 / CHART_DOMAIN * half;
    let _ = write!(
        svg,
        r#"<text class="legend" x="{}" y="48" text-anchor="middle" font-size="12" font-weight="bold" fill="black">Policy Not Implemented</text>"#,
        center - legend_offset
    );
    let _ = write!(
        svg,
        r#"<text class="legend" x="{}" y="48" text-anchor="middle" font-size="12" font-weight="bold" fill="black">Policy Implemented</text>"#,
        center + legend_offset
    );

    for (i, score) in scores.iter().enumerate() {
        let value = score.implementation_adjusted.clamp(-CHART_DOMAIN, CHART_DOMAIN);
        let length = value.abs() / CHART_DOMAIN * half;
        let x = if value > 0.0 { center } else { center - length };
        let y = CHART_HEADER + i as f64 * band + (band - bar_height) / 2.0;
        let fill = if value > 0.0 { IMPLEMENTED_FILL } else { NOT_IMPLEMENTED_FILL };
        let policy = html_escape(&score.policy);

        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" text-anchor="end" dominant-baseline="middle" font-size="11" font-weight="bold">{policy}</text>"#,
            LABEL_WIDTH - 8.0,
            y + bar_height / 2.0
        );
        let _ = write!(
            svg,
            r#"<rect class="bar" data-policy="{policy}" data-score="{}" fill="{fill}" x="{x}" y="{y}" width="{length}" height="{bar_height}"><title>Policy: {policy}, Implementation_Adjusted: {}</title></rect>"#,
            score.implementation_adjusted, score.implementation_adjusted
        );
    }

    svg.push_str("</svg>");
    svg
}

/// Web Mercator position in world units, both axes in [0, 1].
fn mercator(lat: f64, lon: f64) -> (f64, f64) {
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lon + 180.0) / 360.0;
    let y = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0;
    (x, y)
}

/// Maps mercator world units onto the SVG canvas, fitted to a set of points.
#[derive(Debug, Clone, Copy)]
struct Viewport {
    min_x: f64,
    min_y: f64,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    fn fit(points: &[(f64, f64)], width: f64, height: f64) -> Self {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let span_x = (max_x - min_x).max(MIN_SPAN);
        let span_y = (max_y - min_y).max(MIN_SPAN);
        let avail_w = (width - 2.0 * MAP_PADDING).max(1.0);
        let avail_h = (height - MAP_TITLE_HEIGHT - 2.0 * MAP_PADDING).max(1.0);
        let scale = (avail_w / span_x).min(avail_h / span_y);

        Self {
            min_x,
            min_y,
            scale,
            offset_x: MAP_PADDING + (avail_w - (max_x - min_x) * scale) / 2.0,
            offset_y: MAP_TITLE_HEIGHT + MAP_PADDING + (avail_h - (max_y - min_y) * scale) / 2.0,
        }
    }

    fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (x, y) = mercator(lat, lon);
        (
            (x - self.min_x) * self.scale + self.offset_x,
            (y - self.min_y) * self.scale + self.offset_y,
        )
    }

    fn ring_path(&self, ring: &LineString<f64>, path: &mut String) {
        for (i, coord) in ring.0.iter().enumerate() {
            let (x, y) = self.project(coord.y, coord.x);
            let _ = write!(path, "{}{:.1} {:.1} ", if i == 0 { "M" } else { "L" }, x, y);
        }
        path.push_str("Z ");
    }
}

/// Bubble area is proportional to the incident count.
pub fn bubble_radius(incidents: u64, max_incidents: u64, max_radius: f64) -> f64 {
    if max_incidents == 0 {
        return MIN_BUBBLE_RADIUS;
    }
    let radius = max_radius * (incidents as f64 / max_incidents as f64).sqrt();
    radius.max(MIN_BUBBLE_RADIUS)
}

/// Bubble map of policy status, optionally drawn over boundary outlines.
pub fn render_heatmap(
    rows: &[StatusRow],
    flag: PolicyFlag,
    boundaries: &[MultiPolygon<f64>],
    options: &HeatmapConfig,
) -> String {
    let width = options.width as f64;
    let height = options.height as f64;
    let title = format!(
        "Policy Status and Incident Heatmap: {}",
        flag.column().replace('_', " ")
    );

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="heatmap" xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="Arial, sans-serif">"#
    );
    let _ = write!(
        svg,
        r#"<text class="title" x="10" y="30" font-size="17">{}</text>"#,
        html_escape(&title)
    );

    let plotted: Vec<(&StatusRow, f64, f64)> = rows
        .iter()
        .filter_map(|row| Some((row, row.latitude?, row.longitude?)))
        .collect();

    if plotted.is_empty() {
        let _ = write!(
            svg,
            r#"<text class="empty" x="{}" y="{}" text-anchor="middle" font-size="14">No cities with coordinates to plot</text></svg>"#,
            width / 2.0,
            height / 2.0
        );
        return svg;
    }

    let world: Vec<(f64, f64)> = plotted.iter().map(|&(_, lat, lon)| mercator(lat, lon)).collect();
    let viewport = Viewport::fit(&world, width, height);

    let _ = write!(
        svg,
        r##"<rect x="0" y="{MAP_TITLE_HEIGHT}" width="{width}" height="{}" fill="#f2f2f2"/>"##,
        height - MAP_TITLE_HEIGHT
    );

    if !boundaries.is_empty() {
        let mut path = String::new();
        for multi in boundaries {
            for polygon in multi {
                viewport.ring_path(polygon.exterior(), &mut path);
                for interior in polygon.interiors() {
                    viewport.ring_path(interior, &mut path);
                }
            }
        }
        let _ = write!(
            svg,
            r##"<path class="boundaries" d="{}" fill="#ffffff" fill-rule="evenodd" stroke="#b0b0b0" stroke-width="0.8"/>"##,
            path.trim_end()
        );
    }

    let max_incidents = plotted.iter().map(|(row, _, _)| row.incidents).max().unwrap_or(0);
    let mut bubbles: Vec<(&StatusRow, f64, f64, f64)> = plotted
        .iter()
        .map(|&(row, lat, lon)| {
            let (x, y) = viewport.project(lat, lon);
            let r = bubble_radius(row.incidents, max_incidents, options.max_bubble_radius);
            (row, x, y, r)
        })
        .collect();
    // Large bubbles underneath so small ones stay hoverable.
    bubbles.sort_by(|a, b| b.3.total_cmp(&a.3));

    for (row, x, y, r) in bubbles {
        let hover = format!(
            "{}, {}\n{}: {}\nNumber_of_Incidents: {}\nCity Population: {}",
            row.city, row.state, flag.column(), row.value, row.incidents, row.population
        );
        let _ = write!(
            svg,
            r#"<circle class="bubble" data-city="{}" data-status="{}" cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" fill-opacity="0.7" stroke="white" stroke-width="0.5"><title>{}</title></circle>"#,
            html_escape(&row.city),
            row.status.label(),
            x,
            y,
            r,
            row.status.color(),
            html_escape(&hover)
        );
    }

    let legend_x = width - 170.0;
    let _ = write!(
        svg,
        r#"<g class="legend"><text x="{legend_x}" y="{}" font-size="12" font-weight="bold">Policy Status</text>"#,
        MAP_TITLE_HEIGHT + 20.0
    );
    for (i, status) in [PolicyStatus::NotImplemented, PolicyStatus::Implemented].iter().enumerate() {
        let y = MAP_TITLE_HEIGHT + 40.0 + i as f64 * 20.0;
        let _ = write!(
            svg,
            r#"<circle cx="{}" cy="{}" r="6" fill="{}"/><text x="{}" y="{}" font-size="12" dominant-baseline="middle">{}</text>"#,
            legend_x + 6.0,
            y,
            status.color(),
            legend_x + 18.0,
            y,
            status.label()
        );
    }
    svg.push_str("</g></svg>");
    svg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::sample_dataset;
    use crate::processing::{diverging_scores, format_table, label_policy_status};
    use geo::polygon;

    #[test]
    fn escapes_markup() {
        assert_eq!(html_escape("<b>\"A&B's\"</b>"), "&lt;b&gt;&quot;A&amp;B&#39;s&quot;&lt;/b&gt;");
    }

    #[test]
    fn table_has_styles_and_rows() {
        let dataset = sample_dataset();
        let html = render_table(&format_table(dataset.find_city("Springfield").unwrap()));
        assert!(html.starts_with("<style>"));
        assert!(html.contains("background-color: #4CAF50;"));
        assert!(html.contains("<th>Property</th>"));
        assert!(html.contains("<td>Requires De Escalation</td>\n        <td>Yes</td>"));
        assert!(html.contains("<td>Has Use Of Force Continuum</td>\n        <td>No</td>"));
    }

    #[test]
    fn chart_bars_diverge_from_center() {
        let dataset = sample_dataset();
        let record = dataset.find_city("Springfield").unwrap();
        let svg = render_policy_chart(record, &diverging_scores(record));

        let center = LABEL_WIDTH + CHART_WIDTH / 2.0;
        assert!(svg.contains(&format!(
            r#"data-policy="Requires De Escalation" data-score="0.5" fill="lightgreen" x="{center}""#
        )));
        assert!(svg.contains(&format!(
            r#"data-policy="Has Use Of Force Continuum" data-score="-0.5" fill="lightcoral" x="{}""#,
            center - CHART_WIDTH / 2.0
        )));
        assert_eq!(svg.matches(r#"width="500""#).count(), 8);
        assert!(svg.contains("City&#39;s Population (in thousands): 114.0, Total Fatal Encounters: 12"));
        assert!(svg.contains("Policy Not Implemented"));
        assert!(svg.contains(">Policy Implemented<"));
    }

    #[test]
    fn chart_domain_is_fixed() {
        let dataset = sample_dataset();
        let record = dataset.find_city("Austin").unwrap();
        let mut scores = diverging_scores(record);
        scores[0].implementation_adjusted = 4.0;
        let svg = render_policy_chart(record, &scores);
        assert!(!svg.contains(r#"width="4000""#));
        assert_eq!(svg.matches(r#"width="500""#).count(), 8);
    }

    #[test]
    fn population_display_matches_float_formatting() {
        assert_eq!(display_float(114.0), "114.0");
        assert_eq!(display_float(961.855), "961.855");
    }

    #[test]
    fn bubbles_scale_by_area() {
        assert_eq!(bubble_radius(100, 100, 20.0), 20.0);
        assert_eq!(bubble_radius(25, 100, 20.0), 10.0);
        assert_eq!(bubble_radius(0, 100, 20.0), MIN_BUBBLE_RADIUS);
        assert_eq!(bubble_radius(0, 0, 20.0), MIN_BUBBLE_RADIUS);
    }

    #[test]
    fn mercator_keeps_orientation() {
        let (west, _) = mercator(0.0, -100.0);
        let (east, _) = mercator(0.0, -80.0);
        let (_, north) = mercator(45.0, 0.0);
        let (_, south) = mercator(30.0, 0.0);
        assert!(west < east);
        assert!(north < south);
        assert_eq!(mercator(0.0, 0.0), (0.5, 0.5));
    }

    #[test]
    fn heatmap_colors_by_status_and_skips_unplaced_rows() {
        let dataset = sample_dataset();
        let rows = label_policy_status(&dataset, PolicyFlag::BansChokeholdsAndStrangleholds);
        let svg = render_heatmap(&rows, PolicyFlag::BansChokeholdsAndStrangleholds, &[], &HeatmapConfig::default());

        assert!(svg.contains("Policy Status and Incident Heatmap: Bans Chokeholds and Strangleholds"));
        assert!(svg.contains(r#"data-city="Springfield" data-status="Implemented""#));
        assert!(svg.contains(r#"data-city="Austin" data-status="Not Implemented""#));
        assert!(!svg.contains(r#"data-city="Boise""#));
        assert!(svg.contains(r#"fill="Green""#));
        assert!(svg.contains(r#"fill="Red""#));
        assert!(svg.contains("Policy Status</text>"));
    }

    #[test]
    fn heatmap_bubbles_stay_inside_canvas() {
        let dataset = sample_dataset();
        let rows = label_policy_status(&dataset, PolicyFlag::DutyToIntervene);
        let options = HeatmapConfig::default();
        let world: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|r| Some(mercator(r.latitude?, r.longitude?)))
            .collect();
        let viewport = Viewport::fit(&world, options.width as f64, options.height as f64);
        for row in rows.iter().filter(|r| r.latitude.is_some()) {
            let (x, y) = viewport.project(row.latitude.unwrap(), row.longitude.unwrap());
            assert!(x >= MAP_PADDING - 1e-9 && x <= options.width as f64 - MAP_PADDING + 1e-9);
            assert!(y >= MAP_TITLE_HEIGHT && y <= options.height as f64);
        }
    }

    #[test]
    fn heatmap_draws_boundaries() {
        let dataset = sample_dataset();
        let rows = label_policy_status(&dataset, PolicyFlag::DutyToIntervene);
        let outline = MultiPolygon::new(vec![polygon![
            (x: -91.0, y: 37.0),
            (x: -80.0, y: 37.0),
            (x: -80.0, y: 47.0),
            (x: -91.0, y: 37.0),
        ]]);
        let svg = render_heatmap(&rows, PolicyFlag::DutyToIntervene, &[outline], &HeatmapConfig::default());
        assert!(svg.contains(r#"<path class="boundaries" d="M"#));
    }

    #[test]
    fn heatmap_without_coordinates_says_so() {
        let svg = render_heatmap(&[], PolicyFlag::DutyToIntervene, &[], &HeatmapConfig::default());
        assert!(svg.contains("No cities with coordinates to plot"));
    }

    #[test]
    fn message_is_escaped() {
        let html = render_message("City not found: <Atlantis>");
        assert!(html.contains("role=\"alert\""));
        assert!(html.contains("City not found: &lt;Atlantis&gt;"));
    }
}
