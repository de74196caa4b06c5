//! Page shells for the two dashboards.
//!
//! Inputs submit their form on change, so every selection is a fresh GET
//! that recomputes the output region on the server.

use crate::processing::View;
use crate::render::html_escape;
use crate::types::PolicyFlag;
use std::fmt::Write;

pub const HEATMAP_DESCRIPTION: &str =
    "Bubble Size Represents Total Number of Incidents (fatal encounters by police)";

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 0 auto; max-width: 1400px; padding: 16px; }}
        label {{ display: block; margin: 8px 0 4px; }}
        select {{ min-width: 300px; padding: 4px; }}
        nav a {{ margin-right: 12px; }}
    </style>
</head>
<body>
    <nav><a href="/">Home</a><a href="/city">City dashboard</a><a href="/heatmap">Heatmap</a></nav>
    {body}
</body>
</html>"#,
        title = html_escape(title),
        body = body,
    )
}

pub fn render_index(city_count: usize) -> String {
    page(
        "Police Use of Force Policy Dashboards",
        &format!(
            r#"<h2>Police Use of Force Policy Dashboards</h2>
    <p>{city_count} cities loaded.</p>
    <ul>
        <li><a href="/city">City Policy Data</a>: policy table or chart for one city</li>
        <li><a href="/heatmap">US Cities Policy and Incident Heatmap</a>: policy status map</li>
    </ul>"#
        ),
    )
}

pub fn render_city_page(cities: &[String], selected: Option<&str>, view: View, dashboard: &str) -> String {
    let mut options = String::new();
    for city in cities {
        let escaped = html_escape(city);
        let marker = if Some(city.as_str()) == selected { " selected" } else { "" };
        let _ = write!(options, "\n            <option value=\"{escaped}\"{marker}>{escaped}</option>");
    }
    let checked = if view.is_switched() { " checked" } else { "" };

    page(
        "City Policy Data",
        &format!(
            r#"<h3>City Policy Data</h3>
    <form method="get" action="/city">
        <label><input type="checkbox" id="switch_view" name="switch_view" value="on"{checked} onchange="this.form.submit()"> Switch View</label>
        <label for="city">Choose a city</label>
        <select id="city" name="city" onchange="this.form.submit()">{options}
        </select>
        <noscript><button type="submit">Show</button></noscript>
    </form>
    <div id="dashboard">{dashboard}</div>"#
        ),
    )
}

pub fn render_heatmap_page(selected: &str, map: &str) -> String {
    let mut options = String::new();
    for flag in PolicyFlag::ALL {
        let marker = if flag.column() == selected { " selected" } else { "" };
        let _ = write!(
            options,
            "\n            <option value=\"{}\"{marker}>{}</option>",
            flag.column(),
            html_escape(flag.selector_label())
        );
    }

    page(
        "US Cities Policy and Incident Heatmap",
        &format!(
            r#"<h2 style="text-align: center">US Cities Policy and Incident Heatmap</h2>
    <form method="get" action="/heatmap">
        <label for="variable">Select a Variable:</label>
        <select id="variable" name="variable" onchange="this.form.submit()">{options}
        </select>
        <noscript><button type="submit">Show</button></noscript>
    </form>
    <div id="heatmap">{map}</div>
    <pre id="description">{HEATMAP_DESCRIPTION}</pre>"#
        ),
    )
}
