use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::db::DbCountry;

const WIDTH: u32 = 600;
const HEIGHT: u32 = 400;

/// Renders the summary card: totals, last refresh time and the GDP ranking.
pub(crate) fn render_summary_svg(
    top: &[DbCountry],
    total_countries: i64,
    refreshed_at: DateTime<Utc>,
) -> String {
    let mut svg = String::with_capacity(2048);

    let _ = write!(
        svg,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="Inter, Helvetica, Arial, sans-serif">
  <rect x="0" y="0" width="{WIDTH}" height="{HEIGHT}" fill="#f8f9fa"/>
  <rect x="2" y="2" width="{w}" height="{h}" fill="#ffffff" stroke="#343a40" stroke-width="4" rx="12"/>
  <text x="{cx}" y="50" text-anchor="middle" font-size="30" font-weight="700" fill="#007bff">API Cache Summary</text>
  <text x="50" y="100" font-size="18" fill="#343a40">Total Countries: <tspan font-weight="600">{total_countries}</tspan></text>
  <text x="50" y="130" font-size="18" fill="#343a40">Last Refresh: <tspan font-weight="600">{stamp}</tspan></text>
  <text x="50" y="180" font-size="22" font-weight="600" fill="#28a745">Top {n} Countries by Estimated GDP (USD)</text>
"##,
        w = WIDTH - 4,
        h = HEIGHT - 4,
        cx = WIDTH / 2,
        stamp = refreshed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        n = top.len(),
    );

    for (index, country) in top.iter().enumerate() {
        let y = 215 + index * 30;
        let _ = writeln!(
            svg,
            r##"  <text x="60" y="{y}" font-size="16" fill="#343a40"><tspan font-weight="700">{rank}.</tspan> {name}: <tspan font-weight="600" fill="#007bff">{gdp}</tspan></text>"##,
            rank = index + 1,
            name = escape_xml(&country.name),
            gdp = format_usd(country.estimated_gdp.unwrap_or(0.0)),
        );
    }

    svg.push_str("</svg>\n");
    svg
}

/// `1234567.8` -> `$1,234,568`.
pub(crate) fn format_usd(value: f64) -> String {
    let rounded = value.round();
    if !rounded.is_finite() {
        return "$0".to_string();
    }
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

pub(crate) fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
