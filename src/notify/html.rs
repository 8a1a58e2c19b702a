//! HTML rendering of the nightly report.

use crate::core::report::ReportData;
use crate::core::schedule::NightWindow;
use crate::core::timezone::LocalZone;
use chrono::{NaiveDate, NaiveTime};
use std::fmt::Write;

const PRIMARY_COLOR: &str = "#2E86AB";
const BACKGROUND_COLOR: &str = "#F8F9FA";

/// Deployment details shown alongside the report.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub zone: LocalZone,
    pub window: NightWindow,
    /// Name of the host that produced the report
    pub hostname: String,
}

impl ReportContext {
    pub fn new(zone: LocalZone, window: NightWindow) -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown host".to_string());
        Self {
            zone,
            window,
            hostname,
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }
}

/// 12-hour clock display, e.g. `12:30 AM`.
pub fn format_time_display(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

/// Email subject for the report covering `date`.
pub fn report_subject(date: NaiveDate) -> String {
    format!("Bathroom Health Report - {}", date.format("%m/%d/%Y"))
}

/// Render the full HTML document for `report`.
pub fn render_report_html(report: &ReportData, context: &ReportContext) -> String {
    let zone = &context.zone;
    let mut html = String::with_capacity(4096);

    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("    <meta charset=\"utf-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    let _ = writeln!(
        html,
        "    <title>Bathroom Visits - {}</title>",
        escape_html(&report.report_date.format("%B %d, %Y").to_string())
    );
    html.push_str("    <style>\n");
    html.push_str(&stylesheet());
    html.push_str("    </style>\n</head>\n<body>\n");
    html.push_str("<div class=\"container\">\n");

    html.push_str("    <div class=\"header\">\n        <h1>Bathroom Visits</h1>\n");
    let _ = writeln!(
        html,
        "        <div class=\"date\">{}</div>\n    </div>",
        escape_html(&report.report_date.format("%A, %B %d, %Y").to_string())
    );

    html.push_str("    <div class=\"summary\">\n");
    let _ = writeln!(html, "        <h2>Total Visits: {}</h2>", report.total_visits);
    let _ = writeln!(
        html,
        "        <p>Monitoring period: {} - {} ({})</p>\n    </div>",
        format_time_display(context.window.start),
        format_time_display(context.window.end),
        escape_html(zone.name())
    );

    let visits = report.visits_chronological();
    if !visits.is_empty() {
        html.push_str("    <div class=\"visits\">\n        <h3>Visit Details</h3>\n");
        for (index, visit) in visits.iter().enumerate() {
            let start = zone.to_local(&visit.visit_start);
            let end = zone.to_local(&visit.visit_end);

            html.push_str("        <div class=\"visit-card\">\n");
            let _ = writeln!(
                html,
                "            <div class=\"visit-number\">#{}</div>",
                index + 1
            );
            let _ = writeln!(
                html,
                "            <div class=\"time-range\"><strong>{} - {} {}</strong></div>",
                start.format("%H:%M"),
                end.format("%H:%M"),
                escape_html(&start.format("%Z").to_string())
            );
            let _ = writeln!(
                html,
                "            <div class=\"visit-date\">{}</div>",
                escape_html(&start.format("%A, %B %d").to_string())
            );
            html.push_str("            <table class=\"visit-stats\">\n");
            let _ = writeln!(
                html,
                "                <tr><td>Duration</td><td class=\"value\">{:.1} min</td></tr>",
                visit.duration_minutes()
            );
            let _ = writeln!(
                html,
                "                <tr><td>Motion Events</td><td class=\"value\">{}</td></tr>",
                visit.event_count
            );
            html.push_str("            </table>\n        </div>\n");
        }
        html.push_str("    </div>\n");
    }

    html.push_str("    <div class=\"footer\">\n");
    let _ = writeln!(
        html,
        "        <p>Generated automatically by Bathroom Health Monitor on {}</p>",
        escape_html(&context.hostname)
    );
    let _ = writeln!(
        html,
        "        <p>All times displayed in {}</p>\n    </div>",
        escape_html(zone.name())
    );
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

fn stylesheet() -> String {
    format!(
        "        body {{ font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background-color: {BACKGROUND_COLOR}; color: #333; }}
        .container {{ max-width: 800px; margin: 0 auto; background: white; border-radius: 12px; overflow: hidden; }}
        .header {{ background: {PRIMARY_COLOR}; color: white; padding: 30px; text-align: center; }}
        .header h1 {{ margin: 0; font-size: 2rem; }}
        .summary {{ padding: 24px; text-align: center; background: {BACKGROUND_COLOR}; margin: 20px; border-radius: 8px; }}
        .visits {{ padding: 0 20px 20px; }}
        .visit-card {{ border: 1px solid #e9ecef; border-radius: 8px; padding: 16px; margin-bottom: 12px; }}
        .visit-number {{ display: inline-block; background: {PRIMARY_COLOR}; color: white; border-radius: 12px; padding: 4px 10px; font-size: 0.85rem; }}
        .visit-stats {{ width: 100%; border-collapse: collapse; margin-top: 8px; }}
        .visit-stats .value {{ text-align: right; font-weight: 600; }}
        .footer {{ background: {BACKGROUND_COLOR}; padding: 20px; text-align: center; color: #666; font-size: 0.85rem; }}
"
    )
}

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
