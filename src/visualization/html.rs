// HTML report template for a CsvAnalysis

use std::fmt::Write as _;

use super::{CsvAnalysis, VisualizationError};

const STYLE: &str = r#"
    body { font-family: Arial, sans-serif; padding: 15px; margin: 0; }
    .stats-table { border-collapse: collapse; width: 100%; margin-bottom: 20px; }
    .stats-table th, .stats-table td { border: 1px solid #ddd; padding: 8px; text-align: left; }
    .stats-table tr:nth-child(even) { background-color: #f2f2f2; }
    .stats-table th { padding-top: 12px; padding-bottom: 12px; background-color: #4CAF50; color: white; }
    .chart-container { height: 300px; margin-bottom: 30px; }
    .chart-title { font-weight: bold; margin: 10px 0; }
    .tab-buttons { overflow: hidden; border: 1px solid #ccc; background-color: #f1f1f1; }
    .tab-button { background-color: inherit; float: left; border: none; outline: none; cursor: pointer; padding: 14px 16px; }
    .tab-button:hover { background-color: #ddd; }
    .tab-button.active { background-color: #ccc; }
    .tab-content { display: none; padding: 6px 12px; border: 1px solid #ccc; border-top: none; }
    .active-tab { display: block; }
"#;

const TAB_SCRIPT: &str = r#"
    function openTab(evt, tabName) {
      var contents = document.getElementsByClassName("tab-content");
      for (var i = 0; i < contents.length; i++) {
        contents[i].className = contents[i].className.replace(" active-tab", "");
      }
      var buttons = document.getElementsByClassName("tab-button");
      for (var j = 0; j < buttons.length; j++) {
        buttons[j].className = buttons[j].className.replace(" active", "");
      }
      document.getElementById(tabName).className += " active-tab";
      evt.currentTarget.className += " active";
    }
"#;

pub(crate) fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON that is safe to inline inside a <script> element
fn script_json(value: &serde_json::Value) -> Result<String, VisualizationError> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

pub fn render_html(name: &str, analysis: &CsvAnalysis) -> Result<String, VisualizationError> {
    let has_charts = !analysis.charts.is_empty();
    let mut doc = String::new();

    // fmt::Write for String is infallible
    let _ = write!(
        doc,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>CSV Visualization</title>\n\
         <script src=\"https://cdn.jsdelivr.net/npm/chart.js\"></script>\n<style>{}</style>\n</head>\n<body>\n\
         <h2>CSV Analysis: {}</h2>\n<p>{} rows, {} columns</p>\n",
        STYLE,
        escape_html(name),
        analysis.total_rows,
        analysis.headers.len()
    );

    doc.push_str("<div class=\"tab-container\">\n<div class=\"tab-buttons\">\n");
    doc.push_str("<button class=\"tab-button active\" onclick=\"openTab(event, 'statistics')\">Statistics</button>\n");
    doc.push_str("<button class=\"tab-button\" onclick=\"openTab(event, 'data-preview')\">Data Preview</button>\n");
    if has_charts {
        doc.push_str("<button class=\"tab-button\" onclick=\"openTab(event, 'charts')\">Charts</button>\n");
    }
    doc.push_str("</div>\n");

    doc.push_str("<div id=\"statistics\" class=\"tab-content active-tab\">\n<h3>Summary Statistics</h3>\n");
    doc.push_str("<table class=\"stats-table\">\n<tr><th>Column</th><th>Min</th><th>Max</th><th>Mean</th><th>Count</th></tr>\n");
    for stat in &analysis.stats {
        let _ = writeln!(
            doc,
            "<tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td><td>{}</td></tr>",
            escape_html(&stat.column),
            stat.min,
            stat.max,
            stat.mean,
            stat.count
        );
    }
    doc.push_str("</table>\n</div>\n");

    doc.push_str("<div id=\"data-preview\" class=\"tab-content\">\n<h3>Data Preview</h3>\n<table class=\"stats-table\">\n<tr>");
    for header in &analysis.headers {
        let _ = write!(doc, "<th>{}</th>", escape_html(header));
    }
    doc.push_str("</tr>\n");
    for row in &analysis.preview {
        doc.push_str("<tr>");
        for cell in row {
            let _ = write!(doc, "<td>{}</td>", escape_html(cell));
        }
        doc.push_str("</tr>\n");
    }
    doc.push_str("</table>\n</div>\n");

    let mut init = String::new();
    if has_charts {
        doc.push_str("<div id=\"charts\" class=\"tab-content\">\n<h3>Visualizations</h3>\n");
        for chart in &analysis.charts {
            let _ = write!(
                doc,
                "<div class=\"chart-title\">{}</div>\n<div class=\"chart-container\"><canvas id=\"{}\"></canvas></div>\n",
                escape_html(&chart.title),
                chart.canvas_id
            );
            let _ = writeln!(
                init,
                "      new Chart(document.getElementById('{}'), {});",
                chart.canvas_id,
                script_json(&chart.config)?
            );
        }
        doc.push_str("</div>\n");
    }
    doc.push_str("</div>\n");

    let _ = write!(
        doc,
        "<script>{}\n    window.onload = function() {{\n{}    }};\n</script>\n</body>\n</html>\n",
        TAB_SCRIPT, init
    );

    Ok(doc)
}
