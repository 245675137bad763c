//! CSV Visualization
//!
//! Turns the text of an uploaded CSV into column statistics, a preview table
//! and Chart.js chart descriptors, then renders them as one self-contained
//! HTML document.
//!
//! Rows are split on newlines and cells on bare commas. Quoted fields and
//! escaped commas are not recognised.

pub mod html;
pub mod script;

use rand::Rng;
use serde::Serialize;
use serde_json::json;

pub use html::render_html;
pub use script::analysis_script;

/// Data rows considered for statistics
pub const STATS_ROW_LIMIT: usize = 500;
/// Data rows plotted in charts
pub const CHART_ROW_LIMIT: usize = 100;
/// Data rows shown in the preview table
pub const PREVIEW_ROW_LIMIT: usize = 10;
/// Series drawn on the bar and line charts
pub const CHART_SERIES_LIMIT: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum VisualizationError {
    #[error("CSV input is empty")]
    Empty,

    #[error("CSV header row has no column names")]
    MissingHeader,

    #[error("Failed to encode chart data: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartDescriptor {
    pub kind: ChartKind,
    pub canvas_id: String,
    pub title: String,
    /// Chart.js configuration object
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CsvAnalysis {
    /// Line count of the input, header included
    pub total_rows: usize,
    pub headers: Vec<String>,
    pub stats: Vec<ColumnStats>,
    pub preview: Vec<Vec<String>>,
    pub charts: Vec<ChartDescriptor>,
}

impl CsvAnalysis {
    pub fn numeric_columns(&self) -> impl Iterator<Item = &str> {
        self.stats.iter().map(|s| s.column.as_str())
    }

    pub fn chart(&self, kind: ChartKind) -> Option<&ChartDescriptor> {
        self.charts.iter().find(|c| c.kind == kind)
    }
}

/// Leading decimal number of a cell, so `10%` reads as 10 and `3.5 kg` as 3.5
fn parse_number(cell: &str) -> Option<f64> {
    let s = cell.trim_start().as_bytes();
    let digits_from = |mut i: usize| {
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(s.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut digits = int_end - end;
    end = int_end;
    if s.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        digits += frac_end - end - 1;
        end = frac_end;
    }
    if digits == 0 {
        return None;
    }
    if matches!(s.get(end), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(s.get(end + 1), Some(b'+' | b'-')));
        let exp_end = digits_from(end + 1 + sign);
        if exp_end > end + 1 + sign {
            end = exp_end;
        }
    }

    std::str::from_utf8(&s[..end])
        .ok()?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

pub fn analyze(csv: &str) -> Result<CsvAnalysis, VisualizationError> {
    let trimmed = csv.trim();
    if trimmed.is_empty() {
        return Err(VisualizationError::Empty);
    }

    let lines: Vec<&str> = trimmed
        .split('\n')
        .map(|l| l.trim_end_matches('\r'))
        .collect();
    let headers: Vec<String> = lines[0].split(',').map(|h| h.trim().to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(VisualizationError::MissingHeader);
    }

    // Short rows are padded with empty cells; extra cells are ignored.
    let rows: Vec<Vec<String>> = lines[1..]
        .iter()
        .take(STATS_ROW_LIMIT)
        .map(|line| {
            let mut cells: Vec<String> = line
                .split(',')
                .take(headers.len())
                .map(|c| c.trim().to_string())
                .collect();
            cells.resize(headers.len(), String::new());
            cells
        })
        .collect();

    let mut stats = Vec::new();
    let mut numeric_indices = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        let values: Vec<f64> = rows.iter().filter_map(|r| parse_number(&r[idx])).collect();
        if values.is_empty() {
            continue;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        stats.push(ColumnStats {
            column: header.clone(),
            min,
            max,
            mean,
            count: values.len(),
        });
        numeric_indices.push(idx);
    }

    let charts = build_charts(&headers, &rows, &numeric_indices);

    Ok(CsvAnalysis {
        total_rows: lines.len(),
        preview: rows.iter().take(PREVIEW_ROW_LIMIT).cloned().collect(),
        headers,
        stats,
        charts,
    })
}

fn random_color() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..=0x00FF_FFFF);
    format!("#{:06X}", value)
}

fn build_charts(headers: &[String], rows: &[Vec<String>], numeric: &[usize]) -> Vec<ChartDescriptor> {
    if numeric.is_empty() {
        return Vec::new();
    }

    let chart_rows = &rows[..rows.len().min(CHART_ROW_LIMIT)];
    let labels: Vec<usize> = (1..=chart_rows.len()).collect();
    let series: Vec<Vec<Option<f64>>> = numeric
        .iter()
        .map(|&idx| chart_rows.iter().map(|r| parse_number(&r[idx])).collect())
        .collect();

    let datasets: Vec<serde_json::Value> = numeric
        .iter()
        .zip(&series)
        .take(CHART_SERIES_LIMIT)
        .map(|(&idx, data)| {
            json!({
                "label": headers[idx],
                "data": data,
                "backgroundColor": format!("{}80", random_color()),
                "borderColor": random_color(),
                "borderWidth": 1,
            })
        })
        .collect();

    let mut charts = vec![
        ChartDescriptor {
            kind: ChartKind::Bar,
            canvas_id: "barChart".to_string(),
            title: "Bar Chart".to_string(),
            config: json!({
                "type": "bar",
                "data": { "labels": labels, "datasets": datasets },
                "options": {
                    "responsive": true,
                    "maintainAspectRatio": false,
                    "plugins": {
                        "title": { "display": true, "text": format!("First {} Rows", CHART_ROW_LIMIT) },
                        "legend": { "position": "top" }
                    }
                }
            }),
        },
        ChartDescriptor {
            kind: ChartKind::Line,
            canvas_id: "lineChart".to_string(),
            title: "Line Chart".to_string(),
            config: json!({
                "type": "line",
                "data": { "labels": labels, "datasets": datasets },
                "options": {
                    "responsive": true,
                    "maintainAspectRatio": false,
                    "plugins": {
                        "title": { "display": true, "text": format!("Data Trends (First {} Rows)", CHART_ROW_LIMIT) }
                    }
                }
            }),
        },
    ];

    if numeric.len() >= 2 {
        let x_name = &headers[numeric[0]];
        let y_name = &headers[numeric[1]];
        let points: Vec<serde_json::Value> = series[0]
            .iter()
            .zip(&series[1])
            .filter_map(|pair| match pair {
                (Some(x), Some(y)) => Some(json!({ "x": x, "y": y })),
                _ => None,
            })
            .collect();
        let title = format!("{} vs {}", x_name, y_name);

        charts.push(ChartDescriptor {
            kind: ChartKind::Scatter,
            canvas_id: "scatterChart".to_string(),
            title: "Scatter Plot".to_string(),
            config: json!({
                "type": "scatter",
                "data": {
                    "datasets": [{
                        "label": title,
                        "data": points,
                        "backgroundColor": "rgba(75, 192, 192, 0.5)",
                        "borderColor": "rgba(75, 192, 192, 1)"
                    }]
                },
                "options": {
                    "responsive": true,
                    "maintainAspectRatio": false,
                    "plugins": { "title": { "display": true, "text": title } },
                    "scales": {
                        "x": { "title": { "display": true, "text": x_name } },
                        "y": { "title": { "display": true, "text": y_name } }
                    }
                }
            }),
        });
    }

    charts
}

/// Analyze `csv` and render the full HTML report for the file called `name`
pub fn render_document(name: &str, csv: &str) -> Result<String, VisualizationError> {
    let analysis = analyze(csv)?;
    render_html(name, &analysis)
}

/// Statistics table as CSV bytes
pub fn stats_csv(analysis: &CsvAnalysis) -> anyhow::Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["column", "min", "max", "mean", "count"])?;
    for stat in &analysis.stats {
        wtr.write_record([
            &stat.column,
            &stat.min.to_string(),
            &stat.max.to_string(),
            &stat.mean.to_string(),
            &stat.count.to_string(),
        ])?;
    }
    Ok(wtr.into_inner()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_csv(rows: usize) -> String {
        let mut csv = String::from("id,value,label\n");
        for i in 0..rows {
            csv.push_str(&format!("{},{},row{}\n", i, i * 2, i));
        }
        csv
    }

    #[test]
    fn test_fully_numeric_column_counts_every_row() {
        let analysis = analyze(&numeric_csv(20)).unwrap();
        let value = analysis.stats.iter().find(|s| s.column == "value").unwrap();
        assert_eq!(value.count, 20);
        assert_eq!(value.min, 0.0);
        assert_eq!(value.max, 38.0);
        assert_eq!(value.mean, 19.0);
        assert_eq!(analysis.total_rows, 21);
    }

    #[test]
    fn test_statistics_stop_at_row_limit() {
        let analysis = analyze(&numeric_csv(750)).unwrap();
        let id = analysis.stats.iter().find(|s| s.column == "id").unwrap();
        assert_eq!(id.count, STATS_ROW_LIMIT);
        assert_eq!(id.max, (STATS_ROW_LIMIT - 1) as f64);
    }

    #[test]
    fn test_text_only_column_is_excluded() {
        let analysis = analyze(&numeric_csv(5)).unwrap();
        let numeric: Vec<&str> = analysis.numeric_columns().collect();
        assert_eq!(numeric, vec!["id", "value"]);
    }

    #[test]
    fn test_mixed_column_uses_numeric_subset() {
        let csv = "score\n10\nabsent\n30\n\n";
        let analysis = analyze(csv).unwrap();
        let score = &analysis.stats[0];
        assert_eq!(score.count, 2);
        assert_eq!(score.mean, 20.0);
        // Non-numeric rows are still previewed
        assert_eq!(analysis.preview.len(), 3);
        assert_eq!(analysis.preview[1], vec!["absent".to_string()]);
    }

    #[test]
    fn test_numeric_prefix_is_read() {
        assert_eq!(parse_number("10%"), Some(10.0));
        assert_eq!(parse_number("3.5 kg"), Some(3.5));
        assert_eq!(parse_number(" -2e3x"), Some(-2000.0));
        assert_eq!(parse_number("7e"), Some(7.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("row1"), None);
        assert_eq!(parse_number("-"), None);
        assert_eq!(parse_number("."), None);

        let analysis = analyze("growth,weight\n10%,3.5 kg\n20%,4.5 kg").unwrap();
        let numeric: Vec<&str> = analysis.numeric_columns().collect();
        assert_eq!(numeric, vec!["growth", "weight"]);
        assert_eq!(analysis.stats[0].mean, 15.0);
        assert_eq!(analysis.stats[1].max, 4.5);
    }

    #[test]
    fn test_non_finite_values_are_not_numeric() {
        let analysis = analyze("x\ninf\nNaN\n2").unwrap();
        assert_eq!(analysis.stats[0].count, 1);
    }

    #[test]
    fn test_charts_follow_numeric_columns() {
        let two = analyze(&numeric_csv(150)).unwrap();
        assert!(two.chart(ChartKind::Bar).is_some());
        assert!(two.chart(ChartKind::Line).is_some());
        let scatter = two.chart(ChartKind::Scatter).unwrap();
        assert_eq!(scatter.config["data"]["datasets"][0]["label"], "id vs value");

        let bar = two.chart(ChartKind::Bar).unwrap();
        let labels = bar.config["data"]["labels"].as_array().unwrap();
        assert_eq!(labels.len(), CHART_ROW_LIMIT);

        let one = analyze("a,b\n1,x\n2,y").unwrap();
        assert_eq!(one.charts.len(), 2);
        assert!(one.chart(ChartKind::Scatter).is_none());

        let none = analyze("a,b\nx,y").unwrap();
        assert!(none.charts.is_empty());
    }

    #[test]
    fn test_bar_chart_limits_series() {
        let csv = "a,b,c,d,e\n1,2,3,4,5\n6,7,8,9,10";
        let analysis = analyze(csv).unwrap();
        let bar = analysis.chart(ChartKind::Bar).unwrap();
        assert_eq!(bar.config["data"]["datasets"].as_array().unwrap().len(), CHART_SERIES_LIMIT);
        assert_eq!(analysis.stats.len(), 5);
    }

    #[test]
    fn test_ragged_rows_do_not_panic() {
        let csv = "a,b,c\n1\n2,3,4,5,6\n,,\n";
        let analysis = analyze(csv).unwrap();
        assert_eq!(analysis.preview[0], vec!["1".to_string(), String::new(), String::new()]);
        assert_eq!(analysis.preview[1].len(), 3);
        let c = analysis.stats.iter().find(|s| s.column == "c").unwrap();
        assert_eq!(c.count, 1);
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(analyze(""), Err(VisualizationError::Empty)));
        assert!(matches!(analyze("  \n \n"), Err(VisualizationError::Empty)));
        assert!(matches!(analyze(",,\n1,2,3"), Err(VisualizationError::MissingHeader)));
    }

    #[test]
    fn test_preview_is_bounded() {
        let analysis = analyze(&numeric_csv(40)).unwrap();
        assert_eq!(analysis.preview.len(), PREVIEW_ROW_LIMIT);
    }

    #[test]
    fn test_stats_csv_export() {
        let analysis = analyze("a,b\n1,2\n3,4").unwrap();
        let bytes = stats_csv(&analysis).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("column,min,max,mean,count"));
        assert_eq!(lines.next(), Some("a,1,3,2,2"));
        assert_eq!(lines.next(), Some("b,2,4,3,2"));
    }
}
