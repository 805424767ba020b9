//! Report rendering collaborator.
//!
//! [`Renderer`] turns a [`Dataset`] into an [`Artifact`]. Rendering is
//! synchronous and CPU-bound, so workers call it on the blocking pool. The
//! shipped [`HtmlBarChartRenderer`] emits a standalone HTML page with an
//! ECharts bar chart: one income and one expense bar per label.

use plotbuilder_core::dataset::Dataset;
use plotbuilder_core::job::CorrelationId;
use serde_json::json;
use tokio::task::JoinError;

/// Script the generated page loads ECharts from.
pub const ECHARTS_SCRIPT_URL: &str = "https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js";

pub const REPORT_TITLE: &str = "Income/Expense Report";
pub const REPORT_SUBTITLE: &str = "Made with BudgetGraph";

/// Series colours, income first.
const SERIES_COLORS: [&str; 2] = ["red", "black"];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Render failed: {0}")]
    Render(String),

    #[error("Artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Render task panicked: {0}")]
    Panicked(String),
}

impl From<JoinError> for RenderError {
    fn from(err: JoinError) -> Self {
        if err.is_panic() {
            RenderError::Panicked(panic_message(err.into_panic()))
        } else {
            RenderError::Panicked("render task was cancelled".into())
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".into()
    }
}

/// A rendered report, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File extension without the dot, e.g. `"html"`.
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

pub trait Renderer: Send + Sync + 'static {
    fn render(&self, id: &CorrelationId, dataset: &Dataset) -> Result<Artifact, RenderError>;
}

/// Renders an income/expense bar chart as a self-contained HTML page.
#[derive(Debug, Clone, Default)]
pub struct HtmlBarChartRenderer;

impl HtmlBarChartRenderer {
    pub fn new() -> Self {
        Self
    }

    /// ECharts option object for `dataset`.
    pub fn chart_options(dataset: &Dataset) -> serde_json::Value {
        let bars = |values: Vec<f64>| -> Vec<serde_json::Value> {
            values.into_iter().map(|v| json!({ "value": v })).collect()
        };

        json!({
            "title": { "text": REPORT_TITLE, "subtext": REPORT_SUBTITLE },
            "color": SERIES_COLORS,
            "legend": {},
            "tooltip": { "show": true },
            "xAxis": [{ "data": dataset.labels() }],
            "yAxis": [{}],
            "series": [
                { "name": "Income", "type": "bar", "data": bars(dataset.incomes()) },
                { "name": "Expense", "type": "bar", "data": bars(dataset.expenses()) },
            ],
        })
    }
}

impl Renderer for HtmlBarChartRenderer {
    fn render(&self, id: &CorrelationId, dataset: &Dataset) -> Result<Artifact, RenderError> {
        let options = serde_json::to_string(&Self::chart_options(dataset))
            .map_err(|e| RenderError::Render(format!("chart options for {id}: {e}")))?;

        let mut page = String::with_capacity(options.len() + 1024);
        page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        page.push_str("<title>");
        page.push_str(REPORT_TITLE);
        page.push_str("</title>\n<script src=\"");
        page.push_str(ECHARTS_SCRIPT_URL);
        page.push_str("\"></script>\n</head>\n<body>\n");
        page.push_str(
            "<div class=\"container\"><div class=\"item\" id=\"report-chart\" \
             style=\"width:900px;height:500px;\"></div></div>\n",
        );
        page.push_str("<script type=\"text/javascript\">\n\"use strict\";\n");
        page.push_str(
            "let chart = echarts.init(document.getElementById('report-chart'), \"white\");\n",
        );
        page.push_str("let option = ");
        page.push_str(&escape_for_script(&options));
        page.push_str(";\nchart.setOption(option);\n</script>\n</body>\n</html>\n");

        Ok(Artifact {
            extension: "html",
            bytes: page.into_bytes(),
        })
    }
}

/// Make JSON safe to inline in a `<script>` block. Labels are caller text,
/// so `</script>` and friends must not survive verbatim.
fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use plotbuilder_core::dataset::Measures;

    use super::*;

    fn id() -> CorrelationId {
        CorrelationId::parse("job-1").unwrap()
    }

    #[test]
    fn options_align_series_with_sorted_labels() {
        let mut ds = Dataset::new();
        ds.insert("bob", Measures::new(50.0, 70.0));
        ds.insert("alice", Measures::new(100.0, 20.0));

        let options = HtmlBarChartRenderer::chart_options(&ds);

        assert_eq!(options["xAxis"][0]["data"], json!(["alice", "bob"]));
        assert_eq!(options["series"][0]["name"], "Income");
        assert_eq!(options["series"][0]["data"][0]["value"], 100.0);
        assert_eq!(options["series"][1]["name"], "Expense");
        assert_eq!(options["series"][1]["data"][1]["value"], 70.0);
        assert_eq!(options["color"], json!(["red", "black"]));
    }

    #[test]
    fn empty_dataset_renders_zero_series_points() {
        let artifact = HtmlBarChartRenderer::new().render(&id(), &Dataset::new()).unwrap();
        let html = String::from_utf8(artifact.bytes).unwrap();

        assert_eq!(artifact.extension, "html");
        assert!(html.contains(REPORT_TITLE));
        assert!(html.contains(r#""data":[]"#));
    }

    #[test]
    fn labels_cannot_break_out_of_the_script_block() {
        let mut ds = Dataset::new();
        ds.insert("</script><script>alert(1)</script>", Measures::new(1.0, 2.0));

        let artifact = HtmlBarChartRenderer::new().render(&id(), &ds).unwrap();
        let html = String::from_utf8(artifact.bytes).unwrap();

        assert_eq!(html.matches("</script>").count(), 2);
        assert!(html.contains("\\u003c/script\\u003e"));
    }

    #[test]
    fn join_error_from_panic_keeps_message() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = rt.block_on(async {
            tokio::spawn(async { panic!("renderer exploded") })
                .await
                .unwrap_err()
        });

        match RenderError::from(err) {
            RenderError::Panicked(msg) => assert_eq!(msg, "renderer exploded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
