#![cfg(feature = "web")]
//! Page model of the three dashboard tabs.
//!
//! Everything here is a pure function of the session's uploads and the query
//! string; [`crate::app`] only turns the resulting [`PageContext`] into HTML.

use crate::config::DashboardOptions;
use crate::dashboard::Dashboard;
use crate::downloader::export_headers;
use crate::graph::{ChartOptions, bar_chart, line_chart, pie_chart};
use crate::loader::InputSet;
use crate::metric::Metric;
use crate::metrics::{SummaryMetrics, format_rate};
use handlebars::Handlebars;
use log::warn;
use serde::{Deserialize, Serialize};

pub const PAGE_TITLE: &str = "KR 코로나19 한국 감염자 대시보드";
pub const UPLOAD_PROMPT: &str = "3개의 CSV 파일(확진자, 사망자, 회복자)을 모두 업로드해주세요.";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Trend,
    Summary,
    Ratio,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Trend, Tab::Summary, Tab::Ratio];

    pub fn key(self) -> &'static str {
        match self {
            Tab::Trend => "trend",
            Tab::Summary => "summary",
            Tab::Ratio => "ratio",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Trend => "감염 추이",
            Tab::Summary => "통계 요약",
            Tab::Ratio => "비율 분석",
        }
    }
}

/// Query string of `GET /`.
///
/// `trend` marks a submitted selection form, so that an empty selection can
/// be told apart from a first visit that should get the defaults.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub tab: Tab,
    pub trend: Option<String>,
    #[serde(default)]
    pub cumulative: Vec<Metric>,
    #[serde(default)]
    pub daily: Vec<Metric>,
}

/// Series picked for the 감염 추이 charts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrendSelection {
    pub cumulative: Vec<Metric>,
    pub daily: Vec<Metric>,
    submitted: bool,
}

impl Default for TrendSelection {
    fn default() -> Self {
        Self {
            cumulative: vec![Metric::Confirmed, Metric::Recovered],
            daily: vec![Metric::Confirmed],
            submitted: false,
        }
    }
}

impl TrendSelection {
    pub fn from_query(query: &DashboardQuery) -> Self {
        if query.trend.is_none() {
            return Self::default();
        }
        // Keep the canonical order and drop repeats
        let pick = |chosen: &[Metric]| -> Vec<Metric> {
            Metric::ALL
                .into_iter()
                .filter(|m| chosen.contains(m))
                .collect()
        };
        Self {
            cumulative: pick(&query.cumulative),
            daily: pick(&query.daily),
            submitted: true,
        }
    }

    /// Query fragment that reproduces this selection in links.
    pub fn query_string(&self) -> String {
        if !self.submitted {
            return String::new();
        }
        let mut parts = vec!["trend=1".to_string()];
        parts.extend(self.cumulative.iter().map(|m| format!("cumulative={}", m.key())));
        parts.extend(self.daily.iter().map(|m| format!("daily={}", m.key())));
        parts.join("&")
    }
}

#[derive(Debug, Serialize)]
pub struct UploadSlot {
    pub key: &'static str,
    pub label: &'static str,
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TabLink {
    pub key: &'static str,
    pub label: &'static str,
    pub href: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub key: &'static str,
    pub label: &'static str,
    pub checked: bool,
}

/// A rendered chart, or why there is none.
#[derive(Debug, Default, Serialize)]
pub struct ChartSlot {
    pub svg: Option<String>,
    pub error: Option<String>,
}

impl ChartSlot {
    fn from_result(result: crate::error::Result<Option<String>>) -> Self {
        match result {
            Ok(svg) => ChartSlot { svg, error: None },
            Err(e) => {
                warn!("{}", e);
                ChartSlot {
                    svg: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrendContext {
    pub cumulative_choices: Vec<Choice>,
    pub daily_choices: Vec<Choice>,
    pub line: ChartSlot,
    pub bar: ChartSlot,
}

#[derive(Debug, Serialize)]
pub struct SummaryContext {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SliceRow {
    pub label: &'static str,
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct RatioContext {
    pub date: String,
    pub recovered_rate: String,
    pub death_rate: String,
    pub slices: Vec<SliceRow>,
    pub pie: ChartSlot,
}

/// Everything the page template needs.
#[derive(Debug, Serialize)]
pub struct PageContext {
    pub title: &'static str,
    pub region: String,
    pub uploads: Vec<UploadSlot>,
    pub prompt: Option<&'static str>,
    pub error: Option<String>,
    pub notices: Vec<String>,
    pub tabs: Vec<TabLink>,
    pub show_tabs: bool,
    pub empty: bool,
    pub trend: Option<TrendContext>,
    pub summary: Option<SummaryContext>,
    pub ratio: Option<RatioContext>,
}

impl PageContext {
    fn new(inputs: &InputSet, options: &DashboardOptions) -> Self {
        let uploads = Metric::ALL
            .into_iter()
            .map(|m| UploadSlot {
                key: m.key(),
                label: m.label(),
                filename: inputs.get(m).map(|u| u.filename.clone()),
            })
            .collect();
        PageContext {
            title: PAGE_TITLE,
            region: options.region.clone(),
            uploads,
            prompt: None,
            error: None,
            notices: Vec::new(),
            tabs: Vec::new(),
            show_tabs: false,
            empty: false,
            trend: None,
            summary: None,
            ratio: None,
        }
    }

    /// Page showing only the upload form and an error banner.
    pub fn with_error(inputs: &InputSet, options: &DashboardOptions, error: String) -> Self {
        let mut page = Self::new(inputs, options);
        page.error = Some(error);
        page
    }
}

/// Build the page for one request
///
/// Missing uploads produce the upload prompt, unparsable uploads an error
/// banner; otherwise the requested tab is rendered from a fresh [`Dashboard`].
pub fn build_page(
    inputs: &InputSet,
    options: &DashboardOptions,
    query: &DashboardQuery,
) -> PageContext {
    let mut page = PageContext::new(inputs, options);

    let dashboard = match Dashboard::from_inputs(inputs, options) {
        Ok(Some(dashboard)) => dashboard,
        Ok(None) => {
            page.prompt = Some(UPLOAD_PROMPT);
            return page;
        }
        Err(e) => {
            warn!("could not load uploads: {}", e);
            page.error = Some(e.to_string());
            return page;
        }
    };

    page.notices = notices(&dashboard);
    let selection = TrendSelection::from_query(query);
    let carry = selection.query_string();
    page.show_tabs = true;
    page.tabs = Tab::ALL
        .into_iter()
        .map(|tab| TabLink {
            key: tab.key(),
            label: tab.label(),
            href: if carry.is_empty() {
                format!("/?tab={}", tab.key())
            } else {
                format!("/?tab={}&{}", tab.key(), carry)
            },
            active: tab == query.tab,
        })
        .collect();

    let records = &dashboard.merged.records;
    if records.is_empty() {
        page.empty = true;
        return page;
    }

    match query.tab {
        Tab::Trend => page.trend = Some(trend_context(&dashboard, &selection)),
        Tab::Summary => page.summary = Some(summary_context(&dashboard, options.tail_rows)),
        Tab::Ratio => page.ratio = dashboard.summary.as_ref().map(ratio_context),
    }
    page
}

fn notices(dashboard: &Dashboard) -> Vec<String> {
    let mut notices = Vec::new();
    if !dashboard.unmatched.is_empty() {
        let labels: Vec<&str> = dashboard.unmatched.iter().map(|m| m.label()).collect();
        notices.push(format!(
            "'{}' 지역 데이터가 없습니다: {}",
            dashboard.region,
            labels.join(", ")
        ));
    }
    for dropped in &dashboard.merged.report.dropped {
        let first = dropped.dates.first().map(|d| d.to_string()).unwrap_or_default();
        notices.push(format!(
            "{} 파일의 {}개 날짜가 다른 파일에 없어 제외되었습니다 (첫 날짜 {})",
            dropped.metric.label(),
            dropped.dates.len(),
            first
        ));
    }
    notices
}

fn choices(selected: &[Metric], label: fn(Metric) -> &'static str) -> Vec<Choice> {
    Metric::ALL
        .into_iter()
        .map(|m| Choice {
            key: m.key(),
            label: label(m),
            checked: selected.contains(&m),
        })
        .collect()
}

fn trend_context(dashboard: &Dashboard, selection: &TrendSelection) -> TrendContext {
    let records = &dashboard.merged.records;
    TrendContext {
        cumulative_choices: choices(&selection.cumulative, Metric::label),
        daily_choices: choices(&selection.daily, Metric::daily_label),
        line: ChartSlot::from_result(line_chart(
            records,
            &selection.cumulative,
            &ChartOptions::titled("누적 추이 그래프"),
        )),
        bar: ChartSlot::from_result(bar_chart(
            records,
            &selection.daily,
            &ChartOptions::titled("일일 증가량 그래프"),
        )),
    }
}

fn summary_context(dashboard: &Dashboard, tail_rows: usize) -> SummaryContext {
    let rows = dashboard
        .merged
        .tail(tail_rows)
        .iter()
        .map(|r| {
            let mut row = vec![r.date.format("%Y-%m-%d").to_string()];
            row.extend(Metric::ALL.map(|m| r.cumulative(m).to_string()));
            row.extend(Metric::ALL.map(|m| r.daily(m).to_string()));
            row
        })
        .collect();
    SummaryContext {
        headers: export_headers(),
        rows,
    }
}

fn ratio_context(summary: &SummaryMetrics) -> RatioContext {
    RatioContext {
        date: summary.date.format("%Y-%m-%d").to_string(),
        recovered_rate: format_rate(summary.recovered_rate),
        death_rate: format_rate(summary.death_rate),
        slices: summary
            .proportions()
            .into_iter()
            .map(|s| SliceRow {
                label: s.label,
                value: s.value,
            })
            .collect(),
        pie: ChartSlot::from_result(pie_chart(summary, &ChartOptions::titled("감염자 분포"))),
    }
}

/// Handlebars registry holding the page template.
pub struct PageRenderer {
    registry: Handlebars<'static>,
}

impl PageRenderer {
    pub fn new() -> Result<Self, handlebars::TemplateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_template_string("dashboard", include_str!("./static/dashboard.hbs"))?;
        Ok(PageRenderer { registry })
    }

    pub fn render(&self, page: &PageContext) -> Result<String, handlebars::RenderError> {
        self.registry.render("dashboard", page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::UploadedCsv;
    use crate::metric::DATE_LABEL;

    fn csv(values: [i64; 3]) -> UploadedCsv {
        let body = format!(
            "Province/State,Country/Region,Lat,Long,3/1/20,3/2/20,3/3/20\n\
             ,\"Korea, South\",35.9,127.7,{},{},{}\n",
            values[0], values[1], values[2]
        );
        UploadedCsv::new("t.csv", body.into_bytes()).unwrap()
    }

    fn full_inputs() -> InputSet {
        let mut inputs = InputSet::default();
        inputs.set(Metric::Confirmed, csv([10, 20, 30]));
        inputs.set(Metric::Deaths, csv([1, 2, 3]));
        inputs.set(Metric::Recovered, csv([5, 15, 25]));
        inputs
    }

    fn query(tab: Tab) -> DashboardQuery {
        DashboardQuery {
            tab,
            ..DashboardQuery::default()
        }
    }

    #[test]
    fn first_visit_uses_default_selection() {
        let selection = TrendSelection::from_query(&DashboardQuery::default());
        assert_eq!(selection.cumulative, vec![Metric::Confirmed, Metric::Recovered]);
        assert_eq!(selection.daily, vec![Metric::Confirmed]);
        assert_eq!(selection.query_string(), "");
    }

    #[test]
    fn submitted_selection_may_be_empty() {
        let q = DashboardQuery {
            trend: Some("1".to_string()),
            cumulative: vec![Metric::Recovered, Metric::Deaths, Metric::Recovered],
            ..DashboardQuery::default()
        };
        let selection = TrendSelection::from_query(&q);
        assert_eq!(selection.cumulative, vec![Metric::Deaths, Metric::Recovered]);
        assert!(selection.daily.is_empty());
        assert_eq!(
            selection.query_string(),
            "trend=1&cumulative=deaths&cumulative=recovered"
        );
    }

    #[test]
    fn missing_uploads_show_the_prompt() {
        let page = build_page(&InputSet::default(), &DashboardOptions::default(), &query(Tab::Trend));
        assert_eq!(page.prompt, Some(UPLOAD_PROMPT));
        assert!(!page.show_tabs);
        assert!(page.trend.is_none());
    }

    #[test]
    fn summary_tab_lists_the_tail() {
        let options = DashboardOptions {
            tail_rows: 2,
            ..DashboardOptions::default()
        };
        let page = build_page(&full_inputs(), &options, &query(Tab::Summary));
        let summary = page.summary.unwrap();
        assert_eq!(summary.rows.len(), 2);
        assert_eq!(summary.headers[0], DATE_LABEL);
        assert_eq!(summary.rows[1][0], "2020-03-03");
        assert_eq!(summary.rows[1][4], "10");
    }

    #[test]
    fn ratio_tab_formats_rates() {
        let page = build_page(&full_inputs(), &DashboardOptions::default(), &query(Tab::Ratio));
        let ratio = page.ratio.unwrap();
        assert_eq!(ratio.recovered_rate, "83.33%");
        assert_eq!(ratio.death_rate, "10.00%");
        let total: i64 = ratio.slices.iter().map(|s| s.value).sum();
        assert_eq!(total, 30);
        assert!(page.tabs.iter().any(|t| t.active && t.key == "ratio"));
    }

    #[test]
    fn unparsable_upload_becomes_an_error_banner() {
        let mut inputs = full_inputs();
        let bad = UploadedCsv::new("bad.csv", b"Province/State,Country/Region,Lat,Long,yesterday\n".to_vec())
            .unwrap();
        inputs.set(Metric::Deaths, bad);
        let page = build_page(&inputs, &DashboardOptions::default(), &query(Tab::Trend));
        assert!(page.error.unwrap().contains("yesterday"));
        assert!(!page.show_tabs);
    }

    #[test]
    fn unknown_region_is_announced() {
        let options = DashboardOptions {
            region: "Atlantis".to_string(),
            ..DashboardOptions::default()
        };
        let page = build_page(&full_inputs(), &options, &query(Tab::Summary));
        assert_eq!(page.notices.len(), 1);
        assert!(page.notices[0].contains("Atlantis"));
    }

    #[test]
    fn template_renders_prompt_page() {
        let renderer = PageRenderer::new().unwrap();
        let page = build_page(&InputSet::default(), &DashboardOptions::default(), &query(Tab::Trend));
        let html = renderer.render(&page).unwrap();
        assert!(html.contains(UPLOAD_PROMPT));
        assert!(html.contains("accept=\".csv\""));
    }
}
