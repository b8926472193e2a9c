//! Chart data endpoints: box plots and weekly heat maps.
//!
//! Both fetch visible readings through the query layer and hand them to
//! the pure functions in [`crate::stats`].

use chrono::{Days, NaiveTime};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State, get};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::DbConn;
use crate::api::{ApiError, api_error, parse_date, parse_timestamp};
use crate::config::ReefConfig;
use crate::models::QueryField;
use crate::orm::reading::fetch_range;
use crate::orm::run_with_timeout;
use crate::session_guards::AuthenticatedUser;
use crate::stats::{
    BoxPlotSummary, HeatmapCell, compute_box_plot_summary, compute_weekly_heatmap_buckets,
};

pub const MAX_HEATMAP_WEEKS: u32 = 52;

/// Box plot for one requested label; `summary` is `null` when the label
/// has no readings in range.
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LabelBoxPlot {
    pub label: String,
    pub summary: Option<BoxPlotSummary>,
}

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WeeklyHeatmap {
    pub name: String,
    pub start_date: String,
    pub weeks: u32,
    pub cells: Vec<HeatmapCell>,
}

/// Box plot per label.
///
/// - **URL:** `/api/1/stats/boxplot?names=pH&names=Alkalinity&start=...&end=...&field=name`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// One entry per distinct label, in request order.
#[get("/1/stats/boxplot?<names>&<start>&<end>&<field>")]
pub async fn box_plot(
    db: DbConn,
    config: &State<ReefConfig>,
    _user: AuthenticatedUser,
    names: Vec<String>,
    start: &str,
    end: &str,
    field: Option<QueryField>,
) -> Result<Json<Vec<LabelBoxPlot>>, ApiError> {
    let start = parse_timestamp("start", start)?;
    let end = parse_timestamp("end", end)?;
    let field = field.unwrap_or_default();

    let mut labels: Vec<String> = Vec::with_capacity(names.len());
    for label in names {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    let query_labels = labels.clone();
    let readings = run_with_timeout(&db, config.store_timeout(), move |conn| {
        fetch_range(conn, &query_labels, start, end, field)
    })
    .await?;

    let plots = labels
        .into_iter()
        .map(|label| {
            let values: Vec<f64> = readings
                .iter()
                .filter(|r| match field {
                    QueryField::Name => r.name == label,
                    QueryField::Type => r.type_ == label,
                })
                .map(|r| r.value)
                .collect();
            LabelBoxPlot {
                summary: compute_box_plot_summary(&values),
                label,
            }
        })
        .collect();

    Ok(Json(plots))
}

/// Weekly heat map for one name.
///
/// - **URL:** `/api/1/stats/heatmap?name=Temperature&start_date=2025-06-02&weeks=4`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// `weeks` must be between 1 and 52. Days are UTC calendar days.
#[get("/1/stats/heatmap?<name>&<start_date>&<weeks>")]
pub async fn heatmap(
    db: DbConn,
    config: &State<ReefConfig>,
    _user: AuthenticatedUser,
    name: &str,
    start_date: &str,
    weeks: u32,
) -> Result<Json<WeeklyHeatmap>, ApiError> {
    if weeks == 0 || weeks > MAX_HEATMAP_WEEKS {
        return Err(api_error(
            Status::UnprocessableEntity,
            format!("'weeks' must be between 1 and {}", MAX_HEATMAP_WEEKS),
        ));
    }
    let first_day = parse_date("start_date", start_date)?;

    let range_start = first_day.and_time(NaiveTime::MIN);
    let range_end = first_day
        .checked_add_days(Days::new(u64::from(weeks) * 7))
        .and_then(|last| last.and_hms_opt(0, 0, 0))
        .and_then(|bound| bound.checked_sub_signed(chrono::Duration::nanoseconds(1)))
        .ok_or_else(|| api_error(Status::UnprocessableEntity, "'start_date' is out of range"))?;

    let labels = vec![name.to_string()];
    let readings = run_with_timeout(&db, config.store_timeout(), move |conn| {
        fetch_range(conn, &labels, range_start, range_end, QueryField::Name)
    })
    .await?;

    Ok(Json(WeeklyHeatmap {
        name: name.to_string(),
        start_date: first_day.format("%Y-%m-%d").to_string(),
        weeks,
        cells: compute_weekly_heatmap_buckets(&readings, first_day, weeks),
    }))
}

pub fn routes() -> Vec<Route> {
    routes![box_plot, heatmap]
}
