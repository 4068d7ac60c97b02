//! Daily activity rollup: one pass over the flat tables, bucketed to a
//! single calendar date. Feeds the end-of-day summary.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::customers;
use crate::dialer;
use crate::error::StoreResult;
use crate::metrics;
use crate::paths::AppPaths;
use crate::results;
use crate::store;
use crate::warm;

/// Everything that happened on one date.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DailyActivity {
    pub calls_total: usize,
    pub calls_green: usize,
    pub calls_gray: usize,
    pub calls_red: usize,
    pub emails_sent: usize,
    pub new_warm: usize,
    pub new_customers: usize,
    pub orders: usize,
    pub sales: f64,
    /// Parsed last-sync marker, if any.
    pub last_sync: Option<NaiveDateTime>,
}

fn on_date(value: &str, date: NaiveDate) -> bool {
    metrics::parse_any_datetime(value)
        .map(|dt| dt.date() == date)
        .unwrap_or(false)
}

pub fn compute_daily_activity(paths: &AppPaths, date: NaiveDate) -> StoreResult<DailyActivity> {
    let mut activity = DailyActivity::default();

    let call_schema = dialer::call_log_schema();
    for row in store::load_table(&paths.dialer_results(), &call_schema)? {
        if !on_date(store::row_get(&row, &call_schema, "Timestamp"), date) {
            continue;
        }
        activity.calls_total += 1;
        match store::row_get(&row, &call_schema, "Outcome").trim().to_lowercase().as_str() {
            "green" => activity.calls_green += 1,
            "gray" => activity.calls_gray += 1,
            "red" => activity.calls_red += 1,
            _ => {}
        }
    }

    for record in results::load_results(paths)? {
        if on_date(&record.date_sent, date) {
            activity.emails_sent += 1;
        }
    }

    let warm_schema = warm::warm_schema();
    for row in store::load_table(&paths.warm_leads(), &warm_schema)? {
        // First Contact is authoritative; older rows only carry Timestamp.
        let first = store::row_get(&row, &warm_schema, "First Contact");
        let stamp = if first.trim().is_empty() {
            store::row_get(&row, &warm_schema, "Timestamp")
        } else {
            first
        };
        if on_date(stamp, date) {
            activity.new_warm += 1;
        }
    }

    let customer_schema = customers::customer_schema();
    for row in store::load_table(&paths.customers(), &customer_schema)? {
        let first_order = store::row_get(&row, &customer_schema, "First Order");
        let first_contact = store::row_get(&row, &customer_schema, "First Contact");
        if on_date(first_order, date)
            || (first_order.trim().is_empty() && on_date(first_contact, date))
        {
            activity.new_customers += 1;
        }
    }

    for order in customers::load_orders(paths)? {
        if on_date(&order.order_date, date) {
            activity.orders += 1;
            activity.sales += metrics::parse_money(&order.amount);
        }
    }

    activity.last_sync = results::last_sync_time(paths);
    Ok(activity)
}
