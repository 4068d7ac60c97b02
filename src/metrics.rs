//! Derived customer metrics: CLTV, order dates, days-since-first-order,
//! and the gated Sales/Day run-rate, computed purely from the order
//! ledger.
//!
//! Everything here is stateless and takes "today" as a parameter so the
//! same inputs always produce the same outputs.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

/// One row of the append-only order ledger, as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub company: String,
    pub order_date: String,
    pub amount: String,
}

/// Aggregate order stats for one company.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStats {
    pub cltv: f64,
    pub first_order: Option<NaiveDate>,
    pub last_order: Option<NaiveDate>,
    pub days_since_first: Option<i64>,
    pub sales_per_day: Option<f64>,
    pub order_count: usize,
}

impl OrderStats {
    fn empty() -> Self {
        OrderStats {
            cltv: 0.0,
            first_order: None,
            last_order: None,
            days_since_first: None,
            sales_per_day: None,
            order_count: 0,
        }
    }
}

/// Parse a money string tolerant of `$` and thousands separators.
/// Unparsable values count as zero.
pub fn parse_money(value: &str) -> f64 {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }
    cleaned.parse::<f64>().unwrap_or(0.0)
}

/// Render a money value with two decimals, or empty for unrepresentable
/// input.
pub fn format_money(value: f64) -> String {
    if value.is_finite() {
        format!("{:.2}", value)
    } else {
        String::new()
    }
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%Y/%m/%d",
    "%m/%d/%y",
    "%m-%d-%y",
];

/// Parse a date string, trying formats in order: ISO, US slash, US dash,
/// 2-digit year, then month/day-only assuming `today`'s year.
pub fn parse_date(value: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    // Month/day only, e.g. "3/4" or "3-4".
    let with_year = format!("{}/{}", s.replace('-', "/"), today.year());
    NaiveDate::parse_from_str(&with_year, "%m/%d/%Y").ok()
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Parse a timestamp as written by this app or by the mail-client sync
/// (ISO with/without time, US 12-hour variants, dash or slash).
pub fn parse_any_datetime(value: &str) -> Option<NaiveDateTime> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    // Some exports write US dates with dashes; retry with slashes.
    let alt = s.replace('-', "/");
    if alt != s {
        for fmt in ["%m/%d/%Y %I:%M:%S %p", "%m/%d/%Y %I:%M %p", "%m/%d/%Y"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(&alt, fmt) {
                return Some(dt);
            }
            if let Ok(d) = NaiveDate::parse_from_str(&alt, fmt) {
                return Some(d.and_time(NaiveTime::MIN));
            }
        }
    }
    None
}

/// Aggregate the ledger for one company (case-insensitive match).
///
/// Dateless orders still count toward `cltv` and `order_count` but not
/// toward the date range. `sales_per_day` is defined only when
/// `days_since_first > 0`.
pub fn compute_order_stats(orders: &[Order], company: &str, today: NaiveDate) -> OrderStats {
    let needle = company.trim().to_lowercase();
    if needle.is_empty() {
        return OrderStats::empty();
    }

    let mut stats = OrderStats::empty();
    for order in orders {
        if order.company.trim().to_lowercase() != needle {
            continue;
        }
        stats.order_count += 1;
        stats.cltv += parse_money(&order.amount);
        if let Some(d) = parse_date(&order.order_date, today) {
            stats.first_order = Some(stats.first_order.map_or(d, |f| f.min(d)));
            stats.last_order = Some(stats.last_order.map_or(d, |l| l.max(d)));
        }
    }

    if let Some(first) = stats.first_order {
        let days = (today - first).num_days();
        stats.days_since_first = Some(days);
        if days > 0 {
            stats.sales_per_day = Some(stats.cltv / days as f64);
        }
    }
    stats
}

/// The slice of a customer row that derivation reads.
#[derive(Debug, Default, Clone)]
pub struct CustomerView<'a> {
    pub company: &'a str,
    pub cltv_cell: &'a str,
    pub reorder_cell: &'a str,
}

/// Field updates produced by derivation. `None` means "leave the stored
/// value untouched"; `sales_per_day` is always applied (forced blank for
/// one-time customers).
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub cltv: String,
    pub first_order: Option<String>,
    pub last_order: Option<String>,
    pub days: Option<String>,
    pub reorder: Option<String>,
    pub sales_per_day: String,
}

fn is_affirmative(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "yes" | "y" | "1" | "true")
}

/// Derive CLTV/Days/Sales-Day for a customer row from the ledger.
///
/// The ledger wins whenever it has data: a computed CLTV greater than
/// zero overrides the stored cell, while a customer with no orders keeps
/// a manually entered opening balance. Sales/Day is shown only for
/// reorder customers (>= 2 orders); a stale value on a one-time customer
/// is forced blank.
pub fn derive_customer_fields(
    view: &CustomerView<'_>,
    orders: &[Order],
    today: NaiveDate,
) -> DerivedFields {
    let stats = compute_order_stats(orders, view.company, today);

    let cltv = if stats.cltv > 0.0 {
        stats.cltv
    } else {
        parse_money(view.cltv_cell)
    };

    let reorder_effective = is_affirmative(view.reorder_cell) || stats.order_count >= 2;
    let gate_open = reorder_effective && stats.order_count >= 2 && stats.sales_per_day.is_some();

    DerivedFields {
        cltv: if cltv > 0.0 { format_money(cltv) } else { String::new() },
        first_order: stats.first_order.map(|d| d.format("%Y-%m-%d").to_string()),
        last_order: stats.last_order.map(|d| d.format("%Y-%m-%d").to_string()),
        days: stats.days_since_first.map(|d| d.to_string()),
        reorder: if gate_open && view.reorder_cell.trim().is_empty() {
            Some("Yes".to_string())
        } else {
            None
        },
        sales_per_day: if gate_open {
            format_money(stats.sales_per_day.unwrap_or(0.0))
        } else {
            String::new()
        },
    }
}
