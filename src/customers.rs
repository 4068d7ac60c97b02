//! Customer ledger (customers.csv) and the append-only order ledger
//! (orders.csv).
//!
//! Derivation runs on every load and every save: CLTV, order dates,
//! Days, Reorder?, and the gated Sales/Day are recomputed from the
//! ledger so a hand-edited cell never stays out of line with ledger
//! truth for long.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{StoreError, StoreResult};
use crate::metrics::{self, CustomerView, Order};
use crate::paths::AppPaths;
use crate::store::{self, Schema};

pub const CUSTOMER_FIELDS: [&str; 21] = [
    "Company",
    "Prospect Name",
    "Phone #",
    "Email",
    "Industry",
    "Address",
    "City",
    "State",
    "ZIP",
    "Lat",
    "Lon",
    "CLTV",
    "Sales/Day",
    "Reorder?",
    "First Order",
    "Last Order",
    "Days",
    "First Contact",
    "Days To Close",
    "Sku's",
    "Notes",
];

pub const ORDER_FIELDS: [&str; 3] = ["Company", "Order Date", "Amount"];

pub fn customer_schema() -> Schema {
    Schema::new(&CUSTOMER_FIELDS)
}

pub fn order_schema() -> Schema {
    Schema::new(&ORDER_FIELDS)
}

pub fn load_orders(paths: &AppPaths) -> StoreResult<Vec<Order>> {
    let schema = order_schema();
    let rows = store::load_table(&paths.orders(), &schema)?;
    Ok(rows
        .iter()
        .map(|r| Order {
            company: store::row_get(r, &schema, "Company").to_string(),
            order_date: store::row_get(r, &schema, "Order Date").to_string(),
            amount: store::row_get(r, &schema, "Amount").to_string(),
        })
        .collect())
}

fn apply_derivation(row: &mut Vec<String>, schema: &Schema, orders: &[Order], today: NaiveDate) {
    let view = CustomerView {
        company: store::row_get(row, schema, "Company"),
        cltv_cell: store::row_get(row, schema, "CLTV"),
        reorder_cell: store::row_get(row, schema, "Reorder?"),
    };
    let derived = metrics::derive_customer_fields(&view, orders, today);
    store::row_set(row, schema, "CLTV", &derived.cltv);
    if let Some(v) = &derived.first_order {
        store::row_set(row, schema, "First Order", v);
    }
    if let Some(v) = &derived.last_order {
        store::row_set(row, schema, "Last Order", v);
    }
    if let Some(v) = &derived.days {
        store::row_set(row, schema, "Days", v);
    }
    if let Some(v) = &derived.reorder {
        store::row_set(row, schema, "Reorder?", v);
    }
    store::row_set(row, schema, "Sales/Day", &derived.sales_per_day);
}

/// Load all customer rows with derived fields freshly computed.
pub fn load_customers(paths: &AppPaths, today: NaiveDate) -> StoreResult<Vec<Vec<String>>> {
    let schema = customer_schema();
    let mut rows = store::load_table(&paths.customers(), &schema)?;
    let orders = load_orders(paths)?;
    for row in &mut rows {
        apply_derivation(row, &schema, &orders, today);
    }
    Ok(rows)
}

/// Save customer rows, re-deriving every row on the way out.
pub fn save_customers(
    paths: &AppPaths,
    rows: &[Vec<String>],
    today: NaiveDate,
) -> StoreResult<()> {
    let schema = customer_schema();
    let orders = load_orders(paths)?;
    let mut out = rows.to_vec();
    for row in &mut out {
        apply_derivation(row, &schema, &orders, today);
    }
    store::save_table(&paths.customers(), &schema, &out)
}

/// Update (or insert) the customer row for `company`, applying the given
/// field updates then re-deriving. Matching is case-insensitive.
pub fn update_by_company(
    paths: &AppPaths,
    company: &str,
    updates: &HashMap<String, String>,
    today: NaiveDate,
) -> StoreResult<()> {
    let company = company.trim();
    if company.is_empty() {
        return Err(StoreError::InvalidInput("company is required".into()));
    }
    let schema = customer_schema();
    let orders = load_orders(paths)?;
    let mut rows = store::load_table(&paths.customers(), &schema)?;
    let needle = company.to_lowercase();

    let idx = match rows
        .iter()
        .position(|r| store::row_get(r, &schema, "Company").trim().to_lowercase() == needle)
    {
        Some(i) => i,
        None => {
            let mut fresh = vec![String::new(); schema.len()];
            store::row_set(&mut fresh, &schema, "Company", company);
            rows.push(fresh);
            rows.len() - 1
        }
    };
    let row = &mut rows[idx];
    for (k, v) in updates {
        store::row_set(row, &schema, k, v);
    }
    apply_derivation(row, &schema, &orders, today);
    store::save_table(&paths.customers(), &schema, &rows)
}

/// Append one order and refresh the customer row's derived fields.
/// An unparsable date falls back to `today`; the amount is normalized
/// to two decimals.
pub fn append_order(
    paths: &AppPaths,
    company: &str,
    order_date: &str,
    amount: &str,
    today: NaiveDate,
) -> StoreResult<()> {
    let company = company.trim();
    if company.is_empty() {
        return Err(StoreError::InvalidInput("company is required for orders".into()));
    }
    let date = metrics::parse_date(order_date, today).unwrap_or(today);
    let amount = metrics::format_money(metrics::parse_money(amount));

    let schema = order_schema();
    let mut row = vec![String::new(); schema.len()];
    store::row_set(&mut row, &schema, "Company", company);
    store::row_set(&mut row, &schema, "Order Date", &date.format("%Y-%m-%d").to_string());
    store::row_set(&mut row, &schema, "Amount", &amount);
    store::append_rows(&paths.orders(), &schema, &[row])?;

    update_by_company(paths, company, &HashMap::new(), today)
}
