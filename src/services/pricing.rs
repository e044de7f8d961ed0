//! Line-item pricing shared by quotations and purchase orders.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use sqlx::PgConnection;
use uuid::Uuid;

use super::ServiceError;
use crate::database::manager::DatabaseError;
use crate::database::models::LineItem;
use crate::validation::FieldErrors;

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub position: i32,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
}

/// Money is kept to cents, half away from zero
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Largest value of a NUMERIC(14, 2) money column
pub fn max_money() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

/// Largest value of a NUMERIC(14, 3) quantity column
pub fn max_quantity() -> Decimal {
    Decimal::new(99_999_999_999_999, 3)
}

/// Non-negative amount that fits a money column
pub fn validate_money(errors: &mut FieldErrors, field: &str, value: Option<Decimal>) {
    if let Some(v) = value {
        errors
            .check(v >= Decimal::ZERO, field, "Amount cannot be negative")
            .decimal(field, Some(v), max_money(), 2);
    }
}

/// Collect item and tax-rate problems as `items[N].field` entries
pub fn validate_lines(errors: &mut FieldErrors, items: &[LineItemInput], tax_rate: Option<Decimal>) {
    validate_items(errors, items);
    validate_tax_rate(errors, tax_rate);
}

pub fn validate_items(errors: &mut FieldErrors, items: &[LineItemInput]) {
    if items.is_empty() {
        errors.add("items", "At least one line item is required");
    }
    for (i, item) in items.iter().enumerate() {
        let quantity = format!("items[{}].quantity", i);
        let unit_price = format!("items[{}].unit_price", i);
        errors
            .require(&format!("items[{}].description", i), &item.description)
            .check(item.quantity > Decimal::ZERO, &quantity, "Quantity must be greater than zero")
            .decimal(&quantity, Some(item.quantity), max_quantity(), 3)
            .check(item.unit_price >= Decimal::ZERO, &unit_price, "Unit price cannot be negative")
            .decimal(&unit_price, Some(item.unit_price), max_money(), 2);
    }
}

pub fn validate_tax_rate(errors: &mut FieldErrors, tax_rate: Option<Decimal>) {
    if let Some(rate) = tax_rate {
        errors
            .check(
                rate >= Decimal::ZERO && rate <= Decimal::ONE_HUNDRED,
                "tax_rate",
                "Tax rate must be between 0 and 100",
            )
            .decimal("tax_rate", Some(rate), Decimal::ONE_HUNDRED, 2);
    }
}

/// `value` when it fits a money column
pub(crate) fn within_money(field: &str, value: Option<Decimal>) -> Result<Decimal, ServiceError> {
    value
        .filter(|v| *v <= max_money())
        .ok_or_else(|| ServiceError::validation(field, format!("Amount must not exceed {}", max_money())))
}

/// Tax on `subtotal` at `tax_rate` percent, plus the resulting total
pub(crate) fn tax_and_total(subtotal: Decimal, tax_rate: Decimal) -> Result<(Decimal, Decimal), ServiceError> {
    let tax_amount = within_money(
        "tax_amount",
        subtotal
            .checked_mul(tax_rate)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(round_money),
    )?;
    let total = within_money("total", subtotal.checked_add(tax_amount))?;
    Ok((tax_amount, total))
}

/// Price every line and derive the document totals; amounts that would not
/// fit a money column are validation errors
pub fn price(items: &[LineItemInput], tax_rate: Decimal) -> Result<(Vec<PricedLine>, Totals), ServiceError> {
    let mut lines = Vec::with_capacity(items.len());
    let mut subtotal = Decimal::ZERO;
    for (i, (item, position)) in items.iter().zip(1..).enumerate() {
        let field = format!("items[{}].amount", i);
        let amount = within_money(&field, item.quantity.checked_mul(item.unit_price).map(round_money))?;
        subtotal = within_money("subtotal", subtotal.checked_add(amount))?;
        lines.push(PricedLine {
            position,
            description: item.description.trim().to_string(),
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount,
        });
    }

    let (tax_amount, total) = tax_and_total(subtotal, tax_rate)?;
    let totals = Totals {
        subtotal,
        tax_rate,
        tax_amount,
        total,
    };
    Ok((lines, totals))
}

/// Line item tables share one shape; `table`/`parent_column` are compile-time identifiers
pub(crate) async fn insert_lines(
    conn: &mut PgConnection,
    table: &'static str,
    parent_column: &'static str,
    parent_id: Uuid,
    lines: &[PricedLine],
) -> Result<(), DatabaseError> {
    let sql = format!(
        "INSERT INTO {table} (id, {parent_column}, position, description, quantity, unit_price, amount)
         VALUES ($1, $2, $3, $4, $5, $6, $7)"
    );
    for line in lines {
        sqlx::query(&sql)
            .bind(Uuid::new_v4())
            .bind(parent_id)
            .bind(line.position)
            .bind(&line.description)
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.amount)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub(crate) async fn replace_lines(
    conn: &mut PgConnection,
    table: &'static str,
    parent_column: &'static str,
    parent_id: Uuid,
    lines: &[PricedLine],
) -> Result<(), DatabaseError> {
    let sql = format!("DELETE FROM {table} WHERE {parent_column} = $1");
    sqlx::query(&sql).bind(parent_id).execute(&mut *conn).await?;
    insert_lines(conn, table, parent_column, parent_id, lines).await
}

pub(crate) async fn load_lines<'e, E>(
    executor: E,
    table: &'static str,
    parent_column: &'static str,
    parent_id: Uuid,
) -> Result<Vec<LineItem>, DatabaseError>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = format!(
        "SELECT id, position, description, quantity, unit_price, amount
         FROM {table} WHERE {parent_column} = $1 ORDER BY position"
    );
    let items = sqlx::query_as::<_, LineItem>(&sql)
        .bind(parent_id)
        .fetch_all(executor)
        .await?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn item(description: &str, quantity: &str, unit_price: &str) -> LineItemInput {
        LineItemInput {
            description: description.to_string(),
            quantity: quantity.parse().unwrap(),
            unit_price: unit_price.parse().unwrap(),
        }
    }

    #[test]
    fn totals_follow_lines_and_tax() {
        let items = vec![item("Survey", "2", "150.00"), item(" Cabling ", "10.5", "3.99")];
        let (lines, totals) = price(&items, dec("15")).unwrap();

        assert_eq!(lines[0].position, 1);
        assert_eq!(lines[1].position, 2);
        assert_eq!(lines[1].description, "Cabling");
        assert_eq!(lines[0].amount, dec("300.00"));
        // 10.5 * 3.99 = 41.895
        assert_eq!(lines[1].amount, dec("41.90"));
        assert_eq!(totals.subtotal, dec("341.90"));
        assert_eq!(totals.tax_amount, dec("51.29"));
        assert_eq!(totals.total, dec("393.19"));
    }

    #[test]
    fn zero_tax_total_is_subtotal() {
        let (_, totals) = price(&[item("Visit", "1", "99.99")], Decimal::ZERO).unwrap();
        assert_eq!(totals.tax_amount, Decimal::ZERO);
        assert_eq!(totals.total, dec("99.99"));
    }

    #[test]
    fn rejects_bad_lines() {
        let mut errors = FieldErrors::new();
        validate_lines(&mut errors, &[item("", "0", "-1")], Some(dec("120")));
        let body = errors.into_result().unwrap_err().to_json();
        assert!(body["field_errors"]["items[0].description"].is_string());
        assert!(body["field_errors"]["items[0].quantity"].is_string());
        assert!(body["field_errors"]["items[0].unit_price"].is_string());
        assert!(body["field_errors"]["tax_rate"].is_string());
    }

    #[test]
    fn requires_at_least_one_line() {
        let mut errors = FieldErrors::new();
        validate_lines(&mut errors, &[], None);
        assert!(!errors.is_empty());
    }

    #[test]
    fn rejects_values_beyond_column_limits() {
        let mut errors = FieldErrors::new();
        let huge = LineItemInput {
            description: "Bulk".into(),
            quantity: Decimal::MAX,
            unit_price: dec("2"),
        };
        validate_lines(&mut errors, &[huge, item("Cable", "1", "1000000000000")], None);
        let body = errors.into_result().unwrap_err().to_json();
        assert!(body["field_errors"]["items[0].quantity"].is_string(), "{}", body);
        assert!(body["field_errors"]["items[1].unit_price"].is_string(), "{}", body);
    }

    #[test]
    fn rejects_excess_precision() {
        let mut errors = FieldErrors::new();
        validate_lines(&mut errors, &[item("Cable", "1.0005", "3.999")], Some(dec("12.345")));
        let body = errors.into_result().unwrap_err().to_json();
        assert_eq!(body["field_errors"]["items[0].quantity"], "At most 3 decimal places");
        assert_eq!(body["field_errors"]["items[0].unit_price"], "At most 2 decimal places");
        assert_eq!(body["field_errors"]["tax_rate"], "At most 2 decimal places");

        let mut errors = FieldErrors::new();
        validate_lines(&mut errors, &[item("Cable", "10.500", "3.90")], Some(dec("15.00")));
        assert!(errors.is_empty());
    }

    #[test]
    fn overflowing_lines_are_validation_errors() {
        let items = vec![LineItemInput {
            description: "Bulk".into(),
            quantity: Decimal::MAX,
            unit_price: dec("2"),
        }];
        match price(&items, Decimal::ZERO) {
            Err(ServiceError::Validation { field, .. }) => assert_eq!(field, "items[0].amount"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn totals_beyond_column_limit_are_rejected() {
        let items = vec![item("Plant", "99999999999", "9"), item("More plant", "99999999999", "2")];
        match price(&items, Decimal::ZERO) {
            Err(ServiceError::Validation { field, .. }) => assert_eq!(field, "subtotal"),
            other => panic!("expected validation error, got {:?}", other),
        }

        let items = vec![item("Plant", "1", "999999999999.99")];
        match price(&items, dec("10")) {
            Err(ServiceError::Validation { field, .. }) => assert_eq!(field, "total"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
