use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::order::{
    DayCounter, DayKey, NewOrder, OrderCreated, OrderId, OrderProductView, OrderStatus, OrderView,
    StatusChange, Ticket,
};
use crate::store::{OrderStore, StoreError};

const ORDER_COLUMNS: &str = "id, order_status, total_price, payment_id, cpf, ticket_number, \
     created_at, preparing_at, done_at, delivered_at, not_delivered_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_status: String,
    total_price: f64,
    payment_id: Option<String>,
    cpf: Option<String>,
    ticket_number: i32,
    created_at: DateTime<Utc>,
    preparing_at: Option<DateTime<Utc>>,
    done_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    not_delivered_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct LineRow {
    order_id: i64,
    product_id: i64,
    name: Option<String>,
    description: Option<String>,
}

impl OrderRow {
    fn into_view(self, lines: Vec<OrderProductView>) -> Result<OrderView, StoreError> {
        let order_status: OrderStatus = self
            .order_status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("order {}: {e}", self.id)))?;

        Ok(OrderView {
            order_id: self.id,
            order_date: self.created_at,
            ticket_number: self.ticket_number,
            order_status,
            preparing_at: self.preparing_at,
            done_at: self.done_at,
            delivered_at: self.delivered_at,
            not_delivered_at: self.not_delivered_at,
            total_price: self.total_price,
            payment_id: self.payment_id,
            national_id: self.cpf,
            order_product: lines,
            customer_name: None,
        })
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads line items for `rows` in one query and builds the views.
    async fn with_lines(&self, rows: Vec<OrderRow>) -> Result<Vec<OrderView>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let lines: Vec<LineRow> = sqlx::query_as(
            "SELECT op.order_id, op.product_id, p.name, p.description
             FROM order_products op
             LEFT JOIN products p ON p.id = op.product_id
             WHERE op.order_id = ANY($1)
             ORDER BY op.order_id, op.position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<i64, Vec<OrderProductView>> = HashMap::new();
        for line in lines {
            by_order.entry(line.order_id).or_default().push(OrderProductView {
                product_id: line.product_id,
                product_name: line.name,
                description: line.description,
            });
        }

        rows.into_iter()
            .map(|row| {
                let lines = by_order.remove(&row.id).unwrap_or_default();
                row.into_view(lines)
            })
            .collect()
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(
        &self,
        order: &NewOrder,
        status: OrderStatus,
        ticket: Ticket,
    ) -> Result<OrderCreated, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            "INSERT INTO orders (order_status, total_price, payment_id, cpf, ticket_number, order_day)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, created_at",
        )
        .bind(status.as_str())
        .bind(order.total_price)
        .bind(order.payment_id.as_deref())
        .bind(order.national_id.as_deref())
        .bind(ticket.number)
        .bind(ticket.day.date())
        .fetch_one(&mut *tx)
        .await?;

        for (position, line) in order.order_product.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_products (order_id, product_id, position) VALUES ($1, $2, $3)",
            )
            .bind(id)
            .bind(line.product_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(order_id = id, ticket_number = ticket.number, "Order row inserted");
        Ok(OrderCreated {
            id,
            created_at,
            ticket_number: ticket.number,
        })
    }

    async fn update_status(&self, order_id: OrderId, change: StatusChange) -> Result<bool, StoreError> {
        let column = change.stamp.column();
        let sql = format!(
            "UPDATE orders SET order_status = $1, {column} = $2
             WHERE id = $3 AND order_status = $4 AND {column} IS NULL"
        );

        let result = sqlx::query(&sql)
            .bind(change.to.as_str())
            .bind(change.at)
            .bind(order_id)
            .bind(change.from.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn confirm_payment(&self, order_id: OrderId, payment_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE orders SET order_status = $1, payment_id = $2
             WHERE id = $3 AND order_status = $4",
        )
        .bind(OrderStatus::Created.as_str())
        .bind(payment_id)
        .bind(order_id)
        .bind(OrderStatus::Paying.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_id(&self, order_id: OrderId) -> Result<Option<OrderView>, StoreError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(self.with_lines(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderView>, StoreError> {
        let literals: Vec<&str> = statuses.iter().map(OrderStatus::as_str).collect();

        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE order_status = ANY($1)
             ORDER BY created_at, id"
        ))
        .bind(&literals)
        .fetch_all(&self.pool)
        .await?;

        self.with_lines(rows).await
    }

    async fn get_or_create_day_counter(&self, day: DayKey) -> Result<DayCounter, StoreError> {
        let inserted: Option<(i32,)> = sqlx::query_as(
            "INSERT INTO order_ticket_numbers (day, ticket_number) VALUES ($1, 1)
             ON CONFLICT (day) DO NOTHING
             RETURNING ticket_number",
        )
        .bind(day.date())
        .fetch_optional(&self.pool)
        .await?;

        if let Some((value,)) = inserted {
            return Ok(DayCounter { value, created: true });
        }

        let (value,): (i32,) =
            sqlx::query_as("SELECT ticket_number FROM order_ticket_numbers WHERE day = $1")
                .bind(day.date())
                .fetch_one(&self.pool)
                .await?;

        Ok(DayCounter {
            value,
            created: false,
        })
    }

    async fn increment_day_counter(&self, day: DayKey) -> Result<i32, StoreError> {
        let updated: Option<(i32,)> = sqlx::query_as(
            "UPDATE order_ticket_numbers SET ticket_number = ticket_number + 1
             WHERE day = $1
             RETURNING ticket_number",
        )
        .bind(day.date())
        .fetch_optional(&self.pool)
        .await?;

        updated
            .map(|(value,)| value)
            .ok_or_else(|| StoreError::Corrupt(format!("no ticket counter for {day}")))
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM order_products WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted == 1)
    }
}
