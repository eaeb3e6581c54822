//! [`CatalogStore`] implementation for [`PostgresCatalogStore`].

use crate::PostgresCatalogStore;
use crate::map_sqlx_error;
use crate::rows::{
    TICKET_COLUMNS, TICKET_DETAILS_SELECT, TRANSFER_COLUMNS, WAITLIST_COLUMNS, bind_money, count,
    event_from_row, order_from_row, order_line_from_row, ticket_details_from_row, ticket_from_row,
    ticket_type_from_row, tier_from_row, transfer_from_row, user_from_row, waitlist_from_row,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool, Row};
use std::future::Future;
use std::time::Instant;
use turnstile_core::StoreError;
use turnstile_core::codes::{EntryCode, TransferCode};
use turnstile_core::store::{
    CatalogStore, ClaimOutcome, ClaimRequest, CommitOutcome, EntryLookup, OrderCancellation,
    OrderSwap, PurchaseCommit, StatusSwap, StoreFuture, TicketSwap, TransferCreation, TransferSwap,
    WaitlistInsert,
};
use turnstile_core::types::{
    Event, EventId, Order, OrderId, OrderLine, OrderStatus, PricingTier, Ticket, TicketDetails,
    TicketId, TicketStatus, TicketTransfer, TicketType, TicketTypeId, TransferId, TransferStatus,
    User, UserId, WaitlistEntry,
};
use turnstile_runtime::metrics::StoreMetrics;
use uuid::Uuid;

const ORDER_COLUMNS: &str =
    "id, order_number, user_id, event_id, subtotal, service_fee, total, status, created_at";

/// Time an operation and record it under `operation`.
async fn observe<T, F>(operation: &'static str, future: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let start = Instant::now();
    let result = future.await;
    StoreMetrics::record_operation(operation, start.elapsed(), result.is_ok());
    if let Err(error) = &result {
        tracing::warn!(operation, error = %error, "Catalog store operation failed");
    }
    result
}

fn to_i64(value: u32) -> i64 {
    i64::from(value)
}

fn affected_u32(rows: u64) -> u32 {
    u32::try_from(rows).unwrap_or(u32::MAX)
}

async fn load_tiers<'e, E>(
    executor: E,
    ticket_type_ids: &[Uuid],
) -> Result<Vec<(Uuid, PricingTier)>, StoreError>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT ticket_type_id, id, name, price, priority, starts_at, ends_at, \
         max_quantity, active \
         FROM pricing_tiers WHERE ticket_type_id = ANY($1) ORDER BY ticket_type_id, position",
    )
    .bind(ticket_type_ids)
    .fetch_all(executor)
    .await
    .map_err(|e| map_sqlx_error("Failed to load pricing tiers", &e))?;

    rows.iter()
        .map(|row| {
            let owner: Uuid = row
                .try_get("ticket_type_id")
                .map_err(|e| StoreError::Corrupt(format!("column ticket_type_id: {e}")))?;
            Ok((owner, tier_from_row(row)?))
        })
        .collect()
}

async fn attach_tiers(pool: &PgPool, rows: &[PgRow]) -> Result<Vec<TicketType>, StoreError> {
    let mut ticket_types = rows
        .iter()
        .map(ticket_type_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let ids: Vec<Uuid> = ticket_types.iter().map(|tt| *tt.id.as_uuid()).collect();
    for (owner, tier) in load_tiers(pool, &ids).await? {
        if let Some(tt) = ticket_types.iter_mut().find(|tt| *tt.id.as_uuid() == owner) {
            tt.tiers.push(tier);
        }
    }
    Ok(ticket_types)
}

async fn load_order_lines<'e, E>(
    executor: E,
    order_id: OrderId,
) -> Result<Vec<OrderLine>, StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "SELECT ticket_type_id, quantity, amount FROM order_lines \
         WHERE order_id = $1 ORDER BY line_no",
    )
    .bind(order_id.as_uuid())
    .fetch_all(executor)
    .await
    .map_err(|e| map_sqlx_error("Failed to load order lines", &e))?
    .iter()
    .map(order_line_from_row)
    .collect()
}

async fn insert_ticket<'e, E>(executor: E, ticket: &Ticket) -> Result<(), StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO tickets \
         (id, entry_code, owner_id, event_id, ticket_type_id, order_id, price, tier_name, \
          status, used_at, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(ticket.id.as_uuid())
    .bind(ticket.entry_code.as_str())
    .bind(ticket.owner_id.as_uuid())
    .bind(ticket.event_id.as_uuid())
    .bind(ticket.ticket_type_id.as_uuid())
    .bind(ticket.order_id.map(|id| *id.as_uuid()))
    .bind(bind_money(ticket.price)?)
    .bind(&ticket.tier_name)
    .bind(ticket.status.as_str())
    .bind(ticket.used_at)
    .bind(ticket.created_at)
    .execute(executor)
    .await
    .map_err(|e| map_sqlx_error("Failed to insert ticket", &e))?;
    Ok(())
}

async fn insert_order<'e, E>(executor: E, order: &Order) -> Result<(), StoreError>
where
    E: PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO orders \
         (id, order_number, user_id, event_id, subtotal, service_fee, total, status, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(order.id.as_uuid())
    .bind(&order.order_number)
    .bind(order.user_id.as_uuid())
    .bind(order.event_id.as_uuid())
    .bind(bind_money(order.subtotal)?)
    .bind(bind_money(order.service_fee)?)
    .bind(bind_money(order.total)?)
    .bind(order.status.as_str())
    .bind(order.created_at)
    .execute(executor)
    .await
    .map_err(|e| map_sqlx_error("Failed to insert order", &e))?;
    Ok(())
}

impl PostgresCatalogStore {
    async fn ticket_status(&self, ticket_id: TicketId) -> Result<Option<TicketStatus>, StoreError> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM tickets WHERE id = $1")
            .bind(ticket_id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to load ticket status", &e))?;
        status.as_deref().map(TicketStatus::parse).transpose()
    }

    async fn order_status(&self, order_id: OrderId) -> Result<Option<OrderStatus>, StoreError> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to load order status", &e))?;
        status.as_deref().map(OrderStatus::parse).transpose()
    }

    async fn transfer_status(
        &self,
        transfer_id: TransferId,
    ) -> Result<Option<TransferStatus>, StoreError> {
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM ticket_transfers WHERE id = $1")
                .bind(transfer_id.as_uuid())
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_sqlx_error("Failed to load transfer status", &e))?;
        status.as_deref().map(TransferStatus::parse).transpose()
    }

    async fn fetch_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to load order", &e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut order = order_from_row(&row)?;
        order.lines = load_order_lines(self.pool(), order_id).await?;
        Ok(Some(order))
    }

    async fn fetch_transfers(
        &self,
        filter: &str,
        user_id: UserId,
        now: Option<DateTime<Utc>>,
    ) -> Result<Vec<TicketTransfer>, StoreError> {
        let sql = format!(
            "SELECT {TRANSFER_COLUMNS} FROM ticket_transfers WHERE {filter} \
             ORDER BY created_at DESC, id"
        );
        let mut query = sqlx::query(&sql).bind(user_id.as_uuid());
        if let Some(now) = now {
            query = query.bind(now);
        }
        query
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to list transfers", &e))?
            .iter()
            .map(transfer_from_row)
            .collect()
    }

    async fn commit_purchase_tx(
        &self,
        commit: PurchaseCommit,
    ) -> Result<CommitOutcome, StoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to start transaction", &e))?;

        // Lock in id order so concurrent multi-type purchases cannot deadlock.
        let mut expectations = commit.expectations.clone();
        expectations.sort_by_key(|expectation| expectation.ticket_type_id);

        for expectation in &expectations {
            let locked = sqlx::query(
                "SELECT sold, quantity FROM ticket_types WHERE id = $1 FOR UPDATE",
            )
            .bind(expectation.ticket_type_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to lock ticket type", &e))?;
            let Some(locked) = locked else {
                let _ = tx.rollback().await;
                return Ok(CommitOutcome::Conflict {
                    ticket_type_id: expectation.ticket_type_id,
                });
            };
            let sold = count(&locked, "sold")?;
            let quantity = count(&locked, "quantity")?;

            if !expectation.admits(sold, quantity) {
                let _ = tx.rollback().await;
                tracing::debug!(
                    ticket_type_id = %expectation.ticket_type_id,
                    sold,
                    min_sold = expectation.min_sold,
                    max_sold = expectation.max_sold,
                    "Inventory left the priced range"
                );
                return Ok(CommitOutcome::Conflict {
                    ticket_type_id: expectation.ticket_type_id,
                });
            }

            sqlx::query("UPDATE ticket_types SET sold = sold + $2 WHERE id = $1")
                .bind(expectation.ticket_type_id.as_uuid())
                .bind(to_i64(expectation.quantity))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("Failed to reserve inventory", &e))?;
        }

        insert_order(&mut *tx, &commit.order).await?;
        for (line_no, line) in commit.order.lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_lines (order_id, line_no, ticket_type_id, quantity, amount) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(commit.order.id.as_uuid())
            .bind(i32::try_from(line_no).unwrap_or(i32::MAX))
            .bind(line.ticket_type_id.as_uuid())
            .bind(to_i64(line.quantity))
            .bind(bind_money(line.amount)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to insert order line", &e))?;
        }
        for ticket in &commit.tickets {
            insert_ticket(&mut *tx, ticket).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit purchase", &e))?;
        Ok(CommitOutcome::Committed)
    }

    async fn cancel_order_tx(
        &self,
        order_id: OrderId,
    ) -> Result<StatusSwap<OrderCancellation, OrderStatus>, StoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to start transaction", &e))?;

        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("Failed to lock order", &e))?;
        let Some(status) = status else {
            let _ = tx.rollback().await;
            return Ok(StatusSwap::Missing);
        };
        let actual = OrderStatus::parse(&status)?;
        if !matches!(actual, OrderStatus::Pending | OrderStatus::Paid) {
            let _ = tx.rollback().await;
            return Ok(StatusSwap::Mismatch { actual });
        }

        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id.as_uuid())
        .bind(OrderStatus::Cancelled.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to cancel order", &e))?;
        let mut order = order_from_row(&row)?;

        let cancelled = sqlx::query(
            "UPDATE tickets SET status = $2 WHERE order_id = $1 AND status = $3",
        )
        .bind(order_id.as_uuid())
        .bind(TicketStatus::Cancelled.as_str())
        .bind(TicketStatus::Valid.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to cancel order tickets", &e))?;

        order.lines = load_order_lines(&mut *tx, order_id).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit order cancellation", &e))?;

        Ok(StatusSwap::Swapped(OrderCancellation {
            order,
            tickets_cancelled: affected_u32(cancelled.rows_affected()),
        }))
    }

    async fn create_transfer_tx(
        &self,
        transfer: TicketTransfer,
        now: DateTime<Utc>,
    ) -> Result<TransferCreation, StoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to start transaction", &e))?;

        let ticket = sqlx::query("SELECT owner_id, status FROM tickets WHERE id = $1 FOR UPDATE")
            .bind(transfer.ticket_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to lock ticket", &e))?;
        let Some(ticket) = ticket else {
            let _ = tx.rollback().await;
            return Ok(TransferCreation::TicketMissing);
        };
        let owner: Uuid = ticket
            .try_get("owner_id")
            .map_err(|e| StoreError::Corrupt(format!("column owner_id: {e}")))?;
        let status: String = ticket
            .try_get("status")
            .map_err(|e| StoreError::Corrupt(format!("column status: {e}")))?;
        if owner != *transfer.from_user_id.as_uuid() {
            let _ = tx.rollback().await;
            return Ok(TransferCreation::NotOwner);
        }
        let status = TicketStatus::parse(&status)?;
        if status != TicketStatus::Valid {
            let _ = tx.rollback().await;
            return Ok(TransferCreation::TicketNotValid(status));
        }

        sqlx::query(
            "UPDATE ticket_transfers SET status = $3 \
             WHERE ticket_id = $1 AND status = $4 AND expires_at <= $2",
        )
        .bind(transfer.ticket_id.as_uuid())
        .bind(now)
        .bind(TransferStatus::Expired.as_str())
        .bind(TransferStatus::Pending.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to expire stale transfers", &e))?;

        let pending: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM ticket_transfers WHERE ticket_id = $1 AND status = $2",
        )
        .bind(transfer.ticket_id.as_uuid())
        .bind(TransferStatus::Pending.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to check pending transfers", &e))?;
        if let Some(pending) = pending {
            let _ = tx.rollback().await;
            return Ok(TransferCreation::PendingExists(TransferId::from_uuid(pending)));
        }

        sqlx::query(&format!(
            "INSERT INTO ticket_transfers ({TRANSFER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(transfer.id.as_uuid())
        .bind(transfer.ticket_id.as_uuid())
        .bind(transfer.from_user_id.as_uuid())
        .bind(transfer.to_user_id.map(|id| *id.as_uuid()))
        .bind(transfer.code.as_str())
        .bind(&transfer.recipient_phone)
        .bind(&transfer.recipient_email)
        .bind(&transfer.message)
        .bind(transfer.expires_at)
        .bind(transfer.status.as_str())
        .bind(transfer.created_at)
        .bind(transfer.claimed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to insert transfer", &e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit transfer", &e))?;
        Ok(TransferCreation::Created)
    }

    async fn claim_transfer_tx(&self, request: ClaimRequest) -> Result<ClaimOutcome, StoreError> {
        let ticket_id: Option<Uuid> =
            sqlx::query_scalar("SELECT ticket_id FROM ticket_transfers WHERE id = $1")
                .bind(request.transfer_id.as_uuid())
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_sqlx_error("Failed to load transfer", &e))?;
        let Some(ticket_id) = ticket_id else {
            return Ok(ClaimOutcome::Missing);
        };

        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to start transaction", &e))?;

        // Ticket first, then transfer: the same order create_transfer uses.
        let ticket = sqlx::query(
            "SELECT owner_id, status, entry_code FROM tickets WHERE id = $1 FOR UPDATE",
        )
        .bind(ticket_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to lock ticket", &e))?;

        let transfer = sqlx::query(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM ticket_transfers WHERE id = $1 FOR UPDATE"
        ))
        .bind(request.transfer_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to lock transfer", &e))?;

        let (Some(ticket), Some(transfer)) = (ticket, transfer) else {
            let _ = tx.rollback().await;
            return Ok(ClaimOutcome::Missing);
        };
        let transfer = transfer_from_row(&transfer)?;
        if transfer.status != TransferStatus::Pending {
            let _ = tx.rollback().await;
            return Ok(ClaimOutcome::TransferMismatch {
                actual: transfer.status,
            });
        }
        if request.now >= transfer.expires_at {
            let _ = tx.rollback().await;
            return Ok(ClaimOutcome::Expired);
        }

        let owner: Uuid = ticket
            .try_get("owner_id")
            .map_err(|e| StoreError::Corrupt(format!("column owner_id: {e}")))?;
        let status: String = ticket
            .try_get("status")
            .map_err(|e| StoreError::Corrupt(format!("column status: {e}")))?;
        let old_code: String = ticket
            .try_get("entry_code")
            .map_err(|e| StoreError::Corrupt(format!("column entry_code: {e}")))?;
        let status = TicketStatus::parse(&status)?;
        if status != TicketStatus::Valid || owner != *transfer.from_user_id.as_uuid() {
            let _ = tx.rollback().await;
            return Ok(ClaimOutcome::TicketMismatch { status });
        }

        sqlx::query(
            "INSERT INTO retired_entry_codes (code, ticket_id, retired_at) VALUES ($1, $2, $3)",
        )
        .bind(&old_code)
        .bind(ticket_id)
        .bind(request.now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to retire entry code", &e))?;

        let ticket_row = sqlx::query(&format!(
            "UPDATE tickets AS t SET owner_id = $2, entry_code = $3 \
             WHERE t.id = $1 RETURNING {TICKET_COLUMNS}"
        ))
        .bind(ticket_id)
        .bind(request.claimant.as_uuid())
        .bind(request.new_code.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to re-assign ticket", &e))?;

        let transfer_row = sqlx::query(&format!(
            "UPDATE ticket_transfers SET status = $2, to_user_id = $3, claimed_at = $4 \
             WHERE id = $1 RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(request.transfer_id.as_uuid())
        .bind(TransferStatus::Claimed.as_str())
        .bind(request.claimant.as_uuid())
        .bind(request.now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to mark transfer claimed", &e))?;

        let ticket = ticket_from_row(&ticket_row)?;
        let transfer = transfer_from_row(&transfer_row)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit claim", &e))?;
        Ok(ClaimOutcome::Claimed { ticket, transfer })
    }

    async fn upsert_ticket_type_tx(&self, ticket_type: TicketType) -> Result<(), StoreError> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| map_sqlx_error("Failed to start transaction", &e))?;

        sqlx::query(
            "INSERT INTO ticket_types \
             (id, event_id, name, base_price, quantity, sold, max_per_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
               event_id = EXCLUDED.event_id, \
               name = EXCLUDED.name, \
               base_price = EXCLUDED.base_price, \
               quantity = EXCLUDED.quantity, \
               sold = GREATEST(ticket_types.sold, EXCLUDED.sold), \
               max_per_order = EXCLUDED.max_per_order",
        )
        .bind(ticket_type.id.as_uuid())
        .bind(ticket_type.event_id.as_uuid())
        .bind(&ticket_type.name)
        .bind(bind_money(ticket_type.base_price)?)
        .bind(to_i64(ticket_type.quantity))
        .bind(to_i64(ticket_type.sold))
        .bind(to_i64(ticket_type.max_per_order))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("Failed to upsert ticket type", &e))?;

        sqlx::query("DELETE FROM pricing_tiers WHERE ticket_type_id = $1")
            .bind(ticket_type.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to replace pricing tiers", &e))?;

        for (position, tier) in ticket_type.tiers.iter().enumerate() {
            sqlx::query(
                "INSERT INTO pricing_tiers \
                 (id, ticket_type_id, position, name, price, priority, starts_at, ends_at, \
                  max_quantity, active) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(tier.id.as_uuid())
            .bind(ticket_type.id.as_uuid())
            .bind(i32::try_from(position).unwrap_or(i32::MAX))
            .bind(&tier.name)
            .bind(bind_money(tier.price)?)
            .bind(tier.priority)
            .bind(tier.starts_at)
            .bind(tier.ends_at)
            .bind(tier.max_quantity.map(to_i64))
            .bind(tier.active)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("Failed to insert pricing tier", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("Failed to commit ticket type", &e))?;
        Ok(())
    }
}

impl CatalogStore for PostgresCatalogStore {
    fn upsert_user(&self, user: User) -> StoreFuture<'_, ()> {
        Box::pin(observe("upsert_user", async move {
            sqlx::query(
                "INSERT INTO users (id, name, phone, email) VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (id) DO UPDATE SET \
                   name = EXCLUDED.name, phone = EXCLUDED.phone, email = EXCLUDED.email",
            )
            .bind(user.id.as_uuid())
            .bind(&user.name)
            .bind(&user.phone)
            .bind(&user.email)
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to upsert user", &e))?;
            Ok(())
        }))
    }

    fn upsert_event(&self, event: Event) -> StoreFuture<'_, ()> {
        Box::pin(observe("upsert_event", async move {
            sqlx::query(
                "INSERT INTO events (id, title, venue, status, date) VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (id) DO UPDATE SET \
                   title = EXCLUDED.title, venue = EXCLUDED.venue, \
                   status = EXCLUDED.status, date = EXCLUDED.date",
            )
            .bind(event.id.as_uuid())
            .bind(&event.title)
            .bind(&event.venue)
            .bind(event.status.as_str())
            .bind(event.date)
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to upsert event", &e))?;
            Ok(())
        }))
    }

    fn upsert_ticket_type(&self, ticket_type: TicketType) -> StoreFuture<'_, ()> {
        Box::pin(observe("upsert_ticket_type", self.upsert_ticket_type_tx(ticket_type)))
    }

    fn get_user(&self, user_id: UserId) -> StoreFuture<'_, Option<User>> {
        Box::pin(observe("get_user", async move {
            sqlx::query("SELECT id, name, phone, email FROM users WHERE id = $1")
                .bind(user_id.as_uuid())
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_sqlx_error("Failed to load user", &e))?
                .as_ref()
                .map(user_from_row)
                .transpose()
        }))
    }

    fn get_event(&self, event_id: EventId) -> StoreFuture<'_, Option<Event>> {
        Box::pin(observe("get_event", async move {
            sqlx::query("SELECT id, title, venue, status, date FROM events WHERE id = $1")
                .bind(event_id.as_uuid())
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_sqlx_error("Failed to load event", &e))?
                .as_ref()
                .map(event_from_row)
                .transpose()
        }))
    }

    fn get_ticket_type(&self, ticket_type_id: TicketTypeId) -> StoreFuture<'_, Option<TicketType>> {
        Box::pin(observe("get_ticket_type", async move {
            let rows = sqlx::query(
                "SELECT id, event_id, name, base_price, quantity, sold, max_per_order \
                 FROM ticket_types WHERE id = $1",
            )
            .bind(ticket_type_id.as_uuid())
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to load ticket type", &e))?;
            Ok(attach_tiers(self.pool(), &rows).await?.into_iter().next())
        }))
    }

    fn list_ticket_types(&self, event_id: EventId) -> StoreFuture<'_, Vec<TicketType>> {
        Box::pin(observe("list_ticket_types", async move {
            let rows = sqlx::query(
                "SELECT id, event_id, name, base_price, quantity, sold, max_per_order \
                 FROM ticket_types WHERE event_id = $1 ORDER BY created_seq",
            )
            .bind(event_id.as_uuid())
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to list ticket types", &e))?;
            attach_tiers(self.pool(), &rows).await
        }))
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(self.pool())
                .await
                .map_err(|e| StoreError::Unavailable(format!("Ping failed: {e}")))?;
            Ok(())
        })
    }

    fn commit_purchase(&self, commit: PurchaseCommit) -> StoreFuture<'_, CommitOutcome> {
        Box::pin(observe("commit_purchase", self.commit_purchase_tx(commit)))
    }

    fn get_order(&self, order_id: OrderId) -> StoreFuture<'_, Option<Order>> {
        Box::pin(observe("get_order", self.fetch_order(order_id)))
    }

    fn get_ticket(&self, ticket_id: TicketId) -> StoreFuture<'_, Option<TicketDetails>> {
        Box::pin(observe("get_ticket", async move {
            sqlx::query(&format!("{TICKET_DETAILS_SELECT} WHERE t.id = $1"))
                .bind(ticket_id.as_uuid())
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_sqlx_error("Failed to load ticket", &e))?
                .as_ref()
                .map(ticket_details_from_row)
                .transpose()
        }))
    }

    fn lookup_entry_code(&self, code: EntryCode) -> StoreFuture<'_, EntryLookup> {
        Box::pin(observe("lookup_entry_code", async move {
            let active = sqlx::query(&format!("{TICKET_DETAILS_SELECT} WHERE t.entry_code = $1"))
                .bind(code.as_str())
                .fetch_optional(self.pool())
                .await
                .map_err(|e| map_sqlx_error("Failed to resolve entry code", &e))?;
            if let Some(row) = active {
                return Ok(EntryLookup::Active(Box::new(ticket_details_from_row(&row)?)));
            }

            let retired = sqlx::query(
                "SELECT ticket_id, retired_at FROM retired_entry_codes WHERE code = $1",
            )
            .bind(code.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to resolve retired code", &e))?;
            let Some(row) = retired else {
                return Ok(EntryLookup::Unknown);
            };
            let ticket_id: Uuid = row
                .try_get("ticket_id")
                .map_err(|e| StoreError::Corrupt(format!("column ticket_id: {e}")))?;
            let retired_at: DateTime<Utc> = row
                .try_get("retired_at")
                .map_err(|e| StoreError::Corrupt(format!("column retired_at: {e}")))?;
            Ok(EntryLookup::Retired {
                ticket_id: TicketId::from_uuid(ticket_id),
                retired_at,
            })
        }))
    }

    fn list_tickets_for_user(&self, user_id: UserId) -> StoreFuture<'_, Vec<TicketDetails>> {
        Box::pin(observe("list_tickets_for_user", async move {
            sqlx::query(&format!(
                "{TICKET_DETAILS_SELECT} WHERE t.owner_id = $1 ORDER BY t.created_at DESC, t.id"
            ))
            .bind(user_id.as_uuid())
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to list tickets", &e))?
            .iter()
            .map(ticket_details_from_row)
            .collect()
        }))
    }

    fn compare_and_set_ticket_status(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        new: TicketStatus,
        used_at: Option<DateTime<Utc>>,
    ) -> StoreFuture<'_, TicketSwap> {
        Box::pin(observe("compare_and_set_ticket_status", async move {
            let row = sqlx::query(&format!(
                "UPDATE tickets AS t SET status = $3, used_at = COALESCE($4, t.used_at) \
                 WHERE t.id = $1 AND t.status = $2 RETURNING {TICKET_COLUMNS}"
            ))
            .bind(ticket_id.as_uuid())
            .bind(expected.as_str())
            .bind(new.as_str())
            .bind(used_at)
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to update ticket status", &e))?;

            if let Some(row) = row {
                return Ok(StatusSwap::Swapped(ticket_from_row(&row)?));
            }
            Ok(match self.ticket_status(ticket_id).await? {
                Some(actual) => StatusSwap::Mismatch { actual },
                None => StatusSwap::Missing,
            })
        }))
    }

    fn compare_and_set_order_status(
        &self,
        order_id: OrderId,
        expected: OrderStatus,
        new: OrderStatus,
    ) -> StoreFuture<'_, OrderSwap> {
        Box::pin(observe("compare_and_set_order_status", async move {
            let row = sqlx::query(&format!(
                "UPDATE orders SET status = $3 WHERE id = $1 AND status = $2 \
                 RETURNING {ORDER_COLUMNS}"
            ))
            .bind(order_id.as_uuid())
            .bind(expected.as_str())
            .bind(new.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to update order status", &e))?;

            if let Some(row) = row {
                let mut order = order_from_row(&row)?;
                order.lines = load_order_lines(self.pool(), order_id).await?;
                return Ok(StatusSwap::Swapped(order));
            }
            Ok(match self.order_status(order_id).await? {
                Some(actual) => StatusSwap::Mismatch { actual },
                None => StatusSwap::Missing,
            })
        }))
    }

    fn cancel_order(
        &self,
        order_id: OrderId,
    ) -> StoreFuture<'_, StatusSwap<OrderCancellation, OrderStatus>> {
        Box::pin(observe("cancel_order", self.cancel_order_tx(order_id)))
    }

    fn cancel_event_tickets(&self, event_id: EventId) -> StoreFuture<'_, u32> {
        Box::pin(observe("cancel_event_tickets", async move {
            let result = sqlx::query(
                "UPDATE tickets SET status = $2 WHERE event_id = $1 AND status = $3",
            )
            .bind(event_id.as_uuid())
            .bind(TicketStatus::Cancelled.as_str())
            .bind(TicketStatus::Valid.as_str())
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to cancel event tickets", &e))?;
            Ok(affected_u32(result.rows_affected()))
        }))
    }

    fn create_transfer(
        &self,
        transfer: TicketTransfer,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, TransferCreation> {
        Box::pin(observe("create_transfer", self.create_transfer_tx(transfer, now)))
    }

    fn get_transfer(&self, transfer_id: TransferId) -> StoreFuture<'_, Option<TicketTransfer>> {
        Box::pin(observe("get_transfer", async move {
            sqlx::query(&format!(
                "SELECT {TRANSFER_COLUMNS} FROM ticket_transfers WHERE id = $1"
            ))
            .bind(transfer_id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to load transfer", &e))?
            .as_ref()
            .map(transfer_from_row)
            .transpose()
        }))
    }

    fn find_transfer_by_code(&self, code: TransferCode) -> StoreFuture<'_, Option<TicketTransfer>> {
        Box::pin(observe("find_transfer_by_code", async move {
            sqlx::query(&format!(
                "SELECT {TRANSFER_COLUMNS} FROM ticket_transfers WHERE code = $1"
            ))
            .bind(code.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to find transfer", &e))?
            .as_ref()
            .map(transfer_from_row)
            .transpose()
        }))
    }

    fn claim_transfer(&self, request: ClaimRequest) -> StoreFuture<'_, ClaimOutcome> {
        Box::pin(observe("claim_transfer", self.claim_transfer_tx(request)))
    }

    fn compare_and_set_transfer_status(
        &self,
        transfer_id: TransferId,
        expected: TransferStatus,
        new: TransferStatus,
    ) -> StoreFuture<'_, TransferSwap> {
        Box::pin(observe("compare_and_set_transfer_status", async move {
            let row = sqlx::query(&format!(
                "UPDATE ticket_transfers SET status = $3 WHERE id = $1 AND status = $2 \
                 RETURNING {TRANSFER_COLUMNS}"
            ))
            .bind(transfer_id.as_uuid())
            .bind(expected.as_str())
            .bind(new.as_str())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to update transfer status", &e))?;

            if let Some(row) = row {
                return Ok(StatusSwap::Swapped(transfer_from_row(&row)?));
            }
            Ok(match self.transfer_status(transfer_id).await? {
                Some(actual) => StatusSwap::Mismatch { actual },
                None => StatusSwap::Missing,
            })
        }))
    }

    fn list_pending_transfers(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<TicketTransfer>> {
        Box::pin(observe(
            "list_pending_transfers",
            self.fetch_transfers(
                "from_user_id = $1 AND status = 'pending' AND expires_at > $2",
                user_id,
                Some(now),
            ),
        ))
    }

    fn list_transfer_history(&self, user_id: UserId) -> StoreFuture<'_, Vec<TicketTransfer>> {
        Box::pin(observe(
            "list_transfer_history",
            self.fetch_transfers("from_user_id = $1 OR to_user_id = $1", user_id, None),
        ))
    }

    fn expire_stale_transfers(&self, now: DateTime<Utc>) -> StoreFuture<'_, u64> {
        Box::pin(observe("expire_stale_transfers", async move {
            let result = sqlx::query(
                "UPDATE ticket_transfers SET status = $2 WHERE status = $3 AND expires_at <= $1",
            )
            .bind(now)
            .bind(TransferStatus::Expired.as_str())
            .bind(TransferStatus::Pending.as_str())
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to expire transfers", &e))?;
            Ok(result.rows_affected())
        }))
    }

    fn insert_waitlist_entry(&self, entry: WaitlistEntry) -> StoreFuture<'_, WaitlistInsert> {
        Box::pin(observe("insert_waitlist_entry", async move {
            let result = sqlx::query(
                "INSERT INTO waitlist_entries \
                 (id, event_id, user_id, ticket_type_id, phone, email, joined_at, notified, \
                  notified_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (event_id, user_id) DO NOTHING",
            )
            .bind(entry.id.as_uuid())
            .bind(entry.event_id.as_uuid())
            .bind(entry.user_id.as_uuid())
            .bind(entry.ticket_type_id.map(|id| *id.as_uuid()))
            .bind(&entry.phone)
            .bind(&entry.email)
            .bind(entry.joined_at)
            .bind(entry.notified)
            .bind(entry.notified_at)
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to insert waitlist entry", &e))?;
            Ok(if result.rows_affected() == 0 {
                WaitlistInsert::AlreadyPresent
            } else {
                WaitlistInsert::Inserted
            })
        }))
    }

    fn remove_waitlist_entry(&self, event_id: EventId, user_id: UserId) -> StoreFuture<'_, bool> {
        Box::pin(observe("remove_waitlist_entry", async move {
            let result =
                sqlx::query("DELETE FROM waitlist_entries WHERE event_id = $1 AND user_id = $2")
                    .bind(event_id.as_uuid())
                    .bind(user_id.as_uuid())
                    .execute(self.pool())
                    .await
                    .map_err(|e| map_sqlx_error("Failed to remove waitlist entry", &e))?;
            Ok(result.rows_affected() > 0)
        }))
    }

    fn get_waitlist_entry(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> StoreFuture<'_, Option<WaitlistEntry>> {
        Box::pin(observe("get_waitlist_entry", async move {
            sqlx::query(&format!(
                "SELECT {WAITLIST_COLUMNS} FROM waitlist_entries \
                 WHERE event_id = $1 AND user_id = $2"
            ))
            .bind(event_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to load waitlist entry", &e))?
            .as_ref()
            .map(waitlist_from_row)
            .transpose()
        }))
    }

    fn waitlist_position(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> StoreFuture<'_, Option<u32>> {
        Box::pin(observe("waitlist_position", async move {
            let position: Option<i64> = sqlx::query_scalar(
                "SELECT position FROM ( \
                   SELECT user_id, ROW_NUMBER() OVER (ORDER BY joined_at, seq) AS position \
                   FROM waitlist_entries WHERE event_id = $1 \
                 ) ranked WHERE user_id = $2",
            )
            .bind(event_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to compute waitlist position", &e))?;
            position
                .map(u32::try_from)
                .transpose()
                .map_err(|_| StoreError::Corrupt("waitlist position out of range".to_string()))
        }))
    }

    fn claim_waitlist_batch(
        &self,
        event_id: EventId,
        limit: u32,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<WaitlistEntry>> {
        Box::pin(observe("claim_waitlist_batch", async move {
            if limit == 0 {
                return Ok(Vec::new());
            }
            let rows = sqlx::query(&format!(
                "UPDATE waitlist_entries SET notified = TRUE, notified_at = $3 \
                 WHERE id IN ( \
                   SELECT id FROM waitlist_entries \
                   WHERE event_id = $1 AND NOT notified \
                   ORDER BY joined_at, seq \
                   LIMIT $2 \
                   FOR UPDATE SKIP LOCKED \
                 ) RETURNING {WAITLIST_COLUMNS}, seq"
            ))
            .bind(event_id.as_uuid())
            .bind(to_i64(limit))
            .bind(now)
            .fetch_all(self.pool())
            .await
            .map_err(|e| map_sqlx_error("Failed to claim waitlist batch", &e))?;

            let mut claimed = rows
                .iter()
                .map(|row| {
                    let seq: i64 = row
                        .try_get("seq")
                        .map_err(|e| StoreError::Corrupt(format!("column seq: {e}")))?;
                    Ok((seq, waitlist_from_row(row)?))
                })
                .collect::<Result<Vec<_>, StoreError>>()?;
            // RETURNING order is unspecified.
            claimed.sort_by(|(a_seq, a), (b_seq, b)| {
                a.joined_at.cmp(&b.joined_at).then(a_seq.cmp(b_seq))
            });
            Ok(claimed.into_iter().map(|(_, entry)| entry).collect())
        }))
    }
}
