//! Row mapping between PostgreSQL and domain types.

use sqlx::Row;
use sqlx::postgres::PgRow;
use turnstile_core::StoreError;
use turnstile_core::codes::{EntryCode, TransferCode};
use turnstile_core::types::{
    Event, EventId, EventStatus, Money, Order, OrderId, OrderLine, OrderStatus, PricingTier,
    PricingTierId, Ticket, TicketDetails, TicketId, TicketStatus, TicketTransfer, TicketType,
    TicketTypeId, TransferId, TransferStatus, User, UserId, WaitlistEntry, WaitlistEntryId,
};
use uuid::Uuid;

pub(crate) const TICKET_COLUMNS: &str = "t.id, t.entry_code, t.owner_id, t.event_id, \
     t.ticket_type_id, t.order_id, t.price, t.tier_name, t.status, t.used_at, t.created_at";

pub(crate) const TICKET_DETAILS_SELECT: &str = "SELECT t.id, t.entry_code, t.owner_id, \
     t.event_id, t.ticket_type_id, t.order_id, t.price, t.tier_name, t.status, t.used_at, \
     t.created_at, e.title AS event_title, e.date AS event_date, e.venue AS venue, \
     tt.name AS ticket_type_name, u.name AS holder_name, u.phone AS holder_phone, \
     o.status AS order_status \
     FROM tickets t \
     JOIN events e ON e.id = t.event_id \
     JOIN ticket_types tt ON tt.id = t.ticket_type_id \
     LEFT JOIN users u ON u.id = t.owner_id \
     LEFT JOIN orders o ON o.id = t.order_id";

pub(crate) const TRANSFER_COLUMNS: &str = "id, ticket_id, from_user_id, to_user_id, code, \
     recipient_phone, recipient_email, message, expires_at, status, created_at, claimed_at";

pub(crate) const WAITLIST_COLUMNS: &str =
    "id, event_id, user_id, ticket_type_id, phone, email, joined_at, notified, notified_at";

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Corrupt(format!("column {column}: {e}")))
}

pub(crate) fn money(row: &PgRow, column: &str) -> Result<Money, StoreError> {
    let minor: i64 = get(row, column)?;
    u64::try_from(minor)
        .map(Money::from_minor)
        .map_err(|_| StoreError::Corrupt(format!("negative amount in {column}")))
}

pub(crate) fn count(row: &PgRow, column: &str) -> Result<u32, StoreError> {
    let value: i64 = get(row, column)?;
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("count out of range in {column}")))
}

pub(crate) fn bind_money(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.minor()).map_err(|_| {
        StoreError::Database(format!("amount {} exceeds storage range", amount.minor()))
    })
}

pub(crate) fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        phone: get(row, "phone")?,
        email: get(row, "email")?,
    })
}

pub(crate) fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    let status: String = get(row, "status")?;
    Ok(Event {
        id: EventId::from_uuid(get(row, "id")?),
        title: get(row, "title")?,
        venue: get(row, "venue")?,
        status: EventStatus::parse(&status)?,
        date: get(row, "date")?,
    })
}

pub(crate) fn tier_from_row(row: &PgRow) -> Result<PricingTier, StoreError> {
    let max_quantity: Option<i64> = get(row, "max_quantity")?;
    Ok(PricingTier {
        id: PricingTierId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        price: money(row, "price")?,
        priority: get(row, "priority")?,
        starts_at: get(row, "starts_at")?,
        ends_at: get(row, "ends_at")?,
        max_quantity: max_quantity
            .map(u32::try_from)
            .transpose()
            .map_err(|_| StoreError::Corrupt("tier max_quantity out of range".to_string()))?,
        active: get(row, "active")?,
    })
}

/// Ticket type without tiers; callers attach them.
pub(crate) fn ticket_type_from_row(row: &PgRow) -> Result<TicketType, StoreError> {
    Ok(TicketType {
        id: TicketTypeId::from_uuid(get(row, "id")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        name: get(row, "name")?,
        base_price: money(row, "base_price")?,
        quantity: count(row, "quantity")?,
        sold: count(row, "sold")?,
        max_per_order: count(row, "max_per_order")?,
        tiers: Vec::new(),
    })
}

pub(crate) fn ticket_from_row(row: &PgRow) -> Result<Ticket, StoreError> {
    let status: String = get(row, "status")?;
    let order_id: Option<Uuid> = get(row, "order_id")?;
    Ok(Ticket {
        id: TicketId::from_uuid(get(row, "id")?),
        entry_code: EntryCode::new(get::<String>(row, "entry_code")?),
        owner_id: UserId::from_uuid(get(row, "owner_id")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        ticket_type_id: TicketTypeId::from_uuid(get(row, "ticket_type_id")?),
        order_id: order_id.map(OrderId::from_uuid),
        price: money(row, "price")?,
        tier_name: get(row, "tier_name")?,
        status: TicketStatus::parse(&status)?,
        used_at: get(row, "used_at")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn ticket_details_from_row(row: &PgRow) -> Result<TicketDetails, StoreError> {
    let holder_name: Option<String> = get(row, "holder_name")?;
    let holder_phone: Option<String> = get(row, "holder_phone")?;
    let order_status: Option<String> = get(row, "order_status")?;
    Ok(TicketDetails {
        ticket: ticket_from_row(row)?,
        event_title: get(row, "event_title")?,
        event_date: get(row, "event_date")?,
        venue: get(row, "venue")?,
        ticket_type_name: get(row, "ticket_type_name")?,
        holder_name: holder_name.or(holder_phone),
        order_status: order_status.as_deref().map(OrderStatus::parse).transpose()?,
    })
}

/// Order without lines; callers attach them.
pub(crate) fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    let status: String = get(row, "status")?;
    Ok(Order {
        id: OrderId::from_uuid(get(row, "id")?),
        order_number: get(row, "order_number")?,
        user_id: UserId::from_uuid(get(row, "user_id")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        lines: Vec::new(),
        subtotal: money(row, "subtotal")?,
        service_fee: money(row, "service_fee")?,
        total: money(row, "total")?,
        status: OrderStatus::parse(&status)?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn order_line_from_row(row: &PgRow) -> Result<OrderLine, StoreError> {
    Ok(OrderLine {
        ticket_type_id: TicketTypeId::from_uuid(get(row, "ticket_type_id")?),
        quantity: count(row, "quantity")?,
        amount: money(row, "amount")?,
    })
}

pub(crate) fn transfer_from_row(row: &PgRow) -> Result<TicketTransfer, StoreError> {
    let status: String = get(row, "status")?;
    let to_user_id: Option<Uuid> = get(row, "to_user_id")?;
    Ok(TicketTransfer {
        id: TransferId::from_uuid(get(row, "id")?),
        ticket_id: TicketId::from_uuid(get(row, "ticket_id")?),
        from_user_id: UserId::from_uuid(get(row, "from_user_id")?),
        to_user_id: to_user_id.map(UserId::from_uuid),
        code: TransferCode::normalize(&get::<String>(row, "code")?),
        recipient_phone: get(row, "recipient_phone")?,
        recipient_email: get(row, "recipient_email")?,
        message: get(row, "message")?,
        expires_at: get(row, "expires_at")?,
        status: TransferStatus::parse(&status)?,
        created_at: get(row, "created_at")?,
        claimed_at: get(row, "claimed_at")?,
    })
}

pub(crate) fn waitlist_from_row(row: &PgRow) -> Result<WaitlistEntry, StoreError> {
    let ticket_type_id: Option<Uuid> = get(row, "ticket_type_id")?;
    Ok(WaitlistEntry {
        id: WaitlistEntryId::from_uuid(get(row, "id")?),
        event_id: EventId::from_uuid(get(row, "event_id")?),
        user_id: UserId::from_uuid(get(row, "user_id")?),
        ticket_type_id: ticket_type_id.map(TicketTypeId::from_uuid),
        phone: get(row, "phone")?,
        email: get(row, "email")?,
        joined_at: get(row, "joined_at")?,
        notified: get(row, "notified")?,
        notified_at: get(row, "notified_at")?,
    })
}
