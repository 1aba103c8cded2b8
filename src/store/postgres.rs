use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use time::Date;

use crate::availability::is_slot_available;
use crate::error::BookingError;
use crate::models::{
    Addon, BookedSlot, Booking, BookingAddon, BookingDetails, BookingFilter, BookingLine, BookingStatus,
    BookingSummary, PricingTier, Setting, Studio,
};

use super::RecordStore;

const BOOKING_COLUMNS: &str = "b.id, b.studio_id, b.booking_date, b.start_time, b.duration_hours, \
     b.additional_hour, b.customer_name, b.customer_phone, b.customer_email, b.total_price, b.status, b.notes";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }
}

fn read(e: sqlx::Error) -> BookingError {
    BookingError::StoreRead(e)
}

fn write(e: sqlx::Error) -> BookingError {
    BookingError::StoreWrite(e)
}

fn expect_one(rows_affected: u64, kind: &'static str, key: impl ToString) -> Result<(), BookingError> {
    if rows_affected == 0 {
        return Err(BookingError::not_found(kind, key));
    }
    Ok(())
}

/// Serialises schedule changes for the booking's studio and day until the
/// transaction ends.
async fn lock_schedule(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> Result<(), BookingError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(booking.studio_id)
        .bind(booking.booking_date.to_julian_day())
        .execute(&mut **tx)
        .await
        .map_err(write)?;
    Ok(())
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list_studios(&self, active_only: bool) -> Result<Vec<Studio>, BookingError> {
        sqlx::query_as::<_, Studio>(
            "SELECT id, name, description, is_active FROM studios
             WHERE is_active OR NOT $1
             ORDER BY id",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(read)
    }

    async fn get_studio(&self, id: i32) -> Result<Studio, BookingError> {
        sqlx::query_as::<_, Studio>("SELECT id, name, description, is_active FROM studios WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(read)?
            .ok_or_else(|| BookingError::not_found("studio", id))
    }

    async fn set_studio_active(&self, id: i32, active: bool) -> Result<(), BookingError> {
        let result = sqlx::query("UPDATE studios SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await
            .map_err(write)?;
        expect_one(result.rows_affected(), "studio", id)
    }

    async fn list_pricing_tiers(&self) -> Result<Vec<PricingTier>, BookingError> {
        sqlx::query_as::<_, PricingTier>("SELECT id, duration_hours, price FROM pricing ORDER BY duration_hours")
            .fetch_all(&self.pool)
            .await
            .map_err(read)
    }

    async fn upsert_pricing_tier(&self, duration_hours: i32, price: i64) -> Result<(), BookingError> {
        sqlx::query(
            "INSERT INTO pricing (duration_hours, price) VALUES ($1, $2)
             ON CONFLICT (duration_hours) DO UPDATE SET price = $2, updated_at = now()",
        )
        .bind(duration_hours)
        .bind(price)
        .execute(&self.pool)
        .await
        .map_err(write)?;
        Ok(())
    }

    async fn delete_pricing_tier(&self, duration_hours: i32) -> Result<(), BookingError> {
        let result = sqlx::query("DELETE FROM pricing WHERE duration_hours = $1")
            .bind(duration_hours)
            .execute(&self.pool)
            .await
            .map_err(write)?;
        expect_one(result.rows_affected(), "pricing tier", duration_hours)
    }

    async fn list_addons(&self, active_only: bool) -> Result<Vec<Addon>, BookingError> {
        sqlx::query_as::<_, Addon>(
            "SELECT id, name, description, price, is_active FROM addons
             WHERE is_active OR NOT $1
             ORDER BY name",
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(read)
    }

    async fn create_addon(&self, name: &str, description: Option<&str>, price: i64) -> Result<Addon, BookingError> {
        sqlx::query_as::<_, Addon>(
            "INSERT INTO addons (name, description, price, is_active) VALUES ($1, $2, $3, TRUE)
             RETURNING id, name, description, price, is_active",
        )
        .bind(name)
        .bind(description)
        .bind(price)
        .fetch_one(&self.pool)
        .await
        .map_err(write)
    }

    async fn update_addon(&self, addon: &Addon) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE addons SET name = $2, description = $3, price = $4, is_active = $5, updated_at = now()
             WHERE id = $1",
        )
        .bind(addon.id)
        .bind(&addon.name)
        .bind(&addon.description)
        .bind(addon.price)
        .bind(addon.is_active)
        .execute(&self.pool)
        .await
        .map_err(write)?;
        expect_one(result.rows_affected(), "add-on", addon.id)
    }

    async fn delete_addon(&self, id: i32) -> Result<(), BookingError> {
        let result = sqlx::query("DELETE FROM addons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(write)?;
        expect_one(result.rows_affected(), "add-on", id)
    }

    async fn list_settings(&self) -> Result<Vec<Setting>, BookingError> {
        sqlx::query_as::<_, Setting>("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .map_err(read)
    }

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<(), BookingError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(write)?;
        Ok(())
    }

    async fn list_bookings(
        &self,
        studio_id: i32,
        date: Date,
        status_excluding: Option<BookingStatus>,
    ) -> Result<Vec<BookedSlot>, BookingError> {
        sqlx::query_as::<_, BookedSlot>(
            "SELECT start_time, duration_hours, additional_hour FROM bookings
             WHERE studio_id = $1 AND booking_date = $2
             AND ($3::TEXT IS NULL OR status <> $3)
             ORDER BY start_time",
        )
        .bind(studio_id)
        .bind(date)
        .bind(status_excluding.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(read)
    }

    async fn get_booking(&self, id: &str) -> Result<BookingDetails, BookingError> {
        let summary = sqlx::query_as::<_, BookingSummary>(&format!(
            "SELECT {}, s.name AS studio_name
             FROM bookings b
             JOIN studios s ON b.studio_id = s.id
             WHERE b.id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(read)?
        .ok_or_else(|| BookingError::not_found("booking", id))?;

        let addons = sqlx::query_as::<_, BookingLine>(
            "SELECT a.name, ba.quantity, ba.price
             FROM booking_addons ba
             JOIN addons a ON ba.addon_id = a.id
             WHERE ba.booking_id = $1
             ORDER BY ba.id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(read)?;

        Ok(BookingDetails {
            booking: summary.booking,
            studio_name: summary.studio_name,
            addons,
        })
    }

    async fn search_bookings(&self, filter: &BookingFilter) -> Result<Vec<BookingSummary>, BookingError> {
        sqlx::query_as::<_, BookingSummary>(&format!(
            "SELECT {}, s.name AS studio_name
             FROM bookings b
             JOIN studios s ON b.studio_id = s.id
             WHERE ($1::TEXT IS NULL OR b.status = $1)
             AND ($2::DATE IS NULL OR b.booking_date = $2)
             ORDER BY b.booking_date DESC, b.start_time DESC
             LIMIT $3 OFFSET $4",
            BOOKING_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.date)
        .bind(BookingFilter::PAGE_SIZE as i64)
        .bind(filter.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(read)
    }

    async fn count_bookings(&self) -> Result<i64, BookingError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(read)
    }

    async fn create_booking(&self, booking: &Booking, addons: &[BookingAddon]) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(write)?;

        lock_schedule(&mut tx, booking).await?;

        let taken = sqlx::query_as::<_, BookedSlot>(
            "SELECT start_time, duration_hours, additional_hour FROM bookings
             WHERE studio_id = $1 AND booking_date = $2 AND status <> 'cancelled'",
        )
        .bind(booking.studio_id)
        .bind(booking.booking_date)
        .fetch_all(&mut *tx)
        .await
        .map_err(read)?;

        if !is_slot_available(&taken, booking.start_time, booking.duration_hours, booking.additional_hour) {
            warn!(
                "slot {} on {} for studio {} was taken before booking {} could be written",
                booking.start_time, booking.booking_date, booking.studio_id, booking.id
            );
            return Err(BookingError::SlotUnavailable);
        }

        let inserted = sqlx::query(
            "INSERT INTO bookings (id, studio_id, booking_date, start_time, duration_hours, additional_hour,
                 customer_name, customer_phone, customer_email, total_price, status, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(&booking.id)
        .bind(booking.studio_id)
        .bind(booking.booking_date)
        .bind(booking.start_time.to_string())
        .bind(booking.duration_hours)
        .bind(booking.additional_hour)
        .bind(&booking.customer_name)
        .bind(&booking.customer_phone)
        .bind(&booking.customer_email)
        .bind(booking.total_price)
        .bind(booking.status.as_str())
        .bind(&booking.notes)
        .execute(&mut *tx)
        .await;

        match inserted {
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => return Err(BookingError::DuplicateBookingId),
            other => {
                other.map_err(write)?;
            }
        }

        if !addons.is_empty() {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO booking_addons (booking_id, addon_id, quantity, price) ");
            builder.push_values(addons, |mut row, line| {
                row.push_bind(&line.booking_id)
                    .push_bind(line.addon_id)
                    .push_bind(line.quantity)
                    .push_bind(line.price);
            });
            builder.build().execute(&mut *tx).await.map_err(write)?;
        }

        tx.commit().await.map_err(write)?;
        info!("booking {} stored with {} add-on lines", booking.id, addons.len());
        Ok(())
    }

    async fn update_booking_status(&self, id: &str, status: BookingStatus) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(write)?;

        let current = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {} FROM bookings b WHERE b.id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(read)?
        .ok_or_else(|| BookingError::not_found("booking", id))?;

        // Reopening puts the booking back on the schedule, so it has to fit.
        if current.status == BookingStatus::Cancelled && status != BookingStatus::Cancelled {
            lock_schedule(&mut tx, &current).await?;
            let taken = sqlx::query_as::<_, BookedSlot>(
                "SELECT start_time, duration_hours, additional_hour FROM bookings
                 WHERE studio_id = $1 AND booking_date = $2 AND status <> 'cancelled' AND id <> $3",
            )
            .bind(current.studio_id)
            .bind(current.booking_date)
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(read)?;

            if !is_slot_available(&taken, current.start_time, current.duration_hours, current.additional_hour) {
                warn!(
                    "booking {} cannot be reopened: {} on {} is taken",
                    id, current.start_time, current.booking_date
                );
                return Err(BookingError::SlotUnavailable);
            }
        }

        sqlx::query("UPDATE bookings SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(write)?;
        tx.commit().await.map_err(write)
    }
}
