use diesel::prelude::*;
use diesel::sql_types::BigInt;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use crate::errors::BookingError;
use crate::models::{self, ReservationStatus};
use crate::rules;

// Serialises bookings for one (date, time) slot. Concurrent requests for
// other slots proceed in parallel; the lock is released at commit/rollback.
fn lock_slot(
    conn: &mut PgConnection,
    slot_date: NaiveDate,
    slot_time: NaiveTime,
) -> Result<(), BookingError> {
    diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(rules::slot_lock_key(slot_date, slot_time))
        .execute(conn)?;
    Ok(())
}

fn find_nearby_booking(
    conn: &mut PgConnection,
    diner_email: &str,
    requested: NaiveDate,
) -> Result<Option<models::Reservation>, BookingError> {
    use crate::schema::reservations::dsl::{date, email, reservations, time};

    let (window_start, window_end) = rules::duplicate_window(requested);

    let existing = reservations
        .filter(email.eq(diner_email))
        .filter(date.between(window_start, window_end))
        .order((date.asc(), time.asc()))
        .first::<models::Reservation>(conn)
        .optional()?;

    Ok(existing)
}

fn slot_occupancy(
    conn: &mut PgConnection,
    slot_date: NaiveDate,
    slot_time: NaiveTime,
) -> Result<Vec<(models::SeatingCategory, i32)>, BookingError> {
    use crate::schema::reservations::dsl::{date, party_size, reservations, seating_type, time};

    let snapshot = reservations
        .filter(date.eq(slot_date))
        .filter(time.eq(slot_time))
        .select((seating_type, party_size))
        .load::<(models::SeatingCategory, i32)>(conn)?;

    Ok(snapshot)
}

pub fn create_reservation(
    conn: &mut PgConnection,
    form: &models::BookingRequest,
    today: NaiveDate,
) -> Result<models::Reservation, BookingError> {
    use crate::schema::reservations::dsl::{reservation_id, reservations};

    let requested_date = rules::parse_date(&form.date)?;
    let requested_time = rules::parse_time(&form.time)?;
    rules::validate_fields(&form.name, &form.email, form.party_size)?;
    rules::check_slot(requested_date, requested_time, today)?;

    conn.transaction(|conn| {
        lock_slot(conn, requested_date, requested_time)?;

        if !form.confirm_duplicate {
            if let Some(existing) = find_nearby_booking(conn, &form.email, requested_date)? {
                return Err(BookingError::DuplicateBooking {
                    date: existing.date,
                    time: existing.time,
                });
            }
        }

        let assignment = rules::assign_seating(form.party_size, form.seating_preference)?;
        let occupancy = slot_occupancy(conn, requested_date, requested_time)?;
        rules::check_capacity(assignment, form.party_size, &occupancy)?;

        let new_reservation = models::NewReservation {
            name: form.name.clone(),
            email: form.email.clone(),
            date: requested_date,
            time: requested_time,
            party_size: form.party_size,
            seating_type: assignment.category(),
            status: ReservationStatus::CONFIRMED,
            cancel_token: Uuid::new_v4().to_string(),
            note: form.note.clone(),
        };

        let id = diesel::insert_into(reservations)
            .values(&new_reservation)
            .returning(reservation_id)
            .get_result::<i32>(conn)?;

        let created = reservations.find(id).first::<models::Reservation>(conn)?;

        Ok(created)
    })
}

pub fn cancel_by_token(
    conn: &mut PgConnection,
    token: &str,
) -> Result<models::Reservation, BookingError> {
    use crate::schema::reservations::dsl::{cancel_token, reservations};

    let cancelled = diesel::delete(reservations.filter(cancel_token.eq(token)))
        .get_result::<models::Reservation>(conn)
        .optional()?;

    cancelled.ok_or(BookingError::TokenNotFound)
}

pub fn list_reservations(conn: &mut PgConnection) -> Result<Vec<models::Reservation>, BookingError> {
    use crate::schema::reservations::dsl::{date, reservations, time};

    let all = reservations
        .order((date.desc(), time.desc()))
        .load::<models::Reservation>(conn)?;

    Ok(all)
}

pub fn find_reservation(
    conn: &mut PgConnection,
    id: i32,
) -> Result<models::Reservation, BookingError> {
    use crate::schema::reservations::dsl::reservations;

    let found = reservations
        .find(id)
        .first::<models::Reservation>(conn)
        .optional()?;

    found.ok_or(BookingError::NotFound)
}

pub fn delete_reservation(conn: &mut PgConnection, id: i32) -> Result<(), BookingError> {
    use crate::schema::reservations::dsl::reservations;

    let deleted = diesel::delete(reservations.find(id)).execute(conn)?;
    if deleted == 0 {
        return Err(BookingError::NotFound);
    }

    Ok(())
}
