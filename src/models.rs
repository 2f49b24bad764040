use serde::{Deserialize, Serialize};
use crate::schema::reservations;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use diesel::{deserialize::{self, FromSql}, pg::{Pg, PgValue}, serialize::{self, Output, ToSql}, sql_types::Text, Insertable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::SeatingType)]
pub enum SeatingCategory {
    TABLE,
    COUNTER,
}

impl SeatingCategory {
    pub fn label(&self) -> &'static str {
        match *self {
            SeatingCategory::TABLE => "Table Seating",
            SeatingCategory::COUNTER => "Counter Seating",
        }
    }
}

impl ToSql<crate::schema::sql_types::SeatingType, Pg> for SeatingCategory {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            SeatingCategory::TABLE => "TABLE",
            SeatingCategory::COUNTER => "COUNTER",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::SeatingType, Pg> for SeatingCategory {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "TABLE" => Ok(SeatingCategory::TABLE),
            "COUNTER" => Ok(SeatingCategory::COUNTER),
            s => Err(format!("Unrecognized seating type: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::ReservationStatus)]
pub enum ReservationStatus {
    AWAITING,
    CONFIRMED,
    CANCELLED,
    DUPLICATE,
}

impl ToSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            ReservationStatus::AWAITING => "AWAITING",
            ReservationStatus::CONFIRMED => "CONFIRMED",
            ReservationStatus::CANCELLED => "CANCELLED",
            ReservationStatus::DUPLICATE => "DUPLICATE",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "AWAITING" => Ok(ReservationStatus::AWAITING),
            "CONFIRMED" => Ok(ReservationStatus::CONFIRMED),
            "CANCELLED" => Ok(ReservationStatus::CANCELLED),
            "DUPLICATE" => Ok(ReservationStatus::DUPLICATE),
            s => Err(format!("Unrecognized reservation status: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Serialize)]
#[diesel(table_name = reservations)]
pub struct Reservation {
    pub reservation_id: i32,
    pub name: String,
    pub email: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub seating_type: SeatingCategory,
    pub status: ReservationStatus,
    pub cancel_token: String,
    pub note: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reservations)]
pub struct NewReservation {
    pub name: String,
    pub email: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub seating_type: SeatingCategory,
    pub status: ReservationStatus,
    pub cancel_token: String,
    pub note: Option<String>,
}

// Request/Response models for API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatingPreference {
    Table,
    Counter,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRequest {
    pub name: String,
    pub email: String,
    pub date: String,
    pub time: String,
    pub party_size: i32,
    pub note: Option<String>,
    pub seating_preference: Option<SeatingPreference>,
    #[serde(default)]
    pub confirm_duplicate: bool,
}

#[derive(Debug, Serialize)]
pub struct BookingConfirmation {
    pub reservation_id: i32,
    pub name: String,
    pub email: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub seating: SeatingCategory,
    pub status: ReservationStatus,
    pub message: String,
    pub cancellation_url: String,
}

impl BookingConfirmation {
    pub fn new(reservation: &Reservation, base_url: &str) -> Self {
        BookingConfirmation {
            reservation_id: reservation.reservation_id,
            name: reservation.name.clone(),
            email: reservation.email.clone(),
            date: reservation.date,
            time: reservation.time,
            party_size: reservation.party_size,
            seating: reservation.seating_type,
            status: reservation.status,
            message: format!(
                "Your reservation at La Italia is confirmed for {} at {}.",
                reservation.date, reservation.time
            ),
            cancellation_url: cancellation_url(base_url, &reservation.cancel_token),
        }
    }
}

pub fn cancellation_url(base_url: &str, token: &str) -> String {
    format!("{}/cancel/{}", base_url.trim_end_matches('/'), token)
}
