use amqprs::{
    callbacks::{DefaultChannelCallback, DefaultConnectionCallback},
    channel::{BasicPublishArguments, Channel, QueueDeclareArguments},
    connection::{Connection, OpenConnectionArguments},
    BasicProperties,
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{cancellation_url, Reservation};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

// Message handed to the mail worker over RabbitMQ
#[derive(Debug, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn confirmation_email(reservation: &Reservation, base_url: &str) -> EmailMessage {
    let mut body = format!(
        "Hello {},\n\n\
         Thank you for booking a table at La Italia.\n\n\
         Reservation details:\n\
         Date: {}\n\
         Time: {}\n\
         Party size: {}\n\
         Seating: {}\n",
        reservation.name,
        reservation.date,
        reservation.time.format("%H:%M"),
        reservation.party_size,
        reservation.seating_type.label(),
    );
    if let Some(note) = &reservation.note {
        body.push_str(&format!("Note: {}\n", note));
    }
    body.push_str(&format!(
        "\nTo cancel your reservation, visit:\n{}\n\n\
         We look forward to serving you!\n\
         La Italia\n",
        cancellation_url(base_url, &reservation.cancel_token),
    ));

    EmailMessage {
        to: reservation.email.clone(),
        subject: "Your Reservation at La Italia".to_string(),
        body,
    }
}

#[derive(Clone)]
pub struct MailerService {
    connection: Option<Arc<Connection>>,
    amqp_host: String,
    mail_queue: String,
}

impl MailerService {
    pub fn new(amqp_host: String) -> Self {
        Self {
            connection: None,
            amqp_host,
            mail_queue: "reservation.emails".to_string(),
        }
    }

    pub async fn initialize(&mut self) -> Result<()> {
        info!("Connecting to RabbitMQ with amqprs...");

        let connection = Connection::open(&OpenConnectionArguments::new(
            &self.amqp_host,
            5672,
            "guest",
            "guest",
        ))
        .await?;

        connection
            .register_callback(DefaultConnectionCallback)
            .await?;

        let setup_channel = connection.open_channel(None).await?;
        setup_channel
            .register_callback(DefaultChannelCallback)
            .await?;

        // The mail worker consumes from this queue; messages survive a broker restart
        setup_channel
            .queue_declare(
                QueueDeclareArguments::new(&self.mail_queue)
                    .durable(true)
                    .finish(),
            )
            .await?;

        self.connection = Some(Arc::new(connection));

        let _ = setup_channel.close().await;

        info!("Connected to RabbitMQ and declared queue {}", self.mail_queue);

        Ok(())
    }

    async fn get_fresh_channel(&self) -> Result<Channel> {
        if let Some(connection) = &self.connection {
            let channel = connection.open_channel(None).await?;
            channel.register_callback(DefaultChannelCallback).await?;

            // Small delay to ensure channel is fully ready
            tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;

            Ok(channel)
        } else {
            Err("RabbitMQ connection not initialized".into())
        }
    }

    async fn publish(&self, message: &EmailMessage) -> Result<()> {
        let channel = self.get_fresh_channel().await?;

        let serialized = serde_json::to_string(message)?;
        let content = serialized.as_bytes().to_vec();

        let properties = BasicProperties::default()
            .with_delivery_mode(2) // persistent
            .finish();

        // Publish directly to the queue
        let args = BasicPublishArguments::new("", &self.mail_queue);

        channel.basic_publish(properties, content, args).await?;

        let _ = channel.close().await;

        Ok(())
    }

    // Retries with backoff, then gives up without propagating. Mail failures
    // must never block a booking.
    pub async fn send_confirmation(&self, reservation: &Reservation, base_url: &str) -> Result<()> {
        let message = confirmation_email(reservation, base_url);

        let max_retries = 2;
        let mut delay_ms = 25;

        for attempt in 1..=max_retries {
            match self.publish(&message).await {
                Ok(_) => {
                    info!(
                        "📧 Queued confirmation email for {} (reservation {})",
                        message.to, reservation.reservation_id
                    );
                    return Ok(());
                }
                Err(e) => {
                    if attempt < max_retries {
                        warn!(
                            "Email publish failed (attempt {}/{}), retrying: {:?}",
                            attempt, max_retries, e
                        );
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                        delay_ms *= 2;
                    } else {
                        error!(
                            "Email publish failed after {} attempts, giving up: {:?}",
                            max_retries, e
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReservationStatus, SeatingCategory};
    use chrono::{NaiveDate, NaiveTime};

    fn sample_reservation() -> Reservation {
        Reservation {
            reservation_id: 7,
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            time: NaiveTime::from_hms_opt(19, 30, 0).unwrap(),
            party_size: 4,
            seating_type: SeatingCategory::TABLE,
            status: ReservationStatus::CONFIRMED,
            cancel_token: "2fca68ac-0813-4b5f-9e43-5a1e30467ab4".to_string(),
            note: None,
            created_at: None,
        }
    }

    #[test]
    fn confirmation_email_contains_the_cancellation_link() {
        let message = confirmation_email(&sample_reservation(), "http://127.0.0.1:8080");

        assert_eq!(message.to, "ada@example.com");
        assert_eq!(message.subject, "Your Reservation at La Italia");
        assert!(message.body.contains("Hello Ada Lovelace,"));
        assert!(message.body.contains("Date: 2026-09-01"));
        assert!(message.body.contains("Time: 19:30"));
        assert!(message.body.contains("Seating: Table Seating"));
        assert!(message
            .body
            .contains("http://127.0.0.1:8080/cancel/2fca68ac-0813-4b5f-9e43-5a1e30467ab4"));
        assert!(!message.body.contains("Note:"));
    }

    #[test]
    fn confirmation_email_includes_the_note_when_present() {
        let mut reservation = sample_reservation();
        reservation.note = Some("window seat please".to_string());

        let message = confirmation_email(&reservation, "http://127.0.0.1:8080");
        assert!(message.body.contains("Note: window seat please"));
    }
}
