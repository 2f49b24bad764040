#[macro_use]
extern crate diesel;

use actix_web::{delete, error, get, middleware, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::Utc;
use diesel::{prelude::*, r2d2};
use dotenvy;
use subtle::ConstantTimeEq;
mod actions;
mod errors;
mod mailer;
mod models;
mod rules;
mod schema;

type DbPool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;

#[derive(Debug, serde::Serialize)]
struct Res {
    message: String,
}

#[derive(Debug, Clone)]
struct AppConfig {
    owner_password: String,
    base_url: String,
}

#[derive(Debug, serde::Deserialize)]
struct OwnerQuery {
    pwd: Option<String>,
}

// The pwd query parameter is a shared secret, so compare in constant time
fn verify_owner(config: &AppConfig, supplied: Option<&str>) -> Result<(), errors::BookingError> {
    let supplied = supplied.unwrap_or("");
    if supplied
        .as_bytes()
        .ct_eq(config.owner_password.as_bytes())
        .unwrap_u8()
        == 1
    {
        Ok(())
    } else {
        Err(errors::BookingError::NotAuthorized)
    }
}

#[post("/booking")]
async fn create_booking(
    pool: web::Data<DbPool>,
    mailer_service: web::Data<mailer::MailerService>,
    config: web::Data<AppConfig>,
    form: web::Json<models::BookingRequest>,
) -> actix_web::Result<impl Responder> {
    let today = Utc::now().date_naive();

    let reservation = web::block(move || {
        let mut conn = pool.get()?;
        actions::create_reservation(&mut conn, &form, today)
    })
    .await??;

    let confirmation = models::BookingConfirmation::new(&reservation, &config.base_url);

    // Email goes out on a separate task so a slow broker never delays the response
    let mailer_clone = mailer_service.clone();
    let base_url = config.base_url.clone();
    tokio::spawn(async move {
        if let Err(e) = mailer_clone.send_confirmation(&reservation, &base_url).await {
            log::error!(
                "Failed to queue confirmation email for reservation {}: {:?}",
                reservation.reservation_id,
                e
            );
        }
    });

    Ok(HttpResponse::Created().json(confirmation))
}

#[get("/cancel/{token}")]
async fn cancel_reservation(
    pool: web::Data<DbPool>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let token = path.into_inner();

    let cancelled = web::block(move || {
        let mut conn = pool.get()?;
        actions::cancel_by_token(&mut conn, &token)
    })
    .await??;

    log::info!(
        "Cancelled reservation {} for {} on {}",
        cancelled.reservation_id,
        cancelled.email,
        cancelled.date
    );

    Ok(HttpResponse::Ok().json(Res {
        message: "Your reservation has been cancelled.".to_string(),
    }))
}

#[get("/reservations")]
async fn reservation_list(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    query: web::Query<OwnerQuery>,
) -> actix_web::Result<impl Responder> {
    verify_owner(&config, query.pwd.as_deref())?;

    let all = web::block(move || {
        let mut conn = pool.get()?;
        actions::list_reservations(&mut conn)
    })
    .await??;

    Ok(HttpResponse::Ok().json(all))
}

#[get("/reservations/{id}")]
async fn reservation_detail(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    query: web::Query<OwnerQuery>,
) -> actix_web::Result<impl Responder> {
    verify_owner(&config, query.pwd.as_deref())?;
    let id = path.into_inner();

    let reservation = web::block(move || {
        let mut conn = pool.get()?;
        actions::find_reservation(&mut conn, id)
    })
    .await??;

    Ok(HttpResponse::Ok().json(reservation))
}

#[delete("/reservations/{id}")]
async fn reservation_delete(
    pool: web::Data<DbPool>,
    config: web::Data<AppConfig>,
    path: web::Path<i32>,
    query: web::Query<OwnerQuery>,
) -> actix_web::Result<impl Responder> {
    verify_owner(&config, query.pwd.as_deref())?;
    let id = path.into_inner();

    web::block(move || {
        let mut conn = pool.get()?;
        actions::delete_reservation(&mut conn, id)
    })
    .await??;

    log::info!("Owner deleted reservation {}", id);

    Ok(HttpResponse::Ok().json(Res {
        message: "Reservation deleted.".to_string(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // initialize DB pool outside of `HttpServer::new` so that it is shared across all workers
    let pool = initialize_db_pool();

    let config = AppConfig {
        owner_password: owner_password_from(std::env::var("OWNER_PASSWORD").ok()),
        base_url: std::env::var("BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
    };

    let amqp_host = std::env::var("AMQP_HOST").unwrap_or_else(|_| "localhost".to_string());
    let mut mailer_service = mailer::MailerService::new(amqp_host);
    if let Err(e) = mailer_service.initialize().await {
        // bookings still work without the broker, confirmation emails are skipped
        log::error!("Mailer initialization failed: {:?}", e);
    }

    let mailer_service = web::Data::new(mailer_service);
    let config = web::Data::new(config);

    log::info!("starting HTTP server at http://localhost:8080");

    let http = HttpServer::new(move || {
        App::new()
            // add DB pool handle to app data; enables use of `web::Data<DbPool>` extractor
            .app_data(web::Data::new(pool.clone()))
            .app_data(mailer_service.clone())
            .app_data(config.clone())
            .wrap(middleware::Logger::default())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let detail = err.to_string();
                let response = match err {
                    error::JsonPayloadError::ContentType => {
                        HttpResponse::UnsupportedMediaType().body("Unsupported Media Type")
                    }
                    error::JsonPayloadError::Deserialize(ref err) => {
                        HttpResponse::BadRequest().json(Res { message: err.to_string() })
                    }

                    _ => HttpResponse::BadRequest().json(Res { message: detail }),
                };
                error::InternalError::from_response(err, response).into()
            }))
            .service(create_booking)
            .service(cancel_reservation)
            .service(reservation_list)
            .service(reservation_detail)
            .service(reservation_delete)
    })
    .bind(("127.0.0.1", 8080)).unwrap()
    .run();

    http.await
}

fn initialize_db_pool() -> DbPool {
    let conn_spec = std::env::var("DATABASE_URL").expect("DATABASE_URL should be set");
    let manager = r2d2::ConnectionManager::<PgConnection>::new(conn_spec);
    r2d2::Pool::builder()
        .build(manager)
        .expect("DATABASE_URL should point at a reachable PostgreSQL database")
}

// An empty password would make the ct_eq check pass for a missing ?pwd=
fn owner_password_from(value: Option<String>) -> String {
    value
        .filter(|pwd| !pwd.is_empty())
        .expect("OWNER_PASSWORD should be set to a non-empty value")
}
