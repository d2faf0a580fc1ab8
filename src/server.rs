use std::io;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::auth::PasswordAuth;
use crate::engine::{Engine, EngineError};
use crate::limits::MAX_LINE_LEN;
use crate::observability;
use crate::protocol::{self, ProtocolError, Request, Response};

/// Maps parsed requests onto engine operations.
pub struct Handler {
    engine: Arc<Engine>,
    auth: PasswordAuth,
}

impl Handler {
    pub fn new(engine: Arc<Engine>, password: String) -> Self {
        Self {
            engine,
            auth: PasswordAuth::new(password),
        }
    }

    /// Run one authenticated request.
    pub async fn execute(&self, request: Request) -> Response {
        let engine = &self.engine;
        match request {
            // Re-authenticating on an open session is a no-op.
            Request::Auth { .. } => Response::Ok(json!({ "authenticated": true })),
            Request::AddItem {
                id,
                name,
                rate_per_day,
                under_maintenance,
            } => {
                let id = id.unwrap_or_else(Ulid::new);
                match engine.add_item(id, name, rate_per_day, under_maintenance).await {
                    Ok(()) => reply(engine.get_item(id).await),
                    Err(e) => Response::from(&e),
                }
            }
            Request::SetMaintenance {
                item_id,
                under_maintenance,
            } => reply(engine.set_maintenance(item_id, under_maintenance).await),
            Request::GetItem { item_id } => reply(engine.get_item(item_id).await),
            Request::Quote {
                item_id,
                start_date,
                end_date,
            } => reply(
                engine
                    .quote(item_id, start_date, end_date)
                    .await
                    .map(|total_cost| json!({ "total_cost": total_cost })),
            ),
            Request::Reserve {
                user_id,
                item_id,
                start_date,
                end_date,
            } => reply(engine.reserve(user_id, item_id, start_date, end_date).await),
            Request::Cancel {
                user_id,
                reservation_id,
            } => reply(
                engine
                    .cancel(reservation_id, user_id)
                    .await
                    .map(|()| json!({ "reservation_id": reservation_id, "status": "cancelled" })),
            ),
            Request::GetReservation { reservation_id } => {
                reply(engine.get_reservation(reservation_id).await)
            }
            Request::ListReservations { user_id } => {
                reply(Ok(engine.list_user_reservations(user_id).await))
            }
            Request::LatestReservation { user_id } => {
                reply(engine.latest_reservation(user_id).await)
            }
            Request::GetPayment {
                user_id,
                reservation_id,
            } => reply(engine.get_payment(reservation_id, user_id).await),
        }
    }
}

fn reply<T: Serialize>(result: Result<T, EngineError>) -> Response {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(v) => Response::Ok(v),
            Err(e) => Response::error("InternalError", e.to_string()),
        },
        Err(e) => Response::from(&e),
    }
}

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}

async fn send<S>(framed: &mut Framed<S, LinesCodec>, response: &Response) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let line = serde_json::to_string(response).map_err(io::Error::other)?;
    framed.send(line).await.map_err(codec_err)
}

/// Serve one client connection: newline-delimited JSON requests in, one JSON
/// response line per request out. The first request must be `auth`.
pub async fn process_connection<S>(socket: S, handler: Arc<Handler>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let mut authenticated = false;

    while let Some(frame) = framed.next().await {
        let line = match frame {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                // The codec skips to the next newline; the session carries on.
                send(&mut framed, &Response::from(&ProtocolError::LineTooLong)).await?;
                continue;
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = match protocol::parse_request(&line) {
            Ok(r) => r,
            Err(e) => {
                debug!("bad request: {e}");
                send(&mut framed, &Response::from(&e)).await?;
                if !authenticated {
                    return Ok(());
                }
                continue;
            }
        };

        if !authenticated {
            let (response, ok) = match &request {
                Request::Auth { password } if handler.auth.verify(password) => {
                    (Response::Ok(json!({ "authenticated": true })), true)
                }
                Request::Auth { .. } => {
                    warn!("authentication failed");
                    metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
                    (Response::from(&ProtocolError::AuthFailed), false)
                }
                _ => (Response::from(&ProtocolError::Unauthenticated), false),
            };
            send(&mut framed, &response).await?;
            if !ok {
                return Ok(());
            }
            authenticated = true;
            continue;
        }

        let op = observability::request_label(&request);
        let start = Instant::now();
        let response = handler.execute(request).await;
        let status = if response.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::REQUESTS_TOTAL, "op" => op, "status" => status)
            .increment(1);
        metrics::histogram!(observability::REQUEST_DURATION_SECONDS, "op" => op)
            .record(start.elapsed().as_secs_f64());

        send(&mut framed, &response).await?;
    }
    Ok(())
}
