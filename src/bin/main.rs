use std::env;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::info;
use secure_card::session::EventStream;
use secure_card::{Clock, CloseReason, SecureCardService, SessionEvent, Settings, SystemClock};
use tokio::runtime::Handle;

const USAGE: &str = "usage:
  securecard issue <cardId>
  securecard verify <cardId> <token> <signature>
  securecard demo <cardId>

The signing key is read from SECURE_CARD_SECRET_KEY or SECURE_CARD_SECRET_KEY_HEX.";

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // Initialize logging
    env_logger::init();

    // Load configuration
    let settings = Settings::from_env()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (service, events) =
        SecureCardService::from_settings(settings, clock.clone(), Handle::current());

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["issue", card_id] => issue(&service, clock.as_ref(), card_id),
        ["verify", card_id, token, signature] => verify(&service, card_id, token, signature),
        ["demo", card_id] => demo(&service, clock.as_ref(), events, card_id).await,
        _ => {
            eprintln!("{}", USAGE);
            Ok(ExitCode::from(2))
        }
    }
}

fn issue(
    service: &SecureCardService,
    clock: &dyn Clock,
    card_id: &str,
) -> Result<ExitCode, Box<dyn Error>> {
    let issued = service.issuer().issue(card_id, clock.now_millis()?)?;
    let expires_at = DateTime::<Utc>::from_timestamp_millis(issued.expires_at_millis)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default();
    info!("Issued token for card {} expiring {}", card_id, expires_at);

    let output = serde_json::json!({
        "cardId": card_id,
        "token": issued.token,
        "signature": issued.signature,
        "expiresAtMillis": issued.expires_at_millis,
        "expiresAt": expires_at,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(ExitCode::SUCCESS)
}

fn verify(
    service: &SecureCardService,
    card_id: &str,
    token: &str,
    signature: &str,
) -> Result<ExitCode, Box<dyn Error>> {
    let outcome = service.validate_authorization(card_id, token, signature)?;
    println!("{}", serde_json::to_string(&outcome)?);
    if outcome.is_accepted() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Issue, validate and open a session, then print events until it closes.
/// Ctrl-C dismisses the session.
async fn demo(
    service: &SecureCardService,
    clock: &dyn Clock,
    mut events: EventStream,
    card_id: &str,
) -> Result<ExitCode, Box<dyn Error>> {
    let issued = service.issuer().issue(card_id, clock.now_millis()?)?;
    let outcome = service.validate_authorization(card_id, &issued.token, &issued.signature)?;
    let handle = service.open_session(outcome, card_id, None)?;
    info!(
        "Demo session {} open for card {}, press Ctrl-C to dismiss",
        handle.id(),
        handle.card_id()
    );

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                println!("{}", event.to_json()?);
                if matches!(event, SessionEvent::Closed { .. }) {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                service.request_close(CloseReason::UserDismiss)?;
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
