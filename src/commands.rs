//! Command handlers behind the `bank0` binary.
//!
//! Each handler writes its human-readable output to `out` and leaves error
//! reporting to the caller.

use std::fs;
use std::future::Future;
use std::io::Write;
use std::path::Path;

use bank0_core::{Bank0Error, Bank0Result, Enrollment};
use bank0_guardian::{AuthorizationRequest, ConsentApi, Notification};
use bank0_totp::totp::{format_code_display, CodeUpdate, TotpGenerator, Urgency};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::app::Bank0App;

fn io(e: std::io::Error) -> Bank0Error {
    Bank0Error::Storage(format!("cannot write output: {}", e))
}

/// Describe the held enrollment.
pub fn status(app: &Bank0App, out: &mut dyn Write) -> Bank0Result<()> {
    let Some(e) = app.enrollment() else {
        writeln!(out, "Not enrolled").map_err(io)?;
        return Ok(());
    };
    writeln!(out, "Enrollment: {}", e.id()).map_err(io)?;
    writeln!(out, "User:       {}", e.user_id()).map_err(io)?;
    writeln!(out, "Device:     {} ({})", e.device_name(), e.device_identifier()).map_err(io)?;
    match (e.algorithm(), e.digits(), e.period()) {
        (Some(algorithm), Some(digits), Some(period)) if e.supports_totp() => {
            writeln!(out, "Codes:      {} digits every {}s ({})", digits, period, algorithm)
                .map_err(io)?
        }
        _ => writeln!(out, "Codes:      not supported by this enrollment").map_err(io)?,
    }
    Ok(())
}

/// Print the current code and the seconds it stays valid.
pub fn code(app: &Bank0App, out: &mut dyn Write) -> Bank0Result<()> {
    let code = app.current_code()?;
    writeln!(
        out,
        "{}  ({}s left)",
        format_code_display(&code.code),
        code.remaining_ms.div_ceil(1000)
    )
    .map_err(io)
}

/// Follow the ticker until `count` distinct codes were shown or `shutdown`
/// resolves.
pub async fn watch(
    app: &mut Bank0App,
    updates: &mut UnboundedReceiver<CodeUpdate>,
    count: Option<usize>,
    shutdown: impl Future<Output = ()>,
    out: &mut dyn Write,
) -> Bank0Result<()> {
    if app.start()?.is_none() {
        return Err(match app.enrollment() {
            Some(e) => Bank0Error::UnsupportedEnrollment(format!(
                "enrollment {} has no code parameters",
                e.id()
            )),
            None => Bank0Error::NotEnrolled,
        });
    }

    tokio::pin!(shutdown);
    let mut shown = 0usize;
    let mut last_counter = None;
    let result = loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(update) = update else { break Ok(()) };
                let new_code = last_counter != Some(update.code.counter);
                if new_code {
                    last_counter = Some(update.code.counter);
                    shown += 1;
                }
                if let Err(e) = print_update(&update, out) {
                    break Err(e);
                }
                if new_code && count.is_some_and(|n| shown >= n) {
                    break Ok(());
                }
            }
            _ = &mut shutdown => break Ok(()),
        }
    };
    app.detach();
    result
}

fn print_update(update: &CodeUpdate, out: &mut dyn Write) -> Bank0Result<()> {
    let marker = match update.urgency {
        Urgency::Normal => "",
        Urgency::AboutToExpire => "  (expiring)",
    };
    writeln!(
        out,
        "{}  {:>2}s{}",
        format_code_display(&update.code.code),
        update.code.remaining_ms.div_ceil(1000),
        marker
    )
    .map_err(io)
}

/// Store an enrollment record produced by the enrollment SDK.
///
/// Records with unusable or incomplete code parameters are refused before
/// anything is stored.
pub fn import(app: &mut Bank0App, file: &Path, out: &mut dyn Write) -> Bank0Result<()> {
    let json = fs::read_to_string(file)?;
    let enrollment = Enrollment::from_json(&json)?;
    if enrollment.has_totp_parameters() {
        TotpGenerator::from_enrollment(&enrollment)?;
    }
    let id = enrollment.id().to_string();
    app.complete_enrollment(enrollment)?;
    app.detach();
    writeln!(out, "Enrolled {}", id).map_err(io)
}

/// Remove the local enrollment. Works on a record that no longer loads.
pub fn forget(app: &mut Bank0App, out: &mut dyn Write) -> Bank0Result<()> {
    // An unreadable store still counts as holding something to remove
    let had = app.enrollment().is_some() || app.store().is_enrolled().unwrap_or(true);
    app.forget()?;
    if had {
        writeln!(out, "Enrollment removed from this device").map_err(io)
    } else {
        writeln!(out, "Not enrolled").map_err(io)
    }
}

/// Route a notification and show what it asks for. Payment details are
/// fetched from `consent` when the notification is a payment request; a
/// login request never needs it, so its construction error only surfaces
/// for payments.
pub async fn consent(
    app: &Bank0App,
    file: &Path,
    consent: Bank0Result<&dyn ConsentApi>,
    out: &mut dyn Write,
) -> Bank0Result<()> {
    let notification = Notification::from_json(&fs::read_to_string(file)?)?;
    let request = app.route_notification(notification)?;

    let n = request.notification();
    writeln!(out, "Browser:  {}", n.browser_label()).map_err(io)?;
    writeln!(out, "OS:       {}", n.os_label()).map_err(io)?;
    writeln!(out, "Date:     {}", n.date.to_rfc2822()).map_err(io)?;
    if let Some(location) = &n.location {
        writeln!(out, "Location: {}", location).map_err(io)?;
    }

    match request {
        AuthorizationRequest::Login(_) => writeln!(out, "Login request").map_err(io),
        AuthorizationRequest::Payment(mut payment) => {
            match payment.load_details(consent?).await? {
                Some(details) => {
                    writeln!(out, "Payment:  {}", details.description).map_err(io)?;
                    writeln!(out, "Amount:   {}", details.formatted_amount()).map_err(io)
                }
                None => writeln!(out, "Payment request without details").map_err(io),
            }
        }
    }
}
