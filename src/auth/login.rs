//! Interactive device-flow login: show the code, open a browser, wait.

use std::io::Write;

use tokio_util::sync::CancellationToken;

use super::device_code::{DeviceAuthorization, DeviceAuthorizer};
use super::error::AuthError;

/// Options for [`login`].
#[derive(Debug, Clone, Copy)]
pub struct LoginOptions {
    pub open_browser: bool,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self { open_browser: true }
    }
}

/// Run the whole device flow for a human at a terminal.
///
/// Instructions go to `out`; browser failures are logged and otherwise ignored.
/// Returns the GitHub identity token, which the caller owns from here on.
pub async fn login(
    authorizer: &DeviceAuthorizer,
    options: LoginOptions,
    out: &mut (dyn Write + Send),
    cancel: &CancellationToken,
) -> Result<String, AuthError> {
    let authorization = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(AuthError::Canceled),
        result = authorizer.request_device_code() => result?,
    };

    present_device_code(&authorization, out)?;
    if options.open_browser {
        open_verification_uri(&authorization.verification_uri);
    }
    writeln!(out, "Waiting for authorization...")?;
    out.flush()?;

    authorizer.authorize(&authorization, cancel).await
}

/// Print the user code and verification URL.
pub fn present_device_code(
    authorization: &DeviceAuthorization,
    out: &mut (dyn Write + Send),
) -> Result<(), AuthError> {
    let width = authorization.user_code.chars().count().max(9) + 4;
    writeln!(out)?;
    writeln!(out, "GitHub Device Authorization")?;
    writeln!(out, "  1. Open: {}", authorization.verification_uri)?;
    writeln!(out, "  2. Enter this code:")?;
    writeln!(out, "     +{}+", "-".repeat(width))?;
    writeln!(out, "     |{:^width$}|", authorization.user_code)?;
    writeln!(out, "     +{}+", "-".repeat(width))?;
    writeln!(
        out,
        "  The code expires in {} minutes.",
        authorization.expires_in.div_ceil(60)
    )?;
    writeln!(out)?;
    Ok(())
}

fn open_verification_uri(uri: &str) {
    match opener::open(uri) {
        Ok(()) => tracing::debug!(%uri, "Opened browser for device authorization"),
        Err(err) => tracing::warn!(%uri, error = %err, "Could not open browser automatically"),
    }
}
