pub mod installed_app;
pub mod service_account;

pub use installed_app::InstalledAppFlow;
pub use service_account::ServiceAccountExchange;

use serde::Deserialize;

use crate::core::credentials::{AuthError, TokenGrant};

pub(crate) const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Error body of Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Posts a form to a token endpoint and reads the grant out of the response.
pub(crate) async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenGrant, AuthError> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| AuthError::Exchange(e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::Exchange(e.to_string()))?;

    if !status.is_success() {
        return Err(AuthError::Exchange(describe_token_error(status.as_u16(), &text)));
    }

    serde_json::from_str(&text)
        .map_err(|e| AuthError::Exchange(format!("unreadable token response: {}", e)))
}

fn describe_token_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenErrorBody>(body) {
        Ok(TokenErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(TokenErrorBody { error, .. }) => error,
        Err(_) => format!("token endpoint returned {}: {}", status, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_prefer_googles_description() {
        assert_eq!(
            describe_token_error(
                400,
                r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#
            ),
            "invalid_grant: Token has been expired or revoked."
        );
        assert_eq!(
            describe_token_error(401, r#"{"error":"invalid_client"}"#),
            "invalid_client"
        );
        assert_eq!(
            describe_token_error(502, "Bad Gateway\n"),
            "token endpoint returned 502: Bad Gateway"
        );
    }
}
