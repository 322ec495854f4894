use anyhow::{Context, Result};
use jointrip_auth::identity::IdentityExchange;
use jointrip_auth::{AuthConfig, GoogleIdentityExchange, TokenCodec, TokenKind};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

const REDACTED: &str = "[REDACTED]";

pub fn check_config(config: &AuthConfig) -> Result<Value> {
    config.validate()?;

    let mut value = serde_json::to_value(config)?;
    redact(&mut value, &["tokens", "secret"]);
    redact(&mut value, &["identity", "client_secret"]);

    Ok(json!({
        "valid": true,
        "identity_configured": config.identity.is_configured(),
        "config": value,
    }))
}

pub fn auth_url(config: &AuthConfig, state: &str) -> Result<Value> {
    anyhow::ensure!(!state.is_empty(), "state must not be empty");

    let identity = GoogleIdentityExchange::new(config.identity.clone())
        .context("identity provider is not configured")?;
    let url = identity.authorization_url(state)?;

    Ok(json!({ "url": url.as_str() }))
}

pub fn issue(codec: &TokenCodec, account_id: Uuid) -> Result<Value> {
    let tokens = codec.issue(account_id)?;

    Ok(json!({
        "account_id": account_id,
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "access_expires_at": rfc3339(tokens.access_expires_at)?,
        "refresh_expires_at": rfc3339(tokens.refresh_expires_at)?,
    }))
}

pub fn inspect(codec: &TokenCodec, token: &str) -> Result<Value> {
    let claims = codec.inspect(token)?;
    Ok(serde_json::to_value(claims)?)
}

pub fn verify(codec: &TokenCodec, token: &str, kind: TokenKind) -> Result<Value> {
    match codec.verify(token, kind) {
        Ok(account_id) => Ok(json!({
            "valid": true,
            "kind": kind,
            "account_id": account_id,
        })),
        Err(e) => {
            tracing::debug!(error = %e, "Token rejected");
            Ok(json!({
                "valid": false,
                "kind": kind,
                "error": e.to_string(),
            }))
        }
    }
}

fn rfc3339(at: OffsetDateTime) -> Result<String> {
    Ok(at.format(&Rfc3339)?)
}

fn redact(value: &mut Value, path: &[&str]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = value;
    for key in parents {
        match current.get_mut(*key) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(slot) = current.get_mut(*last) {
        if slot.as_str().is_some_and(|s| !s.is_empty()) {
            *slot = Value::String(REDACTED.to_string());
        }
    }
}
