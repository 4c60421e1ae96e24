//! Email normalization and organization-domain derivation for the identity
//! resolver. Pure functions; the customer store lives in the engine.

/// Webmail providers whose domains never imply an organization.
pub const PUBLIC_WEBMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "icloud.com",
    "me.com",
    "yahoo.com",
    "msn.com",
    "qq.com",
    "163.com",
    "126.com",
    "live.com",
    "aol.com",
    "protonmail.com",
    "mail.com",
];

/// Canonical form used for identity lookups: trimmed, ASCII-lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Syntactic `local@domain.tld` check. Deliberately shallow — deliverability
/// is not this crate's problem.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && tld.len() >= 2 && domain.split('.').all(|label| !label.is_empty())
}

/// Organization signal derived from a normalized email. Public webmail
/// domains carry no signal and map to `None`.
pub fn organization_domain(normalized_email: &str) -> Option<String> {
    let (_, domain) = normalized_email.split_once('@')?;
    if domain.is_empty() || PUBLIC_WEBMAIL_DOMAINS.contains(&domain) {
        None
    } else {
        Some(domain.to_string())
    }
}
