//! Secret detection rules
//!
//! The built-in table is ordered: narrow rules whose replacement keeps
//! quoting or flag syntax intact come before the generic catch-alls that
//! would otherwise mangle the same text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a rule table
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid matcher for pattern '{name}': {source}")]
    InvalidMatcher {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("duplicate pattern name '{0}'")]
    DuplicateName(String),

    #[error("pattern name cannot be empty")]
    EmptyName,
}

/// A compiled rule describing how to detect and neutralise one kind of secret
#[derive(Debug, Clone)]
pub struct Pattern {
    name: String,
    matcher: Regex,
    replacement: String,
    full_remove: bool,
}

impl Pattern {
    pub fn new(
        name: impl Into<String>,
        matcher: &str,
        replacement: impl Into<String>,
        full_remove: bool,
    ) -> Result<Self, PatternError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(PatternError::EmptyName);
        }

        let matcher = Regex::new(matcher).map_err(|source| PatternError::InvalidMatcher {
            name: name.clone(),
            source,
        })?;

        Ok(Self {
            name,
            matcher,
            replacement: replacement.into(),
            full_remove,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_full_remove(&self) -> bool {
        self.full_remove
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    /// Replace every match; `${n}` in the template refers to capture group `n`
    pub fn apply(&self, text: &str) -> String {
        self.matcher.replace_all(text, self.replacement.as_str()).into_owned()
    }
}

/// User-supplied rule as written in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub name: String,
    pub matcher: String,
    #[serde(default)]
    pub replacement: String,
    #[serde(default)]
    pub full_remove: bool,
}

impl PatternSpec {
    pub fn compile(&self) -> Result<Pattern, PatternError> {
        Pattern::new(&self.name, &self.matcher, &self.replacement, self.full_remove)
    }
}

struct Rule {
    name: &'static str,
    matcher: &'static str,
    replacement: &'static str,
    full_remove: bool,
}

const fn mask(name: &'static str, matcher: &'static str, replacement: &'static str) -> Rule {
    Rule { name, matcher, replacement, full_remove: false }
}

const fn remove(name: &'static str, matcher: &'static str) -> Rule {
    Rule { name, matcher, replacement: "", full_remove: true }
}

const PLACEHOLDER: &str = "<REDACTED>";

const DEFAULT_RULES: &[Rule] = &[
    // Password flags, quoted values first since they may contain spaces
    mask("password-flag-quoted-double", r#"(--password[=\s]+)"([^"]+)""#, r#"${1}"<REDACTED>""#),
    mask("password-flag-quoted-single", r#"(--password[=\s]+)'([^']+)'"#, r#"${1}'<REDACTED>'"#),
    mask("password-flag-unquoted", r#"(--password[=\s]+)([^'"\s]+)"#, "${1}<REDACTED>"),
    mask("passwd-flag", r#"(--passwd[=\s]+)(['"]?)([^'"\s]+)(['"]?)"#, "${1}${2}<REDACTED>${4}"),
    // mysql -p must not be preceded by another dash
    mask("mysql-password", r#"(\s-p)(['"]?)([^'"\s-][^'"\s]*)(['"]?)"#, "${1}${2}<REDACTED>${4}"),

    // Token and API key flags
    mask("token-flag", r#"(--token[=\s]+['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("api-key-flag", r#"(--api-key[=\s]+['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("secret-flag", r#"(--secret[=\s]+['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),

    // Exported environment variables
    mask("api-key-export", r#"(export\s+[A-Z_]*API_?KEY\s*=\s*['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("secret-export", r#"(export\s+[A-Z_]*SECRET[A-Z_]*\s*=\s*['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("password-export", r#"(export\s+[A-Z_]*PASS(?:WORD)?[A-Z_]*\s*=\s*['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("token-export", r#"(export\s+[A-Z_]*TOKEN\s*=\s*['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("credentials-export", r#"(export\s+[A-Z_]*CRED(?:ENTIAL)?S?[A-Z_]*\s*=\s*['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),

    // AWS credentials
    mask("aws-access-key-id", r#"(AWS_ACCESS_KEY_ID\s*=\s*['"]?)([A-Z0-9]{20})(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("aws-secret-key", r#"(AWS_SECRET_ACCESS_KEY\s*=\s*['"]?)([A-Za-z0-9/+=]{40})(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("aws-session-token", r#"(AWS_SESSION_TOKEN\s*=\s*['"]?)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),

    // user:password@host in URLs
    mask("connection-string-password", r"(://[^:]+:)([^@]+)(@)", "${1}<REDACTED>${3}"),

    // Authorization headers
    mask("bearer-token", r#"(Authorization:\s*Bearer\s+)([^\s'"]+)"#, "${1}<REDACTED>"),
    mask("basic-auth", r#"(Authorization:\s*Basic\s+)([^\s'"]+)"#, "${1}<REDACTED>"),
    mask("auth-header-h-flag", r#"(-H\s+['"]?Authorization:\s*(?:Bearer|Basic)\s+)([^'"\s]+)(['"]?)"#, "${1}<REDACTED>${3}"),

    // Key material cannot be partially masked
    remove("private-key", r"-----BEGIN\s+(?:RSA\s+|EC\s+|OPENSSH\s+|ENCRYPTED\s+|DSA\s+)?PRIVATE\s+KEY-----"),
    remove("pgp-private-key", r"-----BEGIN\s+PGP\s+PRIVATE\s+KEY\s+BLOCK-----"),

    // GitHub
    mask("github-token", r"(gh[ps]_[A-Za-z0-9]{36,})", PLACEHOLDER),
    mask("github-pat", r"(github_pat_[A-Za-z0-9_]{22,})", PLACEHOLDER),

    // header.payload.signature
    mask("jwt-token", r"\beyJ[A-Za-z0-9_-]+\.eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\b", "<REDACTED_JWT>"),

    // Chat tokens and webhooks
    mask("slack-bot-token", r"xoxb-[0-9]+-[0-9]+-[A-Za-z0-9]+", PLACEHOLDER),
    mask("slack-user-token", r"xoxp-[0-9]+-[0-9]+-[0-9]+-[A-Za-z0-9]+", PLACEHOLDER),
    mask("slack-app-token", r"xapp-[0-9]+-[A-Za-z0-9]+-[0-9]+-[A-Za-z0-9]+", PLACEHOLDER),
    mask("slack-refresh-token", r"xoxr-[0-9]+-[A-Za-z0-9]+", PLACEHOLDER),
    mask("slack-webhook", r"https://hooks\.slack\.com/services/T[A-Z0-9]+/B[A-Z0-9]+/[A-Za-z0-9]+", "<REDACTED_SLACK_WEBHOOK>"),
    mask("discord-webhook", r"https://discord(?:app)?\.com/api/webhooks/[0-9]+/[A-Za-z0-9_-]+", "<REDACTED_DISCORD_WEBHOOK>"),
    mask("generic-webhook-secret", r"(https?://[^/]+/webhooks?/)[A-Za-z0-9_-]{20,}", "${1}<REDACTED>"),

    // Cloud providers and SaaS API keys
    mask("gcp-api-key", r"AIza[A-Za-z0-9_-]{35}", PLACEHOLDER),
    mask("google-oauth", r"ya29\.[A-Za-z0-9_-]+", PLACEHOLDER),
    mask("azure-storage-key", r"(?i)(AccountKey\s*=\s*)([A-Za-z0-9+/=]{88})", "${1}<REDACTED>"),
    mask("azure-connection-string", r"(?i)(DefaultEndpointsProtocol=https?;AccountName=[^;]+;AccountKey=)([A-Za-z0-9+/=]+)", "${1}<REDACTED>"),
    mask("azure-sas-token", r"(\?|&)(sig|sv|ss|srt|sp|se|st|spr|sr)=[^&\s]+", "${1}${2}=<REDACTED>"),
    mask("digitalocean-token", r"dop_v1_[a-f0-9]{64}", PLACEHOLDER),
    mask("digitalocean-oauth", r"doo_v1_[a-f0-9]{64}", PLACEHOLDER),
    mask("stripe-secret-key", r"sk_live_[A-Za-z0-9]{24,}", PLACEHOLDER),
    mask("stripe-test-key", r"sk_test_[A-Za-z0-9]{24,}", PLACEHOLDER),
    mask("stripe-restricted-key", r"rk_live_[A-Za-z0-9]{24,}", PLACEHOLDER),
    mask("twilio-account-sid", r"AC[a-f0-9]{32}", PLACEHOLDER),
    mask("twilio-api-key", r"SK[a-f0-9]{32}", PLACEHOLDER),
    mask("sendgrid-api-key", r"SG\.[A-Za-z0-9_-]{22}\.[A-Za-z0-9_-]{43}", PLACEHOLDER),
    mask("mailgun-api-key", r"key-[a-f0-9]{32}", PLACEHOLDER),
    mask("npm-token", r"npm_[A-Za-z0-9]{36,}", PLACEHOLDER),
    mask("pypi-token", r"pypi-[A-Za-z0-9_-]{50,}", PLACEHOLDER),
    mask("heroku-api-key", r#"(?i)(HEROKU_API_KEY\s*=\s*['"]?)([a-f0-9-]{36})(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("shopify-access-token", r"shpat_[a-f0-9]{32}", PLACEHOLDER),
    mask("shopify-shared-secret", r"shpss_[a-f0-9]{32}", PLACEHOLDER),
    mask("square-access-token", r"sq0atp-[A-Za-z0-9_-]{22}", PLACEHOLDER),
    mask("square-oauth-secret", r"sq0csp-[A-Za-z0-9_-]{43}", PLACEHOLDER),
    mask("datadog-api-key", r#"(?i)(DD_API_KEY\s*=\s*['"]?)([a-f0-9]{32})(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("newrelic-api-key", r"NRAK-[A-Z0-9]{27}", PLACEHOLDER),
    mask("vault-token", r#"(?i)(VAULT_TOKEN\s*=\s*['"]?)([shrs]\.[A-Za-z0-9_-]+)(['"]?)"#, "${1}<REDACTED>${3}"),
    mask("mongodb-connection-string", r"mongodb(?:\+srv)?://[^:]+:([^@]+)@", "mongodb://[user]:<REDACTED>@"),

    // Generic catch-alls; the bounded repetition keeps matching linear
    mask(
        "generic-secret-assignment",
        r#"(?i)((?:secret|password|passwd|pwd|token|api_key|apikey|auth)[_-]?[A-Za-z0-9_]{0,20}\s{0,3}[=:]\s{0,3}['"]?)([^'"\s]{8,})(['"]?)"#,
        "${1}<REDACTED>${3}",
    ),
    mask("inline-secret-var", r#"(\b(?:PASSWORD|SECRET|TOKEN|API_KEY)\s*=\s*['"]?)([^'"\s]+)(['"]?\s)"#, "${1}<REDACTED>${3}"),
    mask(
        "curl-password-data",
        r#"(-d\s+['"]?[^'"]*(?:password|passwd|secret|token)['"]*\s*[=:]\s*['"]?)([^'"&\s]+)(['"]?)"#,
        "${1}<REDACTED>${3}",
    ),
    mask("docker-secret-env", r"(-e\s+[A-Z_]*(?:PASSWORD|SECRET|TOKEN|API_KEY)[A-Z_]*=)(\S+)", "${1}<REDACTED>"),
    mask("kubectl-secret", r"(--from-literal=[A-Za-z_-]*(?:password|secret|token|key)[A-Za-z_-]*=)(\S+)", "${1}<REDACTED>"),
];

/// Compile the built-in rule table in its canonical order
pub fn default_patterns() -> Result<Vec<Pattern>, PatternError> {
    DEFAULT_RULES
        .iter()
        .map(|rule| Pattern::new(rule.name, rule.matcher, rule.replacement, rule.full_remove))
        .collect()
}
