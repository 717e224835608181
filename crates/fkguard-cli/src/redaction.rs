use serde::Serialize;

const MASK: &str = "***";
const SENSITIVE_PARAMS: &[&str] = &[
    "password",
    "pass",
    "sslpassword",
    "secret",
    "token",
    "api_key",
    "apikey",
];

/// Connection details safe to log or write into a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedactedConnection {
    pub engine: Option<String>,
    pub user: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub redacted: String,
}

/// Mask the password and sensitive query parameters of a connection URL.
pub fn redact_connection_string(conn: &str) -> RedactedConnection {
    let (base, query) = match conn.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (conn, None),
    };

    let mut connection = RedactedConnection {
        engine: None,
        user: None,
        host: None,
        port: None,
        database: None,
        redacted: base.to_string(),
    };

    if let Some((scheme, rest)) = base.split_once("://") {
        connection.engine = Some(scheme.to_string());

        // Credentials end at the last `@`; a password may itself contain `/` or `@`.
        let (credentials, after_credentials) = match rest.rsplit_once('@') {
            Some((credentials, after)) => (Some(credentials), after),
            None => (None, rest),
        };
        let authority_end = after_credentials.find('/').unwrap_or(after_credentials.len());
        let (host_port, path) = after_credentials.split_at(authority_end);

        if let Some(credentials) = credentials {
            let user = match credentials.split_once(':') {
                Some((user, _)) => {
                    connection.redacted = format!("{scheme}://{user}:{MASK}@{host_port}{path}");
                    user
                }
                None => credentials,
            };
            if !user.is_empty() {
                connection.user = Some(user.to_string());
            }
        }

        match host_port.rsplit_once(':') {
            Some((host, port)) if port.parse::<u16>().is_ok() => {
                connection.host = Some(host.to_string());
                connection.port = port.parse().ok();
            }
            _ if !host_port.is_empty() => connection.host = Some(host_port.to_string()),
            _ => {}
        }

        let database = path.trim_start_matches('/');
        if !database.is_empty() {
            connection.database = Some(database.to_string());
        }
    }

    if let Some(query) = query {
        connection.redacted.push('?');
        connection.redacted.push_str(&redact_query(query));
    }

    connection
}

fn redact_query(query: &str) -> String {
    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive(key) => format!("{key}={MASK}"),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_PARAMS.contains(&key.as_str())
}
