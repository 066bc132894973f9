//! Route store DDL.

/// Statements applied in order by [`super::ConfigStore::migrate`].
pub const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS routes (
        id                       INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id                 INTEGER NOT NULL,
        name                     TEXT    NOT NULL CHECK (length(name) BETWEEN 1 AND 255),
        exposed_url              TEXT    NOT NULL CHECK (length(exposed_url) BETWEEN 1 AND 255),
        target_url               TEXT    NOT NULL CHECK (length(target_url) BETWEEN 1 AND 255),
        method                   TEXT    NOT NULL CHECK (length(method) BETWEEN 1 AND 20),
        authentication_type      TEXT    NOT NULL DEFAULT 'none',
        rate_limit               INTEGER CHECK (rate_limit IS NULL OR rate_limit > 0),
        status                   TEXT    NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
        load_balancing_enabled   BOOLEAN NOT NULL DEFAULT 0,
        load_balancing_algorithm TEXT,
        security_cors            BOOLEAN NOT NULL DEFAULT 0,
        security_ssl             BOOLEAN NOT NULL DEFAULT 0,
        security_ip_allow_list   TEXT    NOT NULL DEFAULT '[]',
        created_at               TEXT    NOT NULL,
        updated_at               TEXT    NOT NULL
    )"#,
    // Spans owners: gateways serve one shared path namespace.
    "CREATE UNIQUE INDEX IF NOT EXISTS routes_exposed_endpoint ON routes (exposed_url, method)",
    "CREATE INDEX IF NOT EXISTS routes_owner ON routes (owner_id)",
    r#"CREATE TABLE IF NOT EXISTS route_targets (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        route_id   INTEGER NOT NULL REFERENCES routes (id) ON DELETE CASCADE,
        target_url TEXT    NOT NULL CHECK (length(target_url) BETWEEN 1 AND 255),
        created_at TEXT    NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS route_targets_route ON route_targets (route_id, id)",
];
