pub const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;
PRAGMA busy_timeout = 5000;

CREATE TABLE IF NOT EXISTS credentials (
    id                  TEXT PRIMARY KEY,
    key                 TEXT NOT NULL UNIQUE,
    label               TEXT NOT NULL,
    rate_limit_per_hour INTEGER NOT NULL,
    is_active           INTEGER NOT NULL,
    created_at          TEXT NOT NULL,
    last_used           TEXT
);

CREATE TABLE IF NOT EXISTS reports (
    id                TEXT PRIMARY KEY,
    ecosystem         TEXT NOT NULL,
    package_name      TEXT NOT NULL,
    package_version   TEXT NOT NULL,
    duration_seconds  REAL NOT NULL,
    payload           TEXT NOT NULL,
    created_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reports_triple
    ON reports (ecosystem, package_name, package_version);

CREATE TABLE IF NOT EXISTS tasks (
    id                TEXT PRIMARY KEY,
    credential_id     TEXT NOT NULL REFERENCES credentials(id),
    purl              TEXT NOT NULL,
    package_name      TEXT NOT NULL,
    package_version   TEXT NOT NULL,
    ecosystem         TEXT NOT NULL,
    idempotency_key   TEXT,
    status            TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    queued_at         TEXT,
    started_at        TEXT,
    completed_at      TEXT,
    queue_position    INTEGER,
    priority          INTEGER NOT NULL,
    timeout_minutes   INTEGER NOT NULL,
    container_id      TEXT,
    last_heartbeat    TEXT,
    report_id         TEXT REFERENCES reports(id),
    download_url      TEXT,
    error_category    TEXT,
    error_message     TEXT,
    error_details     TEXT,
    UNIQUE (credential_id, idempotency_key)
);

CREATE INDEX IF NOT EXISTS idx_tasks_purl ON tasks (purl);
CREATE INDEX IF NOT EXISTS idx_tasks_status_created ON tasks (status, created_at);
CREATE INDEX IF NOT EXISTS idx_tasks_credential_created ON tasks (credential_id, created_at);
CREATE INDEX IF NOT EXISTS idx_tasks_status_queue_position ON tasks (status, queue_position);
CREATE INDEX IF NOT EXISTS idx_tasks_priority_queued_at ON tasks (priority, queued_at);
CREATE INDEX IF NOT EXISTS idx_tasks_status_started ON tasks (status, started_at);
CREATE INDEX IF NOT EXISTS idx_tasks_container_id ON tasks (container_id);
"#;
