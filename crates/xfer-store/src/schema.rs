//! SQL schema for the artifact store.

/// The `artifacts` table holds every blob the repository knows about,
/// public or private, materialized or phantom. `local_id` is the
/// store-assigned identity the engine passes around; `hash` is the
/// wire identity. A row with `content IS NULL` is a phantom: its
/// existence is known (referenced by some have/igot/ineed) but its
/// bytes have not arrived yet.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS artifacts (
    local_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    hash            TEXT NOT NULL UNIQUE,
    content         BLOB,
    delta_src       INTEGER REFERENCES artifacts(local_id),
    parent_manifest INTEGER REFERENCES artifacts(local_id),
    is_private      INTEGER NOT NULL DEFAULT 0,
    received_at     INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_artifacts_phantom ON artifacts(local_id) WHERE content IS NULL;
CREATE INDEX IF NOT EXISTS idx_artifacts_private ON artifacts(local_id) WHERE is_private = 1;
"#;
