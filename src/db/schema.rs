/// Tables are created idempotently at startup.
pub const SCHEMA: &str = "
    -- Custom command prefixes, one row per prefix
    CREATE TABLE IF NOT EXISTS prefix_assignment (
        guild_id INTEGER NOT NULL,
        guild_prefix TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_prefix_guild ON prefix_assignment (guild_id);

    -- Messages observed per member
    CREATE TABLE IF NOT EXISTS message_counter (
        guild_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        message_count INTEGER NOT NULL DEFAULT 1,
        UNIQUE (guild_id, user_id)
    );
";
