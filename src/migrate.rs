use crate::config::Config;
use crate::db;
use crate::error::LedgerError;

pub async fn run_migrations(config: &Config) -> Result<(), LedgerError> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            message_id INTEGER PRIMARY KEY,
            chat_id INTEGER NOT NULL,
            author_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            date INTEGER NOT NULL,
            processed INTEGER NOT NULL DEFAULT 0,
            wiki_page TEXT,
            analysis_json TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_processed ON messages(processed)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_updated_at ON messages(updated_at DESC)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
