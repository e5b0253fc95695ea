use rand::Rng;
use sqlx::SqlitePool;

pub const CODE_LEN: usize = 6;
const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn random_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Draws codes from `next` until one is not taken by any classroom.
pub async fn unique_code(
    db_pool: &SqlitePool,
    mut next: impl FnMut() -> String,
) -> Result<String, sqlx::Error> {
    loop {
        let code = next();
        let taken: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM classrooms WHERE code=?")
            .bind(&code)
            .fetch_optional(db_pool)
            .await?;

        if taken.is_none() {
            return Ok(code);
        }
        tracing::debug!(%code, "join code taken, drawing another");
    }
}
