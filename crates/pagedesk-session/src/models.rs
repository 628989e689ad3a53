/// Raw session row; timestamps are RFC 3339 text.
pub struct SessionRow {
    pub token: String,
    pub token_type: String,
    pub expires_at: String,
}
