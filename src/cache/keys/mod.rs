/// 会话键前缀
const SESSION_PREFIX: &str = "session:";

pub fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}
