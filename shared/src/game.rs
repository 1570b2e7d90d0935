pub const PARENT_GAME_TYPE: &str = "parent-education";
pub const PARENT_GAME_LEVELS: i32 = 5;

/// Extracts the trailing catalog index from ids like `parent-education-7`.
/// Ids with fewer than three `-` separated segments or a non-numeric tail
/// carry no index.
pub fn game_index_from_id(game_id: &str) -> Option<i64> {
    let segments: Vec<&str> = game_id.split('-').collect();
    if segments.len() < 3 {
        return None;
    }
    segments.last()?.parse().ok()
}
