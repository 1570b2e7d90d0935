pub const COINS_PER_TIER: u32 = 5;
pub const REPLAY_COST_PER_TIER: u32 = 2;
pub const GAMES_PER_TIER: i64 = 25;

/// Difficulty tier of a catalog game. The first 25 games are tier 1, the
/// next 25 are tier 2 and so on, capped at tier 4. Games without a usable
/// catalog index price at tier 1.
pub fn tier(game_index: Option<i64>) -> u32 {
    match game_index {
        Some(index) if index > GAMES_PER_TIER * 3 => 4,
        Some(index) if index > GAMES_PER_TIER * 2 => 3,
        Some(index) if index > GAMES_PER_TIER => 2,
        _ => 1,
    }
}

pub fn coins_for_game(game_index: Option<i64>) -> u32 {
    COINS_PER_TIER * tier(game_index)
}

pub fn replay_cost(game_index: Option<i64>) -> u32 {
    REPLAY_COST_PER_TIER * tier(game_index)
}
