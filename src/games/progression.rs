//! Experience and level progression

/// Experience required to leave `level`
pub fn threshold(level: u32) -> u64 {
    100 * (level as u64) * (level as u64)
}

/// Credit experience for money spent (one point per whole unit spent).
///
/// Levels cascade: a large spend can cross several thresholds at once.
pub fn add_exp(level: u32, exp: u64, gained: u64) -> (u32, u64) {
    let mut level = level.max(1);
    let mut exp = exp + gained;
    while exp >= threshold(level) {
        exp -= threshold(level);
        level += 1;
    }
    (level, exp)
}
