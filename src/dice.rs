//! Dice notation parsing and rolling.
//!
//! Notation is `NdS` with an optional `+M`/`-M` modifier (`2d6+1`). A plain
//! integer is a valid "flat" expression equal to that value with zero rolls.
//! Invalid notation and zero counts/sides degrade to a zero result with a
//! warning instead of erroring; authored content must never crash a session
//! over a typo in a damage cell.

use rand::Rng;
use serde::Serialize;

/// A parsed dice expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiceExpr {
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

/// Outcome of rolling a dice string.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DiceRoll {
    pub rolls: Vec<i64>,
    pub modifier: i64,
    pub total: i64,
}

fn all_digits(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|byte| byte.is_ascii_digit())
}

/// Strict notation check used by the validator: `\d+d\d+([+-]\d+)?` with a
/// case-insensitive `d` and no interior whitespace. Plain integers do NOT
/// pass this check; the validator treats them separately.
pub fn is_dice_notation(value: &str) -> bool {
    let Some(d_pos) = value.find(['d', 'D']) else {
        return false;
    };
    let count = &value[..d_pos];
    let rest = &value[d_pos + 1..];
    if !all_digits(count) {
        return false;
    }
    match rest.find(['+', '-']) {
        Some(sign_pos) => all_digits(&rest[..sign_pos]) && all_digits(&rest[sign_pos + 1..]),
        None => all_digits(rest),
    }
}

/// Parses dice notation, tolerating interior whitespace (`1d6 + 2`).
pub fn parse(notation: &str) -> Option<DiceExpr> {
    let compact: String = notation.chars().filter(|c| !c.is_whitespace()).collect();
    let d_pos = compact.find(['d', 'D'])?;
    let count_str = &compact[..d_pos];
    let rest = &compact[d_pos + 1..];
    if !all_digits(count_str) {
        return None;
    }
    let (sides_str, modifier) = match rest.find(['+', '-']) {
        Some(sign_pos) => {
            let magnitude_str = &rest[sign_pos + 1..];
            if !all_digits(magnitude_str) {
                return None;
            }
            let magnitude: i64 = magnitude_str.parse().ok()?;
            let sign = if rest.as_bytes()[sign_pos] == b'+' { 1 } else { -1 };
            (&rest[..sign_pos], sign * magnitude)
        }
        None => (rest, 0),
    };
    if !all_digits(sides_str) {
        return None;
    }
    Some(DiceExpr {
        count: count_str.parse().ok()?,
        sides: sides_str.parse().ok()?,
        modifier,
    })
}

/// Rolls a dice string.
pub fn roll(notation: &str, rng: &mut impl Rng) -> DiceRoll {
    let normalized = notation.trim();

    // Flat integers are allowed in payloads for fixed values.
    if let Ok(flat) = normalized.parse::<i64>() {
        return DiceRoll {
            rolls: Vec::new(),
            modifier: flat,
            total: flat,
        };
    }

    match parse(normalized) {
        Some(expr) if expr.count > 0 && expr.sides > 0 => {
            let rolls: Vec<i64> = (0..expr.count)
                .map(|_| rng.gen_range(1..=i64::from(expr.sides)))
                .collect();
            let total = rolls.iter().sum::<i64>() + expr.modifier;
            DiceRoll {
                rolls,
                modifier: expr.modifier,
                total,
            }
        }
        Some(_) => {
            tracing::warn!(target: "gamebook::dice", "invalid dice bounds, fallback to 0: {notation:?}");
            DiceRoll::default()
        }
        None => {
            tracing::warn!(target: "gamebook::dice", "invalid dice notation, fallback to 0: {notation:?}");
            DiceRoll::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn notation_check_is_strict() {
        assert!(is_dice_notation("1d20"));
        assert!(is_dice_notation("2d6+1"));
        assert!(is_dice_notation("10D8-2"));
        assert!(is_dice_notation("0d6"));
        assert!(!is_dice_notation("5"));
        assert!(!is_dice_notation("1d6 + 2"));
        assert!(!is_dice_notation("d6"));
        assert!(!is_dice_notation("1d"));
        assert!(!is_dice_notation("1d6+2+3"));
        assert!(!is_dice_notation("one d6"));
    }

    #[test]
    fn parse_tolerates_whitespace() {
        assert_eq!(
            parse("1d6 + 2"),
            Some(DiceExpr {
                count: 1,
                sides: 6,
                modifier: 2
            })
        );
        assert_eq!(
            parse("3d4-1"),
            Some(DiceExpr {
                count: 3,
                sides: 4,
                modifier: -1
            })
        );
        assert_eq!(parse("x1d6"), None);
    }

    fn fixed_rng() -> impl Rng {
        StepRng::new(0, 0)
    }

    #[test]
    fn flat_integer_rolls_to_itself() {
        let result = roll("5", &mut fixed_rng());
        assert_eq!(result.rolls, Vec::<i64>::new());
        assert_eq!(result.total, 5);
        let result = roll("-3", &mut fixed_rng());
        assert_eq!(result.total, -3);
    }

    #[test]
    fn invalid_notation_falls_back_to_zero() {
        let result = roll("garbage", &mut fixed_rng());
        assert_eq!(result, DiceRoll::default());
    }

    #[test]
    fn zero_count_or_sides_falls_back_to_zero() {
        assert_eq!(roll("0d6", &mut fixed_rng()), DiceRoll::default());
        assert_eq!(roll("2d0+4", &mut fixed_rng()), DiceRoll::default());
    }

    #[test]
    fn roll_totals_include_modifier_and_stay_in_bounds() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let result = roll("2d6+3", &mut rng);
            assert_eq!(result.rolls.len(), 2);
            assert_eq!(result.modifier, 3);
            assert!(result.total >= 2 + 3 && result.total <= 12 + 3);
            assert!(result.rolls.iter().all(|r| (1..=6).contains(r)));
        }
    }
}
