//! Payout calculator. Stakes are debited at bet placement, so every credit
//! here is the total amount returned to the bettor: zero for a loss, the
//! stake alone for a push, stake plus winnings for a win.

use punto_core::config::BankerRounding;
use punto_core::types::{BetRow, HandResult, Outcome, Side};
use std::collections::HashMap;

/// Total credit owed for a single bet given the dealt hand.
pub fn bet_credit(
    side: Side,
    amount: u64,
    hand: &HandResult,
    rounding: BankerRounding,
) -> u64 {
    // Saturating math: a balance near u64::MAX should clamp a credit,
    // never panic inside a room loop.
    match side {
        Side::Player => match hand.outcome {
            Outcome::Player => amount.saturating_mul(2),
            Outcome::Tie => amount,
            Outcome::Banker => 0,
        },
        Side::Banker => match hand.outcome {
            Outcome::Banker => amount.saturating_add(banker_winnings(amount, rounding)),
            Outcome::Tie => amount,
            Outcome::Player => 0,
        },
        Side::Tie => match hand.outcome {
            Outcome::Tie => amount.saturating_mul(9),
            _ => 0,
        },
        Side::PlayerPair => pair_credit(hand.player_pair(), amount, 11),
        Side::BankerPair => pair_credit(hand.banker_pair(), amount, 11),
        Side::AnyPair => pair_credit(hand.any_pair(), amount, 5),
        Side::PerfectPair => pair_credit(hand.perfect_pair(), amount, 25),
    }
}

/// Per-user credit totals for a whole round, aggregating multiple bets
/// from the same user. Losing bets contribute nothing.
pub fn credits_for_round(
    hand: &HandResult,
    bets: &[BetRow],
    rounding: BankerRounding,
) -> HashMap<String, u64> {
    let mut credits: HashMap<String, u64> = HashMap::new();
    for bet in bets {
        let credit = bet_credit(bet.side, bet.amount, hand, rounding);
        if credit > 0 {
            let total = credits.entry(bet.user_id.clone()).or_default();
            *total = total.saturating_add(credit);
        }
    }
    credits
}

/// Banker wins pay 1:1 minus 5% commission.
fn banker_winnings(amount: u64, rounding: BankerRounding) -> u64 {
    match rounding {
        BankerRounding::Floor => amount.saturating_mul(95) / 100,
        BankerRounding::Nearest => amount.saturating_mul(95).saturating_add(50) / 100,
    }
}

fn pair_credit(won: bool, amount: u64, odds: u64) -> u64 {
    if won {
        amount.saturating_mul(odds + 1)
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use punto_core::types::{decode_hand, RoundKey};

    fn hand(outcome: Outcome, player: &str, banker: &str) -> HandResult {
        let player_cards = decode_hand(player).unwrap();
        let banker_cards = decode_hand(banker).unwrap();
        HandResult {
            player_total: crate::dealer::hand_total(&player_cards),
            banker_total: crate::dealer::hand_total(&banker_cards),
            player_cards,
            banker_cards,
            outcome,
        }
    }

    fn bet(user: &str, side: Side, amount: u64) -> BetRow {
        let key = RoundKey {
            room: "room1".to_string(),
            day_key: "2026-08-30".parse().unwrap(),
            round_no: 1,
        };
        BetRow::new(user, &key, side, amount, Utc::now())
    }

    #[test]
    fn test_fixed_odds() {
        let player_win = hand(Outcome::Player, "9S KD", "3H 4C");
        let banker_win = hand(Outcome::Banker, "AS 10H", "4D 5C");
        let tie = hand(Outcome::Tie, "2S 3H", "KD 5C");

        assert_eq!(bet_credit(Side::Player, 100, &player_win, BankerRounding::Floor), 200);
        assert_eq!(bet_credit(Side::Banker, 100, &player_win, BankerRounding::Floor), 0);
        assert_eq!(bet_credit(Side::Banker, 100, &banker_win, BankerRounding::Floor), 195);
        assert_eq!(bet_credit(Side::Player, 100, &banker_win, BankerRounding::Floor), 0);
        assert_eq!(bet_credit(Side::Tie, 50, &tie, BankerRounding::Floor), 450);
        assert_eq!(bet_credit(Side::Tie, 50, &player_win, BankerRounding::Floor), 0);
        // Tie pushes the main bets: stake back, no win, no loss.
        assert_eq!(bet_credit(Side::Player, 100, &tie, BankerRounding::Floor), 100);
        assert_eq!(bet_credit(Side::Banker, 100, &tie, BankerRounding::Floor), 100);
    }

    #[test]
    fn test_banker_commission_rounding_policy() {
        let banker_win = hand(Outcome::Banker, "AS 10H", "4D 5C");
        // floor(1.95 * 3) = 5
        assert_eq!(bet_credit(Side::Banker, 3, &banker_win, BankerRounding::Floor), 5);
        // nearest rounds 2.85 up to 3: total 6
        assert_eq!(bet_credit(Side::Banker, 3, &banker_win, BankerRounding::Nearest), 6);
        // Policies agree when the commission divides evenly.
        assert_eq!(bet_credit(Side::Banker, 100, &banker_win, BankerRounding::Nearest), 195);
    }

    #[test]
    fn test_huge_stakes_clamp_instead_of_panicking() {
        let tie = hand(Outcome::Tie, "2S 3H", "KD 5C");
        let banker_win = hand(Outcome::Banker, "AS 10H", "4D 5C");
        let paired = hand(Outcome::Tie, "7S 7S", "KD 5C");

        assert_eq!(bet_credit(Side::Tie, u64::MAX, &tie, BankerRounding::Floor), u64::MAX);
        assert_eq!(bet_credit(Side::Banker, u64::MAX, &banker_win, BankerRounding::Nearest), u64::MAX);
        assert_eq!(
            bet_credit(Side::PerfectPair, u64::MAX, &paired, BankerRounding::Floor),
            u64::MAX
        );

        // Aggregation across a user's bets clamps too.
        let bets = vec![bet("alice", Side::Tie, u64::MAX), bet("alice", Side::Player, 100)];
        let credits = credits_for_round(&tie, &bets, BankerRounding::Floor);
        assert_eq!(credits.get("alice"), Some(&u64::MAX));
    }

    #[test]
    fn test_pair_side_bets() {
        let paired = hand(Outcome::Tie, "7S 7H", "KD 5C");
        assert_eq!(bet_credit(Side::PlayerPair, 10, &paired, BankerRounding::Floor), 120);
        assert_eq!(bet_credit(Side::BankerPair, 10, &paired, BankerRounding::Floor), 0);
        assert_eq!(bet_credit(Side::AnyPair, 10, &paired, BankerRounding::Floor), 60);
        assert_eq!(bet_credit(Side::PerfectPair, 10, &paired, BankerRounding::Floor), 0);

        let perfect = hand(Outcome::Tie, "7S 7S", "KD 5C");
        assert_eq!(bet_credit(Side::PerfectPair, 10, &perfect, BankerRounding::Floor), 260);
    }

    #[test]
    fn test_credits_aggregate_per_user() {
        let tie = hand(Outcome::Tie, "2S 3H", "KD 5C");
        let bets = vec![
            bet("alice", Side::Tie, 50),
            bet("alice", Side::Player, 100),
            bet("bob", Side::Banker, 100),
            bet("carol", Side::PlayerPair, 10),
        ];

        let credits = credits_for_round(&tie, &bets, BankerRounding::Floor);
        // alice: 9*50 tie win + 100 push.
        assert_eq!(credits.get("alice"), Some(&550));
        // bob: push.
        assert_eq!(credits.get("bob"), Some(&100));
        // carol lost the side bet; losers carry no entry at all.
        assert_eq!(credits.get("carol"), None);
    }
}
