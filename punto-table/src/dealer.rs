//! Hand evaluator: deals a complete punto banco hand under the fixed
//! casino tableau. Pure apart from the random draw; every rule here is the
//! house rule set, not a tunable.

use punto_core::types::{Card, HandResult, Outcome, Suit};
use rand::Rng;

/// Deal one complete hand from a fresh infinite-supply draw.
pub fn deal() -> HandResult {
    deal_with(&mut rand::thread_rng())
}

/// Deterministic variant for tests and simulations.
pub fn deal_with<R: Rng + ?Sized>(rng: &mut R) -> HandResult {
    let mut player = vec![draw(rng), draw(rng)];
    let mut banker = vec![draw(rng), draw(rng)];
    let player_initial = hand_total(&player);
    let banker_initial = hand_total(&banker);

    // Natural 8 or 9 on either side ends the deal immediately.
    if player_initial >= 8 || banker_initial >= 8 {
        return finish(player, banker);
    }

    let mut player_third = None;
    if player_draws(player_initial) {
        let card = draw(rng);
        player.push(card);
        player_third = Some(card);
    }

    let banker_hits = match player_third {
        None => banker_initial <= 5,
        Some(card) => banker_draws(banker_initial, card.point_value()),
    };
    if banker_hits {
        banker.push(draw(rng));
    }

    finish(player, banker)
}

/// Hand total: sum of card point values, mod 10.
pub fn hand_total(cards: &[Card]) -> u8 {
    cards.iter().map(|c| c.point_value()).sum::<u8>() % 10
}

/// Player stands on 6-7, draws on 0-5.
pub fn player_draws(player_total: u8) -> bool {
    player_total <= 5
}

/// Banker third-card table, keyed on the banker two-card total and the
/// point value of the player's third card.
pub fn banker_draws(banker_total: u8, player_third_value: u8) -> bool {
    match banker_total {
        0..=2 => true,
        3 => player_third_value != 8,
        4 => (2..=7).contains(&player_third_value),
        5 => (4..=7).contains(&player_third_value),
        6 => player_third_value == 6 || player_third_value == 7,
        _ => false,
    }
}

fn draw<R: Rng + ?Sized>(rng: &mut R) -> Card {
    let rank = rng.gen_range(1..=13);
    let suit = Suit::ALL[rng.gen_range(0..Suit::ALL.len())];
    Card::new(rank, suit)
}

fn finish(player_cards: Vec<Card>, banker_cards: Vec<Card>) -> HandResult {
    let player_total = hand_total(&player_cards);
    let banker_total = hand_total(&banker_cards);
    let outcome = if player_total > banker_total {
        Outcome::Player
    } else if banker_total > player_total {
        Outcome::Banker
    } else {
        Outcome::Tie
    };
    HandResult {
        player_cards,
        banker_cards,
        player_total,
        banker_total,
        outcome,
    }
}
