use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Card suit, stored as a single letter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn letter(&self) -> char {
        match self {
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c {
            'S' => Some(Suit::Spades),
            'H' => Some(Suit::Hearts),
            'D' => Some(Suit::Diamonds),
            'C' => Some(Suit::Clubs),
            _ => None,
        }
    }
}

/// A playing card. Rank runs 1 (ace) through 13 (king); hands are persisted
/// as codes like `AS`, `10H`, `KD`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Card {
    pub rank: u8,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: u8, suit: Suit) -> Self {
        debug_assert!((1..=13).contains(&rank));
        Self { rank, suit }
    }

    /// Baccarat point value: ace = 1, 2-9 face value, 10/J/Q/K = 0.
    pub fn point_value(&self) -> u8 {
        match self.rank {
            1 => 1,
            2..=9 => self.rank,
            _ => 0,
        }
    }

    fn rank_code(&self) -> &'static str {
        match self.rank {
            1 => "A",
            2 => "2",
            3 => "3",
            4 => "4",
            5 => "5",
            6 => "6",
            7 => "7",
            8 => "8",
            9 => "9",
            10 => "10",
            11 => "J",
            12 => "Q",
            _ => "K",
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.rank_code(), self.suit.letter())
    }
}

impl FromStr for Card {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CoreError::InvalidCard(s.to_string());
        let mut chars = s.chars();
        let suit_char = chars.next_back().ok_or_else(bad)?;
        let suit = Suit::from_letter(suit_char).ok_or_else(bad)?;
        let rank = match chars.as_str() {
            "A" => 1,
            "J" => 11,
            "Q" => 12,
            "K" => 13,
            "10" => 10,
            r => r.parse::<u8>().ok().filter(|n| (2..=9).contains(n)).ok_or_else(bad)?,
        };
        Ok(Card::new(rank, suit))
    }
}

/// Encode a hand as space-separated card codes for storage.
pub fn encode_hand(cards: &[Card]) -> String {
    cards
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode a space-separated hand string. Empty input is an empty hand.
pub fn decode_hand(s: &str) -> Result<Vec<Card>, CoreError> {
    s.split_whitespace().map(Card::from_str).collect()
}

/// Wager target. `Player`/`Banker`/`Tie` are the main bets; the pair
/// variants are side bets resolved from the dealt hands alone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player,
    Banker,
    Tie,
    PlayerPair,
    BankerPair,
    AnyPair,
    PerfectPair,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Player => "player",
            Side::Banker => "banker",
            Side::Tie => "tie",
            Side::PlayerPair => "player_pair",
            Side::BankerPair => "banker_pair",
            Side::AnyPair => "any_pair",
            Side::PerfectPair => "perfect_pair",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Side::Player),
            "banker" => Ok(Side::Banker),
            "tie" => Ok(Side::Tie),
            "player_pair" => Ok(Side::PlayerPair),
            "banker_pair" => Ok(Side::BankerPair),
            "any_pair" => Ok(Side::AnyPair),
            "perfect_pair" => Ok(Side::PerfectPair),
            other => Err(CoreError::InvalidSide(other.to_string())),
        }
    }
}

/// Result of a dealt hand.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Player,
    Banker,
    Tie,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Player => "player",
            Outcome::Banker => "banker",
            Outcome::Tie => "tie",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "player" => Ok(Outcome::Player),
            "banker" => Ok(Outcome::Banker),
            "tie" => Ok(Outcome::Tie),
            other => Err(CoreError::InvalidOutcome(other.to_string())),
        }
    }
}

/// Round lifecycle phase. A round is created in `Betting`, flips to
/// `Locked` together with the dealt result, and ends in `Settled` once
/// payouts have been applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Betting,
    Locked,
    Settled,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Betting => "betting",
            Phase::Locked => "locked",
            Phase::Settled => "settled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "betting" => Ok(Phase::Betting),
            "locked" => Ok(Phase::Locked),
            "settled" => Ok(Phase::Settled),
            other => Err(CoreError::InvalidPhase(other.to_string())),
        }
    }
}

/// Composite identity of a round. Unique per (room, day, number); the day
/// key restarts numbering at the reference-timezone midnight.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RoundKey {
    pub room: String,
    pub day_key: NaiveDate,
    pub round_no: u32,
}

/// Final cards, totals and winner of one dealt hand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandResult {
    pub player_cards: Vec<Card>,
    pub banker_cards: Vec<Card>,
    pub player_total: u8,
    pub banker_total: u8,
    pub outcome: Outcome,
}

impl HandResult {
    /// Player's first two cards share a rank.
    pub fn player_pair(&self) -> bool {
        is_pair(&self.player_cards)
    }

    /// Banker's first two cards share a rank.
    pub fn banker_pair(&self) -> bool {
        is_pair(&self.banker_cards)
    }

    pub fn any_pair(&self) -> bool {
        self.player_pair() || self.banker_pair()
    }

    /// A pair matching in both rank and suit on either initial hand.
    pub fn perfect_pair(&self) -> bool {
        is_perfect_pair(&self.player_cards) || is_perfect_pair(&self.banker_cards)
    }
}

fn is_pair(cards: &[Card]) -> bool {
    cards.len() >= 2 && cards[0].rank == cards[1].rank
}

fn is_perfect_pair(cards: &[Card]) -> bool {
    cards.len() >= 2 && cards[0] == cards[1]
}

/// One persisted round. Mutated exactly twice after creation: locked with
/// the dealt result, then settled once payouts are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRow {
    pub room: String,
    pub day_key: NaiveDate,
    pub round_no: u32,
    pub phase: Phase,
    pub opened_at: DateTime<Utc>,
    /// Betting deadline. The stored value, not the phase flag, is the
    /// authoritative gate for bet intake.
    pub close_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub settled_at: Option<DateTime<Utc>>,
    pub player_cards: Vec<Card>,
    pub banker_cards: Vec<Card>,
    pub player_total: Option<u8>,
    pub banker_total: Option<u8>,
    pub outcome: Option<Outcome>,
}

impl RoundRow {
    /// A fresh round in betting phase with no result.
    pub fn open(
        room: &str,
        day_key: NaiveDate,
        round_no: u32,
        opened_at: DateTime<Utc>,
        close_at: DateTime<Utc>,
    ) -> Self {
        Self {
            room: room.to_string(),
            day_key,
            round_no,
            phase: Phase::Betting,
            opened_at,
            close_at,
            locked_at: None,
            settled_at: None,
            player_cards: Vec::new(),
            banker_cards: Vec::new(),
            player_total: None,
            banker_total: None,
            outcome: None,
        }
    }

    pub fn key(&self) -> RoundKey {
        RoundKey {
            room: self.room.clone(),
            day_key: self.day_key,
            round_no: self.round_no,
        }
    }

    /// The dealt result, once the round has been locked.
    pub fn hand_result(&self) -> Option<HandResult> {
        Some(HandResult {
            player_cards: self.player_cards.clone(),
            banker_cards: self.banker_cards.clone(),
            player_total: self.player_total?,
            banker_total: self.banker_total?,
            outcome: self.outcome?,
        })
    }
}

/// One wager, immutable once inserted and permanently bound to the round
/// identity captured at acceptance time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRow {
    pub id: String,
    pub user_id: String,
    pub room: String,
    pub day_key: NaiveDate,
    pub round_no: u32,
    pub side: Side,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
}

impl BetRow {
    pub fn new(user_id: &str, round: &RoundKey, side: Side, amount: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            room: round.room.clone(),
            day_key: round.day_key,
            round_no: round.round_no,
            side,
            amount,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_codes_roundtrip() {
        for code in ["AS", "10H", "JD", "QC", "KS", "2H", "9D"] {
            let card: Card = code.parse().unwrap();
            assert_eq!(card.to_string(), code);
        }
        assert!("XZ".parse::<Card>().is_err());
        assert!("11S".parse::<Card>().is_err());
        assert!("".parse::<Card>().is_err());
    }

    #[test]
    fn test_point_values() {
        assert_eq!("AS".parse::<Card>().unwrap().point_value(), 1);
        assert_eq!("9D".parse::<Card>().unwrap().point_value(), 9);
        assert_eq!("10H".parse::<Card>().unwrap().point_value(), 0);
        assert_eq!("KC".parse::<Card>().unwrap().point_value(), 0);
    }

    #[test]
    fn test_hand_encoding() {
        let hand = decode_hand("AS 10H QD").unwrap();
        assert_eq!(hand.len(), 3);
        assert_eq!(encode_hand(&hand), "AS 10H QD");
        assert!(decode_hand("").unwrap().is_empty());
        assert!(decode_hand("AS ??").is_err());
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("banker".parse::<Side>().unwrap(), Side::Banker);
        assert_eq!("perfect_pair".parse::<Side>().unwrap(), Side::PerfectPair);
        assert!("middle".parse::<Side>().is_err());
    }

    #[test]
    fn test_pair_predicates() {
        let hand = HandResult {
            player_cards: decode_hand("7S 7H").unwrap(),
            banker_cards: decode_hand("KD 4C").unwrap(),
            player_total: 4,
            banker_total: 4,
            outcome: Outcome::Tie,
        };
        assert!(hand.player_pair());
        assert!(!hand.banker_pair());
        assert!(hand.any_pair());
        assert!(!hand.perfect_pair());

        let perfect = HandResult {
            player_cards: decode_hand("7S 7S").unwrap(),
            ..hand.clone()
        };
        assert!(perfect.perfect_pair());
    }
}
