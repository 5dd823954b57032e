//! # holdem-engine: Texas Hold'em Betting Core
//!
//! A deterministic no-limit Texas Hold'em table for 2 to 10 seats. It enforces
//! betting-round legality, splits main and side pots under all-in conditions,
//! resolves showdowns with 7-card evaluation and keeps every chip accounted for.
//! The crate is synchronous and lock-free; sessions, dedup and rollback live in
//! `holdem-table`.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card representation (Suit, Rank, Card) and parsing
//! - [`deck`] - Deterministic deck shuffling with ChaCha20 RNG
//! - [`hand`] - Hand evaluation and comparison
//! - [`pot`] - Main/side pot construction and payouts
//! - [`rules`] - Action validation
//! - [`engine`] - The betting state machine
//! - [`game`] - Phases and button placement
//! - [`player`] - Player state and actions
//! - [`view`] - Read-only projection with hidden hole cards
//! - [`events`] - Typed transition events
//! - [`logger`] - Hand records
//! - [`errors`] - Error types for game operations
//!
//! ## Quick Start
//!
//! ```rust
//! use holdem_engine::cards::parse_cards;
//! use holdem_engine::hand::{evaluate, HandCategory};
//!
//! let hole = parse_cards("Ah Ad").unwrap();
//! let board = parse_cards("Ac 7d 7s 2h 9c").unwrap();
//! let rank = evaluate([hole[0], hole[1]], &board).unwrap();
//! assert_eq!(rank.category, HandCategory::FullHouse);
//! ```
//!
//! ## Deterministic Gameplay
//!
//! A seeded table deals the same cards every time:
//!
//! ```rust
//! use holdem_engine::engine::{Engine, TableConfig};
//! use holdem_engine::player::Seat;
//!
//! let seats = || vec![Seat::new("a", "A", 500), Seat::new("b", "B", 500)];
//! let mut one = Engine::new(seats(), TableConfig::with_big_blind(10).seeded(42)).unwrap();
//! let mut two = Engine::new(seats(), TableConfig::with_big_blind(10).seeded(42)).unwrap();
//! one.start_new_hand().unwrap();
//! two.start_new_hand().unwrap();
//! assert_eq!(one.view(Some("a")).player("a"), two.view(Some("a")).player("a"));
//! ```

pub mod cards;
pub mod deck;
pub mod engine;
pub mod errors;
pub mod events;
pub mod game;
pub mod hand;
pub mod logger;
pub mod player;
pub mod pot;
pub mod rules;
pub mod view;
