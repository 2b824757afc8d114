//! Tradeloop Core: the polling strategy engine and its building blocks.
//!
//! This crate holds every trading decision and nothing that talks to a terminal:
//! - Domain types (candles, quotes, instruments, order plans, positions)
//! - Pure indicator library over closed candles
//! - Filter-trail signal evaluator with strategy presets
//! - Risk sizer (stop/target levels and volume)
//! - Breakeven-then-trail position manager with a ratchet invariant
//! - Entry guards with explicit per-strategy state
//! - The polling-cycle engine and the collaborator traits it drives

pub mod components;
pub mod domain;
pub mod engine;
pub mod guards;
pub mod indicators;
pub mod position_management;
pub mod risk;
pub mod signal;
