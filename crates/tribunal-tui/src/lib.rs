//! tribunal-tui: Terminal UI components
//!
//! Widgets for the dispute client, built on ratatui and crossterm. The widgets
//! take their own view models so they stay independent of session state.

pub mod input;
pub mod theme;
pub mod widgets;

pub use theme::Theme;
