//! Custom widgets for the TUI

pub mod card;
pub mod input_box;
pub mod markdown;
pub mod message_list;
pub mod spinner;
pub mod tab_bar;

pub use card::{Card, CardList};
pub use input_box::InputBox;
pub use message_list::{ChatMessage, MessageList, Speaker};
pub use spinner::Spinner;
pub use tab_bar::TabBar;
