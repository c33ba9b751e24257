pub mod card_input;
pub mod payload;
pub mod resolver;
