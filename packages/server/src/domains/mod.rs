pub mod auth;
pub mod cats;
pub mod matching;
pub mod users;
