pub mod fn_provider;
pub mod scripted;
