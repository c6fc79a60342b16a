pub mod adapter;
pub mod event;
pub mod models;
pub mod reply;
