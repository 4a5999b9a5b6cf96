pub mod convert;
pub mod history;
pub mod lookup;
pub mod ranking;
pub mod setup;
pub mod ui;
