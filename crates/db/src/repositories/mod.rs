//! Repository implementations over `SeaORM`.

mod convert;
mod notification;
mod workflow;

pub use workflow::PgStore;
