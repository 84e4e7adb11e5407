//! Domain models for the repair shop

mod customer;
mod finance;
mod inventory;
mod notification;
mod repair;
mod report;
mod sales;

pub use customer::*;
pub use finance::*;
pub use inventory::*;
pub use notification::*;
pub use repair::*;
pub use report::*;
pub use sales::*;
