//! Business logic services for the Repair Shop Management backend

pub mod customer;
pub mod expense;
pub mod inventory;
pub mod notification;
pub mod numbering;
pub mod reconciliation;
pub mod repair;
pub mod repair_parts;
pub mod reporting;
pub mod sales;
pub mod stock_ledger;

pub use customer::CustomerService;
pub use expense::ExpenseService;
pub use inventory::InventoryService;
pub use notification::NotificationService;
pub use repair::RepairService;
pub use repair_parts::RepairPartsService;
pub use reporting::ReportingService;
pub use sales::SalesService;
pub use stock_ledger::StockLedgerService;
