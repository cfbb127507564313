pub mod audit;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod report;
