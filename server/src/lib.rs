pub mod auth;
pub mod db;
pub mod ledger_audit;
pub mod notify;
pub mod rewards;
