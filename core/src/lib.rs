pub mod api;
pub mod ledger;
pub mod node;
pub mod oracle;
