// Service exports
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod rest;

pub use ledger::{
    list_user_skills, rejected_by_database, verify_swap_request, LedgerError, SkillLedger,
    SkillRegistry,
};
pub use memory::InMemoryLedger;
pub use postgres::{PoolOptions, PostgresLedger};
pub use rest::{RestLedger, RestTables, DEFAULT_PAGE_SIZE};
