//! Record repositories
//!
//! Repositories handle all direct interactions with the record files. Public
//! functions take the lock they need; the `*_locked` functions are the
//! lock-free cores and require the caller's [`LockGuard`](crate::db::LockGuard)
//! as proof that the right lock is held.

pub mod contest_repo;
pub mod slot_repo;
pub mod user_repo;

pub use contest_repo::ContestRepository;
pub use slot_repo::SlotRepository;
pub use user_repo::UserRepository;
