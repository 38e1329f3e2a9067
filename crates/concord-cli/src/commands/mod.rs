//! Command implementations.

pub mod compare;
pub mod detect;
pub mod history;
pub mod propagate;
pub mod regenerator;
pub mod resolve;
pub mod review;
pub mod rollback;
pub mod scan;

pub use self::compare::execute_compare;
pub use self::detect::execute_detect;
pub use self::history::execute_history;
pub use self::propagate::execute_propagate;
pub use self::regenerator::execute_regenerator;
pub use self::resolve::execute_resolve;
pub use self::review::execute_review;
pub use self::rollback::execute_rollback;
pub use self::scan::execute_scan;
