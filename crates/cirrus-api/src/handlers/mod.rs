pub mod approvals;
pub mod tools;
