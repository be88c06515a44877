pub mod issue;
pub mod raw;
