pub mod catalog;
pub mod flaky;
pub mod report;
pub mod run;
pub mod template;
pub mod ticket;
