pub mod order;
pub mod partner;
pub mod pricing;
pub mod report;
pub mod settings;
