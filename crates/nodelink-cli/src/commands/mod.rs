pub mod call;
pub mod conf;
pub mod connect;
pub mod provision;
pub mod settings;
