pub mod auth;
pub mod fetch;
pub mod output;
pub mod run;
pub mod status;
pub mod token;
