pub mod run;
pub mod sent;
