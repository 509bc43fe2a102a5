pub mod run;
pub mod tools;
