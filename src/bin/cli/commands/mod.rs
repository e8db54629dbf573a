pub mod build;
pub mod export;
pub mod inspect;
pub mod page;
pub mod publish;
pub mod run;
pub mod stamp;
