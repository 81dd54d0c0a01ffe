pub mod run;
pub mod split;

pub use run::run;
pub use split::split;
